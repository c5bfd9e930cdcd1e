//! Team capability surface.
//!
//! A team is owned by the (external) registration/storage layer; the relay
//! only needs a stable identifier and the ability to resolve relative paths
//! against the team's password-server base URL. Any concrete representation
//! (database row, DTO, test double) can satisfy [`Team`].

/// Capability exposed by a registered workspace team.
pub trait Team: Send + Sync {
    /// Opaque stable identifier, used to correlate pending inserts.
    fn id(&self) -> &str;

    /// Resolve a relative path to a fully qualified URL on this team's
    /// password server.
    fn api(&self, path: &str) -> String;
}

/// Minimal concrete team: an identifier plus a password-server base URL.
#[derive(Debug, Clone)]
pub struct RegisteredTeam {
    pub team_id: String,
    pub server_url: String,
}

impl RegisteredTeam {
    pub fn new<I: Into<String>, U: Into<String>>(team_id: I, server_url: U) -> Self {
        Self {
            team_id: team_id.into(),
            server_url: server_url.into(),
        }
    }
}

impl Team for RegisteredTeam {
    fn id(&self) -> &str {
        &self.team_id
    }

    fn api(&self, path: &str) -> String {
        let base = self.server_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }
}
