//! The secret relay.
//!
//! [`SecretRelay`] composes the asymmetric channel, the remote transport,
//! and the token store into the five broker operations a command router
//! calls: `list`, `show`, `insert`, `remove`, and `generate_insert_token`.
//!
//! The relay is stateless per call. It never persists plaintext: whatever a
//! request decrypts leaves as that request's return value. The only shared
//! state across calls is the token store, whose atomic take-and-delete is
//! the single concurrency contract the relay depends on.

pub mod client;
pub mod crypto;
pub mod listing;
pub mod tokens;

pub use client::RemoteServerClient;
pub use crypto::{AsymmetricChannel, CryptoError, CryptoResult};
pub use tokens::{generate_token, InMemoryTokenStore, PendingInsert, TokenStore};

use crate::config::AppConfig;
use crate::error::{RelayError, RelayResult};
use crate::team::Team;
use listing::format_listing;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Broker between a chat workspace and team-owned password servers.
pub struct SecretRelay {
    channel: AsymmetricChannel,
    client: RemoteServerClient,
    tokens: Arc<dyn TokenStore>,
    token_ttl: Duration,
}

impl SecretRelay {
    /// Compose a relay from explicitly injected collaborators.
    pub fn new(
        channel: AsymmetricChannel,
        client: RemoteServerClient,
        tokens: Arc<dyn TokenStore>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            channel,
            client,
            tokens,
            token_ttl,
        }
    }

    /// Build a relay from configuration, with an in-memory token store.
    ///
    /// Loads the private key from the configured PEM file, or generates a
    /// fresh keypair when none is configured.
    pub fn from_config(config: &AppConfig) -> RelayResult<Self> {
        let channel = match &config.key.pem_file {
            Some(path) => {
                let pem = std::fs::read_to_string(path).map_err(|e| {
                    RelayError::internal(format!("cannot read key file {}: {}", path, e))
                })?;
                AsymmetricChannel::from_pkcs8_pem(&pem)?
            }
            None => {
                warn!("no key file configured, generating an ephemeral keypair");
                AsymmetricChannel::generate(config.key.bits)?
            }
        };

        Ok(Self::new(
            channel,
            RemoteServerClient::new(&config.remote),
            Arc::new(InMemoryTokenStore::new()),
            Duration::from_secs(config.tokens.ttl_secs),
        ))
    }

    /// List the secrets stored under a channel, formatted as a tree.
    ///
    /// The response body is a sequence of concatenated fixed-size cipher
    /// blocks; the first block that fails to decrypt aborts the whole call,
    /// so a partial listing is never returned. An empty plaintext yields an
    /// empty string (the caller renders "no secrets").
    pub async fn list(&self, team: &dyn Team, channel: &str) -> RelayResult<String> {
        let url = team.api(&format!("list/{}", channel));
        let (status, body) = self.client.post_form(&url, &[]).await?;
        debug!("list for channel {} returned {}", channel, status);

        let mut plaintext = Vec::new();
        for block in body.as_bytes().chunks(self.channel.block_len()) {
            let block = std::str::from_utf8(block).map_err(|_| CryptoError::DecryptionFailed)?;
            plaintext.extend(self.channel.decrypt_block(block)?);
        }

        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let item_list =
            String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidPlaintext)?;
        Ok(format_listing(channel, &item_list))
    }

    /// Issue a single-use token for an out-of-band insert.
    ///
    /// The caller embeds the token in a one-time editor URL; the eventual
    /// submission comes back through [`insert`](Self::insert).
    pub async fn generate_insert_token(
        &self,
        team: &dyn Team,
        channel: &str,
        app: &str,
    ) -> String {
        let token = generate_token();
        let record = PendingInsert::new(
            format!("{}/{}", channel, app),
            team.id(),
            team.api("insert"),
        );

        self.tokens.put(&token, record, self.token_ttl).await;
        debug!("issued insert token for team {}", team.id());
        token
    }

    /// Complete a pending insert.
    ///
    /// The token is consumed before any network traffic, so an attempt is
    /// single-shot: a transport or status failure afterwards still leaves
    /// the token spent, and the caller must request a new one to retry.
    pub async fn insert(&self, token: &str, secret: &str) -> RelayResult<()> {
        let record = self
            .tokens
            .take(token)
            .await
            .ok_or(RelayError::InvalidToken)?;

        let (status, _body) = self
            .client
            .post_form(&record.url, &[("path", &record.path), ("secret", secret)])
            .await?;

        if !status.is_success() {
            return Err(RelayError::RemoteStatus(status));
        }

        debug!("stored secret at {} for team {}", record.path, record.team_id);
        Ok(())
    }

    /// Remove a secret. True only on a success status; every failure mode,
    /// transport included, collapses to false - the caller only needs
    /// presence/absence.
    pub async fn remove(&self, team: &dyn Team, channel: &str, app: &str) -> bool {
        let url = team.api("remove");
        match self
            .client
            .post_form(&url, &[("channel", channel), ("app", app)])
            .await
        {
            Ok((status, _)) => status.is_success(),
            Err(e) => {
                warn!("remove against {} failed: {}", url, e);
                false
            }
        }
    }

    /// Fetch a one-time link revealing one secret.
    ///
    /// Returns `None` when the secret does not exist (a normal outcome).
    /// The link fits in a single cipher block, so the body is not chunked.
    pub async fn show(
        &self,
        team: &dyn Team,
        channel: &str,
        app: &str,
    ) -> RelayResult<Option<String>> {
        let secret_path = format!("{}/{}", channel, app);
        let (status, body) = self
            .client
            .post_form(&team.api("onetime_link"), &[("secret", &secret_path)])
            .await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RelayError::Unexpected(status));
        }

        let link = self.channel.decrypt_block(&body)?;
        let link = String::from_utf8(link).map_err(|_| CryptoError::InvalidPlaintext)?;
        Ok(Some(link))
    }

    /// Fetch the password server's public key PEM.
    ///
    /// `None` on transport failure or any non-success status; like
    /// [`remove`](Self::remove), the caller only needs to know whether the
    /// server answered. Persisting the key is the registration layer's job.
    pub async fn fetch_public_key(&self, team: &dyn Team) -> Option<String> {
        let url = team.api("public_key");
        match self.client.get(&url).await {
            Ok((status, body)) if status.is_success() => Some(body),
            Ok((status, _)) => {
                warn!("public_key fetch from {} returned {}", url, status);
                None
            }
            Err(e) => {
                warn!("public_key fetch from {} failed: {}", url, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for SecretRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRelay")
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;
    use crate::team::RegisteredTeam;

    fn test_relay() -> SecretRelay {
        SecretRelay::new(
            AsymmetricChannel::generate(1024).unwrap(),
            RemoteServerClient::new(&RemoteConfig { timeout_secs: 2 }),
            Arc::new(InMemoryTokenStore::new()),
            Duration::from_secs(900),
        )
    }

    #[tokio::test]
    async fn test_insert_with_unknown_token_makes_no_network_call() {
        let relay = test_relay();
        // The stored url would be unreachable; reaching it would error
        // differently, so InvalidToken proves nothing was sent
        let result = relay.insert("NOSUCH", "supersecret").await;
        assert!(matches!(result, Err(RelayError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_generate_insert_token_records_pending_insert() {
        let store = Arc::new(InMemoryTokenStore::new());
        let relay = SecretRelay::new(
            AsymmetricChannel::generate(1024).unwrap(),
            RemoteServerClient::new(&RemoteConfig { timeout_secs: 2 }),
            store.clone(),
            Duration::from_secs(900),
        );
        let team = RegisteredTeam::new("T123", "https://vault.example.com");

        let token = relay.generate_insert_token(&team, "C042", "database").await;
        assert_eq!(token.len(), 6);

        let record = store.take(&token).await.expect("record should be stored");
        assert_eq!(record.path, "C042/database");
        assert_eq!(record.team_id, "T123");
        assert_eq!(record.url, "https://vault.example.com/insert");
    }

    #[tokio::test]
    async fn test_from_config_generates_key_when_unconfigured() {
        let config = AppConfig::default();
        let relay = SecretRelay::from_config(&config).unwrap();
        // 2048-bit default key
        assert_eq!(relay.channel.block_len(), 344);
    }
}
