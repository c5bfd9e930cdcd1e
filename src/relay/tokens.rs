//! Short-lived insert tokens and the store that holds them.
//!
//! A token correlates a pending out-of-band "insert" editor session back
//! to the right team/path. Tokens gate write access to the secret store,
//! so they are drawn from a cryptographically secure source; they live at
//! most the configured TTL and are consumed exactly once.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Current wire version of [`PendingInsert`].
pub const RECORD_VERSION: u32 = 1;

const TOKEN_LEN: usize = 6;
const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Record correlating an insert token to its team/path.
///
/// An explicit, versioned structure so networked store implementations
/// share one wire format regardless of language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInsert {
    #[serde(default = "current_version")]
    pub version: u32,
    /// Secret path, `channel/app`
    pub path: String,
    /// Opaque team identifier
    pub team_id: String,
    /// Fully qualified insert endpoint on the team's password server
    pub url: String,
}

fn current_version() -> u32 {
    RECORD_VERSION
}

impl PendingInsert {
    pub fn new<P, T, U>(path: P, team_id: T, url: U) -> Self
    where
        P: Into<String>,
        T: Into<String>,
        U: Into<String>,
    {
        Self {
            version: RECORD_VERSION,
            path: path.into(),
            team_id: team_id.into(),
            url: url.into(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Generate a fresh insert token: 6 uniform draws over {A-Z, 0-9} from a
/// CSPRNG. The space (36^6) is large enough that collisions are accepted,
/// not defended against.
pub fn generate_token() -> String {
    let mut rng = OsRng;
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// TTL-keyed token store capability.
///
/// Backing implementations may be in-memory or networked; the only
/// consistency contract the relay depends on is that [`take`] is atomic:
/// concurrent consumers of one token see exactly one `Some`. A networked
/// implementation must fail closed, treating its own read errors as
/// "not found".
///
/// [`take`]: TokenStore::take
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store a record under `token`, overwriting any existing entry. The
    /// entry self-expires after `ttl`.
    async fn put(&self, token: &str, record: PendingInsert, ttl: Duration);

    /// Atomically read and delete the record for `token`. Missing,
    /// expired, and already-consumed entries are indistinguishable.
    async fn take(&self, token: &str) -> Option<PendingInsert>;
}

struct StoredRecord {
    record: PendingInsert,
    expires_at: Instant,
}

impl StoredRecord {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process token store with per-entry TTL.
///
/// Entries are dropped lazily: `take` discards an expired entry it finds,
/// and `evict_expired` sweeps the rest. No shutdown cleanup is needed.
#[derive(Default)]
pub struct InMemoryTokenStore {
    entries: DashMap<String, StoredRecord>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Remove expired entries from the store
    pub fn evict_expired(&self) {
        self.entries.retain(|_, stored| !stored.is_expired());
    }

    /// Get current store size (expired entries included until swept)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn put(&self, token: &str, record: PendingInsert, ttl: Duration) {
        self.entries.insert(
            token.to_string(),
            StoredRecord {
                record,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn take(&self, token: &str) -> Option<PendingInsert> {
        // DashMap::remove is atomic, so racing consumers get one winner.
        // An expired entry is removed here too, which is exactly the
        // fail-closed behavior the contract asks for.
        let (_, stored) = self.entries.remove(token)?;
        if stored.is_expired() {
            return None;
        }
        Some(stored.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PendingInsert {
        PendingInsert::new("C042/database", "T123", "https://vault.example.com/insert")
    }

    #[test]
    fn test_token_shape() {
        for _ in 0..100 {
            let token = generate_token();
            assert_eq!(token.len(), 6);
            assert!(token
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_record_json_roundtrip() {
        let original = record();
        let json = original.to_json().unwrap();
        assert_eq!(PendingInsert::from_json(&json).unwrap(), original);
    }

    #[test]
    fn test_record_version_defaults() {
        // Records written before the version field existed must still parse
        let raw = r#"{"path":"C042/database","team_id":"T123","url":"https://vault.example.com/insert"}"#;
        let parsed = PendingInsert::from_json(raw).unwrap();
        assert_eq!(parsed.version, RECORD_VERSION);
    }

    #[tokio::test]
    async fn test_put_take_consumes() {
        let store = InMemoryTokenStore::new();
        store.put("ABC123", record(), Duration::from_secs(900)).await;

        assert_eq!(store.take("ABC123").await, Some(record()));
        // Consumed: second take looks exactly like expiry
        assert_eq!(store.take("ABC123").await, None);
    }

    #[tokio::test]
    async fn test_take_unknown() {
        let store = InMemoryTokenStore::new();
        assert_eq!(store.take("NOSUCH").await, None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryTokenStore::new();
        store.put("ABC123", record(), Duration::from_secs(900)).await;

        let replacement =
            PendingInsert::new("C042/mail", "T123", "https://vault.example.com/insert");
        store
            .put("ABC123", replacement.clone(), Duration::from_secs(900))
            .await;

        assert_eq!(store.take("ABC123").await, Some(replacement));
    }

    #[tokio::test]
    async fn test_expired_entries_are_unreachable() {
        let store = InMemoryTokenStore::new();
        store.put("ABC123", record(), Duration::ZERO).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.take("ABC123").await, None);
    }

    #[tokio::test]
    async fn test_evict_expired() {
        let store = InMemoryTokenStore::new();
        store.put("STALE1", record(), Duration::ZERO).await;
        store.put("FRESH1", record(), Duration::from_secs(900)).await;

        tokio::time::sleep(Duration::from_millis(10)).await;
        store.evict_expired();

        assert_eq!(store.len(), 1);
        assert!(store.take("FRESH1").await.is_some());
    }

    #[tokio::test]
    async fn test_many_tokens_stay_independent() {
        let store = InMemoryTokenStore::new();
        let mut tokens = Vec::new();
        for i in 0..32 {
            let token = generate_token();
            let record = PendingInsert::new(
                format!("C042/app{}", i),
                "T123",
                "https://vault.example.com/insert",
            );
            store.put(&token, record, Duration::from_secs(900)).await;
            tokens.push(token);
        }

        for (i, token) in tokens.iter().enumerate() {
            let record = store.take(token).await.expect("token should be stored");
            assert_eq!(record.path, format!("C042/app{}", i));
        }
    }

    #[tokio::test]
    async fn test_concurrent_take_single_winner() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryTokenStore::new());
        store.put("RACE01", record(), Duration::from_secs(900)).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.take("RACE01").await.is_some()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
