use std::fmt;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStore, SESSION_ID_KEY};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const RANDOM_LEN: usize = 9;

/// Correlates every cart write and order coming from one browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// `session_<unix millis>_<9 random base36 chars>`.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..RANDOM_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(format!("session_{}_{}", Utc::now().timestamp_millis(), suffix))
    }

    /// Returns the id cached in the session-scoped store, creating and
    /// caching one on first use.
    pub fn get_or_create(store: &dyn KeyValueStore) -> Self {
        Self::resume_or_start(store).0
    }

    /// Same as [`SessionId::get_or_create`], also reporting whether the id
    /// was created by this call.
    pub fn resume_or_start(store: &dyn KeyValueStore) -> (Self, bool) {
        if let Some(existing) = store.get(SESSION_ID_KEY).filter(|id| !id.is_empty()) {
            return (Self(existing), false);
        }

        let id = Self::generate();
        if let Err(err) = store.set(SESSION_ID_KEY, id.as_str()) {
            tracing::warn!(error = %err, "could not cache session id");
        }
        (id, true)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn cached_within_one_scope() {
        let tab = MemoryStore::new();
        let first = SessionId::get_or_create(&tab);
        let second = SessionId::get_or_create(&tab);
        assert_eq!(first, second);
        assert!(first.as_str().starts_with("session_"));

        let other_tab = MemoryStore::new();
        assert_ne!(SessionId::get_or_create(&other_tab), first);
    }

    #[test]
    fn reports_when_a_session_starts() {
        let tab = MemoryStore::new();
        let (first, started) = SessionId::resume_or_start(&tab);
        assert!(started);

        let (again, started) = SessionId::resume_or_start(&tab);
        assert!(!started);
        assert_eq!(again, first);
    }
}
