//! Cross-request session state: which conversations are parked waiting for
//! identity, and the original message to restore on resumption.
//!
//! Keys are either an explicit session token or, when the caller has none, a
//! content fingerprint of the parked message. The fingerprint fallback can
//! collide across unrelated conversations sharing a store; acceptable for a
//! single-user interactive front end, not for multi-tenant use.
//!
//! State lives only as long as the process; a restart forgets all parked
//! conversations.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-conversation state. The default is "not waiting".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub waiting_for_identity: bool,
    pub original_message: Option<String>,
}

/// In-memory store for session state. All read-modify-write access goes
/// through one mutex, so two concurrent resumption attempts for the same
/// session cannot interleave between read and write; concurrent writes are
/// last-writer-wins.
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, SessionState>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fixed-width content fingerprint used as the fallback session key:
    /// first 16 hex characters of the SHA-256 of the trimmed message.
    pub fn fingerprint(message: &str) -> String {
        let digest = Sha256::digest(message.trim().as_bytes());
        let hex = format!("{:x}", digest);
        hex[..16].to_string()
    }

    /// Current state for `key`; a miss yields the default "not waiting"
    /// state, never an error.
    pub async fn get(&self, key: &str) -> SessionState {
        self.inner.lock().await.get(key).cloned().unwrap_or_default()
    }

    /// Atomic read-modify-write on the state for `key`. The closure runs
    /// under the store lock; an entry left in the default state is dropped.
    pub async fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&mut SessionState),
    {
        let mut guard = self.inner.lock().await;
        let state = guard.entry(key.to_string()).or_default();
        f(state);
        if *state == SessionState::default() {
            guard.remove(key);
        }
    }

    /// Park the session: waiting for identity, original message preserved.
    /// Overwrites any previous state for the key.
    pub async fn park(&self, key: &str, original_message: &str) {
        let original = original_message.to_string();
        self.update(key, |state| {
            state.waiting_for_identity = true;
            state.original_message = Some(original);
        })
        .await;
        log::debug!("session: parked key {}", key);
    }

    /// Clear the session back to the default "not waiting" state.
    pub async fn clear(&self, key: &str) {
        self.inner.lock().await.remove(key);
        log::debug!("session: cleared key {}", key);
    }
}
