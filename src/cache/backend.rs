//! Raw key-value backend behind the cache store.
//!
//! Backends speak Redis semantics on string values. JSON encoding, TTL
//! defaults and error swallowing live one level up in `CacheStore`.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("store rejected command: {0}")]
    Command(String),
    #[error("unexpected store reply: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Whether retrying the same command may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport(_) => true,
            BackendError::Status { status, .. } => *status >= 500 || *status == 429,
            BackendError::Command(_) | BackendError::Protocol(_) => false,
        }
    }
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short backend label for logs and health output.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    /// `SET key value EX ttl`.
    async fn set_ex(&self, key: &str, value: String, ttl_secs: u32) -> Result<(), BackendError>;

    /// Delete all `keys` in one command; returns how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, BackendError>;

    /// Enumerate live keys matching a Redis glob.
    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>, BackendError>;

    async fn incr(&self, key: &str) -> Result<i64, BackendError>;

    /// Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u32) -> Result<bool, BackendError>;

    async fn ping(&self) -> Result<(), BackendError>;
}
