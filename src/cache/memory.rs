//! In-process backend used for local development and tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::backend::{BackendError, CacheBackend};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Writes between two sweeps of expired entries.
const SWEEP_EVERY: u64 = 1024;

/// Map-backed store with Redis-style expiry and glob matching.
///
/// Expiry runs on tokio's clock, so paused-time tests can advance past a TTL
/// without sleeping. Keys that are never read again (rate limit windows,
/// one-off search pages) are reclaimed by a sweep every [`SWEEP_EVERY`] writes.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, MemoryEntry>,
    writes: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a write and sweep when due. Must not be called while holding an
    /// entry guard.
    fn note_write(&self, now: Instant) {
        let seen = self.writes.fetch_add(1, Ordering::Relaxed);
        if seen % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.entries.retain(|_, entry| entry.is_live(now));
        }
    }

    fn purge_if_expired(&self, key: &str, now: Instant) {
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        Ok(self.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u32) -> Result<(), BackendError> {
        if ttl_secs == 0 {
            return Err(BackendError::Command(
                "invalid expire time in 'set' command".to_string(),
            ));
        }
        let now = Instant::now();
        self.note_write(now);
        let expires_at = now + Duration::from_secs(u64::from(ttl_secs));
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, BackendError> {
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if let Some((_, entry)) = self.entries.remove(key)
                && entry.is_live(now)
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let now = Instant::now();
        let mut matched = Vec::new();
        let mut expired = Vec::new();
        for entry in self.entries.iter() {
            if !entry.is_live(now) {
                expired.push(entry.key().clone());
            } else if glob_match(pattern.as_bytes(), entry.key().as_bytes()) {
                matched.push(entry.key().clone());
            }
        }
        for key in expired {
            self.purge_if_expired(&key, now);
        }
        matched.sort();
        Ok(matched)
    }

    async fn incr(&self, key: &str) -> Result<i64, BackendError> {
        let now = Instant::now();
        self.note_write(now);
        self.purge_if_expired(key, now);
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| MemoryEntry {
                value: "0".to_string(),
                expires_at: None,
            });
        let current: i64 = entry.value.parse().map_err(|_| {
            BackendError::Command("value is not an integer or out of range".to_string())
        })?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| BackendError::Command("increment would overflow".to_string()))?;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl_secs: u32) -> Result<bool, BackendError> {
        let now = Instant::now();
        self.purge_if_expired(key, now);
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.expires_at = Some(now + Duration::from_secs(u64::from(ttl_secs)));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Redis `stringmatch` semantics: `*`, `?`, `[...]` (with `^` and ranges), `\`.
pub(crate) fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            if pattern[p] == b'*' {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            if let Some(next) = match_one(pattern, p, text[t]) {
                p = next;
                t += 1;
                continue;
            }
        }
        match backtrack {
            Some((star, consumed)) => {
                p = star + 1;
                t = consumed + 1;
                backtrack = Some((star, consumed + 1));
            }
            None => return false,
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

/// Match a single non-`*` pattern element at `p` against `c`; returns the index
/// after the element on success.
fn match_one(pattern: &[u8], p: usize, c: u8) -> Option<usize> {
    match pattern[p] {
        b'?' => Some(p + 1),
        b'\\' if p + 1 < pattern.len() => (pattern[p + 1] == c).then_some(p + 2),
        b'[' => match match_class(pattern, p, c) {
            Some((true, next)) => Some(next),
            Some((false, _)) => None,
            None => (c == b'[').then_some(p + 1),
        },
        literal => (literal == c).then_some(p + 1),
    }
}

/// Evaluate a `[...]` class starting at `start`. Returns `None` when the class
/// is not terminated, in which case `[` is treated literally.
fn match_class(pattern: &[u8], start: usize, c: u8) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }
    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = if pattern[i] <= pattern[i + 2] {
                (pattern[i], pattern[i + 2])
            } else {
                (pattern[i + 2], pattern[i])
            };
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }
    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_prefix_star() {
        assert!(glob_match(b"events:list:*", b"events:list:page:1"));
        assert!(glob_match(b"events:*", b"events:detail:42"));
        assert!(!glob_match(b"events:list:*", b"events:detail:42"));
        assert!(!glob_match(b"events:list:*", b"events:list"));
        assert!(!glob_match(b"events:*", b"venues:detail:events"));
    }

    #[test]
    fn glob_question_class_and_escape() {
        assert!(glob_match(b"h?llo", b"hello"));
        assert!(glob_match(b"h[ae]llo", b"hallo"));
        assert!(!glob_match(b"h[^e]llo", b"hello"));
        assert!(glob_match(b"h[a-c]llo", b"hbllo"));
        assert!(glob_match(b"literal\\*", b"literal*"));
        assert!(!glob_match(b"literal\\*", b"literalx"));
        assert!(glob_match(b"a*b*c", b"axxbyyc"));
        assert!(glob_match(b"*", b""));
    }

    #[tokio::test]
    async fn set_get_and_delete() {
        let backend = MemoryBackend::new();
        backend
            .set_ex("k", "\"v\"".to_string(), 60)
            .await
            .expect("set");
        assert_eq!(backend.get("k").await.expect("get"), Some("\"v\"".into()));
        assert_eq!(backend.del(&["k".to_string()]).await.expect("del"), 1);
        assert_eq!(backend.del(&["k".to_string()]).await.expect("del"), 0);
        assert_eq!(backend.get("k").await.expect("get"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_on_tokio_clock() {
        let backend = MemoryBackend::new();
        backend.set_ex("k", "1".to_string(), 1).await.expect("set");
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(backend.get("k").await.expect("get"), None);
        assert!(backend.scan_match("*").await.expect("scan").is_empty());
    }

    #[tokio::test]
    async fn incr_creates_and_rejects_non_integers() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.incr("counter").await.expect("incr"), 1);
        assert_eq!(backend.incr("counter").await.expect("incr"), 2);
        backend
            .set_ex("text", "\"abc\"".to_string(), 10)
            .await
            .expect("set");
        assert!(matches!(
            backend.incr("text").await,
            Err(BackendError::Command(_))
        ));
    }

    #[tokio::test]
    async fn expire_reports_missing_keys() {
        let backend = MemoryBackend::new();
        assert!(!backend.expire("missing", 10).await.expect("expire"));
        backend.incr("present").await.expect("incr");
        assert!(backend.expire("present", 10).await.expect("expire"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_keys_nobody_reads_are_swept() {
        let backend = MemoryBackend::new();
        for window in 0..2 * SWEEP_EVERY {
            let key = format!("ratelimit:api:client-{window}:1");
            backend.incr(&key).await.expect("incr");
            backend.expire(&key, 1).await.expect("expire");
        }
        tokio::time::advance(Duration::from_secs(3600)).await;

        for page in 0..SWEEP_EVERY {
            backend
                .set_ex(&format!("events:list:page:{page}"), "{}".to_string(), 60)
                .await
                .expect("set");
        }
        assert_eq!(backend.entries.len(), SWEEP_EVERY as usize);
        assert!(
            backend
                .entries
                .iter()
                .all(|entry| entry.key().starts_with("events:list:"))
        );
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let backend = MemoryBackend::new();
        assert!(backend.set_ex("k", "1".to_string(), 0).await.is_err());
    }
}
