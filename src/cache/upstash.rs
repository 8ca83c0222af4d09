//! Managed Redis over its REST interface.
//!
//! Each command is a JSON array posted to the endpoint with a bearer token;
//! replies are `{"result": ...}` or `{"error": "..."}`.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::backend::{BackendError, CacheBackend};

const SCAN_COUNT: u32 = 200;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct UpstashConfig {
    pub url: String,
    pub token: String,
    pub timeout: Duration,
    /// Total attempts per command, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff_base: Duration,
}

#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct UpstashBackend {
    client: Client,
    url: String,
    token: String,
    max_attempts: u32,
    backoff_base: Duration,
}

impl UpstashBackend {
    pub fn new(config: UpstashConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            token: config.token,
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base,
        })
    }

    async fn command(&self, args: Value) -> Result<Value, BackendError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(&args).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = retry_delay(self.backoff_base, attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying store command"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(&self, args: &Value) -> Result<Value, BackendError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(args)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;

        let status = response.status();
        let reply: Result<CommandReply, _> = response.json().await;

        match reply {
            Ok(CommandReply {
                error: Some(message),
                ..
            }) => {
                if status.is_success() || status == StatusCode::BAD_REQUEST {
                    Err(BackendError::Command(message))
                } else {
                    Err(BackendError::Status {
                        status: status.as_u16(),
                        message,
                    })
                }
            }
            Ok(CommandReply { result, .. }) if status.is_success() => {
                Ok(result.unwrap_or(Value::Null))
            }
            Ok(_) => Err(BackendError::Status {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("error").to_string(),
            }),
            Err(err) if status.is_success() => Err(BackendError::Protocol(err.to_string())),
            Err(err) => Err(BackendError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }),
        }
    }
}

/// Delay after the given failed attempt (1-based), doubling per attempt and
/// capped at [`MAX_RETRY_DELAY`].
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

fn as_integer(value: Value) -> Result<i64, BackendError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| BackendError::Protocol(format!("non-integer reply {n}"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| BackendError::Protocol(format!("non-integer reply {s:?}"))),
        other => Err(BackendError::Protocol(format!("expected integer, got {other}"))),
    }
}

fn parse_scan_page(value: Value) -> Result<(String, Vec<String>), BackendError> {
    let Value::Array(mut parts) = value else {
        return Err(BackendError::Protocol("SCAN reply is not an array".into()));
    };
    if parts.len() != 2 {
        return Err(BackendError::Protocol(format!(
            "SCAN reply has {} elements",
            parts.len()
        )));
    }
    let keys = parts.pop().unwrap_or(Value::Null);
    let cursor = match parts.pop().unwrap_or(Value::Null) {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => {
            return Err(BackendError::Protocol(format!(
                "SCAN cursor has unexpected type: {other}"
            )));
        }
    };
    let Value::Array(keys) = keys else {
        return Err(BackendError::Protocol("SCAN keys are not an array".into()));
    };
    let keys = keys
        .into_iter()
        .filter_map(|key| match key {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect();
    Ok((cursor, keys))
}

#[async_trait]
impl CacheBackend for UpstashBackend {
    fn name(&self) -> &'static str {
        "upstash"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        match self.command(json!(["GET", key])).await? {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(other.to_string())),
        }
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u32) -> Result<(), BackendError> {
        self.command(json!(["SET", key, value, "EX", ttl_secs]))
            .await
            .map(|_| ())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, BackendError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut args = Vec::with_capacity(keys.len() + 1);
        args.push(Value::from("DEL"));
        args.extend(keys.iter().map(|key| Value::from(key.as_str())));
        let removed = as_integer(self.command(Value::Array(args)).await?)?;
        Ok(removed.max(0) as u64)
    }

    async fn scan_match(&self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let mut cursor = "0".to_string();
        let mut found = BTreeSet::new();
        loop {
            let reply = self
                .command(json!(["SCAN", cursor, "MATCH", pattern, "COUNT", SCAN_COUNT]))
                .await?;
            let (next, keys) = parse_scan_page(reply)?;
            found.extend(keys);
            if next == "0" {
                break;
            }
            cursor = next;
        }
        Ok(found.into_iter().collect())
    }

    async fn incr(&self, key: &str) -> Result<i64, BackendError> {
        as_integer(self.command(json!(["INCR", key])).await?)
    }

    async fn expire(&self, key: &str, ttl_secs: u32) -> Result<bool, BackendError> {
        Ok(as_integer(self.command(json!(["EXPIRE", key, ttl_secs])).await?)? == 1)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        match self.command(json!(["PING"])).await? {
            Value::String(s) if s.eq_ignore_ascii_case("PONG") => Ok(()),
            other => {
                warn!(reply = %other, "unexpected PING reply");
                Err(BackendError::Protocol(format!("unexpected PING reply {other}")))
            }
        }
    }
}
