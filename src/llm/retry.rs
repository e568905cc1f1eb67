//! Exponential backoff around an unreliable model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatMessage, ModelError, ModelProvider};

fn default_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffConfig {
    /// Delay to wait before `attempt` (1-based); the first attempt starts immediately
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt < 2 {
            return None;
        }
        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let ms = (self.initial_delay_ms as f64 * self.multiplier.powi(exponent))
            .min(self.max_delay_ms as f64)
            .max(0.0);
        Some(Duration::from_millis(ms as u64))
    }
}

/// Calls a [`ModelProvider`] until a response parses or attempts run out
#[derive(Clone)]
pub struct RetryableModelCaller {
    provider: Arc<dyn ModelProvider>,
    backoff: BackoffConfig,
    attempt_timeout: Option<Duration>,
}

impl RetryableModelCaller {
    pub fn new(provider: Arc<dyn ModelProvider>, backoff: BackoffConfig) -> Self {
        Self {
            provider,
            backoff,
            attempt_timeout: None,
        }
    }

    /// Bound each individual attempt; an expired attempt counts as a transport failure
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// Run the model, feeding each raw response through `parse`
    ///
    /// Transport errors, unparseable output and `parse` rejections all consume
    /// an attempt. Returns [`ModelError::Exhausted`] once every attempt failed.
    pub async fn call<T, F>(
        &self,
        messages: &[ChatMessage],
        schema: &Value,
        parse: F,
    ) -> Result<T, ModelError>
    where
        F: Fn(Value) -> Result<T, ModelError>,
    {
        let attempts = self.backoff.attempts.max(1);
        let mut last_error: Option<ModelError> = None;

        for attempt in 1..=attempts {
            if let Some(delay) = self.backoff.delay_before(attempt) {
                debug!("Waiting {:?} before model attempt {}", delay, attempt);
                tokio::time::sleep(delay).await;
            }

            let response = match self.attempt_timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.provider.complete(messages, schema)).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(ModelError::Transport(format!(
                            "attempt timed out after {}s",
                            limit.as_secs()
                        ))),
                    }
                }
                None => self.provider.complete(messages, schema).await,
            };

            match response.and_then(&parse) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => {
                    warn!("Model attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }
        }

        Err(ModelError::Exhausted {
            attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt was made".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use serde_json::json;
    use tokio::time::Instant;

    fn accept(value: Value) -> Result<Value, ModelError> {
        Ok(value)
    }

    #[test]
    fn test_delays_grow_and_cap() {
        let backoff = BackoffConfig::default();
        let delays: Vec<u64> = (1..=6)
            .map(|k| backoff.delay_before(k).map_or(0, |d| d.as_millis() as u64))
            .collect();
        assert_eq!(delays, vec![0, 1000, 2000, 4000, 8000, 10_000]);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_configured_attempts() {
        let model = Arc::new(ScriptedModel::failing());
        let caller = RetryableModelCaller::new(model.clone(), BackoffConfig::default());

        let start = Instant::now();
        let err = caller
            .call(&[ChatMessage::user("hi")], &json!({}), accept)
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::Exhausted { attempts: 5, .. }));
        assert_eq!(model.calls(), 5);
        // 1s + 2s + 4s + 8s of backoff between the five attempts
        assert!(start.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(ModelError::Transport("connection reset".into())),
            Ok(json!({"ok": true})),
        ]));
        let caller = RetryableModelCaller::new(model.clone(), BackoffConfig::default());

        let value = caller
            .call(&[ChatMessage::user("hi")], &json!({}), accept)
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_rejection_consumes_an_attempt() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(json!({"ok": false})),
            Ok(json!({"ok": true})),
        ]));
        let caller = RetryableModelCaller::new(model.clone(), BackoffConfig::default());

        let value = caller
            .call(&[], &json!({}), |v| {
                if v["ok"] == true {
                    Ok(v)
                } else {
                    Err(ModelError::SchemaValidation("not ok".into()))
                }
            })
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(json!({}))]).with_latency(Duration::from_secs(60)));
        let caller = RetryableModelCaller::new(
            model,
            BackoffConfig {
                attempts: 1,
                ..BackoffConfig::default()
            },
        )
        .with_attempt_timeout(Duration::from_secs(5));

        let err = caller.call(&[], &json!({}), accept).await.unwrap_err();
        match err {
            ModelError::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 1);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
