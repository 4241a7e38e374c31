//! Semantic filter boundary
//!
//! A chat assistant turns a free-form prompt into a [`SemanticFilterIntent`]
//! or a plain reply. The assistant sits behind a bearer credential; a
//! request without a valid one never reaches the provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::SemanticError;
use crate::state::SemanticFilterIntent;

/// Bearer token with its expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    /// Epoch milliseconds after which the token is rejected
    pub expires_at_ms: i64,
}

impl Credential {
    /// Build from a token response's `expires_in` (seconds from `now_ms`)
    pub fn from_expires_in(access_token: impl Into<String>, expires_in_secs: u64, now_ms: i64) -> Self {
        let lifetime_ms = i64::try_from(expires_in_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        Self {
            access_token: access_token.into(),
            expires_at_ms: now_ms.saturating_add(lifetime_ms),
        }
    }

    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        !self.access_token.is_empty() && now_ms < self.expires_at_ms
    }
}

/// What the assistant answered
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticReply {
    /// A filter to apply to the grid
    Filter(SemanticFilterIntent),
    /// A conversational answer with no filter
    Message(String),
}

/// External language-model service
#[async_trait]
pub trait SemanticFilterProvider: Send + Sync {
    async fn interpret(&self, prompt: &str, access_token: &str) -> Result<SemanticReply, SemanticError>;
}

/// Ask the provider to interpret `prompt`, if signed in
pub async fn request_semantic_filter(
    provider: &dyn SemanticFilterProvider,
    credential: Option<&Credential>,
    clock: &dyn Clock,
    prompt: &str,
) -> Result<SemanticReply, SemanticError> {
    let now_ms = clock.now_ms();
    let credential = match credential {
        Some(c) if c.is_valid_at(now_ms) => c,
        Some(c) => {
            tracing::info!(expired_at_ms = c.expires_at_ms, now_ms, "Credential expired");
            return Err(SemanticError::NotAuthenticated);
        }
        None => return Err(SemanticError::NotAuthenticated),
    };

    let reply = provider.interpret(prompt, &credential.access_token).await;
    match &reply {
        Ok(SemanticReply::Filter(intent)) => tracing::debug!(?intent, "Assistant returned a filter"),
        Ok(SemanticReply::Message(_)) => tracing::debug!("Assistant replied without a filter"),
        Err(err) => tracing::warn!(error = %err, "Semantic filter request failed"),
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const NOW_MS: i64 = 1_700_000_000_000;

    #[derive(Default)]
    struct FakeAssistant {
        calls: AtomicUsize,
        tokens: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SemanticFilterProvider for FakeAssistant {
        async fn interpret(&self, prompt: &str, access_token: &str) -> Result<SemanticReply, SemanticError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tokens.lock().unwrap().push(access_token.to_string());
            if prompt.contains("electric") {
                Ok(SemanticReply::Filter(SemanticFilterIntent {
                    matching_names: Some(vec!["pikachu".into(), "raichu".into()]),
                    types: Some(vec!["electric".into()]),
                    ..Default::default()
                }))
            } else if prompt.is_empty() {
                Err(SemanticError::Provider("empty prompt".into()))
            } else {
                Ok(SemanticReply::Message("Try asking about a type.".into()))
            }
        }
    }

    #[test]
    fn test_credential_expiry() {
        let credential = Credential::from_expires_in("tok", 3600, NOW_MS);
        assert_eq!(credential.expires_at_ms, NOW_MS + 3_600_000);
        assert!(credential.is_valid_at(NOW_MS));
        assert!(credential.is_valid_at(NOW_MS + 3_599_999));
        assert!(!credential.is_valid_at(NOW_MS + 3_600_000));
        assert!(!Credential::from_expires_in("", 3600, NOW_MS).is_valid_at(NOW_MS));
    }

    #[tokio::test]
    async fn test_request_without_credential_skips_provider() {
        let assistant = FakeAssistant::default();
        let clock = ManualClock::at_ms(NOW_MS);

        let err = request_semantic_filter(&assistant, None, &clock, "electric mice")
            .await
            .unwrap_err();
        assert_eq!(err, SemanticError::NotAuthenticated);
        assert_eq!(assistant.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_credential_skips_provider() {
        let assistant = FakeAssistant::default();
        let clock = ManualClock::at_ms(NOW_MS);
        let credential = Credential::from_expires_in("tok", 60, NOW_MS);

        clock.advance(Duration::from_secs(61));
        let err = request_semantic_filter(&assistant, Some(&credential), &clock, "electric mice")
            .await
            .unwrap_err();
        assert_eq!(err, SemanticError::NotAuthenticated);
        assert_eq!(assistant.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_credential_reaches_provider() {
        let assistant = FakeAssistant::default();
        let clock = ManualClock::at_ms(NOW_MS);
        let credential = Credential::from_expires_in("tok-123", 60, NOW_MS);

        let reply = request_semantic_filter(&assistant, Some(&credential), &clock, "electric mice")
            .await
            .unwrap();
        match reply {
            SemanticReply::Filter(intent) => {
                assert_eq!(intent.matching_names.unwrap(), vec!["pikachu", "raichu"]);
            }
            other => panic!("expected a filter, got {:?}", other),
        }

        let reply = request_semantic_filter(&assistant, Some(&credential), &clock, "hello")
            .await
            .unwrap();
        assert!(matches!(reply, SemanticReply::Message(_)));

        let err = request_semantic_filter(&assistant, Some(&credential), &clock, "")
            .await
            .unwrap_err();
        assert!(matches!(err, SemanticError::Provider(_)));

        assert_eq!(*assistant.tokens.lock().unwrap(), vec!["tok-123"; 3]);
    }

    #[test]
    fn test_intent_accepts_provider_wire_names() {
        let intent: SemanticFilterIntent = serde_json::from_str(
            r#"{"matching_pokemon_names":["pikachu"],"nameContains":"chu","minStat":400,"generation":1}"#,
        )
        .unwrap();
        assert_eq!(intent.matching_names, Some(vec!["pikachu".to_string()]));
        assert_eq!(intent.name_contains.as_deref(), Some("chu"));
        assert_eq!(intent.min_stat, Some(400.0));
        assert_eq!(intent.generation, Some(1.0));
    }
}
