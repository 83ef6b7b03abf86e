//! Extraction session: drives the reasoning engine over collected context.
//!
//! The engine is probabilistic and untrusted. Its output is parsed
//! defensively (code fences stripped, outermost object sliced out, tolerant
//! serde), items failing shape validation are dropped with a warning, and a
//! single re-prompt is attempted when the whole reply is unusable. Pipeline
//! idempotence never depends on the engine being deterministic — that is the
//! collector's and reconciler's job.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::collect::{event_to_record, ContextBundle};
use crate::error::AgentError;
use crate::rules::RETRY_NUDGE;
use crate::types::ActionItem;

/// The pluggable classifier. Accepts the rule set (system prompt) plus the
/// serialized context, returns free-form output expected to contain a JSON
/// action-item list.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn complete(&self, system_prompt: &str, input: &str) -> Result<String, AgentError>;
}

// ============================================================================
// CLI-backed engine
// ============================================================================

/// Spawns the `claude` CLI in one-shot print mode with a timeout.
pub struct CliEngine {
    command: String,
    timeout_secs: u64,
}

impl CliEngine {
    pub fn new(command: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl ReasoningEngine for CliEngine {
    async fn complete(&self, system_prompt: &str, input: &str) -> Result<String, AgentError> {
        let prompt = format!("{}\n\nCONTEXT:\n{}", system_prompt, input);

        let child = Command::new(&self.command)
            .arg("--print")
            .arg(&prompt)
            .kill_on_drop(true)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AgentError::EngineNotFound(self.command.clone())
                } else {
                    AgentError::Io(e)
                }
            })?;

        let output = timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| AgentError::Timeout(self.timeout_secs))??;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        // The CLI surfaces auth/limit problems in its output rather than
        // the exit code; classify the known patterns.
        let lowered = stdout.to_lowercase();
        if lowered.contains("not authenticated") || lowered.contains("please login") {
            return Err(AgentError::EngineFailed("engine not authenticated".into()));
        }
        if lowered.contains("rate limit") || lowered.contains("too many requests") {
            return Err(AgentError::RateLimit);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgentError::EngineFailed(format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(stdout)
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractionResponse {
    #[serde(default)]
    action_items: Vec<serde_json::Value>,
}

/// What the session produced, and whether the batch was consumed.
///
/// A deferred batch (transient engine failure) must NOT be marked
/// processed — the same records are retried next run. A batch given up
/// after the bounded retry IS consumed: reprocessing it would produce the
/// same malformed output.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub items: Vec<ActionItem>,
    pub deferred: bool,
}

/// Run one extraction session over the bundle.
///
/// Transient engine failures (timeout, rate limit) defer the batch with a
/// warning. Only fatal engine errors propagate.
pub async fn extract_action_items(
    engine: &dyn ReasoningEngine,
    rules: &str,
    bundle: &ContextBundle,
) -> Result<ExtractionOutcome, AgentError> {
    let input = serialize_context(bundle)?;

    let reply = match engine.complete(rules, &input).await {
        Ok(reply) => reply,
        Err(e) if e.is_transient() => {
            log::warn!("Extraction call failed ({}); deferring batch to next run", e);
            return Ok(ExtractionOutcome {
                items: Vec::new(),
                deferred: true,
            });
        }
        Err(e) => return Err(e),
    };

    match parse_reply(&reply) {
        Ok(items) => Ok(ExtractionOutcome {
            items,
            deferred: false,
        }),
        Err(first_err) => {
            // Bounded retry: one re-prompt, then give up on this batch.
            log::warn!("Malformed engine output ({}); re-prompting once", first_err);
            let nudged = format!("{}\n\n{}", rules, RETRY_NUDGE);
            let retry_reply = match engine.complete(&nudged, &input).await {
                Ok(reply) => reply,
                Err(e) if e.is_transient() => {
                    log::warn!("Retry call failed ({}); deferring batch", e);
                    return Ok(ExtractionOutcome {
                        items: Vec::new(),
                        deferred: true,
                    });
                }
                Err(e) => return Err(e),
            };
            match parse_reply(&retry_reply) {
                Ok(items) => Ok(ExtractionOutcome {
                    items,
                    deferred: false,
                }),
                Err(e) => {
                    log::warn!("Retry output still malformed ({}); dropping batch", e);
                    Ok(ExtractionOutcome {
                        items: Vec::new(),
                        deferred: false,
                    })
                }
            }
        }
    }
}

/// Serialize the bundle into the JSON payload the rules describe.
fn serialize_context(bundle: &ContextBundle) -> Result<String, AgentError> {
    let secondary: Vec<_> = bundle.secondary_events.iter().map(event_to_record).collect();
    let payload = serde_json::json!({
        "records": bundle.candidates,
        "secondaryEvents": secondary,
        "upcomingEvents": bundle.calendar,
    });
    Ok(serde_json::to_string_pretty(&payload)?)
}

/// Parse a reply into validated action items.
///
/// Per-item shape failures are warnings, not errors; only a reply with no
/// parseable object at all is an error (triggering the bounded retry).
fn parse_reply(reply: &str) -> Result<Vec<ActionItem>, AgentError> {
    let json_text = extract_json(reply)
        .ok_or_else(|| AgentError::MalformedOutput("no JSON object found".into()))?;

    let response: ExtractionResponse = serde_json::from_str(&json_text)
        .map_err(|e| AgentError::MalformedOutput(e.to_string()))?;

    let mut items = Vec::new();
    for raw in response.action_items {
        match serde_json::from_value::<ActionItem>(raw.clone()) {
            Ok(item) if item.source_ref.trim().is_empty() => {
                log::warn!("Dropping item without source reference: {:?}", item.title);
            }
            Ok(item) if item.title.trim().is_empty() => {
                log::warn!("Dropping item without title: {}", item.source_ref);
            }
            Ok(item) => items.push(item),
            Err(e) => {
                log::warn!("Dropping unparseable action item ({}): {}", e, raw);
            }
        }
    }
    Ok(items)
}

/// Extract a JSON object from text that may wrap it in markdown fences.
fn extract_json(text: &str) -> Option<String> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        return Some(text[start..=end].to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordKind, SourceRecord};
    use std::sync::Mutex;

    struct ScriptedEngine {
        replies: Mutex<Vec<Result<String, AgentError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedEngine {
        fn new(replies: Vec<Result<String, AgentError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(0),
            }
        }
        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ReasoningEngine for ScriptedEngine {
        async fn complete(&self, _s: &str, _i: &str) -> Result<String, AgentError> {
            *self.calls.lock().unwrap() += 1;
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn bundle_with_one_record() -> ContextBundle {
        ContextBundle {
            candidates: vec![SourceRecord {
                source_ref: "msg-1".into(),
                kind: RecordKind::Inbox,
                sender: "boss@corp.com".into(),
                subject: "Budget".into(),
                received_at: String::new(),
                body: "Please review by Friday".into(),
            }],
            calendar: Vec::new(),
            secondary_events: Vec::new(),
        }
    }

    const VALID_REPLY: &str = r#"{
        "actionItems": [
            {"sourceRef": "msg-1", "title": "Review budget", "priority": "HIGH", "category": "email"}
        ]
    }"#;

    #[test]
    fn test_extract_json_from_fences() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(extract_json(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_from_bare_braces() {
        let text = "Sure! {\"a\": 1} hope that helps";
        assert_eq!(extract_json(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_none() {
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn test_parse_reply_drops_invalid_items() {
        let reply = r#"{
            "actionItems": [
                {"sourceRef": "msg-1", "title": "Good item", "priority": "HIGH", "category": "email"},
                {"sourceRef": "", "title": "No ref", "priority": "LOW", "category": "email"},
                {"sourceRef": "msg-3", "title": "", "priority": "LOW", "category": "email"},
                {"bogus": true}
            ]
        }"#;
        let items = parse_reply(reply).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Good item");
    }

    #[tokio::test]
    async fn test_valid_first_reply() {
        let engine = ScriptedEngine::new(vec![Ok(VALID_REPLY.to_string())]);
        let outcome = extract_action_items(&engine, "rules", &bundle_with_one_record())
            .await
            .unwrap();
        assert_eq!(outcome.items.len(), 1);
        assert!(!outcome.deferred);
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_bounded_retry_recovers() {
        let engine = ScriptedEngine::new(vec![
            Ok("sorry, I can't produce JSON right now".to_string()),
            Ok(VALID_REPLY.to_string()),
        ]);
        let outcome = extract_action_items(&engine, "rules", &bundle_with_one_record())
            .await
            .unwrap();
        assert_eq!(outcome.items.len(), 1);
        assert_eq!(engine.call_count(), 2);
    }

    #[tokio::test]
    async fn test_bounded_retry_gives_up() {
        let engine = ScriptedEngine::new(vec![
            Ok("garbage".to_string()),
            Ok("still garbage".to_string()),
        ]);
        let outcome = extract_action_items(&engine, "rules", &bundle_with_one_record())
            .await
            .unwrap();
        assert!(outcome.items.is_empty());
        // Given up, not deferred: the batch is consumed.
        assert!(!outcome.deferred);
        // Exactly two calls — never a third.
        assert_eq!(engine.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transient_engine_failure_defers_batch() {
        let engine = ScriptedEngine::new(vec![Err(AgentError::Timeout(300))]);
        let outcome = extract_action_items(&engine, "rules", &bundle_with_one_record())
            .await
            .unwrap();
        assert!(outcome.items.is_empty());
        assert!(outcome.deferred);
    }

    #[tokio::test]
    async fn test_fatal_engine_failure_propagates() {
        let engine = ScriptedEngine::new(vec![Err(AgentError::EngineNotFound("claude".into()))]);
        let result = extract_action_items(&engine, "rules", &bundle_with_one_record()).await;
        assert!(result.is_err());
    }
}
