//! Maps hook events onto store writes

use promptvault_core::models::NewMessage;
use promptvault_core::store::ConversationRecord;
use promptvault_core::Store;

use crate::error::IngestError;
use crate::event::{EventKind, HookEvent};

/// What happened to one accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A conversation was opened or a message appended.
    Stored { conversation_id: i64 },
    /// Recognised, but nothing to write.
    Acknowledged,
    /// Unrecognised event name.
    Skipped,
}

#[derive(Clone)]
pub struct Ingester {
    store: Store,
}

impl Ingester {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn ingest(&self, event: &HookEvent) -> Result<Outcome, IngestError> {
        let session_id = event.session_id()?;

        match event.kind() {
            EventKind::SessionStart => {
                let conversation = self.conversation_for(session_id, event).await?;
                Ok(Outcome::Stored {
                    conversation_id: conversation.id,
                })
            }
            EventKind::Prompt => {
                let content = event.required_str("prompt")?;
                let conversation = self.conversation_for(session_id, event).await?;
                let message = NewMessage {
                    timestamp: event.occurred_at(),
                    ..NewMessage::prompt(content)
                };
                self.store.append_message(conversation.id, message).await?;
                Ok(Outcome::Stored {
                    conversation_id: conversation.id,
                })
            }
            EventKind::Response => {
                let content = event.required_str("response")?;
                let conversation = self.conversation_for(session_id, event).await?;
                let message = NewMessage {
                    timestamp: event.occurred_at(),
                    tool_calls: event.tool_calls(),
                    execution_time: event.execution_time(),
                    ..NewMessage::response(content)
                };
                self.store.append_message(conversation.id, message).await?;
                Ok(Outcome::Stored {
                    conversation_id: conversation.id,
                })
            }
            EventKind::SessionEnd => {
                let existing = self
                    .store
                    .find_latest_conversation_by_session(session_id)
                    .await?;
                tracing::debug!(
                    session_id,
                    conversation_id = existing.map(|c| c.id),
                    "Session ended"
                );
                Ok(Outcome::Acknowledged)
            }
            EventKind::Unknown(name) => {
                tracing::warn!(event = %name, session_id, "Skipping unknown hook event");
                Ok(Outcome::Skipped)
            }
        }
    }

    /// Latest conversation for the session, opening one if none exists yet.
    async fn conversation_for(
        &self,
        session_id: &str,
        event: &HookEvent,
    ) -> Result<ConversationRecord, IngestError> {
        if let Some(existing) = self
            .store
            .find_latest_conversation_by_session(session_id)
            .await?
        {
            return Ok(existing);
        }

        let record = self
            .store
            .create_conversation(
                session_id,
                None,
                event.data_str("cwd"),
                event.data_str("transcript_path"),
            )
            .await?;
        tracing::info!(conversation_id = record.id, session_id, "Opened conversation");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIGRATIONS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../migrations");

    async fn ingester() -> Ingester {
        Ingester::new(Store::open_in_memory(MIGRATIONS_DIR).await.unwrap())
    }

    fn event(line: &str) -> HookEvent {
        HookEvent::from_line(line).unwrap()
    }

    #[tokio::test]
    async fn test_session_start_is_idempotent() {
        let ingester = ingester().await;
        let start = event(
            r#"{"event":"SessionStart","session_id":"s-1","data":{"cwd":"/work","transcript_path":"/t.jsonl"}}"#,
        );

        let first = ingester.ingest(&start).await.unwrap();
        let second = ingester.ingest(&start).await.unwrap();
        assert_eq!(first, second);

        let Outcome::Stored { conversation_id } = first else {
            panic!("expected a stored outcome");
        };
        let c = ingester.store().get_conversation(conversation_id).await.unwrap();
        assert_eq!(c.working_directory.as_deref(), Some("/work"));
        assert_eq!(c.transcript_path.as_deref(), Some("/t.jsonl"));
        assert_eq!(ingester.store().count_conversations().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prompt_and_response_append_messages() {
        let ingester = ingester().await;
        ingester
            .ingest(&event(
                r#"{"event":"UserPromptSubmit","session_id":"s-2","timestamp":"2024-05-01T10:00:00Z","data":{"prompt":"fix the bug"}}"#,
            ))
            .await
            .unwrap();
        let outcome = ingester
            .ingest(&event(
                r#"{"event":"PostToolUse","session_id":"s-2","timestamp":"2024-05-01T10:00:05Z","data":{"response":"done","tool_calls":[{"name":"Edit","arguments":{}}],"execution_time":2300}}"#,
            ))
            .await
            .unwrap();

        let Outcome::Stored { conversation_id } = outcome else {
            panic!("expected a stored outcome");
        };
        let messages = ingester.store().list_messages(conversation_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "fix the bug");
        assert_eq!(messages[1].execution_time, Some(2300));
        assert!(messages[1].tool_calls.is_some());

        let c = ingester.store().get_conversation(conversation_id).await.unwrap();
        assert_eq!(c.prompt_count, 1);
        assert_eq!(c.total_characters, 15);
    }

    #[tokio::test]
    async fn test_rejections_and_skips() {
        let ingester = ingester().await;

        let err = ingester
            .ingest(&event(r#"{"event":"UserPromptSubmit","data":{"prompt":"x"}}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingSessionId));

        let err = ingester
            .ingest(&event(r#"{"event":"UserPromptSubmit","session_id":"s","data":{}}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingField { field: "prompt", .. }));

        let outcome = ingester
            .ingest(&event(r#"{"event":"Notification","session_id":"s"}"#))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);

        let outcome = ingester
            .ingest(&event(r#"{"event":"Stop","session_id":"s"}"#))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Acknowledged);

        // None of the above opened a conversation
        assert_eq!(ingester.store().count_conversations().await.unwrap(), 0);
    }
}
