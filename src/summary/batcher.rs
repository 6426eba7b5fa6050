use crate::agent::Agent;
use crate::chatlog::{ChatLogEntry, LogStore};
use crate::db::StoreError;
use std::collections::HashMap;
use std::fmt::Write;
use tracing::{info, warn};

const SUMMARY_PREAMBLE: &str = "Summarize the following conversation.";

/// All turns of one conversation, in the order they were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationBatch {
    pub conversation_id: String,
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub summary: String,
}

/// Groups `prompt + " " + response` per conversation. Groups appear in
/// first-encounter order.
pub fn batch_entries(entries: &[ChatLogEntry]) -> Vec<ConversationBatch> {
    let mut batches: Vec<ConversationBatch> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let conversation_id = entry.conversation_id.to_string();
        let text = format!("{} {}", entry.prompt, entry.response);

        match index.get(&conversation_id) {
            Some(&i) => batches[i].texts.push(text),
            None => {
                index.insert(conversation_id.clone(), batches.len());
                batches.push(ConversationBatch {
                    conversation_id,
                    texts: vec![text],
                });
            }
        }
    }

    batches
}

pub async fn batch_by_conversation(
    store: &LogStore,
) -> Result<Vec<ConversationBatch>, StoreError> {
    let entries = store.fetch_all().await?;
    Ok(batch_entries(&entries))
}

/// One summary per batch. A failed call yields the failure text as that
/// batch's summary.
pub async fn summarize(batches: &[ConversationBatch], agent: &dyn Agent) -> Vec<ConversationSummary> {
    let mut summaries = Vec::with_capacity(batches.len());

    for batch in batches {
        let combined = batch.texts.join("\n");
        let summary = match agent.complete(SUMMARY_PREAMBLE, &combined).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summary failed for conversation {}: {}", batch.conversation_id, e);
                format!("Failed to generate summary: {}", e)
            }
        };
        summaries.push(ConversationSummary {
            conversation_id: batch.conversation_id.clone(),
            summary,
        });
    }

    info!("Summarized {} conversations", summaries.len());
    summaries
}

pub fn compile(summaries: &[ConversationSummary]) -> String {
    let mut output = String::from("Top-level summary:\n");
    for (idx, s) in summaries.iter().enumerate() {
        let _ = write!(
            output,
            "\nGroup {} summary (UUID {}):\n{}\n",
            idx + 1,
            s.conversation_id,
            s.summary
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedAgent;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(id: i64, conversation_id: Uuid, prompt: &str, response: &str) -> ChatLogEntry {
        ChatLogEntry {
            id,
            timestamp: Utc::now().with_timezone(&chrono_tz::UTC),
            prompt: prompt.to_string(),
            response: response.to_string(),
            conversation_id,
        }
    }

    fn batch(conversation_id: &str, texts: &[&str]) -> ConversationBatch {
        ConversationBatch {
            conversation_id: conversation_id.to_string(),
            texts: texts.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn one_conversation_yields_one_group() {
        let id = Uuid::new_v4();
        let entries: Vec<_> = (0..5)
            .map(|i| entry(i, id, &format!("q{}", i), &format!("a{}", i)))
            .collect();

        let batches = batch_entries(&entries);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].conversation_id, id.to_string());
        assert_eq!(batches[0].texts, vec!["q0 a0", "q1 a1", "q2 a2", "q3 a3", "q4 a4"]);
    }

    #[test]
    fn groups_keep_first_encounter_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let entries = vec![
            entry(1, b, "b1", "x"),
            entry(2, a, "a1", "y"),
            entry(3, b, "b2", "z"),
        ];

        let batches = batch_entries(&entries);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].conversation_id, b.to_string());
        assert_eq!(batches[0].texts, vec!["b1 x", "b2 z"]);
        assert_eq!(batches[1].conversation_id, a.to_string());
    }

    #[test]
    fn no_entries_no_groups() {
        assert!(batch_entries(&[]).is_empty());
    }

    #[tokio::test]
    async fn summarize_sends_newline_joined_text() {
        let agent = ScriptedAgent::replying("A greeting.");
        let summaries = summarize(&[batch("conv-1", &["hello world", "bye now"])], &agent).await;

        assert_eq!(
            summaries,
            vec![ConversationSummary {
                conversation_id: "conv-1".into(),
                summary: "A greeting.".into(),
            }]
        );
        let calls = agent.calls.lock().unwrap();
        assert_eq!(calls[0].0, SUMMARY_PREAMBLE);
        assert_eq!(calls[0].1, "hello world\nbye now");
    }

    #[tokio::test]
    async fn failed_call_becomes_summary_text() {
        let agent = ScriptedAgent::failing("rate limited");
        let summaries = summarize(&[batch("conv-1", &["hello world"])], &agent).await;

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].conversation_id, "conv-1");
        assert!(summaries[0].summary.starts_with("Failed to generate summary"));
        assert!(summaries[0].summary.contains("rate limited"));
    }

    #[test]
    fn compile_lists_groups_in_order() {
        let report = compile(&[
            ConversationSummary {
                conversation_id: "conv-1".into(),
                summary: "ok".into(),
            },
            ConversationSummary {
                conversation_id: "conv-2".into(),
                summary: "fine".into(),
            },
        ]);

        assert_eq!(
            report,
            "Top-level summary:\n\
             \nGroup 1 summary (UUID conv-1):\nok\n\
             \nGroup 2 summary (UUID conv-2):\nfine\n"
        );
    }

    #[test]
    fn compile_of_nothing_is_just_the_heading() {
        assert_eq!(compile(&[]), "Top-level summary:\n");
    }

    #[tokio::test]
    async fn batches_come_from_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::new(
            crate::db::sqlite_url(&dir.path().join("chat.db")),
            chrono_tz::UTC,
        );
        store.ensure_schema().await.unwrap();

        let id = "6a1d0c4b-2f3e-4a5b-8c7d-9e0f1a2b3c4d";
        for i in 0..3 {
            store
                .insert(&format!("q{}", i), &format!("a{}", i), Some(id))
                .await
                .unwrap();
        }

        let batches = batch_by_conversation(&store).await.unwrap();
        assert_eq!(batches, vec![batch(id, &["q0 a0", "q1 a1", "q2 a2"])]);
    }
}
