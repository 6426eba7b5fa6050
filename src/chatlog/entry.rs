use crate::db::StoreError;
use crate::entity::chat_logs;
use chrono::{DateTime, SubsecRound, Utc};
use chrono_tz::Tz;
use tracing::warn;
use uuid::Uuid;

/// One persisted prompt/response turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatLogEntry {
    pub id: i64,
    pub timestamp: DateTime<Tz>,
    pub prompt: String,
    pub response: String,
    pub conversation_id: Uuid,
}

impl ChatLogEntry {
    pub(crate) fn from_model(model: chat_logs::Model, timezone: Tz) -> Result<Self, StoreError> {
        let timestamp = DateTime::<Utc>::from_timestamp_micros(model.timestamp)
            .ok_or_else(|| StoreError::CorruptRow {
                id: model.id,
                reason: format!("timestamp out of range: {}", model.timestamp),
            })?
            .with_timezone(&timezone);

        let conversation_id =
            Uuid::parse_str(&model.conversation_id).map_err(|e| StoreError::CorruptRow {
                id: model.id,
                reason: format!("conversation_id '{}': {}", model.conversation_id, e),
            })?;

        Ok(Self {
            id: model.id,
            timestamp,
            prompt: model.prompt,
            response: model.response,
            conversation_id,
        })
    }

    pub fn format_timestamp(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S%:z").to_string()
    }

    pub fn format_for_context(&self) -> String {
        format!("User: {}\nAssistant: {}", self.prompt, self.response)
    }
}

/// Returns the parsed identifier, or a fresh v4 one when `raw` is absent,
/// blank or not a UUID.
pub fn resolve_conversation_id(raw: Option<&str>) -> Uuid {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Uuid::new_v4(),
        Some(s) => Uuid::parse_str(s).unwrap_or_else(|e| {
            warn!("Invalid conversation_id format '{}': {}", s, e);
            Uuid::new_v4()
        }),
    }
}

/// Current time at the precision the store keeps.
pub(crate) fn now_in(timezone: Tz) -> DateTime<Tz> {
    Utc::now().trunc_subsecs(6).with_timezone(&timezone)
}
