use super::entry::now_in;
use super::{ChatLogEntry, encode_csv, resolve_conversation_id};
use crate::db::{StoreError, with_connection};
use crate::entity::chat_logs;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sea_orm::*;
use tracing::{info, warn};

/// Persistence for chat turns. Every call opens and drops its own connection.
#[derive(Debug, Clone)]
pub struct LogStore {
    db_url: String,
    timezone: Tz,
}

impl LogStore {
    pub fn new(db_url: impl Into<String>, timezone: Tz) -> Self {
        Self {
            db_url: db_url.into(),
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        with_connection(&self.db_url, "ensure_schema", |db| {
            db.get_schema_builder()
                .register(chat_logs::Entity)
                .sync(db)?;
            info!("Chat log table ready");
            Ok(())
        })
        .await
    }

    pub async fn drop_schema(&self) -> Result<(), StoreError> {
        with_connection(&self.db_url, "drop_schema", |db| {
            db.execute_unprepared("DROP TABLE IF EXISTS chat_logs")?;
            info!("Chat log table dropped");
            Ok(())
        })
        .await
    }

    /// Persists one turn. A missing or malformed `conversation_id` is
    /// replaced with a fresh identifier.
    pub async fn insert(
        &self,
        prompt: &str,
        response: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatLogEntry, StoreError> {
        let conversation_id = resolve_conversation_id(conversation_id);
        let timestamp = now_in(self.timezone);

        let record = chat_logs::ActiveModel {
            id: NotSet,
            timestamp: Set(timestamp.timestamp_micros()),
            prompt: Set(prompt.to_string()),
            response: Set(response.to_string()),
            conversation_id: Set(conversation_id.to_string()),
        };

        let id = with_connection(&self.db_url, "insert", move |db| {
            let result = chat_logs::Entity::insert(record).exec(db)?;
            Ok(result.last_insert_id)
        })
        .await?;

        info!("Chat log {} inserted for conversation {}", id, conversation_id);
        Ok(ChatLogEntry {
            id,
            timestamp,
            prompt: prompt.to_string(),
            response: response.to_string(),
            conversation_id,
        })
    }

    pub async fn fetch_all(&self) -> Result<Vec<ChatLogEntry>, StoreError> {
        let timezone = self.timezone;
        let entries = with_connection(&self.db_url, "fetch_all", move |db| {
            let rows = chat_logs::Entity::find()
                .order_by_asc(chat_logs::Column::Id)
                .all(db)?;
            Ok(decode_rows(rows, timezone))
        })
        .await?;

        info!("Fetched {} chat log records", entries.len());
        Ok(entries)
    }

    /// Rows stamped within `window` of now. Oversized windows are clamped to
    /// the Unix epoch.
    pub async fn fetch_recent(
        &self,
        window: chrono::Duration,
    ) -> Result<Vec<ChatLogEntry>, StoreError> {
        let timezone = self.timezone;
        // Windows reaching past the representable range cover every row.
        let cutoff = Utc::now()
            .checked_sub_signed(window)
            .filter(|c| *c > DateTime::<Utc>::UNIX_EPOCH)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        info!("Fetching logs from {}", cutoff.with_timezone(&timezone));

        let entries = with_connection(&self.db_url, "fetch_recent", move |db| {
            let rows = chat_logs::Entity::find()
                .filter(chat_logs::Column::Timestamp.gte(cutoff.timestamp_micros()))
                .order_by_asc(chat_logs::Column::Id)
                .all(db)?;
            Ok(decode_rows(rows, timezone))
        })
        .await?;

        info!("Fetched {} recent chat log records", entries.len());
        Ok(entries)
    }

    pub async fn delete_all(&self) -> Result<u64, StoreError> {
        let affected = with_connection(&self.db_url, "delete_all", |db| {
            let result = chat_logs::Entity::delete_many().exec(db)?;
            Ok(result.rows_affected)
        })
        .await?;

        info!("Deleted {} chat logs", affected);
        Ok(affected)
    }

    pub async fn export_csv(&self) -> Result<Vec<u8>, StoreError> {
        let entries = self.fetch_all().await?;
        if entries.is_empty() {
            info!("No chat logs to export");
        }
        Ok(encode_csv(&entries)?)
    }
}

/// Converts rows, skipping any that cannot be read back.
fn decode_rows(rows: Vec<chat_logs::Model>, timezone: Tz) -> Vec<ChatLogEntry> {
    rows.into_iter()
        .filter_map(|r| match ChatLogEntry::from_model(r, timezone) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping chat log: {}", e);
                None
            }
        })
        .collect()
}
