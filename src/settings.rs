use crate::db::{StoreError, with_connection};
use crate::entity::app_settings;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use tracing::info;

pub const TITLE_KEY: &str = "title";
pub const DESCRIPTION_KEY: &str = "description";
pub const INSTRUCTIONS_KEY: &str = "instructions";

/// What the chat surface displays and prepends to every conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub title: String,
    pub description: String,
    pub instructions: Option<String>,
}

/// Admin-editable key/value settings.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    db_url: String,
}

impl SettingsStore {
    pub fn new(db_url: impl Into<String>) -> Self {
        Self {
            db_url: db_url.into(),
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        with_connection(&self.db_url, "settings_ensure_schema", |db| {
            db.get_schema_builder()
                .register(app_settings::Entity)
                .sync(db)?;
            Ok(())
        })
        .await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        with_connection(&self.db_url, "settings_get", move |db| {
            let row = app_settings::Entity::find_by_id(key).one(db)?;
            Ok(row.map(|r| r.value))
        })
        .await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let record = app_settings::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
        };

        with_connection(&self.db_url, "settings_set", move |db| {
            app_settings::Entity::insert(record)
                .on_conflict(
                    OnConflict::column(app_settings::Column::Key)
                        .update_column(app_settings::Column::Value)
                        .to_owned(),
                )
                .exec_without_returning(db)?;
            Ok(())
        })
        .await?;

        info!("Setting '{}' updated", key);
        Ok(())
    }

    /// Stored values, falling back to `defaults` for anything unset.
    pub async fn load(&self, defaults: &AppSettings) -> Result<AppSettings, StoreError> {
        Ok(AppSettings {
            title: self
                .get(TITLE_KEY)
                .await?
                .unwrap_or_else(|| defaults.title.clone()),
            description: self
                .get(DESCRIPTION_KEY)
                .await?
                .unwrap_or_else(|| defaults.description.clone()),
            instructions: self
                .latest_instructions()
                .await?
                .or_else(|| defaults.instructions.clone()),
        })
    }

    pub async fn update_instructions(&self, instructions: &str) -> Result<(), StoreError> {
        self.set(INSTRUCTIONS_KEY, instructions).await
    }

    /// Custom instructions, if any non-blank ones were saved.
    pub async fn latest_instructions(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .get(INSTRUCTIONS_KEY)
            .await?
            .filter(|s| !s.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite_url;

    async fn test_store() -> (SettingsStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(sqlite_url(&dir.path().join("settings.db")));
        store.ensure_schema().await.unwrap();
        (store, dir)
    }

    fn defaults() -> AppSettings {
        AppSettings {
            title: "CherGPT Basic".into(),
            description: "Teaching and learning companion".into(),
            instructions: None,
        }
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let (store, _dir) = test_store().await;
        store.set(TITLE_KEY, "Physics Helper").await.unwrap();

        store.ensure_schema().await.unwrap();
        store.ensure_schema().await.unwrap();
        assert_eq!(
            store.get(TITLE_KEY).await.unwrap().as_deref(),
            Some("Physics Helper")
        );
    }

    #[tokio::test]
    async fn unset_keys_fall_back_to_defaults() {
        let (store, _dir) = test_store().await;
        assert_eq!(store.get(TITLE_KEY).await.unwrap(), None);
        assert_eq!(store.load(&defaults()).await.unwrap(), defaults());
    }

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let (store, _dir) = test_store().await;
        store.set(TITLE_KEY, "Physics Helper").await.unwrap();
        store.set(TITLE_KEY, "Chemistry Helper").await.unwrap();

        let settings = store.load(&defaults()).await.unwrap();
        assert_eq!(settings.title, "Chemistry Helper");
        assert_eq!(settings.description, "Teaching and learning companion");
    }

    #[tokio::test]
    async fn blank_instructions_are_ignored() {
        let (store, _dir) = test_store().await;
        store.update_instructions("Answer with questions.").await.unwrap();
        assert_eq!(
            store.latest_instructions().await.unwrap().as_deref(),
            Some("Answer with questions.")
        );

        store.update_instructions("  ").await.unwrap();
        assert_eq!(store.latest_instructions().await.unwrap(), None);
    }
}
