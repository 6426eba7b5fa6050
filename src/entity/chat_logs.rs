use sea_orm::entity::prelude::*;

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "chat_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Microseconds since the Unix epoch.
    pub timestamp: i64,
    pub prompt: String,
    pub response: String,
    /// Hyphenated UUID.
    pub conversation_id: String,
}

impl ActiveModelBehavior for ActiveModel {}
