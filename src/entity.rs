pub mod app_settings;
pub mod chat_logs;
