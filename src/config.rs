use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;

const DEFAULT_TIMEZONE: &str = "Asia/Singapore";
const DEFAULT_TITLE: &str = "CherGPT Basic";
const DEFAULT_DESCRIPTION: &str = "Teaching and learning companion";
const DEFAULT_CHAT_MAX_TOKENS: u64 = 1024;
const DEFAULT_SUMMARY_MAX_TOKENS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    api: ApiConfig,
    database: DatabaseConfig,
    #[serde(default)]
    summary: SummaryConfig,
    #[serde(default)]
    app: AppConfig,
    #[serde(default)]
    admin: AdminConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiConfig {
    provider: String,
    key: String,
    url: String,
    model: String,
    max_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SummaryConfig {
    model: Option<String>,
    max_tokens: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseConfig {
    url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AppConfig {
    timezone: Option<String>,
    title: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AdminConfig {
    password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_provider: String,
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u64,
    pub summary_model: String,
    pub summary_max_tokens: u64,
    pub database_url: String,
    pub timezone: Tz,
    pub title: String,
    pub description: String,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config_file: ConfigFile =
            toml::from_str(content).context("Failed to parse config file")?;

        let timezone_name = config_file
            .app
            .timezone
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", timezone_name, e))?;

        Ok(Self {
            api_provider: config_file.api.provider,
            api_key: config_file.api.key,
            api_url: config_file.api.url,
            summary_model: config_file
                .summary
                .model
                .unwrap_or_else(|| config_file.api.model.clone()),
            model: config_file.api.model,
            max_tokens: config_file.api.max_tokens.unwrap_or(DEFAULT_CHAT_MAX_TOKENS),
            summary_max_tokens: config_file
                .summary
                .max_tokens
                .unwrap_or(DEFAULT_SUMMARY_MAX_TOKENS),
            database_url: config_file.database.url,
            timezone,
            title: config_file
                .app
                .title
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: config_file
                .app
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            admin_password: config_file.admin.password,
        })
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::from_toml(&content)
    }
}
