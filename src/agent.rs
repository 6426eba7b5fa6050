use crate::config::Config;
use anyhow::Result;
use async_trait::async_trait;
pub use preamble::build_preamble;
use rig::providers::{anthropic, gemini, openai};
use rig_agent::RigAgent;
use std::sync::Arc;
use tokio::sync::mpsc;

mod preamble;
mod rig_agent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    Done,
    Error(String),
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// Streams a reply, forwarding each text delta to `tx`, and returns the
    /// full text once the stream ends.
    async fn process_streaming(
        &self,
        preamble: &str,
        prompt: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<String>;

    /// Single non-streamed completion on the summary model.
    async fn complete(&self, preamble: &str, prompt: &str) -> Result<String>;
}

pub async fn create_agent(config: Config) -> Result<Arc<dyn Agent>> {
    match config.api_provider.as_str() {
        "openai" => {
            let client: openai::CompletionsClient = openai::CompletionsClient::builder()
                .api_key(&config.api_key)
                .base_url(&config.api_url)
                .build()?;
            Ok(RigAgent::new(config, client) as Arc<dyn Agent>)
        }
        "gemini" => {
            let client = gemini::Client::new(&config.api_key)?;
            Ok(RigAgent::new(config, client) as Arc<dyn Agent>)
        }
        _ => {
            let client: anthropic::Client = anthropic::Client::builder()
                .api_key(&config.api_key)
                .base_url(&config.api_url)
                .build()?;
            Ok(RigAgent::new(config, client) as Arc<dyn Agent>)
        }
    }
}
