use super::{Agent, StreamEvent};
use crate::config::Config;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use rig::{
    agent::MultiTurnStreamItem,
    client::CompletionClient,
    completion::{CompletionModel, GetTokenUsage, Prompt},
    streaming::{StreamedAssistantContent, StreamingPrompt},
};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct RigAgent<C: CompletionClient> {
    config: Config,
    client: C,
}

impl<C: CompletionClient> RigAgent<C> {
    pub fn new(config: Config, client: C) -> Arc<Self> {
        Arc::new(Self { config, client })
    }

    async fn run_stream<M, R, A>(
        agent: A,
        prompt: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<String>
    where
        M: CompletionModel + 'static,
        R: Clone + Unpin + GetTokenUsage,
        A: StreamingPrompt<M, R>,
        <A as StreamingPrompt<M, R>>::Hook: 'static,
    {
        let mut stream = agent.stream_prompt(prompt).await;
        let mut response_text = String::new();

        while let Some(item) = stream.next().await {
            match item {
                Ok(MultiTurnStreamItem::StreamAssistantItem(StreamedAssistantContent::Text(
                    text,
                ))) => {
                    let _ = tx.send(StreamEvent::TextDelta(text.text.clone())).await;
                    response_text.push_str(&text.text);
                }
                Ok(MultiTurnStreamItem::FinalResponse(res)) => {
                    if response_text.is_empty() {
                        response_text = res.response().to_string();
                    }
                }
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                    return Err(anyhow::anyhow!("{}", e));
                }
                _ => {}
            }
        }

        let _ = tx.send(StreamEvent::Done).await;
        Ok(response_text)
    }
}

#[async_trait]
impl<C> Agent for RigAgent<C>
where
    C: CompletionClient + Send + Sync,
    C::CompletionModel: 'static,
{
    async fn process_streaming(
        &self,
        preamble: &str,
        prompt: &str,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<String> {
        let agent = self
            .client
            .agent(&self.config.model)
            .preamble(preamble)
            .max_tokens(self.config.max_tokens)
            .build();

        Self::run_stream(agent, prompt, tx).await
    }

    async fn complete(&self, preamble: &str, prompt: &str) -> Result<String> {
        let agent = self
            .client
            .agent(&self.config.summary_model)
            .preamble(preamble)
            .max_tokens(self.config.summary_max_tokens)
            .build();

        let response = agent.prompt(prompt).await?;
        Ok(response.trim().to_string())
    }
}
