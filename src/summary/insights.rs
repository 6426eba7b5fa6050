use crate::agent::Agent;
use crate::chatlog::ChatLogEntry;
use tracing::{debug, error};

const INSIGHTS_PREAMBLE: &str = "Analyze the following chat logs and provide the top 5 insights \
                                 on how students' questioning techniques could be improved:";

pub const INSIGHTS_FAILED: &str = "Error generating insights.";

pub async fn generate_insights(entries: &[ChatLogEntry], agent: &dyn Agent) -> String {
    let transcript = entries
        .iter()
        .map(ChatLogEntry::format_for_context)
        .collect::<Vec<_>>()
        .join("\n\n");

    match agent.complete(INSIGHTS_PREAMBLE, &transcript).await {
        Ok(insights) => insights,
        Err(e) => {
            error!("Error generating insights: {}", e);
            debug!("Failed transcript: {}", transcript);
            INSIGHTS_FAILED.to_string()
        }
    }
}
