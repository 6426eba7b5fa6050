mod batcher;
mod insights;

pub use batcher::{batch_by_conversation, compile, summarize};
pub use insights::generate_insights;
