mod entry;
mod export;
mod store;

pub use entry::{ChatLogEntry, resolve_conversation_id};
#[cfg(test)]
pub(crate) use export::CSV_HEADER;
pub use export::encode_csv;
pub use store::LogStore;
