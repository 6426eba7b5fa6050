use super::ChatLogEntry;

pub const CSV_HEADER: [&str; 5] = ["ID", "Timestamp", "Prompt", "Response", "ConversationID"];

// Lets spreadsheet tools detect UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn encode_csv(entries: &[ChatLogEntry]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(CSV_HEADER)?;

    for entry in entries {
        writer.write_record([
            entry.id.to_string(),
            entry.format_timestamp(),
            entry.prompt.clone(),
            entry.response.clone(),
            entry.conversation_id.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
