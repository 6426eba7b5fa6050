use chrono_tz::Tz;
use std::fmt::Write;

const DEFAULT_INSTRUCTIONS: &str = "You are CherGPT, a teaching and learning companion for students.\n\
                                    - Guide students towards answers with hints and questions before giving solutions.\n\
                                    - Keep explanations short and pitched at the student's level.\n\
                                    - Match the student's language.";

/// System prompt for a chat turn. Admin-supplied instructions replace the
/// default behavior block.
pub fn build_preamble(instructions: Option<&str>, timezone: Tz) -> String {
    let now = chrono::Utc::now().with_timezone(&timezone);
    let mut preamble = String::with_capacity(512);

    preamble.push_str(
        instructions
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_INSTRUCTIONS),
    );
    let _ = write!(
        preamble,
        "\n\nCurrent time: {} ({})",
        now.format("%Y-%m-%d %H:%M:%S"),
        timezone.name()
    );
    preamble
}
