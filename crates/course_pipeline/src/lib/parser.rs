//! # Reply Parser
//!
//! This module turns the summarization model's free-form textual reply into
//! a structured summary. Models wrap JSON in prose or markdown fences and
//! frequently emit almost-JSON (trailing commas, comments, unquoted keys),
//! so parsing is deliberately forgiving and never fails outright: when no
//! usable JSON object can be recovered, the cleaned raw text becomes the
//! summary content.

use std::sync::LazyLock;

use course_datastore::TimestampNote;
use regex::Regex;
use serde::Deserialize;

use crate::{error::Error, SummaryOutput};

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[a-zA-Z0-9]*\r?\n?").unwrap());

#[derive(Debug, Deserialize)]
struct RawSummary {
    content: String,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    timestamps: Vec<TimestampNote>,
}

/// Parses a model reply into a [`SummaryOutput`].
///
/// Falls back to the fence-stripped raw reply as `content` (with empty
/// `key_points`/`timestamps`) when the reply carries no parseable JSON
/// object. Summarization must not fail solely because of malformed model
/// output.
pub fn parse_summary_reply(reply: &str) -> SummaryOutput {
    match try_parse(reply) {
        Ok(raw) => SummaryOutput {
            content: raw.content,
            key_points: raw.key_points,
            timestamps: raw.timestamps,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Model reply was not valid JSON, using raw text");
            SummaryOutput {
                content: strip_code_fences(reply),
                key_points: Vec::new(),
                timestamps: Vec::new(),
            }
        }
    }
}

fn try_parse(reply: &str) -> Result<RawSummary, Error> {
    let span = extract_json_object(reply)
        .ok_or(Error::ParseError("No JSON object found in model reply"))?;

    let raw = match serde_json::from_str::<RawSummary>(span) {
        Ok(raw) => raw,
        // json5 additionally accepts trailing commas, comments and
        // unquoted keys, all of which chat models produce.
        Err(_) => json5::from_str::<RawSummary>(span)
            .map_err(|_| Error::ParseError("JSON object in model reply failed to parse"))?,
    };

    if raw.content.trim().is_empty() {
        return Err(Error::ParseError("Model reply JSON is missing 'content'"));
    }

    Ok(raw)
}

/// Returns the first balanced `{...}` span in `input`.
///
/// The scanner tracks string boundaries and escape sequences so braces
/// inside string values do not throw off the depth count.
pub fn extract_json_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in input[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&input[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Strips markdown code-fence markers from a reply, leaving the text
/// between them intact.
pub fn strip_code_fences(reply: &str) -> String {
    FENCE_RE.replace_all(reply, "").trim().to_string()
}
