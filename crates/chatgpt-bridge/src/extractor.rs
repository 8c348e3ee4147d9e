//! Isolates the newly generated answer from the accumulated transcript.

use crate::classifier::STREAMING_CURSOR;
use tracing::warn;

/// Appended to search answers that were still being produced when polling stopped.
pub const PARTIAL_SEARCH_NOTE: &str =
    "\n\nNote: The search may still be in progress. This is a partial result.";

/// Chrome substrings removed from the extracted answer, longest first.
const CHROME_SUBSTRINGS: &[&str] = &["Regenerate response", "Regenerate", "Continue generating"];

/// Answers at least this long are assumed complete.
const TRUNCATION_LENGTH_THRESHOLD: usize = 50;

const TERMINAL_CHARS: &[char] = &['.', '!', '?', ':', ')', '}', ']'];

/// Inputs for one extraction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub transcript: &'a str,
    pub prompt: &'a str,
    pub search_like: bool,
    /// The classifier still saw activity on its last tick.
    pub still_processing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    /// False when the prompt could not be located and the whole transcript was kept.
    pub anchored: bool,
    /// Advisory only; never turns the result into an error.
    pub possibly_truncated: bool,
}

/// Extracts and cleans the answer that follows the prompt in `transcript`.
pub fn extract_response(input: ExtractionInput<'_>) -> Extraction {
    let (raw, anchored) = match answer_after_prompt(input.transcript, input.prompt) {
        Some(answer) => (answer.to_string(), true),
        None => (input.transcript.to_string(), false),
    };

    let mut raw = raw;
    if input.search_like && input.still_processing {
        raw.push_str(PARTIAL_SEARCH_NOTE);
    }

    let text = clean_response(&raw);
    let possibly_truncated = looks_truncated(&text);
    if possibly_truncated {
        warn!(
            "[extractor] Response may be incomplete ({} chars): {:?}",
            text.chars().count(),
            text
        );
    }

    Extraction {
        text,
        anchored,
        possibly_truncated,
    }
}

/// Text strictly after the first occurrence of the flattened prompt.
///
/// Returns `None` when the prompt is absent or nothing follows it.
pub fn answer_after_prompt<'a>(transcript: &'a str, prompt: &str) -> Option<&'a str> {
    let anchor = flatten_prompt(prompt);
    if anchor.is_empty() {
        return None;
    }
    let start = transcript.find(&anchor)? + anchor.len();
    let answer = &transcript[start..];
    if answer.is_empty() {
        None
    } else {
        Some(answer)
    }
}

/// The prompt as it appears in a single rendered text run.
pub fn flatten_prompt(prompt: &str) -> String {
    prompt.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Removes residual UI chrome and surrounding whitespace.
pub fn clean_response(text: &str) -> String {
    let mut cleaned = text.replace(STREAMING_CURSOR, "");
    for chrome in CHROME_SUBSTRINGS {
        cleaned = cleaned.replace(chrome, "");
    }
    cleaned.trim().to_string()
}

/// Heuristic for answers that were cut off mid-generation.
pub fn looks_truncated(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let short = text.chars().count() < TRUNCATION_LENGTH_THRESHOLD;
    let terminated = text.ends_with(TERMINAL_CHARS);
    let has_paragraphs = text.contains("\n\n");
    short && !terminated && !has_paragraphs
}
