//! Context window construction for candidate scoring.
//!
//! A candidate's context is everything near it that hints at what the value
//! means: the column/field name, the containing table or sheet, the file
//! name, and a token window around the match span itself.

use serde::{Deserialize, Serialize};

/// Structural hints supplied by the caller alongside the text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextHints {
    /// Column/field name for structured sources
    pub field: Option<String>,
    /// Table, sheet, or directory name
    pub container: Option<String>,
    /// File or object name
    pub file_name: Option<String>,
}

impl ContextHints {
    /// Hints for a database cell.
    #[must_use]
    pub fn for_column(table: &str, column: &str) -> Self {
        Self {
            field: Some(column.to_string()),
            container: Some(table.to_string()),
            file_name: None,
        }
    }

    /// Hints for file content.
    #[must_use]
    pub fn for_file(file_name: &str) -> Self {
        Self {
            field: None,
            container: None,
            file_name: Some(file_name.to_string()),
        }
    }
}

/// Derive context tokens from a name (filename, sheet name, column header).
///
/// Splits on non-alphanumerics (which also breaks snake_case and kebab-case)
/// and drops tokens shorter than 3 characters; `customer_phone` yields
/// `["customer", "phone"]`.
#[must_use]
pub fn tokens_from_name(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// Collect the context window for a match span.
///
/// The window holds the lowercased tokens from all structural hints plus up
/// to `radius` text tokens on each side of the span.
#[must_use]
pub fn context_window(
    text: &str,
    span_start: usize,
    span_end: usize,
    radius: usize,
    hints: &ContextHints,
) -> Vec<String> {
    let mut window = Vec::new();

    for name in [&hints.field, &hints.container, &hints.file_name]
        .into_iter()
        .flatten()
    {
        window.extend(tokens_from_name(name));
    }

    // Tokenize the text with byte offsets so tokens can be positioned
    // relative to the span.
    let mut before: Vec<String> = Vec::new();
    let mut after: Vec<String> = Vec::new();

    for (start, token) in tokenize_with_offsets(text) {
        let end = start + token.len();
        if end <= span_start {
            before.push(token.to_lowercase());
        } else if start >= span_end && after.len() < radius {
            after.push(token.to_lowercase());
        }
    }

    let keep_from = before.len().saturating_sub(radius);
    window.extend(before.into_iter().skip(keep_from));
    window.extend(after);

    window
}

/// Join a window into one searchable haystack.
///
/// Multi-word keywords ("nomor induk") match across token boundaries.
#[must_use]
pub fn window_haystack(window: &[String]) -> String {
    window.join(" ")
}

/// Alphanumeric runs with their byte offsets.
fn tokenize_with_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut offset = 0;

    while offset < text.len() {
        let rest = &text[offset..];
        let Some(skip) = rest.find(|c: char| c.is_alphanumeric()) else {
            break;
        };
        let start = offset + skip;
        let token_rest = &text[start..];
        let len = token_rest
            .find(|c: char| !c.is_alphanumeric())
            .unwrap_or(token_rest.len());
        tokens.push((start, &text[start..start + len]));
        offset = start + len;
    }

    tokens
}
