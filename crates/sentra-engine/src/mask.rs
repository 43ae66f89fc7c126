//! Entity-aware value masking.
//!
//! Masking is total and irreversible: every raw value that crosses the
//! engine boundary (samples in scan results, before/after values in drift
//! events, log lines) goes through [`mask_value`] first.

/// Mask a detected value for safe storage and display.
///
/// Deterministic: the same raw value always yields the same masked string.
///
/// - Emails keep the first character and the domain: `j***@gmail.com`
/// - Long digit identifiers (8+ digits) keep the first and last two digits
/// - Everything else keeps the first and last character
/// - Values of four characters or fewer are masked entirely
#[must_use]
pub fn mask_value(raw: &str) -> String {
    let trimmed = raw.trim();

    if trimmed.chars().count() <= 4 {
        return "****".to_string();
    }

    if let Some(at) = trimmed.find('@') {
        if at > 0 && at + 1 < trimmed.len() {
            if let Some(first) = trimmed.chars().next() {
                let domain = &trimmed[at + 1..];
                return format!("{first}***@{domain}");
            }
        }
    }

    let digit_count = trimmed.chars().filter(char::is_ascii_digit).count();
    let chars: Vec<char> = trimmed.chars().collect();

    if digit_count >= 8 {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        let masked = "*".repeat(chars.len() - 4);
        return format!("{head}{masked}{tail}");
    }

    let head = chars[0];
    let tail = chars[chars.len() - 1];
    let masked = "*".repeat(chars.len() - 2);
    format!("{head}{masked}{tail}")
}
