//! Near-duplicate detection via term-frequency cosine similarity.

use std::collections::HashMap;
use tracing::debug;

/// Term-frequency vector over lowercased word tokens.
fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut tf: HashMap<String, f64> = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 1)
    {
        *tf.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    tf
}

fn magnitude(v: &HashMap<String, f64>) -> f64 {
    v.values().map(|x| x * x).sum::<f64>().sqrt()
}

/// Cosine similarity between two documents' term-frequency vectors.
///
/// Returns a value in `[0, 1]`; empty or token-free inputs score 0.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let tf_a = term_frequencies(a);
    let tf_b = term_frequencies(b);

    let denom = magnitude(&tf_a) * magnitude(&tf_b);
    if denom == 0.0 {
        return 0.0;
    }

    let dot: f64 = tf_a
        .iter()
        .filter_map(|(term, count)| tf_b.get(term).map(|other| count * other))
        .sum();

    (dot / denom).clamp(0.0, 1.0)
}

/// Tracks seen documents and flags near-duplicates against them.
///
/// Duplicate pairs are reported once: the first document seen becomes the
/// canonical copy and later duplicates cross-reference it, so PII in the
/// same content is not counted twice.
#[derive(Debug)]
pub struct DuplicateDetector {
    threshold: f64,
    seen: Vec<(String, HashMap<String, f64>)>,
}

impl DuplicateDetector {
    /// Create a detector flagging pairs at or above `threshold`.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            seen: Vec::new(),
        }
    }

    /// Check `text` against every previously seen document.
    ///
    /// Returns the label of the canonical copy when a near-duplicate is
    /// found; otherwise records the document and returns `None`.
    pub fn check(&mut self, label: &str, text: &str) -> Option<String> {
        let tf = term_frequencies(text);
        let mag = magnitude(&tf);

        if mag > 0.0 {
            for (seen_label, seen_tf) in &self.seen {
                let denom = mag * magnitude(seen_tf);
                if denom == 0.0 {
                    continue;
                }
                let dot: f64 = tf
                    .iter()
                    .filter_map(|(term, count)| seen_tf.get(term).map(|other| count * other))
                    .sum();
                let score = dot / denom;

                if score >= self.threshold {
                    debug!(duplicate = label, of = %seen_label, score, "near-duplicate document");
                    return Some(seen_label.clone());
                }
            }
        }

        self.seen.push((label.to_string(), tf));
        None
    }

    /// Number of canonical (non-duplicate) documents tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_documents() {
        let text = "employee salary and bank account records for april";
        assert!((similarity(text, text) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_documents() {
        let a = "alpha beta gamma";
        let b = "delta epsilon zeta";
        assert!((similarity(a, b) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_overlap_in_range() {
        let a = "customer phone and email registry";
        let b = "customer phone and address registry";
        let s = similarity(a, b);
        assert!(s > 0.5 && s < 1.0);
    }

    #[test]
    fn test_empty_input() {
        assert!((similarity("", "anything") - 0.0).abs() < 1e-9);
        assert!((similarity("", "") - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_detector_flags_duplicate_once() {
        let mut detector = DuplicateDetector::new(0.9);

        assert_eq!(detector.check("a.txt", "quarterly payroll report for jakarta office"), None);
        let dup = detector.check("a_copy.txt", "quarterly payroll report for jakarta office");
        assert_eq!(dup, Some("a.txt".to_string()));

        // Duplicates are not added to the canonical set
        assert_eq!(detector.tracked(), 1);
    }

    #[test]
    fn test_detector_distinct_documents_tracked() {
        let mut detector = DuplicateDetector::new(0.9);
        assert_eq!(detector.check("a", "alpha beta gamma delta"), None);
        assert_eq!(detector.check("b", "totally different content here"), None);
        assert_eq!(detector.tracked(), 2);
    }
}
