//! Document category tagging.
//!
//! Keyword tables assign coarse business categories (Financial, Health, HR,
//! Legal) to scanned text. The orchestrator uses these to auto-tag targets
//! so compliance reports can slice findings by data domain.

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;

/// One category and the keywords that signal it.
struct CategoryRule {
    category: &'static str,
    keywords: &'static [&'static str],
}

const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: "Financial",
        keywords: &[
            "gaji", "salary", "rekening", "bank", "transfer", "rupiah", "invoice", "payroll",
        ],
    },
    CategoryRule {
        category: "Health",
        keywords: &[
            "sakit", "diagnosa", "dokter", "diagnosis", "patient", "rawat", "darah",
        ],
    },
    CategoryRule {
        category: "HR",
        keywords: &[
            "karyawan", "pegawai", "cuti", "absensi", "kontrak", "employee", "recruitment",
        ],
    },
    CategoryRule {
        category: "Legal",
        keywords: &[
            "perjanjian", "hukum", "pidana", "perdata", "pasal", "contract", "litigation",
        ],
    },
];

/// One automaton over every keyword; pattern index maps back to category.
static CATEGORY_MATCHER: Lazy<(AhoCorasick, Vec<&'static str>)> = Lazy::new(|| {
    let mut patterns = Vec::new();
    let mut categories = Vec::new();
    for rule in CATEGORY_RULES {
        for keyword in rule.keywords {
            patterns.push(*keyword);
            categories.push(rule.category);
        }
    }
    let matcher = AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(&patterns)
        .expect("category keyword patterns are hardcoded and valid");
    (matcher, categories)
});

/// Scan text for category keywords and return matched category tags.
///
/// One keyword is enough for a category; tags are returned in table order
/// without duplicates.
#[must_use]
pub fn document_categories(text: &str) -> Vec<String> {
    let (matcher, categories) = &*CATEGORY_MATCHER;

    let mut found = [false; 4];
    for m in matcher.find_iter(text) {
        let category = categories[m.pattern().as_usize()];
        if let Some(idx) = CATEGORY_RULES.iter().position(|r| r.category == category) {
            found[idx] = true;
        }
    }

    CATEGORY_RULES
        .iter()
        .zip(found.iter())
        .filter(|(_, hit)| **hit)
        .map(|(rule, _)| rule.category.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_financial_category() {
        let tags = document_categories("transfer gaji bulanan ke rekening karyawan");
        assert!(tags.contains(&"Financial".to_string()));
        assert!(tags.contains(&"HR".to_string()));
    }

    #[test]
    fn test_case_insensitive() {
        let tags = document_categories("PAYROLL SUMMARY 2025");
        assert_eq!(tags, vec!["Financial"]);
    }

    #[test]
    fn test_no_category() {
        assert!(document_categories("nothing relevant here").is_empty());
    }

    #[test]
    fn test_no_duplicate_tags() {
        let tags = document_categories("bank bank bank transfer transfer");
        assert_eq!(tags, vec!["Financial"]);
    }
}
