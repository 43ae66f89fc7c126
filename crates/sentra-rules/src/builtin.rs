//! Built-in PII recognizers.
//!
//! These are the default recognizer set compiled into every snapshot unless
//! a `disable_default` rule names them. Rule records can extend the set with
//! additional regex recognizers at load time.

use once_cell::sync::Lazy;
use regex::Regex;
use sentra_core::EntityType;

/// Compiled regex patterns (initialized once at startup)
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b")
        .expect("Email regex is hardcoded and valid")
});

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[-.\s]?)?(?:\([0-9]{3}\)|[0-9]{3})[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}")
        .expect("Phone regex is hardcoded and valid")
});

static SSN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("SSN regex is hardcoded and valid"));

static NATIONAL_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{16}\b").expect("National ID regex is hardcoded and valid"));

static TAX_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{2}\.\d{3}\.\d{3}\.\d{1}-\d{3}\.\d{3}\b")
        .expect("Tax ID regex is hardcoded and valid")
});

static CREDIT_CARD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b")
        .expect("Credit card regex is hardcoded and valid")
});

static IP_ADDRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("IP regex is hardcoded and valid")
});

static BANK_ACCOUNT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{10,16}\b").expect("Bank account regex is hardcoded and valid")
});

/// A built-in recognizer: a named, pre-compiled pattern with a base score.
#[derive(Debug, Clone)]
pub struct BuiltinRecognizer {
    /// Stable recognizer name, the target of `disable_default` rules
    pub name: &'static str,
    /// Entity type emitted by this recognizer
    pub entity_type: EntityType,
    /// Base confidence score for raw matches
    pub base_score: f64,
    pattern: &'static Lazy<Regex>,
    validator: Option<fn(&str) -> bool>,
}

impl BuiltinRecognizer {
    /// The compiled pattern.
    #[must_use]
    pub fn pattern(&self) -> &Regex {
        self.pattern
    }

    /// Run the recognizer's checksum validator, if it has one.
    ///
    /// Recognizers without a validator accept every pattern match.
    #[must_use]
    pub fn accepts(&self, matched: &str) -> bool {
        self.validator.map_or(true, |v| v(matched))
    }
}

/// Luhn checksum for card-number candidates.
///
/// Filters the large false-positive space of random 16-digit strings.
#[must_use]
pub fn luhn_valid(value: &str) -> bool {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }

    let mut sum = 0;
    for (i, d) in digits.iter().rev().enumerate() {
        let mut d = *d;
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

fn entity(label: &str) -> EntityType {
    EntityType::new(label).expect("built-in entity types are valid")
}

/// The default recognizer set.
///
/// Order is not significant; overlap between recognizers is resolved by the
/// scoring engine's tie-break.
#[must_use]
pub fn default_recognizers() -> Vec<BuiltinRecognizer> {
    vec![
        BuiltinRecognizer {
            name: "EmailRecognizer",
            entity_type: entity("EMAIL_ADDRESS"),
            base_score: 0.6,
            pattern: &EMAIL_PATTERN,
            validator: None,
        },
        BuiltinRecognizer {
            name: "PhoneRecognizer",
            entity_type: entity("PHONE_NUMBER"),
            base_score: 0.5,
            pattern: &PHONE_PATTERN,
            validator: Some(phone_plausible),
        },
        BuiltinRecognizer {
            name: "SsnRecognizer",
            entity_type: entity("SSN"),
            base_score: 0.7,
            pattern: &SSN_PATTERN,
            validator: None,
        },
        BuiltinRecognizer {
            name: "NationalIdRecognizer",
            entity_type: entity("NATIONAL_ID"),
            base_score: 0.5,
            pattern: &NATIONAL_ID_PATTERN,
            validator: None,
        },
        BuiltinRecognizer {
            name: "TaxIdRecognizer",
            entity_type: entity("TAX_ID"),
            base_score: 0.6,
            pattern: &TAX_ID_PATTERN,
            validator: None,
        },
        BuiltinRecognizer {
            name: "CreditCardRecognizer",
            entity_type: entity("CREDIT_CARD"),
            base_score: 0.6,
            pattern: &CREDIT_CARD_PATTERN,
            validator: Some(luhn_valid),
        },
        BuiltinRecognizer {
            name: "IpAddressRecognizer",
            entity_type: entity("IP_ADDRESS"),
            base_score: 0.4,
            pattern: &IP_ADDRESS_PATTERN,
            validator: None,
        },
        BuiltinRecognizer {
            name: "BankAccountRecognizer",
            entity_type: entity("BANK_ACCOUNT"),
            base_score: 0.3,
            pattern: &BANK_ACCOUNT_PATTERN,
            validator: None,
        },
    ]
}

/// Reject phone matches that are float fragments or too short to dial.
fn phone_plausible(matched: &str) -> bool {
    if matched.contains('.') {
        return false;
    }
    let digits = matched.chars().filter(char::is_ascii_digit).count();
    digits >= 7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_recognizer_names_unique() {
        let recognizers = default_recognizers();
        let names: std::collections::HashSet<_> = recognizers.iter().map(|r| r.name).collect();
        assert_eq!(names.len(), recognizers.len());
    }

    #[test]
    fn test_email_recognizer_matches() {
        let recognizers = default_recognizers();
        let email = recognizers
            .iter()
            .find(|r| r.name == "EmailRecognizer")
            .expect("email recognizer present");
        assert!(email.pattern().is_match("contact john@example.com today"));
        assert!(!email.pattern().is_match("no email here"));
    }

    #[test]
    fn test_luhn_valid() {
        assert!(luhn_valid("4111111111111111"));
        assert!(luhn_valid("4111-1111-1111-1111"));
        assert!(!luhn_valid("1234567890123456"));
        assert!(!luhn_valid("1234"));
    }

    #[test]
    fn test_credit_card_recognizer_rejects_bad_checksum() {
        let recognizers = default_recognizers();
        let card = recognizers
            .iter()
            .find(|r| r.name == "CreditCardRecognizer")
            .expect("credit card recognizer present");
        assert!(card.accepts("4111-1111-1111-1111"));
        assert!(!card.accepts("1234-5678-9012-3456"));
    }

    #[test]
    fn test_phone_plausibility() {
        assert!(phone_plausible("081234567890"));
        assert!(!phone_plausible("0.8269353"));
        assert!(!phone_plausible("123456"));
    }
}
