use crate::error::InvalidNumber;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref NON_DIALABLE: Regex = Regex::new(r"[^0-9+]").unwrap();
    static ref PLUS_SIGNS: Regex = Regex::new(r"\+").unwrap();
}

/// A caller identifier reduced to its digits, with an optional leading `+`.
///
/// The inner value always matches `^\+?[0-9]*$`, and a `+` only appears when
/// at least one digit follows it. An empty value is valid and never matches a
/// contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NormalizedNumber(String);

impl NormalizedNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the number carried an international `+` prefix.
    pub fn is_international(&self) -> bool {
        self.0.starts_with('+')
    }

    /// The digits without any `+` prefix.
    pub fn digits(&self) -> &str {
        self.0.trim_start_matches('+')
    }
}

impl fmt::Display for NormalizedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NormalizedNumber {
    type Error = InvalidNumber;

    /// Accepts only values that normalization leaves unchanged.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        if normalize_str(&value).as_str() == value {
            Ok(NormalizedNumber(value))
        } else {
            Err(InvalidNumber(value))
        }
    }
}

impl From<NormalizedNumber> for String {
    fn from(number: NormalizedNumber) -> Self {
        number.0
    }
}

impl AsRef<str> for NormalizedNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw caller identifier.
///
/// `None` stays `None`: an absent identifier cannot be evaluated. Everything
/// else is stripped down to ASCII digits, keeping a single `+` only when it
/// comes before every digit of the input.
pub fn normalize(raw: Option<&str>) -> Option<NormalizedNumber> {
    raw.map(normalize_str)
}

/// Normalize an identifier that is known to be present.
pub fn normalize_str(raw: &str) -> NormalizedNumber {
    let dialable = NON_DIALABLE.replace_all(raw, "");
    let international = dialable.starts_with('+');
    let digits = PLUS_SIGNS.replace_all(&dialable, "");

    if digits.is_empty() {
        return NormalizedNumber(String::new());
    }

    let mut normalized = String::with_capacity(digits.len() + 1);
    if international {
        normalized.push('+');
    }
    normalized.push_str(&digits);
    NormalizedNumber(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn norm(raw: &str) -> String {
        normalize_str(raw).as_str().to_string()
    }

    #[test]
    fn test_absent_identifier_stays_absent() {
        assert_eq!(normalize(None), None);
    }

    #[test]
    fn test_formatting_characters_are_stripped() {
        assert_eq!(norm("+1 (555) 123-4567"), "+15551234567");
        assert_eq!(norm("555-0000"), "5550000");
        assert_eq!(norm("555.123.4567"), "5551234567");
        assert_eq!(norm("tel:+44 20 7946 0958"), "+442079460958");
    }

    #[test]
    fn test_only_a_leading_plus_survives() {
        assert_eq!(norm("1+2"), "12");
        assert_eq!(norm("++1"), "+1");
        assert_eq!(norm("  +1 555"), "+1555");
        assert_eq!(norm("+1+555"), "+1555");
    }

    #[test]
    fn test_no_digits_yields_empty_value() {
        assert_eq!(norm("anonymous"), "");
        assert_eq!(norm(""), "");
        assert_eq!(norm("+"), "");
        assert!(normalize(Some("Private")).unwrap().is_empty());
    }

    #[test]
    fn test_non_ascii_digits_are_stripped() {
        // Arabic-Indic and full-width digits are not ASCII digits
        assert_eq!(norm("٥٥٥1"), "1");
        assert_eq!(norm("１２3"), "3");
    }

    #[test]
    fn test_deserialize_rejects_unnormalized_values() {
        let number: NormalizedNumber = serde_json::from_str("\"+15551234567\"").unwrap();
        assert_eq!(number.as_str(), "+15551234567");
        assert_eq!(serde_json::to_string(&number).unwrap(), "\"+15551234567\"");

        let empty: NormalizedNumber = serde_json::from_str("\"\"").unwrap();
        assert!(empty.is_empty());

        for bad in ["\"abc\"", "\"+\"", "\"1+2\"", "\"555 0000\""] {
            assert!(
                serde_json::from_str::<NormalizedNumber>(bad).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    fn is_normalized_shape(value: &str) -> bool {
        let digits = value.strip_prefix('+').unwrap_or(value);
        digits.chars().all(|c| c.is_ascii_digit()) && !(value.starts_with('+') && digits.is_empty())
    }

    proptest! {
        #[test]
        fn test_normalization_is_idempotent(raw in ".*") {
            let once = normalize_str(&raw);
            let twice = normalize_str(once.as_str());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn test_normalization_is_idempotent_for_dialable_text(
            raw in "[0-9+ ()\\-.a٥]{0,16}"
        ) {
            let once = normalize_str(&raw);
            prop_assert_eq!(normalize_str(once.as_str()), once);
        }

        #[test]
        fn test_normalized_value_keeps_ascii_digits_in_order(raw in ".*") {
            let normalized = normalize_str(&raw);
            let expected: String = raw.chars().filter(char::is_ascii_digit).collect();

            prop_assert!(is_normalized_shape(normalized.as_str()));
            prop_assert_eq!(normalized.digits(), expected.as_str());
        }
    }

    #[test]
    fn test_digits_and_prefix_accessors() {
        let number = normalize_str("+1 555 0000");
        assert!(number.is_international());
        assert_eq!(number.digits(), "15550000");

        let local = normalize_str("555 0000");
        assert!(!local.is_international());
        assert_eq!(local.digits(), "5550000");
    }
}
