//! Field format validation.
//!
//! Each checked field maps to one rule in a fixed table. Fields without a
//! rule are free text and always pass; fields absent from the map are not
//! reported.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

/// Extracted field name -> value.
pub type FieldMap = BTreeMap<String, String>;

/// Format rule applied to one field's whole value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRule {
    /// Exactly `n` ASCII digits.
    Digits(usize),
    /// A literal prefix followed by exactly `digits` ASCII digits.
    Prefixed { prefix: &'static str, digits: usize },
    /// Exactly `n` ASCII letters or digits.
    Alphanumeric(usize),
    /// `d/m/yyyy` (one or two digit day and month) naming a real calendar date.
    Date,
}

impl FieldRule {
    pub fn matches(&self, value: &str) -> bool {
        match *self {
            Self::Digits(n) => value.len() == n && value.bytes().all(|b| b.is_ascii_digit()),
            Self::Prefixed { prefix, digits } => value
                .strip_prefix(prefix)
                .is_some_and(|rest| Self::Digits(digits).matches(rest)),
            Self::Alphanumeric(n) => value.len() == n && value.bytes().all(|b| b.is_ascii_alphanumeric()),
            Self::Date => is_calendar_date(value),
        }
    }
}

struct RuleEntry {
    field: &'static str,
    rule: FieldRule,
    message: &'static str,
}

const RULES: &[RuleEntry] = &[
    RuleEntry {
        field: "medicare_number",
        rule: FieldRule::Digits(10),
        message: "Invalid Medicare Number format.",
    },
    RuleEntry {
        field: "home_phone_number",
        rule: FieldRule::Digits(10),
        message: "Invalid Home Phone Number format.",
    },
    RuleEntry {
        field: "mobile_phone_number",
        rule: FieldRule::Digits(10),
        message: "Invalid Mobile Phone Number format.",
    },
    RuleEntry {
        field: "request_number",
        rule: FieldRule::Prefixed { prefix: "24H", digits: 5 },
        message: "Invalid Request Number format.",
    },
    RuleEntry {
        field: "provider_number",
        rule: FieldRule::Alphanumeric(8),
        message: "Invalid Provider Number format.",
    },
    RuleEntry {
        field: "date_of_birth",
        rule: FieldRule::Date,
        message: "Invalid Date of Birth format.",
    },
    RuleEntry {
        field: "request_date",
        rule: FieldRule::Date,
        message: "Invalid Request Date format.",
    },
];

fn entry_for(name: &str) -> Option<&'static RuleEntry> {
    RULES.iter().find(|entry| entry.field == name)
}

/// Rule applied to `name`, if it is a checked field.
pub fn rule_for(name: &str) -> Option<FieldRule> {
    entry_for(name).map(|entry| entry.rule)
}

/// Names of all checked fields, in table order.
pub fn checked_fields() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|entry| entry.field)
}

fn is_calendar_date(value: &str) -> bool {
    static DATE_SHAPE: OnceLock<Option<Regex>> = OnceLock::new();
    let shape = DATE_SHAPE.get_or_init(|| Regex::new(r"^[0-9]{1,2}/[0-9]{1,2}/[0-9]{4}$").ok());

    match shape {
        Some(re) if re.is_match(value) => NaiveDate::parse_from_str(value, "%d/%m/%Y").is_ok(),
        _ => false,
    }
}

/// Checks one value against its field's rule. Unchecked fields always pass.
pub fn validate_field(name: &str, value: &str) -> bool {
    rule_for(name).is_none_or(|rule| rule.matches(value))
}

/// Failing fields and their messages. Empty means every checked field passed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult(BTreeMap<String, String>);

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    /// Error message for `field`, if it failed.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Messages joined with "; " for single-cell storage.
    pub fn summary(&self) -> String {
        self.0.values().map(String::as_str).collect::<Vec<_>>().join("; ")
    }
}

/// Validates every present, checked field of `fields`.
pub fn validate_data(fields: &FieldMap) -> ValidationResult {
    let errors = fields
        .iter()
        .filter_map(|(name, value)| {
            let entry = entry_for(name)?;
            (!entry.rule.matches(value)).then(|| (name.clone(), entry.message.to_string()))
        })
        .collect();
    ValidationResult(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_medicare_number() {
        assert!(validate_field("medicare_number", "1234567890"));
        assert!(!validate_field("medicare_number", "12345"));
        assert!(!validate_field("medicare_number", "12345678901"));
        assert!(!validate_field("medicare_number", "12345a7890"));
    }

    #[test]
    fn test_non_ascii_digits_rejected() {
        // Arabic-Indic digits are Unicode digits but not ASCII
        assert!(!validate_field("medicare_number", "١٢٣٤٥٦٧٨٩٠"));
        assert!(!validate_field("home_phone_number", "０４１２３４５６７８"));
    }

    #[test]
    fn test_phone_numbers() {
        assert!(validate_field("home_phone_number", "0298765432"));
        assert!(validate_field("mobile_phone_number", "0412345678"));
        assert!(!validate_field("mobile_phone_number", "0412 345 678"));
    }

    #[test]
    fn test_request_number() {
        assert!(validate_field("request_number", "24H12345"));
        assert!(!validate_field("request_number", "25H12345"));
        assert!(!validate_field("request_number", "24H1234"));
        assert!(!validate_field("request_number", "24h12345"));
        assert!(!validate_field("request_number", "X24H12345"));
    }

    #[test]
    fn test_provider_number() {
        assert!(validate_field("provider_number", "2345678A"));
        assert!(validate_field("provider_number", "ABCDEFGH"));
        assert!(!validate_field("provider_number", "2345678"));
        assert!(!validate_field("provider_number", "2345-78A"));
    }

    #[test]
    fn test_dates() {
        assert!(validate_field("date_of_birth", "01/01/2000"));
        assert!(validate_field("date_of_birth", "1/1/2000"));
        assert!(validate_field("request_date", "29/02/2024"));
        assert!(!validate_field("date_of_birth", "31/02/2020"));
        assert!(!validate_field("request_date", "29/02/2023"));
        assert!(!validate_field("date_of_birth", "2000-01-01"));
        assert!(!validate_field("date_of_birth", "01/01/00"));
        assert!(!validate_field("date_of_birth", "001/01/2000"));
    }

    #[test]
    fn test_unchecked_field_passes() {
        assert!(validate_field("surname", ""));
        assert!(validate_field("doctor_information", "anything at all"));
    }

    #[test]
    fn test_validate_data_reports_only_failures() {
        let fields = map(&[
            ("medicare_number", "12345"),
            ("request_number", "24H12345"),
            ("date_of_birth", "31/02/2020"),
            ("surname", "Smith"),
        ]);

        let result = validate_data(&fields);

        assert!(!result.is_valid());
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("medicare_number"), Some("Invalid Medicare Number format."));
        assert_eq!(result.get("date_of_birth"), Some("Invalid Date of Birth format."));
        assert_eq!(result.get("request_number"), None);
    }

    #[test]
    fn test_absent_fields_are_not_errors() {
        assert!(validate_data(&FieldMap::new()).is_valid());
        assert!(validate_data(&map(&[("surname", "Smith")])).is_valid());
    }

    #[test]
    fn test_empty_checked_value_fails() {
        let result = validate_data(&map(&[("provider_number", "")]));
        assert_eq!(result.get("provider_number"), Some("Invalid Provider Number format."));
    }

    #[test]
    fn test_every_checked_field_has_a_rule() {
        for name in checked_fields() {
            assert!(rule_for(name).is_some(), "{}", name);
        }
        assert_eq!(checked_fields().count(), 7);
    }

    #[test]
    fn test_summary_joins_messages() {
        let result = validate_data(&map(&[("medicare_number", "1"), ("provider_number", "2")]));
        assert_eq!(
            result.summary(),
            "Invalid Medicare Number format.; Invalid Provider Number format."
        );
    }
}
