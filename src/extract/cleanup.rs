//! OCR text cleanup and derived fields.
//!
//! Raw recognizer output is noisy in predictable ways: stray punctuation,
//! `O` read for `0` in printed provider numbers, spaces dropped between
//! words in handwritten addresses. The functions here correct what can be
//! corrected from the text alone.

use std::sync::LazyLock;

use regex::Regex;

static REQUEST_NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"24H[0-9]{5}").ok());
static LABELED_PHONE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\(([HhMm])\)").ok());
static MEDICARE_WITH_POSITION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([0-9]{10})/([0-9])$").ok());
static TRAILING_POSTCODE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"([0-9]{4})$").ok());

/// Street type words that end the street part of an address.
pub const STREET_TYPES: &[&str] = &[
    "Street", "St", "Road", "Rd", "Avenue", "Ave", "Drive", "Dr", "Boulevard", "Blvd", "Lane", "Ln",
    "Terrace", "Terr", "Place", "Pl", "Court", "Ct",
];

/// Characters OCR commonly confuses in a field, as (read, meant).
fn misreads(field: &str) -> &'static [(char, char)] {
    match field {
        "doctor_information" => &[('§', '5'), ('$', '5'), ('O', '0'), ('l', '1')],
        _ => &[],
    }
}

/// Whether `field` may contain `c`. Fields without a whitelist keep everything.
fn is_allowed(field: &str, c: char) -> bool {
    match field {
        "medicare_number" => c.is_ascii_digit() || c == '/',
        "home_phone_number" | "mobile_phone_number" => c.is_ascii_digit(),
        "address" => c.is_ascii_alphanumeric() || c.is_whitespace(),
        "doctor_information" | "request_number" => c.is_ascii_alphanumeric(),
        "given_names" => c.is_ascii_alphabetic() || c.is_whitespace(),
        _ => true,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleans raw OCR text for `field`: misread correction, character
/// whitelist, then field-specific normalization.
pub fn clean_text(field: &str, text: &str) -> String {
    let mut text: String = text
        .chars()
        .map(|c| {
            misreads(field)
                .iter()
                .find(|(read, _)| *read == c)
                .map_or(c, |(_, meant)| *meant)
        })
        .collect();

    text.retain(|c| is_allowed(field, c));

    match field {
        "medicare_number" | "home_phone_number" | "mobile_phone_number" => {
            text.retain(|c| !c.is_whitespace());
        }
        "address" => {
            // Handwritten addresses often lose the spaces between words
            let mut spaced = String::with_capacity(text.len() + 8);
            for (i, c) in text.chars().enumerate() {
                if i > 0 && c.is_ascii_uppercase() {
                    spaced.push(' ');
                }
                spaced.push(c);
            }
            text = collapse_whitespace(&spaced);
        }
        "request_number" => {
            text.retain(|c| !c.is_whitespace());
            if let Some(found) = REQUEST_NUMBER.as_ref().and_then(|re| re.find(&text)) {
                text = found.as_str().to_string();
            }
        }
        "given_names" | "surname" | "name" => {
            text.retain(|c| c.is_ascii_alphabetic() || c.is_whitespace() || matches!(c, '-' | '\'' | '.'));
            text = collapse_whitespace(&text);
        }
        _ => {}
    }

    text.trim().to_string()
}

/// Components of a single-line Australian address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub address: String,
    pub suburb: Option<String>,
    pub postcode: Option<String>,
    pub state: Option<String>,
}

/// State for a postcode, keyed on its first digit.
pub fn state_for_postcode(postcode: &str) -> &'static str {
    match postcode.chars().next() {
        Some('2') => "NSW",
        Some('3') => "VIC",
        Some('4') => "QLD",
        Some('5') => "SA",
        Some('6') => "WA",
        Some('7') => "TAS",
        Some('8') | Some('0') => "NT",
        Some('9') => "ACT",
        _ => "Unknown",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn is_street_type(token: &str) -> bool {
    let word = capitalize(token.trim_matches(|c| c == ',' || c == '.'));
    STREET_TYPES.contains(&word.as_str())
}

/// Splits "12 Smith St Bondi NSW 2026" into street, suburb, postcode and state.
///
/// The postcode is a trailing four-digit group. The street part ends at the
/// first street-type word; without one, the first two words are the street.
pub fn split_address(full: &str) -> AddressParts {
    let mut rest = full.trim();
    let mut parts = AddressParts::default();

    if let Some(found) = TRAILING_POSTCODE.as_ref().and_then(|re| re.captures(rest)) {
        if let Some(code) = found.get(1) {
            parts.postcode = Some(code.as_str().to_string());
            parts.state = Some(state_for_postcode(code.as_str()).to_string());
            rest = rest[..code.start()].trim();
        }
    }

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let street_end = match tokens.iter().position(|t| is_street_type(t)) {
        Some(index) => index + 1,
        None => tokens.len().min(2),
    };

    parts.address = tokens[..street_end].join(" ");
    let suburb = tokens[street_end..].join(" ");
    if !suburb.is_empty() {
        parts.suburb = Some(suburb);
    }
    parts
}

/// Home and mobile numbers read from the combined phone field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PhoneNumbers {
    pub home: Option<String>,
    pub mobile: Option<String>,
}

/// Splits the phone field into home and mobile numbers.
///
/// Numbers labelled `(H)` or `(M)` go where the label says. Unlabelled, a
/// lone number starting with 04 is a mobile and anything else is a home
/// number; with two numbers the first is the mobile and the second the home.
pub fn split_phone_numbers(field: &str) -> PhoneNumbers {
    let compact: String = field.chars().filter(|c| !c.is_whitespace()).collect();
    let mut phones = PhoneNumbers::default();

    if let Some(re) = LABELED_PHONE.as_ref() {
        for caps in re.captures_iter(&compact) {
            let number = caps[1].to_string();
            match caps[2].to_ascii_uppercase().as_str() {
                "H" => phones.home = Some(number),
                _ => phones.mobile = Some(number),
            }
        }
    }
    if phones.home.is_some() || phones.mobile.is_some() {
        return phones;
    }

    let numbers: Vec<&str> = compact
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .collect();

    match numbers.as_slice() {
        [only] if only.starts_with("04") => phones.mobile = Some(only.to_string()),
        [only] => phones.home = Some(only.to_string()),
        [first, second] => {
            phones.mobile = Some(first.to_string());
            phones.home = Some(second.to_string());
        }
        // None, or more than two unlabeled numbers: nothing to assign
        _ => {}
    }
    phones
}

/// Splits "NNNNNNNNNN/P" into the card number and the patient's position on the card.
pub fn split_medicare(value: &str) -> Option<(String, String)> {
    let caps = MEDICARE_WITH_POSITION.as_ref()?.captures(value)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Provider number from the doctor block: the last eight alphanumerics, uppercased.
pub fn derive_provider_number(source: &str) -> Option<String> {
    let cleaned: Vec<char> = source
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let start = cleaned.len().saturating_sub(8);
    Some(cleaned[start..].iter().collect())
}
