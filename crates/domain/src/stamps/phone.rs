//! Phone number canonicalization.
//!
//! Cards are keyed by phone number, so the same customer typing
//! "+358 40 123 4567" one day and "0401234567" the next must land on the
//! same card. Everything is reduced to one canonical E.164-style form before
//! it touches the store.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from phone normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneError {
    /// The input was empty or whitespace-only.
    #[error("Phone number is empty")]
    Empty,

    /// The input contained a character that is not a digit, separator or
    /// leading plus.
    #[error("Phone number contains invalid character '{0}'")]
    InvalidCharacter(char),

    /// The digit count falls outside the accepted window.
    #[error("Phone number has {digits} digits, expected 6 to 15")]
    InvalidLength { digits: usize },
}

/// A phone number in canonical form: `+` followed by country code and
/// national digits, no separators.
///
/// Only ever constructed through a [`PhoneNormalizer`] (or
/// [`PhoneNumber::from_canonical`] for already-canonical values).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Wraps a value that is already canonical, e.g. one read back from the
    /// store.
    pub fn from_canonical(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the canonical form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Port for phone canonicalization.
pub trait PhoneNormalizer: Send + Sync {
    /// Reduces user input to canonical form, or rejects it.
    fn normalize(&self, raw: &str) -> Result<PhoneNumber, PhoneError>;
}

/// Normalizer with a configurable default country code for national-format
/// input.
#[derive(Debug, Clone)]
pub struct DefaultPhoneNormalizer {
    country_code: String,
}

impl DefaultPhoneNormalizer {
    /// Creates a normalizer that expands national numbers with the given
    /// country code (e.g. `"+358"`).
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
        }
    }
}

impl Default for DefaultPhoneNormalizer {
    /// Finnish country code, matching the platform's home market.
    fn default() -> Self {
        Self::new("+358")
    }
}

impl PhoneNormalizer for DefaultPhoneNormalizer {
    fn normalize(&self, raw: &str) -> Result<PhoneNumber, PhoneError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }

        // Strip separators, keep digits and a leading plus.
        let mut compact = String::with_capacity(trimmed.len());
        for (i, c) in trimmed.chars().enumerate() {
            match c {
                '0'..='9' => compact.push(c),
                '+' if i == 0 => compact.push(c),
                ' ' | '-' | '(' | ')' | '.' => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        // Resolve the prefix to international form.
        let canonical = if let Some(rest) = compact.strip_prefix("00") {
            format!("+{rest}")
        } else if let Some(rest) = compact.strip_prefix('+') {
            format!("+{rest}")
        } else if let Some(rest) = compact.strip_prefix('0') {
            format!("{}{rest}", self.country_code)
        } else {
            format!("{}{compact}", self.country_code)
        };

        let digits = canonical.chars().filter(char::is_ascii_digit).count();
        if !(6..=15).contains(&digits) {
            return Err(PhoneError::InvalidLength { digits });
        }

        Ok(PhoneNumber(canonical))
    }
}
