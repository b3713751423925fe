//! Phone number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input contains no characters after trimming.
    #[error("phone cannot be empty")]
    Empty,
    /// The input contains characters other than digits, `+` and separators.
    #[error("phone may only contain digits, spaces, dashes, dots, parentheses and a leading +")]
    InvalidCharacter,
    /// Too few digits.
    #[error("phone must have at least {min} digits")]
    TooShort {
        /// Minimum number of digits.
        min: usize,
    },
    /// Too many digits.
    #[error("phone must have at most {max} digits")]
    TooLong {
        /// Maximum number of digits.
        max: usize,
    },
}

/// A phone number, normalized to an optional leading `+` followed by digits.
///
/// Separators (spaces, dashes, dots, parentheses) are stripped. Customer
/// phones only need a few digits since the fulfillment bot re-confirms them;
/// store WhatsApp contacts use [`Phone::parse_whatsapp`], which requires a
/// dialable number.
///
/// ```
/// use live_commerce_core::Phone;
///
/// assert_eq!(Phone::parse("+1 (555) 010-9999").unwrap().as_str(), "+15550109999");
/// assert!(Phone::parse("call me").is_err());
/// assert!(Phone::parse_whatsapp("+1555").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Minimum digits for a customer contact phone.
    pub const MIN_DIGITS: usize = 3;
    /// Minimum digits for a store WhatsApp number.
    pub const WHATSAPP_MIN_DIGITS: usize = 8;
    /// Maximum digits (E.164 allows 15, leave room for extensions).
    pub const MAX_DIGITS: usize = 20;

    /// Parse and normalize a customer phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank, contains letters or symbols,
    /// or has fewer than 3 or more than 20 digits.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        Self::parse_with_min(s, Self::MIN_DIGITS)
    }

    /// Parse and normalize a WhatsApp contact number (at least 8 digits).
    ///
    /// # Errors
    ///
    /// Same as [`Phone::parse`], with the higher digit minimum.
    pub fn parse_whatsapp(s: &str) -> Result<Self, PhoneError> {
        Self::parse_with_min(s, Self::WHATSAPP_MIN_DIGITS)
    }

    fn parse_with_min(s: &str, min: usize) -> Result<Self, PhoneError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }

        let mut normalized = String::with_capacity(trimmed.len());
        for (i, c) in trimmed.chars().enumerate() {
            match c {
                '0'..='9' => normalized.push(c),
                '+' if i == 0 => normalized.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(PhoneError::InvalidCharacter),
            }
        }

        let digits = normalized.trim_start_matches('+').len();
        if digits < min {
            return Err(PhoneError::TooShort { min });
        }
        if digits > Self::MAX_DIGITS {
            return Err(PhoneError::TooLong {
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(normalized))
    }

    /// Returns the normalized number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Phone {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}
