//! Storefront slug type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// Fewer than [`Slug::MIN_LENGTH`] characters.
    #[error("slug must be at least {min} characters")]
    TooShort {
        /// Minimum length.
        min: usize,
    },
    /// More than [`Slug::MAX_LENGTH`] characters.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum length.
        max: usize,
    },
    /// Contains something other than `a-z`, `0-9` or `-`.
    #[error("slug may only contain lowercase letters, digits and dashes")]
    InvalidCharacter,
    /// Starts or ends with a dash.
    #[error("slug cannot start or end with a dash")]
    EdgeDash,
}

/// The public path segment identifying a store, e.g. `acme` in
/// `/stores/acme`.
///
/// Slugs are case-sensitive: parsing never lowercases, so `Acme` is rejected
/// rather than silently resolving to `acme`.
///
/// ```
/// use live_commerce_core::Slug;
///
/// assert!(Slug::parse("acme-shop").is_ok());
/// assert!(Slug::parse("Acme").is_err());
/// assert_eq!(Slug::suggest("Café Luna & Co").as_deref(), Some("caf-luna-co"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Minimum slug length.
    pub const MIN_LENGTH: usize = 3;
    /// Maximum slug length.
    pub const MAX_LENGTH: usize = 50;

    /// Parse a slug exactly as given.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is outside 3-50 characters, contains
    /// anything other than lowercase ASCII letters, digits and dashes, or
    /// starts or ends with a dash.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.len() < Self::MIN_LENGTH {
            return Err(SlugError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(SlugError::InvalidCharacter);
        }
        if s.starts_with('-') || s.ends_with('-') {
            return Err(SlugError::EdgeDash);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug candidate from a display name.
    ///
    /// Lowercases, drops characters outside `a-z0-9`, turns whitespace and
    /// dash runs into a single dash and caps the result at 30 characters.
    /// Returns `None` when nothing usable remains.
    #[must_use]
    pub fn suggest(name: &str) -> Option<Self> {
        let mut out = String::new();
        let mut pending_dash = false;
        for c in name.trim().to_lowercase().chars() {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c);
            } else if c.is_whitespace() || c == '-' {
                pending_dash = true;
            }
            if out.len() >= 30 {
                break;
            }
        }
        let trimmed = out.trim_end_matches('-');
        Self::parse(trimmed).ok()
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for Slug {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}
