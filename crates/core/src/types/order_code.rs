//! Human-readable order codes.

use core::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Errors that can occur when building or parsing an [`OrderCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderCodeError {
    /// The prefix is not 1-8 uppercase ASCII letters.
    #[error("order code prefix must be 1-8 uppercase ASCII letters")]
    InvalidPrefix,
    /// The suffix is above 9999.
    #[error("order code suffix must be at most 9999")]
    SuffixOutOfRange,
    /// The string does not have the `PREFIX-YYYYMMDD-NNNN` shape.
    #[error("order code must look like PREFIX-YYYYMMDD-NNNN")]
    Malformed,
}

/// An order code of the shape `PREFIX-YYYYMMDD-NNNN`, e.g. `LC-20260314-0042`.
///
/// The date is the UTC calendar day the order was placed and `NNNN` is a
/// random four-digit suffix. Codes are unique across all tenants; that
/// guarantee comes from the database, not from this type.
///
/// ```
/// use chrono::NaiveDate;
/// use live_commerce_core::OrderCode;
///
/// let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
/// let code = OrderCode::new("LC", date, 42).unwrap();
/// assert_eq!(code.as_str(), "LC-20260314-0042");
/// assert_eq!(OrderCode::parse("LC-20260314-0042").unwrap(), code);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderCode(String);

impl OrderCode {
    /// Largest allowed suffix.
    pub const MAX_SUFFIX: u16 = 9999;

    /// Build a code from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is not 1-8 uppercase ASCII letters or
    /// the suffix is above 9999.
    pub fn new(prefix: &str, date: NaiveDate, suffix: u16) -> Result<Self, OrderCodeError> {
        if !is_valid_prefix(prefix) {
            return Err(OrderCodeError::InvalidPrefix);
        }
        if suffix > Self::MAX_SUFFIX {
            return Err(OrderCodeError::SuffixOutOfRange);
        }
        Ok(Self(format!("{prefix}-{}-{suffix:04}", date.format("%Y%m%d"))))
    }

    /// Parse a code string.
    ///
    /// # Errors
    ///
    /// Returns [`OrderCodeError::Malformed`] unless the input is a valid
    /// prefix, an existing calendar date and a four-digit suffix joined by
    /// dashes.
    pub fn parse(s: &str) -> Result<Self, OrderCodeError> {
        let mut parts = s.split('-');
        let (Some(prefix), Some(date), Some(suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(OrderCodeError::Malformed);
        };

        if !is_valid_prefix(prefix) {
            return Err(OrderCodeError::Malformed);
        }
        if date.len() != 8 || NaiveDate::parse_from_str(date, "%Y%m%d").is_err() {
            return Err(OrderCodeError::Malformed);
        }
        if suffix.len() != 4 || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderCodeError::Malformed);
        }

        Ok(Self(s.to_owned()))
    }

    /// The alphabetic prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }

    /// The calendar date embedded in the code.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        let date = self.0.split('-').nth(1)?;
        NaiveDate::parse_from_str(date, "%Y%m%d").ok()
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whether `prefix` can start an order code.
#[must_use]
pub fn is_valid_prefix(prefix: &str) -> bool {
    (1..=8).contains(&prefix.len()) && prefix.bytes().all(|b| b.is_ascii_uppercase())
}

impl fmt::Display for OrderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OrderCode {
    type Error = OrderCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderCode> for String {
    fn from(code: OrderCode) -> Self {
        code.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for OrderCode {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for OrderCode {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for OrderCode {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    #[test]
    fn test_new_pads_suffix() {
        assert_eq!(OrderCode::new("LC", day(), 7).unwrap().as_str(), "LC-20260105-0007");
        assert_eq!(OrderCode::new("LC", day(), 9999).unwrap().as_str(), "LC-20260105-9999");
    }

    #[test]
    fn test_new_rejects_bad_parts() {
        assert_eq!(OrderCode::new("lc", day(), 1), Err(OrderCodeError::InvalidPrefix));
        assert_eq!(OrderCode::new("", day(), 1), Err(OrderCodeError::InvalidPrefix));
        assert_eq!(
            OrderCode::new("LC", day(), 10_000),
            Err(OrderCodeError::SuffixOutOfRange)
        );
    }

    #[test]
    fn test_parse_accessors() {
        let code = OrderCode::parse("SHOP-20251231-0420").unwrap();
        assert_eq!(code.prefix(), "SHOP");
        assert_eq!(code.date(), NaiveDate::from_ymd_opt(2025, 12, 31));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "LC-20260105",
            "LC-20260105-42",
            "LC-20261305-0042",
            "lc-20260105-0042",
            "LC-20260105-0042-1",
            "LC-2026015-00420",
        ] {
            assert_eq!(OrderCode::parse(bad), Err(OrderCodeError::Malformed), "{bad}");
        }
    }
}
