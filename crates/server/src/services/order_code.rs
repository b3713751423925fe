//! Order code allocation.
//!
//! Codes look like `LC-20260314-0042`. The generator draws a random suffix,
//! skips candidates already in use and gives up after [`MAX_CODE_ATTEMPTS`].
//! The pre-check is advisory: the unique constraint on `orders.code` is what
//! actually guarantees uniqueness, so a storage-level collision consumes an
//! attempt from the same budget and the caller retries.

use std::sync::Arc;

use chrono::NaiveDate;
use rand::Rng;
use thiserror::Error;

use live_commerce_core::order_code::is_valid_prefix;
use live_commerce_core::{OrderCode, OrderCodeError};

use crate::db::{OrderStore, RepositoryError};

/// Attempts allowed per order creation, pre-check and insert collisions
/// combined.
pub const MAX_CODE_ATTEMPTS: u32 = 10;

/// Prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "LC";

/// Errors from code allocation.
#[derive(Debug, Error)]
pub enum CodeError {
    /// Every attempt collided.
    #[error("could not allocate unique code after {MAX_CODE_ATTEMPTS} attempts")]
    Exhausted,

    #[error(transparent)]
    Format(#[from] OrderCodeError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Source of four-digit suffixes.
pub trait SuffixSource: Send + Sync {
    /// A suffix in `0..=9999`.
    fn next_suffix(&self) -> u16;
}

/// Uniformly random suffixes from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSuffix;

impl SuffixSource for RandomSuffix {
    fn next_suffix(&self) -> u16 {
        rand::rng().random_range(0..=OrderCode::MAX_SUFFIX)
    }
}

/// Replays a fixed list of suffixes, then repeats the last one.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct SequenceSuffix {
    values: std::sync::Mutex<std::collections::VecDeque<u16>>,
}

#[cfg(any(test, feature = "testing"))]
impl SequenceSuffix {
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = u16>) -> Self {
        Self {
            values: std::sync::Mutex::new(values.into_iter().collect()),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
impl SuffixSource for SequenceSuffix {
    #[allow(clippy::unwrap_used)]
    fn next_suffix(&self) -> u16 {
        let mut values = self.values.lock().unwrap();
        if values.len() > 1 {
            values.pop_front().unwrap_or_default()
        } else {
            values.front().copied().unwrap_or_default()
        }
    }
}

/// Per-order attempt counter shared by the pre-check and the insert.
#[derive(Debug, Default)]
pub struct CodeAttempts {
    used: u32,
}

impl CodeAttempts {
    /// Consume one attempt. Returns `false` once the budget is spent.
    pub const fn take(&mut self) -> bool {
        if self.used >= MAX_CODE_ATTEMPTS {
            return false;
        }
        self.used += 1;
        true
    }

    /// Attempts consumed so far.
    #[must_use]
    pub const fn used(&self) -> u32 {
        self.used
    }
}

/// Generates order codes with a fixed prefix.
#[derive(Clone)]
pub struct OrderCodeGenerator {
    prefix: String,
    source: Arc<dyn SuffixSource>,
}

impl std::fmt::Debug for OrderCodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderCodeGenerator")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl OrderCodeGenerator {
    /// Random suffixes with the given prefix.
    ///
    /// # Errors
    ///
    /// Returns `OrderCodeError::InvalidPrefix` unless the prefix is 1-8
    /// uppercase ASCII letters.
    pub fn new(prefix: &str) -> Result<Self, OrderCodeError> {
        Self::with_source(prefix, Arc::new(RandomSuffix))
    }

    /// Use a custom suffix source.
    ///
    /// # Errors
    ///
    /// Returns `OrderCodeError::InvalidPrefix` unless the prefix is 1-8
    /// uppercase ASCII letters.
    pub fn with_source(
        prefix: &str,
        source: Arc<dyn SuffixSource>,
    ) -> Result<Self, OrderCodeError> {
        if !is_valid_prefix(prefix) {
            return Err(OrderCodeError::InvalidPrefix);
        }
        Ok(Self {
            prefix: prefix.to_owned(),
            source,
        })
    }

    /// The configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// A candidate for `date`, not checked against the store.
    ///
    /// # Errors
    ///
    /// Returns `OrderCodeError` if the suffix source misbehaves.
    pub fn candidate(&self, date: NaiveDate) -> Result<OrderCode, OrderCodeError> {
        OrderCode::new(&self.prefix, date, self.source.next_suffix())
    }

    /// Draw candidates until one is not in use, spending from `attempts`.
    ///
    /// # Errors
    ///
    /// Returns `CodeError::Exhausted` when the budget runs out, or
    /// `CodeError::Repository` if the lookup fails.
    pub async fn generate<S>(
        &self,
        store: &S,
        date: NaiveDate,
        attempts: &mut CodeAttempts,
    ) -> Result<OrderCode, CodeError>
    where
        S: OrderStore + ?Sized,
    {
        while attempts.take() {
            let code = self.candidate(date)?;
            if !store.code_exists(&code).await? {
                return Ok(code);
            }
            tracing::debug!(code = %code, attempt = attempts.used(), "Order code collision");
        }
        Err(CodeError::Exhausted)
    }
}
