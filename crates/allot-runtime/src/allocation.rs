#![forbid(unsafe_code)]

//! The allocation ledger.
//!
//! [`AllocationState`] holds the total budget and one amount per bucket.
//!
//! # Invariants
//!
//! 1. `sum(allocations) <= total_budget` after every public operation.
//! 2. `remaining_cash() == total_budget - sum(allocations)`, never negative.
//! 3. The bucket count is fixed at construction.
//!
//! Amounts outside the permitted range are clamped rather than rejected;
//! [`AllocationState::set_bucket`] returns the amount actually applied so
//! callers can see when clamping happened.

use std::fmt;

use allot_core::money::Amount;

/// Granularity of slider-driven amounts.
pub const SLIDER_STEP: Amount = 100_000;

/// Errors from ledger operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Bucket index outside `0..len`.
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of buckets.
        len: usize,
    },
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { index, len } => {
                write!(f, "bucket index {index} out of range (have {len} buckets)")
            }
        }
    }
}

impl std::error::Error for AllocationError {}

/// Whether loading prior allocations required rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Budgets matched; allocations copied verbatim.
    Unchanged,
    /// Budgets differed; allocations scaled by `new / previous` and floored.
    Rescaled {
        /// Budget the allocations were made against.
        previous_budget: Amount,
        /// Amount removed to restore `sum <= budget`, normally zero.
        trimmed: Amount,
    },
}

impl MigrationOutcome {
    /// Whether the stored budget differed from the current one.
    #[must_use]
    pub const fn was_rescaled(&self) -> bool {
        matches!(self, Self::Rescaled { .. })
    }
}

/// Total budget plus per-bucket allocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationState {
    total_budget: Amount,
    allocations: Vec<Amount>,
    schema_version: String,
}

impl AllocationState {
    /// Create an empty ledger with `buckets` zeroed buckets.
    #[must_use]
    pub fn new(total_budget: Amount, buckets: usize, schema_version: impl Into<String>) -> Self {
        Self {
            total_budget,
            allocations: vec![0; buckets],
            schema_version: schema_version.into(),
        }
    }

    /// Total budget.
    #[inline]
    #[must_use]
    pub fn total_budget(&self) -> Amount {
        self.total_budget
    }

    /// Per-bucket amounts.
    #[inline]
    #[must_use]
    pub fn allocations(&self) -> &[Amount] {
        &self.allocations
    }

    /// Schema version stamped on persisted copies.
    #[inline]
    #[must_use]
    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    /// Number of buckets.
    #[inline]
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.allocations.len()
    }

    /// Amount in bucket `index`.
    pub fn bucket(&self, index: usize) -> Result<Amount, AllocationError> {
        self.allocations
            .get(index)
            .copied()
            .ok_or(AllocationError::IndexOutOfRange {
                index,
                len: self.allocations.len(),
            })
    }

    /// Sum of all allocations.
    #[must_use]
    pub fn allocated(&self) -> Amount {
        self.allocations
            .iter()
            .fold(0, |acc: Amount, &a| acc.saturating_add(a))
    }

    /// Budget not yet placed in any bucket.
    #[must_use]
    pub fn remaining_cash(&self) -> Amount {
        self.total_budget.saturating_sub(self.allocated())
    }

    /// Largest amount bucket `index` could hold given the other buckets.
    pub fn bucket_capacity(&self, index: usize) -> Result<Amount, AllocationError> {
        let current = self.bucket(index)?;
        Ok(self.remaining_cash().saturating_add(current))
    }

    /// Set bucket `index` to `amount`, clamped to its capacity.
    ///
    /// Returns the amount actually stored.
    pub fn set_bucket(&mut self, index: usize, amount: Amount) -> Result<Amount, AllocationError> {
        let capacity = self.bucket_capacity(index)?;
        let applied = amount.min(capacity);
        if applied != amount {
            tracing::debug!(index, requested = amount, applied, "clamped bucket amount");
        }
        self.allocations[index] = applied;
        Ok(applied)
    }

    /// Add `delta` to bucket `index`, clamped to its capacity.
    ///
    /// Returns the new bucket amount.
    pub fn add_to_bucket(&mut self, index: usize, delta: Amount) -> Result<Amount, AllocationError> {
        let current = self.bucket(index)?;
        self.set_bucket(index, current.saturating_add(delta))
    }

    /// Zero every bucket.
    pub fn reset_allocations(&mut self) {
        self.allocations.iter_mut().for_each(|a| *a = 0);
    }

    /// Adopt allocations saved against `previous_budget`.
    ///
    /// When the budgets differ, each amount is scaled by
    /// `total_budget / previous_budget` and floored. If the result would
    /// still exceed the budget (only possible when the saved allocations
    /// already overspent their own budget) the excess is trimmed from the
    /// last bucket backwards.
    ///
    /// `previous_allocations` must have one entry per bucket; extra entries
    /// are ignored and missing ones read as zero.
    pub fn migrate_from(
        &mut self,
        previous_budget: Amount,
        previous_allocations: &[Amount],
    ) -> MigrationOutcome {
        let rescale = previous_budget != 0 && previous_budget != self.total_budget;
        for (i, slot) in self.allocations.iter_mut().enumerate() {
            let prior = previous_allocations.get(i).copied().unwrap_or(0);
            *slot = if rescale {
                scale_floor(prior, self.total_budget, previous_budget)
            } else {
                prior
            };
        }

        let trimmed = self.trim_to_budget();
        if trimmed > 0 {
            tracing::warn!(
                previous_budget,
                total_budget = self.total_budget,
                trimmed,
                "restored allocations exceeded budget, trimmed"
            );
        }

        if rescale {
            MigrationOutcome::Rescaled {
                previous_budget,
                trimmed,
            }
        } else {
            MigrationOutcome::Unchanged
        }
    }

    fn trim_to_budget(&mut self) -> Amount {
        let mut excess = self.allocated().saturating_sub(self.total_budget);
        let trimmed = excess;
        for slot in self.allocations.iter_mut().rev() {
            if excess == 0 {
                break;
            }
            let cut = excess.min(*slot);
            *slot -= cut;
            excess -= cut;
        }
        trimmed
    }
}

/// `floor(amount * numerator / denominator)` without intermediate overflow.
fn scale_floor(amount: Amount, numerator: Amount, denominator: Amount) -> Amount {
    let scaled = u128::from(amount) * u128::from(numerator) / u128::from(denominator);
    Amount::try_from(scaled).unwrap_or(Amount::MAX)
}

/// Map a slider handle position to an amount.
///
/// `fraction` is clamped to `0.0..=1.0`; the result is `fraction * max`
/// rounded to the nearest [`SLIDER_STEP`].
#[must_use]
pub fn slider_amount(fraction: f64, max: Amount) -> Amount {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let steps = (fraction * max as f64 / SLIDER_STEP as f64).round();
    (steps as Amount).saturating_mul(SLIDER_STEP)
}
