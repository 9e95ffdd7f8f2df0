//! Packs rendered value tuples into as few INSERT statements as the
//! statement size limit allows.
//!
//! A statement of `n` tuples costs `overhead + Σ size + (n - 1) * separator`
//! bytes. Batches are contiguous, so filling greedily from the left gives
//! the smallest batch count.

use std::ops::Range;

use crate::database::query_builder::TUPLE_SEPARATOR;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchLimits {
    /// Bytes of the statement outside the VALUES list.
    pub overhead: usize,
    /// Maximum statement size in bytes, `None` for unbounded.
    pub budget: Option<usize>,
    /// Maximum tuples per statement, `None` for unbounded.
    pub max_rows: Option<usize>,
}

/// A contiguous slice of the accepted records and the size of the
/// statement it renders to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub range: Range<usize>,
    pub bytes: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("record {index} renders to {size} bytes but only {available} fit in one statement")]
    RecordTooLarge { index: usize, size: usize, available: usize },
}

pub fn plan_batches(sizes: &[usize], limits: &BatchLimits) -> Result<Vec<Batch>, PlanError> {
    if let Some(budget) = limits.budget {
        let available = budget.saturating_sub(limits.overhead);
        if let Some((index, &size)) = sizes.iter().enumerate().find(|(_, &size)| size > available) {
            return Err(PlanError::RecordTooLarge { index, size, available });
        }
    }

    let max_rows = limits.max_rows.map(|rows| rows.max(1));
    let mut batches = Vec::new();
    let mut start = 0;
    let mut bytes = limits.overhead;

    for (index, &size) in sizes.iter().enumerate() {
        if index > start {
            let next = bytes + TUPLE_SEPARATOR.len() + size;
            let over_budget = limits.budget.is_some_and(|budget| next > budget);
            let over_rows = max_rows.is_some_and(|rows| index - start >= rows);

            if !over_budget && !over_rows {
                bytes = next;
                continue;
            }

            batches.push(Batch { range: start..index, bytes });
            start = index;
        }
        bytes = limits.overhead + size;
    }

    if start < sizes.len() {
        batches.push(Batch { range: start..sizes.len(), bytes });
    }

    Ok(batches)
}
