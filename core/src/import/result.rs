use serde::Serialize;

use crate::import::executor::ExecutionSummary;
use crate::import::record::Origin;
pub use crate::import::validate::FailedInstance;

/// A statement that failed while the caller allowed the import to go on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub batch: usize,
    pub origins: Vec<Origin>,
    pub message: String,
}

/// Outcome of one import call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    /// Rows actually committed.
    pub num_inserts: u64,
    /// INSERT statements that succeeded.
    pub num_statements: usize,
    /// Records that failed validation, in input order.
    pub failed_instances: Vec<FailedInstance>,
    /// Database assigned keys in the order of the accepted records, when
    /// asked for and reported by the backend. `None` once any statement
    /// failed, since the list would no longer line up with the records.
    pub ids: Option<Vec<i64>>,
    /// Statements that failed under [`BatchErrorPolicy::Continue`](crate::BatchErrorPolicy).
    pub failures: Vec<BatchFailure>,
}

impl ImportResult {
    pub fn is_complete(&self) -> bool {
        self.failed_instances.is_empty() && self.failures.is_empty()
    }
}

pub fn aggregate(
    rejected: Vec<FailedInstance>,
    summary: ExecutionSummary,
    return_ids: bool,
) -> ImportResult {
    let ids = (return_ids && !summary.ids.is_empty() && summary.failures.is_empty())
        .then_some(summary.ids);

    ImportResult {
        num_inserts: summary.rows_inserted,
        num_statements: summary.statements,
        failed_instances: rejected,
        ids,
        failures: summary.failures,
    }
}
