use tracing::{debug, error, warn};

use crate::database::backend::{ImportBackend, ImportConnection, StatementTemplate};
use crate::import::options::BatchErrorPolicy;
use crate::import::planner::Batch;
use crate::import::record::Record;
use crate::import::result::BatchFailure;
use crate::import::ImportError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub rows_inserted: u64,
    pub statements: usize,
    pub ids: Vec<i64>,
    pub failures: Vec<BatchFailure>,
}

/// Everything needed to turn planned batches into statements.
pub struct InsertPlan<'a> {
    pub template: &'a StatementTemplate,
    pub tuples: &'a [String],
    pub records: &'a [Record],
    pub batches: &'a [Batch],
    pub want_ids: bool,
}

/// Runs one statement per batch, in order, on a single connection. Only
/// batches that succeed add to the inserted count.
pub async fn execute_batches<B: ImportBackend + ?Sized>(
    backend: &B,
    connection: &mut dyn ImportConnection,
    plan: InsertPlan<'_>,
    policy: BatchErrorPolicy,
) -> Result<ExecutionSummary, ImportError> {
    let mut summary = ExecutionSummary::default();

    for (index, batch) in plan.batches.iter().enumerate() {
        let statement = backend.render_insert(plan.template, &plan.tuples[batch.range.clone()]);
        debug!(
            "Executing batch {}/{}: {} rows, {} bytes",
            index + 1,
            plan.batches.len(),
            statement.rows,
            statement.byte_len()
        );

        match connection.execute(&statement, plan.want_ids).await {
            Ok(outcome) => {
                summary.rows_inserted += outcome.rows_affected;
                summary.statements += 1;
                summary.ids.extend(outcome.ids);
            }
            Err(e) => match policy {
                BatchErrorPolicy::Abort => {
                    error!(
                        "Batch {} failed after {} rows were committed: {}",
                        index, summary.rows_inserted, e
                    );
                    return Err(ImportError::ExecutionFailure {
                        batch: index,
                        committed: summary.rows_inserted,
                        source: e,
                    });
                }
                BatchErrorPolicy::Continue => {
                    warn!("Batch {} failed, continuing with the next one: {}", index, e);
                    summary.failures.push(BatchFailure {
                        batch: index,
                        origins: plan.records[batch.range.clone()]
                            .iter()
                            .map(Record::origin)
                            .collect(),
                        message: e.to_string(),
                    });
                }
            },
        }
    }

    Ok(summary)
}
