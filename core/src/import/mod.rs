//! The bulk import engine.
//!
//! An import call normalizes its input into records, validates them,
//! stamps timestamp columns, plans the fewest INSERT statements that fit the
//! statement size limit and executes them one after another on a single
//! connection.

pub mod executor;
pub mod normalize;
pub mod options;
pub mod planner;
pub mod record;
pub mod result;
pub mod timestamps;
pub mod validate;

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info};

use crate::database::backend::{BackendError, ImportBackend};
use crate::import::executor::{execute_batches, ExecutionSummary, InsertPlan};
use crate::import::normalize::{normalize, ImportInput};
use crate::import::options::ImportOptions;
use crate::import::planner::{plan_batches, BatchLimits, PlanError};
use crate::import::record::Origin;
use crate::import::result::{aggregate, ImportResult};
use crate::import::timestamps::{assign_timestamps, Clock, SystemClock, TimeZoneSetting};
use crate::import::validate::{validate_records, RecordValidator};

#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    #[error("Row {row} has {found} values but {expected} columns were given")]
    SchemaMismatch { row: usize, expected: usize, found: usize },

    #[error("Column {column} does not exist on {table}")]
    UnknownColumn { table: String, column: String },

    #[error("No columns to insert into {0}")]
    EmptyColumns(String),

    #[error("Record {origin:?} renders to {size} bytes but only {available} fit in one statement")]
    RecordTooLarge { origin: Origin, size: usize, available: usize },

    #[error("Batch {batch} failed after {committed} rows were committed: {source}")]
    ExecutionFailure { batch: usize, committed: u64, source: BackendError },

    #[error("{0}")]
    Backend(#[from] BackendError),
}

/// Imports rows into tables of one backend.
pub struct Importer<B> {
    backend: B,
    clock: Arc<dyn Clock>,
    time_zone: TimeZoneSetting,
    validators: HashMap<String, Arc<dyn RecordValidator>>,
}

impl<B: ImportBackend> Importer<B> {
    pub fn new(backend: B) -> Self {
        Importer {
            backend,
            clock: Arc::new(SystemClock),
            time_zone: TimeZoneSetting::default(),
            validators: HashMap::new(),
        }
    }

    pub fn with_time_zone(mut self, time_zone: TimeZoneSetting) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Registers the validator used for `table` when `validate` is on.
    pub fn with_validator(
        mut self,
        table: impl Into<String>,
        validator: impl RecordValidator + 'static,
    ) -> Self {
        self.validators.insert(table.into(), Arc::new(validator));
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn import(
        &self,
        table: &str,
        input: ImportInput<'_>,
        options: &ImportOptions,
    ) -> Result<ImportResult, ImportError> {
        info!("Importing {} rows into {}", input.len(), table);

        let schema = self.backend.resolve_columns(table).await?;
        let normalized = normalize(&input, &schema)?;

        if normalized.records.is_empty() {
            info!("Nothing to import into {}", table);
            return Ok(ImportResult::default());
        }
        if normalized.columns.is_empty() {
            return Err(ImportError::EmptyColumns(table.to_string()));
        }
        if let Some(column) = normalized.columns.iter().find(|column| !schema.has_column(column)) {
            return Err(ImportError::UnknownColumn {
                table: table.to_string(),
                column: column.clone(),
            });
        }

        let validator = self.validators.get(table).map(|validator| validator.as_ref());
        let outcome = validate_records(normalized.records, validator, options.validate);
        let mut accepted = outcome.accepted;

        let columns = if options.timestamps {
            let stamp = self.time_zone.wall_clock(self.clock.now());
            assign_timestamps(&mut accepted, normalized.columns, &schema, stamp)
        } else {
            normalized.columns
        };

        if accepted.is_empty() {
            info!("All {} rows for {} were rejected", outcome.rejected.len(), table);
            return Ok(aggregate(outcome.rejected, ExecutionSummary::default(), options.return_ids));
        }

        let want_ids = options.return_ids && schema.integer_primary_key().is_some();
        let template = self.backend.statement_template(&schema, &columns, want_ids);
        let tuples: Vec<String> =
            accepted.iter().map(|record| self.backend.render_values(record)).collect();
        let sizes: Vec<usize> = tuples.iter().map(String::len).collect();
        let limits = BatchLimits {
            overhead: template.overhead(),
            budget: options.batch_byte_limit.or_else(|| self.backend.max_statement_bytes()),
            max_rows: options.batch_size,
        };

        let batches = plan_batches(&sizes, &limits).map_err(|e| match e {
            PlanError::RecordTooLarge { index, size, available } => ImportError::RecordTooLarge {
                origin: accepted[index].origin(),
                size,
                available,
            },
        })?;
        debug!("Planned {} statements for {} rows into {}", batches.len(), accepted.len(), table);

        let mut connection = self.backend.connect().await?;
        let summary = execute_batches(
            &self.backend,
            connection.as_mut(),
            InsertPlan {
                template: &template,
                tuples: &tuples,
                records: &accepted,
                batches: &batches,
                want_ids,
            },
            options.on_batch_error,
        )
        .await?;
        drop(connection);

        let result = aggregate(outcome.rejected, summary, options.return_ids);
        info!(
            "Imported {} rows into {} with {} statements, {} rejected",
            result.num_inserts,
            table,
            result.num_statements,
            result.failed_instances.len()
        );

        Ok(result)
    }
}
