use serde::{Deserialize, Serialize};

/// What to do when a statement fails at the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchErrorPolicy {
    /// Stop and return the error. Batches already executed stay committed.
    #[default]
    Abort,
    /// Record the failure in the result and carry on with the next batch.
    Continue,
}

/// Per-call import options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Run each record through the table's validator first.
    pub validate: bool,

    /// Fill `created_at`/`updated_at` (and `created_on`/`updated_on`) when
    /// the table has them.
    pub timestamps: bool,

    /// Maximum statement size in bytes. Falls back to the backend maximum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_byte_limit: Option<usize>,

    /// Maximum rows per statement, on top of the byte limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// Collect the primary keys the database assigns, where it reports them.
    pub return_ids: bool,

    pub on_batch_error: BatchErrorPolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            validate: true,
            timestamps: true,
            batch_byte_limit: None,
            batch_size: None,
            return_ids: true,
            on_batch_error: BatchErrorPolicy::Abort,
        }
    }
}

impl ImportOptions {
    pub fn without_validation() -> Self {
        ImportOptions { validate: false, ..Default::default() }
    }
}
