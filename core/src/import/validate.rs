use std::{fmt, sync::Arc};

use serde::Serialize;
use tracing::{debug, warn};

use crate::database::sql_value::SqlValue;
use crate::import::record::{Origin, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub column: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(column: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError { column: Some(column.into()), message: message.into() }
    }

    pub fn base(message: impl Into<String>) -> Self {
        ValidationError { column: None, message: message.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{} {}", column, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Decides whether a record's data is acceptable for insertion.
pub trait RecordValidator: Send + Sync {
    fn validate(&self, record: &Record) -> Result<(), Vec<ValidationError>>;
}

impl<F> RecordValidator for F
where
    F: Fn(&Record) -> Result<(), Vec<ValidationError>> + Send + Sync,
{
    fn validate(&self, record: &Record) -> Result<(), Vec<ValidationError>> {
        self(record)
    }
}

type ValuePredicate = Arc<dyn Fn(&SqlValue) -> bool + Send + Sync>;

#[derive(Clone)]
enum Rule {
    Presence,
    MaxLength(usize),
    Custom { message: String, check: ValuePredicate },
}

/// A per-column rule set.
///
/// ```
/// use bulk_import::Rules;
///
/// let rules = Rules::new().presence("title").presence("author_name").max_length("title", 255);
/// ```
#[derive(Clone, Default)]
pub struct Rules {
    rules: Vec<(String, Rule)>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// The column must be present, non-null and, for strings, not blank.
    pub fn presence(mut self, column: impl Into<String>) -> Self {
        self.rules.push((column.into(), Rule::Presence));
        self
    }

    /// String values must be at most `max` characters long.
    pub fn max_length(mut self, column: impl Into<String>, max: usize) -> Self {
        self.rules.push((column.into(), Rule::MaxLength(max)));
        self
    }

    pub fn custom<F>(
        mut self,
        column: impl Into<String>,
        message: impl Into<String>,
        check: F,
    ) -> Self
    where
        F: Fn(&SqlValue) -> bool + Send + Sync + 'static,
    {
        let rule = Rule::Custom { message: message.into(), check: Arc::new(check) };
        self.rules.push((column.into(), rule));
        self
    }
}

impl fmt::Debug for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns: Vec<&String> = self.rules.iter().map(|(column, _)| column).collect();
        f.debug_struct("Rules").field("columns", &columns).finish()
    }
}

impl RecordValidator for Rules {
    fn validate(&self, record: &Record) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (column, rule) in &self.rules {
            let value = record.get(column);
            match rule {
                Rule::Presence => {
                    let blank = match value {
                        None | Some(SqlValue::Null) => true,
                        Some(SqlValue::String(s)) => s.trim().is_empty(),
                        Some(_) => false,
                    };
                    if blank {
                        errors.push(ValidationError::new(column, "can't be blank"));
                    }
                }
                Rule::MaxLength(max) => {
                    if let Some(SqlValue::String(s)) = value {
                        if s.chars().count() > *max {
                            errors.push(ValidationError::new(
                                column,
                                format!("is too long (maximum is {} characters)", max),
                            ));
                        }
                    }
                }
                Rule::Custom { message, check } => {
                    if !check(value.unwrap_or(&SqlValue::Null)) {
                        errors.push(ValidationError::new(column, message.clone()));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// A record that failed validation, kept verbatim with its origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedInstance {
    pub origin: Origin,
    #[serde(skip)]
    pub record: Record,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub accepted: Vec<Record>,
    pub rejected: Vec<FailedInstance>,
}

/// Splits records into accepted and rejected, keeping input order in both.
/// Every record is checked; a failure never stops the rest.
pub fn validate_records(
    records: Vec<Record>,
    validator: Option<&dyn RecordValidator>,
    enabled: bool,
) -> ValidationOutcome {
    let validator = match (enabled, validator) {
        (true, Some(validator)) => validator,
        (true, None) => {
            debug!("Validation requested but no validator configured, accepting all records");
            return ValidationOutcome { accepted: records, rejected: Vec::new() };
        }
        (false, _) => return ValidationOutcome { accepted: records, rejected: Vec::new() },
    };

    let mut outcome = ValidationOutcome::default();
    for record in records {
        match validator.validate(&record) {
            Ok(()) => outcome.accepted.push(record),
            Err(errors) => {
                warn!(
                    "Rejected record {:?}: {}",
                    record.origin(),
                    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                );
                outcome.rejected.push(FailedInstance { origin: record.origin(), record, errors });
            }
        }
    }

    outcome
}
