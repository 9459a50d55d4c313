//! Per-submission state machine.
//!
//! ```text
//! Collected --validate--> Validated --persist--> Persisted
//!     |                       |
//!     +--> Rejected           +--> Failed
//! ```
//!
//! Each transition consumes the previous state, so terminal states cannot
//! move again. A rejected or failed submission hands back its raw input so
//! the form can be corrected and resubmitted. Nothing is retried here.

use std::fmt;

use dbforminator_schema::{validate, RawRecord, Record, RecordRejected, Schema};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::SqlExecutor;
use crate::bridge::{RecordId, StorageBridge};
use crate::config::ConnectionDescriptor;
use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    /// Raw input gathered
    Collected,
    /// Record Validator succeeded
    Validated,
    /// Row inserted
    Persisted,
    /// Validation failed; no storage attempt was made
    Rejected,
    /// Storage attempt failed
    Failed,
}

impl SubmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collected => "collected",
            Self::Validated => "validated",
            Self::Persisted => "persisted",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Persisted | Self::Rejected | Self::Failed)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw input gathered from the form.
#[derive(Debug, Clone)]
pub struct Submission {
    input: RawRecord,
}

impl Submission {
    pub fn collect(input: RawRecord) -> Self {
        Self { input }
    }

    pub fn state(&self) -> SubmissionState {
        SubmissionState::Collected
    }

    pub fn input(&self) -> &RawRecord {
        &self.input
    }

    /// Run the Record Validator. On failure the submission is terminal.
    pub fn validate(self, schema: &Schema) -> Result<ValidatedSubmission, SubmissionOutcome> {
        match validate(schema, &self.input) {
            Ok(record) => Ok(ValidatedSubmission {
                input: self.input,
                record,
            }),
            Err(rejected) => {
                debug!(fields = ?rejected.fields().collect::<Vec<_>>(), "Submission rejected");
                Err(SubmissionOutcome::Rejected {
                    input: self.input,
                    rejected,
                })
            }
        }
    }
}

/// A submission whose record passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
    input: RawRecord,
    record: Record,
}

impl ValidatedSubmission {
    pub fn state(&self) -> SubmissionState {
        SubmissionState::Validated
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Insert on an open connection.
    pub fn persist<E: SqlExecutor + ?Sized>(self, bridge: &StorageBridge, conn: &E) -> SubmissionOutcome {
        let result = bridge.insert(&self.record, conn);
        self.finish(result)
    }

    /// Open a connection for this submission only, ensure the table, insert, close.
    pub fn persist_scoped(
        self,
        bridge: &StorageBridge,
        descriptor: &ConnectionDescriptor,
    ) -> SubmissionOutcome {
        let result = bridge.persist(descriptor, &self.record);
        self.finish(result)
    }

    fn finish(self, result: Result<RecordId, StorageError>) -> SubmissionOutcome {
        match result {
            Ok(id) => SubmissionOutcome::Persisted { id },
            Err(error) => {
                warn!(error = %error, "Submission failed to persist");
                SubmissionOutcome::Failed {
                    input: self.input,
                    error,
                }
            }
        }
    }
}

/// Terminal result of a submission.
#[derive(Debug)]
pub enum SubmissionOutcome {
    Persisted { id: RecordId },
    Rejected { input: RawRecord, rejected: RecordRejected },
    Failed { input: RawRecord, error: StorageError },
}

impl SubmissionOutcome {
    pub fn state(&self) -> SubmissionState {
        match self {
            Self::Persisted { .. } => SubmissionState::Persisted,
            Self::Rejected { .. } => SubmissionState::Rejected,
            Self::Failed { .. } => SubmissionState::Failed,
        }
    }

    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Self::Persisted { id } => Some(*id),
            _ => None,
        }
    }

    /// Raw input to restore into the form after a rejection or failure.
    pub fn input(&self) -> Option<&RawRecord> {
        match self {
            Self::Persisted { .. } => None,
            Self::Rejected { input, .. } | Self::Failed { input, .. } => Some(input),
        }
    }
}

/// Collect, validate, and persist on an open connection in one call.
pub fn submit<E: SqlExecutor + ?Sized>(
    bridge: &StorageBridge,
    input: RawRecord,
    conn: &E,
) -> SubmissionOutcome {
    match Submission::collect(input).validate(bridge.schema()) {
        Ok(validated) => validated.persist(bridge, conn),
        Err(outcome) => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DbValue, Dialect};
    use crate::bridge::StorageConfig;
    use crate::error::BackendError;
    use dbforminator_schema::{normalize, RawValue, SchemaOptions, StorageType};
    use serde_json::json;
    use std::cell::Cell;
    use std::sync::Arc;
    use std::time::Duration;

    struct FlakyExecutor {
        inserts: Cell<usize>,
        fail: bool,
    }

    impl SqlExecutor for FlakyExecutor {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        fn execute(&self, _sql: &str) -> Result<(), BackendError> {
            Ok(())
        }

        fn insert(&self, _sql: &str, _params: &[DbValue]) -> Result<i64, BackendError> {
            self.inserts.set(self.inserts.get() + 1);
            if self.fail {
                Err(BackendError::Timeout(Duration::from_secs(5)))
            } else {
                Ok(7)
            }
        }

        fn column_names(&self, _table: &str) -> Result<Vec<String>, BackendError> {
            Ok(Vec::new())
        }

        fn fetch_row(
            &self,
            _sql: &str,
            _params: &[DbValue],
            _columns: &[StorageType],
        ) -> Result<Option<Vec<DbValue>>, BackendError> {
            Ok(None)
        }
    }

    fn bridge() -> StorageBridge {
        let schema = normalize(
            &json!([
                {"id": "name", "type": "VARCHAR", "max_length": 10},
                {"id": "age", "type": "INTEGER"},
            ]),
            &SchemaOptions::default(),
        )
        .unwrap();
        StorageBridge::new(Arc::new(schema), StorageConfig::default()).unwrap()
    }

    fn raw(name: &str, age: &str) -> RawRecord {
        let mut raw = RawRecord::new();
        raw.insert("name".into(), RawValue::text(name));
        raw.insert("age".into(), RawValue::text(age));
        raw
    }

    #[test]
    fn test_collected_to_persisted() {
        let bridge = bridge();
        let submission = Submission::collect(raw("Alice", "30"));
        assert_eq!(submission.state(), SubmissionState::Collected);

        let validated = submission.validate(bridge.schema()).unwrap();
        assert_eq!(validated.state(), SubmissionState::Validated);

        let conn = FlakyExecutor { inserts: Cell::new(0), fail: false };
        let outcome = validated.persist(&bridge, &conn);
        assert_eq!(outcome.state(), SubmissionState::Persisted);
        assert_eq!(outcome.record_id(), Some(RecordId(7)));
        assert!(outcome.state().is_terminal());
    }

    #[test]
    fn test_rejected_makes_no_storage_attempt() {
        let bridge = bridge();
        let conn = FlakyExecutor { inserts: Cell::new(0), fail: false };
        let outcome = submit(&bridge, raw("ThisNameIsWayTooLong", "thirty"), &conn);

        assert_eq!(outcome.state(), SubmissionState::Rejected);
        assert_eq!(conn.inserts.get(), 0);
        match &outcome {
            SubmissionOutcome::Rejected { rejected, input } => {
                assert_eq!(rejected.len(), 2);
                assert_eq!(input.get("age"), Some(&RawValue::text("thirty")));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_storage_failure_keeps_input() {
        let bridge = bridge();
        let conn = FlakyExecutor { inserts: Cell::new(0), fail: true };
        let outcome = submit(&bridge, raw("Bob", "41"), &conn);

        assert_eq!(outcome.state(), SubmissionState::Failed);
        assert_eq!(conn.inserts.get(), 1);
        assert_eq!(outcome.input().unwrap().get("name"), Some(&RawValue::text("Bob")));
        match outcome {
            SubmissionOutcome::Failed { error, .. } => assert!(error.is_timeout()),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
