use keel::TraceSink;
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedStatement {
    pub trace_id: String,
    pub sql: String,
    pub params: String,
    pub fingerprint: String,
}

/// Keeps every traced statement, lets a test count round trips.
#[derive(Default, Debug)]
pub struct RecordingSink {
    statements: Mutex<Vec<TracedStatement>>,
    completed: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn statements(&self, trace_id: &str) -> Vec<TracedStatement> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|v| v.trace_id == trace_id)
            .cloned()
            .collect()
    }

    /// Fingerprints reported after execution, in order.
    pub fn completed(&self) -> Vec<String> {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TraceSink for RecordingSink {
    fn before(&self, trace_id: &str, sql: &str, params: &str, fingerprint: &str) {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TracedStatement {
                trace_id: trace_id.into(),
                sql: sql.into(),
                params: params.into(),
                fingerprint: fingerprint.into(),
            });
    }

    fn after(&self, _trace_id: &str, fingerprint: &str, _elapsed: Duration) {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fingerprint.into());
    }
}
