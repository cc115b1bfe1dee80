//! Warning sink for non-fatal problems found during a run

use std::sync::Mutex;

/// Receives one line per dropped source or incomplete record
pub trait Reporter: Send + Sync {
    fn warn(&self, message: &str);
}

/// Forwards warnings to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "anyxml_source", "{}", message);
    }
}

/// Keeps warnings in memory, in the order they were reported
#[derive(Debug, Default)]
pub struct CollectingReporter {
    warnings: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Reporter for CollectingReporter {
    fn warn(&self, message: &str) {
        self.warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.to_string());
    }
}

/// Reporter wrapper that also keeps a copy of every warning
///
/// The engine uses this to count warnings for the run summary while still
/// forwarding them to the caller's reporter.
pub struct TeeReporter<'a> {
    inner: &'a dyn Reporter,
    seen: CollectingReporter,
}

impl<'a> TeeReporter<'a> {
    pub fn new(inner: &'a dyn Reporter) -> Self {
        Self {
            inner,
            seen: CollectingReporter::new(),
        }
    }

    pub fn into_warnings(self) -> Vec<String> {
        self.seen.warnings()
    }
}

impl Reporter for TeeReporter<'_> {
    fn warn(&self, message: &str) {
        self.seen.warn(message);
        self.inner.warn(message);
    }
}
