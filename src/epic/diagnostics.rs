// SPDX-License-Identifier: MIT

//! Diagnostics channel
//!
//! Every contained failure in the dispatch pipeline is reported as a
//! [`Diagnostic`] to an injectable [`DiagnosticSink`]. Nothing is ever
//! propagated to the caller of `dispatch`.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use super::action::Action;
use super::error::TypelessError;

/// How much the pipeline reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Only contained failures
    #[default]
    Errors,
    /// Failures plus every action routed to a handler (development mode)
    Trace,
}

impl Verbosity {
    pub fn traces(self) -> bool {
        self == Verbosity::Trace
    }
}

impl FromStr for Verbosity {
    type Err = TypelessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "errors" | "error" => Ok(Verbosity::Errors),
            "trace" | "development" => Ok(Verbosity::Trace),
            other => Err(TypelessError::config(format!(
                "Unknown verbosity '{}', expected 'errors' or 'trace'",
                other
            ))),
        }
    }
}

/// What happened
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    /// A handler returned an error or panicked
    HandlerFailed {
        epic: String,
        source: Action,
        error: String,
    },
    /// A handler emitted nothing where an action was expected
    MissingAction { epic: String, source: Action },
    /// A handler emitted a value that is not an action
    MalformedAction {
        epic: String,
        source: Action,
        value: Value,
    },
    /// A malformed action was dispatched from outside
    InvalidDispatch { action: Action },
    /// Publishing the action panicked; the action was not committed
    ReducerFailed { action: Action, error: String },
    /// An action was routed to a handler
    Trace { epic: String, action: Action },
}

/// A timestamped diagnostic record
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub at: DateTime<Utc>,
    pub event: DiagnosticEvent,
}

impl Diagnostic {
    pub fn new(event: DiagnosticEvent) -> Self {
        Self {
            at: Utc::now(),
            event,
        }
    }

    pub fn handler_failed(epic: &str, source: &Action, error: impl fmt::Display) -> Self {
        Self::new(DiagnosticEvent::HandlerFailed {
            epic: epic.to_string(),
            source: source.clone(),
            error: error.to_string(),
        })
    }

    pub fn missing_action(epic: &str, source: &Action) -> Self {
        Self::new(DiagnosticEvent::MissingAction {
            epic: epic.to_string(),
            source: source.clone(),
        })
    }

    pub fn malformed_action(epic: &str, source: &Action, value: Value) -> Self {
        Self::new(DiagnosticEvent::MalformedAction {
            epic: epic.to_string(),
            source: source.clone(),
            value,
        })
    }

    pub fn reducer_failed(action: &Action, error: impl fmt::Display) -> Self {
        Self::new(DiagnosticEvent::ReducerFailed {
            action: action.clone(),
            error: error.to_string(),
        })
    }

    pub fn trace(epic: &str, action: &Action) -> Self {
        Self::new(DiagnosticEvent::Trace {
            epic: epic.to_string(),
            action: action.clone(),
        })
    }

    /// Everything except traces
    pub fn is_error(&self) -> bool {
        !matches!(self.event, DiagnosticEvent::Trace { .. })
    }

    /// Name of the epic involved, if any
    pub fn epic(&self) -> Option<&str> {
        match &self.event {
            DiagnosticEvent::HandlerFailed { epic, .. }
            | DiagnosticEvent::MissingAction { epic, .. }
            | DiagnosticEvent::MalformedAction { epic, .. }
            | DiagnosticEvent::Trace { epic, .. } => Some(epic),
            DiagnosticEvent::InvalidDispatch { .. } | DiagnosticEvent::ReducerFailed { .. } => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.event {
            DiagnosticEvent::HandlerFailed {
                epic,
                source,
                error,
            } => write!(
                f,
                "Unhandled epic error on action. epic={} source={} error={}",
                epic, source, error
            ),
            DiagnosticEvent::MissingAction { epic, source } => write!(
                f,
                "Undefined action returned in epic. epic={} source={}",
                epic, source
            ),
            DiagnosticEvent::MalformedAction {
                epic,
                source,
                value,
            } => write!(
                f,
                "Invalid action returned in epic. epic={} source={} action={}",
                epic, source, value
            ),
            DiagnosticEvent::InvalidDispatch { action } => {
                write!(f, "Invalid action dispatched. action={}", action.to_value())
            }
            DiagnosticEvent::ReducerFailed { action, error } => write!(
                f,
                "Reducer failed on action. action={} error={}",
                action, error
            ),
            DiagnosticEvent::Trace { epic, action } => {
                write!(f, "epic={} action={}", epic, action)
            }
        }
    }
}

/// Receives diagnostic records
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);
}

/// Writes diagnostics through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, diagnostic: Diagnostic) {
        if diagnostic.is_error() {
            log::error!("{}", diagnostic);
        } else {
            log::debug!("{}", diagnostic);
        }
    }
}

static LOG_SINK: Lazy<Arc<LogSink>> = Lazy::new(|| Arc::new(LogSink));

/// Shared [`LogSink`] used when no sink is configured
pub fn default_sink() -> Arc<dyn DiagnosticSink> {
    LOG_SINK.clone()
}

/// In-memory sink. Keeps every record for later inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records so far
    pub fn records(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Records excluding traces
    pub fn errors(&self) -> Vec<Diagnostic> {
        self.lock().iter().filter(|d| d.is_error()).cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        // A poisoned lock still holds valid records
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn record(&self, diagnostic: Diagnostic) {
        (**self).record(diagnostic)
    }
}
