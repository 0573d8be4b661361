use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Why a record carries a diagnostic instead of parsed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFailure {
    /// A captured field matched the pattern but could not be converted.
    FieldParse,
    /// The worker running the line failed or never reported back.
    Task,
}

impl std::fmt::Display for LineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineFailure::FieldParse => write!(f, "field_parse"),
            LineFailure::Task => write!(f, "task"),
        }
    }
}

/// One parsed log line. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    timestamp: Option<NaiveDateTime>,
    level: Option<String>,
    key_value_pairs: Option<String>,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<LineFailure>,
}

impl LogRecord {
    pub fn new(
        timestamp: Option<NaiveDateTime>,
        level: Option<String>,
        key_value_pairs: Option<String>,
        message: String,
    ) -> Self {
        Self {
            timestamp,
            level,
            key_value_pairs: key_value_pairs.filter(|kv| !kv.is_empty()),
            message,
            failure: None,
        }
    }

    /// Record for a line the pattern does not match: raw text only.
    pub fn fallback(line: &str) -> Self {
        Self::new(None, None, None, line.to_string())
    }

    pub fn diagnostic(failure: LineFailure, error: impl std::fmt::Display) -> Self {
        Self {
            timestamp: None,
            level: None,
            key_value_pairs: None,
            message: format!("Error parsing line: {}", error),
            failure: Some(failure),
        }
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }

    pub fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    pub fn key_value_pairs(&self) -> Option<&str> {
        self.key_value_pairs.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn failure(&self) -> Option<LineFailure> {
        self.failure
    }

    pub fn is_diagnostic(&self) -> bool {
        self.failure.is_some()
    }
}

/// Tunables for a bulk parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Upper bound on concurrently running line parsers.
    pub workers: NonZeroUsize,
}

impl ParseOptions {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: NonZeroUsize::new(workers).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
        }
    }
}
