mod pool;
pub mod unstructured;

use thiserror::Error;

use crate::config::{LineFailure, LogRecord, ParseOptions};

pub use unstructured::{parse_line, parse_timestamp};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },

    #[error("worker panicked: {0}")]
    WorkerPanic(String),

    #[error("task for line {index} did not complete")]
    TaskLost { index: usize },
}

impl ParseError {
    /// Tag carried by the diagnostic record this error turns into.
    pub fn failure(&self) -> LineFailure {
        match self {
            ParseError::Timestamp { .. } => LineFailure::FieldParse,
            ParseError::WorkerPanic(_) | ParseError::TaskLost { .. } => LineFailure::Task,
        }
    }
}

/// Parse every line in parallel using one worker per available core.
///
/// Always returns exactly one record per input line, in input order.
pub fn parse_logs<S>(lines: &[S]) -> Vec<LogRecord>
where
    S: AsRef<str> + Sync,
{
    parse_logs_with(lines, &ParseOptions::default())
}

pub fn parse_logs_with<S>(lines: &[S], options: &ParseOptions) -> Vec<LogRecord>
where
    S: AsRef<str> + Sync,
{
    pool::dispatch(lines, options, parse_line)
}
