//! Concurrent parser for loosely structured log lines.
//!
//! Each line is matched against a single pattern with an optional
//! `YYYY-MM-DD HH:MM:SS` timestamp, an optional uppercase level, a run of
//! `key=value` tokens and a trailing message. Bulk parsing fans lines out
//! over a bounded worker pool and always returns one record per line, in
//! input order.

pub mod config;
pub mod output;
pub mod parsers;
pub mod reader;

pub use config::{LineFailure, LogRecord, ParseOptions};
pub use parsers::{ParseError, parse_line, parse_logs, parse_logs_with, parse_timestamp};
