use crossbeam::channel::unbounded;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use super::ParseError;
use crate::config::{LineFailure, LogRecord, ParseOptions};

/// Run `parse` over every line on a pool of `options.workers` threads.
///
/// Each line is its own task and reports `(index, record)` back over a
/// channel; results land in a pre-sized slot vector, so the output order is
/// the submission order no matter which worker finishes first. The pool
/// lives only for this call.
pub(crate) fn dispatch<S, F>(lines: &[S], options: &ParseOptions, parse: F) -> Vec<LogRecord>
where
    S: AsRef<str> + Sync,
    F: Fn(&str) -> Result<LogRecord, ParseError> + Sync,
{
    if lines.is_empty() {
        return Vec::new();
    }

    let workers = options.workers.get();
    debug!(lines = lines.len(), workers, "dispatching batch");

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("loglines-worker-{i}"))
        .build();
    let slots = match pool {
        Ok(pool) => fill_on_pool(&pool, lines, &parse),
        Err(err) => {
            warn!(error = %err, "worker pool unavailable, parsing on the calling thread");
            fill_inline(lines, &parse)
        }
    };

    let records = resolve_slots(slots);
    let diagnostics = records.iter().filter(|r| r.is_diagnostic()).count();
    if diagnostics > 0 {
        warn!(diagnostics, total = records.len(), "lines resolved to diagnostic records");
    }
    records
}

/// One task per line on `pool`; results are placed by index as they arrive.
fn fill_on_pool<S, F>(pool: &ThreadPool, lines: &[S], parse: &F) -> Vec<Option<LogRecord>>
where
    S: AsRef<str> + Sync,
    F: Fn(&str) -> Result<LogRecord, ParseError> + Sync,
{
    let mut slots: Vec<Option<LogRecord>> = vec![None; lines.len()];
    let (tx, rx) = unbounded::<(usize, LogRecord)>();
    pool.scope(|scope| {
        for (index, line) in lines.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                // receiver outlives the scope
                let _ = tx.send((index, run_task(parse, line.as_ref())));
            });
        }
    });
    drop(tx);
    for (index, record) in rx {
        slots[index] = Some(record);
    }
    slots
}

fn fill_inline<S, F>(lines: &[S], parse: &F) -> Vec<Option<LogRecord>>
where
    S: AsRef<str>,
    F: Fn(&str) -> Result<LogRecord, ParseError>,
{
    lines
        .iter()
        .map(|line| Some(run_task(parse, line.as_ref())))
        .collect()
}

/// Empty slots become `TaskLost` diagnostics at their own position.
fn resolve_slots(slots: Vec<Option<LogRecord>>) -> Vec<LogRecord> {
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                LogRecord::diagnostic(LineFailure::Task, ParseError::TaskLost { index })
            })
        })
        .collect()
}

/// Parse one line, turning any error or panic into a diagnostic record.
fn run_task<F>(parse: &F, line: &str) -> LogRecord
where
    F: Fn(&str) -> Result<LogRecord, ParseError>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| parse(line))) {
        Ok(Ok(record)) => record,
        Ok(Err(err)) => {
            debug!(error = %err, "line parse failed");
            LogRecord::diagnostic(err.failure(), err)
        }
        Err(payload) => LogRecord::diagnostic(
            LineFailure::Task,
            ParseError::WorkerPanic(panic_message(payload.as_ref())),
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
