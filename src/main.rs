use anyhow::{Result, anyhow};
use clap::Parser;
use crossbeam::channel::unbounded;
use loglines::{LogRecord, ParseOptions, output, parse_logs_with, reader};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "stdout")]
    output: String,

    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Worker threads per batch (defaults to available parallelism)
    #[arg(short, long)]
    workers: Option<NonZeroUsize>,

    /// Lines handed to the worker pool at once
    #[arg(long, default_value = "1000000")]
    batch_size: NonZeroUsize,

    #[arg(long)]
    benchmark: bool,
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loglines=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let options = match args.workers {
        Some(workers) => ParseOptions { workers },
        None => ParseOptions::default(),
    };

    let start_time = Instant::now();
    let file_size = std::fs::metadata(&args.file)?.len();
    let lines = reader::read_lines(&args.file)?;
    let total_lines = lines.len();
    info!(
        file = %args.file.display(),
        lines = total_lines,
        workers = options.workers.get(),
        "parsing log file"
    );

    // channel for sending parsed batches to writer
    let (tx, rx) = unbounded::<Vec<LogRecord>>();

    // spawn writer thread
    let output_arg = args.output.clone();
    let writer_handle = std::thread::spawn(move || -> Result<()> {
        let mut writer = output::create_writer(&output_arg)?;
        for batch in rx {
            writer.write_batch(&batch)?;
        }
        writer.finish()
    });

    let mut diagnostics = 0usize;
    for (n, batch) in lines.chunks(args.batch_size.get()).enumerate() {
        let records = parse_logs_with(batch, &options);
        diagnostics += records.iter().filter(|r| r.is_diagnostic()).count();
        debug!(batch = n, records = records.len(), "batch parsed");
        if tx.send(records).is_err() {
            // writer gave up; its error surfaces on join
            break;
        }
    }

    // close channel so writer thread can finish
    drop(tx);
    writer_handle
        .join()
        .map_err(|_| anyhow!("writer thread panicked"))??;

    if args.benchmark {
        print_benchmark_results(file_size, total_lines, diagnostics, start_time.elapsed());
    }

    Ok(())
}

fn print_benchmark_results(
    file_size: u64,
    total_lines: usize,
    diagnostics: usize,
    duration: std::time::Duration,
) {
    let duration_secs = duration.as_secs_f64();
    let file_size_mb = file_size as f64 / (1024.0 * 1024.0);
    let throughput_mbs = file_size_mb / duration_secs;
    let throughput_lines = total_lines as f64 / duration_secs;
    let parsed = total_lines - diagnostics;

    eprintln!("\n=== BENCHMARK RESULTS ===");
    eprintln!("File size: {:.2} MB", file_size_mb);
    eprintln!("Total lines: {}", total_lines);
    eprintln!("Parsed records: {}", parsed);
    eprintln!("Diagnostic records: {}", diagnostics);
    eprintln!("Processing time: {:.3}s", duration_secs);
    eprintln!("Throughput: {:.2} MB/s", throughput_mbs);
    eprintln!("Throughput: {:.0} lines/s", throughput_lines);
    if total_lines > 0 {
        eprintln!(
            "Parse success rate: {:.1}%",
            (parsed as f64 / total_lines as f64) * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_defaults() {
        let args = Args::try_parse_from(["loglines", "app.log"]).unwrap();
        assert_eq!(args.output, "stdout");
        assert_eq!(args.batch_size.get(), 1_000_000);
        assert!(args.workers.is_none());
        assert!(!args.benchmark);
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(Args::try_parse_from(["loglines", "-w", "0", "app.log"]).is_err());
        assert!(Args::try_parse_from(["loglines", "--batch-size", "0", "app.log"]).is_err());
    }

    #[test]
    fn explicit_flags() {
        let args =
            Args::try_parse_from(["loglines", "-o", "out.csv", "-w", "4", "--benchmark", "x.log"])
                .unwrap();
        assert_eq!(args.output, "out.csv");
        assert_eq!(args.workers.map(NonZeroUsize::get), Some(4));
        assert!(args.benchmark);
        assert_eq!(args.file, PathBuf::from("x.log"));
    }
}
