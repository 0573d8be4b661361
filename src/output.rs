use crate::config::LogRecord;
use anyhow::{Result, anyhow};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const COLUMNS: [&str; 5] = ["timestamp", "level", "key_value_pairs", "message", "failure"];
const TIMESTAMP_OUT: &str = "%Y-%m-%dT%H:%M:%S";

type Sink = Box<dyn Write + Send>;

pub enum Writer {
    Debug(Sink),
    Json(Sink, bool), // bool tracks whether the opening bracket is still pending
    Jsonl(Sink),
    Csv(Sink, bool), // bool tracks if we've written headers
    Tsv(Sink, bool),
}

impl Writer {
    pub fn write_batch(&mut self, records: &[LogRecord]) -> Result<()> {
        match self {
            Writer::Debug(writer) => {
                for record in records {
                    writeln!(writer, "{:#?}", record)?;
                }
            }
            Writer::Json(writer, is_first) => {
                for record in records {
                    if *is_first {
                        write!(writer, "[")?;
                        *is_first = false;
                    } else {
                        write!(writer, ",")?;
                    }
                    let serialized = serde_json::to_string_pretty(record)?;
                    write!(writer, "\n{}", serialized)?;
                }
            }
            Writer::Jsonl(writer) => {
                for record in records {
                    let serialized = serde_json::to_string(record)?;
                    writeln!(writer, "{}", serialized)?;
                }
            }
            Writer::Csv(writer, headers_written) => {
                if !*headers_written {
                    writeln!(writer, "{}", COLUMNS.join(","))?;
                    *headers_written = true;
                }
                for record in records {
                    let row: Vec<String> = fields(record)
                        .iter()
                        .map(|f| escape_csv_field(f))
                        .collect();
                    writeln!(writer, "{}", row.join(","))?;
                }
            }
            Writer::Tsv(writer, headers_written) => {
                if !*headers_written {
                    writeln!(writer, "{}", COLUMNS.join("\t"))?;
                    *headers_written = true;
                }
                for record in records {
                    let row: Vec<String> = fields(record)
                        .iter()
                        .map(|f| escape_tsv_field(f))
                        .collect();
                    writeln!(writer, "{}", row.join("\t"))?;
                }
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        match self {
            Writer::Json(ref mut writer, is_first) => {
                if is_first {
                    write!(writer, "[")?;
                }
                writeln!(writer, "\n]")?;
                writer.flush()?;
            }
            Writer::Debug(ref mut writer)
            | Writer::Jsonl(ref mut writer)
            | Writer::Csv(ref mut writer, _)
            | Writer::Tsv(ref mut writer, _) => {
                writer.flush()?;
            }
        }
        Ok(())
    }
}

/// Pick a writer from the `--output` argument.
pub fn create_writer(output_arg: &str) -> Result<Writer> {
    match output_arg {
        "stdout" => Ok(Writer::Debug(Box::new(io::stdout()))),
        "json" => Ok(Writer::Json(Box::new(io::stdout()), true)),
        "jsonl" => Ok(Writer::Jsonl(Box::new(io::stdout()))),
        path if path.ends_with(".json") => Ok(Writer::Json(open_file(path)?, true)),
        path if path.ends_with(".jsonl") || path.ends_with(".ndjson") => {
            Ok(Writer::Jsonl(open_file(path)?))
        }
        path if path.ends_with(".csv") => Ok(Writer::Csv(open_file(path)?, false)),
        path if path.ends_with(".tsv") => Ok(Writer::Tsv(open_file(path)?, false)),
        path => {
            // Default to JSON file if it looks like a path
            if path.contains('/') || path.contains('\\') || path.contains('.') {
                Ok(Writer::Json(open_file(path)?, true))
            } else {
                Err(anyhow!(
                    "Unknown output format: {}. Use 'stdout', 'json', 'jsonl', or a file path",
                    output_arg
                ))
            }
        }
    }
}

fn open_file(file_path: &str) -> Result<Sink> {
    if let Some(parent) = Path::new(file_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(file_path)?;
    Ok(Box::new(BufWriter::new(file)))
}

fn fields(record: &LogRecord) -> [String; 5] {
    [
        record
            .timestamp()
            .map(|ts| ts.format(TIMESTAMP_OUT).to_string())
            .unwrap_or_default(),
        record.level().unwrap_or("").to_string(),
        record.key_value_pairs().unwrap_or("").to_string(),
        record.message().to_string(),
        record.failure().map(|f| f.to_string()).unwrap_or_default(),
    ]
}

fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn escape_tsv_field(field: &str) -> String {
    field
        .replace('\t', " ")
        .replace('\n', " ")
        .replace('\r', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineFailure;
    use crate::parsers::parse_line;

    fn sample() -> Vec<LogRecord> {
        vec![
            parse_line("2024-01-15 10:30:00 ERROR code=500 Connection failed, retrying").unwrap(),
            LogRecord::diagnostic(LineFailure::FieldParse, "bad \"ts\""),
        ]
    }

    fn write_to(name: &str, batches: &[&[LogRecord]]) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(name);
        let path_str = path.to_str().unwrap();
        let mut writer = create_writer(path_str).unwrap();
        for batch in batches {
            writer.write_batch(batch).unwrap();
        }
        writer.finish().unwrap();
        std::fs::read_to_string(&path).unwrap()
    }

    #[test]
    fn csv_has_header_and_escapes() {
        let records = sample();
        let out = write_to("out.csv", &[&records[..]]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "timestamp,level,key_value_pairs,message,failure");
        assert_eq!(
            lines[1],
            "2024-01-15T10:30:00,ERROR,code=500,\"Connection failed, retrying\","
        );
        assert_eq!(lines[2], ",,,\"Error parsing line: bad \"\"ts\"\"\",field_parse");
    }

    #[test]
    fn json_array_across_batches() {
        let records = sample();
        let out = write_to("out.json", &[&records[..1], &records[..0], &records[1..]]);
        let parsed: Vec<LogRecord> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn json_with_no_records_is_empty_array() {
        let out = write_to("empty.json", &[]);
        let parsed: Vec<LogRecord> = serde_json::from_str(&out).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn jsonl_one_object_per_line() {
        let records = sample();
        let out = write_to("out.ndjson", &[&records[..]]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"timestamp\":\"2024-01-15T10:30:00\""));
        assert!(lines[1].contains("\"failure\":\"field_parse\""));
    }

    #[test]
    fn tsv_flattens_tabs() {
        let r = parse_line("INFO a=b col1\tcol2").unwrap();
        let out = write_to("out.tsv", &[std::slice::from_ref(&r)]);
        assert_eq!(out.lines().nth(1), Some("\tINFO\ta=b\tcol1 col2\t"));
    }

    #[test]
    fn unknown_format_rejected() {
        assert!(create_writer("xml").is_err());
    }
}
