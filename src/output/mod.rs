//! Table serialization for parsed records
//!
//! Writers pull records lazily from an iterator and stream them into a
//! temporary file beside the destination. The file is renamed into place
//! only after the last record is written, so a failure part way through
//! leaves no output behind.

mod columnar;

pub use columnar::{read_parquet, ParquetRecordWriter};

use std::fmt;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult, OutputError, OutputResult};
use crate::utils::{open_source, SourceReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A single JSON array
    Json,
    /// One JSON object per line
    Jsonl,
    /// Comma separated with a header row
    Csv,
    /// Snappy-compressed Parquet with one nullable column per field
    Parquet,
}

impl OutputFormat {
    /// Infer the format from a file extension; a trailing `.gz` is looked through
    pub fn from_path(path: &Path) -> OutputResult<Self> {
        let mut extension = extension_of(path);
        if extension.as_deref() == Some("gz") {
            extension = path
                .file_stem()
                .and_then(|stem| extension_of(Path::new(stem)));
        }

        match extension.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("jsonl") | Some("ndjson") => Ok(Self::Jsonl),
            Some("csv") => Ok(Self::Csv),
            Some("parquet") | Some("pq") => Ok(Self::Parquet),
            _ => Err(OutputError::UnsupportedFormat {
                format: path.display().to_string(),
            }),
        }
    }

    /// Explicit format if given, else inferred from `path`
    pub fn resolve(explicit: Option<Self>, path: &Path) -> OutputResult<Self> {
        match explicit {
            Some(format) => Ok(format),
            None => Self::from_path(path),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Json => "json",
            Self::Jsonl => "jsonl",
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        };
        f.write_str(name)
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

enum RecordWriter<W: Write + Send> {
    Json { out: W, first: bool },
    Jsonl(W),
    Csv(csv::Writer<W>),
    Parquet(ParquetRecordWriter<W>),
}

impl<W: Write + Send> RecordWriter<W> {
    fn new<T: Serialize + Default>(format: OutputFormat, out: W) -> Result<Self, OutputError> {
        Ok(match format {
            OutputFormat::Json => Self::Json { out, first: true },
            OutputFormat::Jsonl => Self::Jsonl(out),
            OutputFormat::Csv => Self::Csv(csv::Writer::from_writer(out)),
            OutputFormat::Parquet => Self::Parquet(ParquetRecordWriter::new::<T>(out)?),
        })
    }

    fn write<T: Serialize>(&mut self, record: &T) -> Result<(), OutputError> {
        match self {
            Self::Json { out, first } => {
                let separator: &[u8] = if *first { b"[\n" } else { b",\n" };
                *first = false;
                out.write_all(separator).map_err(io_error)?;
                serde_json::to_writer(&mut *out, record)?;
            }
            Self::Jsonl(out) => {
                serde_json::to_writer(&mut *out, record)?;
                out.write_all(b"\n").map_err(io_error)?;
            }
            Self::Csv(writer) => writer.serialize(record)?,
            Self::Parquet(writer) => writer.write(record)?,
        }
        Ok(())
    }

    fn finish(self) -> Result<(), OutputError> {
        match self {
            Self::Json { mut out, first } => {
                let closing: &[u8] = if first { b"[]\n" } else { b"\n]\n" };
                out.write_all(closing).map_err(io_error)?;
                out.flush().map_err(io_error)
            }
            Self::Jsonl(mut out) => out.flush().map_err(io_error),
            Self::Csv(mut writer) => writer.flush().map_err(io_error),
            Self::Parquet(writer) => writer.finish()?.flush().map_err(io_error),
        }
    }
}

// Path is attached by the caller
fn io_error(source: std::io::Error) -> OutputError {
    OutputError::io(String::new(), source)
}

fn with_path(err: OutputError, path: &Path) -> OutputError {
    match err {
        OutputError::Io { source, .. } => OutputError::io(path.display().to_string(), source),
        other => other,
    }
}

/// Stream `records` into `path`, returning how many were written
///
/// The first `Err` from the iterator aborts the write and is returned as-is.
/// Parquet columns are typed from `T::default()`.
pub fn write_records<T, E, I>(path: &Path, format: OutputFormat, records: I) -> AppResult<usize>
where
    T: Serialize + Default,
    E: Into<AppError>,
    I: IntoIterator<Item = Result<T, E>>,
{
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp = NamedTempFile::new_in(parent)
        .map_err(|e| OutputError::io(parent.display().to_string(), e))?;
    debug!("Writing {} to temporary file {}", format, temp.path().display());

    let mut writer = RecordWriter::new::<T>(format, BufWriter::new(temp.as_file()))
        .map_err(|e| with_path(e, temp.path()))?;
    let mut count = 0usize;
    for record in records {
        let record = record.map_err(Into::into)?;
        writer
            .write(&record)
            .map_err(|e| with_path(e, temp.path()))?;
        count += 1;
    }
    writer.finish().map_err(|e| with_path(e, temp.path()))?;

    temp.persist(path)
        .map_err(|e| OutputError::io(path.display().to_string(), e.error))?;
    info!("Wrote {} records to {} ({})", count, path.display(), format);
    Ok(count)
}

/// Load a table written by [`write_records`]; gzip input is accepted for the text formats
pub fn read_records<T: DeserializeOwned>(path: &Path, format: OutputFormat) -> AppResult<Vec<T>> {
    let records: Vec<T> = match format {
        OutputFormat::Parquet => read_parquet(path)?,
        OutputFormat::Json => {
            serde_json::from_reader(open_text(path)?).map_err(OutputError::from)?
        }
        OutputFormat::Jsonl => {
            let mut records = Vec::new();
            for line in open_text(path)?.lines() {
                let line = line.map_err(|e| OutputError::io(path.display().to_string(), e))?;
                if line.trim().is_empty() {
                    continue;
                }
                records.push(serde_json::from_str(&line).map_err(OutputError::from)?);
            }
            records
        }
        OutputFormat::Csv => csv::Reader::from_reader(open_text(path)?)
            .deserialize()
            .collect::<Result<Vec<T>, csv::Error>>()
            .map_err(OutputError::from)?,
    };

    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

fn open_text(path: &Path) -> OutputResult<SourceReader> {
    open_source(path).map_err(|e| OutputError::io(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlaylistChannel, ProgramRecord};
    use crate::utils::XmltvTimestamp;
    use rstest::rstest;

    fn programs() -> Vec<ProgramRecord> {
        vec![
            ProgramRecord {
                channel: Some("bbc1.uk".to_string()),
                start_raw: Some("20240115133000 +0000".to_string()),
                start_time: XmltvTimestamp::parse("20240115133000 +0000"),
                title: Some("News, Weather".to_string()),
                is_new: true,
                ..ProgramRecord::default()
            },
            ProgramRecord {
                channel: Some("itv1.uk".to_string()),
                start_raw: Some("20240115".to_string()),
                start_time: XmltvTimestamp::parse("20240115"),
                description: Some("Line one\nline \"two\"".to_string()),
                ..ProgramRecord::default()
            },
        ]
    }

    #[rstest]
    #[case("programs.json", OutputFormat::Json)]
    #[case("programs.jsonl", OutputFormat::Jsonl)]
    #[case("programs.csv", OutputFormat::Csv)]
    #[case("programs.parquet", OutputFormat::Parquet)]
    fn test_write_then_read(#[case] file_name: &str, #[case] format: OutputFormat) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(file_name);
        assert_eq!(OutputFormat::from_path(&path).unwrap(), format);

        let written = write_records(
            &path,
            format,
            programs().into_iter().map(Ok::<_, AppError>),
        )
        .unwrap();
        assert_eq!(written, 2);

        let loaded: Vec<ProgramRecord> = read_records(&path, format).unwrap();
        assert_eq!(loaded, programs());
    }

    #[test]
    fn test_empty_json_is_valid_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        let written =
            write_records(&path, OutputFormat::Json, Vec::<Result<PlaylistChannel, AppError>>::new())
                .unwrap();
        assert_eq!(written, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]\n");
    }

    #[test]
    fn test_empty_parquet_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.parquet");
        let written = write_records(
            &path,
            OutputFormat::Parquet,
            Vec::<Result<PlaylistChannel, AppError>>::new(),
        )
        .unwrap();
        assert_eq!(written, 0);

        let loaded: Vec<PlaylistChannel> = read_records(&path, OutputFormat::Parquet).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_mid_stream_error_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.csv");
        let records = vec![
            Ok(PlaylistChannel {
                url: "http://a".to_string(),
                ..PlaylistChannel::default()
            }),
            Err(AppError::internal("source went away")),
        ];

        let err = write_records(&path, OutputFormat::Csv, records).unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[rstest]
    #[case("guide.csv.gz", Some(OutputFormat::Csv))]
    #[case("guide.NDJSON", Some(OutputFormat::Jsonl))]
    #[case("guide.parquet", Some(OutputFormat::Parquet))]
    #[case("guide.xml", None)]
    #[case("guide", None)]
    fn test_from_path(#[case] name: &str, #[case] expected: Option<OutputFormat>) {
        assert_eq!(OutputFormat::from_path(Path::new(name)).ok(), expected);
    }

    #[test]
    fn test_resolve_prefers_explicit() {
        let format = OutputFormat::resolve(Some(OutputFormat::Jsonl), Path::new("x.csv")).unwrap();
        assert_eq!(format, OutputFormat::Jsonl);
    }
}
