//! `.rttlog` record files
//!
//! One header line, then one comma-separated line per record:
//!
//! ```text
//! recv_time_utc,channel,file,function,line,log_level,device_time,message
//! 2025-03-14T09:26:53.589Z,0,"adc.cpp","void Adc::isr()",77,info,1[3/2]s,"vin ""high"""
//! ```
//!
//! Text fields are quoted with embedded quotes doubled; the device time is written as a
//! literal that parses back exactly.

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};

use super::Sink;
use crate::types::LogRecord;
use crate::{Result, RttError};

pub const CSV_HEADER: &str = "recv_time_utc,channel,file,function,line,log_level,device_time,message";

/// Extension of record files.
pub const RECORD_FILE_EXTENSION: &str = "rttlog";

/// Record file writer over any [`Write`].
///
/// Each line is flushed as it is written. After the first write error the sink reports
/// once and ignores further records.
#[derive(Debug)]
pub struct CsvSink<W: Write + Send> {
    label: String,
    state: Mutex<WriterState<W>>,
}

#[derive(Debug)]
struct WriterState<W> {
    out: W,
    failed: bool,
}

/// [`CsvSink`] writing to a file on disk.
pub type CsvFileSink = CsvSink<BufWriter<File>>;

impl<W: Write + Send> CsvSink<W> {
    /// Write the header to `out` and wrap it.
    pub fn new(mut out: W, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        writeln!(out, "{CSV_HEADER}")
            .and_then(|()| out.flush())
            .map_err(|e| RttError::file_error(PathBuf::from(&label), e))?;
        Ok(Self { label, state: Mutex::new(WriterState { out, failed: false }) })
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        let state = self.state.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.out
    }
}

impl CsvSink<BufWriter<File>> {
    /// Create `<dir>/<now>.rttlog`, creating `dir` if needed.
    pub fn create_in(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| RttError::file_error(dir.to_path_buf(), e))?;
        Self::create(dir.join(record_file_name(Utc::now())))
    }

    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| RttError::file_error(path.clone(), e))?;
        info!(path = %path.display(), "Writing record file");
        Self::new(BufWriter::new(file), path.display().to_string())
    }
}

impl<W: Write + Send> Sink for CsvSink<W> {
    fn deliver(&self, received_at: DateTime<Utc>, record: &LogRecord) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.failed {
            return;
        }
        let line = format_csv_line(received_at, record);
        let written = writeln!(state.out, "{line}").and_then(|()| state.out.flush());
        if let Err(e) = written {
            state.failed = true;
            error!(file = %self.label, error = %e, "Error writing record file, further records dropped");
        }
    }

    fn name(&self) -> &str {
        "csv"
    }
}

/// `YYYY-MM-DDTHH-MM-SS.mmmZ.rttlog`; colons are replaced so the name is valid everywhere.
pub fn record_file_name(created_at: DateTime<Utc>) -> String {
    format!("{}.{RECORD_FILE_EXTENSION}", created_at.format("%Y-%m-%dT%H-%M-%S%.3fZ"))
}

/// ISO-8601 UTC with millisecond precision.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// One record line, without the trailing newline.
pub fn format_csv_line(received_at: DateTime<Utc>, record: &LogRecord) -> String {
    format!(
        "{},{},{},{},{},{},{},{}",
        format_timestamp(received_at),
        record.channel,
        quote(&record.file_name),
        quote(&record.function_name),
        record.line,
        record.level,
        record.device_time.to_literal(),
        quote(&record.message)
    )
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceTime, LogLevel};
    use chrono::TimeZone;

    fn received_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap() + chrono::Duration::milliseconds(589)
    }

    fn record() -> LogRecord {
        LogRecord {
            channel: 0,
            device_time: DeviceTime::from_ratio(3, 1, 2).unwrap(),
            file_name: "adc.cpp".into(),
            line: 77,
            level: LogLevel::Info,
            function_name: "void Adc::isr()".into(),
            message: "vin \"high\", again".into(),
        }
    }

    #[test]
    fn line_format() {
        assert_eq!(
            format_csv_line(received_at(), &record()),
            r#"2025-03-14T09:26:53.589Z,0,"adc.cpp","void Adc::isr()",77,info,1[3/2]s,"vin ""high"", again""#
        );
    }

    #[test]
    fn plain_records_have_empty_context() {
        let line = format_csv_line(received_at(), &LogRecord::plain(3, "raw"));
        assert_eq!(line, r#"2025-03-14T09:26:53.589Z,3,"","",0,trace,0s,"raw""#);
    }

    #[test]
    fn file_name_has_no_colons() {
        assert_eq!(record_file_name(received_at()), "2025-03-14T09-26-53.589Z.rttlog");
    }

    #[test]
    fn writes_header_then_records() {
        let sink = CsvSink::new(Vec::new(), "memory").unwrap();
        sink.deliver(received_at(), &record());
        sink.deliver(received_at(), &LogRecord::plain(1, "second"));

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[2].ends_with(r#","second""#));
    }

    #[test]
    fn write_errors_stop_the_sink() {
        // accepts the header line, fails everything after it
        #[derive(Default)]
        struct Broken {
            lines: usize,
        }
        impl Write for Broken {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if self.lines > 0 {
                    return Err(std::io::Error::other("disk full"));
                }
                self.lines += buf.iter().filter(|&&b| b == b'\n').count();
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let sink = CsvSink::new(Broken::default(), "broken").unwrap();
        sink.deliver(received_at(), &record());
        sink.deliver(received_at(), &record());
        assert!(sink.state.lock().unwrap().failed);
    }

    #[test]
    fn creates_file_in_directory() {
        let dir = std::env::temp_dir().join(format!("rttlog-csv-{}", std::process::id()));
        let sink = CsvFileSink::create_in(&dir).unwrap();
        sink.deliver(received_at(), &record());
        drop(sink);

        let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].extension().and_then(|e| e.to_str()), Some(RECORD_FILE_EXTENSION));
        let contents = std::fs::read_to_string(&entries[0]).unwrap();
        assert!(contents.starts_with(CSV_HEADER));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
