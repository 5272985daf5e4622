//! Re-emit device records as `tracing` events

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, trace, warn};

use super::Sink;
use crate::types::{LogLevel, LogRecord};

/// Forwards records to the installed `tracing` subscriber under the `rttlog::device`
/// target, and notifications under `rttlog::probe`.
///
/// [`LogLevel::Crit`] has no `tracing` counterpart and is emitted as `ERROR` with
/// `crit = true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn deliver(&self, received_at: DateTime<Utc>, record: &LogRecord) {
        let channel = record.channel;
        let location = record.location();
        let function = record.function_name.as_str();
        let device_time = &record.device_time;
        let message = record.message.as_str();

        match record.level {
            LogLevel::Trace => {
                trace!(target: "rttlog::device", channel, %location, function, %device_time, %received_at, "{message}")
            }
            LogLevel::Debug => {
                debug!(target: "rttlog::device", channel, %location, function, %device_time, %received_at, "{message}")
            }
            LogLevel::Info => {
                info!(target: "rttlog::device", channel, %location, function, %device_time, %received_at, "{message}")
            }
            LogLevel::Warn => {
                warn!(target: "rttlog::device", channel, %location, function, %device_time, %received_at, "{message}")
            }
            LogLevel::Error => {
                error!(target: "rttlog::device", channel, %location, function, %device_time, %received_at, "{message}")
            }
            LogLevel::Crit => {
                error!(target: "rttlog::device", crit = true, channel, %location, function, %device_time, %received_at, "{message}")
            }
        }
    }

    fn status_message(&self, message: &str) {
        info!(target: "rttlog::probe", "{message}");
    }

    fn error_message(&self, message: &str) {
        warn!(target: "rttlog::probe", "{message}");
    }

    fn fatal_error(&self, message: &str) {
        error!(target: "rttlog::probe", fatal = true, "{message}");
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn records_become_events_at_their_level() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let record = LogRecord {
                file_name: "main.cpp".into(),
                line: 12,
                level: LogLevel::Crit,
                ..LogRecord::plain(1, "watchdog fired")
            };
            TracingSink.deliver(Utc::now(), &record);
            TracingSink.status_message("opening probe");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("ERROR"), "{output}");
        assert!(output.contains("watchdog fired"));
        assert!(output.contains("location=main.cpp:12"));
        assert!(output.contains("crit=true"));
        assert!(output.contains("INFO"));
        assert!(output.contains("opening probe"));
    }
}
