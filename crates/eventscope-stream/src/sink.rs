//! Output sinks for classification results.

use std::io::Write;
use std::sync::Mutex;

use eventscope_core::ClassificationResult;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::OutputFormat;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot serialize result: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sink receiver dropped")]
    Closed,
}

/// Destination for classification results.
///
/// A failure is reported for that one result only; the pipeline logs it and
/// keeps going.
pub trait EventSink: Send + Sync {
    fn emit(&self, result: &ClassificationResult) -> Result<(), SinkError>;
}

/// Writes one line per result, as text or JSON.
pub struct LineSink<W> {
    out: Mutex<W>,
    format: OutputFormat,
}

impl LineSink<std::io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(std::io::stdout(), format)
    }
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out: Mutex::new(out),
            format,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> EventSink for LineSink<W> {
    fn emit(&self, result: &ClassificationResult) -> Result<(), SinkError> {
        let line = match self.format {
            OutputFormat::Text => result.to_string(),
            OutputFormat::Json => serde_json::to_string(result)?,
        };
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

/// Forwards results to a channel, for embedders that consume them as a stream.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ClassificationResult>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClassificationResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, result: &ClassificationResult) -> Result<(), SinkError> {
        self.tx.send(result.clone()).map_err(|_| SinkError::Closed)
    }
}

/// Keeps every result in memory.
#[derive(Default)]
pub struct MemorySink {
    results: Mutex<Vec<ClassificationResult>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<ClassificationResult> {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn emit(&self, result: &ClassificationResult) -> Result<(), SinkError> {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventscope_core::{Address, Bytes, LogRecord, B256};

    fn unknown() -> ClassificationResult {
        ClassificationResult::UnknownEvent {
            signature: B256::repeat_byte(0xab),
            record: LogRecord::new(Address::repeat_byte(0x11), vec![B256::repeat_byte(0xab)], Bytes::new(), 42),
        }
    }

    #[test]
    fn text_lines() {
        let sink = LineSink::new(Vec::new(), OutputFormat::Text);
        sink.emit(&unknown()).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.ends_with(" at block 42\n"));
        assert!(out.contains("Unknown Event 0xabab"));
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn json_lines_are_tagged() {
        let sink = LineSink::new(Vec::new(), OutputFormat::Json);
        sink.emit(&unknown()).unwrap();
        sink.emit(&unknown()).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["kind"], "unknown_event");
    }

    #[test]
    fn channel_sink_reports_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        assert!(matches!(sink.emit(&unknown()), Err(SinkError::Closed)));
    }
}
