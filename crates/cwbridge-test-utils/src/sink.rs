//! Recording sink

use cwbridge_core::{EmitError, MetricSink};
use std::io;

/// Keeps every written line; optionally fails once a number of lines have
/// been written.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub lines: Vec<String>,
    pub flushes: usize,
    fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `lines` lines, then fail every write as if the proxy hung up
    pub fn failing_after(lines: usize) -> Self {
        Self {
            fail_after: Some(lines),
            ..Self::default()
        }
    }

    /// Lines whose metric name starts with `prefix`
    pub fn lines_for(&self, prefix: &str) -> Vec<&str> {
        self.lines
            .iter()
            .map(String::as_str)
            .filter(|line| line.starts_with(prefix))
            .collect()
    }
}

impl MetricSink for RecordingSink {
    async fn write_line(&mut self, line: &str) -> Result<(), EmitError> {
        if self.fail_after.is_some_and(|limit| self.lines.len() >= limit) {
            return Err(EmitError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "proxy closed the connection",
            )));
        }
        self.lines.push(line.to_string());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), EmitError> {
        self.flushes += 1;
        Ok(())
    }
}
