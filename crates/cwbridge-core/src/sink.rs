//! Line sinks: the Wavefront proxy over TCP, or stdout for dry runs

use crate::error::EmitError;
use std::io::{self, Write};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for formatted protocol lines
#[allow(async_fn_in_trait)] // Internal use only, sinks are driven from a single task
pub trait MetricSink: Send {
    /// Write one line; the sink adds the newline.
    async fn write_line(&mut self, line: &str) -> Result<(), EmitError>;

    /// Push any buffered lines out
    async fn flush(&mut self) -> Result<(), EmitError>;
}

/// Buffered TCP connection to a Wavefront proxy, one per run.
///
/// The connection is opened by the first written line, so a run that emits
/// nothing never touches the proxy.
pub struct ProxySink {
    host: String,
    port: u16,
    addr: String,
    writer: Option<BufWriter<TcpStream>>,
    lines: usize,
}

impl ProxySink {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            addr: format!("{host}:{port}"),
            host,
            port,
            writer: None,
            lines: 0,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    async fn connection(&mut self) -> Result<&mut BufWriter<TcpStream>, EmitError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => BufWriter::new(connect(&self.host, self.port, &self.addr).await?),
        };
        Ok(self.writer.insert(writer))
    }
}

async fn connect(host: &str, port: u16, addr: &str) -> Result<TcpStream, EmitError> {
    let connect_err = |source: io::Error| EmitError::Connect {
        addr: addr.to_string(),
        source,
    };

    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port)))
        .await
        .map_err(|_| {
            connect_err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no connection after {CONNECT_TIMEOUT:?}"),
            ))
        })?
        .map_err(connect_err)?;

    info!(addr = %addr, "Connected to proxy");
    Ok(stream)
}

impl MetricSink for ProxySink {
    async fn write_line(&mut self, line: &str) -> Result<(), EmitError> {
        let writer = self.connection().await?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        self.lines += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), EmitError> {
        match self.writer.as_mut() {
            Some(writer) => {
                writer.flush().await?;
                debug!(addr = %self.addr, lines = self.lines, "Flushed proxy connection");
            }
            None => debug!(addr = %self.addr, "Nothing written, proxy never contacted"),
        }
        Ok(())
    }
}

/// Prints each line prefixed with the proxy address instead of sending it
pub struct DryRunSink<W = io::Stdout> {
    label: String,
    out: W,
}

impl DryRunSink {
    pub fn stdout(host: &str, port: u16) -> Self {
        Self::new(host, port, io::stdout())
    }
}

impl<W: Write + Send> DryRunSink<W> {
    pub fn new(host: &str, port: u16, out: W) -> Self {
        Self {
            label: format!("[{host}:{port}]"),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> MetricSink for DryRunSink<W> {
    async fn write_line(&mut self, line: &str) -> Result<(), EmitError> {
        writeln!(self.out, "{} {}", self.label, line)?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), EmitError> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_prefixes_address() {
        let mut sink = DryRunSink::new("127.0.0.1", 2878, Vec::new());
        sink.write_line("aws.elb.latency 12.5 1700000000 source=my-lb")
            .await
            .unwrap();
        sink.flush().await.unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "[127.0.0.1:2878] aws.elb.latency 12.5 1700000000 source=my-lb\n"
        );
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        // Bind then drop to get a port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut sink = ProxySink::new("127.0.0.1", port);
        sink.flush().await.unwrap();
        assert!(!sink.is_connected());

        match sink.write_line("m 1 1700000000 source=s").await {
            Err(EmitError::Connect { addr, .. }) => assert_eq!(addr, format!("127.0.0.1:{port}")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(()) => panic!("connected to a closed port"),
        }
        assert!(!sink.is_connected());
    }
}
