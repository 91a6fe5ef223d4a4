//! Capture sources.
//!
//! A capture is read on a dedicated OS thread with blocking I/O. The
//! [`LineSender`] handle is synchronous, so the thread pushes straight into
//! the pipeline queue and the async side only awaits the final report.
//! Dropping the returned future detaches the thread; it stops at the next
//! push once the pipeline has gone away.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::oneshot;

use paylens_core::pipeline::LineParser;
use paylens_log_pipeline::{JsonLineParser, LineSender, LogcatParser};

use crate::cli::InputFormat;

/// Where a capture comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Standard input.
    Stdin,
    /// A file on disk.
    File(PathBuf),
}

impl Input {
    /// Interpret a CLI argument. `-` means stdin.
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdin
        } else {
            Self::File(PathBuf::from(arg))
        }
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str("<stdin>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Counters for one pass over a capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Records read from the input.
    pub lines_read: u64,
    /// Records that did not classify as logcat lines.
    pub lines_rejected: u64,
}

impl PumpReport {
    /// Records handed to the pipeline.
    pub fn lines_queued(&self) -> u64 {
        self.lines_read - self.lines_rejected
    }
}

/// A capture together with how to read it.
#[derive(Debug, Clone)]
pub struct Source {
    input: Input,
    format: InputFormat,
    max_line_length: usize,
}

impl Source {
    /// Create a source. `max_line_length` bounds a single logcat line.
    pub fn new(input: Input, format: InputFormat, max_line_length: usize) -> Self {
        Self {
            input,
            format,
            max_line_length,
        }
    }

    /// The input this source reads.
    pub fn input(&self) -> &Input {
        &self.input
    }

    /// Read the whole capture into `sender` on a background thread.
    ///
    /// `sender` is dropped when the thread finishes, which lets the
    /// pipeline drain its queue and exit.
    pub async fn pump(self, sender: LineSender) -> Result<PumpReport> {
        let (tx, rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("paylens-source".to_owned())
            .spawn(move || {
                let result = self.pump_blocking(&sender);
                drop(sender);
                let _ = tx.send(result);
            })
            .context("failed to spawn source thread")?;

        rx.await.context("source thread exited without a result")?
    }

    fn pump_blocking(&self, sender: &LineSender) -> Result<PumpReport> {
        match &self.input {
            Input::Stdin => self.pump_reader(std::io::stdin().lock(), sender),
            Input::File(path) => {
                let file = File::open(path)
                    .with_context(|| format!("failed to open capture {}", path.display()))?;
                self.pump_reader(BufReader::new(file), sender)
            }
        }
    }

    /// Read every record from `reader` and push it into `sender`.
    pub fn pump_reader<R: BufRead>(&self, reader: R, sender: &LineSender) -> Result<PumpReport> {
        let report = match self.format {
            InputFormat::Text => pump_text(reader, sender)?,
            InputFormat::Json => self.pump_json(reader, sender)?,
        };

        tracing::info!(
            input = %self.input,
            lines_read = report.lines_read,
            lines_rejected = report.lines_rejected,
            "capture read"
        );
        Ok(report)
    }

    fn pump_json<R: BufRead>(&self, mut reader: R, sender: &LineSender) -> Result<PumpReport> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .context("failed to read JSON capture")?;

        let records: Vec<serde_json::Value> =
            serde_json::from_str(&text).context("JSON capture must be an array of log lines")?;

        let parser =
            JsonLineParser::new(LogcatParser::new().with_max_input_size(self.max_line_length));
        let mut report = PumpReport::default();

        for record in records {
            report.lines_read += 1;
            match parser.parse(&record.to_string()) {
                Ok(line) => sender.push(line)?,
                Err(e) => {
                    report.lines_rejected += 1;
                    tracing::debug!(error = %e, "skipping record that does not classify");
                }
            }
        }

        Ok(report)
    }
}

/// Push raw logcat text line by line. Invalid UTF-8 is replaced, not fatal.
pub fn pump_text<R: BufRead>(mut reader: R, sender: &LineSender) -> Result<PumpReport> {
    let mut report = PumpReport::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader
            .read_until(b'\n', &mut buf)
            .context("failed to read capture")?
            == 0
        {
            break;
        }

        let text = String::from_utf8_lossy(&buf);
        let raw = text.trim_end_matches(['\r', '\n']);
        report.lines_read += 1;
        if !sender.push_raw(raw)? {
            report.lines_rejected += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paylens_log_pipeline::export_log_lines;

    const LINE: &str = "01-15 12:00:01.000  1200  1301 D IsoMessage: packRequest|0200|";

    fn queue() -> (LineSender, paylens_log_pipeline::LineReceiver) {
        paylens_log_pipeline::queue::channel(LogcatParser::new())
    }

    #[test]
    fn input_dash_is_stdin() {
        assert_eq!(Input::parse("-"), Input::Stdin);
        assert_eq!(Input::parse("a.log"), Input::File(PathBuf::from("a.log")));
        assert_eq!(Input::Stdin.to_string(), "<stdin>");
    }

    #[test]
    fn text_counts_rejected_lines() {
        let (sender, mut rx) = queue();
        let capture = format!("{LINE}\r\nnot logcat\n\n{LINE}");

        let report = pump_text(capture.as_bytes(), &sender).unwrap();
        assert_eq!(report.lines_read, 4);
        assert_eq!(report.lines_rejected, 2);
        assert_eq!(report.lines_queued(), 2);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.message, "packRequest|0200|");
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn text_tolerates_invalid_utf8() {
        let (sender, mut rx) = queue();
        let mut capture = LINE.as_bytes().to_vec();
        capture.extend_from_slice(b"\xff\n");

        let report = pump_text(capture.as_slice(), &sender).unwrap();
        assert_eq!(report.lines_rejected, 0);
        assert!(rx.try_recv().unwrap().message.ends_with('\u{fffd}'));
    }

    #[test]
    fn text_fails_once_queue_is_closed() {
        let (sender, rx) = queue();
        drop(rx);
        assert!(pump_text(LINE.as_bytes(), &sender).is_err());
    }

    #[test]
    fn json_reads_exported_lines() {
        let (sender, mut rx) = queue();
        let line = LogcatParser::new().classify(LINE).unwrap();
        let json = export_log_lines(&[line.clone(), line]).unwrap();
        let json = json.replacen("\"packRequest|0200|\"", "\"\"", 1);

        let source = Source::new(Input::Stdin, InputFormat::Json, 4096);
        let report = source.pump_reader(json.as_bytes(), &sender).unwrap();
        assert_eq!(report.lines_read, 2);
        assert_eq!(report.lines_rejected, 1);
        assert_eq!(rx.try_recv().unwrap().tag, "IsoMessage");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn json_rejects_non_array() {
        let (sender, _rx) = queue();
        let source = Source::new(Input::Stdin, InputFormat::Json, 4096);
        assert!(source.pump_reader(&b"{\"a\":1}"[..], &sender).is_err());
    }

    #[tokio::test]
    async fn pump_reads_file_on_background_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.log");
        std::fs::write(&path, format!("{LINE}\n{LINE}\n")).unwrap();

        let (sender, mut rx) = queue();
        let source = Source::new(Input::File(path), InputFormat::Text, 4096);
        let report = source.pump(sender).await.unwrap();

        assert_eq!(report.lines_queued(), 2);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        // the thread owned the last sender
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn pump_reports_missing_file() {
        let (sender, _rx) = queue();
        let source = Source::new(
            Input::File(PathBuf::from("/nonexistent/capture.log")),
            InputFormat::Text,
            4096,
        );
        let err = source.pump(sender).await.unwrap_err();
        assert!(err.to_string().contains("failed to open capture"));
    }
}
