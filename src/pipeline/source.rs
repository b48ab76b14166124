//! JSON-line sensor reading sources
//!
//! One `SensorReading` object per line, from stdin or a file. Blank lines are
//! skipped. Malformed lines, including ones that are not UTF-8, are logged
//! and counted, never fatal.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::sensors::FusionEngine;
use crate::types::SensorReading;

/// Events produced by a reading source.
pub enum ReadingEvent {
    Reading(SensorReading),
    /// No more data
    Eof,
}

/// Reads newline-delimited JSON readings from any async buffered reader.
pub struct JsonLineSource<R> {
    reader: R,
    name: String,
    line_buffer: Vec<u8>,
    malformed: u64,
}

impl JsonLineSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

impl JsonLineSource<BufReader<tokio::fs::File>> {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("opening reading file {}", path.display()))?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

impl<R: AsyncBufRead + Unpin> JsonLineSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line_buffer: Vec::with_capacity(512),
            malformed: 0,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.name
    }

    /// Lines that could not be parsed so far.
    pub fn malformed_lines(&self) -> u64 {
        self.malformed
    }

    pub async fn next_event(&mut self) -> Result<ReadingEvent> {
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_until(b'\n', &mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(ReadingEvent::Eof);
            }
            let line = match std::str::from_utf8(&self.line_buffer) {
                Ok(line) => line.trim(),
                Err(e) => {
                    self.malformed += 1;
                    warn!(source = %self.name, error = %e, "Skipping non-UTF-8 reading line");
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SensorReading>(line) {
                Ok(reading) => return Ok(ReadingEvent::Reading(reading)),
                Err(e) => {
                    self.malformed += 1;
                    warn!(source = %self.name, error = %e, "Skipping malformed reading line");
                }
            }
        }
    }
}

/// Totals for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub accepted: u64,
    pub rejected: u64,
    pub malformed: u64,
}

/// Feed every reading from `source` into `engine` until EOF, a source error,
/// or cancellation.
pub async fn ingest<R: AsyncBufRead + Unpin>(
    source: &mut JsonLineSource<R>,
    engine: &FusionEngine,
    cancel_token: &CancellationToken,
) -> IngestSummary {
    let mut summary = IngestSummary::default();
    info!(source = %source.source_name(), "Reading sensor data");

    loop {
        let event = tokio::select! {
            biased;
            () = cancel_token.cancelled() => {
                info!("Ingestion shutdown signal received");
                break;
            }
            result = source.next_event() => match result {
                Ok(event) => event,
                Err(e) => {
                    warn!(source = %source.source_name(), error = %e, "Reading source failed");
                    break;
                }
            },
        };

        match event {
            ReadingEvent::Reading(reading) => match engine.submit_reading(reading) {
                Ok(()) => summary.accepted += 1,
                Err(e) => {
                    summary.rejected += 1;
                    debug!(error = %e, "Reading rejected");
                }
            },
            ReadingEvent::Eof => {
                info!(source = %source.source_name(), accepted = summary.accepted, "Reading source exhausted");
                break;
            }
        }
    }

    summary.malformed = source.malformed_lines();
    summary
}
