//! JSON-lines recording source
//!
//! Reads operations recorded one JSON object per line:
//!
//! ```text
//! {"ts":"2024-05-01T12:00:00.000Z","payload":{"op":"find","ns":"db.users"}}
//! {"ts":"2024-05-01T12:00:00.250Z","payload":{"op":"insert","ns":"db.orders"}}
//! ```
//!
//! The payload is kept as the exact JSON text found on the line (key order,
//! number spelling and spacing included) and never interpreted.

use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use contracts::{ContractError, OpSource, Operation};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tracing::{debug, info, instrument};

/// One recorded line
#[derive(Debug, Deserialize)]
pub struct OpRecord {
    /// Capture timestamp (RFC 3339)
    pub ts: DateTime<Utc>,

    /// Request body, verbatim (missing = `null`)
    #[serde(default)]
    pub payload: Option<Box<RawValue>>,
}

impl OpRecord {
    fn into_operation(self) -> Operation {
        let payload = match self.payload {
            Some(raw) => Bytes::copy_from_slice(raw.get().as_bytes()),
            None => Bytes::from_static(b"null"),
        };
        Operation::new(self.ts, payload)
    }
}

/// Borrowed form of [`OpRecord`] used by the writer
#[derive(Serialize)]
struct OpRecordRef<'a> {
    ts: DateTime<Utc>,
    payload: &'a RawValue,
}

/// View an operation payload as a single JSON value that can be written verbatim
///
/// Rejects payloads that would not read back byte for byte: non UTF-8,
/// not JSON, surrounding whitespace, or spanning several lines.
fn raw_payload(op: &Operation) -> Result<&RawValue, ContractError> {
    let text = std::str::from_utf8(&op.payload)
        .map_err(|e| ContractError::Other(format!("payload is not UTF-8: {e}")))?;
    let raw: &RawValue = serde_json::from_str(text)
        .map_err(|e| ContractError::Other(format!("payload is not JSON: {e}")))?;
    if raw.get().len() != text.len() || text.contains('\n') {
        return Err(ContractError::Other(
            "payload must be a single-line JSON value without surrounding whitespace".to_string(),
        ));
    }
    Ok(raw)
}

/// JSON-lines operation source
///
/// Keeps one decoded operation of lookahead so that `all_loaded` is exact:
/// it turns true as soon as the last operation has been handed out.
pub struct JsonlOpSource {
    name: String,
    lines: Lines<BufReader<File>>,
    line_no: u64,
    lookahead: Option<Result<Operation, ContractError>>,
    read: u64,
}

impl JsonlOpSource {
    /// Open a recording
    ///
    /// # Errors
    /// Returns an IO error if the file cannot be opened
    #[instrument(name = "jsonl_source_open", skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let file = File::open(path).await?;

        let mut source = Self {
            name: path.display().to_string(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            lookahead: None,
            read: 0,
        };
        source.fill_lookahead().await;

        info!(source = %source.name, empty = source.lookahead.is_none(), "Opened recording");
        Ok(source)
    }

    /// Source name (the recording path)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decode the next non-blank line into the lookahead slot
    async fn fill_lookahead(&mut self) {
        self.lookahead = loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    self.line_no += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    break Some(self.decode(&line));
                }
                Ok(None) => {
                    debug!(source = %self.name, lines = self.line_no, "Recording exhausted");
                    break None;
                }
                Err(e) => {
                    break Some(Err(ContractError::source_read(&self.name, e.to_string())));
                }
            }
        };
    }

    fn decode(&self, line: &str) -> Result<Operation, ContractError> {
        serde_json::from_str::<OpRecord>(line)
            .map(OpRecord::into_operation)
            .map_err(|e| ContractError::op_decode(self.line_no, e.to_string()))
    }
}

impl OpSource for JsonlOpSource {
    async fn next(&mut self) -> Result<Option<Operation>, ContractError> {
        match self.lookahead.take() {
            None => Ok(None),
            // The slot stays empty afterwards: a broken recording ends the stream.
            Some(Err(e)) => Err(e),
            Some(Ok(op)) => {
                self.read += 1;
                self.fill_lookahead().await;
                Ok(Some(op))
            }
        }
    }

    fn all_loaded(&self) -> bool {
        self.lookahead.is_none()
    }

    fn ops_read(&self) -> u64 {
        self.read
    }
}

/// JSON-lines recording writer
pub struct JsonlOpWriter {
    writer: BufWriter<File>,
    written: u64,
}

impl JsonlOpWriter {
    /// Create (or truncate) a recording
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let file = File::create(path.as_ref()).await?;
        Ok(Self {
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    /// Append one operation
    ///
    /// # Errors
    /// The payload must be a single-line JSON value; anything else is rejected
    /// rather than rewritten.
    pub async fn write(&mut self, op: &Operation) -> Result<(), ContractError> {
        let record = OpRecordRef {
            ts: op.timestamp,
            payload: raw_payload(op)?,
        };
        let mut line = serde_json::to_vec(&record)
            .map_err(|e| ContractError::Other(format!("failed to encode operation: {e}")))?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.written += 1;
        Ok(())
    }

    /// Flush and close, returning the number of operations written
    pub async fn finish(mut self) -> Result<u64, ContractError> {
        self.writer.flush().await?;
        Ok(self.written)
    }
}
