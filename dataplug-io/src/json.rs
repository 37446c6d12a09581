//! JSON array codec
//!
//! The wire format is a single top-level JSON array. [`JsonArrayDecoder`]
//! splits it into elements incrementally so memory stays bounded by one
//! element; [`JsonArrayWriter`] frames records back into an array.

use crate::error::StageError;
use crate::stage::{RecordSink, SinkState};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use dataplug_format::Record;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Before the opening `[`
    Start,
    /// After `[` or `,`, waiting for an element (or `]` when `first`)
    Open { first: bool },
    /// Inside an element
    Element,
    /// After an element, waiting for `,` or `]`
    AfterElement,
    /// After the closing `]`
    Done,
}

/// Incremental decoder for a single top-level JSON array
#[derive(Debug, Clone)]
pub struct JsonArrayDecoder {
    phase: Phase,
    /// Bytes already consumed from the input
    offset: u64,
    /// How far into the buffered element the scanner has looked
    scan_pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Default for JsonArrayDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonArrayDecoder {
    /// Create a decoder positioned before the opening `[`
    pub fn new() -> Self {
        Self {
            phase: Phase::Start,
            offset: 0,
            scan_pos: 0,
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Number of input bytes consumed so far
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn error(&self, reason: &str) -> StageError {
        StageError::Parse {
            offset: self.offset,
            reason: reason.to_string(),
        }
    }

    fn skip_whitespace(&mut self, src: &mut BytesMut) {
        let count = src
            .iter()
            .take_while(|byte| byte.is_ascii_whitespace())
            .count();
        src.advance(count);
        self.offset += count as u64;
    }

    fn consume(&mut self, src: &mut BytesMut, count: usize) {
        src.advance(count);
        self.offset += count as u64;
    }

    /// Locate the end of the element starting at `src[0]`, resuming the scan
    /// where the previous call stopped
    fn element_end(&mut self, src: &BytesMut) -> Option<usize> {
        while self.scan_pos < src.len() {
            let pos = self.scan_pos;
            let byte = src[pos];
            self.scan_pos += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return Some(pos + 1);
                    }
                }
                continue;
            }

            match byte {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' if self.depth == 0 => return Some(pos),
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Some(pos + 1);
                    }
                }
                b',' if self.depth == 0 => return Some(pos),
                byte if self.depth == 0 && pos > 0 && byte.is_ascii_whitespace() => {
                    return Some(pos)
                }
                _ => {}
            }
        }
        None
    }
}

impl Decoder for JsonArrayDecoder {
    type Item = Record;
    type Error = StageError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Record>, StageError> {
        loop {
            match self.phase {
                Phase::Start => {
                    self.skip_whitespace(src);
                    match src.first() {
                        None => return Ok(None),
                        Some(b'[') => {
                            self.consume(src, 1);
                            self.phase = Phase::Open { first: true };
                        }
                        Some(_) => return Err(self.error("expected '[' at start of input")),
                    }
                }
                Phase::Open { first } => {
                    self.skip_whitespace(src);
                    match src.first() {
                        None => return Ok(None),
                        Some(b']') if first => {
                            self.consume(src, 1);
                            self.phase = Phase::Done;
                        }
                        Some(b']') => return Err(self.error("trailing comma before ']'")),
                        Some(b',') => return Err(self.error("expected a value, found ','")),
                        Some(_) => {
                            self.phase = Phase::Element;
                            self.scan_pos = 0;
                            self.depth = 0;
                            self.in_string = false;
                            self.escaped = false;
                        }
                    }
                }
                Phase::Element => {
                    let Some(end) = self.element_end(src) else {
                        return Ok(None);
                    };
                    let element = src.split_to(end);
                    let record = serde_json::from_slice::<Record>(&element).map_err(|err| {
                        StageError::Parse {
                            offset: self.offset,
                            reason: err.to_string(),
                        }
                    })?;
                    self.offset += end as u64;
                    self.phase = Phase::AfterElement;
                    return Ok(Some(record));
                }
                Phase::AfterElement => {
                    self.skip_whitespace(src);
                    match src.first() {
                        None => return Ok(None),
                        Some(b',') => {
                            self.consume(src, 1);
                            self.phase = Phase::Open { first: false };
                        }
                        Some(b']') => {
                            self.consume(src, 1);
                            self.phase = Phase::Done;
                        }
                        Some(_) => return Err(self.error("expected ',' or ']' after element")),
                    }
                }
                Phase::Done => {
                    self.skip_whitespace(src);
                    if src.is_empty() {
                        return Ok(None);
                    }
                    return Err(self.error("unexpected data after closing ']'"));
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Record>, StageError> {
        if let Some(record) = self.decode(src)? {
            return Ok(Some(record));
        }
        match self.phase {
            Phase::Start | Phase::Done => Ok(None),
            _ => Err(StageError::Parse {
                offset: self.offset + src.len() as u64,
                reason: "unexpected end of input, expected ']'".to_string(),
            }),
        }
    }
}

/// Serializer settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Pretty-print width; `None` or `Some(0)` writes compact JSON
    pub indent: Option<usize>,
    /// Treat a vanished consumer as a terminal error
    pub abort_on_error: bool,
}

/// Frames records as a JSON array on an async writer
pub struct JsonArrayWriter<W> {
    writer: BufWriter<W>,
    options: EncodeOptions,
    written: u64,
    opened: bool,
    closed: bool,
}

impl<W: AsyncWrite + Unpin + Send> JsonArrayWriter<W> {
    /// Wrap `writer`
    pub fn new(writer: W, options: EncodeOptions) -> Self {
        Self {
            writer: BufWriter::new(writer),
            options,
            written: 0,
            opened: false,
            closed: false,
        }
    }

    /// Records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    fn indent(&self) -> Option<usize> {
        self.options.indent.filter(|width| *width > 0)
    }

    fn render(&self, record: &Record) -> Result<Vec<u8>, StageError> {
        let mut buf = Vec::with_capacity(128);
        match self.indent() {
            Some(width) => {
                let indent = vec![b' '; width];
                let mut serializer =
                    Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
                record.serialize(&mut serializer)?;
            }
            None => serde_json::to_writer(&mut buf, record)?,
        }
        Ok(buf)
    }

    /// Map a write failure according to the error policy
    fn on_error(&mut self, err: std::io::Error) -> Result<SinkState, StageError> {
        if err.kind() == std::io::ErrorKind::BrokenPipe && !self.options.abort_on_error {
            warn!(error = %err, "Output closed by consumer, stopping");
            self.closed = true;
            return Ok(SinkState::Closed);
        }
        Err(StageError::Io(err))
    }

    async fn put(&mut self, bytes: &[u8]) -> Result<SinkState, StageError> {
        match self.writer.write_all(bytes).await {
            Ok(()) => Ok(SinkState::Ready),
            Err(err) => self.on_error(err),
        }
    }

    /// Write one record
    pub async fn write_record(&mut self, record: &Record) -> Result<SinkState, StageError> {
        if self.closed {
            return Ok(SinkState::Closed);
        }
        let rendered = self.render(record)?;
        let prefix: &[u8] = match (self.opened, self.indent().is_some()) {
            (false, false) => b"[",
            (false, true) => b"[\n",
            (true, false) => b",",
            (true, true) => b",\n",
        };
        self.opened = true;
        if self.put(prefix).await? == SinkState::Closed {
            return Ok(SinkState::Closed);
        }
        let state = self.put(&rendered).await?;
        if state == SinkState::Ready {
            self.written += 1;
        }
        Ok(state)
    }

    /// Close the array and flush
    pub async fn close(&mut self) -> Result<(), StageError> {
        if self.closed {
            return Ok(());
        }
        let tail: &[u8] = match (self.opened, self.indent().is_some()) {
            (false, _) => b"[]\n",
            (true, false) => b"]\n",
            (true, true) => b"\n]\n",
        };
        self.closed = true;
        if self.put(tail).await? == SinkState::Closed {
            return Ok(());
        }
        if let Err(err) = self.writer.flush().await {
            self.on_error(err)?;
        }
        debug!(records = self.written, "Closed output array");
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RecordSink for JsonArrayWriter<W> {
    async fn write(&mut self, record: Record) -> Result<SinkState, StageError> {
        self.write_record(&record).await
    }

    async fn finish(&mut self) -> Result<(), StageError> {
        self.close().await
    }
}
