use super::error::AutomationError;
use super::events::ProgressEvent;
use super::operation::CancelToken;
use crate::shared::logging::LogSink;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

const DATA_PREFIX: &[u8] = b"data: ";
const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Decodes `data: {json}` lines from a streaming response body.
///
/// Bytes are buffered across reads so a record split over chunk boundaries,
/// including inside a multi-byte character, decodes as if it arrived whole.
/// Iteration stops after the first terminal event without pulling further
/// chunks from the body. A reader given a [`CancelToken`] also stops, without
/// touching the body again, once that token is raised.
pub struct EventStreamReader<R> {
    body: R,
    buffer: Vec<u8>,
    pending: VecDeque<ProgressEvent>,
    chunk_size: usize,
    finished: bool,
    dropped: usize,
    log: LogSink,
    case_id: Option<String>,
    cancel: Option<CancelToken>,
}

impl<R: Read> EventStreamReader<R> {
    pub fn new(body: R) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            finished: false,
            dropped: 0,
            log: LogSink::disabled(),
            case_id: None,
            cancel: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_log(mut self, log: LogSink, case_id: Option<String>) -> Self {
        self.log = log;
        self.case_id = case_id;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Number of `data:` records skipped because they failed to decode.
    pub fn dropped_records(&self) -> usize {
        self.dropped
    }

    fn decode_line(&mut self, line: &[u8]) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };
        let decoded = std::str::from_utf8(payload)
            .map_err(|err| err.to_string())
            .and_then(|text| ProgressEvent::from_json(text).map_err(|err| err.to_string()));
        match decoded {
            Ok(event) => self.pending.push_back(event),
            Err(reason) => {
                self.dropped += 1;
                let preview: String = String::from_utf8_lossy(payload).chars().take(120).collect();
                self.log.warn(
                    "stream.record_dropped",
                    self.case_id.as_deref(),
                    &format!("malformed progress record ({reason}): {preview}"),
                );
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    fn drain_complete_lines(&mut self) {
        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.decode_line(&line[..line.len() - 1]);
        }
    }

    fn flush_residual(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line);
    }

    fn fill(&mut self) -> Result<bool, std::io::Error> {
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            match self.body.read(&mut chunk) {
                Ok(0) => return Ok(false),
                Ok(read) => {
                    self.buffer.extend_from_slice(&chunk[..read]);
                    return Ok(true);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R: Read> Iterator for EventStreamReader<R> {
    type Item = Result<ProgressEvent, AutomationError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.is_cancelled() {
                self.finished = true;
                self.pending.clear();
                self.buffer.clear();
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                if event.is_terminal() {
                    self.finished = true;
                    self.pending.clear();
                    self.buffer.clear();
                }
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            match self.fill() {
                Ok(true) => self.drain_complete_lines(),
                Ok(false) => {
                    self.finished = true;
                    self.flush_residual();
                }
                Err(err) => {
                    self.finished = true;
                    self.pending.clear();
                    self.buffer.clear();
                    return Some(Err(AutomationError::StreamRead(err)));
                }
            }
        }
    }
}

/// Starts a fresh decode over `body`.
pub fn decode_events<R: Read>(body: R) -> EventStreamReader<R> {
    EventStreamReader::new(body)
}
