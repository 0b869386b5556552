use authflow::automation::{
    decode_events, AutomationError, CancelToken, EventStreamReader, ProgressEvent,
};
use authflow::shared::logging::LogSink;
use std::fs;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use tempfile::tempdir;

fn collect(body: &str, chunk_size: usize) -> Vec<ProgressEvent> {
    EventStreamReader::new(Cursor::new(body.as_bytes().to_vec()))
        .with_chunk_size(chunk_size)
        .map(|item| item.expect("event"))
        .collect()
}

/// Hands out its bytes once, then fails every further read.
struct OneShotBody {
    data: Option<Vec<u8>>,
}

impl Read for OneShotBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.take() {
            Some(data) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            None => Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
        }
    }
}

/// Yields one queued chunk per read and counts how often it was asked.
struct ChannelBody {
    chunks: Receiver<Vec<u8>>,
    reads: Arc<AtomicUsize>,
}

impl Read for ChannelBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.chunks.recv() {
            Ok(chunk) => {
                let len = chunk.len().min(buf.len());
                buf[..len].copy_from_slice(&chunk[..len]);
                Ok(len)
            }
            Err(_) => Ok(0),
        }
    }
}

#[test]
fn records_split_across_chunks_decode_once() {
    let body = concat!(
        "data: {\"type\":\"status\",\"message\":\"Analyse du dossier médical\",\"progress\":10}\n\n",
        "data: {\"type\":\"search_start\",\"query\":\"prior auth MRI\"}\n\n",
        "data: {\"type\":\"complete\",\"result\":{\"coverage_status\":\"covered\"}}\n\n",
    );
    for chunk_size in [1, 3, 7, 64] {
        let events = collect(body, chunk_size);
        assert_eq!(events.len(), 3, "chunk size {chunk_size}");
        assert_eq!(
            events[0].message(),
            Some("Analyse du dossier médical"),
            "chunk size {chunk_size}"
        );
        assert_eq!(events[1].kind(), "search_start");
        assert_eq!(events[2].kind(), "complete");
    }
}

#[test]
fn comments_keepalives_and_blank_lines_are_ignored() {
    let body = concat!(
        ": keepalive\n",
        "event: progress\n",
        "\n",
        "data: {\"type\":\"status\",\"message\":\"working\"}\r\n",
        "\r\n",
        "retry: 1000\n",
    );
    let events = collect(body, 16);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message(), Some("working"));
}

#[test]
fn malformed_record_is_dropped_and_logged() {
    let temp = tempdir().expect("tempdir");
    let log_path = temp.path().join("logs/automation.log");
    let body = concat!(
        "data: {\"type\":\"status\",\"message\":\n\n",
        "data: {\"type\":\"status\",\"message\":\"ok\"}\n\n",
    );

    let mut reader = EventStreamReader::new(Cursor::new(body.as_bytes().to_vec()))
        .with_log(LogSink::to_file(&log_path), Some("42".to_string()));
    let events: Vec<_> = reader.by_ref().map(|item| item.expect("event")).collect();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message(), Some("ok"));
    assert_eq!(reader.dropped_records(), 1);

    let log = fs::read_to_string(&log_path).expect("read log");
    let line: serde_json::Value =
        serde_json::from_str(log.lines().next().expect("log line")).expect("json line");
    assert_eq!(line["level"], "warn");
    assert_eq!(line["event"], "stream.record_dropped");
    assert_eq!(line["case_id"], "42");
}

#[test]
fn terminal_event_stops_reading_and_discards_the_rest() {
    let body = concat!(
        "data: {\"type\":\"status\",\"message\":\"starting\"}\n\n",
        "data: {\"type\":\"complete\",\"result\":{}}\n\n",
        "data: {\"type\":\"status\",\"message\":\"after complete\"}\n\n",
    );
    let mut reader = EventStreamReader::new(OneShotBody {
        data: Some(body.as_bytes().to_vec()),
    });

    let first = reader.next().expect("first").expect("event");
    assert_eq!(first.kind(), "status");
    let second = reader.next().expect("second").expect("event");
    assert!(second.is_terminal());
    assert!(reader.next().is_none());
    assert!(reader.next().is_none());
}

#[test]
fn error_record_is_terminal_and_untyped_error_is_recognised() {
    let body = "data: {\"error\":\"Prior authorization not found\"}\n\ndata: {\"type\":\"status\"}\n\n";
    let events: Vec<_> = decode_events(Cursor::new(body.as_bytes().to_vec()))
        .map(|item| item.expect("event"))
        .collect();
    assert_eq!(events.len(), 1);
    match &events[0] {
        ProgressEvent::Error { error, .. } => {
            assert_eq!(error.as_deref(), Some("Prior authorization not found"));
        }
        other => panic!("expected error event, got {other:?}"),
    }
}

#[test]
fn residual_line_without_newline_is_decoded_at_end_of_data() {
    let body = "data: {\"type\":\"status\",\"message\":\"a\"}\n\ndata: {\"type\":\"status\",\"message\":\"tail\"}";
    let events = collect(body, 5);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].message(), Some("tail"));
}

#[test]
fn read_failure_yields_one_error_then_ends() {
    let mut reader = EventStreamReader::new(OneShotBody {
        data: Some(b"data: {\"type\":\"status\",\"message\":\"partial\"}\n\n".to_vec()),
    });
    assert_eq!(
        reader.next().expect("event").expect("ok").message(),
        Some("partial")
    );
    match reader.next() {
        Some(Err(AutomationError::StreamRead(err))) => {
            assert_eq!(err.kind(), io::ErrorKind::ConnectionReset)
        }
        other => panic!("expected stream read error, got {other:?}"),
    }
    assert!(reader.next().is_none());
}

#[test]
fn unknown_event_types_still_decode() {
    let events = collect("data: {\"type\":\"heartbeat_v2\",\"progress\":5}\n\n", 64);
    assert_eq!(events, vec![ProgressEvent::Unknown]);
}

#[test]
fn decode_events_restarts_per_call() {
    let body = "data: {\"type\":\"status\",\"message\":\"x\"}\n\n";
    for _ in 0..2 {
        let count = decode_events(Cursor::new(body.as_bytes().to_vec())).count();
        assert_eq!(count, 1);
    }
}

#[test]
fn cancelled_reader_stops_pulling_chunks_from_the_body() {
    let (chunks, receiver) = mpsc::channel();
    let reads = Arc::new(AtomicUsize::new(0));
    let cancel = CancelToken::new();
    let mut reader = EventStreamReader::new(ChannelBody {
        chunks: receiver,
        reads: Arc::clone(&reads),
    })
    .with_cancel(cancel.clone());

    chunks
        .send(b"data: {\"type\":\"status\",\"progress\":10}\n\n".to_vec())
        .expect("queue first chunk");
    let first = reader.next().expect("first item").expect("first event");
    assert_eq!(first.progress(), Some(10.0));
    assert_eq!(reads.load(Ordering::SeqCst), 1);

    cancel.cancel();
    for progress in [20, 30, 40] {
        chunks
            .send(format!("data: {{\"type\":\"status\",\"progress\":{progress}}}\n\n").into_bytes())
            .expect("queue chunk");
    }

    assert!(reader.next().is_none());
    assert!(reader.next().is_none());
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn cancellation_discards_events_already_buffered() {
    let body = concat!(
        "data: {\"type\":\"status\",\"progress\":1}\n\n",
        "data: {\"type\":\"status\",\"progress\":2}\n\n",
    );
    let cancel = CancelToken::new();
    let mut reader =
        EventStreamReader::new(Cursor::new(body.as_bytes().to_vec())).with_cancel(cancel.clone());

    assert_eq!(reader.next().expect("item").expect("event").progress(), Some(1.0));
    cancel.cancel();
    assert!(reader.next().is_none());
}
