#![allow(dead_code)]

use authflow::api::{
    ApiError, AutomationBackend, AutomationStatus, EventBody, StreamEndpoint,
};
use authflow::shared::ids::CaseId;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// In-memory backend: queued SSE bodies per endpoint, queued status
/// snapshots, and a call log.
#[derive(Default)]
pub struct FakeBackend {
    pub(crate) streams: Mutex<BTreeMap<&'static str, VecDeque<String>>>,
    pub(crate) statuses: Mutex<VecDeque<AutomationStatus>>,
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) holds: Mutex<BTreeMap<&'static str, Arc<Mutex<Receiver<()>>>>>,
    pub fail_start: bool,
    pub fail_persist: bool,
    pub fail_cancel: bool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(self, endpoint: StreamEndpoint, body: String) -> Self {
        self.push_stream(endpoint, body);
        self
    }

    pub fn push_stream(&self, endpoint: StreamEndpoint, body: String) {
        self.streams
            .lock()
            .expect("streams lock")
            .entry(endpoint.path_segment())
            .or_default()
            .push_back(body);
    }

    /// The last queued status is repeated once the queue drains.
    pub fn push_status(&self, status: AutomationStatus) {
        self.statuses.lock().expect("statuses lock").push_back(status);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Makes every later call of `method` (`status`, `persist`, `cancel`...)
    /// block after it is recorded, until the returned sender sends or drops.
    pub fn hold(&self, method: &'static str) -> Sender<()> {
        let (release, held) = mpsc::channel();
        self.holds
            .lock()
            .expect("holds lock")
            .insert(method, Arc::new(Mutex::new(held)));
        release
    }

    /// Polls the call log until `prefix` has been called `count` times.
    pub fn wait_for_calls(&self, prefix: &str, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.count_calls(prefix) >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.count_calls(prefix) >= count
    }

    fn record(&self, call: String) {
        let method = call.split(':').next().unwrap_or_default().to_string();
        self.calls.lock().expect("calls lock").push(call);
        let held = self
            .holds
            .lock()
            .expect("holds lock")
            .get(method.as_str())
            .cloned();
        if let Some(held) = held {
            let _ = held.lock().expect("hold lock").recv();
        }
    }
}

fn rejected(url: &str) -> ApiError {
    ApiError::Request {
        url: url.to_string(),
        message: "connection refused".to_string(),
    }
}

impl AutomationBackend for FakeBackend {
    fn start_automation(&self, case_id: &CaseId) -> Result<(), ApiError> {
        self.record(format!("start:{case_id}"));
        if self.fail_start {
            return Err(rejected("start-automation"));
        }
        Ok(())
    }

    fn open_stream(
        &self,
        case_id: &CaseId,
        endpoint: StreamEndpoint,
    ) -> Result<EventBody, ApiError> {
        self.record(format!("stream:{case_id}:{}", endpoint.path_segment()));
        let body = self
            .streams
            .lock()
            .expect("streams lock")
            .get_mut(endpoint.path_segment())
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| rejected(endpoint.path_segment()))?;
        Ok(Box::new(Cursor::new(body.into_bytes())))
    }

    fn automation_status(&self, case_id: &CaseId) -> Result<AutomationStatus, ApiError> {
        self.record(format!("status:{case_id}"));
        let mut statuses = self.statuses.lock().expect("statuses lock");
        if statuses.len() > 1 {
            return Ok(statuses.pop_front().expect("queued status"));
        }
        statuses
            .front()
            .cloned()
            .ok_or_else(|| rejected("automation/status"))
    }

    fn persist_step(&self, case_id: &CaseId, step: u32) -> Result<(), ApiError> {
        self.record(format!("persist:{case_id}:{step}"));
        if self.fail_persist {
            return Err(rejected("step"));
        }
        Ok(())
    }

    fn cancel_automation(&self, case_id: &CaseId) -> Result<(), ApiError> {
        self.record(format!("cancel:{case_id}"));
        if self.fail_cancel {
            return Err(rejected("cancel-automation"));
        }
        Ok(())
    }
}

pub fn case(raw: &str) -> CaseId {
    CaseId::parse(raw).expect("valid case id")
}

/// Frames each record as one `data:` line followed by a blank separator.
pub fn sse(records: &[Value]) -> String {
    records
        .iter()
        .map(|record| format!("data: {record}\n\n"))
        .collect()
}

pub fn status(value: Value) -> AutomationStatus {
    serde_json::from_value(value).expect("valid status")
}

/// One canned HTTP response, matched on method and exact path.
#[derive(Clone)]
pub struct Route {
    pub method: &'static str,
    pub path: String,
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Route {
    pub fn json(method: &'static str, path: &str, body: Value) -> Self {
        Self {
            method,
            path: path.to_string(),
            status: 200,
            content_type: "application/json",
            body: body.to_string().into_bytes(),
        }
    }

    pub fn raw(method: &'static str, path: &str, content_type: &'static str, body: &[u8]) -> Self {
        Self {
            method,
            path: path.to_string(),
            status: 200,
            content_type,
            body: body.to_vec(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// Local HTTP/1.1 server answering every connection from a fixed route
/// table. Unmatched requests get a 404.
pub struct FakeServer {
    pub base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    pub fn spawn(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    break;
                };
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let path = parts.next().unwrap_or_default().to_string();

                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).expect("read header line");
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap_or(0);
                        }
                    }
                }
                let mut body = vec![0u8; content_length];
                reader.read_exact(&mut body).expect("read request body");
                seen.lock()
                    .expect("requests lock")
                    .push(format!("{method} {path}"));

                let route = routes
                    .iter()
                    .find(|route| route.method == method && route.path == path);
                let (status, content_type, payload) = match route {
                    Some(route) => (route.status, route.content_type, route.body.clone()),
                    None => (404, "text/plain", b"not found".to_vec()),
                };
                let head = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    reason(status),
                    payload.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(&payload);
                let _ = stream.flush();
            }
        });

        Self {
            base: format!("http://{addr}"),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
