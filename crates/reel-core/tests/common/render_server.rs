//! Minimal HTTP/1.1 renderer stand-in for integration tests.
//!
//! Answers `POST /api/video/create` and `GET /api/video/status/{id}` from
//! scripted reply queues (the last reply of a queue repeats), serves static
//! files registered with [`RenderServer::serve_file`], and records every
//! request it sees. One request per connection (`Connection: close`).

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: value.to_string().into_bytes(),
        }
    }

    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: "application/octet-stream",
            body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

#[derive(Default)]
struct State {
    create: VecDeque<Reply>,
    status: VecDeque<Reply>,
    files: HashMap<String, Reply>,
    requests: Vec<Recorded>,
}

#[derive(Clone)]
pub struct RenderServer {
    base: String,
    state: Arc<Mutex<State>>,
}

impl RenderServer {
    /// Bind on an ephemeral port and serve in background threads until the
    /// process exits.
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{port}/"),
            state,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn on_create(&self, reply: Reply) -> &Self {
        self.state.lock().unwrap().create.push_back(reply);
        self
    }

    pub fn on_status(&self, reply: Reply) -> &Self {
        self.state.lock().unwrap().status.push_back(reply);
        self
    }

    pub fn serve_file(&self, path: &str, body: Vec<u8>) -> &Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), Reply::bytes(200, body));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, method: &str, path_prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .count()
    }
}

fn next_reply(queue: &mut VecDeque<Reply>) -> Option<Reply> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

fn route(state: &Mutex<State>, method: &str, path: &str) -> Reply {
    let mut state = state.lock().unwrap();
    let scripted = match (method, path) {
        ("POST", "/api/video/create") => next_reply(&mut state.create),
        ("GET", p) if p.starts_with("/api/video/status/") => next_reply(&mut state.status),
        ("GET", p) => state.files.get(p).cloned(),
        _ => None,
    };
    scripted.unwrap_or_else(|| Reply::json(404, serde_json::json!({ "detail": "Not Found" })))
}

fn read_request(stream: &mut TcpStream) -> Option<(String, String, String)> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < header_end + content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    let body = String::from_utf8_lossy(&data[header_end..]).to_string();
    Some((method, path, body))
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some((method, path, body)) = read_request(&mut stream) else {
        return;
    };
    state.lock().unwrap().requests.push(Recorded {
        method: method.clone(),
        path: path.clone(),
        body,
    });
    let reply = route(state, &method, &path);
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reason(reply.status),
        reply.content_type,
        reply.body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&reply.body);
    let _ = stream.flush();
}
