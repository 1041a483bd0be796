#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use hdr_ai::index::SnapshotStore;
use hdr_ai::model::{Chunk, ConversationTurn, IndexSnapshot};
use hdr_ai::providers::Provider;
use hdr_core::config::ProviderName;
use hdr_core::error::{AppError, ErrorKind};

/// Shared view of what a [`ScriptedProvider`] was asked to do.
#[derive(Debug, Default)]
pub struct CallLog {
    pub embeds: AtomicUsize,
    pub generations: AtomicUsize,
    pub probes: AtomicUsize,
    pub last_question: Mutex<Option<String>>,
    pub last_context_len: AtomicUsize,
}

impl CallLog {
    pub fn embeds(&self) -> usize {
        self.embeds.load(Ordering::SeqCst)
    }

    pub fn generations(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn last_question(&self) -> Option<String> {
        self.last_question.lock().expect("lock").clone()
    }
}

/// Test double with canned answers and failures, counting every call.
pub struct ScriptedProvider {
    name: ProviderName,
    available: bool,
    answer: String,
    failure: Option<AppError>,
    embedder: fn(&str) -> Vec<f32>,
    log: Arc<CallLog>,
}

pub fn keyword_embedding(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    vec![
        lower.matches("router").count() as f32,
        lower.matches("printer").count() as f32,
        lower.matches("password").count() as f32,
        0.01,
    ]
}

impl ScriptedProvider {
    pub fn new(name: ProviderName, answer: &str) -> (Self, Arc<CallLog>) {
        let log = Arc::new(CallLog::default());
        (
            Self {
                name,
                available: true,
                answer: answer.to_string(),
                failure: None,
                embedder: keyword_embedding,
                log: Arc::clone(&log),
            },
            log,
        )
    }

    pub fn failing(mut self, err: AppError) -> Self {
        self.failure = Some(err);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_embedder(mut self, embedder: fn(&str) -> Vec<f32>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn boxed(self) -> Option<Box<dyn Provider>> {
        Some(Box::new(self))
    }

    fn outcome<T>(&self, ok: T) -> Result<T, AppError> {
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(ok),
        }
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> ProviderName {
        self.name
    }

    fn model_id(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        self.log.probes.fetch_add(1, Ordering::SeqCst);
        self.available
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        self.log.embeds.fetch_add(1, Ordering::SeqCst);
        self.outcome((self.embedder)(text))
    }

    fn generate_grounded_answer(
        &self,
        question: &str,
        context: &[Chunk],
        _history: &[ConversationTurn],
    ) -> Result<String, AppError> {
        self.log.generations.fetch_add(1, Ordering::SeqCst);
        self.log.last_context_len.store(context.len(), Ordering::SeqCst);
        *self.log.last_question.lock().expect("lock") = Some(question.to_string());
        self.outcome(format!("{} (grounded)", self.answer))
    }

    fn generate_general_answer(
        &self,
        question: &str,
        _history: &[ConversationTurn],
    ) -> Result<String, AppError> {
        self.log.generations.fetch_add(1, Ordering::SeqCst);
        *self.log.last_question.lock().expect("lock") = Some(question.to_string());
        self.outcome(format!("{} (general)", self.answer))
    }
}

pub fn rate_limited() -> AppError {
    AppError::new(ErrorKind::RateLimited, "AI_GEMINI_RATE_LIMITED", "quota exhausted")
        .with_retryable(true)
}

pub fn unreachable() -> AppError {
    AppError::new(ErrorKind::ProviderUnavailable, "AI_OLLAMA_UNREACHABLE", "connection refused")
}

/// Snapshot store whose writes can be switched to fail. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FlakyStore {
    fail_saves: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SnapshotStore for FlakyStore {
    fn load(&self) -> Result<Option<IndexSnapshot>, AppError> {
        Ok(None)
    }

    fn save(&self, _snapshot: &IndexSnapshot) -> Result<(), AppError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::new(ErrorKind::Storage, "INDEX_WRITE_FAILED", "disk full"));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Header names lowercased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is json")
    }
}

/// Serves the given `(status, body)` replies to consecutive connections, then stops.
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

fn read_request(stream: &TcpStream) -> RecordedRequest {
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    let mut line = String::new();
    reader.read_line(&mut line).expect("request line");
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut headers = Vec::new();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).expect("header");
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).expect("body");
    RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

impl MockServer {
    pub fn start(replies: Vec<(u16, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let replies: Vec<(u16, String)> = replies.into_iter().map(|(s, b)| (s, b.to_string())).collect();

        let handle = thread::spawn(move || {
            for (status, body) in replies {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let req = read_request(&stream);
                recorded.lock().expect("lock").push(req);
                let reply = format!(
                    "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    reason(status),
                    body.len()
                );
                let _ = stream.write_all(reply.as_bytes());
                let _ = stream.flush();
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            handle: Some(handle),
        }
    }

    /// Wait for every reply to be served and return what was received.
    pub fn finish(mut self) -> Vec<RecordedRequest> {
        if let Some(h) = self.handle.take() {
            h.join().expect("mock server thread");
        }
        self.requests.lock().expect("lock").clone()
    }
}

/// A URL nothing listens on.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}
