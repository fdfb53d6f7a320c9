//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use futures::stream;
use std::sync::Mutex;

use crate::error::Error;
use crate::provider::{LineStream, ReasoningProvider, ReasoningRequest};

enum MockResponse {
    Stream(Vec<Result<String, Error>>),
    Fail(Error),
    Pending,
}

/// A mock provider that replays pre-configured line streams.
pub struct MockProvider {
    responses: Mutex<Vec<MockResponse>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<ReasoningRequest>>,
    pub name: String,
    pub default_model: String,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            captured_requests: Mutex::new(Vec::new()),
            name: "mock".to_string(),
            default_model: "mock-reasoner".to_string(),
        }
    }

    fn push(&self, response: MockResponse) {
        // FIFO: first queued = first returned.
        self.responses.lock().unwrap().insert(0, response);
    }

    /// Queue a stream of raw SSE lines for the next call.
    pub fn queue_lines(&self, lines: Vec<String>) {
        self.push(MockResponse::Stream(lines.into_iter().map(Ok).collect()));
    }

    /// Queue a stream that may contain mid-stream errors.
    pub fn queue_stream(&self, items: Vec<Result<String, Error>>) {
        self.push(MockResponse::Stream(items));
    }

    /// Make the next call fail before any stream is opened.
    pub fn queue_error(&self, error: Error) {
        self.push(MockResponse::Fail(error));
    }

    /// Make the next call open a stream that never yields.
    pub fn queue_pending(&self) {
        self.push(MockResponse::Pending);
    }

    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<ReasoningRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReasoningProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn stream_lines(&self, request: ReasoningRequest) -> Result<LineStream, Error> {
        self.captured_requests.lock().unwrap().push(request);
        match self.responses.lock().unwrap().pop() {
            Some(MockResponse::Stream(items)) => Ok(Box::pin(stream::iter(items))),
            Some(MockResponse::Fail(error)) => Err(error),
            Some(MockResponse::Pending) => Ok(Box::pin(stream::pending::<Result<String, Error>>())),
            None => Err(Error::stream("No mock response queued")),
        }
    }
}
