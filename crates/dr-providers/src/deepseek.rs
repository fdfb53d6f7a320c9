use std::io;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::io::StreamReader;
use tracing::{debug, trace, warn};

use dr_core::{frame_lines, Error, LineStream, ReasoningProvider, ReasoningRequest};

const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
const DEFAULT_MODEL: &str = "deepseek-reasoner";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DeepSeekProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl DeepSeekProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: build_client(DEFAULT_REQUEST_TIMEOUT, DEFAULT_CONNECT_TIMEOUT),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Bound the whole request (stream included) and the connect phase.
    pub fn with_timeouts(mut self, request: Duration, connect: Duration) -> Self {
        self.client = build_client(request, connect);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request(&self, request: &ReasoningRequest) -> DeepSeekChatRequest {
        DeepSeekChatRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages: vec![DeepSeekMessage {
                role: "user".to_string(),
                content: request.content.clone(),
            }],
            stream: true,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }

    fn parse_error(&self, status: u16, body: &str) -> Error {
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: ErrorDetail,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            message: String,
        }

        let message = serde_json::from_str::<ErrorResponse>(body)
            .map(|err| err.error.message)
            .unwrap_or_else(|_| body.to_string());

        match status {
            401 | 403 => Error::auth(message),
            429 => Error::rate_limit(message),
            400 => Error::invalid_request(message),
            _ => Error::api(status, message),
        }
    }
}

fn build_client(request_timeout: Duration, connect_timeout: Duration) -> Client {
    // HTTP/1.1 and no decompression, so SSE lines arrive as they are sent
    Client::builder()
        .http1_only()
        .no_gzip()
        .no_brotli()
        .no_deflate()
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::timeout(err.to_string())
    } else {
        Error::network(err.to_string())
    }
}

/// Body read failures, keeping an elapsed deadline distinguishable.
fn read_error(err: reqwest::Error) -> io::Error {
    let kind = if err.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    io::Error::new(kind, err)
}

#[async_trait]
impl ReasoningProvider for DeepSeekProvider {
    fn name(&self) -> &str {
        "deepseek"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn stream_lines(&self, request: ReasoningRequest) -> Result<LineStream, Error> {
        if self.api_key.trim().is_empty() {
            return Err(Error::auth("no API key configured (set DEEPSEEK_API_KEY)"));
        }

        let api_request = self.build_request(&request);
        debug!(model = %api_request.model, max_tokens = api_request.max_tokens, "DeepSeek stream request");

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .json(&api_request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &error_text));
        }

        let (tx, rx) = mpsc::channel::<Result<String, Error>>(100);

        // The task owns the response; every exit below drops it and closes
        // the connection.
        tokio::spawn(async move {
            let bytes = response.bytes_stream().map(|chunk| chunk.map_err(read_error));
            let lines = frame_lines(StreamReader::new(bytes));
            tokio::pin!(lines);
            let mut line_count = 0usize;

            loop {
                let line = tokio::select! {
                    _ = tx.closed() => {
                        debug!(lines = line_count, "SSE consumer dropped, closing connection");
                        return;
                    }
                    line = lines.next() => line,
                };

                match line {
                    Some(Ok(line)) => {
                        line_count += 1;
                        trace!(bytes = line.len(), "SSE line");
                        if tx.send(Ok(line)).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "SSE stream read failed");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                    None => {
                        debug!(lines = line_count, "SSE stream ended");
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)) as LineStream)
    }
}

// DeepSeek API types

#[derive(Debug, Serialize)]
struct DeepSeekChatRequest {
    model: String,
    messages: Vec<DeepSeekMessage>,
    stream: bool,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct DeepSeekMessage {
    role: String,
    content: String,
}
