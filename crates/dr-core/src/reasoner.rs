//! End-to-end `reason` pipeline: query in, formatted string out.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::format::{ErrorReporter, FormatStyle, ResponseFormatter};
use crate::provider::{ReasoningProvider, ReasoningRequest};
use crate::query::{PromptTemplate, Query};
use crate::stream::{aggregate, Aggregation};

/// Drives one query through the provider, the frame parser and the
/// formatter. Holds no per-call state, so one instance serves any number of
/// concurrent calls.
pub struct Reasoner {
    provider: Arc<dyn ReasoningProvider>,
    formatter: Box<dyn ResponseFormatter>,
    template: PromptTemplate,
    model: Option<String>,
    temperature: Option<f32>,
}

impl Reasoner {
    pub fn new(provider: Arc<dyn ReasoningProvider>) -> Self {
        Self {
            provider,
            formatter: FormatStyle::default().formatter(),
            template: PromptTemplate::default(),
            model: None,
            temperature: None,
        }
    }

    pub fn with_formatter(mut self, formatter: Box<dyn ResponseFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_format_style(self, style: FormatStyle) -> Self {
        self.with_formatter(style.formatter())
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn formatter_name(&self) -> &str {
        self.formatter.name()
    }

    fn build_request(&self, query: &Query) -> ReasoningRequest {
        let prompt = query.prompt();
        let mut request = ReasoningRequest::new(self.template.render(&prompt));
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }

    /// Stream and aggregate the reasoning for `query`, without formatting.
    pub async fn collect(&self, query: &Query) -> Result<Aggregation, Error> {
        let request = self.build_request(query);
        debug!(
            provider = self.provider.name(),
            model = request.model.as_deref().unwrap_or(self.provider.default_model()),
            prompt_chars = request.content.len(),
            "Opening reasoning stream"
        );

        let lines = self.provider.stream_lines(request).await?;
        let aggregation = aggregate(lines).await?;

        if aggregation.stats.skipped() > 0 {
            debug!(
                malformed = aggregation.stats.malformed,
                empty = aggregation.stats.empty,
                "Frames skipped during aggregation"
            );
        }
        Ok(aggregation)
    }

    /// Like [`Reasoner::reason`] but surfaces the failure instead of
    /// rendering it.
    pub async fn try_reason(&self, query: &Query) -> Result<String, Error> {
        let aggregation = self.collect(query).await?;
        info!(
            fragments = aggregation.stats.fragments,
            chars = aggregation.text.chars().count(),
            "Reasoning aggregated"
        );
        self.formatter.format(&aggregation.text)
    }

    /// Run the pipeline. Always returns a string: either the formatted
    /// reasoning or an error report.
    pub async fn reason(&self, query: &Query) -> String {
        match self.try_reason(query).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "Reasoning failed");
                ErrorReporter::report(&e)
            }
        }
    }

    /// Run the pipeline until it finishes or `cancel` fires. Cancelling drops
    /// the in-flight stream, which closes the connection.
    pub async fn reason_with_cancel(&self, query: &Query, cancel: &CancellationToken) -> String {
        tokio::select! {
            output = self.reason(query) => output,
            _ = cancel.cancelled() => {
                warn!("Reasoning cancelled");
                ErrorReporter::report(&Error::Cancelled)
            }
        }
    }
}
