//! dr-core: Core types and the reasoning pipeline for deep-reason
//!
//! This crate holds the provider-agnostic parts: query normalization, SSE
//! frame parsing and aggregation, result formatting and the `Reasoner` that
//! ties them together.

pub mod error;
pub mod format;
pub mod provider;
pub mod query;
pub mod reasoner;
pub mod stream;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, ErrorKind};
pub use format::{
    is_error_report, ErrorReporter, FormatStyle, MinimalFormatter, ResponseFormatter,
    VerboseFormatter,
};
pub use provider::{LineStream, ReasoningProvider, ReasoningRequest};
pub use query::{Prompt, PromptTemplate, Query};
pub use reasoner::Reasoner;
pub use stream::{
    aggregate, aggregate_lines, frame_lines, Aggregation, FrameParser, FrameStats, MAX_LINE_LENGTH,
};

pub type Result<T> = std::result::Result<T, Error>;
