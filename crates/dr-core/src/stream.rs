//! Server-sent-event frame parsing and reasoning aggregation.
//!
//! The remote endpoint streams newline-delimited frames. Only `data: ` frames
//! matter; each carries a JSON chunk whose `choices[0].delta.reasoning_content`
//! holds the next reasoning fragment. A bad frame never aborts the stream, it
//! is counted in [`FrameStats`] and skipped.

use std::io;

use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, trace};

use crate::error::Error;
use crate::provider::LineStream;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

/// Per-stream counters. Lets callers see how many frames were dropped without
/// the parser ever failing on them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Every line fed to the parser.
    pub lines: usize,
    /// Lines carrying the `data: ` prefix, sentinel included.
    pub data_frames: usize,
    pub sentinels: usize,
    /// Non-data lines (blank separators, `event:`, comments).
    pub ignored: usize,
    /// Data frames whose payload was not valid JSON.
    pub malformed: usize,
    /// Valid JSON without a non-empty reasoning field.
    pub empty: usize,
    pub fragments: usize,
}

impl FrameStats {
    pub fn skipped(&self) -> usize {
        self.malformed + self.empty
    }
}

#[derive(Debug, Deserialize)]
struct ReasoningChunk {
    #[serde(default)]
    choices: Vec<ReasoningChoice>,
}

#[derive(Debug, Deserialize)]
struct ReasoningChoice {
    #[serde(default)]
    delta: Option<ReasoningDelta>,
}

#[derive(Debug, Deserialize)]
struct ReasoningDelta {
    #[serde(default)]
    reasoning_content: Option<String>,
}

impl ReasoningChunk {
    fn into_fragment(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()?
            .delta?
            .reasoning_content
            .filter(|content| !content.is_empty())
    }
}

/// Turns individual frames into reasoning fragments.
#[derive(Debug, Default)]
pub struct FrameParser {
    stats: FrameStats,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line; returns the fragment it contributes, if any.
    pub fn feed(&mut self, line: &str) -> Option<String> {
        self.stats.lines += 1;

        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            self.stats.ignored += 1;
            return None;
        };
        self.stats.data_frames += 1;

        if payload == DONE_SENTINEL {
            self.stats.sentinels += 1;
            return None;
        }

        let chunk = match serde_json::from_str::<ReasoningChunk>(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.stats.malformed += 1;
                debug!(error = %e, bytes = payload.len(), "Skipping malformed SSE frame");
                return None;
            }
        };

        match chunk.into_fragment() {
            Some(fragment) => {
                self.stats.fragments += 1;
                trace!(chars = fragment.len(), "Reasoning fragment");
                Some(fragment)
            }
            None => {
                self.stats.empty += 1;
                None
            }
        }
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}

/// Longest line accepted from the wire. A peer that never sends a newline
/// fails the stream instead of growing the buffer.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Frame a byte reader into lines.
///
/// `\n` and `\r\n` both terminate a line. An unterminated tail is flushed at
/// end of input. Read failures come out as [`Error::Stream`], or
/// [`Error::Timeout`] when the reader reports `TimedOut`.
pub fn frame_lines<R>(reader: R) -> impl Stream<Item = Result<String, Error>> + Send
where
    R: AsyncRead + Send,
{
    FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH))
        .map(|line| line.map_err(line_error))
}

fn line_error(err: LinesCodecError) -> Error {
    match err {
        LinesCodecError::MaxLineLengthExceeded => Error::stream(format!(
            "line exceeds {} bytes without a newline",
            MAX_LINE_LENGTH
        )),
        LinesCodecError::Io(e) if e.kind() == io::ErrorKind::TimedOut => {
            Error::timeout(e.to_string())
        }
        LinesCodecError::Io(e) => Error::stream(e.to_string()),
    }
}

/// Result of consuming a whole stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    pub text: String,
    pub stats: FrameStats,
}

/// Join fragments with a single space, in the order given.
pub fn join_fragments<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for (i, fragment) in fragments.into_iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(fragment.as_ref());
    }
    text
}

/// Parse a complete set of lines already in memory.
pub fn aggregate_lines<I, S>(lines: I) -> Aggregation
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parser = FrameParser::new();
    let fragments: Vec<String> = lines
        .into_iter()
        .filter_map(|line| parser.feed(line.as_ref()))
        .collect();
    Aggregation {
        text: join_fragments(fragments),
        stats: parser.stats(),
    }
}

/// Consume a line stream exactly once, joining every reasoning fragment.
///
/// A transport error anywhere in the stream aborts the aggregation; partial
/// text is discarded.
pub async fn aggregate(mut lines: LineStream) -> Result<Aggregation, Error> {
    let mut parser = FrameParser::new();
    let mut fragments = Vec::new();

    while let Some(line) = lines.next().await {
        if let Some(fragment) = parser.feed(&line?) {
            fragments.push(fragment);
        }
    }

    let stats = parser.stats();
    debug!(
        fragments = stats.fragments,
        malformed = stats.malformed,
        empty = stats.empty,
        ignored = stats.ignored,
        "Reasoning stream complete"
    );

    Ok(Aggregation {
        text: join_fragments(fragments),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio_util::io::StreamReader;

    fn frame(content: &str) -> String {
        format!(
            r#"data: {{"choices":[{{"delta":{{"reasoning_content":{}}}}}]}}"#,
            serde_json::to_string(content).unwrap()
        )
    }

    fn line_stream(lines: Vec<Result<String, Error>>) -> LineStream {
        Box::pin(stream::iter(lines))
    }

    #[test]
    fn test_done_sentinel_between_frames() {
        let agg = aggregate_lines([frame("A"), "data: [DONE]".to_string(), frame("B")]);
        assert_eq!(agg.text, "A B");
        assert_eq!(agg.stats.sentinels, 1);
        assert_eq!(agg.stats.fragments, 2);
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let agg = aggregate_lines([
            ": keep-alive".to_string(),
            String::new(),
            "event: message".to_string(),
            frame("only"),
            // Missing space after the colon is not the data prefix.
            r#"data:{"choices":[{"delta":{"reasoning_content":"x"}}]}"#.to_string(),
        ]);
        assert_eq!(agg.text, "only");
        assert_eq!(agg.stats.ignored, 4);
    }

    #[test]
    fn test_malformed_frame_does_not_drop_rest() {
        let agg = aggregate_lines([
            frame("first"),
            r#"data: {"choices":[{"delta":"#.to_string(),
            frame("second"),
        ]);
        assert_eq!(agg.text, "first second");
        assert_eq!(agg.stats.malformed, 1);
        assert_eq!(agg.stats.skipped(), 1);
    }

    #[test]
    fn test_missing_path_contributes_nothing() {
        let agg = aggregate_lines([
            r#"data: {}"#,
            r#"data: {"choices":[]}"#,
            r#"data: {"choices":[{}]}"#,
            r#"data: {"choices":[{"delta":{}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"answer"}}]}"#,
            r#"data: {"choices":[{"delta":{"reasoning_content":""}}]}"#,
            r#"data: {"choices":[{"delta":{"reasoning_content":null}}]}"#,
        ]);
        assert_eq!(agg.text, "");
        assert_eq!(agg.stats.empty, 7);
        assert_eq!(agg.stats.malformed, 0);
    }

    #[test]
    fn test_only_first_choice_is_used() {
        let agg = aggregate_lines([
            r#"data: {"choices":[{"delta":{"reasoning_content":"one"}},{"delta":{"reasoning_content":"two"}}]}"#,
        ]);
        assert_eq!(agg.text, "one");
    }

    #[test]
    fn test_order_is_preserved() {
        let forward = aggregate_lines([frame("x"), frame("y"), frame("z")]);
        let reversed = aggregate_lines([frame("z"), frame("y"), frame("x")]);
        assert_eq!(forward.text, "x y z");
        assert_eq!(reversed.text, "z y x");
    }

    #[test]
    fn test_duplicates_are_kept() {
        let agg = aggregate_lines([frame("same"), frame("same")]);
        assert_eq!(agg.text, "same same");
    }

    #[test]
    fn test_empty_input() {
        let agg = aggregate_lines(Vec::<String>::new());
        assert_eq!(agg.text, "");
        assert_eq!(agg.stats, FrameStats::default());
    }

    async fn framed(chunks: Vec<Result<&'static [u8], io::Error>>) -> Vec<Result<String, Error>> {
        frame_lines(StreamReader::new(stream::iter(chunks)))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_frame_lines_reassembles_split_lines() {
        let lines = framed(vec![
            Ok(b"data: {\"a\"".as_slice()),
            Ok(b":1}\r\n\ndata: [DO".as_slice()),
            Ok(b"NE]\n".as_slice()),
        ])
        .await;
        let lines: Vec<String> = lines.into_iter().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["data: {\"a\":1}", "", "data: [DONE]"]);
    }

    #[tokio::test]
    async fn test_frame_lines_split_utf8() {
        let bytes = "data: caf\u{e9}\n".as_bytes();
        // Split inside the two-byte encoding of 'é'.
        let split = bytes.len() - 2;
        let lines = framed(vec![Ok(&bytes[..split]), Ok(&bytes[split..])]).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_deref().unwrap(), "data: caf\u{e9}");
    }

    #[tokio::test]
    async fn test_frame_lines_flushes_unterminated_tail() {
        let lines: Vec<_> = frame_lines(b"data: [DONE]".as_slice()).collect().await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_deref().unwrap(), "data: [DONE]");
    }

    #[tokio::test]
    async fn test_frame_lines_rejects_endless_line() {
        let endless = io::Cursor::new(vec![b'x'; MAX_LINE_LENGTH * 4]);
        let mut lines = Box::pin(frame_lines(endless));
        let first = lines.next().await.unwrap();
        assert!(matches!(first, Err(Error::Stream(ref msg)) if msg.contains("exceeds")));
    }

    #[tokio::test]
    async fn test_frame_lines_read_errors() {
        let lines = framed(vec![
            Ok(b"data: one\n".as_slice()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
        ])
        .await;
        assert_eq!(lines[0].as_deref().unwrap(), "data: one");
        assert!(matches!(lines[1], Err(Error::Stream(ref msg)) if msg.contains("reset by peer")));

        let lines = framed(vec![Err(io::Error::new(io::ErrorKind::TimedOut, "deadline"))]).await;
        assert!(matches!(lines[0], Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_aggregate_stream() {
        let lines = line_stream(vec![
            Ok(frame("A")),
            Ok("data: [DONE]".to_string()),
            Ok(frame("B")),
        ]);
        let agg = aggregate(lines).await.unwrap();
        assert_eq!(agg.text, "A B");
    }

    #[tokio::test]
    async fn test_aggregate_stream_error_is_not_partial_success() {
        let lines = line_stream(vec![
            Ok(frame("A")),
            Err(Error::stream("connection reset")),
            Ok(frame("B")),
        ]);
        let err = aggregate(lines).await.unwrap_err();
        assert!(matches!(err, Error::Stream(_)));
    }
}
