//! Caller-facing rendering of aggregated reasoning, and of failures.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const THINKING_OPEN: &str = "<ant_thinking>";
pub const THINKING_CLOSE: &str = "</ant_thinking>";
pub const ERROR_OPEN: &str = "<reasoning_error>";
pub const ERROR_CLOSE: &str = "</reasoning_error>";

/// Renders aggregated reasoning into the string handed back to the caller.
pub trait ResponseFormatter: Send + Sync {
    fn name(&self) -> &str;

    fn format(&self, reasoning: &str) -> Result<String, Error>;
}

/// Which formatter to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatStyle {
    Minimal,
    #[default]
    Verbose,
}

impl FormatStyle {
    pub fn formatter(self) -> Box<dyn ResponseFormatter> {
        match self {
            FormatStyle::Minimal => Box::new(MinimalFormatter),
            FormatStyle::Verbose => Box::new(VerboseFormatter),
        }
    }
}

impl std::str::FromStr for FormatStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimal" => Ok(FormatStyle::Minimal),
            "verbose" => Ok(FormatStyle::Verbose),
            other => Err(Error::config(format!("unknown format style: {}", other))),
        }
    }
}

/// Wraps the reasoning verbatim in thinking tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinimalFormatter;

impl ResponseFormatter for MinimalFormatter {
    fn name(&self) -> &str {
        "minimal"
    }

    fn format(&self, reasoning: &str) -> Result<String, Error> {
        Ok(format!("{}\n{}\n{}", THINKING_OPEN, reasoning, THINKING_CLOSE))
    }
}

/// Window boundaries, in characters. The last window runs to the end.
pub const PHASE_BREAKS: [usize; 4] = [150, 300, 450, 600];

/// Five-phase report. Each phase shows a fixed character window of the
/// reasoning; the cut points ignore word boundaries and windows past the end
/// are empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerboseFormatter;

impl VerboseFormatter {
    /// Split into the five phase windows.
    pub fn windows(reasoning: &str) -> [&str; 5] {
        let [a, b, c, d] = PHASE_BREAKS;
        [
            char_window(reasoning, 0, Some(a)),
            char_window(reasoning, a, Some(b)),
            char_window(reasoning, b, Some(c)),
            char_window(reasoning, c, Some(d)),
            char_window(reasoning, d, None),
        ]
    }
}

impl ResponseFormatter for VerboseFormatter {
    fn name(&self) -> &str {
        "verbose"
    }

    fn format(&self, reasoning: &str) -> Result<String, Error> {
        let [first, logic, assumptions, conclusions, quality] = Self::windows(reasoning);

        Ok(format!(
            "{open}
[DEEPSEEK R1 INITIAL ANALYSIS]
• First Principles: {first}
• Component Breakdown: Decomposing the problem space...
• Key Variables: Identifying critical factors...

[DEEPSEEK R1 REASONING CHAIN]
• Logical Framework: {logic}
• Causal Relationships: Mapping dependencies...
• Inference Patterns: Extracting reasoning structures...

[DEEPSEEK R1 CRITICAL ANALYSIS]
• Core Assumptions: {assumptions}
• Edge Cases: Stress-testing the logic...
• Uncertainty Assessment: Quantifying confidence levels...

[DEEPSEEK R1 SYNTHESIS]
• Primary Conclusions: {conclusions}
• Confidence Metrics: Evaluating reasoning robustness...
• Action Implications: Practical consequences...

[DEEPSEEK R1 METACOGNITION]
• Reasoning Quality: {quality}
• Bias Detection: Checking for systematic errors...
• Knowledge Boundaries: Acknowledging limitations...
{close}

Based on DeepSeek R1's comprehensive analysis, proceeding to formulate response...",
            open = THINKING_OPEN,
            close = THINKING_CLOSE,
        ))
    }
}

/// Slice by character offsets, clamped to the string. Never splits a char.
fn char_window(s: &str, start: usize, end: Option<usize>) -> &str {
    let byte_at = |n: usize| s.char_indices().nth(n).map_or(s.len(), |(i, _)| i);
    let from = byte_at(start);
    let to = end.map_or(s.len(), byte_at);
    if from >= to {
        ""
    } else {
        &s[from..to]
    }
}

/// Turns failures into the structured error shape instead of raising them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn report(error: &dyn Display) -> String {
        format!(
            "{open}
[DEEPSEEK R1 ERROR ANALYSIS]
• Error Nature: {error}
• Processing Impact: Effects on reasoning pipeline
• Recovery Options: Alternative reasoning paths
• System Status: Current reasoning capabilities

[MITIGATION STRATEGY]
• Immediate Actions: Required interventions
• Fallback Logic: Alternative reasoning approaches
• Quality Assurance: Validation requirements
{close}

Analyzing DeepSeek R1's error state and implications...",
            open = ERROR_OPEN,
            close = ERROR_CLOSE,
        )
    }
}

/// True if `output` is an error report rather than a reasoning result.
pub fn is_error_report(output: &str) -> bool {
    output.starts_with(ERROR_OPEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_wraps_verbatim() {
        let out = MinimalFormatter.format("step one  step two").unwrap();
        assert_eq!(out, "<ant_thinking>\nstep one  step two\n</ant_thinking>");
    }

    #[test]
    fn test_short_input_leaves_later_windows_empty() {
        let reasoning = "short reasoning";
        let windows = VerboseFormatter::windows(reasoning);
        assert_eq!(windows[0], reasoning);
        assert!(windows[1..].iter().all(|w| w.is_empty()));

        let out = VerboseFormatter.format(reasoning).unwrap();
        assert!(out.contains("• First Principles: short reasoning\n"));
        assert!(out.contains("• Logical Framework: \n"));
        assert!(out.contains("• Core Assumptions: \n"));
        assert!(out.contains("• Primary Conclusions: \n"));
        assert!(out.contains("• Reasoning Quality: \n"));
    }

    #[test]
    fn test_windows_use_fixed_offsets() {
        let reasoning: String = (0..700).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let windows = VerboseFormatter::windows(&reasoning);
        assert_eq!(windows[0], &reasoning[0..150]);
        assert_eq!(windows[1], &reasoning[150..300]);
        assert_eq!(windows[2], &reasoning[300..450]);
        assert_eq!(windows[3], &reasoning[450..600]);
        assert_eq!(windows[4], &reasoning[600..]);
        assert_eq!(windows.concat(), reasoning);
    }

    #[test]
    fn test_windows_cut_mid_word() {
        let reasoning = "tok ".repeat(50);
        let windows = VerboseFormatter::windows(&reasoning);
        assert_eq!(windows[0].chars().count(), 150);
        assert!(windows[0].ends_with(" to"));
        assert!(windows[1].starts_with("k tok"));
        assert_eq!(windows[1], &reasoning[150..]);
    }

    #[test]
    fn test_windows_count_chars_not_bytes() {
        let reasoning = "é".repeat(200);
        let windows = VerboseFormatter::windows(&reasoning);
        assert_eq!(windows[0].chars().count(), 150);
        assert_eq!(windows[1].chars().count(), 50);
        assert!(windows[2].is_empty());
    }

    #[test]
    fn test_verbose_layout() {
        let out = VerboseFormatter.format("x").unwrap();
        assert!(out.starts_with("<ant_thinking>\n[DEEPSEEK R1 INITIAL ANALYSIS]\n"));
        assert!(out.ends_with(
            "</ant_thinking>\n\nBased on DeepSeek R1's comprehensive analysis, proceeding to formulate response..."
        ));
        for heading in [
            "[DEEPSEEK R1 REASONING CHAIN]",
            "[DEEPSEEK R1 CRITICAL ANALYSIS]",
            "[DEEPSEEK R1 SYNTHESIS]",
            "[DEEPSEEK R1 METACOGNITION]",
        ] {
            assert!(out.contains(heading), "missing {heading}");
        }
    }

    #[test]
    fn test_error_report_shape() {
        let report = ErrorReporter::report(&Error::network("connection refused"));
        assert!(is_error_report(&report));
        assert!(report.contains("• Error Nature: Network error: connection refused\n"));
        assert!(report.contains(ERROR_CLOSE));
        assert!(!is_error_report(&MinimalFormatter.format("ok").unwrap()));
    }

    #[test]
    fn test_format_style() {
        assert_eq!("minimal".parse::<FormatStyle>().unwrap(), FormatStyle::Minimal);
        assert_eq!("Verbose".parse::<FormatStyle>().unwrap(), FormatStyle::Verbose);
        assert!("fancy".parse::<FormatStyle>().is_err());
        assert_eq!(FormatStyle::Minimal.formatter().name(), "minimal");
        assert_eq!(FormatStyle::default().formatter().name(), "verbose");
    }
}
