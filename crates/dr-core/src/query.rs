//! Query normalization and prompt templating.

use serde::{Deserialize, Serialize};

/// A caller's question, optionally preceded by background context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub question: String,
}

impl Query {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            context: None,
            question: question.into(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Merge context and question into a single prompt.
    ///
    /// An empty context counts as absent. An empty question is passed through
    /// as an empty prompt; nothing upstream rejects it.
    pub fn prompt(&self) -> Prompt {
        match self.context.as_deref() {
            Some(context) if !context.is_empty() => {
                Prompt(format!("{}\n{}", context, self.question))
            }
            _ => Prompt(self.question.clone()),
        }
    }
}

/// The normalized text sent to the reasoning model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Prompt {
    fn from(s: &str) -> Self {
        Prompt(s.to_string())
    }
}

impl From<String> for Prompt {
    fn from(s: String) -> Self {
        Prompt(s)
    }
}

/// How the prompt is presented to the model as the user message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    /// Send the prompt verbatim.
    Raw,
    /// Embed the prompt in a structured reasoning-task instruction.
    #[default]
    ReasoningTask,
}

impl PromptTemplate {
    pub fn render(&self, prompt: &Prompt) -> String {
        match self {
            PromptTemplate::Raw => prompt.as_str().to_string(),
            PromptTemplate::ReasoningTask => format!(
                "[REASONING TASK]\n\
                 Please analyze this query using your advanced reasoning capabilities:\n\
                 \n\
                 CONTEXT & QUERY:\n\
                 {}\n\
                 \n\
                 REQUIRED ANALYSIS STRUCTURE:\n\
                 1. Initial impressions and key components\n\
                 2. Logical relationships and dependencies\n\
                 3. Critical assumptions and implications\n\
                 4. Synthesis and confidence assessment\n\
                 \n\
                 Please structure your response to cover all these aspects systematically.\n",
                prompt
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_yields_question() {
        let query = Query::new("Why?").with_context("");
        assert_eq!(query.prompt().as_str(), "Why?");
    }

    #[test]
    fn test_missing_context_yields_question() {
        assert_eq!(Query::new("Why?").prompt().as_str(), "Why?");
    }

    #[test]
    fn test_context_joined_with_newline() {
        let query = Query::new("What next?").with_context("We shipped v1.");
        assert_eq!(query.prompt().as_str(), "We shipped v1.\nWhat next?");
    }

    #[test]
    fn test_empty_question_is_not_an_error() {
        let prompt = Query::default().prompt();
        assert!(prompt.is_empty());
    }

    #[test]
    fn test_query_deserialize_without_context() {
        let query: Query = serde_json::from_str(r#"{"question": "Why?"}"#).unwrap();
        assert_eq!(query.context, None);
        assert_eq!(query.question, "Why?");
    }

    #[test]
    fn test_raw_template_is_verbatim() {
        let prompt = Prompt::from("line one\nline two");
        assert_eq!(PromptTemplate::Raw.render(&prompt), "line one\nline two");
    }

    #[test]
    fn test_reasoning_task_template_embeds_prompt() {
        let rendered = PromptTemplate::ReasoningTask.render(&Prompt::from("Is P = NP?"));
        assert!(rendered.starts_with("[REASONING TASK]\n"));
        assert!(rendered.contains("CONTEXT & QUERY:\nIs P = NP?\n\nREQUIRED ANALYSIS STRUCTURE:"));
        assert!(rendered.contains("4. Synthesis and confidence assessment\n"));
    }

    #[test]
    fn test_template_deserialize() {
        let raw: PromptTemplate = serde_json::from_str(r#""raw""#).unwrap();
        assert_eq!(raw, PromptTemplate::Raw);
        let task: PromptTemplate = serde_json::from_str(r#""reasoning_task""#).unwrap();
        assert_eq!(task, PromptTemplate::ReasoningTask);
    }
}
