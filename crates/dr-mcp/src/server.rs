//! MCP server exposing the single `reason` tool.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    service::RequestContext,
    tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dr_core::{Query, Reasoner};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReasonRequest {
    #[schemars(description = "Optional background information for the query")]
    #[serde(default)]
    pub context: Option<String>,
    #[schemars(description = "The specific question to reason about")]
    #[serde(default)]
    pub question: String,
}

impl From<ReasonRequest> for Query {
    fn from(req: ReasonRequest) -> Self {
        Query {
            context: req.context,
            question: req.question,
        }
    }
}

#[derive(Clone)]
pub struct ReasonServer {
    reasoner: Arc<Reasoner>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ReasonServer {
    #[tool(
        description = "Process a query through DeepSeek R1's reasoning engine and return its structured reasoning trace. Input: optional `context` and the `question` to reason about."
    )]
    async fn reason(
        &self,
        Parameters(req): Parameters<ReasonRequest>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let output = self.handle_reason(req, &context.ct).await;
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }
}

impl ReasonServer {
    pub fn new(reasoner: Arc<Reasoner>) -> Self {
        Self {
            reasoner,
            tool_router: Self::tool_router(),
        }
    }

    /// Pipeline failures come back as an error report in the text, never as
    /// a protocol error.
    pub async fn handle_reason(&self, req: ReasonRequest, cancel: &CancellationToken) -> String {
        let query = Query::from(req);
        info!(
            has_context = query.context.as_deref().is_some_and(|c| !c.is_empty()),
            question_chars = query.question.chars().count(),
            "reason tool called"
        );
        self.reasoner.reason_with_cancel(&query, cancel).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect()
    }
}

#[tool_handler]
impl ServerHandler for ReasonServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info.server_info.name = "deep-reason".into();
        info.server_info.version = env!("CARGO_PKG_VERSION").into();
        info.instructions = Some(
            "Call `reason` with a question (and optional context) to obtain DeepSeek R1's reasoning trace before answering.".into(),
        );
        info
    }
}
