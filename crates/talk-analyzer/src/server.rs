/// MCP server for talk-page policy analysis.
///
/// Exposes four tools:
/// - `analyze_discussion`: Fetch a talk-page section by URL and categorize its policy mentions
/// - `analyze_text`: Categorize policy mentions in supplied text
/// - `lookup_policy`: Resolve a shortcut or title to its dictionary entry
/// - `list_policies`: List known policies, guidelines and essays
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tracing::info;
use wiki_common::api::{
    AnalysisReport, AnalyzeDiscussionParams, AnalyzeTextParams, ListPoliciesParams,
    LookupPolicyParams, PolicyInfo, PolicyListResponse,
};

use crate::service::AnalysisService;

#[derive(Clone)]
pub struct TalkAnalyzerServer {
    service: Arc<AnalysisService>,
    tool_router: ToolRouter<TalkAnalyzerServer>,
}

impl TalkAnalyzerServer {
    pub fn new(service: Arc<AnalysisService>) -> Self {
        Self {
            service,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl TalkAnalyzerServer {
    #[tool(description = "Analyze one Wikipedia talk-page discussion. Pass the page URL with the section anchor (e.g. 'https://en.wikipedia.org/wiki/Talk:Example#Section'). Returns the policies, guidelines and essays mentioned, each with context snippets and highlight anchor ids into annotated_text. mode 'llm' uses a language model instead of the dictionary when configured.")]
    async fn analyze_discussion(
        &self,
        Parameters(params): Parameters<AnalyzeDiscussionParams>,
    ) -> Result<Json<AnalysisReport>, String> {
        let mode = params.mode.unwrap_or_default();
        info!(mode = mode.as_str(), "analyze_discussion tool invoked");
        let report = self
            .service
            .analyze_url(params.url.as_deref(), mode, params.refresh.unwrap_or(false))
            .await
            .map_err(|e| format!("analysis failed: {e}"))?;
        Ok(Json(report))
    }

    #[tool(description = "Find Wikipedia policy, guideline and essay mentions (shortcuts like WP:NPOV, [[WP:...]] links, full page names) in the given wikitext or HTML and group them by category.")]
    async fn analyze_text(
        &self,
        Parameters(params): Parameters<AnalyzeTextParams>,
    ) -> Result<Json<AnalysisReport>, String> {
        let report = self
            .service
            .analyze_text(params.text.as_deref())
            .await
            .map_err(|e| format!("analysis failed: {e}"))?;
        Ok(Json(report))
    }

    #[tool(description = "Look up a policy, guideline or essay by shortcut or title (e.g. 'WP:UNDUE', 'npov', 'Reliable sources').")]
    async fn lookup_policy(
        &self,
        Parameters(params): Parameters<LookupPolicyParams>,
    ) -> Result<Json<PolicyInfo>, String> {
        self.service
            .lookup(&params.token)
            .map(Json)
            .map_err(|e| e.to_string())
    }

    #[tool(description = "List the policies, guidelines and essays the analyzer recognizes, optionally filtered by category ('policy', 'guideline' or 'essay').")]
    async fn list_policies(
        &self,
        Parameters(params): Parameters<ListPoliciesParams>,
    ) -> Result<Json<PolicyListResponse>, String> {
        self.service
            .list(params.category.as_deref())
            .map(Json)
            .map_err(|e| e.to_string())
    }
}

#[tool_handler]
impl ServerHandler for TalkAnalyzerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "talk-analyzer".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Wikipedia talk-page policy analyzer. Use analyze_discussion with a talk-page \
                 URL and section anchor to see which policies, guidelines and essays the \
                 participants cite, analyze_text for pasted text, lookup_policy to resolve a \
                 shortcut, and list_policies to browse the dictionary."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rmcp::handler::server::wrapper::Parameters;
    use wiki_common::api::{AnalyzeTextParams, LookupPolicyParams};

    use super::TalkAnalyzerServer;
    use crate::service::testing::service;

    #[test]
    fn tools_publish_output_schemas() {
        let tools = TalkAnalyzerServer::tool_router().list_all();
        for name in [
            "analyze_discussion",
            "analyze_text",
            "lookup_policy",
            "list_policies",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }

    #[tokio::test]
    async fn tool_errors_are_strings() {
        let server = TalkAnalyzerServer::new(Arc::new(service(None)));
        let err = server
            .analyze_text(Parameters(AnalyzeTextParams { text: None }))
            .await
            .err()
            .expect("absent text is rejected");
        assert!(err.contains("text is required"));

        let err = server
            .lookup_policy(Parameters(LookupPolicyParams {
                token: "WP:NOSUCHTHING".to_string(),
            }))
            .await
            .err()
            .expect("unknown shortcut is rejected");
        assert!(err.starts_with("not found"));
    }

    #[tokio::test]
    async fn analyze_text_tool_returns_report() {
        let server = TalkAnalyzerServer::new(Arc::new(service(None)));
        let report = server
            .analyze_text(Parameters(AnalyzeTextParams {
                text: Some("Please read WP:BITE.".to_string()),
            }))
            .await
            .unwrap()
            .0;
        assert_eq!(report.guidelines[0].code, "BITE");
    }
}
