//! Claude-backed assessor.
//!
//! Sends one Messages API request per dimension and expects the reply to
//! contain a single JSON object shaped like [`AssessorOutput`].
//!
//! ```ignore
//! use verity_core::assessor::{ClaudeAssessor, ClaudeConfig};
//!
//! let assessor = ClaudeAssessor::new(ClaudeConfig::from_env())?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Assessor, AssessorOutput, REFERENCE_KNOWLEDGE_KEY};
use crate::error::{Result, VerityError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;

const SYSTEM_PROMPT: &str = "You are a VerityAI compliance assessor. You evaluate AI systems \
against one compliance dimension at a time and answer only with the requested JSON object.";

/// Connection settings for the Messages API.
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    /// API key; when absent every assessment reports the assessor unavailable.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        ClaudeConfig {
            api_key: std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            base_url: std::env::var("VERITY_CLAUDE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("VERITY_CLAUDE_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClaudeConfig {
    /// Read settings from `ANTHROPIC_API_KEY`, `VERITY_CLAUDE_BASE_URL`
    /// and `VERITY_CLAUDE_MODEL`.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config with an explicit key and default endpoint settings.
    pub fn new(api_key: &str) -> Self {
        ClaudeConfig {
            api_key: Some(api_key.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn without_api_key(mut self) -> Self {
        self.api_key = None;
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Assessor backed by the Anthropic Messages API.
pub struct ClaudeAssessor {
    config: ClaudeConfig,
    client: reqwest::Client,
}

impl ClaudeAssessor {
    pub fn new(config: ClaudeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("verity-core/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| VerityError::AssessorUnavailable(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClaudeConfig::from_env())
    }

    pub fn config(&self) -> &ClaudeConfig {
        &self.config
    }
}

#[async_trait]
impl Assessor for ClaudeAssessor {
    fn name(&self) -> &str {
        "claude"
    }

    async fn assess(&self, dimension: &str, evidence: &Value) -> Result<AssessorOutput> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            VerityError::AssessorUnavailable("ANTHROPIC_API_KEY is not set".to_string())
        })?;

        let prompt = build_prompt(dimension, evidence);
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![RequestMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let url = format!("{}/v1/messages", self.config.base_url);
        debug!(dimension = %dimension, model = %self.config.model, "requesting assessment");
        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| VerityError::AssessorUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerityError::AssessorUnavailable(format!(
                "Messages API returned status {status}"
            )));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| VerityError::AssessorUnavailable(format!("unreadable response: {e}")))?;

        let text: String = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        parse_reply(&text)
    }
}

/// Title-case a snake_case dimension name: `human_value` → `Human Value`.
fn dimension_title(dimension: &str) -> String {
    dimension
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the assessment prompt for one dimension.
///
/// `evidence.documentation` (when a string) and the agent's reference
/// knowledge get their own sections; the rest of the evidence document is
/// attached as JSON.
pub fn build_prompt(dimension: &str, evidence: &Value) -> String {
    let mut lines = vec![
        format!("# {} Assessment", dimension_title(dimension)),
        String::new(),
        "## Assessment Task".to_string(),
        format!("You are conducting a VerityAI {dimension} assessment of an AI system."),
        "Please analyze the provided evidence and generate a detailed assessment report."
            .to_string(),
        String::new(),
        "## Evidence".to_string(),
    ];

    if let Some(doc) = evidence.get("documentation").and_then(Value::as_str) {
        lines.push("### System Documentation".to_string());
        lines.push(String::new());
        lines.push(doc.to_string());
        lines.push(String::new());
    }

    if let Some(knowledge) = evidence
        .get(REFERENCE_KNOWLEDGE_KEY)
        .and_then(Value::as_object)
        .filter(|k| !k.is_empty())
    {
        lines.push("### Reference Knowledge".to_string());
        lines.push(String::new());
        lines.push("```json".to_string());
        lines.push(
            serde_json::to_string_pretty(knowledge)
                .unwrap_or_else(|_| Value::Object(knowledge.clone()).to_string()),
        );
        lines.push("```".to_string());
        lines.push(String::new());
    }

    let mut rest = evidence.clone();
    if let Some(obj) = rest.as_object_mut() {
        obj.remove("documentation");
        obj.remove(REFERENCE_KNOWLEDGE_KEY);
    }
    let has_rest = match &rest {
        Value::Object(obj) => !obj.is_empty(),
        Value::Null => false,
        _ => true,
    };
    if has_rest {
        lines.push("### Additional Evidence".to_string());
        lines.push(String::new());
        lines.push("```json".to_string());
        lines.push(serde_json::to_string_pretty(&rest).unwrap_or_else(|_| rest.to_string()));
        lines.push("```".to_string());
        lines.push(String::new());
    }

    lines.push("## Response Format".to_string());
    lines.push(
        "Respond with one JSON object with the keys `findings`, `risks`, `recommendations`, \
`compliance_score` and `compliance_score_justification`."
            .to_string(),
    );
    lines.push(
        "Findings have `title`, `description`, `evidence`. Risks have `title`, `description`, \
`severity` (low|medium|high|critical), `impact`. Recommendations have `title`, `description`, \
`implementation`, `priority` (low|medium|high)."
            .to_string(),
    );
    lines.push(format!(
        "`compliance_score` is a number from 0.0 to 5.0 rating {dimension} compliance."
    ));

    lines.join("\n")
}

/// Extract and decode the JSON object embedded in a reply.
pub fn parse_reply(text: &str) -> Result<AssessorOutput> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(VerityError::AssessorUnavailable(
                "reply contained no JSON object".to_string(),
            ))
        }
    };

    let mut output: AssessorOutput = serde_json::from_str(json)
        .map_err(|e| VerityError::AssessorUnavailable(format!("unparseable reply: {e}")))?;
    output.placeholder = false;
    Ok(output)
}
