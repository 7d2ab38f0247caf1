//! Fix advisor: asks a language model for a corrective shell command.
//!
//! The [`FixAdvisor`] trait is the only seam the self-healing loop depends on.
//! [`OpenAiAdvisor`] talks to an OpenAI-compatible chat completions API and
//! forces a `suggest_fix` function call so the reply is structured JSON.
//! Every failure mode maps to [`FixSuggestion::unavailable`]; the advisor
//! itself never retries.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Draft;
use minijinja::{Environment, context};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::config::AdvisorConfig;
use crate::core::types::FixSuggestion;

const SUGGEST_FIX_SCHEMA: &str = include_str!("../../schemas/suggest_fix.schema.json");
const FIX_REQUEST_TEMPLATE: &str = include_str!("prompts/fix_request.md");
const SYSTEM_PROMPT: &str = "You are a terminal assistant that always suggests shell command fixes.";
const TOOL_NAME: &str = "suggest_fix";
const TOOL_DESCRIPTION: &str = "Suggest a terminal command to fix a given error";

/// Source of corrective commands for failed shell commands.
///
/// Implementations block until they have an answer and must not change
/// system state.
pub trait FixAdvisor {
    fn suggest_fix(&self, command: &str, error_text: &str, meta: Option<&str>) -> FixSuggestion;
}

/// Structured `suggest_fix` arguments returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FixResponse {
    pub fix: String,
    pub explanation: String,
}

/// Advisor backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiAdvisor {
    client: Client,
    config: AdvisorConfig,
    api_key: Option<String>,
    schema: Value,
}

impl OpenAiAdvisor {
    /// `api_key` is used as given; callers decide where it comes from.
    pub fn new(config: AdvisorConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build advisor http client")?;
        let schema = serde_json::from_str(SUGGEST_FIX_SCHEMA).context("parse suggest_fix schema")?;
        Ok(Self {
            client,
            config,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            schema,
        })
    }

    fn request_fix(&self, api_key: &str, prompt: String) -> Result<FixResponse> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            tools: vec![ChatTool {
                kind: "function",
                function: FunctionDefinition {
                    name: TOOL_NAME,
                    description: TOOL_DESCRIPTION,
                    parameters: &self.schema,
                },
            }],
            tool_choice: json!({ "type": "function", "function": { "name": TOOL_NAME } }),
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(url = %url, "requesting fix suggestion");
        let body = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .context("contact advisor")?
            .error_for_status()
            .context("advisor rejected request")?
            .text()
            .context("read advisor response")?;

        parse_fix_response(&body, &self.schema)
    }
}

impl FixAdvisor for OpenAiAdvisor {
    #[instrument(skip_all, fields(model = %self.config.model))]
    fn suggest_fix(&self, command: &str, error_text: &str, meta: Option<&str>) -> FixSuggestion {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(env = %self.config.api_key_env, "advisor credential missing");
            return FixSuggestion::unavailable(format!("Missing {}", self.config.api_key_env));
        };

        let prompt = match render_fix_request(command, error_text, std::env::consts::OS, meta) {
            Ok(prompt) => prompt,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "failed to render fix request");
                return FixSuggestion::unavailable(format!("Failed to build fix request: {err:#}"));
            }
        };

        match self.request_fix(api_key, prompt) {
            Ok(response) => {
                info!(fix = %response.fix, "advisor suggested fix");
                FixSuggestion::new(response.fix, response.explanation)
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "advisor unavailable");
                FixSuggestion::unavailable(format!("Failed to get a fix: {err:#}"))
            }
        }
    }
}

/// Render the user message describing a failed command.
pub fn render_fix_request(
    command: &str,
    error_text: &str,
    os: &str,
    meta: Option<&str>,
) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("fix_request", FIX_REQUEST_TEMPLATE)
        .context("load fix request template")?;
    let template = env.get_template("fix_request")?;
    let rendered = template.render(context! {
        command => command,
        error => error_text.trim(),
        os => os,
        meta => meta.map(str::trim).filter(|m| !m.is_empty()),
    })?;
    Ok(rendered)
}

/// Extract and validate the `suggest_fix` arguments from a chat completion body.
pub fn parse_fix_response(body: &str, schema: &Value) -> Result<FixResponse> {
    let response: ChatResponse = serde_json::from_str(body).context("parse advisor response")?;
    let call = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.tool_calls.unwrap_or_default().into_iter().next())
        .ok_or_else(|| anyhow!("advisor response has no tool call"))?;
    if call.function.name != TOOL_NAME {
        bail!("advisor called unexpected tool {}", call.function.name);
    }
    let arguments: Value =
        serde_json::from_str(&call.function.arguments).context("parse suggest_fix arguments")?;
    validate_arguments(&arguments, schema)?;
    serde_json::from_value(arguments).context("decode suggest_fix arguments")
}

/// Validate tool arguments against the bundled JSON Schema (Draft 2020-12).
fn validate_arguments(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile suggest_fix schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("suggest_fix arguments invalid:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    tools: Vec<ChatTool<'a>>,
    tool_choice: Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionDefinition<'a>,
}

#[derive(Debug, Serialize)]
struct FunctionDefinition<'a> {
    name: &'static str,
    description: &'static str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}
