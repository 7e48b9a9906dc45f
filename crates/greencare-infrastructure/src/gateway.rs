//! Agent gateway client.
//!
//! Talks to the Ark-style agent gateway over HTTP: create a query targeting a
//! deployed agent, then poll until the query reaches a terminal phase. One
//! client implements all three collaborator traits; only the target agent and
//! the prompt composition differ per role.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use greencare_core::client::{
    ClientError, ClientErrorKind, ComplianceClient, ComplianceVerdict, SpecialistClient,
    StyleClient,
};
use greencare_core::config::GatewayConfig;
use greencare_core::turn::AgentKind;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

const LEGAL_REVIEW_PREAMBLE: &str = "\
You are a South African Legal Compliance Agent specializing in:
- National Health Act 61 of 2003
- Health Professions Act 56 of 1974
- Allied Health Professions Act
- Medicine and Related Substances Act
- Consumer Protection Act 68 of 2008
- HPCSA and AHPCSA guidelines
- Financial Advisory and Intermediary Services Act (FAIS)

YOUR ROLE:
Block any content that constitutes:
1. Medical diagnosis, prescription, or treatment by non-registered practitioners
2. Financial product advice by non-licensed providers
3. Any practice that violates South African professional registration requirements

Be strict. When uncertain, BLOCK the content.";

const CRITIC_PREAMBLE: &str = "\
You are the Language Critic Agent with two critical responsibilities:

1. LANGUAGE REQUIREMENTS:
   - Rewrite ALL words to Germanic root equivalents where possible
   - Use British English exclusively (organise, behaviour, centre, licence as noun)

2. CONTENT VALIDATION:
   - Critically evaluate every recommendation against the original user prompt
   - Remove any advice not explicitly requested
   - Qualify or remove exaggerations
   - Ensure tone is formal but clear, never patronising
   - Keep response focused and relevant
   - Never change factual claims and never add content absent from the input";

/// HTTP client for the agent gateway.
pub struct GatewayClient {
    client: Client,
    config: GatewayConfig,
    poll_interval: Duration,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Shortens the poll interval; test hook.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Creates one query for `agent_id` and polls it to completion.
    async fn run_query(
        &self,
        agent_id: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, ClientError> {
        let query_id = format!("chat-{}", Uuid::new_v4());
        let deadline = Instant::now() + timeout;

        let payload = CreateQuery {
            name: &query_id,
            namespace: "default",
            kind: "messages",
            input: vec![Message {
                role: "user",
                content: prompt,
            }],
            targets: vec![Target {
                name: agent_id,
                kind: "agent",
            }],
            timeout: format!("{}s", timeout.as_secs()),
            ttl: "720h0m0s".to_string(),
        };

        let create_url = format!("{}/queries/", self.config.base_url);
        let mut request = self.client.post(&create_url).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = send_bounded(request, deadline).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::http(
                status.as_u16(),
                format!("query creation failed for agent '{agent_id}'"),
            ));
        }

        debug!(agent_id, query_id, "gateway query created, polling");
        self.poll_result(&query_id, deadline).await
    }

    async fn poll_result(
        &self,
        query_id: &str,
        deadline: Instant,
    ) -> Result<String, ClientError> {
        let result_url = format!("{}/queries/{}", self.config.base_url, query_id);

        loop {
            if Instant::now() >= deadline {
                return Err(ClientError::timeout(format!(
                    "query '{query_id}' did not complete in time"
                )));
            }
            tokio::time::sleep(self.poll_interval).await;

            let mut request = self.client.get(&result_url);
            if let Some(key) = &self.config.api_key {
                request = request.bearer_auth(key);
            }

            let response = match send_bounded(request, deadline).await {
                Ok(response) => response,
                Err(err) if err.kind == ClientErrorKind::Timeout => return Err(err),
                // Transient poll failures are absorbed by the loop.
                Err(_) => continue,
            };
            if !response.status().is_success() {
                continue;
            }

            let body = read_json_bounded(response, deadline).await?;

            let phase = body
                .pointer("/status/phase")
                .and_then(Value::as_str)
                .unwrap_or("");
            match phase {
                "done" => return extract_content(&body),
                "failed" | "cancelled" => {
                    return Err(ClientError::http(
                        502,
                        format!("query '{query_id}' ended in phase '{phase}'"),
                    ));
                }
                _ => {}
            }
        }
    }
}

/// Pulls the assistant message out of a completed query.
///
/// `responses[0].raw` usually holds a JSON message array; fall back to the
/// plain `content` field when it does not parse.
fn extract_content(body: &Value) -> Result<String, ClientError> {
    let first = body
        .pointer("/status/responses/0")
        .ok_or_else(|| ClientError::malformed("completed query carries no responses"))?;

    if let Some(raw) = first.get("raw").and_then(Value::as_str) {
        if let Ok(messages) = serde_json::from_str::<Vec<Value>>(raw) {
            for message in &messages {
                if message.get("role").and_then(Value::as_str) == Some("assistant") {
                    if let Some(content) = message.get("content").and_then(Value::as_str) {
                        return Ok(content.trim().to_string());
                    }
                }
            }
        }
        return Ok(raw.trim().to_string());
    }

    first
        .get("content")
        .and_then(Value::as_str)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| ClientError::malformed("response has neither raw nor content"))
}

/// Sends one gateway request, bounded by the time left before `deadline`.
///
/// A stalled connection (server accepts, never answers) must still surface a
/// `Timeout` within the per-call budget.
async fn send_bounded(
    request: reqwest::RequestBuilder,
    deadline: Instant,
) -> Result<reqwest::Response, ClientError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match tokio::time::timeout(remaining, request.send()).await {
        Ok(result) => result.map_err(map_reqwest_error),
        Err(_) => Err(ClientError::timeout(
            "gateway request exceeded the per-call budget",
        )),
    }
}

/// Reads a JSON body with the same deadline bound as the request itself.
async fn read_json_bounded(
    response: reqwest::Response,
    deadline: Instant,
) -> Result<Value, ClientError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    match tokio::time::timeout(remaining, response.json()).await {
        Ok(result) => {
            result.map_err(|err| ClientError::malformed(format!("invalid poll body: {err}")))
        }
        Err(_) => Err(ClientError::timeout(
            "gateway response exceeded the per-call budget",
        )),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::timeout(err.to_string())
    } else if err.is_connect() {
        ClientError::connect(err.to_string())
    } else if let Some(status) = err.status() {
        ClientError::http(status.as_u16(), err.to_string())
    } else {
        ClientError::connect(err.to_string())
    }
}

/// Parses the legal agent's verdict grammar: `BLOCKED: <violation>` or
/// `APPROVED` optionally followed by required disclaimers, one per line.
pub(crate) fn parse_verdict(raw: &str) -> Result<ComplianceVerdict, ClientError> {
    let trimmed = raw.trim();

    if let Some(position) = trimmed.find("BLOCKED:") {
        let reason = trimmed[position + "BLOCKED:".len()..].trim();
        return Ok(ComplianceVerdict::blocked(if reason.is_empty() {
            "unspecified violation"
        } else {
            reason
        }));
    }

    if let Some(position) = trimmed.find("APPROVED") {
        let rest = &trimmed[position + "APPROVED".len()..];
        let disclaimers: Vec<String> = rest
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        return Ok(ComplianceVerdict::approved(disclaimers));
    }

    Err(ClientError::malformed(
        "review response contains neither APPROVED nor BLOCKED",
    ))
}

#[async_trait]
impl SpecialistClient for GatewayClient {
    async fn invoke(
        &self,
        agent: AgentKind,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, ClientError> {
        let agent_id = match agent {
            AgentKind::Health => &self.config.health_agent,
            AgentKind::Financial => &self.config.financial_agent,
        };
        self.run_query(agent_id, prompt, timeout).await
    }
}

#[async_trait]
impl ComplianceClient for GatewayClient {
    async fn review(
        &self,
        content: &str,
        original_query: &str,
        timeout: Duration,
    ) -> Result<ComplianceVerdict, ClientError> {
        let prompt = format!(
            "{LEGAL_REVIEW_PREAMBLE}\n\n\
             Review the following outputs for legal compliance:\n\n\
             USER PROMPT: {original_query}\n\n\
             CONTENT UNDER REVIEW:\n{content}\n\n\
             INSTRUCTIONS:\n\
             1. Identify any violations of South African medical or financial services law\n\
             2. If violations exist, respond with: \"BLOCKED: [specific violation]\"\n\
             3. If compliant, respond with: \"APPROVED\" followed by any required disclaimers\n\
             4. Be strict - when in doubt, block it"
        );
        let raw = self
            .run_query(&self.config.legal_agent, &prompt, timeout)
            .await?;
        parse_verdict(&raw)
    }
}

#[async_trait]
impl StyleClient for GatewayClient {
    async fn normalize(
        &self,
        content: &str,
        disclaimers: &[String],
        timeout: Duration,
    ) -> Result<String, ClientError> {
        let disclaimer_block = if disclaimers.is_empty() {
            String::new()
        } else {
            format!(
                "\n\nREQUIRED DISCLAIMERS (append each verbatim, unchanged):\n{}",
                disclaimers.join("\n")
            )
        };
        let prompt = format!(
            "{CRITIC_PREAMBLE}\n\nCONTENT TO REWRITE:\n{content}{disclaimer_block}\n\n\
             INSTRUCTIONS:\n\
             Rewrite the content following the language requirements and content validation \
             rules. Output only the final response that will be shown to the user."
        );
        self.run_query(&self.config.critic_agent, &prompt, timeout)
            .await
    }
}

#[derive(Serialize)]
struct CreateQuery<'a> {
    name: &'a str,
    namespace: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    input: Vec<Message<'a>>,
    targets: Vec<Target<'a>>,
    timeout: String,
    ttl: String,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Target<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}
