//! Pipeline configuration.
//!
//! Loaded from `~/.config/greencare/config.toml` by the infrastructure crate.
//! Every field has a default so a missing or partial file still yields a
//! usable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Agent gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the agent gateway (e.g. `http://localhost:8080/v1`).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Deployed agent IDs per role.
    #[serde(default = "default_health_agent")]
    pub health_agent: String,
    #[serde(default = "default_financial_agent")]
    pub financial_agent: String,
    #[serde(default = "default_legal_agent")]
    pub legal_agent: String,
    #[serde(default = "default_critic_agent")]
    pub critic_agent: String,
}

fn default_base_url() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_health_agent() -> String {
    "health-companion-agent".to_string()
}

fn default_financial_agent() -> String {
    "financial-coach-agent".to_string()
}

fn default_legal_agent() -> String {
    "legal-compliance-agent".to_string()
}

fn default_critic_agent() -> String {
    "language-critic-agent".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            health_agent: default_health_agent(),
            financial_agent: default_financial_agent(),
            legal_agent: default_legal_agent(),
            critic_agent: default_critic_agent(),
        }
    }
}

/// Tuning knobs for the pipeline state machine.
///
/// The retry/backoff and regeneration bounds are deliberate policy choices,
/// not service requirements, so all of them are configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on the rendered context, in bytes.
    #[serde(default = "default_context_budget_bytes")]
    pub context_budget_bytes: usize,
    /// How many recent turns to load per request.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Per-call timeout for a specialist invocation, in seconds.
    #[serde(default = "default_specialist_timeout_secs")]
    pub specialist_timeout_secs: u64,
    /// Per-call timeout for a compliance review, in seconds.
    #[serde(default = "default_review_timeout_secs")]
    pub review_timeout_secs: u64,
    /// Per-call timeout for a style pass, in seconds.
    #[serde(default = "default_style_timeout_secs")]
    pub style_timeout_secs: u64,
    /// Whole-request deadline, in seconds.
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,
    /// Extra attempts after the first failed specialist call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Cap on a single backoff delay, in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    /// How many regenerations the compliance gate may attempt after a block.
    #[serde(default = "default_max_regenerations")]
    pub max_regenerations: u32,
}

fn default_context_budget_bytes() -> usize {
    16 * 1024
}

fn default_history_limit() -> usize {
    10
}

fn default_specialist_timeout_secs() -> u64 {
    300
}

fn default_review_timeout_secs() -> u64 {
    120
}

fn default_style_timeout_secs() -> u64 {
    120
}

fn default_request_deadline_secs() -> u64 {
    720
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_cap_ms() -> u64 {
    8000
}

fn default_max_regenerations() -> u32 {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_budget_bytes: default_context_budget_bytes(),
            history_limit: default_history_limit(),
            specialist_timeout_secs: default_specialist_timeout_secs(),
            review_timeout_secs: default_review_timeout_secs(),
            style_timeout_secs: default_style_timeout_secs(),
            request_deadline_secs: default_request_deadline_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            max_regenerations: default_max_regenerations(),
        }
    }
}

impl PipelineConfig {
    pub fn specialist_timeout(&self) -> Duration {
        Duration::from_secs(self.specialist_timeout_secs)
    }

    pub fn review_timeout(&self) -> Duration {
        Duration::from_secs(self.review_timeout_secs)
    }

    pub fn style_timeout(&self) -> Duration {
        Duration::from_secs(self.style_timeout_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}

/// Fixed, pre-approved disclaimer texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisclaimerConfig {
    /// Delivered verbatim when the compliance gate exhausts its regeneration
    /// budget. Never specialist-authored.
    #[serde(default = "default_fallback_disclaimer")]
    pub fallback: String,
}

fn default_fallback_disclaimer() -> String {
    "I am not permitted to provide that information or recommendation under South African law."
        .to_string()
}

impl Default for DisclaimerConfig {
    fn default() -> Self {
        Self {
            fallback: default_fallback_disclaimer(),
        }
    }
}

/// Root configuration for the GreenCare pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GreencareConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub disclaimers: DisclaimerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: GreencareConfig = toml::from_str("").unwrap();
        assert_eq!(config.pipeline.history_limit, 10);
        assert_eq!(config.pipeline.max_regenerations, 1);
        assert_eq!(config.pipeline.specialist_timeout_secs, 300);
        assert!(config.disclaimers.fallback.contains("South African law"));
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config: GreencareConfig = toml::from_str(
            r#"
            [pipeline]
            history_limit = 4
            max_retries = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.history_limit, 4);
        assert_eq!(config.pipeline.max_retries, 0);
        assert_eq!(config.pipeline.backoff_base_ms, 1000);
    }
}
