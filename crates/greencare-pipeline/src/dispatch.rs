//! Parallel specialist dispatch with per-call retry.
//!
//! Both specialist calls are issued concurrently and joined before the
//! pipeline proceeds. Each call has its own timeout and retry budget:
//! transient failures (timeout/connect/5xx) are retried with exponential
//! backoff, non-retryable failures (4xx/malformed) are not. A request only
//! fails here when *both* domains fail after retries.

use std::sync::Arc;
use std::time::Duration;

use greencare_core::client::{ClientError, SpecialistClient};
use greencare_core::config::PipelineConfig;
use greencare_core::error::{GreencareError, Result};
use greencare_core::turn::AgentKind;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::context::ContextBundle;
use crate::prompts::specialist_prompt;

/// Outcome of one specialist call, after retries.
#[derive(Debug, Clone)]
pub struct SpecialistResult {
    pub agent: AgentKind,
    pub outcome: std::result::Result<String, ClientError>,
}

impl SpecialistResult {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Joined results of the parallel fan-out.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub health: SpecialistResult,
    pub financial: SpecialistResult,
}

impl DispatchOutcome {
    /// Domains that produced no content this request.
    pub fn missing_domains(&self) -> Vec<AgentKind> {
        [&self.health, &self.financial]
            .into_iter()
            .filter(|r| !r.succeeded())
            .map(|r| r.agent)
            .collect()
    }

    /// Merges surviving specialist content into one labeled document for
    /// compliance review. When a domain is missing, a visible note is
    /// embedded so the released text never silently claims coverage it lacks.
    pub fn merged_content(&self) -> String {
        let mut sections = Vec::new();
        for result in [&self.health, &self.financial] {
            match &result.outcome {
                Ok(content) => {
                    sections.push(format!("{} guidance:\n{}", result.agent, content));
                }
                Err(_) => {
                    sections.push(format!(
                        "[{} guidance is unavailable for this answer; that domain was not covered.]",
                        result.agent
                    ));
                }
            }
        }
        sections.join("\n\n")
    }
}

/// Issues the parallel specialist calls for one request.
pub struct Dispatcher {
    client: Arc<dyn SpecialistClient>,
    config: PipelineConfig,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn SpecialistClient>, config: PipelineConfig) -> Self {
        Self { client, config }
    }

    /// Fans out to both specialists and joins the results.
    ///
    /// # Errors
    ///
    /// `GreencareError::DispatchFailed` when both domains fail after their
    /// retry budgets; `GreencareError::Cancelled` when the request token is
    /// cancelled mid-flight.
    pub async fn dispatch(
        &self,
        bundle: &ContextBundle,
        constraint_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome> {
        let document = bundle.render();
        let health_prompt = specialist_prompt(AgentKind::Health, &document, constraint_hint);
        let financial_prompt = specialist_prompt(AgentKind::Financial, &document, constraint_hint);

        let (health, financial) = tokio::join!(
            self.call_with_retry(AgentKind::Health, &health_prompt, cancel),
            self.call_with_retry(AgentKind::Financial, &financial_prompt, cancel),
        );

        if cancel.is_cancelled() {
            return Err(GreencareError::Cancelled);
        }

        let outcome = DispatchOutcome {
            health: SpecialistResult {
                agent: AgentKind::Health,
                outcome: health,
            },
            financial: SpecialistResult {
                agent: AgentKind::Financial,
                outcome: financial,
            },
        };

        match (&outcome.health.outcome, &outcome.financial.outcome) {
            (Err(h), Err(f)) => Err(GreencareError::DispatchFailed {
                health: h.to_string(),
                financial: f.to_string(),
            }),
            _ => Ok(outcome),
        }
    }

    /// One specialist call with its retry budget.
    ///
    /// Attempt delays follow `base * 2^attempt` capped at the configured
    /// maximum, with up to 10% jitter to avoid lockstep retries.
    async fn call_with_retry(
        &self,
        agent: AgentKind,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ClientError> {
        let timeout = self.config.specialist_timeout();
        let mut attempt: u32 = 0;

        loop {
            let call = self.client.invoke(agent, prompt, timeout);
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(ClientError::cancelled()),
                result = call => result,
            };

            match result {
                Ok(content) => {
                    debug!(agent = %agent, attempt, "specialist call succeeded");
                    return Ok(content);
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        agent = %agent,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient specialist failure, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ClientError::cancelled()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => {
                    warn!(agent = %agent, attempt, error = %err, "specialist call failed");
                    return Err(err);
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base();
        let cap = self.config.backoff_cap();
        let exp = base.saturating_mul(2u32.saturating_pow(attempt)).min(cap);
        let jitter = rand::thread_rng().gen_range(0..=exp.as_millis() as u64 / 10);
        exp + Duration::from_millis(jitter)
    }
}
