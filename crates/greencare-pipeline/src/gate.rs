//! Compliance gate.
//!
//! The single authority allowed to approve content for release. Merged
//! specialist output is submitted for legal review; a Blocked verdict drives
//! a bounded regeneration loop (re-dispatch with a constraint hint derived
//! from the block reason, then resubmit). When the loop is exhausted the gate
//! terminates the content path and substitutes the fixed pre-approved
//! fallback disclaimer. Fail-closed: ambiguous or risky content is never
//! delivered, and a review-service failure counts as a block for that
//! attempt.

use std::sync::Arc;

use greencare_core::client::{ClientErrorKind, ComplianceClient, VerdictStatus};
use greencare_core::config::PipelineConfig;
use greencare_core::error::{GreencareError, Result};
use greencare_core::turn::AgentKind;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::ContextBundle;
use crate::dispatch::{DispatchOutcome, Dispatcher};

/// Gate states, logged as the loop progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Submitted,
    Approved,
    Blocked,
    Regenerating,
    FallbackDisclaimerOnly,
}

/// Terminal result of the gate loop.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    /// Content the review approved for release, with required disclaimers
    /// and the domains the approved draft did not cover.
    Approved {
        content: String,
        disclaimers: Vec<String>,
        missing_domains: Vec<AgentKind>,
    },
    /// The fixed pre-approved fallback text. Already final; must not be
    /// normalized or otherwise touched downstream.
    Fallback { text: String },
}

pub struct ComplianceGate {
    client: Arc<dyn ComplianceClient>,
    config: PipelineConfig,
    fallback_text: String,
}

impl ComplianceGate {
    pub fn new(
        client: Arc<dyn ComplianceClient>,
        config: PipelineConfig,
        fallback_text: impl Into<String>,
    ) -> Self {
        Self {
            client,
            config,
            fallback_text: fallback_text.into(),
        }
    }

    /// Runs the review loop for one request.
    ///
    /// Always terminates in either approved content or the fallback text;
    /// the only error path out is cancellation. A dispatch failure during
    /// regeneration resolves to the fallback, not to an error.
    pub async fn run(
        &self,
        dispatcher: &Dispatcher,
        bundle: &ContextBundle,
        initial: DispatchOutcome,
        cancel: &CancellationToken,
    ) -> Result<GateOutcome> {
        let mut outcome = initial;
        let max_regenerations = self.config.max_regenerations;

        for attempt in 0..=max_regenerations {
            // Coverage of the draft under review; regeneration may change it.
            let missing_domains = outcome.missing_domains();
            let merged = outcome.merged_content();
            info!(attempt, state = ?GateState::Submitted, "submitting content for compliance review");

            let verdict = tokio::select! {
                _ = cancel.cancelled() => return Err(GreencareError::Cancelled),
                result = self.client.review(&merged, bundle.query(), self.config.review_timeout()) => result,
            };

            let reason = match verdict {
                Ok(v) if v.status == VerdictStatus::Approved => {
                    info!(attempt, state = ?GateState::Approved, "compliance review approved content");
                    return Ok(GateOutcome::Approved {
                        content: merged,
                        disclaimers: v.disclaimers,
                        missing_domains,
                    });
                }
                Ok(v) => {
                    let reason = v
                        .reason
                        .unwrap_or_else(|| "blocked without stated reason".to_string());
                    info!(attempt, state = ?GateState::Blocked, %reason, "compliance review blocked content");
                    reason
                }
                Err(err) if err.kind == ClientErrorKind::Cancelled => {
                    return Err(GreencareError::Cancelled);
                }
                Err(err) => {
                    // Review unavailable: never release unreviewed content.
                    warn!(attempt, error = %err, "compliance review unavailable, treating as blocked");
                    "compliance review unavailable".to_string()
                }
            };

            if attempt == max_regenerations {
                break;
            }

            info!(attempt, state = ?GateState::Regenerating, "regenerating with compliance constraint");
            match dispatcher.dispatch(bundle, Some(&reason), cancel).await {
                Ok(regenerated) => outcome = regenerated,
                Err(GreencareError::Cancelled) => return Err(GreencareError::Cancelled),
                Err(err) => {
                    // Regeneration could not produce anything reviewable.
                    warn!(error = %err, "regeneration dispatch failed, falling back");
                    break;
                }
            }
        }

        info!(state = ?GateState::FallbackDisclaimerOnly, "gate exhausted, delivering fallback disclaimer");
        Ok(GateOutcome::Fallback {
            text: self.fallback_text.clone(),
        })
    }
}
