//! End-to-end pipeline orchestration.
//!
//! The orchestrator owns the strict linear state machine: persist the user
//! turn, build context, dispatch specialists, run the compliance gate loop,
//! normalize, persist the assistant turn. It is the only component that
//! touches the stores, and it serializes requests per session so a later
//! request always sees an earlier request's committed turns.

use std::sync::Arc;

use greencare_core::client::{ComplianceClient, SpecialistClient, StyleClient};
use greencare_core::config::{DisclaimerConfig, PipelineConfig};
use greencare_core::error::{GreencareError, Result};
use greencare_core::repository::{ProfileStore, TurnStore};
use greencare_core::turn::{AgentKind, ConversationTurn};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::context::ContextBuilder;
use crate::dispatch::Dispatcher;
use crate::gate::{ComplianceGate, GateOutcome};
use crate::session::SessionLocks;
use crate::style::StyleNormalizer;

/// One advisory query from a user.
#[derive(Debug, Clone)]
pub struct AdvisoryRequest {
    pub user_id: u64,
    pub session_id: String,
    pub query: String,
}

/// The completed pipeline result for one request.
#[derive(Debug, Clone)]
pub struct AdvisoryResponse {
    /// The persisted assistant turn (also returned when persistence failed;
    /// see `persistence_warning`).
    pub turn: ConversationTurn,
    /// True when the gate exhausted its regenerations and the fixed fallback
    /// disclaimer was delivered instead of specialist content.
    pub fallback_used: bool,
    /// True when the style service was unavailable and un-normalized content
    /// was delivered.
    pub style_degraded: bool,
    /// Domains that produced no content for this answer.
    pub missing_domains: Vec<AgentKind>,
    /// Set when a turn could not be persisted. The answer is still valid;
    /// the store write may be retried asynchronously.
    pub persistence_warning: Option<String>,
}

struct StageOutput {
    text: String,
    fallback_used: bool,
    style_degraded: bool,
    missing_domains: Vec<AgentKind>,
}

/// Owns the stage components and drives one request at a time per session.
pub struct PipelineOrchestrator {
    profile_store: Arc<dyn ProfileStore>,
    turn_store: Arc<dyn TurnStore>,
    context_builder: ContextBuilder,
    dispatcher: Dispatcher,
    gate: ComplianceGate,
    normalizer: StyleNormalizer,
    config: PipelineConfig,
    locks: SessionLocks,
}

impl PipelineOrchestrator {
    pub fn new(
        profile_store: Arc<dyn ProfileStore>,
        turn_store: Arc<dyn TurnStore>,
        specialists: Arc<dyn SpecialistClient>,
        compliance: Arc<dyn ComplianceClient>,
        style: Arc<dyn StyleClient>,
        config: PipelineConfig,
        disclaimers: DisclaimerConfig,
    ) -> Self {
        Self {
            profile_store,
            turn_store,
            context_builder: ContextBuilder::new(config.context_budget_bytes),
            dispatcher: Dispatcher::new(specialists, config.clone()),
            gate: ComplianceGate::new(compliance, config.clone(), disclaimers.fallback),
            normalizer: StyleNormalizer::new(style, config.clone()),
            config,
            locks: SessionLocks::new(),
        }
    }

    /// Runs the pipeline for one request with a fresh cancellation scope.
    pub async fn handle(&self, request: AdvisoryRequest) -> Result<AdvisoryResponse> {
        self.handle_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Runs the pipeline for one request.
    ///
    /// Cancelling `cancel` (caller disconnect) aborts the whole request as a
    /// unit, including in-flight specialist/review/style calls. The global
    /// request deadline has the same effect.
    #[instrument(skip(self, cancel), fields(session_id = %request.session_id, user_id = request.user_id))]
    pub async fn handle_with_cancel(
        &self,
        request: AdvisoryRequest,
        cancel: CancellationToken,
    ) -> Result<AdvisoryResponse> {
        // Serializes same-session requests; different sessions proceed in
        // parallel. Held for the whole pipeline so turn order matches
        // completion order.
        let _session_guard = self.locks.acquire(&request.session_id).await;

        let mut persistence_warnings = Vec::new();

        // Persist the user turn before any stage runs, so a turn exists even
        // if the pipeline fails terminally. A store failure here must not
        // block the answer.
        let user_turn =
            ConversationTurn::user(&request.session_id, request.user_id, &request.query);
        if let Err(err) = self.turn_store.append_turn(&user_turn).await {
            warn!(error = %err, "failed to persist user turn");
            persistence_warnings.push(format!("user turn not persisted: {err}"));
        }

        let deadline = self.config.request_deadline();
        let staged = tokio::select! {
            _ = cancel.cancelled() => Err(GreencareError::Cancelled),
            staged = tokio::time::timeout(deadline, self.run_stages(&request, &user_turn, &cancel)) => {
                match staged {
                    Ok(inner) => inner,
                    Err(_) => Err(GreencareError::DeadlineExceeded {
                        deadline_secs: self.config.request_deadline_secs,
                    }),
                }
            }
        }?;

        let assistant_turn = ConversationTurn::assistant(
            &request.session_id,
            request.user_id,
            staged.text,
        );
        if let Err(err) = self.turn_store.append_turn(&assistant_turn).await {
            // A persistence failure never suppresses a computed answer.
            warn!(error = %err, "failed to persist assistant turn");
            persistence_warnings.push(format!("assistant turn not persisted: {err}"));
        }

        info!(
            fallback = staged.fallback_used,
            degraded = staged.style_degraded,
            "pipeline completed"
        );

        Ok(AdvisoryResponse {
            turn: assistant_turn,
            fallback_used: staged.fallback_used,
            style_degraded: staged.style_degraded,
            missing_domains: staged.missing_domains,
            persistence_warning: if persistence_warnings.is_empty() {
                None
            } else {
                Some(persistence_warnings.join("; "))
            },
        })
    }

    /// Stages 1-4: context, dispatch, gate, normalize.
    async fn run_stages(
        &self,
        request: &AdvisoryRequest,
        user_turn: &ConversationTurn,
        cancel: &CancellationToken,
    ) -> Result<StageOutput> {
        let profile = self.profile_store.get_profile(request.user_id).await?;

        // The current query was just appended; ask for one extra turn and
        // drop it from the history so it only appears as the query.
        let mut history = self
            .turn_store
            .get_recent_turns(&request.session_id, self.config.history_limit + 1)
            .await?;
        if history.last() == Some(user_turn) {
            history.pop();
        }
        if history.len() > self.config.history_limit {
            let excess = history.len() - self.config.history_limit;
            history.drain(..excess);
        }

        let bundle = self
            .context_builder
            .build(&profile, &history, &request.query)?;

        let outcome = self.dispatcher.dispatch(&bundle, None, cancel).await?;

        match self.gate.run(&self.dispatcher, &bundle, outcome, cancel).await? {
            // The fallback text replaces specialist content entirely, so it
            // carries no domain coverage.
            GateOutcome::Fallback { text } => Ok(StageOutput {
                text,
                fallback_used: true,
                style_degraded: false,
                missing_domains: Vec::new(),
            }),
            GateOutcome::Approved {
                content,
                disclaimers,
                missing_domains,
            } => {
                let normalized = self.normalizer.normalize(&content, &disclaimers, cancel).await?;
                Ok(StageOutput {
                    text: normalized.text,
                    fallback_used: false,
                    style_degraded: normalized.degraded,
                    missing_domains,
                })
            }
        }
    }
}
