//! End-to-end pipeline behavior with mocked collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use greencare_core::client::{
    ClientError, ComplianceClient, ComplianceVerdict, SpecialistClient, StyleClient,
};
use greencare_core::config::{DisclaimerConfig, PipelineConfig};
use greencare_core::error::{GreencareError, Result};
use greencare_core::profile::UserProfile;
use greencare_core::repository::{ProfileStore, TurnStore};
use greencare_core::turn::{AgentKind, ConversationTurn, TurnRole};
use greencare_pipeline::{AdvisoryRequest, PipelineOrchestrator};

const FALLBACK: &str =
    "I am not permitted to provide that information or recommendation under South African law.";
const FINANCIAL_DISCLAIMER: &str =
    "This is general financial guidance, not advice under FAIS. Please consult a licensed \
     financial advisor.";

// ---------------------------------------------------------------------------
// Mock collaborators
// ---------------------------------------------------------------------------

struct FixedProfileStore;

#[async_trait]
impl ProfileStore for FixedProfileStore {
    async fn get_profile(&self, user_id: u64) -> Result<UserProfile> {
        Ok(UserProfile {
            user_id,
            ..Default::default()
        })
    }
}

#[derive(Default)]
struct MemoryTurnStore {
    turns: Mutex<HashMap<String, Vec<ConversationTurn>>>,
    fail_appends: std::sync::atomic::AtomicBool,
}

impl MemoryTurnStore {
    fn session_turns(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.turns
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TurnStore for MemoryTurnStore {
    async fn append_turn(&self, turn: &ConversationTurn) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(GreencareError::persistence("store offline"));
        }
        self.turns
            .lock()
            .unwrap()
            .entry(turn.session_id.clone())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn get_recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>> {
        let turns = self.session_turns(session_id);
        let skip = turns.len().saturating_sub(limit);
        Ok(turns[skip..].to_vec())
    }
}

/// Specialist mock: records prompts, optionally fails one or both domains.
#[derive(Default)]
struct Specialists {
    prompts: Mutex<Vec<(AgentKind, String)>>,
    fail_health: bool,
    fail_financial: bool,
}

#[async_trait]
impl SpecialistClient for Specialists {
    async fn invoke(
        &self,
        agent: AgentKind,
        prompt: &str,
        _timeout: Duration,
    ) -> std::result::Result<String, ClientError> {
        self.prompts.lock().unwrap().push((agent, prompt.to_string()));
        let fail = match agent {
            AgentKind::Health => self.fail_health,
            AgentKind::Financial => self.fail_financial,
        };
        if fail {
            return Err(ClientError::http(400, "agent rejected request"));
        }
        Ok(format!("{agent} answer"))
    }
}

/// Compliance mock: a fixed sequence of verdicts, then repeats the last.
struct Review {
    verdicts: Mutex<Vec<ComplianceVerdict>>,
    calls: AtomicUsize,
}

impl Review {
    fn approving(disclaimers: Vec<String>) -> Self {
        Self {
            verdicts: Mutex::new(vec![ComplianceVerdict::approved(disclaimers)]),
            calls: AtomicUsize::new(0),
        }
    }

    fn always_blocking() -> Self {
        Self {
            verdicts: Mutex::new(vec![ComplianceVerdict::blocked("references prescribing")]),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ComplianceClient for Review {
    async fn review(
        &self,
        _content: &str,
        _original_query: &str,
        _timeout: Duration,
    ) -> std::result::Result<ComplianceVerdict, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut verdicts = self.verdicts.lock().unwrap();
        if verdicts.len() > 1 {
            Ok(verdicts.remove(0))
        } else {
            Ok(verdicts[0].clone())
        }
    }
}

/// Style mock: wraps content, or fails when `fail` is set.
struct Style {
    fail: bool,
    calls: AtomicUsize,
}

impl Style {
    fn working() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn broken() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl StyleClient for Style {
    async fn normalize(
        &self,
        content: &str,
        disclaimers: &[String],
        _timeout: Duration,
    ) -> std::result::Result<String, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClientError::http(503, "style service down"));
        }
        let mut text = format!("normalised: {content}");
        for disclaimer in disclaimers {
            text.push_str("\n\n");
            text.push_str(disclaimer);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    orchestrator: PipelineOrchestrator,
    turn_store: Arc<MemoryTurnStore>,
    specialists: Arc<Specialists>,
    review: Arc<Review>,
    style: Arc<Style>,
}

fn harness(specialists: Specialists, review: Review, style: Style) -> Harness {
    let turn_store = Arc::new(MemoryTurnStore::default());
    let specialists = Arc::new(specialists);
    let review = Arc::new(review);
    let style = Arc::new(style);

    let config = PipelineConfig {
        backoff_base_ms: 1,
        backoff_cap_ms: 2,
        ..Default::default()
    };

    let orchestrator = PipelineOrchestrator::new(
        Arc::new(FixedProfileStore),
        turn_store.clone(),
        specialists.clone(),
        review.clone(),
        style.clone(),
        config,
        DisclaimerConfig::default(),
    );

    Harness {
        orchestrator,
        turn_store,
        specialists,
        review,
        style,
    }
}

fn request(session: &str, query: &str) -> AdvisoryRequest {
    AdvisoryRequest {
        user_id: 1,
        session_id: session.to_string(),
        query: query.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completed_request_persists_one_user_and_one_assistant_turn() {
    let h = harness(
        Specialists::default(),
        Review::approving(vec![FINANCIAL_DISCLAIMER.to_string()]),
        Style::working(),
    );

    let response = h
        .orchestrator
        .handle(request("s-1", "How can I budget for medical expenses?"))
        .await
        .unwrap();
    assert!(response.persistence_warning.is_none());

    let turns = h.turn_store.session_turns("s-1");
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, TurnRole::User);
    assert_eq!(turns[1].role, TurnRole::Assistant);
    assert!(turns[0].timestamp <= turns[1].timestamp);
    assert_eq!(turns[1].content, response.turn.content);
}

#[tokio::test]
async fn final_text_ends_with_configured_disclaimer_verbatim() {
    let h = harness(
        Specialists {
            fail_health: true,
            ..Default::default()
        },
        Review::approving(vec![FINANCIAL_DISCLAIMER.to_string()]),
        Style::working(),
    );

    let response = h
        .orchestrator
        .handle(request("s-1", "How can I budget for medical expenses?"))
        .await
        .unwrap();

    assert!(response.turn.content.ends_with(FINANCIAL_DISCLAIMER));
    assert_eq!(response.missing_domains, vec![AgentKind::Health]);
    // The released text carries a visible note about the missing domain.
    assert!(response.turn.content.contains("Health guidance is unavailable"));
}

#[tokio::test]
async fn total_dispatch_failure_skips_gate_and_style() {
    let h = harness(
        Specialists {
            fail_health: true,
            fail_financial: true,
            ..Default::default()
        },
        Review::approving(Vec::new()),
        Style::working(),
    );

    let err = h
        .orchestrator
        .handle(request("s-1", "anything"))
        .await
        .unwrap_err();

    assert!(matches!(err, GreencareError::DispatchFailed { .. }));
    assert_eq!(h.review.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.style.calls.load(Ordering::SeqCst), 0);

    // The user turn is still on record for partial-failure visibility.
    let turns = h.turn_store.session_turns("s-1");
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, TurnRole::User);
}

#[tokio::test]
async fn persistent_block_delivers_exact_fallback_and_never_specialist_text() {
    let h = harness(Specialists::default(), Review::always_blocking(), Style::working());

    let response = h
        .orchestrator
        .handle(request("s-1", "Take metformin for my diabetes?"))
        .await
        .unwrap();

    assert!(response.fallback_used);
    assert_eq!(response.turn.content, FALLBACK);
    // K=1: original submission plus one regeneration.
    assert_eq!(h.review.calls.load(Ordering::SeqCst), 2);
    // Fallback text is final: the style service is never consulted.
    assert_eq!(h.style.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn style_outage_degrades_but_delivers() {
    let h = harness(
        Specialists::default(),
        Review::approving(vec![FINANCIAL_DISCLAIMER.to_string()]),
        Style::broken(),
    );

    let response = h
        .orchestrator
        .handle(request("s-1", "How can I budget?"))
        .await
        .unwrap();

    assert!(response.style_degraded);
    assert!(!response.fallback_used);
    // Un-normalized approved content plus the raw disclaimer.
    assert!(response.turn.content.contains("Financial answer"));
    assert!(response.turn.content.ends_with(FINANCIAL_DISCLAIMER));
}

#[tokio::test]
async fn assistant_persistence_failure_still_returns_answer() {
    let h = harness(
        Specialists::default(),
        Review::approving(Vec::new()),
        Style::working(),
    );

    h.turn_store.fail_appends.store(true, Ordering::SeqCst);
    let response = h.orchestrator.handle(request("s-1", "budget?")).await.unwrap();

    assert!(response.persistence_warning.is_some());
    assert!(response.turn.content.contains("answer"));
}

#[tokio::test]
async fn both_persistence_failures_are_reported_together() {
    let h = harness(
        Specialists::default(),
        Review::approving(Vec::new()),
        Style::working(),
    );

    h.turn_store.fail_appends.store(true, Ordering::SeqCst);
    let response = h.orchestrator.handle(request("s-1", "budget?")).await.unwrap();

    // Both appends failed; neither warning may shadow the other.
    let warning = response.persistence_warning.unwrap();
    assert!(warning.contains("user turn not persisted"));
    assert!(warning.contains("assistant turn not persisted"));
}

#[tokio::test]
async fn second_request_sees_first_requests_turns() {
    let h = harness(
        Specialists::default(),
        Review::approving(Vec::new()),
        Style::working(),
    );

    h.orchestrator
        .handle(request("s-1", "first question"))
        .await
        .unwrap();
    h.orchestrator
        .handle(request("s-1", "second question"))
        .await
        .unwrap();

    let prompts = h.specialists.prompts.lock().unwrap();
    let second_request_prompt = &prompts.last().unwrap().1;
    // History carries both turns of the first exchange.
    assert!(second_request_prompt.contains("User: first question"));
    assert!(second_request_prompt.contains("Assistant:"));
    // The current query appears as the query, not duplicated into history.
    assert_eq!(second_request_prompt.matches("second question").count(), 1);
}

#[tokio::test]
async fn same_session_concurrent_requests_serialize_in_order() {
    let h = harness(
        Specialists::default(),
        Review::approving(Vec::new()),
        Style::working(),
    );
    let orchestrator = Arc::new(h.orchestrator);

    let a = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle(request("s-1", "query a")).await })
    };
    let b = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle(request("s-1", "query b")).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let turns = h.turn_store.session_turns("s-1");
    assert_eq!(turns.len(), 4);
    // Strict chronological append order, alternating user/assistant.
    for pair in turns.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
    assert_eq!(turns[0].role, TurnRole::User);
    assert_eq!(turns[1].role, TurnRole::Assistant);
    assert_eq!(turns[2].role, TurnRole::User);
    assert_eq!(turns[3].role, TurnRole::Assistant);
}

#[tokio::test]
async fn different_sessions_complete_independently() {
    let h = harness(
        Specialists::default(),
        Review::approving(Vec::new()),
        Style::working(),
    );
    let orchestrator = Arc::new(h.orchestrator);

    let a = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle(request("s-a", "query a")).await })
    };
    let b = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle(request("s-b", "query b")).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(h.turn_store.session_turns("s-a").len(), 2);
    assert_eq!(h.turn_store.session_turns("s-b").len(), 2);
}
