//! Remote collaborator contracts.
//!
//! The specialist, compliance-review and style services are external
//! black-boxes reached over HTTP. The pipeline only sees these narrow traits;
//! `greencare-infrastructure` provides the gateway-backed implementations and
//! tests substitute mocks.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::turn::AgentKind;

/// Classification of a client failure, used to decide retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientErrorKind {
    /// The call did not complete within its per-call timeout.
    Timeout,
    /// Could not reach the service at all.
    Connect,
    /// The service answered with an HTTP error status.
    Http { status: u16 },
    /// The service answered, but the body could not be interpreted.
    Malformed,
    /// The call was cancelled from our side.
    Cancelled,
}

/// An error returned by one of the remote collaborators.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Connect, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Http { status }, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Malformed, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ClientErrorKind::Cancelled, "cancelled")
    }

    /// Transient failures are worth retrying: timeouts, connection failures
    /// and server-side (5xx) statuses. Client-side statuses and malformed
    /// responses are not.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ClientErrorKind::Timeout | ClientErrorKind::Connect => true,
            ClientErrorKind::Http { status } => status >= 500,
            ClientErrorKind::Malformed | ClientErrorKind::Cancelled => false,
        }
    }
}

/// Verdict status from the compliance review service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    Approved,
    Blocked,
}

/// One compliance verdict per review submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub status: VerdictStatus,
    /// Block reason, when blocked (e.g. a reference to prescribing).
    pub reason: Option<String>,
    /// Disclaimers the review requires appended to the released text, verbatim.
    pub disclaimers: Vec<String>,
}

impl ComplianceVerdict {
    pub fn approved(disclaimers: Vec<String>) -> Self {
        Self {
            status: VerdictStatus::Approved,
            reason: None,
            disclaimers,
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Blocked,
            reason: Some(reason.into()),
            disclaimers: Vec::new(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.status == VerdictStatus::Blocked
    }
}

/// Client for the domain specialist services (health, financial).
#[async_trait]
pub trait SpecialistClient: Send + Sync {
    /// Sends one prompt to the specialist for `agent` and returns its content.
    ///
    /// `timeout` is the per-call budget; the implementation must give up with
    /// `ClientErrorKind::Timeout` once it elapses.
    async fn invoke(
        &self,
        agent: AgentKind,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, ClientError>;
}

/// Client for the legal compliance review service.
#[async_trait]
pub trait ComplianceClient: Send + Sync {
    /// Submits merged specialist content plus the original query for review.
    async fn review(
        &self,
        content: &str,
        original_query: &str,
        timeout: Duration,
    ) -> Result<ComplianceVerdict, ClientError>;
}

/// Client for the style/language normalization service.
#[async_trait]
pub trait StyleClient: Send + Sync {
    /// Rewrites approved content to the house style and appends the given
    /// disclaimers. Must not change factual claims.
    async fn normalize(
        &self,
        content: &str,
        disclaimers: &[String],
        timeout: Duration,
    ) -> Result<String, ClientError>;
}
