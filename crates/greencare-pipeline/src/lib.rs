//! Compliance-gated multi-agent orchestration pipeline.
//!
//! Control flow for one request:
//! query -> context builder -> specialist dispatcher (parallel fan-out) ->
//! compliance gate (bounded regeneration loop) -> style normalizer ->
//! persisted turn -> caller.

pub mod context;
pub mod dispatch;
pub mod gate;
pub mod orchestrator;
pub mod prompts;
pub mod session;
pub mod style;

pub use orchestrator::{AdvisoryRequest, AdvisoryResponse, PipelineOrchestrator};
