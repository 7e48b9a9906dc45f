//! Core domain types and collaborator contracts for the GreenCare advisory
//! pipeline.
//!
//! This crate holds no I/O: profiles, turns, verdicts, the shared error type,
//! configuration, and the traits implemented by the infrastructure crate
//! (gateway clients and stores).

pub mod client;
pub mod config;
pub mod error;
pub mod profile;
pub mod repository;
pub mod turn;

// Re-export common error type
pub use error::{GreencareError, Result};
