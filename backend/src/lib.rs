//! Verification service for zero-knowledge compliance proofs.
//!
//! The [`service::ComplianceService`] is the call surface used by collaborators; [`api`]
//! exposes it over HTTP.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod jurisdiction;
pub mod models;
pub mod nullifier;
pub mod registry;
pub mod service;
pub mod settings;
pub mod state;

pub use errors::{ApiError, EngineError};
pub use service::ComplianceService;
