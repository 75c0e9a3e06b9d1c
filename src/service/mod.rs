//! Orchestration layer: the only component allowed to mutate match state.

/// Event-log line builders.
pub mod events;
/// Match lifecycle operations and scoring.
pub mod match_service;

pub use match_service::MatchService;
