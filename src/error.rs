use thiserror::Error;

use crate::store::error::StorageError;

/// Errors surfaced by the match service and client controller.
///
/// Only the lobby operations (create/join/start) propagate these to callers.
/// The in-game paths (`submit_answer`, `force_player_next_question`, timer
/// ticks) log and swallow failures instead, because they are usually driven
/// by an automatic timer rather than a user action.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No match exists under the given code.
    #[error("match `{0}` not found")]
    NotFound(String),
    /// The match is protected by a PIN and the provided one does not match.
    #[error("invalid pin for match `{0}`")]
    InvalidPin(String),
    /// No authenticated session, or the caller is not allowed to perform the
    /// operation (e.g. a non-host trying to start the game).
    #[error("caller is not authorized: {0}")]
    AuthRequired(String),
    /// The game already left the lobby; starting or joining is no longer possible.
    #[error("match `{0}` already started")]
    AlreadyStarted(String),
    /// Start was attempted while the teams are not balanced.
    #[error("teams are not balanced: {0}")]
    NotBalanced(String),
    /// Question data is missing or corrupt for the requested index.
    #[error("invalid question state: {0}")]
    InvalidQuestionState(String),
    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The shared store is unreachable or rejected the operation.
    #[error("store transport failure")]
    Transport(#[source] StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Transport(err)
    }
}
