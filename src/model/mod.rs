//! Domain model shared across the service, store, and client layers.

/// Match aggregate: teams, players, events, and lifecycle flags.
pub mod match_state;
/// Immutable quiz item definitions and validation.
pub mod question;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub use match_state::{Match, MatchEvent, MatchPhase, Player, PlayerAnswer, Team, TeamSide, Winner};
pub use question::{AnswerLetter, Question};

/// Stable caller identity supplied by the host application's auth layer.
///
/// The engine never resolves identities itself; every service call receives
/// one explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable unique identifier for the session owner.
    pub id: String,
    /// Name shown to other participants.
    pub display_name: String,
    /// Optional avatar image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Convenience constructor for an identity without an avatar.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
        }
    }
}

/// Current wall-clock time as milliseconds since the unix epoch.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Render a unix-millisecond timestamp as an RFC 3339 string for event text.
pub(crate) fn format_unix_millis(at_ms: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(at_ms) * 1_000_000)
        .ok()
        .and_then(|timestamp| timestamp.format(&Rfc3339).ok())
        .unwrap_or_else(|| "invalid-timestamp".into())
}
