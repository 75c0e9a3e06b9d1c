use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Identity, format_unix_millis};

/// Append-only record of one submitted (or timed-out) answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAnswer {
    /// Index of the question this answer belongs to.
    pub question_index: u32,
    /// Whether the submitted letter matched the correct option.
    pub correct: bool,
    /// Seconds left on the countdown when the answer landed (0 for timeouts).
    pub time_left_when_answered: u32,
    /// Submission timestamp in unix milliseconds.
    pub at_ms: u64,
}

/// One participant's individual progress through the shared question sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Stable identifier from the identity provider.
    pub id: String,
    /// Name shown to other participants.
    pub display_name: String,
    /// Optional avatar image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Join timestamp; recovers roster order after map round-trips.
    pub joined_at_ms: u64,
    /// Index of the question the player is currently on, in `[0, N]`.
    pub question_index: u32,
    /// Seconds remaining on the current question's countdown.
    pub time_left_secs: u32,
    /// One answer per question already passed.
    #[serde(default)]
    pub answers: Vec<PlayerAnswer>,
    /// Accumulated score.
    pub score: i32,
    /// True exactly when `question_index` reached the match's question count.
    pub finished: bool,
    /// Timestamp of the finishing advance, when finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
}

impl Player {
    /// Seed a freshly-joined player: first question, full countdown, no score.
    pub fn seeded(identity: &Identity, joined_at_ms: u64, time_budget_secs: u32) -> Self {
        Self {
            id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            avatar_url: identity.avatar_url.clone(),
            joined_at_ms,
            question_index: 0,
            time_left_secs: time_budget_secs,
            answers: Vec::new(),
            score: 0,
            finished: false,
            finished_at_ms: None,
        }
    }

    /// Wipe progress back to the seeded state, keeping identity and roster slot.
    /// Used at game start to defend against stale state from an aborted attempt.
    pub fn reset(&mut self, time_budget_secs: u32) {
        self.question_index = 0;
        self.time_left_secs = time_budget_secs;
        self.answers.clear();
        self.score = 0;
        self.finished = false;
        self.finished_at_ms = None;
    }

    /// Whether an answer has already been recorded for the given index.
    pub fn has_answered(&self, question_index: u32) -> bool {
        self.answers
            .iter()
            .any(|answer| answer.question_index == question_index)
    }
}

/// The two sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamSide {
    /// Team A, the host's side.
    A,
    /// Team B.
    B,
}

impl TeamSide {
    /// Document field the side's subtree lives under.
    pub fn field(&self) -> &'static str {
        match self {
            TeamSide::A => "team_a",
            TeamSide::B => "team_b",
        }
    }

    /// The opposing side.
    pub fn other(&self) -> TeamSide {
        match self {
            TeamSide::A => TeamSide::B,
            TeamSide::B => TeamSide::A,
        }
    }
}

impl fmt::Display for TeamSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamSide::A => f.write_str("A"),
            TeamSide::B => f.write_str("B"),
        }
    }
}

/// One side of a match. Players are keyed by id so concurrent per-player
/// writes land on disjoint store paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Display name chosen at match creation.
    pub name: String,
    /// Roster keyed by player id.
    #[serde(default)]
    pub players: IndexMap<String, Player>,
}

impl Team {
    /// Create an empty team with the given display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            players: IndexMap::new(),
        }
    }

    /// Sum of the players' scores.
    pub fn total_score(&self) -> i32 {
        self.players.values().map(|player| player.score).sum()
    }

    /// True when the team has players and every one of them has finished.
    pub fn all_finished(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|player| player.finished)
    }

    /// Roster in join order. Map order is not trusted because the store may
    /// re-sort object keys on round-trip.
    pub fn players_by_join_order(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|player| (player.joined_at_ms, player.id.clone()));
        players
    }

    /// Number of players on the team.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether the team has no players yet.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Which side won a finished match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    /// Team A scored strictly higher.
    TeamA,
    /// Team B scored strictly higher.
    TeamB,
    /// Both teams finished on the same total.
    Draw,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::TeamA => f.write_str("team A"),
            Winner::TeamB => f.write_str("team B"),
            Winner::Draw => f.write_str("draw"),
        }
    }
}

/// Single line in the match's append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEvent {
    /// Event timestamp in unix milliseconds.
    pub at_ms: u64,
    /// Human-readable description of what happened.
    pub message: String,
}

impl MatchEvent {
    /// RFC 3339 rendering of the event timestamp.
    pub fn formatted_at(&self) -> String {
        format_unix_millis(self.at_ms)
    }
}

/// Coarse lifecycle phase, derived from the monotonic `started`/`finished` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    /// Players can still join; the host can start once balanced.
    LobbyOpen,
    /// The game is running; answers and timeouts mutate player progress.
    Started,
    /// Every player finished; the winner is recorded.
    Finished,
}

/// The full competition state for one team-vs-team duel session.
///
/// This is the single shared mutable resource of the engine. Mutations go
/// through the match service exclusively, as partial-field writes against the
/// real-time store; question data stays outside the document on purpose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Short human-shareable match code.
    pub code: String,
    /// Optional PIN required to join.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    /// Player id of the creator; the only caller allowed to start the game.
    pub host_id: String,
    /// Monotonic: flips to true once, at game start.
    pub started: bool,
    /// Monotonic: flips to true once, when every player has finished.
    pub finished: bool,
    /// Winning side, recorded at finalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    /// Number of questions dealt at start; zero while in the lobby.
    #[serde(default)]
    pub question_count: u32,
    /// The host's side.
    pub team_a: Team,
    /// The opposing side.
    pub team_b: Team,
    /// Append-only event log, keyed so concurrent appends never collide.
    #[serde(default)]
    pub events: IndexMap<String, MatchEvent>,
    /// Creation timestamp in unix milliseconds.
    pub created_at_ms: u64,
    /// Finalization timestamp, once finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
}

impl Match {
    /// Derive the lifecycle phase from the monotonic flags.
    pub fn phase(&self) -> MatchPhase {
        if self.finished {
            MatchPhase::Finished
        } else if self.started {
            MatchPhase::Started
        } else {
            MatchPhase::LobbyOpen
        }
    }

    /// Borrow one side's team.
    pub fn team(&self, side: TeamSide) -> &Team {
        match side {
            TeamSide::A => &self.team_a,
            TeamSide::B => &self.team_b,
        }
    }

    /// Mutably borrow one side's team.
    pub fn team_mut(&mut self, side: TeamSide) -> &mut Team {
        match side {
            TeamSide::A => &mut self.team_a,
            TeamSide::B => &mut self.team_b,
        }
    }

    /// Locate a player on either side.
    pub fn find_player(&self, player_id: &str) -> Option<(TeamSide, &Player)> {
        if let Some(player) = self.team_a.players.get(player_id) {
            return Some((TeamSide::A, player));
        }
        self.team_b
            .players
            .get(player_id)
            .map(|player| (TeamSide::B, player))
    }

    /// Insert or replace a player's record on the given side.
    pub fn apply_player(&mut self, side: TeamSide, player: Player) {
        self.team_mut(side).players.insert(player.id.clone(), player);
    }

    /// Check the lobby is startable: both teams non-empty, equal in size, and
    /// within the per-team cap. Returns a human-readable reason otherwise.
    pub fn balance_report(&self, max_team_size: usize) -> Result<(), String> {
        if self.team_a.is_empty() {
            return Err("team A has no players".into());
        }
        if self.team_b.is_empty() {
            return Err("team B has no players".into());
        }
        if self.team_a.len() != self.team_b.len() {
            return Err(format!(
                "teams are uneven ({}v{})",
                self.team_a.len(),
                self.team_b.len()
            ));
        }
        if self.team_a.len() > max_team_size {
            return Err(format!(
                "teams exceed the {max_team_size}-player cap ({} per side)",
                self.team_a.len()
            ));
        }
        Ok(())
    }

    /// True once every player across both teams has finished.
    pub fn all_players_finished(&self) -> bool {
        self.team_a.all_finished() && self.team_b.all_finished()
    }

    /// Side with the strictly higher total score, or a draw on equal totals.
    pub fn leading_side(&self) -> Winner {
        let score_a = self.team_a.total_score();
        let score_b = self.team_b.total_score();
        if score_a > score_b {
            Winner::TeamA
        } else if score_b > score_a {
            Winner::TeamB
        } else {
            Winner::Draw
        }
    }

    /// Append an event to the log, returning the generated key and record for
    /// inclusion in the same store write.
    pub fn record_event(&mut self, at_ms: u64, message: impl Into<String>) -> (String, MatchEvent) {
        let event = MatchEvent {
            at_ms,
            message: message.into(),
        };
        let key = event_key(at_ms);
        self.events.insert(key.clone(), event.clone());
        (key, event)
    }

    /// Event log in chronological order. Keys embed a zero-padded timestamp,
    /// so lexicographic key order is commit-time order.
    pub fn events_ordered(&self) -> Vec<(&str, &MatchEvent)> {
        let mut events: Vec<(&str, &MatchEvent)> = self
            .events
            .iter()
            .map(|(key, event)| (key.as_str(), event))
            .collect();
        events.sort_by_key(|(key, _)| *key);
        events
    }
}

/// Log keys sort chronologically and never collide across concurrent writers.
fn event_key(at_ms: u64) -> String {
    let discriminator = Uuid::new_v4().simple().to_string();
    format!("{at_ms:013}-{}", &discriminator[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> Identity {
        Identity::new(id, id.to_uppercase())
    }

    fn lobby_match() -> Match {
        Match {
            code: "AB12CD".into(),
            pin: None,
            host_id: "ana".into(),
            started: false,
            finished: false,
            winner: None,
            question_count: 0,
            team_a: Team::named("Lions"),
            team_b: Team::named("Hawks"),
            events: IndexMap::new(),
            created_at_ms: 1_700_000_000_000,
            finished_at_ms: None,
        }
    }

    fn seeded(id: &str, joined_at_ms: u64) -> Player {
        Player::seeded(&identity(id), joined_at_ms, 30)
    }

    #[test]
    fn balance_requires_non_empty_equal_teams() {
        let mut m = lobby_match();
        assert!(m.balance_report(4).is_err());

        m.apply_player(TeamSide::A, seeded("ana", 1));
        assert!(m.balance_report(4).is_err());

        m.apply_player(TeamSide::B, seeded("beto", 2));
        assert!(m.balance_report(4).is_ok());

        m.apply_player(TeamSide::A, seeded("carla", 3));
        assert!(m.balance_report(4).is_err());
    }

    #[test]
    fn balance_enforces_team_cap() {
        let mut m = lobby_match();
        for index in 0..5 {
            m.apply_player(TeamSide::A, seeded(&format!("a{index}"), index));
            m.apply_player(TeamSide::B, seeded(&format!("b{index}"), index));
        }
        assert!(m.balance_report(4).is_err());
        assert!(m.balance_report(5).is_ok());
    }

    #[test]
    fn phase_follows_monotonic_flags() {
        let mut m = lobby_match();
        assert_eq!(m.phase(), MatchPhase::LobbyOpen);
        m.started = true;
        assert_eq!(m.phase(), MatchPhase::Started);
        m.finished = true;
        assert_eq!(m.phase(), MatchPhase::Finished);
    }

    #[test]
    fn leading_side_honors_strict_lead_and_draw() {
        let mut m = lobby_match();
        let mut ana = seeded("ana", 1);
        let mut beto = seeded("beto", 2);
        ana.score = 20;
        beto.score = 10;
        m.apply_player(TeamSide::A, ana.clone());
        m.apply_player(TeamSide::B, beto.clone());
        assert_eq!(m.leading_side(), Winner::TeamA);

        beto.score = 20;
        m.apply_player(TeamSide::B, beto.clone());
        assert_eq!(m.leading_side(), Winner::Draw);

        beto.score = 30;
        m.apply_player(TeamSide::B, beto);
        assert_eq!(m.leading_side(), Winner::TeamB);
    }

    #[test]
    fn reset_wipes_progress_but_keeps_identity() {
        let mut player = seeded("ana", 7);
        player.question_index = 5;
        player.score = 40;
        player.finished = true;
        player.answers.push(PlayerAnswer {
            question_index: 4,
            correct: true,
            time_left_when_answered: 12,
            at_ms: 1,
        });

        player.reset(30);

        assert_eq!(player.id, "ana");
        assert_eq!(player.joined_at_ms, 7);
        assert_eq!(player.question_index, 0);
        assert_eq!(player.time_left_secs, 30);
        assert_eq!(player.score, 0);
        assert!(!player.finished);
        assert!(player.answers.is_empty());
    }

    #[test]
    fn join_order_survives_key_sorted_round_trips() {
        let mut team = Team::named("Lions");
        team.players.insert("zoe".into(), seeded("zoe", 10));
        team.players.insert("ana".into(), seeded("ana", 20));

        let value = serde_json::to_value(&team).unwrap();
        let restored: Team = serde_json::from_value(value).unwrap();

        let order: Vec<&str> = restored
            .players_by_join_order()
            .iter()
            .map(|player| player.id.as_str())
            .collect();
        assert_eq!(order, vec!["zoe", "ana"]);
    }

    #[test]
    fn event_keys_order_chronologically() {
        let mut m = lobby_match();
        m.record_event(2_000, "second");
        m.record_event(1_000, "first");

        let ordered: Vec<&str> = m
            .events_ordered()
            .iter()
            .map(|(_, event)| event.message.as_str())
            .collect();
        assert_eq!(ordered, vec!["first", "second"]);
    }

    #[test]
    fn answer_lookup_checks_the_exact_index() {
        let mut player = seeded("ana", 1);
        player.answers.push(PlayerAnswer {
            question_index: 0,
            correct: true,
            time_left_when_answered: 21,
            at_ms: 5,
        });
        assert!(player.has_answered(0));
        assert!(!player.has_answered(1));
    }
}
