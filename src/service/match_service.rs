//! Match lifecycle orchestration: create/join/start, answer scoring, timeout
//! advances, and the race-free finished transition.
//!
//! Every operation re-reads the latest match document immediately before
//! writing and persists only the subtrees it changed. Players are keyed by id
//! so two participants mutating their own progress in the same instant write
//! disjoint paths and neither update is lost.

use std::sync::Arc;

use futures::{StreamExt, stream::BoxStream};
use indexmap::IndexMap;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    config::EngineConfig,
    error::ServiceError,
    model::{AnswerLetter, Identity, Match, Player, PlayerAnswer, Team, TeamSide, unix_millis},
    questions::QuestionSource,
    service::events,
    store::{FieldUpdates, MatchStore, error::StorageError},
};

/// Alphabet used for match codes.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Length of a match code.
const CODE_LENGTH: usize = 6;
/// Collision-check retries before issuing a code unchecked.
const MAX_CODE_ATTEMPTS: usize = 8;

/// Store path of a match document.
fn match_path(code: &str) -> String {
    format!("matches/{code}")
}

/// Generate a human-shareable 6-character uppercase alphanumeric code.
fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn encode<T: Serialize>(label: &str, value: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|err| {
        ServiceError::Transport(StorageError::unavailable(format!("encoding {label}"), err))
    })
}

/// The engine's brain: the only component that mutates match documents.
///
/// One instance runs on every connected client, all against the same shared
/// store; correctness holds under arbitrarily many independently-clocked
/// instances because writes touch disjoint per-player subtrees and the
/// finished transition is idempotent.
pub struct MatchService {
    store: Arc<dyn MatchStore>,
    questions: Arc<QuestionSource>,
    config: EngineConfig,
}

impl MatchService {
    /// Build a service against a store backend and question source.
    pub fn new(
        store: Arc<dyn MatchStore>,
        questions: Arc<QuestionSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            questions,
            config,
        }
    }

    /// The engine configuration this service applies to matches.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a new match with the caller as the sole team-A player.
    pub async fn create_match(
        &self,
        identity: &Identity,
        team_a_name: &str,
        team_b_name: &str,
        pin: Option<&str>,
    ) -> Result<Match, ServiceError> {
        if team_a_name.trim().is_empty() || team_b_name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "team names must not be empty".into(),
            ));
        }

        let code = self.allocate_code().await?;
        let now = unix_millis();
        let host = Player::seeded(identity, now, self.config.question_time_secs);

        let mut team_a = Team::named(team_a_name.trim());
        team_a.players.insert(host.id.clone(), host);

        let mut m = Match {
            code: code.clone(),
            pin: pin.map(str::to_string),
            host_id: identity.id.clone(),
            started: false,
            finished: false,
            winner: None,
            question_count: 0,
            team_a,
            team_b: Team::named(team_b_name.trim()),
            events: IndexMap::new(),
            created_at_ms: now,
            finished_at_ms: None,
        };
        m.record_event(
            now,
            events::match_created(&identity.display_name, &m.team_a.name, &m.team_b.name),
        );

        let document = encode("match", &m)?;
        self.store
            .create_document(&match_path(&code), document)
            .await?;

        info!(%code, host = %identity.id, "match created");
        Ok(m)
    }

    /// Join an existing match on the given side. Idempotent per player id:
    /// a repeated join (including a reconnect after start) returns the current
    /// state without taking a second seat.
    pub async fn join_match(
        &self,
        identity: &Identity,
        code: &str,
        pin: Option<&str>,
        side: TeamSide,
    ) -> Result<Match, ServiceError> {
        let mut m = self.read_match(code).await?;

        if let Some(expected) = &m.pin {
            if pin != Some(expected.as_str()) {
                return Err(ServiceError::InvalidPin(code.to_string()));
            }
        }

        let already_on = m.find_player(&identity.id).map(|(side, _)| side);
        if let Some(current_side) = already_on {
            debug!(
                %code,
                player = %identity.id,
                side = %current_side,
                "player already joined; returning current state"
            );
            return Ok(m);
        }

        if m.started {
            return Err(ServiceError::AlreadyStarted(code.to_string()));
        }
        if m.team(side).len() >= self.config.max_team_size {
            return Err(ServiceError::InvalidInput(format!("team {side} is full")));
        }

        let now = unix_millis();
        let player = Player::seeded(identity, now, self.config.question_time_secs);
        let (key, event) = m.record_event(now, events::player_joined(&identity.display_name, side));

        let updates = vec![
            (
                format!("{}/players/{}", side.field(), player.id),
                encode("player", &player)?,
            ),
            (format!("events/{key}"), encode("event", &event)?),
        ];
        m.apply_player(side, player);
        self.store.update_fields(&match_path(code), updates).await?;

        info!(%code, player = %identity.id, %side, "player joined");
        Ok(m)
    }

    /// Start the game. Host-only, lobby-only, and only while balanced.
    /// Re-seeds every player so stale state from an earlier aborted attempt
    /// cannot leak into the live game.
    pub async fn start_game(&self, code: &str, caller_id: &str) -> Result<Match, ServiceError> {
        let mut m = self.read_match(code).await?;

        if caller_id != m.host_id {
            return Err(ServiceError::AuthRequired(
                "only the host may start the game".into(),
            ));
        }
        if m.started || m.finished {
            return Err(ServiceError::AlreadyStarted(code.to_string()));
        }
        m.balance_report(self.config.max_team_size)
            .map_err(ServiceError::NotBalanced)?;

        let batch = self
            .questions
            .batch_for_match(code, &m.host_id, self.config.question_count as usize)
            .await?;
        let question_count = batch.len() as u32;

        let now = unix_millis();
        for side in [TeamSide::A, TeamSide::B] {
            for player in m.team_mut(side).players.values_mut() {
                player.reset(self.config.question_time_secs);
            }
        }
        m.started = true;
        m.question_count = question_count;
        let (key, event) = m.record_event(now, events::game_started(question_count));

        let updates = vec![
            ("started".into(), Value::Bool(true)),
            ("question_count".into(), Value::from(question_count)),
            (
                "team_a/players".into(),
                encode("team A roster", &m.team_a.players)?,
            ),
            (
                "team_b/players".into(),
                encode("team B roster", &m.team_b.players)?,
            ),
            (format!("events/{key}"), encode("event", &event)?),
        ];
        self.store.update_fields(&match_path(code), updates).await?;

        info!(%code, questions = question_count, "game started");
        Ok(m)
    }

    /// Score a submission for the caller's question at `question_index`.
    ///
    /// The operation of record. Returns whether the answer was correct; a
    /// stale submission (player finished, index moved on, or already answered)
    /// returns `false` without mutating anything, which is the sole guard
    /// against double-scoring. Never raises: failures are logged and reported
    /// as `false` because the caller may be a timer, not a person.
    pub async fn submit_answer(
        &self,
        code: &str,
        caller_id: &str,
        question_index: u32,
        letter: AnswerLetter,
    ) -> bool {
        match self
            .advance_player(code, caller_id, question_index, Some(letter))
            .await
        {
            Ok(correct) => correct,
            Err(err) => {
                warn!(%code, player = %caller_id, error = %err, "answer submission rejected");
                false
            }
        }
    }

    /// Timeout path: advance past `question_index` with zero credited points.
    /// No-ops when a submission for the same index already landed, so a race
    /// between the countdown and a last-instant answer never double-advances.
    pub async fn force_player_next_question(
        &self,
        code: &str,
        player_id: &str,
        question_index: u32,
    ) {
        match self
            .advance_player(code, player_id, question_index, None)
            .await
        {
            Ok(_) => {}
            Err(err) => {
                warn!(%code, player = %player_id, error = %err, "forced advance rejected");
            }
        }
    }

    /// Decrement the caller's countdown by one second, writing only that
    /// field. Returns the remaining seconds, or `None` when there was nothing
    /// to decrement (not started, finished, or already at zero).
    pub async fn tick_player_timer(&self, code: &str, player_id: &str) -> Option<u32> {
        match self.try_tick(code, player_id).await {
            Ok(remaining) => remaining,
            Err(err) => {
                debug!(
                    %code,
                    player = %player_id,
                    error = %err,
                    "timer tick failed; retrying on the next tick"
                );
                None
            }
        }
    }

    /// Stream of decoded match snapshots, in store commit order.
    pub async fn observe(&self, code: &str) -> Result<BoxStream<'static, Match>, ServiceError> {
        let mut raw = self.store.subscribe(&match_path(code)).await?;
        let code = code.to_string();
        let stream = async_stream::stream! {
            while let Some(value) = raw.next().await {
                match serde_json::from_value::<Match>(value) {
                    Ok(snapshot) => yield snapshot,
                    Err(err) => {
                        warn!(%code, error = %err, "skipping malformed match snapshot");
                    }
                }
            }
        };
        Ok(stream.boxed())
    }

    /// Latest state of a match, straight from the store.
    pub async fn fetch_match(&self, code: &str) -> Result<Match, ServiceError> {
        self.read_match(code).await
    }

    /// Tear down per-match resources: the store feed and the cached batch.
    pub async fn release(&self, code: &str) {
        if let Err(err) = self.store.unsubscribe(&match_path(code)).await {
            warn!(%code, error = %err, "failed to release match subscription");
        }
        self.questions.forget_match(code);
    }

    async fn allocate_code(&self) -> Result<String, ServiceError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code();
            if self
                .store
                .get_document(&match_path(&code))
                .await?
                .is_none()
            {
                return Ok(code);
            }
            debug!(%code, "match code collision; regenerating");
        }
        // 36^6 codes; reaching this means the store is packed with stale matches.
        let code = generate_code();
        warn!(%code, "issuing unchecked match code after repeated collisions");
        Ok(code)
    }

    async fn read_match(&self, code: &str) -> Result<Match, ServiceError> {
        let Some(value) = self.store.get_document(&match_path(code)).await? else {
            return Err(ServiceError::NotFound(code.to_string()));
        };
        serde_json::from_value(value).map_err(|err| {
            warn!(%code, error = %err, "match document is malformed");
            ServiceError::NotFound(code.to_string())
        })
    }

    /// Shared core of submission and timeout: validate, score, advance,
    /// persist the player's subtree, and finalize when the last player lands.
    async fn advance_player(
        &self,
        code: &str,
        player_id: &str,
        question_index: u32,
        answer: Option<AnswerLetter>,
    ) -> Result<bool, ServiceError> {
        let mut m = self.read_match(code).await?;

        if !m.started || m.finished {
            debug!(%code, player = %player_id, "ignoring advance outside the running phase");
            return Ok(false);
        }
        let Some((side, existing)) = m.find_player(player_id) else {
            debug!(%code, player = %player_id, "ignoring advance for unknown player");
            return Ok(false);
        };
        let mut player = existing.clone();
        if player.finished {
            return Ok(false);
        }
        if player.question_index != question_index || player.has_answered(question_index) {
            debug!(
                %code,
                player = %player_id,
                submitted = question_index,
                current = player.question_index,
                "ignoring stale advance"
            );
            return Ok(false);
        }

        let batch = self
            .questions
            .batch_for_match(code, &m.host_id, m.question_count as usize)
            .await?;
        let Some(question) = batch.get(question_index as usize) else {
            return Err(ServiceError::InvalidQuestionState(format!(
                "question {question_index} missing from a batch of {}",
                batch.len()
            )));
        };
        if !question.is_valid() {
            return Err(ServiceError::InvalidQuestionState(format!(
                "question `{}` is malformed",
                question.id
            )));
        }

        let now = unix_millis();
        let correct = answer.is_some_and(|letter| question.is_correct_letter(letter));
        let time_left_when_answered = if answer.is_some() {
            player.time_left_secs
        } else {
            0
        };

        player.answers.push(PlayerAnswer {
            question_index,
            correct,
            time_left_when_answered,
            at_ms: now,
        });
        if correct {
            player.score += self.config.points_per_correct;
        }
        player.question_index += 1;
        player.time_left_secs = self.config.question_time_secs;
        if player.question_index >= m.question_count {
            player.finished = true;
            player.finished_at_ms = Some(now);
        }

        let message = match answer {
            Some(_) => events::answer_submitted(&player.display_name, question_index, correct),
            None => events::player_timed_out(&player.display_name, question_index),
        };
        let player_path = format!("{}/players/{}", side.field(), player.id);
        let just_finished = player.finished;

        m.apply_player(side, player.clone());
        let mut updates: FieldUpdates = vec![(player_path, encode("player", &player)?)];
        let (key, event) = m.record_event(now, message);
        updates.push((format!("events/{key}"), encode("event", &event)?));
        if just_finished {
            let (key, event) = m.record_event(
                now,
                events::player_finished(&player.display_name, player.score),
            );
            updates.push((format!("events/{key}"), encode("event", &event)?));
        }

        // Fold finalization into the same write when this player is the last
        // one standing in our freshly-read snapshot.
        if just_finished && m.all_players_finished() {
            self.push_finalization(&mut m, now, &mut updates)?;
        }

        self.store.update_fields(&match_path(code), updates).await?;
        debug!(
            %code,
            player = %player_id,
            index = question_index,
            correct,
            finished = just_finished,
            "player advanced"
        );

        // Another player may have finished between our read and our write;
        // re-check against the latest document so the finished transition
        // converges no matter which writer lands last.
        if just_finished && !m.finished {
            self.finalize_if_complete(code).await;
        }

        Ok(correct)
    }

    async fn try_tick(&self, code: &str, player_id: &str) -> Result<Option<u32>, ServiceError> {
        let m = self.read_match(code).await?;
        if !m.started || m.finished {
            return Ok(None);
        }
        let Some((side, player)) = m.find_player(player_id) else {
            return Ok(None);
        };
        if player.finished || player.time_left_secs == 0 {
            return Ok(None);
        }

        let remaining = player.time_left_secs - 1;
        let updates = vec![(
            format!("{}/players/{}/time_left_secs", side.field(), player.id),
            Value::from(remaining),
        )];
        self.store.update_fields(&match_path(code), updates).await?;
        Ok(Some(remaining))
    }

    /// Mark the match finished in `m` and append the closing fields/events to
    /// `updates`. Callers only invoke this when the match is not yet finished.
    fn push_finalization(
        &self,
        m: &mut Match,
        now: u64,
        updates: &mut FieldUpdates,
    ) -> Result<(), ServiceError> {
        let winner = m.leading_side();
        m.finished = true;
        m.winner = Some(winner);
        m.finished_at_ms = Some(now);

        updates.push(("finished".into(), Value::Bool(true)));
        updates.push(("winner".into(), encode("winner", &winner)?));
        updates.push(("finished_at_ms".into(), Value::from(now)));

        let (key, event) = m.record_event(
            now,
            events::match_finished(m.team_a.total_score(), m.team_b.total_score()),
        );
        updates.push((format!("events/{key}"), encode("event", &event)?));
        let (key, event) = m.record_event(now, events::winner_declared(winner));
        updates.push((format!("events/{key}"), encode("event", &event)?));

        info!(code = %m.code, %winner, "match finished");
        Ok(())
    }

    /// Idempotent, convergent re-check of the finished transition against the
    /// latest authoritative read. A match that is already finished is left
    /// untouched, so concurrent last-player writers settle on one outcome.
    async fn finalize_if_complete(&self, code: &str) {
        let result: Result<(), ServiceError> = async {
            let mut m = self.read_match(code).await?;
            if !m.started || m.finished || !m.all_players_finished() {
                return Ok(());
            }
            let now = unix_millis();
            let mut updates = FieldUpdates::new();
            self.push_finalization(&mut m, now, &mut updates)?;
            self.store.update_fields(&match_path(code), updates).await?;
            Ok(())
        }
        .await;

        if let Err(err) = result {
            warn!(%code, error = %err, "deferred finalization failed");
        }
    }
}
