//! The per-device session object: one local identity bound to one match's
//! live stream, plus derived queries over the latest snapshot.

use std::sync::Arc;

use futures::{StreamExt, stream::BoxStream};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    client::{IdentityProvider, timer::PlayerTimer},
    error::ServiceError,
    model::{AnswerLetter, Identity, Match, Player, TeamSide, Winner},
    service::MatchService,
};

/// Read cache over one match's observed stream plus a thin mutation wrapper.
///
/// Owns no authoritative state: every query is a pure read of the latest
/// snapshot, every mutation is a call into the [`MatchService`]. The local
/// player's countdown loop is managed automatically, starting when the match
/// starts and stopping when the player finishes or the view is torn down.
pub struct ClientController {
    service: Arc<MatchService>,
    identity: Identity,
    code: String,
    snapshots: watch::Receiver<Option<Match>>,
    feed: JoinHandle<()>,
}

impl std::fmt::Debug for ClientController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientController")
            .field("identity", &self.identity)
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}

impl ClientController {
    /// Create a match and bind this device to it as the host.
    pub async fn create(
        service: Arc<MatchService>,
        identities: &dyn IdentityProvider,
        team_a_name: &str,
        team_b_name: &str,
        pin: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let identity = identities
            .current_identity()
            .ok_or_else(|| ServiceError::AuthRequired("no signed-in session".into()))?;
        let initial = service
            .create_match(&identity, team_a_name, team_b_name, pin)
            .await?;
        Self::attach(service, identity, initial).await
    }

    /// Join a match by code and bind this device to it.
    pub async fn join(
        service: Arc<MatchService>,
        identities: &dyn IdentityProvider,
        code: &str,
        pin: Option<&str>,
        side: TeamSide,
    ) -> Result<Self, ServiceError> {
        let identity = identities
            .current_identity()
            .ok_or_else(|| ServiceError::AuthRequired("no signed-in session".into()))?;
        let initial = service.join_match(&identity, code, pin, side).await?;
        Self::attach(service, identity, initial).await
    }

    async fn attach(
        service: Arc<MatchService>,
        identity: Identity,
        initial: Match,
    ) -> Result<Self, ServiceError> {
        let code = initial.code.clone();
        let stream = service.observe(&code).await?;
        let (sender, snapshots) = watch::channel(Some(initial));
        let feed = tokio::spawn(run_feed(
            service.clone(),
            code.clone(),
            identity.id.clone(),
            stream,
            sender,
            snapshots.clone(),
        ));

        Ok(Self {
            service,
            identity,
            code,
            snapshots,
            feed,
        })
    }

    /// The identity this controller acts as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Code of the observed match.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Latest observed match state.
    pub fn snapshot(&self) -> Option<Match> {
        self.snapshots.borrow().clone()
    }

    /// The local player's record in the latest snapshot.
    pub fn me(&self) -> Option<Player> {
        self.snapshots
            .borrow()
            .as_ref()
            .and_then(|m| m.find_player(&self.identity.id).map(|(_, p)| p.clone()))
    }

    /// The local player's score, zero until known.
    pub fn my_score(&self) -> i32 {
        self.me().map(|player| player.score).unwrap_or(0)
    }

    /// Seconds left on the local player's current question.
    pub fn my_time_left(&self) -> Option<u32> {
        self.me().map(|player| player.time_left_secs)
    }

    /// Whether the local player has finished the sequence.
    pub fn has_finished(&self) -> bool {
        self.me().map(|player| player.finished).unwrap_or(false)
    }

    /// Whether an answer for the local player's current question is recorded.
    pub fn answered_current(&self) -> bool {
        self.me()
            .map(|player| player.has_answered(player.question_index))
            .unwrap_or(false)
    }

    /// Whether the observed match has finished.
    pub fn match_finished(&self) -> bool {
        self.snapshots
            .borrow()
            .as_ref()
            .map(|m| m.finished)
            .unwrap_or(false)
    }

    /// Winner of the observed match, once finished.
    pub fn winner(&self) -> Option<Winner> {
        self.snapshots.borrow().as_ref().and_then(|m| m.winner)
    }

    /// Start the game. Only meaningful for the host.
    pub async fn start_game(&self) -> Result<Match, ServiceError> {
        self.service.start_game(&self.code, &self.identity.id).await
    }

    /// Submit a lettered answer for the local player's current question.
    /// Accepts raw user input (`"a"`, `" B "`); anything unparsable is
    /// reported as incorrect without a service round-trip.
    pub async fn submit_answer(&self, letter: &str) -> bool {
        let Some(letter) = AnswerLetter::parse(letter) else {
            warn!(code = %self.code, input = letter, "ignoring unparsable answer letter");
            return false;
        };
        let Some(player) = self.me() else {
            return false;
        };
        if player.finished {
            return false;
        }
        self.service
            .submit_answer(&self.code, &self.identity.id, player.question_index, letter)
            .await
    }

    /// Release the subscription and stop the countdown. Preferred over
    /// dropping, which aborts the feed without telling the store.
    pub async fn close(&mut self) {
        self.service.release(&self.code).await;
        // The store teardown ends the observed stream, which stops the feed
        // task and with it the countdown.
        let _ = (&mut self.feed).await;
    }
}

impl Drop for ClientController {
    fn drop(&mut self) {
        self.feed.abort();
    }
}

/// Forward observed snapshots into the watch channel and manage the local
/// player's countdown across phase changes.
async fn run_feed(
    service: Arc<MatchService>,
    code: String,
    player_id: String,
    mut stream: BoxStream<'static, Match>,
    sender: watch::Sender<Option<Match>>,
    snapshots: watch::Receiver<Option<Match>>,
) {
    let mut timer: Option<PlayerTimer> = None;

    while let Some(snapshot) = stream.next().await {
        let started = snapshot.started;
        let match_finished = snapshot.finished;
        let me_finished = snapshot
            .find_player(&player_id)
            .map(|(_, player)| player.finished)
            .unwrap_or(false);

        if sender.send(Some(snapshot)).is_err() {
            break;
        }

        if match_finished || me_finished {
            if let Some(timer) = timer.take() {
                timer.stop();
            }
        } else if started && timer.is_none() {
            timer = Some(PlayerTimer::spawn(
                service.clone(),
                code.clone(),
                player_id.clone(),
                snapshots.clone(),
            ));
        }
    }

    if let Some(timer) = timer.take() {
        timer.stop();
    }
    debug!(%code, player = %player_id, "match feed closed");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::BoxFuture;
    use tokio::time::sleep;

    use crate::{
        client::StaticIdentity,
        config::EngineConfig,
        model::Question,
        questions::{ProviderError, QuestionProvider, QuestionSource},
        store::MemoryStore,
    };

    use super::*;

    struct ScriptedProvider {
        questions: Vec<Question>,
    }

    impl QuestionProvider for ScriptedProvider {
        fn fetch_active_questions(
            &self,
            _author_id: &str,
        ) -> BoxFuture<'static, Result<Vec<Question>, ProviderError>> {
            let questions = self.questions.clone();
            Box::pin(async move { Ok(questions) })
        }
    }

    fn question(id: &str, text: &str) -> Question {
        Question {
            id: id.into(),
            text: text.into(),
            option_a: "alpha".into(),
            option_b: "bravo".into(),
            option_c: "charlie".into(),
            option_d: "delta".into(),
            correct: AnswerLetter::B,
            difficulty: "easy".into(),
            topic: "test".into(),
            created_at_ms: 0,
        }
    }

    fn test_service(question_count: usize, question_time_secs: u32) -> Arc<MatchService> {
        let questions = (0..question_count)
            .map(|index| question(&format!("q{index}"), &format!("Question {index}?")))
            .collect();
        let source = Arc::new(QuestionSource::new(Arc::new(ScriptedProvider { questions })));
        let config = EngineConfig {
            question_time_secs,
            ..EngineConfig::default()
        };
        Arc::new(MatchService::new(
            Arc::new(MemoryStore::new()),
            source,
            config,
        ))
    }

    fn ana() -> StaticIdentity {
        StaticIdentity(Identity::new("ana", "Ana"))
    }

    fn beto() -> StaticIdentity {
        StaticIdentity(Identity::new("beto", "Beto"))
    }

    /// Poll a condition while tokio's paused clock auto-advances.
    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..600 {
            if condition() {
                return;
            }
            sleep(Duration::from_millis(100)).await;
        }
        panic!("condition not reached in time");
    }

    struct NoSession;

    impl IdentityProvider for NoSession {
        fn current_identity(&self) -> Option<Identity> {
            None
        }
    }

    #[tokio::test]
    async fn create_requires_a_session() {
        let service = test_service(3, 30);
        let err = ClientController::create(service, &NoSession, "Lions", "Hawks", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AuthRequired(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn derived_queries_follow_the_observed_stream() {
        let service = test_service(3, 30);
        let host = ClientController::create(service.clone(), &ana(), "Lions", "Hawks", None)
            .await
            .unwrap();
        let guest = ClientController::join(
            service.clone(),
            &beto(),
            host.code(),
            None,
            TeamSide::B,
        )
        .await
        .unwrap();

        wait_for(|| host.snapshot().is_some_and(|m| m.find_player("beto").is_some())).await;

        host.start_game().await.unwrap();
        wait_for(|| guest.snapshot().is_some_and(|m| m.started)).await;

        assert!(guest.submit_answer("b").await);
        wait_for(|| guest.my_score() == 10).await;
        assert!(!guest.has_finished());
        assert_eq!(guest.my_time_left(), Some(30));
    }

    #[tokio::test]
    async fn unparsable_letters_are_rejected_locally() {
        let service = test_service(3, 30);
        let host = ClientController::create(service, &ana(), "Lions", "Hawks", None)
            .await
            .unwrap();
        assert!(!host.submit_answer("answer B").await);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_decrements_the_local_player_once_per_second() {
        let service = test_service(3, 30);
        let host = ClientController::create(service.clone(), &ana(), "Lions", "Hawks", None)
            .await
            .unwrap();
        let _guest = ClientController::join(
            service.clone(),
            &beto(),
            host.code(),
            None,
            TeamSide::B,
        )
        .await
        .unwrap();

        wait_for(|| host.snapshot().is_some_and(|m| m.find_player("beto").is_some())).await;
        host.start_game().await.unwrap();

        wait_for(|| host.my_time_left().is_some_and(|left| left < 30)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn expired_countdown_forces_a_zero_point_advance() {
        let service = test_service(2, 2);
        let host = ClientController::create(service.clone(), &ana(), "Lions", "Hawks", None)
            .await
            .unwrap();
        let _guest = ClientController::join(
            service.clone(),
            &beto(),
            host.code(),
            None,
            TeamSide::B,
        )
        .await
        .unwrap();

        wait_for(|| host.snapshot().is_some_and(|m| m.find_player("beto").is_some())).await;
        host.start_game().await.unwrap();

        // Two seconds of countdown, then the forced advance.
        wait_for(|| host.me().is_some_and(|player| player.question_index == 1)).await;
        let player = host.me().unwrap();
        assert_eq!(player.score, 0);
        assert!(!player.answers[0].correct);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_stops_once_the_player_finishes() {
        let service = test_service(1, 30);
        let host = ClientController::create(service.clone(), &ana(), "Lions", "Hawks", None)
            .await
            .unwrap();
        let _guest = ClientController::join(
            service.clone(),
            &beto(),
            host.code(),
            None,
            TeamSide::B,
        )
        .await
        .unwrap();

        wait_for(|| host.snapshot().is_some_and(|m| m.find_player("beto").is_some())).await;
        host.start_game().await.unwrap();
        wait_for(|| host.snapshot().is_some_and(|m| m.started)).await;

        assert!(host.submit_answer("B").await);
        wait_for(|| host.has_finished()).await;

        // The local countdown must not keep mutating a finished player.
        let before = host.me().unwrap();
        sleep(Duration::from_secs(5)).await;
        let after = host.me().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn close_releases_the_subscription() {
        let service = test_service(3, 30);
        let mut host = ClientController::create(service.clone(), &ana(), "Lions", "Hawks", None)
            .await
            .unwrap();
        host.close().await;
    }
}
