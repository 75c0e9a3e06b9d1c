//! Per-player countdown: a cancellable task that decrements the local
//! player's remaining time once per second and forces the advance at zero.
//!
//! The tick decision is a pure function of the latest match snapshot, so the
//! timer logic is testable without any transport. Every mutation still goes
//! through the match service; this module never writes to the store itself.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::debug;

use crate::{model::Match, service::MatchService};

/// What the countdown should do at a tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The loop is done: player finished, missing, or the match is over.
    Stop,
    /// Nothing to do this second (match not started yet, or a just-landed
    /// answer already advanced the player).
    Wait,
    /// One second elapsed with time on the clock: decrement.
    Decrement,
    /// The countdown hit zero without a submission: force the advance.
    ForceAdvance,
}

/// Decide the next countdown action from the latest known snapshot.
pub fn next_tick(snapshot: &Match, player_id: &str) -> Tick {
    if snapshot.finished {
        return Tick::Stop;
    }
    if !snapshot.started {
        return Tick::Wait;
    }
    let Some((_, player)) = snapshot.find_player(player_id) else {
        return Tick::Stop;
    };
    if player.finished {
        return Tick::Stop;
    }
    if player.has_answered(player.question_index) {
        // A submission landed moments ago and the advance is still settling.
        return Tick::Wait;
    }
    if player.time_left_secs > 0 {
        Tick::Decrement
    } else {
        Tick::ForceAdvance
    }
}

/// Handle to one player's running countdown task.
pub struct PlayerTimer {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PlayerTimer {
    /// Spawn the countdown loop for the local player.
    ///
    /// `snapshots` is the controller's live view of the match; the loop
    /// re-reads it every second and acts through the service. It stops on its
    /// own when the player finishes, when the match ends, or when the
    /// snapshot channel is torn down.
    pub fn spawn(
        service: Arc<MatchService>,
        code: String,
        player_id: String,
        snapshots: watch::Receiver<Option<Match>>,
    ) -> Self {
        let (shutdown, signal) = watch::channel(false);
        let task = tokio::spawn(run_countdown(service, code, player_id, snapshots, signal));
        Self { shutdown, task }
    }

    /// Ask the loop to stop after the current tick.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PlayerTimer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn run_countdown(
    service: Arc<MatchService>,
    code: String,
    player_id: String,
    snapshots: watch::Receiver<Option<Match>>,
    mut signal: watch::Receiver<bool>,
) {
    let period = Duration::from_secs(1);
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    // Catch-up bursts would decrement faster than wall-clock seconds.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = signal.changed() => {
                if changed.is_err() || *signal.borrow() {
                    break;
                }
                continue;
            }
        }

        // The controller owning the snapshot channel is gone.
        if snapshots.has_changed().is_err() {
            break;
        }
        let Some(snapshot) = snapshots.borrow().clone() else {
            continue;
        };

        match next_tick(&snapshot, &player_id) {
            Tick::Stop => break,
            Tick::Wait => {}
            Tick::Decrement => {
                // Failures are logged by the service and retried next tick.
                service.tick_player_timer(&code, &player_id).await;
            }
            Tick::ForceAdvance => {
                let question_index = snapshot
                    .find_player(&player_id)
                    .map(|(_, player)| player.question_index)
                    .unwrap_or_default();
                service
                    .force_player_next_question(&code, &player_id, question_index)
                    .await;
            }
        }
    }

    debug!(%code, player = %player_id, "countdown loop stopped");
}
