//! Game phase state machine.
//!
//! [`GameMachine`] owns the [`GameState`] and is the only thing that
//! mutates it, either through [`GameMachine::dispatch`] or from the
//! countdown task (see [`crate::countdown`]). Every mutation and the
//! broadcasts it causes happen under one lock, so listeners observe
//! events in the order their effects were computed.
//!
//! # Transitions
//!
//! ```text
//! IDLE --START_NEXT_ROUND--> WAITING --START_TIMER--> DRAWING
//!                              ^                         |
//!                              |                    (expiry)
//!          START_NEXT_ROUND /  |                         v
//!          START_NEXT_TRY   +--+------------------ REVEAL_WAITING
//! ```
//!
//! `RESET_TIMER` returns any non-idle phase to `WAITING`. Advancing past
//! the last round returns to `IDLE`. Commands whose precondition fails
//! are logged and ignored: no state change, no broadcast.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use doodle_types::{
    Command, FinalResults, GameState, Phase, RoundDefinition, ServerEvent, TimerSource,
};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use crate::broadcast::{BroadcastBus, Frame, ListenerId};
use crate::canvas::{CanvasSnapshot, CanvasStore};
use crate::collaborators::{ArchiveError, ArchiveReason, Archiver};
use crate::pool::{PoolError, WorkerPool};
use crate::prediction::PredictionBoard;
use crate::signal::Signal;

/// Static game parameters.
#[derive(Debug, Clone)]
pub struct GameSettings {
    /// Value the countdown starts from.
    pub timer_max: u32,
    /// Wall-clock length of one countdown step.
    pub timer_step: Duration,
    /// Round catalog; entry `n - 1` is the target of round `n`.
    pub rounds: Vec<RoundDefinition>,
}

/// Shared services the state machine drives.
#[derive(Clone)]
pub struct GameServices {
    /// Canvas store, cleared on round and try changes.
    pub canvas: Arc<CanvasStore>,
    /// Broadcast bus.
    pub bus: Arc<BroadcastBus>,
    /// Staged predictions, read on reveal.
    pub board: Arc<PredictionBoard>,
    /// Pool the archiver runs on.
    pub pool: WorkerPool,
    /// Canvas archiver.
    pub archiver: Arc<dyn Archiver>,
}

/// Result of dispatching a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The command took effect.
    Applied,
    /// The command's precondition failed; nothing changed.
    Ignored {
        /// Why the command was ignored.
        reason: &'static str,
    },
}

/// The game state machine.
pub struct GameMachine {
    pub(crate) state: Mutex<GameState>,
    pub(crate) settings: GameSettings,
    pub(crate) services: GameServices,

    /// Raised by `START_TIMER`; the countdown waits on it.
    pub(crate) start: Signal,

    /// Raised by any timer reset; the countdown stops when it sees it.
    pub(crate) reset: Signal,

    /// Bumped by every timer start or reset.
    pub(crate) generation: AtomicU64,

    /// Set once the countdown task has been spawned.
    pub(crate) countdown_spawned: AtomicBool,
}

impl std::fmt::Debug for GameMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameMachine")
            .field("settings", &self.settings)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl GameMachine {
    /// Create an idle game.
    pub fn new(settings: GameSettings, services: GameServices) -> Self {
        Self {
            state: Mutex::new(GameState::idle(settings.timer_max)),
            settings,
            services,
            start: Signal::new(),
            reset: Signal::new(),
            generation: AtomicU64::new(0),
            countdown_spawned: AtomicBool::new(false),
        }
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> GameState {
        self.state.lock().await.clone()
    }

    /// Number of rounds in the catalog.
    pub fn total_rounds(&self) -> usize {
        self.settings.rounds.len()
    }

    /// The round catalog, in play order.
    pub fn rounds(&self) -> &[RoundDefinition] {
        &self.settings.rounds
    }

    /// Register a listener and send it the current state.
    ///
    /// Runs under the game lock, so the snapshot cannot be overtaken by
    /// a concurrent state broadcast.
    pub async fn attach_listener(&self, tx: mpsc::Sender<Frame>) -> ListenerId {
        let state = self.state.lock().await;
        let id = self.services.bus.register(tx);
        self.services.bus.send_to(
            id,
            &ServerEvent::GameStateUpdate {
                payload: state.clone(),
            },
        );
        id
    }

    /// Apply an operator command.
    pub async fn dispatch(&self, command: Command) -> DispatchOutcome {
        let outcome = match command {
            Command::StartNextRound => self.start_next_round().await,
            Command::StartNextTry => self.start_next_try().await,
            Command::StartTimer => self.start_timer().await,
            Command::ResetTimer => self.reset_timer().await,
            Command::RevealResults => self.reveal_results().await,
            Command::SaveCanvasManual => self.save_canvas_manual().await,
        };
        match outcome {
            DispatchOutcome::Applied => info!(%command, "Command applied"),
            DispatchOutcome::Ignored { reason } => {
                warn!(%command, reason, "Command ignored");
            }
        }
        outcome
    }

    async fn start_next_round(&self) -> DispatchOutcome {
        let mut state = self.state.lock().await;
        if state.phase == Phase::Drawing {
            return DispatchOutcome::Ignored {
                reason: "countdown is running",
            };
        }

        let next = state.round_num.saturating_add(1);
        let target = usize::try_from(next)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.settings.rounds.get(i));
        match target {
            Some(round) => {
                state.round_num = next;
                state.try_num = 1;
                state.phase = Phase::Waiting;
                state.target_label.clone_from(&round.label);
                state.target_name.clone_from(&round.display_name);
                info!(round = next, target = %round.label, "Round started");
            }
            None => {
                *state = GameState::idle(self.settings.timer_max);
                info!("Last round finished, game back to idle");
            }
        }

        self.rearm(&mut state).await;
        DispatchOutcome::Applied
    }

    async fn start_next_try(&self) -> DispatchOutcome {
        let mut state = self.state.lock().await;
        if !matches!(state.phase, Phase::Waiting | Phase::RevealWaiting) {
            return DispatchOutcome::Ignored {
                reason: "no round is waiting",
            };
        }
        if state.try_num != 1 {
            return DispatchOutcome::Ignored {
                reason: "second try already used",
            };
        }

        state.try_num = 2;
        state.phase = Phase::Waiting;
        info!(round = state.round_num, "Second try started");

        self.rearm(&mut state).await;
        DispatchOutcome::Applied
    }

    async fn start_timer(&self) -> DispatchOutcome {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Waiting {
            return DispatchOutcome::Ignored {
                reason: "timer can only start while waiting",
            };
        }

        state.phase = Phase::Drawing;
        state.timer_value = self.settings.timer_max;
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.reset.clear();
        self.start.set();

        self.publish_state(&state);
        DispatchOutcome::Applied
    }

    async fn reset_timer(&self) -> DispatchOutcome {
        let mut state = self.state.lock().await;
        if state.phase == Phase::Idle {
            return DispatchOutcome::Ignored {
                reason: "no game running",
            };
        }

        state.phase = Phase::Waiting;
        self.cancel_countdown(&mut state);
        self.publish_timer_reset();
        self.publish_state(&state);
        DispatchOutcome::Applied
    }

    async fn reveal_results(&self) -> DispatchOutcome {
        let state = self.state.lock().await;
        if state.phase != Phase::RevealWaiting {
            return DispatchOutcome::Ignored {
                reason: "results are only revealed after the countdown",
            };
        }

        let results = self
            .services
            .board
            .current()
            .await
            .map(|staged| staged.results().to_vec())
            .unwrap_or_default();
        info!(count = results.len(), "Revealing results");
        self.services.bus.publish(&ServerEvent::FinalResults {
            payload: FinalResults { results },
        });
        drop(state);
        DispatchOutcome::Applied
    }

    async fn save_canvas_manual(&self) -> DispatchOutcome {
        let context = self.snapshot().await;
        let snapshot = self.services.canvas.latest().await;
        self.spawn_archive(snapshot, context, ArchiveReason::Manual);
        DispatchOutcome::Applied
    }

    /// Archive `snapshot` on the worker pool without waiting for it.
    ///
    /// A slow or hung archiver holds one pool slot and nothing else; the
    /// outcome is only logged.
    pub(crate) fn spawn_archive(
        &self,
        snapshot: Arc<CanvasSnapshot>,
        context: GameState,
        reason: ArchiveReason,
    ) {
        let archiver = Arc::clone(&self.services.archiver);
        let pool = self.services.pool.clone();
        tokio::spawn(async move {
            let saved = pool
                .run(move || archiver.save(&snapshot, &context, reason))
                .await;
            log_archive_result(reason, saved);
        });
    }

    /// Round or try change: clear the canvas, reset the timer, and
    /// broadcast state, blank canvas and timer reset in that order.
    async fn rearm(&self, state: &mut GameState) {
        self.cancel_countdown(state);
        self.services.canvas.clear().await;
        self.publish_state(state);
        self.services
            .bus
            .publish(&ServerEvent::Image { payload: None });
        self.publish_timer_reset();
    }

    /// Stop any running countdown and refill the timer.
    fn cancel_countdown(&self, state: &mut GameState) {
        state.timer_value = self.settings.timer_max;
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.start.clear();
        self.reset.set();
    }

    pub(crate) fn publish_state(&self, state: &GameState) {
        self.services.bus.publish(&ServerEvent::GameStateUpdate {
            payload: state.clone(),
        });
    }

    fn publish_timer_reset(&self) {
        self.services.bus.publish(&ServerEvent::Timer {
            value: self.settings.timer_max,
            by: TimerSource::Reset,
        });
    }
}

/// Log the outcome of an archive job.
fn log_archive_result(
    reason: ArchiveReason,
    saved: Result<Result<PathBuf, ArchiveError>, PoolError>,
) {
    match saved {
        Ok(Ok(path)) => info!(%reason, path = %path.display(), "Canvas archived"),
        Ok(Err(e)) => warn!(%reason, error = %e, "Canvas archive failed"),
        Err(e) => warn!(%reason, error = %e, "Canvas archive job failed"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use doodle_types::{PredictionResult, StagedPrediction};
    use serde_json::Value;

    use super::*;

    #[derive(Default)]
    struct RecordingArchiver {
        calls: StdMutex<Vec<(ArchiveReason, u32)>>,
    }

    impl Archiver for RecordingArchiver {
        fn save(
            &self,
            _snapshot: &CanvasSnapshot,
            context: &GameState,
            reason: ArchiveReason,
        ) -> Result<PathBuf, ArchiveError> {
            self.calls.lock().unwrap().push((reason, context.round_num));
            Ok(PathBuf::from("saved.png"))
        }
    }

    struct Fixture {
        game: GameMachine,
        board: Arc<PredictionBoard>,
        canvas: Arc<CanvasStore>,
        archiver: Arc<RecordingArchiver>,
        rx: mpsc::Receiver<Frame>,
    }

    fn fixture(rounds: usize) -> Fixture {
        let canvas = Arc::new(CanvasStore::new());
        let bus = Arc::new(BroadcastBus::new());
        let board = Arc::new(PredictionBoard::new());
        let archiver = Arc::new(RecordingArchiver::default());
        let (tx, rx) = mpsc::channel(64);
        bus.register(tx);
        let settings = GameSettings {
            timer_max: 90,
            timer_step: Duration::from_secs(1),
            rounds: (1..=rounds)
                .map(|n| RoundDefinition::new(format!("label{n}"), format!("Name {n}")))
                .collect(),
        };
        let services = GameServices {
            canvas: Arc::clone(&canvas),
            bus,
            board: Arc::clone(&board),
            pool: WorkerPool::new(1),
            archiver: Arc::clone(&archiver) as Arc<dyn Archiver>,
        };
        Fixture {
            game: GameMachine::new(settings, services),
            board,
            canvas,
            archiver,
            rx,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<Frame>) -> Vec<Value> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str(&frame).unwrap());
        }
        events
    }

    fn types(events: &[Value]) -> Vec<String> {
        events
            .iter()
            .map(|e| e["type"].as_str().unwrap_or_default().to_owned())
            .collect()
    }

    #[tokio::test]
    async fn next_round_from_idle() {
        let mut f = fixture(3);
        f.canvas
            .update("data:image/png;base64,AQID")
            .await
            .unwrap();

        let outcome = f.game.dispatch(Command::StartNextRound).await;
        assert_eq!(outcome, DispatchOutcome::Applied);

        let state = f.game.snapshot().await;
        assert_eq!(state.round_num, 1);
        assert_eq!(state.try_num, 1);
        assert_eq!(state.phase, Phase::Waiting);
        assert_eq!(state.target_label, "label1");
        assert_eq!(state.target_name, "Name 1");
        assert!(f.canvas.latest().await.is_blank());

        let events = drain(&mut f.rx);
        assert_eq!(types(&events), vec!["game_state_update", "image", "timer"]);
        assert!(events[1]["payload"].is_null());
        assert_eq!(events[2]["by"], "reset");
        assert_eq!(events[2]["value"], 90);
    }

    #[tokio::test]
    async fn rounds_wrap_back_to_idle() {
        let f = fixture(3);
        for _ in 0..3 {
            f.game.dispatch(Command::StartNextRound).await;
        }
        assert_eq!(f.game.snapshot().await.round_num, 3);

        f.game.dispatch(Command::StartNextRound).await;
        let state = f.game.snapshot().await;
        assert_eq!(state, GameState::idle(90));
    }

    #[tokio::test]
    async fn second_try_only_once() {
        let f = fixture(2);
        f.game.dispatch(Command::StartNextRound).await;

        assert_eq!(
            f.game.dispatch(Command::StartNextTry).await,
            DispatchOutcome::Applied
        );
        assert_eq!(f.game.snapshot().await.try_num, 2);
        assert!(matches!(
            f.game.dispatch(Command::StartNextTry).await,
            DispatchOutcome::Ignored { .. }
        ));

        f.game.dispatch(Command::StartNextRound).await;
        assert_eq!(f.game.snapshot().await.try_num, 1);
    }

    #[tokio::test]
    async fn ignored_commands_change_nothing_and_broadcast_nothing() {
        let mut f = fixture(2);

        // From IDLE only START_NEXT_ROUND and SAVE_CANVAS_MANUAL apply.
        for command in [
            Command::StartNextTry,
            Command::StartTimer,
            Command::ResetTimer,
            Command::RevealResults,
        ] {
            assert!(matches!(
                f.game.dispatch(command).await,
                DispatchOutcome::Ignored { .. }
            ));
        }
        assert_eq!(f.game.snapshot().await, GameState::idle(90));
        assert!(drain(&mut f.rx).is_empty());

        // From DRAWING neither round nor try may advance.
        f.game.dispatch(Command::StartNextRound).await;
        f.game.dispatch(Command::StartTimer).await;
        drain(&mut f.rx);
        let before = f.game.snapshot().await;
        for command in [
            Command::StartNextRound,
            Command::StartNextTry,
            Command::StartTimer,
            Command::RevealResults,
        ] {
            assert!(matches!(
                f.game.dispatch(command).await,
                DispatchOutcome::Ignored { .. }
            ));
        }
        assert_eq!(f.game.snapshot().await, before);
        assert!(drain(&mut f.rx).is_empty());
    }

    #[tokio::test]
    async fn waiting_and_reveal_reject_out_of_order_commands() {
        let mut f = fixture(2);

        // WAITING on the first try: no results to reveal yet.
        f.game.dispatch(Command::StartNextRound).await;
        drain(&mut f.rx);
        let before = f.game.snapshot().await;
        assert!(matches!(
            f.game.dispatch(Command::RevealResults).await,
            DispatchOutcome::Ignored { .. }
        ));
        assert_eq!(f.game.snapshot().await, before);
        assert!(drain(&mut f.rx).is_empty());

        // WAITING on the second try: neither another try nor a reveal.
        f.game.dispatch(Command::StartNextTry).await;
        drain(&mut f.rx);
        let before = f.game.snapshot().await;
        assert_eq!(before.try_num, 2);
        for command in [Command::StartNextTry, Command::RevealResults] {
            assert!(matches!(
                f.game.dispatch(command).await,
                DispatchOutcome::Ignored { .. }
            ));
        }
        assert_eq!(f.game.snapshot().await, before);
        assert!(drain(&mut f.rx).is_empty());

        // REVEAL_WAITING: the timer cannot restart.
        f.game.state.lock().await.phase = Phase::RevealWaiting;
        let before = f.game.snapshot().await;
        assert!(matches!(
            f.game.dispatch(Command::StartTimer).await,
            DispatchOutcome::Ignored { .. }
        ));
        assert_eq!(f.game.snapshot().await, before);
        assert!(!f.game.start.is_set());
        assert!(drain(&mut f.rx).is_empty());
    }

    #[tokio::test]
    async fn start_and_reset_timer() {
        let mut f = fixture(1);
        f.game.dispatch(Command::StartNextRound).await;
        drain(&mut f.rx);

        f.game.dispatch(Command::StartTimer).await;
        assert_eq!(f.game.snapshot().await.phase, Phase::Drawing);
        assert!(f.game.start.is_set());
        assert!(!f.game.reset.is_set());
        assert_eq!(types(&drain(&mut f.rx)), vec!["game_state_update"]);

        f.game.dispatch(Command::ResetTimer).await;
        let state = f.game.snapshot().await;
        assert_eq!(state.phase, Phase::Waiting);
        assert_eq!(state.timer_value, 90);
        assert!(!f.game.start.is_set());
        assert!(f.game.reset.is_set());
        assert_eq!(
            types(&drain(&mut f.rx)),
            vec!["timer", "game_state_update"]
        );
    }

    #[tokio::test]
    async fn reveal_publishes_staged_results() {
        let mut f = fixture(1);
        f.game.dispatch(Command::StartNextRound).await;
        f.game.state.lock().await.phase = Phase::RevealWaiting;
        f.board
            .replace(Arc::new(StagedPrediction::rank(vec![
                PredictionResult::new("b", 0.2),
                PredictionResult::new("a", 0.7),
            ])))
            .await;
        drain(&mut f.rx);

        assert_eq!(
            f.game.dispatch(Command::RevealResults).await,
            DispatchOutcome::Applied
        );
        let events = drain(&mut f.rx);
        assert_eq!(types(&events), vec!["final_results"]);
        assert_eq!(events[0]["payload"]["results"][0]["label"], "a");
        assert_eq!(f.game.snapshot().await.phase, Phase::RevealWaiting);
    }

    #[tokio::test]
    async fn reveal_without_prediction_is_empty() {
        let mut f = fixture(1);
        f.game.dispatch(Command::StartNextRound).await;
        f.game.state.lock().await.phase = Phase::RevealWaiting;
        drain(&mut f.rx);

        f.game.dispatch(Command::RevealResults).await;
        let events = drain(&mut f.rx);
        assert_eq!(events[0]["payload"]["results"], Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn manual_save_runs_archiver() {
        let f = fixture(1);
        f.game.dispatch(Command::StartNextRound).await;
        assert_eq!(
            f.game.dispatch(Command::SaveCanvasManual).await,
            DispatchOutcome::Applied
        );

        for _ in 0..100 {
            if !f.archiver.calls.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            *f.archiver.calls.lock().unwrap(),
            vec![(ArchiveReason::Manual, 1)]
        );
    }

    #[tokio::test]
    async fn attach_listener_sends_current_state() {
        let f = fixture(1);
        f.game.dispatch(Command::StartNextRound).await;
        let (tx, mut rx) = mpsc::channel(4);
        f.game.attach_listener(tx).await;

        let events = drain(&mut rx);
        assert_eq!(types(&events), vec!["game_state_update"]);
        assert_eq!(events[0]["payload"]["round"], 1);
    }
}
