//! Wiring between client connections and the coordination services.
//!
//! The [`Coordinator`] is the only entry point a transport needs:
//! [`connect`](Coordinator::connect) when a client arrives,
//! [`handle_text`](Coordinator::handle_text) for every text frame it
//! sends, and [`disconnect`](Coordinator::disconnect) when it leaves.
//! [`Coordinator::launch`] builds every service from configuration and
//! spawns the two background loops.

use std::sync::Arc;

use doodle_types::{ClientMessage, ClientRole, GameState, PredictionResult, ServerEvent};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastBus, Frame, ListenerId};
use crate::canvas::{CanvasStore, CanvasUpdate};
use crate::collaborators::{Archiver, Classifier};
use crate::config::GameConfig;
use crate::game::{DispatchOutcome, GameMachine, GameServices, GameSettings};
use crate::pool::WorkerPool;
use crate::prediction::{PredictionBoard, PredictionScheduler};
use crate::signal::Signal;

/// What the coordinator did with one client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// A new canvas was staged and broadcast.
    CanvasChanged,
    /// The canvas was identical to the current one.
    CanvasUnchanged,
    /// The canvas payload was rejected.
    CanvasRejected,
    /// A command was dispatched.
    Command(DispatchOutcome),
    /// The client introduced itself.
    Hello(Option<ClientRole>),
    /// Heartbeat.
    Ping,
    /// The frame was not a valid client message.
    Malformed,
}

/// Read-only view served on the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Current game state.
    pub game_state: GameState,
    /// Registered listener count.
    pub listeners: usize,
    /// Currently staged ranking.
    pub top5: Vec<PredictionResult>,
}

/// Handles of the background loops.
#[derive(Debug)]
pub struct BackgroundTasks {
    scheduler: JoinHandle<()>,
    countdown: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Wait for both loops to exit.
    pub async fn join(self) {
        if let Err(e) = self.scheduler.await {
            warn!(error = %e, "Prediction scheduler task failed");
        }
        if let Some(countdown) = self.countdown {
            if let Err(e) = countdown.await {
                warn!(error = %e, "Countdown task failed");
            }
        }
    }
}

/// Routes client traffic into the canvas store and the game.
#[derive(Debug)]
pub struct Coordinator {
    canvas: Arc<CanvasStore>,
    game: Arc<GameMachine>,
    bus: Arc<BroadcastBus>,
    board: Arc<PredictionBoard>,
    queue_capacity: usize,
}

impl Coordinator {
    /// Build all services from `config` and spawn the prediction
    /// scheduler and the countdown task. Both stop when `shutdown` is
    /// raised.
    pub fn launch(
        config: &GameConfig,
        classifier: Arc<dyn Classifier>,
        archiver: Arc<dyn Archiver>,
        shutdown: &Arc<Signal>,
    ) -> (Arc<Self>, BackgroundTasks) {
        let canvas = Arc::new(CanvasStore::new());
        let bus = Arc::new(BroadcastBus::new());
        let board = Arc::new(PredictionBoard::new());
        let pool = WorkerPool::new(config.workers.pool_size);

        let scheduler = PredictionScheduler::new(
            Arc::clone(&canvas),
            classifier,
            pool.clone(),
            Arc::clone(&board),
            Arc::clone(&bus),
            config.prediction.interval(),
        );
        let game = Arc::new(GameMachine::new(
            GameSettings {
                timer_max: config.timer.max_value,
                timer_step: config.timer.step(),
                rounds: config.rounds.clone(),
            },
            GameServices {
                canvas: Arc::clone(&canvas),
                bus: Arc::clone(&bus),
                board: Arc::clone(&board),
                pool,
                archiver,
            },
        ));

        let tasks = BackgroundTasks {
            scheduler: tokio::spawn(scheduler.run(Arc::clone(shutdown))),
            countdown: game.spawn_countdown(Arc::clone(shutdown)),
        };
        info!(
            rounds = game.total_rounds(),
            pool_size = config.workers.pool_size,
            "Coordinator launched"
        );

        let coordinator = Arc::new(Self {
            canvas,
            game,
            bus,
            board,
            queue_capacity: config.network.listener_queue_capacity,
        });
        (coordinator, tasks)
    }

    /// The game state machine.
    pub const fn game(&self) -> &Arc<GameMachine> {
        &self.game
    }

    /// The canvas store.
    pub const fn canvas(&self) -> &Arc<CanvasStore> {
        &self.canvas
    }

    /// Register a new listener. The returned queue already holds the
    /// current game state.
    pub async fn connect(&self) -> (ListenerId, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = self.game.attach_listener(tx).await;
        info!(
            listener = %id,
            listeners = self.bus.listener_count(),
            "Listener connected"
        );
        (id, rx)
    }

    /// Unregister a listener.
    pub fn disconnect(&self, id: ListenerId) {
        self.bus.unregister(id);
        info!(
            listener = %id,
            listeners = self.bus.listener_count(),
            "Listener disconnected"
        );
    }

    /// Handle one text frame from listener `id`.
    ///
    /// Nothing is ever sent back to the sender directly; all effects are
    /// broadcasts.
    pub async fn handle_text(&self, id: ListenerId, text: &str) -> MessageOutcome {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(listener = %id, error = %e, "Dropping malformed client message");
                return MessageOutcome::Malformed;
            }
        };

        match message {
            ClientMessage::CanvasUpdate { data_url } => self.canvas_update(id, &data_url).await,
            ClientMessage::Command { payload } => {
                MessageOutcome::Command(self.game.dispatch(payload.action).await)
            }
            ClientMessage::Hello { client } => {
                debug!(listener = %id, role = ?client, "Client hello");
                MessageOutcome::Hello(client)
            }
            ClientMessage::Ping => {
                debug!(listener = %id, "Client ping");
                MessageOutcome::Ping
            }
        }
    }

    async fn canvas_update(&self, id: ListenerId, data_url: &str) -> MessageOutcome {
        match self.canvas.update(data_url).await {
            Ok(CanvasUpdate::Changed(snapshot)) => {
                debug!(
                    listener = %id,
                    bytes = snapshot.bytes.len(),
                    mime_type = %snapshot.mime_type,
                    "Canvas updated"
                );
                self.bus.publish(&ServerEvent::Image {
                    payload: snapshot.image_payload(),
                });
                MessageOutcome::CanvasChanged
            }
            Ok(CanvasUpdate::Unchanged) => MessageOutcome::CanvasUnchanged,
            Err(e) => {
                warn!(listener = %id, error = %e, "Rejected canvas update");
                MessageOutcome::CanvasRejected
            }
        }
    }

    /// Snapshot for the status endpoint.
    pub async fn status(&self) -> StatusSnapshot {
        let top5 = self
            .board
            .current()
            .await
            .map(|staged| staged.results().to_vec())
            .unwrap_or_default();
        StatusSnapshot {
            game_state: self.game.snapshot().await,
            listeners: self.bus.listener_count(),
            top5,
        }
    }
}
