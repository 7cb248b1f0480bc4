//! Game phase and game state types.
//!
//! [`GameState`] is the snapshot every listener receives in a
//! `game_state_update` event. Its JSON field names follow what the
//! display and admin front ends read (`round`, `try_num`, `phase`,
//! `target_name`).

use serde::{Deserialize, Serialize};

/// One slot in the game's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// No game running. Round counter is zero.
    Idle,
    /// A round or try is armed; the drawer has not started yet.
    Waiting,
    /// The countdown is running and the drawer is drawing.
    Drawing,
    /// The countdown expired; results may be revealed.
    RevealWaiting,
}

impl Phase {
    /// Wire name of the phase, as it appears in JSON.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Waiting => "WAITING",
            Self::Drawing => "DRAWING",
            Self::RevealWaiting => "REVEAL_WAITING",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry in the static round catalog.
///
/// Rounds are numbered from 1; catalog entry `n - 1` is the target of
/// round `n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundDefinition {
    /// Classifier label the drawer is asked to draw.
    pub label: String,
    /// Human-readable name shown on the displays.
    pub display_name: String,
}

impl RoundDefinition {
    /// Create a round definition.
    pub fn new(label: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            display_name: display_name.into(),
        }
    }
}

/// Snapshot of the game's phase, round and timer.
///
/// Invariants maintained by the state machine that owns it:
/// - `round_num == 0` exactly when `phase == Idle`
/// - target fields are non-empty exactly when `round_num > 0`
/// - `timer_value` never exceeds the configured maximum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Current round, 1-based. Zero while idle.
    #[serde(rename = "round")]
    pub round_num: u32,
    /// Current try within the round (1 or 2).
    pub try_num: u8,
    /// Current phase.
    pub phase: Phase,
    /// Classifier label of the current target, empty while idle.
    pub target_label: String,
    /// Display name of the current target, empty while idle.
    pub target_name: String,
    /// Seconds left on the countdown.
    pub timer_value: u32,
}

impl GameState {
    /// The idle state with a full timer.
    pub const fn idle(timer_max: u32) -> Self {
        Self {
            round_num: 0,
            try_num: 1,
            phase: Phase::Idle,
            target_label: String::new(),
            target_name: String::new(),
            timer_value: timer_max,
        }
    }

    /// Whether a round is in progress (any phase other than idle).
    pub fn is_round_active(&self) -> bool {
        self.round_num > 0 && !self.target_label.is_empty()
    }
}
