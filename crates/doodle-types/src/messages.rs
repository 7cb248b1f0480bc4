//! JSON messages exchanged over the listener connection.
//!
//! Both directions use an internally tagged `type` field. Unknown fields
//! on incoming messages are ignored, so clients may attach bookkeeping
//! such as `timestamp` or `last_action` without breaking parsing.

use serde::{Deserialize, Serialize};

use crate::game::GameState;
use crate::prediction::PredictionResult;

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

/// A message sent by a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A new canvas image encoded as a data URL. An empty string clears
    /// the canvas.
    CanvasUpdate {
        /// `data:<media-type>;base64,<payload>`, or empty.
        data_url: String,
    },
    /// An operator command.
    Command {
        /// The command body.
        payload: CommandPayload,
    },
    /// Greeting sent by a client after connecting.
    Hello {
        /// Which front end is connecting.
        #[serde(default)]
        client: Option<ClientRole>,
    },
    /// Application-level heartbeat.
    Ping,
}

/// Body of a `command` message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommandPayload {
    /// The requested action.
    pub action: Command,
}

/// The closed set of operator commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Cancel the countdown and re-arm it.
    ResetTimer,
    /// Start the countdown.
    StartTimer,
    /// Advance to the next round (or back to idle after the last one).
    StartNextRound,
    /// Give the current round its second try.
    StartNextTry,
    /// Broadcast the staged ranking as final results.
    RevealResults,
    /// Archive the current canvas.
    SaveCanvasManual,
}

impl Command {
    /// Wire name of the command.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResetTimer => "RESET_TIMER",
            Self::StartTimer => "START_TIMER",
            Self::StartNextRound => "START_NEXT_ROUND",
            Self::StartNextTry => "START_NEXT_TRY",
            Self::RevealResults => "REVEAL_RESULTS",
            Self::SaveCanvasManual => "SAVE_CANVAS_MANUAL",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of front end behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    /// The drawing surface.
    Canvas,
    /// The operator console.
    Admin,
    /// A read-only display.
    Display,
    /// Any role this server does not know about.
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// An event broadcast to every listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The current canvas image; `null` when the canvas was cleared.
    Image {
        /// The encoded image.
        payload: Option<ImagePayload>,
    },
    /// The latest staged ranking.
    Top5 {
        /// Ranked results, best first.
        results: Vec<PredictionResult>,
    },
    /// A full game state snapshot.
    GameStateUpdate {
        /// The state.
        payload: GameState,
    },
    /// A countdown tick or a timer reset.
    Timer {
        /// Seconds remaining.
        value: u32,
        /// What produced the value.
        by: TimerSource,
    },
    /// The ranking revealed at the end of a round.
    FinalResults {
        /// The revealed ranking.
        payload: FinalResults,
    },
}

/// Wire form of a canvas image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Media type, e.g. `image/png`.
    #[serde(rename = "type")]
    pub media_type: String,
    /// Base64 encoded image bytes.
    pub base64: String,
}

/// Origin of a `timer` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerSource {
    /// A per-second countdown step.
    Countdown,
    /// The timer was reset to its maximum.
    Reset,
}

/// Body of a `final_results` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
    /// Ranked results, best first. Empty if nothing was staged.
    pub results: Vec<PredictionResult>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::game::Phase;

    #[test]
    fn parse_command_ignores_extra_fields() {
        let raw = r#"{"type":"command","payload":{"action":"START_NEXT_ROUND","round":2,"timestamp":17}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Command {
                payload: CommandPayload {
                    action: Command::StartNextRound
                }
            }
        );
    }

    #[test]
    fn unknown_action_is_rejected() {
        let raw = r#"{"type":"command","payload":{"action":"SELF_DESTRUCT"}}"#;
        assert!(serde_json::from_str::<ClientMessage>(raw).is_err());
        let missing = r#"{"type":"command","payload":{}}"#;
        assert!(serde_json::from_str::<ClientMessage>(missing).is_err());
    }

    #[test]
    fn parse_canvas_hello_and_ping() {
        let canvas: ClientMessage = serde_json::from_str(
            r#"{"type":"canvas_update","data_url":"data:image/png;base64,AA==","last_action":"draw"}"#,
        )
        .unwrap();
        assert!(matches!(canvas, ClientMessage::CanvasUpdate { ref data_url } if data_url.starts_with("data:")));

        let hello: ClientMessage =
            serde_json::from_str(r#"{"type":"hello","client":"admin"}"#).unwrap();
        assert_eq!(
            hello,
            ClientMessage::Hello {
                client: Some(ClientRole::Admin)
            }
        );

        let odd: ClientMessage =
            serde_json::from_str(r#"{"type":"hello","client":"projector"}"#).unwrap();
        assert_eq!(
            odd,
            ClientMessage::Hello {
                client: Some(ClientRole::Unknown)
            }
        );

        let ping: ClientMessage =
            serde_json::from_str(r#"{"type":"ping","timestamp":1700000000}"#).unwrap();
        assert_eq!(ping, ClientMessage::Ping);
    }

    #[test]
    fn server_event_shapes() {
        let timer = serde_json::to_value(ServerEvent::Timer {
            value: 90,
            by: TimerSource::Reset,
        })
        .unwrap();
        assert_eq!(timer, json!({"type": "timer", "value": 90, "by": "reset"}));

        let top5 = serde_json::to_value(ServerEvent::Top5 {
            results: vec![PredictionResult::new("fox", 0.5)],
        })
        .unwrap();
        assert_eq!(
            top5,
            json!({"type": "top5", "results": [{"label": "fox", "score": 0.5}]})
        );

        let blank = serde_json::to_value(ServerEvent::Image { payload: None }).unwrap();
        assert_eq!(blank, json!({"type": "image", "payload": null}));

        let image = serde_json::to_value(ServerEvent::Image {
            payload: Some(ImagePayload {
                media_type: String::from("image/png"),
                base64: String::from("AA=="),
            }),
        })
        .unwrap();
        assert_eq!(image["payload"]["type"], "image/png");

        let state = serde_json::to_value(ServerEvent::GameStateUpdate {
            payload: GameState::idle(90),
        })
        .unwrap();
        assert_eq!(state["type"], "game_state_update");
        assert_eq!(state["payload"]["phase"], Value::from(Phase::Idle.as_str()));

        let final_results = serde_json::to_value(ServerEvent::FinalResults {
            payload: FinalResults::default(),
        })
        .unwrap();
        assert_eq!(
            final_results,
            json!({"type": "final_results", "payload": {"results": []}})
        );
    }
}
