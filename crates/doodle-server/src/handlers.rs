//! REST endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/status` | Game state, listener count, staged ranking |
//! | `GET` | `/api/rounds` | Round catalog in play order |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing the game status and endpoints.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.coordinator.status().await;
    let game = &status.game_state;
    let phase = game.phase;
    let round = game.round_num;
    let try_num = game.try_num;
    let target = if game.target_name.is_empty() {
        String::from("-")
    } else {
        game.target_name.clone()
    };
    let timer = game.timer_value;
    let listeners = status.listeners;
    let top1 = status
        .top5
        .first()
        .map_or_else(|| String::from("-"), |r| r.label.clone());

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Doodle Server</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
    </style>
</head>
<body>
    <h1>Doodle Server</h1>

    <div>
        <div class="metric"><div class="label">Phase</div><div class="value">{phase}</div></div>
        <div class="metric"><div class="label">Round</div><div class="value">{round}</div></div>
        <div class="metric"><div class="label">Try</div><div class="value">{try_num}</div></div>
        <div class="metric"><div class="label">Target</div><div class="value">{target}</div></div>
        <div class="metric"><div class="label">Timer</div><div class="value">{timer}</div></div>
        <div class="metric"><div class="label">Listeners</div><div class="value">{listeners}</div></div>
        <div class="metric"><div class="label">Top guess</div><div class="value">{top1}</div></div>
    </div>

    <h2>Endpoints</h2>
    <ul>
        <li><a href="/api/status">/api/status</a> -- Current game status</li>
        <li><a href="/api/rounds">/api/rounds</a> -- Round catalog</li>
        <li><code>ws://host:port/ws/listener</code> -- Canvas, command and broadcast channel</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Return the current game state, listener count and staged ranking.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.coordinator.status().await;
    Ok(Json(serde_json::to_value(status)?))
}

// ---------------------------------------------------------------------------
// GET /api/rounds
// ---------------------------------------------------------------------------

/// Return the configured round catalog.
pub async fn get_rounds(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rounds = state.coordinator.game().rounds();
    Ok(Json(serde_json::json!({
        "total": rounds.len(),
        "rounds": serde_json::to_value(rounds)?,
    })))
}
