//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>` and
//! holds snapshots published by the bridge; handlers never touch the
//! coordinator directly.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::counting::CountStatus;
use crate::learning::insights::SessionInsights;
use crate::learning::opponents::OpponentProfile;
use crate::learning::LearningCoordinator;
use crate::storage::memory::{LearningEffectiveness, LifetimeCounters};
use crate::types::SessionResult;

/// Most recent sessions served by `/api/sessions`.
const MAX_SESSIONS_SERVED: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub agent_name: String,
    pub started_at: DateTime<Utc>,
    pub status: RwLock<StatusSnapshot>,
    pub opponents: RwLock<Vec<OpponentProfile>>,
    pub sessions: RwLock<Vec<SessionResult>>,
    pub insights: RwLock<Option<SessionInsights>>,
}

impl DashboardState {
    pub fn new(agent_name: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            started_at: Utc::now(),
            status: RwLock::new(StatusSnapshot::default()),
            opponents: RwLock::new(Vec::new()),
            sessions: RwLock::new(Vec::new()),
            insights: RwLock::new(None),
        }
    }

    /// Replace every snapshot at once.
    pub async fn apply(&self, snapshot: Snapshot) {
        *self.status.write().await = snapshot.status;
        *self.opponents.write().await = snapshot.opponents;
        *self.sessions.write().await = snapshot.sessions;
        *self.insights.write().await = Some(snapshot.insights);
    }

    /// Update only the live count; learning state is untouched by cards.
    pub async fn apply_count(&self, count: CountStatus) {
        self.status.write().await.count = Some(count);
    }
}

/// Coordinator state captured synchronously, applied to the dashboard later.
pub struct Snapshot {
    pub status: StatusSnapshot,
    pub opponents: Vec<OpponentProfile>,
    pub sessions: Vec<SessionResult>,
    pub insights: SessionInsights,
}

impl Snapshot {
    pub fn capture(coordinator: &LearningCoordinator) -> Self {
        let memory = coordinator.memory().memory();
        Self {
            status: StatusSnapshot {
                session_id: coordinator.session_id().to_string(),
                learning_enabled: coordinator.is_learning_enabled(),
                memory_only: coordinator.memory().is_memory_only(),
                counters: memory.counters.clone(),
                count: Some(coordinator.counter().status()),
                known_opponents: memory.opponents.len(),
                recent_hands: memory.experience.hands().len(),
                effectiveness: memory.learning_effectiveness(),
            },
            opponents: memory.opponents.sorted().into_iter().cloned().collect(),
            sessions: memory
                .experience
                .sessions()
                .recent(MAX_SESSIONS_SERVED)
                .cloned()
                .collect(),
            insights: coordinator.insights(coordinator.session_id()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub session_id: String,
    pub learning_enabled: bool,
    pub memory_only: bool,
    pub counters: LifetimeCounters,
    pub count: Option<CountStatus>,
    pub known_opponents: usize,
    pub recent_hands: usize,
    pub effectiveness: Option<LearningEffectiveness>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub agent: String,
    pub uptime_secs: i64,
    pub win_rate: f64,
    #[serde(flatten)]
    pub snapshot: StatusSnapshot,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.status.read().await.clone();
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let c = &snapshot.counters;
    let win_rate = if c.total_sessions > 0 {
        c.sessions_won as f64 / c.total_sessions as f64
    } else {
        0.0
    };

    Json(StatusResponse {
        agent: state.agent_name.clone(),
        uptime_secs: uptime,
        win_rate,
        snapshot,
    })
}

/// GET /api/opponents
pub async fn get_opponents(State(state): State<AppState>) -> Json<Vec<OpponentProfile>> {
    Json(state.opponents.read().await.clone())
}

/// GET /api/sessions
pub async fn get_sessions(State(state): State<AppState>) -> Json<Vec<SessionResult>> {
    Json(state.sessions.read().await.clone())
}

/// GET /api/insights
pub async fn get_insights(State(state): State<AppState>) -> Result<Json<SessionInsights>, StatusCode> {
    state
        .insights
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or(StatusCode::NO_CONTENT)
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
