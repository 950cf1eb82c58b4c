//! `BobMemory` — the persisted learning aggregate.
//!
//! One JSON object: version tag, lifetime counters, the opponent table,
//! bounded performance history, recent hands and sessions, and the log of
//! derived strategy adjustments. Every collection is hard-capped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bounded::BoundedLog;
use crate::learning::experience::{ExperienceTracker, LearnedAdjustment};
use crate::learning::opponents::OpponentProfiler;
use crate::types::SessionResult;

pub const MEMORY_VERSION: &str = "1.0";
pub const MAX_PERFORMANCE_POINTS: usize = 100;
pub const MAX_STRATEGY_ADJUSTMENTS: usize = 50;

/// Same major version as `MEMORY_VERSION`.
pub fn is_compatible(version: &str) -> bool {
    let major = |v: &str| v.split('.').next().map(str::to_owned);
    major(version) == major(MEMORY_VERSION)
}

/// Entries per side when comparing early and recent performance.
pub const EFFECTIVENESS_WINDOW: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifetimeCounters {
    pub total_sessions: u64,
    pub total_hands: u64,
    pub sessions_won: u64,
    pub total_profit: f64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Default for LifetimeCounters {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            total_sessions: 0,
            total_hands: 0,
            sessions_won: 0,
            total_profit: 0.0,
            created_at: now,
            last_updated: now,
        }
    }
}

/// Parallel rolling arrays, one entry per completed session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHistory {
    /// Rolling win rate over recent sessions at the time of each entry.
    pub win_rates: BoundedLog<f64, MAX_PERFORMANCE_POINTS>,
    pub ranks: BoundedLog<f64, MAX_PERFORMANCE_POINTS>,
    pub profits: BoundedLog<f64, MAX_PERFORMANCE_POINTS>,
    pub chip_counts: BoundedLog<f64, MAX_PERFORMANCE_POINTS>,
    pub timestamps: BoundedLog<DateTime<Utc>, MAX_PERFORMANCE_POINTS>,
}

impl PerformanceHistory {
    pub fn record(&mut self, session: &SessionResult, rolling_win_rate: f64) {
        self.win_rates.push(rolling_win_rate);
        self.ranks.push(session.final_rank as f64);
        self.profits.push(session.net_profit);
        self.chip_counts.push(session.final_chips);
        self.timestamps.push(session.timestamp);
    }

    pub fn len(&self) -> usize {
        self.win_rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.win_rates.is_empty()
    }
}

/// An adjustment the learner derived, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAdjustment {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub learned: LearnedAdjustment,
}

/// Early-vs-recent comparison of the performance history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningEffectiveness {
    pub window: usize,
    pub before_win_rate: f64,
    pub after_win_rate: f64,
    pub before_avg_rank: f64,
    pub after_avg_rank: f64,
    pub before_avg_profit: f64,
    pub after_avg_profit: f64,
}

impl LearningEffectiveness {
    pub fn win_rate_change(&self) -> f64 {
        self.after_win_rate - self.before_win_rate
    }

    pub fn profit_change(&self) -> f64 {
        self.after_avg_profit - self.before_avg_profit
    }

    /// Lower rank is better, so a positive value means improvement.
    pub fn rank_improvement(&self) -> f64 {
        self.before_avg_rank - self.after_avg_rank
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BobMemory {
    pub version: String,
    #[serde(default)]
    pub counters: LifetimeCounters,
    #[serde(rename = "opponent_profiles", default)]
    pub opponents: OpponentProfiler,
    #[serde(rename = "performance_history", default)]
    pub performance: PerformanceHistory,
    #[serde(flatten)]
    pub experience: ExperienceTracker,
    #[serde(default)]
    pub strategy_adjustments: BoundedLog<StrategyAdjustment, MAX_STRATEGY_ADJUSTMENTS>,
}

impl Default for BobMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl BobMemory {
    pub fn new() -> Self {
        Self {
            version: MEMORY_VERSION.to_string(),
            counters: LifetimeCounters::default(),
            opponents: OpponentProfiler::new(),
            performance: PerformanceHistory::default(),
            experience: ExperienceTracker::new(),
            strategy_adjustments: BoundedLog::new(),
        }
    }

    /// Compare the oldest and newest `EFFECTIVENESS_WINDOW` history entries.
    /// `None` until there are two full, non-overlapping windows.
    pub fn learning_effectiveness(&self) -> Option<LearningEffectiveness> {
        let n = self.performance.len();
        if n < EFFECTIVENESS_WINDOW * 2 {
            return None;
        }

        let avg = |log: &BoundedLog<f64, MAX_PERFORMANCE_POINTS>, from_start: bool| -> f64 {
            let sum: f64 = if from_start {
                log.iter().take(EFFECTIVENESS_WINDOW).sum()
            } else {
                log.recent(EFFECTIVENESS_WINDOW).sum()
            };
            sum / EFFECTIVENESS_WINDOW as f64
        };
        let p = &self.performance;

        Some(LearningEffectiveness {
            window: EFFECTIVENESS_WINDOW,
            before_win_rate: avg(&p.win_rates, true),
            after_win_rate: avg(&p.win_rates, false),
            before_avg_rank: avg(&p.ranks, true),
            after_avg_rank: avg(&p.ranks, false),
            before_avg_profit: avg(&p.profits, true),
            after_avg_profit: avg(&p.profits, false),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
