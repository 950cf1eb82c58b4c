//! Per-session insight bundle.
//!
//! Human-readable summary for logs and the dashboard. Nothing here feeds
//! back into decisions; the tracker's learned EV already does that.

use serde::Serialize;

use super::experience::{best_hand, worst_hand, PerformanceAnalysis, Trend};
use super::AGGRESSIVE_OPPONENTS;
use crate::storage::memory::{BobMemory, LearningEffectiveness};
use crate::types::{Action, GameExperience};

/// Sessions covered by the performance block.
pub const INSIGHT_WINDOW: usize = 10;

/// Per-action win rate below which a review is suggested.
const WEAK_ACTION_WIN_RATE: f64 = 0.4;

/// Hands of an action required before its win rate is judged.
const MIN_ACTION_HANDS: usize = 5;

/// Skill below which an opponent is listed as exploitable.
pub const EXPLOITABLE_SKILL: f64 = 0.4;

#[derive(Debug, Clone, Serialize)]
pub struct SessionInsights {
    pub session_id: String,
    pub best_hand: Option<GameExperience>,
    pub worst_hand: Option<GameExperience>,
    pub trend: Trend,
    pub performance: PerformanceAnalysis,
    pub exploitable_opponents: Vec<String>,
    pub effectiveness: Option<LearningEffectiveness>,
    pub suggestions: Vec<String>,
}

impl SessionInsights {
    pub fn build(memory: &BobMemory, session_id: &str) -> Self {
        let tracker = &memory.experience;
        let trend = tracker.trend();
        let performance = tracker.analyze_performance(INSIGHT_WINDOW);
        let exploitable = memory.opponents.exploitable(EXPLOITABLE_SKILL);
        // Aggressive players keep the wager unchanged, so only passive ones raise it.
        let raise_against = exploitable
            .iter()
            .filter(|p| p.stats.aggression_score <= AGGRESSIVE_OPPONENTS)
            .count();
        let exploitable_opponents: Vec<String> = exploitable.into_iter().map(|p| p.wallet.clone()).collect();

        let mut suggestions = Vec::new();
        for (action, text) in [
            (Action::Double, "Review double-down situations"),
            (Action::Split, "Review split decisions"),
        ] {
            let stats = tracker.action_stats(action);
            if stats.hands >= MIN_ACTION_HANDS && stats.win_rate < WEAK_ACTION_WIN_RATE {
                suggestions.push(format!("{text} (win rate {:.0}% over {} hands)", stats.win_rate * 100.0, stats.hands));
            }
        }
        if trend == Trend::Declining {
            suggestions.push("Win rate is declining, favour table-minimum bets until it recovers".to_string());
        }
        if raise_against > 0 {
            suggestions.push(format!(
                "{raise_against} known opponent(s) play poorly without pressing bets, larger wagers apply when they are at the table"
            ));
        }

        Self {
            session_id: session_id.to_string(),
            best_hand: best_hand(tracker.hands_for_session(session_id)).cloned(),
            worst_hand: worst_hand(tracker.hands_for_session(session_id)).cloned(),
            trend,
            performance,
            exploitable_opponents,
            effectiveness: memory.learning_effectiveness(),
            suggestions,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
