//! Experience tracker.
//!
//! Bounded rolling history of resolved hands and completed sessions.
//! Derives performance summaries, a coarse trend, and per-situation EV
//! corrections from what actually happened at the table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::storage::bounded::BoundedLog;
use crate::types::{Action, GameExperience, HandResult, Rank, SessionResult};

pub const MAX_EXPERIENCES: usize = 1000;
pub const MAX_SESSIONS: usize = 100;

/// Matching hands required before history moves the EV at all.
pub const MIN_SAMPLES: usize = 5;

/// Learned corrections never exceed this magnitude.
pub const MAX_LEARNED_EV: f64 = 0.2;

/// Chips per EV unit when turning average winnings into a correction.
const CHIPS_PER_EV_UNIT: f64 = 100.0;

/// Sessions required for a trend, and the most considered.
const MIN_TREND_SESSIONS: usize = 10;
const MAX_TREND_SESSIONS: usize = 20;

/// Win-rate change between halves that counts as a trend.
const TREND_THRESHOLD: f64 = 0.1;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Stable => write!(f, "stable"),
            Trend::Declining => write!(f, "declining"),
        }
    }
}

/// Summary over the last N sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceAnalysis {
    pub sessions: usize,
    /// Fraction of sessions finished in first place.
    pub win_rate: f64,
    pub avg_rank: f64,
    pub avg_chips: f64,
    pub total_profit: f64,
}

/// Outcome statistics for one action across recorded hands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ActionStats {
    pub hands: usize,
    pub win_rate: f64,
    pub avg_chips_won: f64,
}

/// A learned EV correction for one situation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedAdjustment {
    pub player_total: u8,
    /// Upcard value, 2–11.
    pub dealer_upcard: u8,
    pub action: Action,
    pub adjustment: f64,
    pub samples: usize,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceTracker {
    #[serde(rename = "recent_experiences", default)]
    hands: BoundedLog<GameExperience, MAX_EXPERIENCES>,
    #[serde(rename = "recent_sessions", default)]
    sessions: BoundedLog<SessionResult, MAX_SESSIONS>,
}

impl ExperienceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hand(&mut self, experience: GameExperience) {
        self.hands.push(experience);
    }

    pub fn record_session(&mut self, result: SessionResult) {
        self.sessions.push(result);
    }

    pub fn hands(&self) -> &BoundedLog<GameExperience, MAX_EXPERIENCES> {
        &self.hands
    }

    pub fn sessions(&self) -> &BoundedLog<SessionResult, MAX_SESSIONS> {
        &self.sessions
    }

    /// Hands recorded for one session, oldest first.
    pub fn hands_for_session<'a>(&'a self, session_id: &'a str) -> impl Iterator<Item = &'a GameExperience> + 'a {
        self.hands.iter().filter(move |h| h.session_id == session_id)
    }

    /// Win rate, average rank/chips and total profit over the last `n` sessions.
    pub fn analyze_performance(&self, n: usize) -> PerformanceAnalysis {
        let recent: Vec<&SessionResult> = self.sessions.recent(n).collect();
        if recent.is_empty() {
            return PerformanceAnalysis::default();
        }
        let count = recent.len() as f64;
        PerformanceAnalysis {
            sessions: recent.len(),
            win_rate: recent.iter().filter(|s| s.is_win()).count() as f64 / count,
            avg_rank: recent.iter().map(|s| s.final_rank as f64).sum::<f64>() / count,
            avg_chips: recent.iter().map(|s| s.final_chips).sum::<f64>() / count,
            total_profit: recent.iter().map(|s| s.net_profit).sum(),
        }
    }

    /// EV correction for a situation, from the average chips won on matching
    /// hands. Upcards match by value, so all ten-valued cards are one
    /// situation. Returns 0 below `MIN_SAMPLES`.
    pub fn learned_ev(&self, player_total: u8, dealer_upcard: Rank, action: Action) -> f64 {
        let up = dealer_upcard.value();
        let (sum, n) = self
            .hands
            .iter()
            .filter(|h| h.player_total == player_total && h.dealer_upcard.value() == up && h.action == action)
            .fold((0.0, 0usize), |(sum, n), h| (sum + h.chips_won, n + 1));

        if n < MIN_SAMPLES {
            return 0.0;
        }
        (sum / n as f64 / CHIPS_PER_EV_UNIT).clamp(-MAX_LEARNED_EV, MAX_LEARNED_EV)
    }

    /// Every situation with enough samples to produce a non-zero correction.
    pub fn learned_adjustments(&self) -> Vec<LearnedAdjustment> {
        let mut groups: BTreeMap<(u8, u8, Action), (f64, usize)> = BTreeMap::new();
        for h in self.hands.iter() {
            let entry = groups
                .entry((h.player_total, h.dealer_upcard.value(), h.action))
                .or_insert((0.0, 0));
            entry.0 += h.chips_won;
            entry.1 += 1;
        }

        groups
            .into_iter()
            .filter(|(_, (_, n))| *n >= MIN_SAMPLES)
            .filter_map(|((player_total, dealer_upcard, action), (sum, samples))| {
                let adjustment = (sum / samples as f64 / CHIPS_PER_EV_UNIT).clamp(-MAX_LEARNED_EV, MAX_LEARNED_EV);
                (adjustment != 0.0).then_some(LearnedAdjustment {
                    player_total,
                    dealer_upcard,
                    action,
                    adjustment,
                    samples,
                })
            })
            .collect()
    }

    /// Compare first-half and second-half win rates over the most recent
    /// sessions. Fewer than 10 sessions is always `Stable`.
    pub fn trend(&self) -> Trend {
        if self.sessions.len() < MIN_TREND_SESSIONS {
            return Trend::Stable;
        }
        let recent: Vec<&SessionResult> = self.sessions.recent(MAX_TREND_SESSIONS).collect();
        let (first, second) = recent.split_at(recent.len() / 2);
        let rate = |half: &[&SessionResult]| half.iter().filter(|s| s.is_win()).count() as f64 / half.len() as f64;
        let delta = rate(second) - rate(first);

        if delta > TREND_THRESHOLD {
            Trend::Improving
        } else if delta < -TREND_THRESHOLD {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    pub fn action_stats(&self, action: Action) -> ActionStats {
        let matching: Vec<&GameExperience> = self.hands.iter().filter(|h| h.action == action).collect();
        if matching.is_empty() {
            return ActionStats::default();
        }
        let n = matching.len() as f64;
        ActionStats {
            hands: matching.len(),
            win_rate: matching.iter().filter(|h| h.result == HandResult::Win).count() as f64 / n,
            avg_chips_won: matching.iter().map(|h| h.chips_won).sum::<f64>() / n,
        }
    }
}

/// Hand with the largest chip gain.
pub fn best_hand<'a>(hands: impl IntoIterator<Item = &'a GameExperience>) -> Option<&'a GameExperience> {
    hands
        .into_iter()
        .max_by(|a, b| a.chips_won.partial_cmp(&b.chips_won).unwrap_or(std::cmp::Ordering::Equal))
}

/// Hand with the largest chip loss.
pub fn worst_hand<'a>(hands: impl IntoIterator<Item = &'a GameExperience>) -> Option<&'a GameExperience> {
    hands
        .into_iter()
        .min_by(|a, b| a.chips_won.partial_cmp(&b.chips_won).unwrap_or(std::cmp::Ordering::Equal))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
