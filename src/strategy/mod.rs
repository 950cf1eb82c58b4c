//! Strategy engine — EV per action, count and learning adjustments, action choice.

pub mod dealer;
pub mod ev;

use serde::Serialize;
use tracing::debug;

use crate::counting::CardCounter;
use crate::types::{Action, BotDecision, GameSituation};

/// EV gap at which confidence saturates at 1.0.
const CONFIDENCE_SPREAD: f64 = 0.5;

/// Share of a negative count modifier credited to hitting.
const NEGATIVE_MODIFIER_WEIGHT: f64 = 0.5;

// ---------------------------------------------------------------------------
// Adjustments and evaluations
// ---------------------------------------------------------------------------

/// Additive EV corrections per action, usually learned from history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ActionAdjustments {
    pub stand: f64,
    pub hit: f64,
    pub double: f64,
    pub split: f64,
}

impl ActionAdjustments {
    /// The same correction for every action.
    pub fn uniform(value: f64) -> Self {
        Self {
            stand: value,
            hit: value,
            double: value,
            split: value,
        }
    }

    pub fn get(&self, action: Action) -> f64 {
        match action {
            Action::Stand => self.stand,
            Action::Hit => self.hit,
            Action::Double => self.double,
            Action::Split => self.split,
        }
    }

    pub fn set(&mut self, action: Action, value: f64) {
        match action {
            Action::Stand => self.stand = value,
            Action::Hit => self.hit = value,
            Action::Double => self.double = value,
            Action::Split => self.split = value,
        }
    }
}

/// Raw and adjusted EVs for one decision. Illegal actions are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActionEvaluation {
    pub stand: f64,
    pub hit: f64,
    pub double: Option<f64>,
    pub split: Option<f64>,
}

impl ActionEvaluation {
    pub fn get(&self, action: Action) -> Option<f64> {
        match action {
            Action::Stand => Some(self.stand),
            Action::Hit => Some(self.hit),
            Action::Double => self.double,
            Action::Split => self.split,
        }
    }

    /// Legal actions with their EVs, in tie-break priority order.
    pub fn candidates(&self) -> Vec<(Action, f64)> {
        Action::PRIORITY
            .iter()
            .filter_map(|a| self.get(*a).map(|ev| (*a, ev)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Picks the highest-EV action for a situation.
///
/// Stateless: the count lives in the `CardCounter` passed to each call and
/// learned corrections come in as `ActionAdjustments`.
#[derive(Debug, Default)]
pub struct StrategyEngine;

impl StrategyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Unadjusted EV of every legal action.
    pub fn evaluate(&self, situation: &GameSituation) -> ActionEvaluation {
        let up = situation.dealer_upcard.value();
        let total = situation.player_total;
        let soft = situation.is_soft;

        let double = situation
            .can_double
            .then(|| ev::double_ev(total, soft, up));
        let split = if situation.can_split {
            situation.pair_rank().map(|rank| ev::split_ev(rank.value(), up))
        } else {
            None
        };

        ActionEvaluation {
            stand: dealer::stand_ev(total, up),
            hit: ev::hit_ev(total, soft, up, 0),
            double,
            split,
        }
    }

    /// Decide with one learning correction applied to every action.
    pub fn decide(
        &self,
        situation: &GameSituation,
        learning_adjustment: f64,
        counter: &CardCounter,
    ) -> BotDecision {
        self.decide_adjusted(situation, &ActionAdjustments::uniform(learning_adjustment), counter)
    }

    /// Decide with per-action learning corrections.
    ///
    /// Order of operations: raw EVs, plus learning corrections, then the
    /// count modifier (a positive modifier is added to stand, a negative one
    /// is credited at half weight to hit). The best adjusted EV wins and
    /// ties go to the earlier action in `Action::PRIORITY`.
    pub fn decide_adjusted(
        &self,
        situation: &GameSituation,
        adjustments: &ActionAdjustments,
        counter: &CardCounter,
    ) -> BotDecision {
        let status = counter.status();
        debug!(
            running_count = status.running_count,
            true_count = status.true_count,
            decks_remaining = format!("{:.2}", status.decks_remaining),
            "Count status"
        );

        let raw = self.evaluate(situation);
        let adjusted = apply_adjustments(&raw, adjustments, counter.strategy_modifier());
        let (action, best, second) = pick_best(&adjusted);

        let confidence = match second {
            Some(second) => ((best - second) / CONFIDENCE_SPREAD).clamp(0.0, 1.0),
            None => 1.0,
        };

        let decision = BotDecision {
            action,
            confidence,
            expected_value: best,
            bet_size: Some(counter.recommended_bet(situation.chips)),
        };

        debug!(
            situation = %situation,
            stand = format!("{:+.4}", adjusted.stand),
            hit = format!("{:+.4}", adjusted.hit),
            double = ?adjusted.double.map(|v| format!("{v:+.4}")),
            split = ?adjusted.split.map(|v| format!("{v:+.4}")),
            decision = %decision,
            "Decision computed"
        );

        decision
    }
}

fn apply_adjustments(raw: &ActionEvaluation, adj: &ActionAdjustments, modifier: f64) -> ActionEvaluation {
    let mut out = ActionEvaluation {
        stand: raw.stand + adj.stand,
        hit: raw.hit + adj.hit,
        double: raw.double.map(|v| v + adj.double),
        split: raw.split.map(|v| v + adj.split),
    };
    if modifier > 0.0 {
        out.stand += modifier;
    } else if modifier < 0.0 {
        out.hit += modifier.abs() * NEGATIVE_MODIFIER_WEIGHT;
    }
    out
}

/// Best action, its EV, and the runner-up EV. A later candidate replaces
/// the leader only when strictly greater.
fn pick_best(eval: &ActionEvaluation) -> (Action, f64, Option<f64>) {
    let candidates = eval.candidates();
    let mut best = (Action::Stand, eval.stand);
    for (action, ev) in &candidates {
        if *ev > best.1 {
            best = (*action, *ev);
        }
    }
    let second = candidates
        .iter()
        .filter(|(a, _)| *a != best.0)
        .map(|(_, ev)| *ev)
        .fold(None, |acc: Option<f64>, ev| Some(acc.map_or(ev, |a| a.max(ev))));
    (best.0, best.1, second)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
