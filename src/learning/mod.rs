//! Learning coordinator.
//!
//! Wires the counter and the tracker's learned EV into the strategy engine,
//! applies the opponent-aware wager adjustment, and folds resolved hands and
//! sessions back into memory.
//!
//! Control flow per decision point:
//!   observe cards → decide (learned EV + count) → adjust for opponents
//!   → caller plays → record_hand / record_session → persist

pub mod experience;
pub mod insights;
pub mod opponents;

use tracing::{debug, info};
use uuid::Uuid;

use crate::counting::{CardCounter, CountingConfig};
use crate::storage::MemoryManager;
use crate::strategy::{ActionAdjustments, StrategyEngine};
use crate::types::{Action, BotDecision, Card, GameExperience, GameSituation, SessionResult};
use insights::SessionInsights;

/// Average opponent skill below which wagers are scaled up.
pub const WEAK_OPPONENT_SKILL: f64 = 0.4;

/// Average opponent aggression above which wagers are left as computed.
pub const AGGRESSIVE_OPPONENTS: f64 = 0.7;

/// Wager multiplier against weak tables.
const WEAK_TABLE_BET_MULTIPLIER: f64 = 1.2;

/// Sessions in the rolling win rate stored with each history point.
const ROLLING_WIN_RATE_WINDOW: usize = 10;

#[derive(Debug, Clone)]
pub struct LearningConfig {
    pub enabled: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

pub struct LearningCoordinator {
    counter: CardCounter,
    engine: StrategyEngine,
    memory: MemoryManager,
    config: LearningConfig,
    session_id: String,
}

impl LearningCoordinator {
    pub fn new(counting: CountingConfig, config: LearningConfig, memory: MemoryManager) -> Self {
        info!(
            counting = counting.enabled,
            learning = config.enabled,
            memory_only = memory.is_memory_only(),
            known_opponents = memory.memory().opponents.len(),
            past_sessions = memory.memory().counters.total_sessions,
            "Learning coordinator ready"
        );
        Self {
            counter: CardCounter::new(counting),
            engine: StrategyEngine::new(),
            memory,
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn counter(&self) -> &CardCounter {
        &self.counter
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn is_learning_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Begin a session on a fresh shoe. Generates an id when none is given.
    pub fn start_session(&mut self, session_id: Option<String>) -> &str {
        self.session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.counter.reset();
        info!(session_id = %self.session_id, "Session started");
        &self.session_id
    }

    /// The dealer reshuffled; the count starts over.
    pub fn new_shoe(&mut self) {
        self.counter.reset();
    }

    pub fn observe_card(&mut self, card: &Card) {
        self.counter.observe(card);
    }

    pub fn observe_cards(&mut self, cards: &[Card]) {
        self.counter.observe_all(cards);
    }

    // -- Decisions ----------------------------------------------------------

    /// Learned EV correction for each action in this situation.
    pub fn learning_adjustments(&self, situation: &GameSituation) -> ActionAdjustments {
        if !self.config.enabled {
            return ActionAdjustments::default();
        }
        let tracker = &self.memory.memory().experience;
        let mut adj = ActionAdjustments::default();
        for action in Action::PRIORITY {
            adj.set(
                action,
                tracker.learned_ev(situation.player_total, situation.dealer_upcard.rank, action),
            );
        }
        adj
    }

    /// Full decision: EV engine with learned and count adjustments, then the
    /// opponent-aware wager.
    pub fn decide(&self, situation: &GameSituation, opponents: &[String]) -> BotDecision {
        let adjustments = self.learning_adjustments(situation);
        let decision = self.engine.decide_adjusted(situation, &adjustments, &self.counter);
        self.adjust_for_opponents(decision, opponents, situation.chips)
    }

    /// Scale the wager against weak tables. Aggressive tables keep the
    /// computed wager. The result never exceeds the table max or `chips`.
    pub fn adjust_for_opponents(&self, mut decision: BotDecision, opponents: &[String], chips: f64) -> BotDecision {
        if !self.config.enabled {
            return decision;
        }
        let Some(bet) = decision.bet_size else {
            return decision;
        };
        let profiler = &self.memory.memory().opponents;

        if let Some(aggression) = profiler.average_aggression(opponents) {
            if aggression > AGGRESSIVE_OPPONENTS {
                debug!(aggression = format!("{aggression:.2}"), "Aggressive table, wager unchanged");
                return decision;
            }
        }
        if let Some(skill) = profiler.average_skill(opponents) {
            if skill < WEAK_OPPONENT_SKILL {
                let max_bet = self.counter.config().max_bet;
                let scaled = (bet * WEAK_TABLE_BET_MULTIPLIER).min(max_bet).min(chips).max(bet.min(chips));
                debug!(
                    skill = format!("{skill:.2}"),
                    from = bet,
                    to = scaled,
                    "Weak table, wager scaled up"
                );
                decision.bet_size = Some(scaled);
            }
        }
        decision
    }

    pub fn should_take_insurance(&self) -> bool {
        self.counter.should_take_insurance()
    }

    // -- Outcomes -----------------------------------------------------------

    /// Store a resolved hand. An empty session id is filled with the current one.
    pub fn record_hand(&mut self, mut experience: GameExperience) {
        if !self.config.enabled {
            return;
        }
        if experience.session_id.is_empty() {
            experience.session_id = self.session_id.clone();
        }
        debug!(
            session_id = %experience.session_id,
            total = experience.player_total,
            upcard = %experience.dealer_upcard,
            action = %experience.action,
            chips_won = experience.chips_won,
            "Hand recorded"
        );
        self.memory.memory_mut().experience.record_hand(experience);
    }

    /// Fold a completed session into every learning store, persist, and
    /// return the insight bundle. `None` when learning is disabled.
    pub fn record_session(&mut self, mut result: SessionResult) -> Option<SessionInsights> {
        if !self.config.enabled {
            return None;
        }
        if result.session_id.is_empty() {
            result.session_id = self.session_id.clone();
        }
        let session_id = result.session_id.clone();

        let memory = self.memory.memory_mut();
        let touched = memory.opponents.update_from_session(&result);
        memory.experience.record_session(result.clone());
        let rolling = memory.experience.analyze_performance(ROLLING_WIN_RATE_WINDOW).win_rate;

        // Only situations played this session go into the audit log.
        let played: Vec<(u8, u8, Action)> = memory
            .experience
            .hands_for_session(&session_id)
            .map(|h| (h.player_total, h.dealer_upcard.value(), h.action))
            .collect();
        let adjustments: Vec<_> = memory
            .experience
            .learned_adjustments()
            .into_iter()
            .filter(|a| played.contains(&(a.player_total, a.dealer_upcard, a.action)))
            .collect();

        self.memory.record_session_metrics(&result, rolling);
        self.memory.log_adjustments(&session_id, &adjustments);

        let insights = SessionInsights::build(self.memory.memory(), &session_id);
        let persisted = self.memory.persist();

        info!(
            session_id = %session_id,
            rank = result.final_rank,
            players = result.total_players,
            net_profit = format!("{:+.2}", result.net_profit),
            opponents_updated = touched.len(),
            adjustments = adjustments.len(),
            trend = %insights.trend,
            persisted,
            "Session recorded"
        );
        for suggestion in &insights.suggestions {
            info!(session_id = %session_id, "{suggestion}");
        }

        Some(insights)
    }

    /// Insights for any session still in history.
    pub fn insights(&self, session_id: &str) -> SessionInsights {
        SessionInsights::build(self.memory.memory(), session_id)
    }

    /// Save now. Returns whether memory is durably stored.
    pub fn save(&mut self) -> bool {
        self.memory.persist()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
