//! Hi-Lo card counter.
//!
//! Tracks the running count over a shoe, normalizes it to a true count,
//! and converts that into a bet ramp, an insurance signal, and a small
//! EV modifier for the strategy engine.
//!
//! Every public read starts with the same `enabled` branch so the
//! disabled-mode fallbacks (true count 0, table-minimum bet, no insurance,
//! no modifier) live in one obvious place per operation.

use serde::Serialize;
use tracing::{debug, warn};

use crate::types::Card;

/// Cards per standard deck.
pub const CARDS_PER_DECK: u32 = 52;

/// True count at or above which insurance becomes profitable.
const INSURANCE_TRUE_COUNT: f64 = 3.0;

/// EV nudge per point of true count, and its clamp.
const MODIFIER_PER_COUNT: f64 = 0.02;
const MODIFIER_LIMIT: f64 = 0.1;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Counter configuration.
#[derive(Debug, Clone)]
pub struct CountingConfig {
    pub enabled: bool,
    /// Total cards in the shoe (416 = 8 decks).
    pub shoe_size: u32,
    /// True count at which the bet ramp starts (40% of max).
    pub bet_threshold: f64,
    pub min_bet: f64,
    pub max_bet: f64,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shoe_size: 416,
            bet_threshold: 2.0,
            min_bet: 10.0,
            max_bet: 100.0,
        }
    }
}

/// Point-in-time view of the count, for logs and the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountStatus {
    pub enabled: bool,
    pub running_count: i32,
    pub true_count: f64,
    pub cards_dealt: u32,
    pub decks_remaining: f64,
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

pub struct CardCounter {
    config: CountingConfig,
    running_count: i32,
    cards_dealt: u32,
}

impl CardCounter {
    pub fn new(config: CountingConfig) -> Self {
        Self {
            config,
            running_count: 0,
            cards_dealt: 0,
        }
    }

    pub fn config(&self) -> &CountingConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn running_count(&self) -> i32 {
        self.running_count
    }

    pub fn cards_dealt(&self) -> u32 {
        self.cards_dealt
    }

    /// Record one dealt card.
    pub fn observe(&mut self, card: &Card) {
        if !self.config.enabled {
            return;
        }
        if self.cards_dealt >= self.config.shoe_size {
            warn!(
                card = %card,
                shoe_size = self.config.shoe_size,
                "Card observed past the end of the shoe, ignoring"
            );
            return;
        }
        self.cards_dealt += 1;
        self.running_count += card.rank.hi_lo_weight();
    }

    pub fn observe_all(&mut self, cards: &[Card]) {
        for card in cards {
            self.observe(card);
        }
    }

    /// Start a new shoe. Never call mid-shoe.
    pub fn reset(&mut self) {
        debug!(
            running_count = self.running_count,
            cards_dealt = self.cards_dealt,
            "Counter reset for new shoe"
        );
        self.running_count = 0;
        self.cards_dealt = 0;
    }

    pub fn decks_remaining(&self) -> f64 {
        let remaining = self.config.shoe_size.saturating_sub(self.cards_dealt);
        remaining as f64 / CARDS_PER_DECK as f64
    }

    /// Running count per remaining deck, rounded to one decimal.
    pub fn true_count(&self) -> f64 {
        if !self.config.enabled {
            return 0.0;
        }
        let decks = self.decks_remaining();
        if decks <= 0.0 {
            return 0.0;
        }
        (self.running_count as f64 / decks * 10.0).round() / 10.0
    }

    /// Tiered bet ramp keyed on the true count, capped at available chips.
    pub fn recommended_bet(&self, chips: f64) -> f64 {
        let CountingConfig { min_bet, max_bet, bet_threshold, .. } = self.config;
        if !self.config.enabled {
            return min_bet;
        }

        let tc = self.true_count();
        let bet = if tc >= 5.0 {
            max_bet
        } else if tc >= 4.0 {
            max_bet * 0.8
        } else if tc >= 3.0 {
            max_bet * 0.6
        } else if tc >= bet_threshold {
            max_bet * 0.4
        } else {
            min_bet
        };

        bet.max(min_bet).min(chips.max(0.0))
    }

    /// Small EV nudge in [−0.1, +0.1].
    pub fn strategy_modifier(&self) -> f64 {
        if !self.config.enabled {
            return 0.0;
        }
        (self.true_count() * MODIFIER_PER_COUNT).clamp(-MODIFIER_LIMIT, MODIFIER_LIMIT)
    }

    pub fn should_take_insurance(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        self.true_count() >= INSURANCE_TRUE_COUNT
    }

    pub fn status(&self) -> CountStatus {
        CountStatus {
            enabled: self.config.enabled,
            running_count: self.running_count,
            true_count: self.true_count(),
            cards_dealt: self.cards_dealt,
            decks_remaining: self.decks_remaining(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Rank, Suit};

    fn make_card(rank: Rank) -> Card {
        Card::new(rank, Suit::Spades)
    }

    fn make_counter() -> CardCounter {
        CardCounter::new(CountingConfig::default())
    }

    fn disabled_counter() -> CardCounter {
        CardCounter::new(CountingConfig {
            enabled: false,
            ..CountingConfig::default()
        })
    }

    /// Force a given running count with `dealt` cards by observing low/high cards
    /// and neutral fillers.
    fn counter_at(running: i32, dealt: u32) -> CardCounter {
        let mut c = make_counter();
        let signed = if running >= 0 { Rank::Five } else { Rank::King };
        for _ in 0..running.unsigned_abs() {
            c.observe(&make_card(signed));
        }
        while c.cards_dealt() < dealt {
            c.observe(&make_card(Rank::Eight));
        }
        c
    }

    #[test]
    fn test_running_count_is_signed_sum() {
        let mut c = make_counter();
        let ranks = [Rank::Two, Rank::King, Rank::Seven, Rank::Ace, Rank::Six, Rank::Five];
        for r in ranks {
            c.observe(&make_card(r));
        }
        let expected: i32 = ranks.iter().map(|r| r.hi_lo_weight()).sum();
        assert_eq!(c.running_count(), expected);
        assert_eq!(c.running_count(), 1);
        assert_eq!(c.cards_dealt(), 6);
    }

    #[test]
    fn test_running_count_order_independent() {
        let ranks = [Rank::Two, Rank::Ten, Rank::Nine, Rank::Ace, Rank::Three, Rank::Jack, Rank::Four];
        let mut forward = make_counter();
        let mut backward = make_counter();
        for r in ranks.iter() {
            forward.observe(&make_card(*r));
        }
        for r in ranks.iter().rev() {
            backward.observe(&make_card(*r));
        }
        assert_eq!(forward.running_count(), backward.running_count());
    }

    #[test]
    fn test_six_low_cards_scenario() {
        let mut c = make_counter();
        for r in [Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Six] {
            c.observe(&make_card(r));
        }
        assert_eq!(c.running_count(), 6);
        // Pad to 16 dealt cards → 400 remaining (≈7.69 decks)
        for _ in 0..10 {
            c.observe(&make_card(Rank::Eight));
        }
        assert_eq!(c.running_count(), 6);
        assert!((c.decks_remaining() - 400.0 / 52.0).abs() < 1e-12);
        assert_eq!(c.true_count(), 0.8);
        assert_eq!(c.recommended_bet(1000.0), 10.0);
    }

    #[test]
    fn test_true_count_zero_when_shoe_exhausted() {
        let c = counter_at(20, 416);
        assert_eq!(c.cards_dealt(), 416);
        assert_eq!(c.true_count(), 0.0);
    }

    #[test]
    fn test_observe_past_shoe_end_ignored() {
        let mut c = counter_at(0, 416);
        c.observe(&make_card(Rank::Two));
        assert_eq!(c.cards_dealt(), 416);
        assert_eq!(c.running_count(), 0);
    }

    #[test]
    fn test_disabled_fallbacks() {
        let mut c = disabled_counter();
        for _ in 0..10 {
            c.observe(&make_card(Rank::Two));
        }
        assert_eq!(c.running_count(), 0);
        assert_eq!(c.cards_dealt(), 0);
        assert_eq!(c.true_count(), 0.0);
        assert_eq!(c.recommended_bet(1000.0), 10.0);
        assert_eq!(c.strategy_modifier(), 0.0);
        assert!(!c.should_take_insurance());
    }

    #[test]
    fn test_bet_tiers() {
        // 52 dealt → 7 decks remain; running count picks the true count
        let cases = [
            (-14, 10.0), // tc −2
            (7, 10.0),   // tc 1
            (14, 40.0),  // tc 2
            (21, 60.0),  // tc 3
            (28, 80.0),  // tc 4
            (35, 100.0), // tc 5
            (49, 100.0), // tc 7
        ];
        for (running, expected) in cases {
            let c = counter_at(running, 52);
            assert_eq!(
                c.recommended_bet(10_000.0),
                expected,
                "running={running} tc={}",
                c.true_count()
            );
        }
    }

    #[test]
    fn test_bet_monotonic_in_true_count() {
        let mut last = 0.0;
        for running in -20..=40 {
            let c = counter_at(running, 52);
            let bet = c.recommended_bet(10_000.0);
            assert!(bet >= last, "bet dropped at running={running}");
            last = bet;
        }
    }

    #[test]
    fn test_bet_capped_at_chips() {
        let c = counter_at(35, 52);
        assert_eq!(c.recommended_bet(55.0), 55.0);
    }

    #[test]
    fn test_custom_threshold() {
        let mut c = CardCounter::new(CountingConfig {
            bet_threshold: 1.0,
            ..CountingConfig::default()
        });
        for _ in 0..7 {
            c.observe(&make_card(Rank::Two));
        }
        while c.cards_dealt() < 52 {
            c.observe(&make_card(Rank::Eight));
        }
        assert_eq!(c.true_count(), 1.0);
        assert_eq!(c.recommended_bet(1000.0), 40.0);
    }

    #[test]
    fn test_strategy_modifier_clamped() {
        assert!((counter_at(14, 52).strategy_modifier() - 0.04).abs() < 1e-12);
        assert_eq!(counter_at(70, 52).strategy_modifier(), 0.1);
        assert_eq!(counter_at(-70, 52).strategy_modifier(), -0.1);
    }

    #[test]
    fn test_insurance_signal() {
        assert!(!counter_at(14, 52).should_take_insurance());
        assert!(counter_at(21, 52).should_take_insurance());
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut c = counter_at(10, 100);
        c.reset();
        assert_eq!(c.running_count(), 0);
        assert_eq!(c.cards_dealt(), 0);
        assert_eq!(c.decks_remaining(), 8.0);
    }

    #[test]
    fn test_status_snapshot() {
        let c = counter_at(7, 52);
        let status = c.status();
        assert!(status.enabled);
        assert_eq!(status.running_count, 7);
        assert_eq!(status.true_count, 1.0);
        assert_eq!(status.decks_remaining, 7.0);
    }
}
