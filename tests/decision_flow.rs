//! End-to-end decision flow through the public API: counting, EV choice,
//! learned corrections, opponent profiling and the opponent-aware wager.

use bob::counting::{CardCounter, CountingConfig};
use bob::learning::opponents::Weakness;
use bob::learning::{LearningConfig, LearningCoordinator};
use bob::storage::MemoryManager;
use bob::strategy::StrategyEngine;
use bob::types::{
    Action, ActionCounts, Card, GameExperience, GameSituation, HandResult, OpponentSessionData,
    PatternObservations, Rank, SessionResult, SituationTally,
};
use chrono::Utc;

fn cards(list: &[&str]) -> Vec<Card> {
    list.iter().map(|c| c.parse().unwrap()).collect()
}

fn make_coordinator() -> LearningCoordinator {
    LearningCoordinator::new(
        CountingConfig::default(),
        LearningConfig::default(),
        MemoryManager::ephemeral(),
    )
}

fn make_opponent(wallet: &str, split_tens: SituationTally) -> OpponentSessionData {
    OpponentSessionData {
        wallet: wallet.to_string(),
        final_rank: 2,
        final_chips: 800.0,
        avg_bet: 30.0,
        hands_played: 20,
        actions: ActionCounts { hits: 8, stands: 8, doubles: 2, splits: 2 },
        patterns: PatternObservations { split_tens, ..Default::default() },
    }
}

fn make_session(id: &str, opponents: Vec<OpponentSessionData>) -> SessionResult {
    SessionResult {
        session_id: id.to_string(),
        final_rank: 1,
        total_players: 1 + opponents.len() as u32,
        final_chips: 1200.0,
        hands_won: 11,
        hands_played: 20,
        net_profit: 200.0,
        payout: 25.0,
        opponents,
        timestamp: Utc::now(),
    }
}

#[test]
fn test_six_low_cards_scenario() {
    let mut counter = CardCounter::new(CountingConfig::default());
    counter.observe_all(&cards(&["2H", "3D", "4C", "5S", "6H", "6D"]));
    assert_eq!(counter.running_count(), 6);
    assert_eq!(counter.true_count(), 0.8);
    assert_eq!(counter.recommended_bet(1000.0), 10.0);
    assert!(!counter.should_take_insurance());
}

#[test]
fn test_running_count_is_order_independent() {
    let seq = ["KH", "2D", "7C", "AS", "5H", "9D", "10C", "3S", "QH"];
    let mut forward = CardCounter::new(CountingConfig::default());
    forward.observe_all(&cards(&seq));
    let mut reversed: Vec<&str> = seq.to_vec();
    reversed.reverse();
    let mut backward = CardCounter::new(CountingConfig::default());
    backward.observe_all(&cards(&reversed));

    // +1 (2,5,3)  -1 (K,A,10,Q)
    assert_eq!(forward.running_count(), -1);
    assert_eq!(forward.running_count(), backward.running_count());
}

#[test]
fn test_true_count_zero_at_end_of_shoe() {
    let mut counter = CardCounter::new(CountingConfig { shoe_size: 52, ..CountingConfig::default() });
    let low = cards(&["2H"]);
    for _ in 0..52 {
        counter.observe_all(&low);
    }
    assert_eq!(counter.cards_dealt(), 52);
    assert_eq!(counter.true_count(), 0.0);
    // Past the end of the shoe is ignored
    counter.observe_all(&low);
    assert_eq!(counter.cards_dealt(), 52);
}

#[test]
fn test_bet_ramp_non_decreasing() {
    let mut counter = CardCounter::new(CountingConfig::default());
    let mut last = counter.recommended_bet(10_000.0);
    let low = cards(&["4S"]);
    for _ in 0..80 {
        counter.observe_all(&low);
        let bet = counter.recommended_bet(10_000.0);
        assert!(bet >= last, "bet fell from {last} to {bet} at tc {}", counter.true_count());
        last = bet;
    }
    assert_eq!(last, 100.0);
}

#[test]
fn test_sixteen_vs_seven_hits() {
    let counter = CardCounter::new(CountingConfig::default());
    let situation = GameSituation::from_hand(cards(&["10S", "6H"]), "7D".parse().unwrap(), 1000.0, 5);
    let engine = StrategyEngine::new();
    let eval = engine.evaluate(&situation);
    assert!(eval.hit > eval.stand);
    assert_eq!(engine.decide(&situation, 0.0, &counter).action, Action::Hit);
}

#[test]
fn test_history_overrides_close_call() {
    let mut coord = make_coordinator();
    let situation = GameSituation::from_hand(cards(&["10S", "6H"]), "7D".parse().unwrap(), 1000.0, 5);
    assert_eq!(coord.decide(&situation, &[]).action, Action::Hit);

    for _ in 0..5 {
        coord.record_hand(GameExperience {
            session_id: String::new(),
            player_total: 16,
            is_soft: false,
            dealer_upcard: Rank::Seven,
            action: Action::Hit,
            bet_size: 10.0,
            result: HandResult::Loss,
            chips_won: -50.0,
            opponents: Vec::new(),
            timestamp: Utc::now(),
        });
    }
    assert_eq!(coord.decide(&situation, &[]).action, Action::Stand);
}

#[test]
fn test_splits_tens_tag_added_then_dropped() {
    let mut coord = make_coordinator();
    coord.record_session(make_session("s1", vec![make_opponent("0xten", SituationTally::new(4, 1))]));
    let profile = coord.memory().memory().opponents.get("0xten").unwrap();
    assert!(profile.has_weakness(Weakness::SplitsTens));
    assert!(profile.has_weakness(Weakness::PoorStrategy));

    // 1 of 44 overall ≈ 0.023
    coord.record_session(make_session("s2", vec![make_opponent("0xten", SituationTally::new(40, 0))]));
    let profile = coord.memory().memory().opponents.get("0xten").unwrap();
    assert!(!profile.has_weakness(Weakness::SplitsTens));
    assert!(!profile.has_weakness(Weakness::PoorStrategy));
    assert_eq!(profile.sessions_played, 2);
    assert_eq!(profile.wins_against, 2);
}

#[test]
fn test_weak_table_raises_wager() {
    let mut coord = make_coordinator();
    coord.record_session(make_session("s1", vec![make_opponent("0xfish", SituationTally::new(3, 3))]));

    let situation = GameSituation::from_hand(cards(&["10S", "9H"]), "6D".parse().unwrap(), 1000.0, 5);
    let plain = coord.decide(&situation, &[]);
    let vs_fish = coord.decide(&situation, &["0xfish".to_string()]);
    assert_eq!(plain.action, Action::Stand);
    assert_eq!(plain.bet_size, Some(10.0));
    assert!((vs_fish.bet_size.unwrap() - 12.0).abs() < 1e-9);
    assert_eq!(vs_fish.action, plain.action);
}
