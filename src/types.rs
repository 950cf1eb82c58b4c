//! Shared types for the BOB agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that counting, strategy,
//! and learning modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// Card suit. Irrelevant to play but kept so observed cards round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suit::Hearts => write!(f, "H"),
            Suit::Diamonds => write!(f, "D"),
            Suit::Clubs => write!(f, "C"),
            Suit::Spades => write!(f, "S"),
        }
    }
}

impl FromStr for Suit {
    type Err = BobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "h" | "hearts" | "♥" => Ok(Suit::Hearts),
            "d" | "diamonds" | "♦" => Ok(Suit::Diamonds),
            "c" | "clubs" | "♣" => Ok(Suit::Clubs),
            "s" | "spades" | "♠" => Ok(Suit::Spades),
            _ => Err(BobError::InvalidSuit(s.to_string())),
        }
    }
}

/// Card rank. Serialized as the face label (`"2"`..`"10"`, `"J"`, `"Q"`, `"K"`, `"A"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

impl Rank {
    /// All thirteen ranks, low to high.
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// Blackjack value. Aces count 11 here; softening happens in `hand_value`.
    pub fn value(self) -> u8 {
        match self {
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
            Rank::Ace => 11,
        }
    }

    /// Hi-Lo weight: 2–6 → +1, 7–9 → 0, tens and aces → −1.
    pub fn hi_lo_weight(self) -> i32 {
        match self.value() {
            2..=6 => 1,
            7..=9 => 0,
            _ => -1,
        }
    }

    pub fn is_ace(self) -> bool {
        self == Rank::Ace
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Rank::Jack => "J".to_string(),
            Rank::Queen => "Q".to_string(),
            Rank::King => "K".to_string(),
            Rank::Ace => "A".to_string(),
            other => other.value().to_string(),
        };
        write!(f, "{label}")
    }
}

impl FromStr for Rank {
    type Err = BobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "2" => Ok(Rank::Two),
            "3" => Ok(Rank::Three),
            "4" => Ok(Rank::Four),
            "5" => Ok(Rank::Five),
            "6" => Ok(Rank::Six),
            "7" => Ok(Rank::Seven),
            "8" => Ok(Rank::Eight),
            "9" => Ok(Rank::Nine),
            "10" | "T" => Ok(Rank::Ten),
            "J" | "JACK" => Ok(Rank::Jack),
            "Q" | "QUEEN" => Ok(Rank::Queen),
            "K" | "KING" => Ok(Rank::King),
            "A" | "ACE" => Ok(Rank::Ace),
            _ => Err(BobError::InvalidRank(s.to_string())),
        }
    }
}

/// A single playing card. Immutable value object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { suit, rank }
    }

    pub fn value(&self) -> u8 {
        self.rank.value()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// Parse compact notation: rank followed by a one-character suit (`"10H"`, `"AS"`, `"7♣"`).
impl FromStr for Card {
    type Err = BobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let suit_char = s
            .chars()
            .last()
            .ok_or_else(|| BobError::InvalidCard(s.to_string()))?;
        let rank_part = &s[..s.len() - suit_char.len_utf8()];
        if rank_part.is_empty() {
            return Err(BobError::InvalidCard(s.to_string()));
        }
        let rank: Rank = rank_part.parse()?;
        let suit: Suit = suit_char.to_string().parse()?;
        Ok(Card::new(rank, suit))
    }
}

/// Best blackjack total for a set of cards and whether an ace still counts 11.
pub fn hand_value(cards: &[Card]) -> (u8, bool) {
    let mut total: u32 = 0;
    let mut soft_aces = 0u32;
    for card in cards {
        total += u32::from(card.value());
        if card.rank.is_ace() {
            soft_aces += 1;
        }
    }
    while total > 21 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    (total.min(u32::from(u8::MAX)) as u8, soft_aces > 0)
}

// ---------------------------------------------------------------------------
// Decision types
// ---------------------------------------------------------------------------

/// A playing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Hit,
    Stand,
    Double,
    Split,
}

impl Action {
    /// Tie-break priority: when two actions have the same adjusted EV the
    /// one listed first wins.
    pub const PRIORITY: [Action; 4] = [Action::Stand, Action::Hit, Action::Double, Action::Split];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Hit => write!(f, "hit"),
            Action::Stand => write!(f, "stand"),
            Action::Double => write!(f, "double"),
            Action::Split => write!(f, "split"),
        }
    }
}

impl FromStr for Action {
    type Err = BobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hit" => Ok(Action::Hit),
            "stand" => Ok(Action::Stand),
            "double" | "double_down" => Ok(Action::Double),
            "split" => Ok(Action::Split),
            _ => Err(BobError::InvalidAction(s.to_string())),
        }
    }
}

/// Snapshot of a decision point. Owned by the caller; never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSituation {
    pub player_hand: Vec<Card>,
    pub player_total: u8,
    pub is_soft: bool,
    pub dealer_upcard: Card,
    pub chips: f64,
    pub can_double: bool,
    pub can_split: bool,
    pub hands_remaining: u32,
}

impl GameSituation {
    /// Build a situation from raw cards, deriving total, softness and
    /// double/split eligibility (both require exactly two cards).
    pub fn from_hand(player_hand: Vec<Card>, dealer_upcard: Card, chips: f64, hands_remaining: u32) -> Self {
        let (player_total, is_soft) = hand_value(&player_hand);
        let two_cards = player_hand.len() == 2;
        let can_split = two_cards && player_hand[0].value() == player_hand[1].value();
        Self {
            player_hand,
            player_total,
            is_soft,
            dealer_upcard,
            chips,
            can_double: two_cards,
            can_split,
            hands_remaining,
        }
    }

    /// The pair rank when the hand is a splittable pair.
    pub fn pair_rank(&self) -> Option<Rank> {
        if self.player_hand.len() == 2 && self.player_hand[0].value() == self.player_hand[1].value() {
            Some(self.player_hand[0].rank)
        } else {
            None
        }
    }
}

impl fmt::Display for GameSituation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cards: Vec<String> = self.player_hand.iter().map(|c| c.to_string()).collect();
        write!(
            f,
            "[{}] {}{} vs {} (chips={:.0})",
            cards.join(" "),
            if self.is_soft { "soft " } else { "" },
            self.player_total,
            self.dealer_upcard,
            self.chips,
        )
    }
}

/// The engine's answer for one decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotDecision {
    pub action: Action,
    /// 0–1, widens with the gap between the best and second-best EV.
    pub confidence: f64,
    /// EV per unit wagered after all adjustments.
    pub expected_value: f64,
    pub bet_size: Option<f64>,
}

impl fmt::Display for BotDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | EV={:+.4} conf={:.0}%",
            self.action,
            self.expected_value,
            self.confidence * 100.0,
        )?;
        if let Some(bet) = self.bet_size {
            write!(f, " bet={bet:.0}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Outcome records
// ---------------------------------------------------------------------------

/// Outcome of a resolved hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandResult {
    Win,
    Loss,
    Push,
}

/// One fully resolved hand. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameExperience {
    pub session_id: String,
    pub player_total: u8,
    pub is_soft: bool,
    pub dealer_upcard: Rank,
    pub action: Action,
    pub bet_size: f64,
    pub result: HandResult,
    /// Net chips won on the hand (negative on a loss).
    pub chips_won: f64,
    /// Wallet identifiers of the other players at the table.
    pub opponents: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Observed opportunities for a strategic situation and how often the
/// player took the marked action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SituationTally {
    pub opportunities: u32,
    pub taken: u32,
}

impl SituationTally {
    pub fn new(opportunities: u32, taken: u32) -> Self {
        Self { opportunities, taken: taken.min(opportunities) }
    }

    /// Observed frequency, or `None` if the situation never came up.
    pub fn rate(&self) -> Option<f64> {
        if self.opportunities == 0 {
            None
        } else {
            Some(self.taken as f64 / self.opportunities as f64)
        }
    }

    pub fn merge(&mut self, other: &SituationTally) {
        self.opportunities = self.opportunities.saturating_add(other.opportunities);
        self.taken = self
            .taken
            .saturating_add(other.taken.min(other.opportunities))
            .min(self.opportunities);
    }
}

/// Per-action counts for one player over one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionCounts {
    pub hits: u32,
    pub stands: u32,
    pub doubles: u32,
    pub splits: u32,
}

impl ActionCounts {
    /// Widened so caller-supplied counts cannot overflow.
    pub fn total(&self) -> u64 {
        [self.hits, self.stands, self.doubles, self.splits]
            .iter()
            .map(|&n| u64::from(n))
            .sum()
    }

    /// Fraction of actions that were `action`; 0 when nothing was observed.
    pub fn frequency(&self, action: Action) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let n = match action {
            Action::Hit => self.hits,
            Action::Stand => self.stands,
            Action::Double => self.doubles,
            Action::Split => self.splits,
        };
        n as f64 / total as f64
    }
}

/// Strategic situations tracked for opponent skill estimation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternObservations {
    pub double_on_11: SituationTally,
    pub split_aces: SituationTally,
    pub hit_16_vs_7: SituationTally,
    pub split_tens: SituationTally,
    pub stand_12_vs_2: SituationTally,
}

/// One opponent's aggregated behavior within a single session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentSessionData {
    pub wallet: String,
    pub final_rank: u32,
    pub final_chips: f64,
    pub avg_bet: f64,
    pub hands_played: u32,
    pub actions: ActionCounts,
    #[serde(default)]
    pub patterns: PatternObservations,
}

/// One completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub final_rank: u32,
    pub total_players: u32,
    pub final_chips: f64,
    pub hands_won: u32,
    pub hands_played: u32,
    pub net_profit: f64,
    pub payout: f64,
    pub opponents: Vec<OpponentSessionData>,
    pub timestamp: DateTime<Utc>,
}

impl SessionResult {
    pub fn is_win(&self) -> bool {
        self.final_rank == 1
    }
}

impl fmt::Display for SessionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session {}: rank {}/{} chips={:.0} hands={}/{} profit={:+.2}",
            self.session_id,
            self.final_rank,
            self.total_players,
            self.final_chips,
            self.hands_won,
            self.hands_played,
            self.net_profit,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for BOB.
#[derive(Debug, thiserror::Error)]
pub enum BobError {
    #[error("Invalid card: {0}")]
    InvalidCard(String),

    #[error("Invalid rank: {0}")]
    InvalidRank(String),

    #[error("Invalid suit: {0}")]
    InvalidSuit(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
