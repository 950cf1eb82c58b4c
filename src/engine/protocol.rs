//! JSON-lines wire format between a game poller and the decision core.
//!
//! One event object per input line, tagged by `"event"`; one response
//! object per output line, tagged by `"type"`. Cards travel in compact
//! notation (`"10H"`, `"AS"`); an upcard may be given as a bare rank.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::counting::CountStatus;
use crate::learning::insights::SessionInsights;
use crate::types::{
    Action, BobError, BotDecision, Card, GameExperience, HandResult, OpponentSessionData, Rank, SessionResult, Suit,
};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Fresh shoe. With a session id, also starts a new session.
    NewShoe {
        #[serde(default)]
        session_id: Option<String>,
    },
    /// Cards seen on the table (any player, any order).
    Card { cards: Vec<String> },
    Decide(DecideRequest),
    Insurance,
    Hand(HandReport),
    Session(SessionReport),
    Insights {
        #[serde(default)]
        session_id: Option<String>,
    },
    Export {
        #[serde(default)]
        dir: Option<PathBuf>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::NewShoe { .. } => "new_shoe",
            Event::Card { .. } => "card",
            Event::Decide(_) => "decide",
            Event::Insurance => "insurance",
            Event::Hand(_) => "hand",
            Event::Session(_) => "session",
            Event::Insights { .. } => "insights",
            Event::Export { .. } => "export",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecideRequest {
    pub hand: Vec<String>,
    pub dealer: String,
    pub chips: f64,
    #[serde(default)]
    pub hands_remaining: u32,
    #[serde(default)]
    pub opponents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HandReport {
    #[serde(default)]
    pub session_id: Option<String>,
    pub player_total: u8,
    #[serde(default)]
    pub is_soft: bool,
    pub dealer_upcard: String,
    pub action: Action,
    pub bet_size: f64,
    pub result: HandResult,
    pub chips_won: f64,
    #[serde(default)]
    pub opponents: Vec<String>,
}

impl HandReport {
    pub fn into_experience(self) -> Result<GameExperience, BobError> {
        let upcard = parse_upcard(&self.dealer_upcard)?;
        Ok(GameExperience {
            session_id: self.session_id.unwrap_or_default(),
            player_total: self.player_total,
            is_soft: self.is_soft,
            dealer_upcard: upcard.rank,
            action: self.action,
            bet_size: self.bet_size,
            result: self.result,
            chips_won: self.chips_won,
            opponents: self.opponents,
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionReport {
    #[serde(default)]
    pub session_id: Option<String>,
    pub final_rank: u32,
    pub total_players: u32,
    pub final_chips: f64,
    pub hands_won: u32,
    pub hands_played: u32,
    pub net_profit: f64,
    #[serde(default)]
    pub payout: f64,
    #[serde(default)]
    pub opponents: Vec<OpponentSessionData>,
}

impl From<SessionReport> for SessionResult {
    fn from(r: SessionReport) -> Self {
        SessionResult {
            session_id: r.session_id.unwrap_or_default(),
            final_rank: r.final_rank,
            total_players: r.total_players,
            final_chips: r.final_chips,
            hands_won: r.hands_won,
            hands_played: r.hands_played,
            net_profit: r.net_profit,
            payout: r.payout,
            opponents: r.opponents,
            timestamp: Utc::now(),
        }
    }
}

/// A full card, or a bare rank (suit is irrelevant to the upcard's EV).
pub fn parse_upcard(s: &str) -> Result<Card, BobError> {
    match s.parse::<Card>() {
        Ok(card) => Ok(card),
        Err(card_err) => s
            .parse::<Rank>()
            .map(|rank| Card::new(rank, Suit::Spades))
            .map_err(|_| card_err),
    }
}

pub fn parse_cards(cards: &[String]) -> Result<Vec<Card>, BobError> {
    cards.iter().map(|c| c.parse()).collect()
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Count(CountStatus),
    Decision(BotDecision),
    Insurance { take: bool, true_count: f64 },
    Recorded { hands: usize },
    Insights(SessionInsights),
    Exported { sessions: String, opponents: String },
    Error { event: Option<String>, message: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
