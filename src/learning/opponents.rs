//! Opponent profiler.
//!
//! One profile per opponent wallet, created on first encounter and updated
//! once per completed session. Running averages use the incremental mean
//! `new = (old·n + x)/(n+1)`; derived scores and weakness tags are
//! recomputed from scratch after every update.

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

use crate::types::{Action, OpponentSessionData, PatternObservations, SessionResult};

/// Average bet that maps to a full bet-size aggression component.
const AGGRESSION_BET_CAP: f64 = 75.0;

/// Placeholder until per-session bet variance is tracked.
pub const DEFAULT_CONSISTENCY: f64 = 0.7;

const BASE_SKILL: f64 = 0.5;
const POOR_AVG_RANK: f64 = 3.0;

// ---------------------------------------------------------------------------
// Profile types
// ---------------------------------------------------------------------------

/// Exploitable tendencies, recomputed on every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weakness {
    OverlyAggressive,
    OverlyConservative,
    PoorStrategy,
    SplitsTens,
    MissesDoubleOpportunities,
    RarelyDoubles,
}

impl fmt::Display for Weakness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Weakness::OverlyAggressive => "overly_aggressive",
            Weakness::OverlyConservative => "overly_conservative",
            Weakness::PoorStrategy => "poor_strategy",
            Weakness::SplitsTens => "splits_tens",
            Weakness::MissesDoubleOpportunities => "misses_double_opportunities",
            Weakness::RarelyDoubles => "rarely_doubles",
        };
        write!(f, "{tag}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentStats {
    pub avg_bet_size: f64,
    pub avg_final_rank: f64,
    pub avg_final_chips: f64,
    pub hit_frequency: f64,
    pub stand_frequency: f64,
    pub double_frequency: f64,
    pub split_frequency: f64,
    pub aggression_score: f64,
    pub skill_score: f64,
    pub consistency_score: f64,
}

impl Default for OpponentStats {
    fn default() -> Self {
        Self {
            avg_bet_size: 0.0,
            avg_final_rank: 0.0,
            avg_final_chips: 0.0,
            hit_frequency: 0.0,
            stand_frequency: 0.0,
            double_frequency: 0.0,
            split_frequency: 0.0,
            aggression_score: 0.5,
            skill_score: BASE_SKILL,
            consistency_score: DEFAULT_CONSISTENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentProfile {
    pub wallet: String,
    pub sessions_played: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Sessions where we finished ahead of this opponent.
    pub wins_against: u32,
    pub losses_against: u32,
    /// Total actions observed across all sessions.
    pub actions_observed: u64,
    pub stats: OpponentStats,
    /// Cumulative tallies; rates are derived on demand.
    pub patterns: PatternObservations,
    pub weaknesses: BTreeSet<Weakness>,
}

impl OpponentProfile {
    pub fn new(wallet: &str, seen_at: DateTime<Utc>) -> Self {
        Self {
            wallet: wallet.to_string(),
            sessions_played: 0,
            first_seen: seen_at,
            last_seen: seen_at,
            wins_against: 0,
            losses_against: 0,
            actions_observed: 0,
            stats: OpponentStats::default(),
            patterns: PatternObservations::default(),
            weaknesses: BTreeSet::new(),
        }
    }

    /// Fold one session's observations into the profile.
    pub fn update(&mut self, data: &OpponentSessionData, our_rank: u32, at: DateTime<Utc>) {
        let n = self.sessions_played as f64;
        let mean = |old: f64, x: f64| (old * n + x) / (n + 1.0);

        let s = &mut self.stats;
        s.avg_bet_size = mean(s.avg_bet_size, data.avg_bet);
        s.avg_final_rank = mean(s.avg_final_rank, data.final_rank as f64);
        s.avg_final_chips = mean(s.avg_final_chips, data.final_chips);
        s.hit_frequency = mean(s.hit_frequency, data.actions.frequency(Action::Hit));
        s.stand_frequency = mean(s.stand_frequency, data.actions.frequency(Action::Stand));
        s.double_frequency = mean(s.double_frequency, data.actions.frequency(Action::Double));
        s.split_frequency = mean(s.split_frequency, data.actions.frequency(Action::Split));

        let p = &mut self.patterns;
        p.double_on_11.merge(&data.patterns.double_on_11);
        p.split_aces.merge(&data.patterns.split_aces);
        p.hit_16_vs_7.merge(&data.patterns.hit_16_vs_7);
        p.split_tens.merge(&data.patterns.split_tens);
        p.stand_12_vs_2.merge(&data.patterns.stand_12_vs_2);

        if our_rank < data.final_rank {
            self.wins_against += 1;
        } else if our_rank > data.final_rank {
            self.losses_against += 1;
        }

        self.sessions_played += 1;
        self.actions_observed = self.actions_observed.saturating_add(data.actions.total());
        self.last_seen = at;

        self.recompute_scores();
        self.weaknesses = self.detect_weaknesses();
    }

    fn recompute_scores(&mut self) {
        let bet_component = (self.stats.avg_bet_size / AGGRESSION_BET_CAP).min(1.0);
        let double_component = (self.stats.double_frequency * 2.0).min(1.0);
        self.stats.aggression_score = ((bet_component + double_component) / 2.0).clamp(0.0, 1.0);
        self.stats.skill_score = self.skill_from_markers();
        self.stats.consistency_score = DEFAULT_CONSISTENCY;
    }

    /// Base 0.5 nudged by known strategic markers. Situations never
    /// observed contribute nothing.
    fn skill_from_markers(&self) -> f64 {
        let p = &self.patterns;
        let mut skill = BASE_SKILL;

        if p.double_on_11.rate().is_some_and(|r| r >= 0.8) {
            skill += 0.1;
        }
        if p.split_aces.rate().is_some_and(|r| r >= 0.8) {
            skill += 0.1;
        }
        if p.hit_16_vs_7.rate().is_some_and(|r| r >= 0.7) {
            skill += 0.05;
        }
        if p.split_tens.rate().is_some_and(|r| r > 0.05) {
            skill -= 0.3;
        }
        if p.stand_12_vs_2.rate().is_some_and(|r| r > 0.5) {
            skill -= 0.1;
        }
        if self.sessions_played > 0 && self.stats.avg_final_rank > POOR_AVG_RANK {
            skill -= 0.15;
        }

        skill.clamp(0.0, 1.0)
    }

    fn detect_weaknesses(&self) -> BTreeSet<Weakness> {
        let s = &self.stats;
        let p = &self.patterns;
        let mut tags = BTreeSet::new();

        if s.aggression_score > 0.75 {
            tags.insert(Weakness::OverlyAggressive);
        }
        if s.aggression_score < 0.25 {
            tags.insert(Weakness::OverlyConservative);
        }
        if s.skill_score < 0.4 {
            tags.insert(Weakness::PoorStrategy);
        }
        if p.split_tens.rate().is_some_and(|r| r > 0.05) {
            tags.insert(Weakness::SplitsTens);
        }
        if p.double_on_11.rate().is_some_and(|r| r < 0.5) {
            tags.insert(Weakness::MissesDoubleOpportunities);
        }
        if self.actions_observed > 0 && s.double_frequency < 0.05 {
            tags.insert(Weakness::RarelyDoubles);
        }
        tags
    }

    pub fn has_weakness(&self, weakness: Weakness) -> bool {
        self.weaknesses.contains(&weakness)
    }

    /// Weakness tags joined for display/export.
    pub fn weakness_tags(&self, sep: &str) -> String {
        self.weaknesses.iter().map(|w| w.to_string()).collect::<Vec<_>>().join(sep)
    }
}

impl fmt::Display for OpponentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | sessions={} W{}/L{} | bet={:.0} skill={:.2} aggr={:.2} | [{}]",
            self.wallet,
            self.sessions_played,
            self.wins_against,
            self.losses_against,
            self.stats.avg_bet_size,
            self.stats.skill_score,
            self.stats.aggression_score,
            self.weakness_tags(", "),
        )
    }
}

// ---------------------------------------------------------------------------
// Profiler
// ---------------------------------------------------------------------------

/// Keyed table of opponent profiles. Persisted as a list sorted by wallet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpponentProfiler {
    profiles: HashMap<String, OpponentProfile>,
}

impl OpponentProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update every opponent in a completed session. Returns the wallets touched.
    /// A wallet listed more than once counts once; its first entry is used.
    pub fn update_from_session(&mut self, session: &SessionResult) -> Vec<String> {
        let mut touched = Vec::with_capacity(session.opponents.len());
        let mut seen = HashSet::with_capacity(session.opponents.len());
        for data in &session.opponents {
            if !seen.insert(data.wallet.as_str()) {
                warn!(wallet = %data.wallet, session_id = %session.session_id, "Duplicate opponent entry ignored");
                continue;
            }
            let profile = self
                .profiles
                .entry(data.wallet.clone())
                .or_insert_with(|| OpponentProfile::new(&data.wallet, session.timestamp));
            profile.update(data, session.final_rank, session.timestamp);
            debug!(
                wallet = %data.wallet,
                sessions = profile.sessions_played,
                skill = format!("{:.2}", profile.stats.skill_score),
                aggression = format!("{:.2}", profile.stats.aggression_score),
                weaknesses = %profile.weakness_tags(","),
                "Opponent profile updated"
            );
            touched.push(data.wallet.clone());
        }
        touched
    }

    pub fn get(&self, wallet: &str) -> Option<&OpponentProfile> {
        self.profiles.get(wallet)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profiles sorted by wallet.
    pub fn sorted(&self) -> Vec<&OpponentProfile> {
        let mut list: Vec<&OpponentProfile> = self.profiles.values().collect();
        list.sort_by(|a, b| a.wallet.cmp(&b.wallet));
        list
    }

    /// Mean skill over the known opponents in `wallets`; `None` if none are known.
    pub fn average_skill(&self, wallets: &[String]) -> Option<f64> {
        self.average_of(wallets, |p| p.stats.skill_score)
    }

    pub fn average_aggression(&self, wallets: &[String]) -> Option<f64> {
        self.average_of(wallets, |p| p.stats.aggression_score)
    }

    fn average_of(&self, wallets: &[String], f: impl Fn(&OpponentProfile) -> f64) -> Option<f64> {
        let values: Vec<f64> = wallets.iter().filter_map(|w| self.profiles.get(w)).map(f).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    /// Opponents whose skill is below `threshold`, weakest first.
    pub fn exploitable(&self, threshold: f64) -> Vec<&OpponentProfile> {
        let mut weak: Vec<&OpponentProfile> = self
            .profiles
            .values()
            .filter(|p| p.stats.skill_score < threshold)
            .collect();
        weak.sort_by(|a, b| {
            a.stats
                .skill_score
                .partial_cmp(&b.stats.skill_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.wallet.cmp(&b.wallet))
        });
        weak
    }
}

impl Serialize for OpponentProfiler {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.sorted())
    }
}

impl<'de> Deserialize<'de> for OpponentProfiler {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let list = Vec::<OpponentProfile>::deserialize(deserializer)?;
        let profiles = list.into_iter().map(|p| (p.wallet.clone(), p)).collect();
        Ok(Self { profiles })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
