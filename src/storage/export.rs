//! CSV exports for offline analysis.
//!
//! One row per recorded session and one row per opponent profile.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::learning::opponents::{OpponentProfile, OpponentProfiler};
use crate::types::SessionResult;

pub const SESSIONS_FILE: &str = "sessions.csv";
pub const OPPONENTS_FILE: &str = "opponents.csv";

#[derive(Debug, Serialize)]
struct SessionRow<'a> {
    id: &'a str,
    rank: u32,
    players: u32,
    chips: f64,
    hands_played: u32,
    hands_won: u32,
    net_profit: f64,
    payout: f64,
    timestamp: String,
}

impl<'a> From<&'a SessionResult> for SessionRow<'a> {
    fn from(s: &'a SessionResult) -> Self {
        Self {
            id: &s.session_id,
            rank: s.final_rank,
            players: s.total_players,
            chips: s.final_chips,
            hands_played: s.hands_played,
            hands_won: s.hands_won,
            net_profit: s.net_profit,
            payout: s.payout,
            timestamp: s.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OpponentRow<'a> {
    id: &'a str,
    sessions: u32,
    wins_against: u32,
    losses_against: u32,
    avg_bet: f64,
    skill: f64,
    aggression: f64,
    weaknesses: String,
}

impl<'a> From<&'a OpponentProfile> for OpponentRow<'a> {
    fn from(p: &'a OpponentProfile) -> Self {
        Self {
            id: &p.wallet,
            sessions: p.sessions_played,
            wins_against: p.wins_against,
            losses_against: p.losses_against,
            avg_bet: p.stats.avg_bet_size,
            skill: p.stats.skill_score,
            aggression: p.stats.aggression_score,
            weaknesses: p.weakness_tags(";"),
        }
    }
}

fn writer_for(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create export directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Write one row per session, oldest first. Returns the row count.
pub fn export_sessions<'a>(
    path: &Path,
    sessions: impl IntoIterator<Item = &'a SessionResult>,
) -> Result<usize> {
    let mut writer = writer_for(path)?;
    let mut rows = 0;
    for session in sessions {
        writer
            .serialize(SessionRow::from(session))
            .with_context(|| format!("Failed to write session row to {}", path.display()))?;
        rows += 1;
    }
    if rows == 0 {
        writer.write_record([
            "id", "rank", "players", "chips", "hands_played", "hands_won", "net_profit", "payout", "timestamp",
        ])?;
    }
    writer.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(rows)
}

/// Write one row per opponent profile, sorted by wallet. Returns the row count.
pub fn export_opponents(path: &Path, profiler: &OpponentProfiler) -> Result<usize> {
    let mut writer = writer_for(path)?;
    let profiles = profiler.sorted();
    for profile in &profiles {
        writer
            .serialize(OpponentRow::from(*profile))
            .with_context(|| format!("Failed to write opponent row to {}", path.display()))?;
    }
    if profiles.is_empty() {
        writer.write_record([
            "id", "sessions", "wins_against", "losses_against", "avg_bet", "skill", "aggression", "weaknesses",
        ])?;
    }
    writer.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(profiles.len())
}

/// Export both tables into `dir`. Returns the two file paths.
pub fn export_all<'a>(
    dir: &Path,
    sessions: impl IntoIterator<Item = &'a SessionResult>,
    profiler: &OpponentProfiler,
) -> Result<(PathBuf, PathBuf)> {
    let sessions_path = dir.join(SESSIONS_FILE);
    let opponents_path = dir.join(OPPONENTS_FILE);
    let session_rows = export_sessions(&sessions_path, sessions)?;
    let opponent_rows = export_opponents(&opponents_path, profiler)?;
    info!(
        dir = %dir.display(),
        sessions = session_rows,
        opponents = opponent_rows,
        "CSV export complete"
    );
    Ok((sessions_path, opponents_path))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
