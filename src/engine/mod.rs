//! Engine bridge — turns protocol events into coordinator calls.
//!
//! `Bridge::handle` is synchronous and total: every event yields exactly
//! one response, malformed input included. `run` drives it over async
//! line streams until EOF or the shutdown future resolves, then saves.

pub mod protocol;

use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::dashboard::routes::{AppState, Snapshot};
use crate::learning::LearningCoordinator;
use crate::storage::export;
use crate::types::GameSituation;
use protocol::{parse_cards, parse_upcard, Event, Response};

/// How much dashboard state an event invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Refresh {
    None,
    Count,
    Full,
}

impl Refresh {
    fn after(event: &Event) -> Self {
        match event {
            Event::Card { .. } => Refresh::Count,
            Event::NewShoe { .. } | Event::Hand(_) | Event::Session(_) => Refresh::Full,
            Event::Decide(_) | Event::Insurance | Event::Insights { .. } | Event::Export { .. } => Refresh::None,
        }
    }
}

pub struct Bridge {
    coordinator: LearningCoordinator,
    export_dir: PathBuf,
    dashboard: Option<AppState>,
    refresh: Refresh,
    events_handled: u64,
}

impl Bridge {
    pub fn new(coordinator: LearningCoordinator, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            coordinator,
            export_dir: export_dir.into(),
            dashboard: None,
            refresh: Refresh::Full,
            events_handled: 0,
        }
    }

    /// Publish snapshots to a dashboard after events that change state.
    pub fn with_dashboard(mut self, state: AppState) -> Self {
        self.dashboard = Some(state);
        self
    }

    pub fn coordinator(&self) -> &LearningCoordinator {
        &self.coordinator
    }

    pub fn events_handled(&self) -> u64 {
        self.events_handled
    }

    /// Parse and handle one input line. Blank lines yield nothing.
    pub fn handle_line(&mut self, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let response = match serde_json::from_str::<Event>(line) {
            Ok(event) => self.handle(event),
            Err(e) => {
                warn!(error = %e, "Malformed event line");
                Response::Error {
                    event: None,
                    message: format!("malformed event: {e}"),
                }
            }
        };
        Some(response)
    }

    pub fn handle(&mut self, event: Event) -> Response {
        let name = event.name();
        let refresh = Refresh::after(&event);
        self.events_handled += 1;
        match self.dispatch(event) {
            Ok(response) => {
                self.refresh = self.refresh.max(refresh);
                response
            }
            Err(e) => {
                warn!(event = name, error = %format!("{e:#}"), "Event rejected");
                Response::Error {
                    event: Some(name.to_string()),
                    message: format!("{e:#}"),
                }
            }
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<Response> {
        let coord = &mut self.coordinator;
        let response = match event {
            Event::NewShoe { session_id: Some(id) } => {
                coord.start_session(Some(id));
                Response::Count(coord.counter().status())
            }
            Event::NewShoe { session_id: None } => {
                coord.new_shoe();
                Response::Count(coord.counter().status())
            }
            Event::Card { cards } => {
                let cards = parse_cards(&cards)?;
                coord.observe_cards(&cards);
                Response::Count(coord.counter().status())
            }
            Event::Decide(req) => {
                let hand = parse_cards(&req.hand)?;
                if hand.is_empty() {
                    anyhow::bail!("decide needs at least one player card");
                }
                let upcard = parse_upcard(&req.dealer)?;
                let situation = GameSituation::from_hand(hand, upcard, req.chips, req.hands_remaining);
                let decision = coord.decide(&situation, &req.opponents);
                info!(situation = %situation, decision = %decision, "Decision");
                Response::Decision(decision)
            }
            Event::Insurance => Response::Insurance {
                take: coord.should_take_insurance(),
                true_count: coord.counter().true_count(),
            },
            Event::Hand(report) => {
                coord.record_hand(report.into_experience()?);
                Response::Recorded {
                    hands: coord.memory().memory().experience.hands().len(),
                }
            }
            Event::Session(report) => match coord.record_session(report.into()) {
                Some(insights) => Response::Insights(insights),
                None => Response::Recorded {
                    hands: coord.memory().memory().experience.hands().len(),
                },
            },
            Event::Insights { session_id } => {
                let id = session_id.unwrap_or_else(|| coord.session_id().to_string());
                Response::Insights(coord.insights(&id))
            }
            Event::Export { dir } => {
                let dir = dir.unwrap_or_else(|| self.export_dir.clone());
                let (sessions, opponents) = self.export_to(&dir)?;
                Response::Exported { sessions, opponents }
            }
        };
        Ok(response)
    }

    /// Write both CSV tables into `dir`.
    pub fn export_to(&self, dir: &std::path::Path) -> Result<(String, String)> {
        let memory = self.coordinator.memory().memory();
        let (sessions, opponents) = export::export_all(dir, memory.experience.sessions().iter(), &memory.opponents)
            .with_context(|| format!("Export to {} failed", dir.display()))?;
        Ok((sessions.display().to_string(), opponents.display().to_string()))
    }

    /// Push whatever changed since the last publish to the dashboard, if
    /// one is attached. Card events only refresh the count.
    pub async fn publish(&mut self) {
        let refresh = std::mem::replace(&mut self.refresh, Refresh::None);
        let Some(state) = &self.dashboard else {
            return;
        };
        match refresh {
            Refresh::None => {}
            Refresh::Count => state.apply_count(self.coordinator.counter().status()).await,
            Refresh::Full => state.apply(Snapshot::capture(&self.coordinator)).await,
        }
    }

    /// Final save. Returns whether memory is durably stored.
    pub fn shutdown(&mut self) -> bool {
        let saved = self.coordinator.save();
        let counters = &self.coordinator.memory().memory().counters;
        info!(
            events = self.events_handled,
            saved,
            total_sessions = counters.total_sessions,
            total_hands = counters.total_hands,
            total_profit = format!("{:+.2}", counters.total_profit),
            "Bridge shut down"
        );
        saved
    }
}

/// Serve events from `input`, writing one JSON response line per event,
/// until EOF or `shutdown` resolves. Memory is saved on the way out.
pub async fn run<R, W, S>(bridge: &mut Bridge, input: R, mut output: W, shutdown: S) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);
    bridge.publish().await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read event line")? else {
                    info!("Input closed");
                    break;
                };
                if let Some(response) = bridge.handle_line(&line) {
                    let mut json = serde_json::to_string(&response).context("Failed to encode response")?;
                    json.push('\n');
                    output.write_all(json.as_bytes()).await.context("Failed to write response")?;
                    output.flush().await.context("Failed to flush response")?;
                    bridge.publish().await;
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    debug!(events = bridge.events_handled(), "Event loop finished");
    bridge.shutdown();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counting::CountingConfig;
    use crate::learning::LearningConfig;
    use crate::storage::MemoryManager;
    use crate::types::Action;

    fn make_bridge() -> Bridge {
        let coordinator = LearningCoordinator::new(
            CountingConfig::default(),
            LearningConfig::default(),
            MemoryManager::ephemeral(),
        );
        let mut dir = std::env::temp_dir();
        dir.push(format!("bob_bridge_{}", uuid::Uuid::new_v4()));
        Bridge::new(coordinator, dir)
    }

    #[test]
    fn test_card_event_updates_count() {
        let mut bridge = make_bridge();
        let resp = bridge
            .handle_line(r#"{"event":"card","cards":["2H","3D","4C","5S","6H","6D"]}"#)
            .unwrap();
        match resp {
            Response::Count(status) => {
                assert_eq!(status.running_count, 6);
                assert_eq!(status.cards_dealt, 6);
                assert_eq!(status.true_count, 0.8);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_decide_event() {
        let mut bridge = make_bridge();
        let resp = bridge
            .handle_line(r#"{"event":"decide","hand":["10H","6D"],"dealer":"7C","chips":1000}"#)
            .unwrap();
        let Response::Decision(decision) = resp else {
            panic!("expected a decision");
        };
        assert_eq!(decision.action, Action::Hit);
        assert_eq!(decision.bet_size, Some(10.0));
    }

    #[test]
    fn test_bad_card_is_an_error_response() {
        let mut bridge = make_bridge();
        let resp = bridge.handle_line(r#"{"event":"card","cards":["1X"]}"#).unwrap();
        match resp {
            Response::Error { event, message } => {
                assert_eq!(event.as_deref(), Some("card"));
                assert!(message.contains("Invalid rank"));
            }
            other => panic!("unexpected response {other:?}"),
        }
        assert_eq!(bridge.coordinator().counter().cards_dealt(), 0);
    }

    #[test]
    fn test_malformed_line_and_blank_line() {
        let mut bridge = make_bridge();
        assert!(bridge.handle_line("   ").is_none());
        assert!(matches!(
            bridge.handle_line("{not json").unwrap(),
            Response::Error { event: None, .. }
        ));
    }

    #[test]
    fn test_session_event_returns_insights() {
        let mut bridge = make_bridge();
        bridge.handle_line(r#"{"event":"new_shoe","session_id":"table-7"}"#);
        bridge.handle_line(
            r#"{"event":"hand","player_total":20,"dealer_upcard":"6","action":"stand","bet_size":10,"result":"win","chips_won":10}"#,
        );
        let resp = bridge
            .handle_line(
                r#"{"event":"session","final_rank":1,"total_players":3,"final_chips":1010,
                    "hands_won":1,"hands_played":1,"net_profit":10}"#,
            )
            .unwrap();
        let Response::Insights(insights) = resp else {
            panic!("expected insights");
        };
        assert_eq!(insights.session_id, "table-7");
        assert_eq!(insights.best_hand.unwrap().chips_won, 10.0);
        assert_eq!(bridge.coordinator().memory().memory().counters.total_sessions, 1);
    }

    #[test]
    fn test_session_with_huge_counts_still_answers() {
        let mut bridge = make_bridge();
        let line = r#"{"event":"session","final_rank":1,"total_players":2,"final_chips":1000,
            "hands_won":0,"hands_played":0,"net_profit":0,
            "opponents":[{"wallet":"0xbig","final_rank":2,"final_chips":900,"avg_bet":10,"hands_played":1,
                "actions":{"hits":4294967295,"stands":1,"doubles":0,"splits":0},
                "patterns":{"split_tens":{"opportunities":4294967295,"taken":4294967295}}}]}"#;
        assert!(matches!(bridge.handle_line(line).unwrap(), Response::Insights(_)));
        assert!(matches!(bridge.handle_line(line).unwrap(), Response::Insights(_)));

        let profile = bridge.coordinator().memory().memory().opponents.get("0xbig").unwrap();
        assert_eq!(profile.sessions_played, 2);
        assert_eq!(profile.actions_observed, 2 * (u64::from(u32::MAX) + 1));
        assert_eq!(profile.patterns.split_tens.opportunities, u32::MAX);
    }

    #[test]
    fn test_export_event_writes_files() {
        let mut bridge = make_bridge();
        let resp = bridge.handle_line(r#"{"event":"export"}"#).unwrap();
        let Response::Exported { sessions, opponents } = resp else {
            panic!("expected export paths");
        };
        assert!(std::path::Path::new(&sessions).exists());
        assert!(std::path::Path::new(&opponents).exists());
        std::fs::remove_dir_all(&bridge.export_dir).unwrap();
    }

    #[tokio::test]
    async fn test_dashboard_refresh_follows_event_kind() {
        let state = std::sync::Arc::new(crate::dashboard::routes::DashboardState::new("BOB-TEST"));
        let mut bridge = make_bridge().with_dashboard(state.clone());
        bridge.handle_line(r#"{"event":"new_shoe","session_id":"t1"}"#);
        bridge.publish().await;
        assert!(state.insights.read().await.is_some());
        *state.insights.write().await = None;

        bridge.handle_line(r#"{"event":"card","cards":["KH","2D","5C"]}"#);
        bridge.publish().await;
        assert_eq!(state.status.read().await.count.as_ref().unwrap().cards_dealt, 3);
        assert!(state.insights.read().await.is_none());

        // Failed events change nothing
        bridge.handle_line(r#"{"event":"card","cards":["ZZ"]}"#);
        bridge.handle_line(r#"{"event":"insurance"}"#);
        bridge.publish().await;
        assert!(state.insights.read().await.is_none());

        bridge.handle_line(
            r#"{"event":"session","final_rank":2,"total_players":3,"final_chips":900,
                "hands_won":2,"hands_played":6,"net_profit":-100}"#,
        );
        bridge.publish().await;
        assert!(state.insights.read().await.is_some());
        assert_eq!(state.sessions.read().await.len(), 1);
        assert_eq!(state.status.read().await.counters.total_sessions, 1);
    }

    #[tokio::test]
    async fn test_run_until_eof() {
        let mut bridge = make_bridge();
        let input = b"{\"event\":\"card\",\"cards\":[\"KH\"]}\n\n{\"event\":\"insurance\"}\n".to_vec();
        let mut output = Vec::new();
        run(&mut bridge, &input[..], &mut output, std::future::pending()).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "count");
        assert_eq!(lines[0]["running_count"], -1);
        assert_eq!(lines[1]["type"], "insurance");
        assert_eq!(lines[1]["take"], false);
        assert_eq!(bridge.events_handled(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut bridge = make_bridge();
        let (_tx, rx) = tokio::io::duplex(64);
        let reader = tokio::io::BufReader::new(rx);
        let mut output = Vec::new();
        run(&mut bridge, reader, &mut output, async {}).await.unwrap();
        assert!(output.is_empty());
    }
}
