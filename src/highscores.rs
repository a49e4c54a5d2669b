//! High score leaderboard system
//!
//! Ranks finished sessions by maximum stack height against every score ever
//! recorded, and shows the top 10. Players are matched by name ignoring case.
//! Persisted to LocalStorage.

use serde::{Deserialize, Serialize};

use crate::sim::cues::{ScoreError, ScoreReporter, ScoreSubmission};

/// Maximum number of high scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// Longest player name kept, in characters
pub const MAX_PLAYER_NAME_LEN: usize = 50;

/// Trim a player name and cap its length. Blank names are rejected.
pub fn normalize_player_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_PLAYER_NAME_LEN).collect())
}

/// A registered player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: u32,
    pub name: String,
}

/// A single high score entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighScoreEntry {
    #[serde(default)]
    pub player_name: String,
    /// Maximum stack height in pixels
    pub height: u32,
    pub blocks_stacked: u32,
    /// Unix timestamp (ms) when achieved
    pub timestamp: f64,
}

/// High score leaderboard
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighScores {
    /// Top entries, sorted by height, highest first
    pub entries: Vec<HighScoreEntry>,
    /// Every recorded height, highest first; ranks are counted here
    #[serde(default)]
    history: Vec<u32>,
    #[serde(default)]
    players: Vec<Player>,
}

impl HighScores {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "snowball_stacker_highscores";

    /// Create empty leaderboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a player by name, ignoring case, or register a new one.
    ///
    /// Returns `None` for a blank name. An existing player keeps the
    /// spelling they registered with.
    pub fn register_player(&mut self, raw_name: &str) -> Option<Player> {
        let name = normalize_player_name(raw_name)?;
        let key = name.to_lowercase();
        if let Some(player) = self.players.iter().find(|p| p.name.to_lowercase() == key) {
            return Some(player.clone());
        }

        let id = self.players.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let player = Player { id, name };
        log::info!("Registered player {:?} (#{})", player.name, player.id);
        self.players.push(player.clone());
        Some(player)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Rank a height would get (1-indexed) among every recorded score: one
    /// more than the number of strictly higher scores, so ties share a rank
    pub fn rank_of(&self, height: u32) -> u32 {
        1 + self.history.iter().take_while(|&&h| h > height).count() as u32
    }

    /// Record a finished session and return its rank.
    ///
    /// The rank counts every recorded score, including those that fell out
    /// of the top 10.
    pub fn add_score(
        &mut self,
        player_name: &str,
        height: u32,
        blocks_stacked: u32,
        timestamp: f64,
    ) -> u32 {
        let rank = self.rank_of(height);
        let pos = self.history.partition_point(|&h| h >= height);
        self.history.insert(pos, height);

        let entry = HighScoreEntry {
            player_name: player_name.to_string(),
            height,
            blocks_stacked,
            timestamp,
        };

        // Equal heights keep their earlier entry first
        let pos = self
            .entries
            .iter()
            .position(|e| height > e.height)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, entry);
        self.entries.truncate(MAX_HIGH_SCORES);

        rank
    }

    /// Drop every score and player
    pub fn clear(&mut self) {
        self.entries.clear();
        self.history.clear();
        self.players.clear();
        log::info!("Leaderboard cleared");
    }

    /// Number of scores ever recorded
    pub fn total_scores(&self) -> usize {
        self.history.len()
    }

    /// Check if the leaderboard is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the best height (if any)
    pub fn top_height(&self) -> Option<u32> {
        self.entries.first().map(|e| e.height)
    }

    /// Load high scores from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY)
        {
            match serde_json::from_str::<HighScores>(&json) {
                Ok(mut scores) => {
                    scores.backfill_history();
                    log::info!("Loaded {} high scores", scores.entries.len());
                    return scores;
                }
                Err(e) => log::warn!("Discarding unreadable high scores: {}", e),
            }
        }

        log::info!("No high scores found, starting fresh");
        Self::new()
    }

    /// Save high scores to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) -> Result<(), ScoreError> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or(ScoreError::StorageUnavailable)?;

        let json = serde_json::to_string(self)?;
        storage
            .set_item(Self::STORAGE_KEY, &json)
            .map_err(|_| ScoreError::Rejected("LocalStorage quota exceeded".to_string()))?;
        log::info!("High scores saved ({} entries)", self.entries.len());
        Ok(())
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::new()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) -> Result<(), ScoreError> {
        Ok(())
    }
}

impl HighScores {
    /// Older saves only carry the top entries; rank against those
    #[allow(dead_code)]
    fn backfill_history(&mut self) {
        if self.history.is_empty() {
            self.history = self.entries.iter().map(|e| e.height).collect();
        }
    }
}

impl ScoreReporter for HighScores {
    fn submit(&mut self, submission: &ScoreSubmission) -> Result<u32, ScoreError> {
        let player = self
            .register_player(&submission.player_name)
            .ok_or_else(|| ScoreError::Rejected("player name is blank".to_string()))?;
        let rank = self.add_score(
            &player.name,
            submission.final_height,
            submission.blocks_stacked,
            now_ms(),
        );
        self.save()?;
        Ok(rank)
    }
}

#[cfg(target_arch = "wasm32")]
fn now_ms() -> f64 {
    js_sys::Date::now()
}

#[cfg(not(target_arch = "wasm32"))]
fn now_ms() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Format a timestamp as a relative date string
#[cfg(target_arch = "wasm32")]
pub fn format_date(timestamp: f64) -> String {
    let now = js_sys::Date::now();
    let diff_mins = (now - timestamp) / 60_000.0;
    let diff_hours = diff_mins / 60.0;
    let diff_days = diff_hours / 24.0;

    if diff_days >= 1.0 {
        let days = diff_days.floor() as i32;
        if days == 1 {
            "Yesterday".to_string()
        } else if days < 7 {
            format!("{} days ago", days)
        } else {
            let date = js_sys::Date::new(&wasm_bindgen::JsValue::from_f64(timestamp));
            format!(
                "{}/{}/{}",
                date.get_month() + 1,
                date.get_date(),
                date.get_full_year() % 100
            )
        }
    } else if diff_hours >= 1.0 {
        format!("{}h ago", diff_hours.floor() as i32)
    } else if diff_mins >= 1.0 {
        format!("{}m ago", diff_mins.floor() as i32)
    } else {
        "Just now".to_string()
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn format_date(_timestamp: f64) -> String {
    "N/A".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(name: &str, height: u32) -> ScoreSubmission {
        ScoreSubmission {
            player_name: name.to_string(),
            final_height: height,
            blocks_stacked: 5,
        }
    }

    #[test]
    fn test_rank_counts_strictly_higher() {
        let mut scores = HighScores::new();
        assert_eq!(scores.add_score("a", 300, 6, 0.0), 1);
        assert_eq!(scores.add_score("b", 500, 9, 1.0), 1);
        assert_eq!(scores.add_score("c", 300, 5, 2.0), 2);
        assert_eq!(scores.rank_of(100), 4);
        assert_eq!(scores.top_height(), Some(500));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut scores = HighScores::new();
        scores.add_score("a", 200, 4, 0.0);
        scores.add_score("b", 200, 3, 1.0);
        assert_eq!(scores.entries[0].player_name, "a");
        assert_eq!(scores.entries[1].player_name, "b");
    }

    #[test]
    fn test_keeps_top_ten_but_ranks_everything() {
        let mut scores = HighScores::new();
        for height in 1..=15 {
            scores.add_score("p", height * 10, 1, 0.0);
        }
        assert_eq!(scores.entries.len(), MAX_HIGH_SCORES);
        assert_eq!(scores.total_scores(), 15);
        assert_eq!(scores.top_height(), Some(150));
        assert_eq!(scores.entries.last().map(|e| e.height), Some(60));

        // Below the cut: ranked against all 15, but not kept
        assert_eq!(scores.add_score("p", 5, 1, 0.0), 16);
        assert_eq!(scores.entries.last().map(|e| e.height), Some(60));
        assert_eq!(scores.rank_of(35), 13);
    }

    #[test]
    fn test_player_names_normalized() {
        assert_eq!(normalize_player_name("  Frosty  "), Some("Frosty".to_string()));
        assert_eq!(normalize_player_name("   "), None);
        let long = "x".repeat(80);
        let capped = normalize_player_name(&long).expect("non-blank");
        assert_eq!(capped.chars().count(), MAX_PLAYER_NAME_LEN);
    }

    #[test]
    fn test_players_reused_ignoring_case() {
        let mut scores = HighScores::new();
        let first = scores.register_player("Frosty").expect("valid name");
        let again = scores.register_player(" FROSTY ").expect("valid name");
        assert_eq!(first, again);
        assert_eq!(again.name, "Frosty");

        let other = scores.register_player("Sleet").expect("valid name");
        assert_ne!(other.id, first.id);
        assert_eq!(scores.players().len(), 2);
        assert!(scores.register_player("").is_none());
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut scores = HighScores::new();
        scores.register_player("Frosty");
        scores.add_score("Frosty", 120, 3, 0.0);
        scores.clear();
        assert!(scores.is_empty());
        assert!(scores.players().is_empty());
        assert_eq!(scores.total_scores(), 0);
        assert_eq!(scores.rank_of(1), 1);
    }

    #[test]
    fn test_reporter_returns_rank() {
        let mut scores = HighScores::new();
        scores.add_score("a", 400, 8, 0.0);
        let rank = scores
            .submit(&submission("  Frosty ", 250))
            .expect("native save never fails");
        assert_eq!(rank, 2);
        assert_eq!(scores.entries.len(), 2);
        assert_eq!(scores.entries[1].player_name, "Frosty");
    }

    #[test]
    fn test_reporter_rejects_blank_name() {
        let mut scores = HighScores::new();
        let err = scores.submit(&submission(" ", 250)).unwrap_err();
        assert!(matches!(err, ScoreError::Rejected(_)));
        assert!(scores.is_empty());
    }

    #[test]
    fn test_old_saves_rank_against_entries() {
        let json = r#"{ "entries": [
            { "height": 300, "blocks_stacked": 6, "timestamp": 0.0 },
            { "height": 200, "blocks_stacked": 4, "timestamp": 0.0 }
        ] }"#;
        let mut scores: HighScores = serde_json::from_str(json).expect("old format parses");
        scores.backfill_history();
        assert_eq!(scores.rank_of(250), 2);
        assert_eq!(scores.entries[0].player_name, "");
    }
}
