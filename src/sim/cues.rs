//! Outbound interfaces: audio cues and score reporting
//!
//! The simulation never calls audio or storage directly. Cues are queued on
//! the session and drained by the host; the final score is handed to a
//! [`ScoreReporter`] whose failure only hides the rank.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::Session;
use crate::tuning::ProjectileKind;

/// Fire-and-forget sound requests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AudioCue {
    /// Game started, begin ambient wind
    AmbientStart,
    /// Stop ambient sound and music
    AmbientStop,
    /// A block landed; intensity 0.5..=1.0 shrinks with block size
    Landing { intensity: f32 },
    /// Stack grew; pitch follows the height in pixels
    Stack { height: u32 },
    Lock,
    LoseLife,
    GameOver,
    Impact(ProjectileKind),
    /// Warning before a projectile wave
    ProjectileSpawn,
    ProjectileLaunch(ProjectileKind),
}

/// Final result handed to the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub player_name: String,
    /// Maximum stack height reached, in pixels
    pub final_height: u32,
    pub blocks_stacked: u32,
}

/// Why a score could not be recorded
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("score storage unavailable")]
    StorageUnavailable,
    #[error("failed to serialize scores: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("score rejected: {0}")]
    Rejected(String),
}

/// Persists a finished session and returns its rank (1-based)
pub trait ScoreReporter {
    fn submit(&mut self, submission: &ScoreSubmission) -> Result<u32, ScoreError>;
}

/// Hand the pending submission (if any) to `reporter` and record the rank.
///
/// Returns the rank on success. Failures are logged and leave the rank empty.
pub fn report_score(session: &mut Session, reporter: &mut dyn ScoreReporter) -> Option<u32> {
    let submission = session.take_score_submission()?;
    match reporter.submit(&submission) {
        Ok(rank) => {
            log::info!(
                "Score saved for {}: height {} with {} blocks, rank #{}",
                submission.player_name,
                submission.final_height,
                submission.blocks_stacked,
                rank
            );
            session.record_rank(Some(rank));
            Some(rank)
        }
        Err(e) => {
            log::warn!("Failed to save score: {}", e);
            session.record_rank(None);
            None
        }
    }
}
