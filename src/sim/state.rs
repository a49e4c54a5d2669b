//! Session state and core simulation types
//!
//! A [`Session`] owns everything one game needs: the physics world, the
//! entities, counters, timers and the outbound cue/score queues. Handlers in
//! the other `sim` modules take it explicitly.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::cues::{AudioCue, ScoreSubmission};
use super::physics::PhysicsWorld;
use super::timers::{TimerHandle, TimerQueue};
use crate::tuning::{BlockSize, GameConfig, ProjectileKind};

/// Name scores are filed under until the host sets one
pub const DEFAULT_PLAYER_NAME: &str = "Player";

/// Stable identity of a block or projectile within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Current phase of the drop cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for the first press
    Idle,
    /// One block is falling
    Dropping,
    /// Short pause after a landing
    Settling,
    /// Hazards are raining down
    ProjectileWave,
    /// Session ended; only a restart leaves this phase
    GameOver,
}

/// The player's platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    /// Center x
    pub x: f32,
    /// Center y (fixed for the session)
    pub y: f32,
    pub half_width: f32,
    pub half_height: f32,
    /// Displacement applied during the last tick
    pub velocity: f32,
    pub last_x: f32,
    /// Flash state while invulnerable
    pub flash_on: bool,
}

impl Platform {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            half_width: width / 2.0,
            half_height: height / 2.0,
            velocity: 0.0,
            last_x: x,
            flash_on: false,
        }
    }

    pub fn top(&self) -> f32 {
        self.y - self.half_height
    }

    pub fn left(&self) -> f32 {
        self.x - self.half_width
    }

    pub fn right(&self) -> f32 {
        self.x + self.half_width
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Visual flash on a block that took a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockFlash {
    Hit,
    LockedHit,
}

/// A dropped block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: EntityId,
    pub size: BlockSize,
    /// 1-based drop order
    pub drop_index: u32,
    pub color_index: usize,
    pub landed: bool,
    /// Persistent marker set when the block locks
    pub lock_marker: bool,
    /// Friction was lowered after losing contact with the stack
    pub detached: bool,
    pub flash: Option<BlockFlash>,
}

/// A hazard body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: EntityId,
    pub kind: ProjectileKind,
    pub spawn_vel: Vec2,
    /// Pending removal timer, if a hit already happened
    #[serde(skip)]
    pub removal: Option<TimerHandle>,
}

/// Numbers shown when a session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalStats {
    pub max_height: u32,
    pub blocks_stacked: u32,
    pub blocks_dropped: u32,
    /// Leaderboard rank, if the submission succeeded
    pub rank: Option<u32>,
}

/// Complete state of one game session
pub struct Session {
    pub config: GameConfig,
    pub seed: u64,
    /// Survives restarts
    pub player_name: String,
    pub rng: Pcg32,
    pub physics: PhysicsWorld,
    pub phase: GamePhase,
    pub platform: Platform,
    /// Where the platform is heading
    pub target_x: f32,
    pub blocks: BTreeMap<EntityId, Block>,
    /// Landed blocks in landing order
    pub stack: Vec<EntityId>,
    pub current_block: Option<EntityId>,
    pub locked_blocks: BTreeSet<EntityId>,
    pub last_lock_count: u32,
    pub projectiles: BTreeMap<EntityId, Projectile>,
    pub blocks_dropped: u32,
    pub current_height: u32,
    pub max_height: u32,
    pub lives: u8,
    pub invulnerable: bool,
    /// Screen shake intensity in pixels, decays every tick
    pub screen_shake: f32,
    pub timers: TimerQueue,
    /// Simulated clock in ms, advanced by `dt` every tick
    pub time_ms: f64,
    pub time_ticks: u64,
    pub final_stats: Option<FinalStats>,
    cues: Vec<AudioCue>,
    pending_score: Option<ScoreSubmission>,
    next_id: u32,
}

impl Session {
    /// Create a session in the `Idle` phase with the world built.
    ///
    /// A config that fails [`GameConfig::validate`] is replaced by the
    /// defaults.
    pub fn new(config: GameConfig, seed: u64) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                log::warn!("Falling back to default config: {}", e);
                GameConfig::default()
            }
        };
        let center_x = config.canvas_width / 2.0;
        let platform = Platform::new(
            center_x,
            config.platform_y(),
            config.platform_width,
            config.platform_height,
        );
        let mut session = Self {
            physics: PhysicsWorld::new(config.gravity),
            rng: Pcg32::seed_from_u64(seed),
            seed,
            player_name: DEFAULT_PLAYER_NAME.to_string(),
            phase: GamePhase::Idle,
            platform,
            target_x: center_x,
            blocks: BTreeMap::new(),
            stack: Vec::new(),
            current_block: None,
            locked_blocks: BTreeSet::new(),
            last_lock_count: 0,
            projectiles: BTreeMap::new(),
            blocks_dropped: 0,
            current_height: 0,
            max_height: 0,
            lives: config.max_lives,
            invulnerable: false,
            screen_shake: 0.0,
            timers: TimerQueue::new(),
            time_ms: 0.0,
            time_ticks: 0,
            final_stats: None,
            cues: Vec::new(),
            pending_score: None,
            next_id: 1,
            config,
        };
        session.build_world();
        session
    }

    fn build_world(&mut self) {
        self.physics.add_platform(
            self.platform.center(),
            self.config.platform_width,
            self.config.platform_height,
        );
        self.physics
            .add_bounds(self.config.canvas_width, self.config.canvas_height);
    }

    /// Tear everything down and start over in `Idle`
    pub fn restart(&mut self) {
        self.timers.cancel_all();
        self.push_cue(AudioCue::AmbientStop);

        let center_x = self.config.canvas_width / 2.0;
        self.physics = PhysicsWorld::new(self.config.gravity);
        self.platform = Platform::new(
            center_x,
            self.config.platform_y(),
            self.config.platform_width,
            self.config.platform_height,
        );
        self.target_x = center_x;
        self.blocks.clear();
        self.stack.clear();
        self.current_block = None;
        self.locked_blocks.clear();
        self.last_lock_count = 0;
        self.projectiles.clear();
        self.blocks_dropped = 0;
        self.current_height = 0;
        self.max_height = 0;
        self.lives = self.config.max_lives;
        self.invulnerable = false;
        self.screen_shake = 0.0;
        self.final_stats = None;
        self.pending_score = None;
        self.phase = GamePhase::Idle;
        self.build_world();

        log::info!("Session restarted");
    }

    /// Name the final score will be filed under
    pub fn set_player_name(&mut self, name: &str) {
        self.player_name = name.to_string();
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn blocks_stacked(&self) -> u32 {
        self.stack.len() as u32
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    pub fn has_started(&self) -> bool {
        self.phase != GamePhase::Idle
    }

    pub fn is_stacked(&self, id: EntityId) -> bool {
        self.stack.contains(&id)
    }

    pub fn is_locked(&self, id: EntityId) -> bool {
        self.locked_blocks.contains(&id)
    }

    /// Queue an audio cue for the host
    pub fn push_cue(&mut self, cue: AudioCue) {
        self.cues.push(cue);
    }

    /// Take all queued audio cues
    pub fn drain_cues(&mut self) -> Vec<AudioCue> {
        std::mem::take(&mut self.cues)
    }

    /// Raise screen shake to at least `intensity`
    pub fn shake(&mut self, intensity: f32) {
        self.screen_shake = self.screen_shake.max(intensity);
    }

    /// Schedule a timer on the session clock
    pub fn schedule(&mut self, delay_ms: f32, action: super::timers::TimerAction) -> TimerHandle {
        self.timers.schedule(self.time_ms, delay_ms, action)
    }

    pub(crate) fn set_pending_score(&mut self, submission: ScoreSubmission) {
        self.pending_score = Some(submission);
    }

    /// Take the score submission queued at game over, if any
    pub fn take_score_submission(&mut self) -> Option<ScoreSubmission> {
        self.pending_score.take()
    }

    /// Record the leaderboard rank for the finished session
    pub fn record_rank(&mut self, rank: Option<u32>) {
        if let Some(stats) = self.final_stats.as_mut() {
            stats.rank = rank;
        }
    }

    /// Position of a block or projectile
    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        self.physics.position(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new(GameConfig::default(), 1);
        assert_eq!(session.phase, GamePhase::Idle);
        assert_eq!(session.lives, 3);
        assert_eq!(session.blocks_stacked(), 0);
        assert_eq!(session.platform.x, 400.0);
        assert_eq!(session.platform.top(), 511.0);
        // Platform, two walls, floor sensor
        assert_eq!(session.physics.body_count(), 4);
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let config = GameConfig {
            block_sizes: Vec::new(),
            ..GameConfig::default()
        };
        let mut session = Session::new(config, 1);
        assert!(!session.config.block_sizes.is_empty());
        assert!(crate::sim::start_game(&mut session));
        assert!(session.current_block.is_some());
    }

    #[test]
    fn test_restart_keeps_player_name() {
        let mut session = Session::new(GameConfig::default(), 1);
        assert_eq!(session.player_name, DEFAULT_PLAYER_NAME);
        session.set_player_name("Frosty");
        session.restart();
        assert_eq!(session.player_name, "Frosty");
    }

    #[test]
    fn test_entity_ids_increase() {
        let mut session = Session::new(GameConfig::default(), 1);
        let a = session.next_entity_id();
        let b = session.next_entity_id();
        assert!(b > a);
    }

    #[test]
    fn test_drain_cues_empties_queue() {
        let mut session = Session::new(GameConfig::default(), 1);
        session.push_cue(AudioCue::Lock);
        assert_eq!(session.drain_cues(), vec![AudioCue::Lock]);
        assert!(session.drain_cues().is_empty());
    }

    #[test]
    fn test_shake_keeps_strongest() {
        let mut session = Session::new(GameConfig::default(), 1);
        session.shake(8.0);
        session.shake(3.0);
        assert_eq!(session.screen_shake, 8.0);
    }
}
