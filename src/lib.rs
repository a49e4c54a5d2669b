//! Snowball Stacker - A physics stacking game
//!
//! Core modules:
//! - `sim`: Session simulation (physics world, stack, collisions, game state)
//! - `tuning`: Data-driven game balance
//! - `highscores`: Local leaderboard that ranks finished sessions
//! - `settings`: Player preferences
//! - `audio`: Web Audio cue playback (wasm only)

#[cfg(target_arch = "wasm32")]
pub mod audio;
pub mod highscores;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use highscores::HighScores;
pub use settings::Settings;
pub use tuning::GameConfig;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, one tick per display frame)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;

    /// Spawn height of falling blocks (screen space, y grows downward)
    pub const BLOCK_SPAWN_Y: f32 = 40.0;
    /// Horizontal margin that keeps a spawned block fully on screen
    pub const BLOCK_SPAWN_MARGIN: f32 = 30.0;
    /// Gap kept between the platform edge and the side walls
    pub const PLATFORM_EDGE_MARGIN: f32 = 5.0;

    /// Glue tolerance around the platform edges
    pub const GLUE_X_TOLERANCE: f32 = 20.0;
    /// Glue tolerance below the platform top
    pub const GLUE_Y_TOLERANCE: f32 = 50.0;
    /// Platform displacement below which blocks are not glued
    pub const GLUE_MIN_DISPLACEMENT: f32 = 0.1;

    /// Detachment test tolerance around the platform edges
    pub const DETACH_X_TOLERANCE: f32 = 50.0;
    /// Detachment test tolerance below the platform top
    pub const DETACH_Y_TOLERANCE: f32 = 100.0;
    /// AABB slack when testing whether two stacked blocks touch
    pub const TOUCH_TOLERANCE: f32 = 5.0;

    /// Projectiles below `canvas_height + this` are discarded
    pub const PROJECTILE_CULL_MARGIN: f32 = 50.0;

    /// Pixels per physics length unit; scales rapier's tolerances
    pub const PHYSICS_LENGTH_UNIT: f32 = 100.0;

    /// Wall thickness on both sides of the play field
    pub const WALL_THICKNESS: f32 = 50.0;
    /// Floor sensor offset below the canvas bottom
    pub const FLOOR_SENSOR_OFFSET: f32 = 100.0;
    /// Floor sensor thickness
    pub const FLOOR_SENSOR_THICKNESS: f32 = 50.0;
}
