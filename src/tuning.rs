//! Data-driven game balance
//!
//! Everything the simulation reads but never writes: block size progression,
//! platform dimensions, physics tuning, timer delays and the projectile table.
//! Loaded from JSON when the host provides one, otherwise defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a [`GameConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Width/height of a dropped block in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockSize {
    pub width: f32,
    pub height: f32,
}

impl BlockSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Projectile kinds raining down during a wave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    Coal,
    Iceball,
    Snowball,
    Hailstone,
    CandyCane,
    Ornament,
    GiftBox,
    Star,
    Icicle,
    Mistletoe,
}

impl ProjectileKind {
    pub const ALL: [ProjectileKind; 10] = [
        ProjectileKind::Coal,
        ProjectileKind::Iceball,
        ProjectileKind::Snowball,
        ProjectileKind::Hailstone,
        ProjectileKind::CandyCane,
        ProjectileKind::Ornament,
        ProjectileKind::GiftBox,
        ProjectileKind::Star,
        ProjectileKind::Icicle,
        ProjectileKind::Mistletoe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectileKind::Coal => "coal",
            ProjectileKind::Iceball => "iceball",
            ProjectileKind::Snowball => "snowball",
            ProjectileKind::Hailstone => "hailstone",
            ProjectileKind::CandyCane => "candycane",
            ProjectileKind::Ornament => "ornament",
            ProjectileKind::GiftBox => "giftbox",
            ProjectileKind::Star => "star",
            ProjectileKind::Icicle => "icicle",
            ProjectileKind::Mistletoe => "mistletoe",
        }
    }

    /// Static table entry for this kind
    pub fn spec(&self) -> ProjectileSpec {
        use ProjectileShape::*;
        let (size, density, restitution, impact_force, shape, spins) = match self {
            ProjectileKind::Coal => (18.0, 0.006, 0.4, 0.015, Circle, false),
            ProjectileKind::Iceball => (16.0, 0.004, 0.7, 0.012, Circle, false),
            ProjectileKind::Snowball => (22.0, 0.002, 0.3, 0.008, Circle, false),
            ProjectileKind::Hailstone => (12.0, 0.009, 0.65, 0.02, Polygon { sides: 6 }, false),
            ProjectileKind::CandyCane => (14.0, 0.005, 0.35, 0.014, Rectangle { width: 0.5, height: 2.5 }, false),
            ProjectileKind::Ornament => (20.0, 0.003, 0.75, 0.01, Circle, false),
            ProjectileKind::GiftBox => (18.0, 0.007, 0.3, 0.016, Rectangle { width: 1.2, height: 1.2 }, false),
            ProjectileKind::Star => (16.0, 0.004, 0.5, 0.013, Polygon { sides: 5 }, true),
            ProjectileKind::Icicle => (20.0, 0.006, 0.4, 0.018, Polygon { sides: 3 }, false),
            ProjectileKind::Mistletoe => (15.0, 0.003, 0.6, 0.009, Circle, false),
        };
        ProjectileSpec {
            size,
            density,
            restitution,
            impact_force,
            shape,
            spins,
        }
    }
}

/// Collider shape of a projectile; rectangle extents are multiples of `size`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectileShape {
    Circle,
    Polygon { sides: u8 },
    Rectangle { width: f32, height: f32 },
}

/// Physical description of a projectile kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileSpec {
    /// Radius (circle/polygon) or base length (rectangle) in pixels
    pub size: f32,
    pub density: f32,
    pub restitution: f32,
    /// Knockback strength applied to blocks it hits
    pub impact_force: f32,
    pub shape: ProjectileShape,
    /// Spins twice as fast when launched
    pub spins: bool,
}

/// Friction and damping applied to a block in one of its lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub friction: f32,
    pub linear_damping: f32,
}

/// Complete balance table for a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    // === Play field ===
    pub canvas_width: f32,
    pub canvas_height: f32,

    // === Blocks ===
    /// Sizes by drop order; the last entry repeats once exhausted
    pub block_sizes: Vec<BlockSize>,
    /// Number of block colors (color index escalates every two drops)
    pub palette_len: usize,
    pub block_density: f32,
    pub block_restitution: f32,
    /// Material while falling
    pub falling: Material,
    /// Material once landed on the stack
    pub landed: Material,
    /// Material once locked
    pub locked: Material,
    /// Material once detached from the stack
    pub detached: Material,
    /// Mass multiplier applied when a block locks
    pub lock_mass_multiplier: f32,
    /// Lock the whole stack every N stacked blocks
    pub lock_every_n_blocks: u32,

    // === Platform ===
    pub platform_width: f32,
    pub platform_height: f32,
    /// Distance from the canvas bottom to the platform center
    pub platform_base_y: f32,
    /// Fraction of the remaining distance covered per tick
    pub platform_speed: f32,

    // === Physics ===
    /// Downward acceleration in px/s² of physics time
    pub gravity: f32,
    /// Physics time per wall-clock time
    pub time_scale: f32,
    /// Blocks further than this below the platform center have fallen
    pub fall_threshold: f32,
    /// Horizontal speed above which stacked blocks get damped (px/s)
    pub stabilize_linear_threshold: f32,
    /// Angular speed above which stacked blocks get damped (rad/s)
    pub stabilize_angular_threshold: f32,
    pub stabilize_linear_decay: f32,
    pub stabilize_angular_decay: f32,
    /// Converts a projectile's impact force into a velocity change (px/s)
    pub impact_velocity_scale: f32,

    // === Timers (wall-clock ms) ===
    pub settle_delay_ms: f32,
    pub projectile_interval_ms: f32,
    pub wave_tail_ms: f32,
    pub projectile_removal_delay_ms: f32,
    pub invulnerability_flash_ms: f32,
    pub invulnerability_flashes: u32,
    pub hit_flash_ms: f32,

    // === Hazards ===
    /// A projectile wave follows every N dropped blocks
    pub projectile_frequency: u32,
    pub projectile_kinds: Vec<ProjectileKind>,
    pub projectile_base_count: u32,
    pub projectile_max_count: u32,
    /// Speed multiplier added per dropped block
    pub projectile_speed_ramp: f32,
    /// Horizontal launch speed range (±, px/s)
    pub projectile_drift: f32,
    /// Downward launch speed range (px/s)
    pub projectile_fall_min: f32,
    pub projectile_fall_max: f32,

    // === Lives ===
    pub max_lives: u8,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            canvas_width: 800.0,
            canvas_height: 600.0,

            block_sizes: vec![
                BlockSize::new(160.0, 45.0),
                BlockSize::new(140.0, 45.0),
                BlockSize::new(120.0, 40.0),
                BlockSize::new(100.0, 40.0),
                BlockSize::new(85.0, 35.0),
                BlockSize::new(70.0, 35.0),
                BlockSize::new(60.0, 30.0),
                BlockSize::new(50.0, 30.0),
                BlockSize::new(40.0, 25.0),
                BlockSize::new(35.0, 25.0),
            ],
            palette_len: 6,
            block_density: 0.001,
            block_restitution: 0.02,
            falling: Material {
                friction: 0.95,
                linear_damping: 0.6,
            },
            landed: Material {
                friction: 0.99,
                linear_damping: 3.0,
            },
            locked: Material {
                friction: 2.0,
                linear_damping: 6.0,
            },
            detached: Material {
                friction: 0.1,
                linear_damping: 0.6,
            },
            lock_mass_multiplier: 2.0,
            lock_every_n_blocks: 5,

            platform_width: 220.0,
            platform_height: 18.0,
            platform_base_y: 80.0,
            platform_speed: 0.2,

            gravity: 250.0,
            time_scale: 0.35,
            fall_threshold: 120.0,
            stabilize_linear_threshold: 30.0,
            stabilize_angular_threshold: 0.6,
            stabilize_linear_decay: 0.85,
            stabilize_angular_decay: 0.9,
            impact_velocity_scale: 1000.0,

            settle_delay_ms: 350.0,
            projectile_interval_ms: 180.0,
            wave_tail_ms: 400.0,
            projectile_removal_delay_ms: 400.0,
            invulnerability_flash_ms: 150.0,
            invulnerability_flashes: 6,
            hit_flash_ms: 150.0,

            projectile_frequency: 2,
            projectile_kinds: ProjectileKind::ALL.to_vec(),
            projectile_base_count: 2,
            projectile_max_count: 8,
            projectile_speed_ramp: 0.04,
            projectile_drift: 120.0,
            projectile_fall_min: 120.0,
            projectile_fall_max: 270.0,

            max_lives: 3,
        }
    }
}

impl GameConfig {
    /// Parse and validate a JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tables the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.block_sizes.is_empty() {
            return invalid("block_sizes must not be empty");
        }
        if self
            .block_sizes
            .iter()
            .any(|s| s.width <= 0.0 || s.height <= 0.0)
        {
            return invalid("block sizes must be positive");
        }
        if self.palette_len == 0 {
            return invalid("palette_len must be at least 1");
        }
        if self.lock_every_n_blocks == 0 {
            return invalid("lock_every_n_blocks must be at least 1");
        }
        if self.projectile_frequency == 0 {
            return invalid("projectile_frequency must be at least 1");
        }
        if self.projectile_kinds.is_empty() {
            return invalid("projectile_kinds must not be empty");
        }
        if self.max_lives == 0 {
            return invalid("max_lives must be at least 1");
        }
        if self.time_scale <= 0.0 {
            return invalid("time_scale must be positive");
        }
        if self.canvas_width <= self.platform_width + 2.0 * crate::consts::PLATFORM_EDGE_MARGIN {
            return invalid("canvas is narrower than the platform");
        }
        if self.projectile_fall_max < self.projectile_fall_min {
            return invalid("projectile_fall_max is below projectile_fall_min");
        }
        Ok(())
    }

    /// Size of the `drop_count`-th block (1-based), clamped to the last entry
    pub fn block_size(&self, drop_count: u32) -> BlockSize {
        self.block_sizes[self.size_index(drop_count)]
    }

    /// Index into `block_sizes` for the `drop_count`-th block
    pub fn size_index(&self, drop_count: u32) -> usize {
        let index = drop_count.saturating_sub(1) as usize;
        index.min(self.block_sizes.len().saturating_sub(1))
    }

    /// Palette index for the `drop_count`-th block
    pub fn color_index(&self, drop_count: u32) -> usize {
        ((drop_count / 2) as usize).min(self.palette_len.saturating_sub(1))
    }

    /// Platform center y in screen space
    pub fn platform_y(&self) -> f32 {
        self.canvas_height - self.platform_base_y
    }

    /// Number of projectiles in the wave following `blocks_dropped` drops
    pub fn wave_size(&self, blocks_dropped: u32) -> u32 {
        (self.projectile_base_count + blocks_dropped / 3).min(self.projectile_max_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GameConfig::from_json(r#"{ "max_lives": 5, "lock_every_n_blocks": 3 }"#)
            .expect("partial config should parse");
        assert_eq!(config.max_lives, 5);
        assert_eq!(config.lock_every_n_blocks, 3);
        assert_eq!(config.block_sizes.len(), 10);
    }

    #[test]
    fn test_empty_block_sizes_rejected() {
        let err = GameConfig::from_json(r#"{ "block_sizes": [] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = GameConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_projectile_kinds_parse_snake_case() {
        let config = GameConfig::from_json(r#"{ "projectile_kinds": ["candy_cane", "gift_box"] }"#)
            .expect("kinds should parse");
        assert_eq!(
            config.projectile_kinds,
            vec![ProjectileKind::CandyCane, ProjectileKind::GiftBox]
        );
    }

    #[test]
    fn test_size_and_color_clamp() {
        let config = GameConfig::default();
        assert_eq!(config.block_size(1), BlockSize::new(160.0, 45.0));
        assert_eq!(config.block_size(10), config.block_size(25));
        assert_eq!(config.color_index(10), config.color_index(11));
        assert_eq!(config.color_index(1), 0);
    }

    #[test]
    fn test_wave_size_ramps_and_caps() {
        let config = GameConfig::default();
        assert_eq!(config.wave_size(2), 2);
        assert_eq!(config.wave_size(6), 4);
        assert_eq!(config.wave_size(60), 8);
    }
}
