//! Deterministic simulation module
//!
//! All gameplay logic lives here. Given the same seed and the same inputs a
//! session replays identically:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering or platform dependencies

pub mod collision;
pub mod cues;
pub mod input;
pub mod physics;
pub mod stack;
pub mod state;
pub mod tick;
pub mod timers;

pub use collision::{Contact, classify, knockback_impulse, route_contacts};
pub use cues::{AudioCue, ScoreError, ScoreReporter, ScoreSubmission, report_score};
pub use input::InputController;
pub use physics::{BodyTag, Bounds, ContactEvent, PhysicsWorld};
pub use state::{Block, BlockFlash, EntityId, FinalStats, GamePhase, Platform, Projectile, Session};
pub use tick::{TickInput, end_game, start_game, tick};
pub use timers::{TimerAction, TimerHandle, TimerQueue};
