//! Fixed timestep simulation tick
//!
//! Core game loop: input, timers, platform, physics, contact routing and the
//! fall checks, in that order.

use super::collision;
use super::cues::{AudioCue, ScoreSubmission};
use super::physics::BodyTag;
use super::stack;
use super::state::{EntityId, FinalStats, GamePhase, Session};
use super::timers::TimerAction;

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Target platform x (from pointer/touch position)
    pub target_x: Option<f32>,
    /// First press: leave `Idle`
    pub start: bool,
    /// Idle/demo mode - AI plays the game
    pub idle_mode: bool,
}

/// Advance the session by one fixed timestep
pub fn tick(session: &mut Session, input: &TickInput, dt: f32) {
    session.time_ticks += 1;
    session.time_ms += (dt * 1000.0) as f64;

    // Decay screen shake
    session.screen_shake *= 0.9;
    if session.screen_shake < 0.01 {
        session.screen_shake = 0.0;
    }

    let mut input = input.clone();
    if input.idle_mode {
        autopilot(session, &mut input);
    }

    if let Some(x) = input.target_x {
        session.target_x = x;
    }
    if input.start {
        start_game(session);
    }

    let physics_dt = dt * session.config.time_scale;

    // Bodies keep moving behind the game over screen, nothing else does
    if session.is_game_over() {
        session.physics.step(physics_dt);
        return;
    }

    for action in session.timers.drain_due(session.time_ms) {
        if session.is_game_over() {
            break;
        }
        handle_timer(session, action);
    }
    if session.is_game_over() {
        return;
    }

    stack::update_platform(session);
    if !session.stack.is_empty() {
        stack::stabilize_stack(session);
    }

    let events = session.physics.step(physics_dt);
    collision::route_contacts(session, &events);
    if session.is_game_over() {
        return;
    }

    stack::recompute_height(session);
    check_fallen_bodies(session);
}

/// Leave `Idle` and drop the first block. Ignored in any other phase.
pub fn start_game(session: &mut Session) -> bool {
    if session.phase != GamePhase::Idle {
        return false;
    }
    log::info!("Game started (seed {})", session.seed);
    session.push_cue(AudioCue::AmbientStart);
    stack::spawn_next_block(session);
    true
}

/// End the session. Safe to call more than once; only the first call counts.
pub fn end_game(session: &mut Session) {
    if session.is_game_over() {
        return;
    }
    session.phase = GamePhase::GameOver;
    session.timers.cancel_all();
    for projectile in session.projectiles.values_mut() {
        projectile.removal = None;
    }

    session.push_cue(AudioCue::AmbientStop);
    session.push_cue(AudioCue::GameOver);
    session.shake(15.0);

    let blocks_stacked = session.blocks_stacked();
    session.set_pending_score(ScoreSubmission {
        player_name: session.player_name.clone(),
        final_height: session.max_height,
        blocks_stacked,
    });
    session.final_stats = Some(FinalStats {
        max_height: session.max_height,
        blocks_stacked,
        blocks_dropped: session.blocks_dropped,
        rank: None,
    });

    log::info!(
        "Game over: height {}px, {} stacked, {} dropped",
        session.max_height,
        blocks_stacked,
        session.blocks_dropped
    );
}

/// Run one fired timer
pub fn handle_timer(session: &mut Session, action: TimerAction) {
    match action {
        TimerAction::SettleElapsed => {
            let frequency = session.config.projectile_frequency.max(1);
            if session.blocks_dropped % frequency == 0 {
                start_projectile_wave(session);
            } else {
                stack::spawn_next_block(session);
            }
        }
        TimerAction::LaunchProjectile { .. } => {
            stack::spawn_projectile(session);
        }
        TimerAction::WaveComplete => {
            stack::spawn_next_block(session);
        }
        TimerAction::RemoveProjectile(id) => {
            if let Some(projectile) = session.projectiles.get_mut(&id) {
                projectile.removal = None;
            }
            collision::remove_projectile(session, id);
        }
        TimerAction::InvulnerabilityFlash { count } => {
            collision::handle_invulnerability_flash(session, count);
        }
        TimerAction::ClearBlockFlash(id) => {
            if let Some(block) = session.blocks.get_mut(&id) {
                block.flash = None;
            }
        }
    }
}

/// Schedule a wave of projectiles, then the next block after it
pub fn start_projectile_wave(session: &mut Session) {
    let count = session.config.wave_size(session.blocks_dropped);
    let interval = session.config.projectile_interval_ms;

    session.phase = GamePhase::ProjectileWave;
    session.push_cue(AudioCue::ProjectileSpawn);
    for index in 0..count {
        session.schedule(index as f32 * interval, TimerAction::LaunchProjectile { index });
    }
    session.schedule(
        session.config.wave_tail_ms + count as f32 * interval,
        TimerAction::WaveComplete,
    );

    log::info!(
        "Projectile wave of {} after {} blocks",
        count,
        session.blocks_dropped
    );
}

/// Position-based fall checks for blocks and projectiles that slipped past
/// the floor sensor
pub fn check_fallen_bodies(session: &mut Session) {
    let threshold = session.platform.y + session.config.fall_threshold;

    let fallen: Vec<EntityId> = session
        .stack
        .iter()
        .copied()
        .filter(|id| session.position(*id).is_some_and(|p| p.y > threshold))
        .collect();
    for id in fallen {
        collision::handle_body_fallen(session, BodyTag::Block(id));
        if session.is_game_over() {
            return;
        }
    }

    let cull_y = session.config.canvas_height + crate::consts::PROJECTILE_CULL_MARGIN;
    let gone: Vec<EntityId> = session
        .projectiles
        .keys()
        .copied()
        .filter(|id| session.position(*id).is_some_and(|p| p.y > cull_y))
        .collect();
    for id in gone {
        collision::remove_projectile(session, id);
    }

    if let Some(id) = session.current_block
        && session.position(id).is_some_and(|p| p.y > threshold)
    {
        collision::handle_body_fallen(session, BodyTag::Block(id));
    }
}

/// Demo player: start the game and keep the stack under the falling block
fn autopilot(session: &Session, input: &mut TickInput) {
    if session.phase == GamePhase::Idle {
        input.start = true;
    }

    let Some(block_x) = session
        .current_block
        .and_then(|id| session.position(id))
        .map(|p| p.x)
    else {
        // Nothing falling: hold still so the stack settles
        input.target_x = Some(session.platform.x);
        return;
    };

    // Aim the top of the stack, not the platform center
    let offset = session
        .stack
        .last()
        .and_then(|id| session.position(*id))
        .map(|p| p.x - session.platform.x)
        .unwrap_or(0.0);
    input.target_x = Some(block_x - offset);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_DT;
    use crate::tuning::GameConfig;

    fn session() -> Session {
        Session::new(GameConfig::default(), 12345)
    }

    fn run(session: &mut Session, input: &TickInput, ticks: u32) {
        for _ in 0..ticks {
            tick(session, input, SIM_DT);
        }
    }

    fn ticks_for(ms: f32) -> u32 {
        (ms / (SIM_DT * 1000.0)).ceil() as u32 + 1
    }

    #[test]
    fn test_tick_idle_to_dropping() {
        let mut s = session();
        run(&mut s, &TickInput::default(), 10);
        assert_eq!(s.phase, GamePhase::Idle);
        assert_eq!(s.blocks_dropped, 0);

        let input = TickInput {
            start: true,
            ..Default::default()
        };
        tick(&mut s, &input, SIM_DT);
        assert_eq!(s.phase, GamePhase::Dropping);
        assert_eq!(s.blocks_dropped, 1);
        assert!(s.current_block.is_some());
        assert!(s.drain_cues().contains(&AudioCue::AmbientStart));

        // Pressing again does not drop another block
        tick(&mut s, &input, SIM_DT);
        assert_eq!(s.blocks_dropped, 1);
    }

    #[test]
    fn test_settle_drops_next_block() {
        let mut s = session();
        start_game(&mut s);
        let id = s.current_block.expect("falling");
        let size = s.blocks[&id].size;
        s.physics.set_position(
            id,
            glam::Vec2::new(s.platform.x, s.platform.top() - size.height / 2.0),
        );
        collision::handle_block_landed(&mut s, id);
        assert_eq!(s.phase, GamePhase::Settling);

        let settle = ticks_for(s.config.settle_delay_ms);
        run(&mut s, &TickInput::default(), settle);
        // One block dropped, not a wave turn
        assert_eq!(s.phase, GamePhase::Dropping);
        assert_eq!(s.blocks_dropped, 2);
    }

    #[test]
    fn test_wave_then_next_block() {
        let mut s = session();
        s.phase = GamePhase::Settling;
        s.blocks_dropped = 2;
        handle_timer(&mut s, TimerAction::SettleElapsed);
        assert_eq!(s.phase, GamePhase::ProjectileWave);
        assert!(s.drain_cues().contains(&AudioCue::ProjectileSpawn));

        let count = s.config.wave_size(2);
        let wave_ms = s.config.wave_tail_ms + count as f32 * s.config.projectile_interval_ms;
        run(&mut s, &TickInput::default(), ticks_for(wave_ms));

        let launches = s
            .drain_cues()
            .iter()
            .filter(|c| matches!(c, AudioCue::ProjectileLaunch(_)))
            .count();
        assert_eq!(launches as u32, count);
        assert_eq!(s.phase, GamePhase::Dropping);
        assert_eq!(s.blocks_dropped, 3);
    }

    #[test]
    fn test_game_over_is_terminal() {
        let mut s = session();
        start_game(&mut s);
        s.schedule(0.0, TimerAction::SettleElapsed);
        end_game(&mut s);
        assert!(s.timers.is_empty());
        let stats = s.final_stats.expect("stats at game over");
        assert_eq!(stats.blocks_dropped, 1);

        let input = TickInput {
            start: true,
            ..Default::default()
        };
        run(&mut s, &input, 60);
        assert!(s.is_game_over());
        assert_eq!(s.blocks_dropped, 1);

        // Second end is ignored
        s.drain_cues();
        end_game(&mut s);
        assert!(s.drain_cues().is_empty());
    }

    #[test]
    fn test_restart_resets_session() {
        let mut s = session();
        start_game(&mut s);
        s.lives = 1;
        s.max_height = 120;
        end_game(&mut s);

        s.restart();
        assert_eq!(s.phase, GamePhase::Idle);
        assert_eq!(s.lives, s.config.max_lives);
        assert_eq!(s.blocks_dropped, 0);
        assert_eq!(s.max_height, 0);
        assert!(s.blocks.is_empty());
        assert!(s.final_stats.is_none());
        assert!(s.take_score_submission().is_none());
        assert_eq!(s.physics.body_count(), 4);
    }

    #[test]
    fn test_missed_block_falls_to_game_over() {
        let mut s = session();
        s.target_x = 0.0;
        start_game(&mut s);
        let id = s.current_block.expect("falling");
        // Park the block far right so the platform cannot catch it
        s.physics
            .set_position(id, glam::Vec2::new(s.config.canvas_width - 100.0, 40.0));
        s.target_x = 0.0;
        run(&mut s, &TickInput::default(), 60 * 60);
        assert!(s.is_game_over());
    }

    #[test]
    fn test_screen_shake_decays() {
        let mut s = session();
        s.shake(10.0);
        run(&mut s, &TickInput::default(), 120);
        assert_eq!(s.screen_shake, 0.0);
    }

    #[test]
    fn test_idle_mode_starts_and_plays() {
        let mut s = session();
        let input = TickInput {
            idle_mode: true,
            ..Default::default()
        };
        run(&mut s, &input, 600);
        assert!(s.has_started());
        assert!(s.blocks_dropped >= 1);
    }

    #[test]
    fn test_determinism() {
        let mut s1 = Session::new(GameConfig::default(), 777);
        let mut s2 = Session::new(GameConfig::default(), 777);
        let inputs = [
            TickInput {
                start: true,
                ..Default::default()
            },
            TickInput {
                target_x: Some(300.0),
                ..Default::default()
            },
            TickInput {
                target_x: Some(520.0),
                ..Default::default()
            },
        ];
        for input in inputs.iter().cycle().take(600) {
            tick(&mut s1, input, SIM_DT);
            tick(&mut s2, input, SIM_DT);
        }
        assert_eq!(s1.time_ticks, s2.time_ticks);
        assert_eq!(s1.phase, s2.phase);
        assert_eq!(s1.blocks_dropped, s2.blocks_dropped);
        assert_eq!(s1.current_height, s2.current_height);
        assert!((s1.platform.x - s2.platform.x).abs() < 0.0001);
    }
}
