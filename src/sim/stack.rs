//! Entity and stack management
//!
//! Platform following and glue, block and projectile spawning, stack
//! stabilization, locking, detachment and height tracking.

use glam::Vec2;
use rand::Rng;

use super::cues::AudioCue;
use super::physics::ProjectileLaunch;
use super::state::{Block, EntityId, GamePhase, Projectile, Session};
use crate::consts::*;

/// Launch spin of projectiles (rad/s, ±half)
const PROJECTILE_SPIN: f32 = 9.0;
const PROJECTILE_SPIN_FAST: f32 = 18.0;

/// Move the platform toward the target and drag the stack along with it
pub fn update_platform(session: &mut Session) {
    let current = session.platform.x;
    let new_x = current + (session.target_x - current) * session.config.platform_speed;

    let half = session.platform.half_width;
    let min_x = half + PLATFORM_EDGE_MARGIN;
    let max_x = session.config.canvas_width - half - PLATFORM_EDGE_MARGIN;
    let clamped = new_x.max(min_x).min(max_x);

    session.platform.velocity = clamped - session.platform.last_x;
    session.platform.last_x = clamped;
    session.platform.x = clamped;
    session.physics.move_platform(session.platform.center());

    if session.platform.velocity.abs() > GLUE_MIN_DISPLACEMENT {
        transfer_momentum(session);
    }
}

/// Shift resting blocks by the platform's displacement.
///
/// Positions move, velocities do not, so the stack never builds up momentum
/// that would fling it off when the platform stops.
pub fn transfer_momentum(session: &mut Session) {
    let Session {
        stack,
        physics,
        platform,
        ..
    } = session;

    let dx = platform.velocity;
    if dx.abs() < 0.01 {
        return;
    }
    let left = platform.left() - GLUE_X_TOLERANCE;
    let right = platform.right() + GLUE_X_TOLERANCE;
    let below = platform.top() + GLUE_Y_TOLERANCE;

    for &id in stack.iter() {
        let Some(pos) = physics.position(id) else {
            continue;
        };
        if pos.x >= left && pos.x <= right && pos.y < below {
            physics.translate(id, Vec2::new(dx, 0.0));
        }
    }
}

/// Damp horizontal and angular jitter on stacked blocks
pub fn stabilize_stack(session: &mut Session) {
    let Session {
        stack,
        physics,
        config,
        ..
    } = session;

    for &id in stack.iter() {
        if let Some(vel) = physics.velocity(id)
            && vel.x.abs() > config.stabilize_linear_threshold
        {
            physics.set_velocity(id, Vec2::new(vel.x * config.stabilize_linear_decay, vel.y));
        }
        if let Some(angvel) = physics.angular_velocity(id)
            && angvel.abs() > config.stabilize_angular_threshold
        {
            physics.set_angular_velocity(id, angvel * config.stabilize_angular_decay);
        }
    }
}

/// Drop the next block from a random x. No-op after game over or while a
/// block is still falling.
pub fn spawn_next_block(session: &mut Session) -> Option<EntityId> {
    if session.is_game_over() || session.current_block.is_some() {
        return None;
    }

    session.blocks_dropped += 1;
    let drop_index = session.blocks_dropped;
    let size = session.config.block_size(drop_index);

    let half = size.width / 2.0;
    let min_x = half + BLOCK_SPAWN_MARGIN;
    let max_x = session.config.canvas_width - half - BLOCK_SPAWN_MARGIN;
    let x = if max_x > min_x {
        min_x + session.rng.random::<f32>() * (max_x - min_x)
    } else {
        session.config.canvas_width / 2.0
    };

    let id = session.next_entity_id();
    session.physics.add_block(
        id,
        Vec2::new(x, BLOCK_SPAWN_Y),
        size,
        session.config.falling,
        session.config.block_density,
        session.config.block_restitution,
    );
    session.blocks.insert(
        id,
        Block {
            id,
            size,
            drop_index,
            color_index: session.config.color_index(drop_index),
            landed: false,
            lock_marker: false,
            detached: false,
            flash: None,
        },
    );
    session.current_block = Some(id);
    session.phase = GamePhase::Dropping;

    log::debug!(
        "Block {} dropped at x={:.0} ({}x{})",
        drop_index,
        x,
        size.width,
        size.height
    );
    Some(id)
}

/// Append a landed block to the stack. Returns false if it was already there.
pub fn add_to_stack(session: &mut Session, id: EntityId) -> bool {
    if session.is_stacked(id) {
        return false;
    }
    session.stack.push(id);
    recompute_height(session);
    check_stack_lock(session);
    true
}

/// Drop a block from the stack. Returns false if it was not stacked.
pub fn remove_from_stack(session: &mut Session, id: EntityId) -> bool {
    let Some(index) = session.stack.iter().position(|s| *s == id) else {
        return false;
    };
    session.stack.remove(index);
    recompute_height(session);
    true
}

/// Recompute the stack height from the topmost block edge
pub fn recompute_height(session: &mut Session) {
    if session.stack.is_empty() {
        session.current_height = 0;
        return;
    }

    let top = session.platform.top();
    let highest = session
        .stack
        .iter()
        .filter_map(|id| session.physics.bounds(*id))
        .map(|b| b.min.y)
        .fold(top, f32::min);

    session.current_height = (top - highest).max(0.0).round() as u32;
    session.max_height = session.max_height.max(session.current_height);
}

/// Lock every unlocked stacked block once the stack crosses the next multiple
/// of `lock_every_n_blocks`. Returns how many blocks were locked.
pub fn check_stack_lock(session: &mut Session) -> usize {
    let every = session.config.lock_every_n_blocks.max(1);
    let stacked = session.blocks_stacked();
    let threshold = stacked / every;

    if threshold <= session.last_lock_count || stacked < every {
        return 0;
    }
    session.last_lock_count = threshold;

    let to_lock: Vec<EntityId> = session
        .stack
        .iter()
        .filter(|id| !session.locked_blocks.contains(id))
        .copied()
        .collect();
    for &id in &to_lock {
        lock_block(session, id);
    }

    session.push_cue(AudioCue::Lock);
    session.shake(5.0);
    log::info!(
        "Stack locked at {} blocks ({} newly locked)",
        stacked,
        to_lock.len()
    );
    to_lock.len()
}

fn lock_block(session: &mut Session, id: EntityId) {
    session.locked_blocks.insert(id);
    if let Some(block) = session.blocks.get_mut(&id) {
        block.lock_marker = true;
    }
    let physics = &mut session.physics;
    physics.scale_mass(id, session.config.lock_mass_multiplier);
    physics.set_material(id, session.config.locked);
    physics.set_velocity(id, Vec2::ZERO);
    physics.set_angular_velocity(id, 0.0);
}

/// Let a landed block that lost contact with everything slide away.
///
/// Locked blocks are skipped. Returns true if the block was made slippery.
pub fn check_detachment(session: &mut Session, id: EntityId) -> bool {
    if session.is_locked(id) {
        return false;
    }
    match session.blocks.get(&id) {
        Some(block) if block.landed && !block.detached => {}
        _ => return false,
    }
    let (Some(pos), Some(bounds)) = (session.physics.position(id), session.physics.bounds(id))
    else {
        return false;
    };

    let platform = &session.platform;
    let above_platform = pos.x >= platform.left() - DETACH_X_TOLERANCE
        && pos.x <= platform.right() + DETACH_X_TOLERANCE
        && bounds.max.y <= platform.top() + DETACH_Y_TOLERANCE;
    if above_platform {
        return false;
    }

    let touching_stack = session
        .stack
        .iter()
        .filter(|other| **other != id)
        .filter_map(|other| session.physics.bounds(*other))
        .any(|other| bounds.touches(&other, TOUCH_TOLERANCE));
    if touching_stack {
        return false;
    }

    session.physics.set_material(id, session.config.detached);
    if let Some(block) = session.blocks.get_mut(&id) {
        block.detached = true;
    }
    log::debug!("Block {:?} detached from the stack", id);
    true
}

/// Launch one projectile from above the play field
pub fn spawn_projectile(session: &mut Session) -> Option<EntityId> {
    if session.is_game_over() || session.config.projectile_kinds.is_empty() {
        return None;
    }

    let config = &session.config;
    let rng = &mut session.rng;

    let kind = config.projectile_kinds[rng.random_range(0..config.projectile_kinds.len())];
    let spec = kind.spec();
    let speed = 1.0 + session.blocks_dropped as f32 * config.projectile_speed_ramp;

    let margin = spec.size * 2.0;
    let x = margin + rng.random::<f32>() * (config.canvas_width - margin * 2.0).max(0.0);
    let y = -spec.size - 10.0;

    let vx = (rng.random::<f32>() - 0.5) * 2.0 * config.projectile_drift * speed;
    let fall_range = config.projectile_fall_max - config.projectile_fall_min;
    let vy = (config.projectile_fall_min + rng.random::<f32>() * fall_range) * speed;
    let spin = if spec.spins {
        PROJECTILE_SPIN_FAST
    } else {
        PROJECTILE_SPIN
    };
    let angvel = (rng.random::<f32>() - 0.5) * spin;

    let launch = ProjectileLaunch {
        pos: Vec2::new(x, y),
        vel: Vec2::new(vx, vy),
        angvel,
    };
    let id = session.next_entity_id();
    session.physics.add_projectile(id, &spec, launch);
    session.projectiles.insert(
        id,
        Projectile {
            id,
            kind,
            spawn_vel: launch.vel,
            removal: None,
        },
    );
    session.push_cue(AudioCue::ProjectileLaunch(kind));

    log::debug!("Projectile {} launched at x={:.0}", kind.as_str(), x);
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::GameConfig;

    fn session() -> Session {
        Session::new(GameConfig::default(), 42)
    }

    /// Mark the current block landed and rest it on top of the stack
    fn stack_current(session: &mut Session) -> EntityId {
        let id = session.current_block.take().expect("a block is falling");
        let size = session.blocks[&id].size;
        let top = session.platform.top() - session.current_height as f32;
        session
            .physics
            .set_position(id, Vec2::new(session.platform.x, top - size.height / 2.0));
        session.blocks.get_mut(&id).expect("block exists").landed = true;
        add_to_stack(session, id);
        id
    }

    #[test]
    fn test_spawn_is_guarded() {
        let mut s = session();
        let first = spawn_next_block(&mut s);
        assert!(first.is_some());
        assert_eq!(s.phase, GamePhase::Dropping);
        assert_eq!(spawn_next_block(&mut s), None);
        assert_eq!(s.blocks_dropped, 1);
    }

    #[test]
    fn test_spawn_inside_margins() {
        let mut s = session();
        for _ in 0..20 {
            let id = spawn_next_block(&mut s).expect("spawned");
            let pos = s.physics.position(id).expect("in world");
            let half = s.blocks[&id].size.width / 2.0;
            assert!(pos.x >= half + BLOCK_SPAWN_MARGIN - 0.001);
            assert!(pos.x <= s.config.canvas_width - half - BLOCK_SPAWN_MARGIN + 0.001);
            assert_eq!(pos.y, BLOCK_SPAWN_Y);
            s.current_block = None;
        }
    }

    #[test]
    fn test_late_blocks_use_smallest_size_and_color() {
        let mut s = session();
        let table_len = s.config.block_sizes.len() as u32;
        let mut ids = Vec::new();
        for _ in 0..table_len + 3 {
            ids.push(spawn_next_block(&mut s).expect("spawned"));
            s.current_block = None;
        }
        let reference = &s.blocks[&ids[table_len as usize - 1]];
        for id in &ids[table_len as usize..] {
            let block = &s.blocks[id];
            assert_eq!(block.size, reference.size);
            assert_eq!(block.color_index, reference.color_index);
        }
    }

    #[test]
    fn test_lock_all_at_threshold() {
        let mut s = session();
        for _ in 0..4 {
            spawn_next_block(&mut s);
            stack_current(&mut s);
        }
        assert!(s.locked_blocks.is_empty());

        spawn_next_block(&mut s);
        stack_current(&mut s);
        assert_eq!(s.blocks_stacked(), 5);
        assert_eq!(s.locked_blocks.len(), 5);
        for id in &s.stack {
            assert!(s.blocks[id].lock_marker);
        }
        assert!(s.drain_cues().contains(&AudioCue::Lock));
    }

    #[test]
    fn test_lock_does_not_repeat_below_next_threshold() {
        let mut s = session();
        for _ in 0..6 {
            spawn_next_block(&mut s);
            stack_current(&mut s);
        }
        // Sixth block stays unlocked until the stack reaches ten
        let sixth = *s.stack.last().expect("stacked");
        assert!(!s.is_locked(sixth));
        assert_eq!(check_stack_lock(&mut s), 0);
    }

    #[test]
    fn test_height_tracks_stack_and_max() {
        let mut s = session();
        spawn_next_block(&mut s);
        let id = stack_current(&mut s);
        assert!(s.current_height > 0);
        let height = s.current_height;
        assert_eq!(s.max_height, height);

        remove_from_stack(&mut s, id);
        assert_eq!(s.current_height, 0);
        assert_eq!(s.max_height, height);
    }

    #[test]
    fn test_glue_moves_stacked_blocks_only() {
        let mut s = session();
        spawn_next_block(&mut s);
        let glued = stack_current(&mut s);
        let before = s.physics.position(glued).expect("in world");

        s.target_x = s.platform.x + 100.0;
        update_platform(&mut s);
        let moved = s.platform.velocity;
        assert!((moved - 20.0).abs() < 0.001);

        let after = s.physics.position(glued).expect("in world");
        assert!((after.x - before.x - moved).abs() < 0.001);
        assert_eq!(after.y, before.y);
    }

    #[test]
    fn test_platform_clamped_to_field() {
        let mut s = session();
        s.target_x = -1000.0;
        for _ in 0..200 {
            update_platform(&mut s);
        }
        assert!((s.platform.x - (s.platform.half_width + PLATFORM_EDGE_MARGIN)).abs() < 0.001);
    }

    #[test]
    fn test_detachment_skips_locked_and_supported() {
        let mut s = session();
        spawn_next_block(&mut s);
        let id = stack_current(&mut s);
        // Resting on the platform
        assert!(!check_detachment(&mut s, id));

        // Far off to the side and below: slides away
        s.physics.set_position(id, Vec2::new(20.0, s.config.canvas_height));
        assert!(check_detachment(&mut s, id));
        assert!(s.blocks[&id].detached);

        // Locked blocks never detach
        spawn_next_block(&mut s);
        let locked = stack_current(&mut s);
        s.locked_blocks.insert(locked);
        s.physics.set_position(locked, Vec2::new(780.0, s.config.canvas_height));
        assert!(!check_detachment(&mut s, locked));
    }

    #[test]
    fn test_projectile_spawn_above_field() {
        let mut s = session();
        let id = spawn_projectile(&mut s).expect("spawned");
        let pos = s.physics.position(id).expect("in world");
        assert!(pos.y < 0.0);
        assert!(s.projectiles[&id].spawn_vel.y > 0.0);
        assert!(matches!(
            s.drain_cues().as_slice(),
            [AudioCue::ProjectileLaunch(_)]
        ));
    }
}
