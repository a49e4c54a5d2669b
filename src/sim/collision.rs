//! Contact routing
//!
//! Every contact pair is classified once into ordered [`Contact`]s and then
//! dispatched to the matching handler. Routing stops as soon as the session
//! ends.

use glam::Vec2;
use rand::Rng;

use super::cues::AudioCue;
use super::physics::{BodyTag, ContactEvent};
use super::stack;
use super::state::{BlockFlash, EntityId, GamePhase, Session};
use super::tick;
use super::timers::TimerAction;

/// Random spin added to a block that takes a hit (rad/s, ±half)
const HIT_SPIN: f32 = 3.6;
const HIT_SPIN_LOCKED: f32 = 1.2;

/// Scale of the velocity damping applied when a block lands
const LANDING_DAMPING: Vec2 = Vec2::new(0.3, 0.5);
const LANDING_SPIN_DAMPING: f32 = 0.3;

/// A classified contact, oriented subject first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    /// The falling block touched the platform or the stack
    Landed { block: EntityId },
    ProjectileHitBlock {
        projectile: EntityId,
        block: EntityId,
    },
    ProjectileHitPlatform { projectile: EntityId },
    /// Something reached the floor sensor
    Fell { body: BodyTag },
}

/// Whether `tag` is something a falling block can come to rest on
fn supports_landing(session: &Session, tag: BodyTag) -> bool {
    match tag {
        BodyTag::Platform => true,
        BodyTag::Block(id) => session.is_stacked(id),
        _ => false,
    }
}

/// Classify a contact pair, highest priority first.
///
/// A pair can yield more than one contact: a block touching both the stack
/// and a projectile is reported as a landing before the hit.
pub fn classify(session: &Session, a: BodyTag, b: BodyTag) -> Vec<Contact> {
    let mut contacts = Vec::new();
    let orientations = [(a, b), (b, a)];

    for (subject, object) in orientations {
        if let BodyTag::Block(id) = subject
            && session.current_block == Some(id)
            && supports_landing(session, object)
        {
            contacts.push(Contact::Landed { block: id });
            break;
        }
    }

    for (subject, object) in orientations {
        if let (BodyTag::Projectile(projectile), BodyTag::Block(block)) = (subject, object) {
            contacts.push(Contact::ProjectileHitBlock { projectile, block });
            break;
        }
    }

    for (subject, object) in orientations {
        if let (BodyTag::Projectile(projectile), BodyTag::Platform) = (subject, object) {
            contacts.push(Contact::ProjectileHitPlatform { projectile });
            break;
        }
    }

    match (a, b) {
        (BodyTag::FloorSensor, BodyTag::FloorSensor) => {}
        (BodyTag::FloorSensor, body) | (body, BodyTag::FloorSensor) => {
            contacts.push(Contact::Fell { body });
        }
        _ => {}
    }

    contacts
}

/// Dispatch the events of one physics step
pub fn route_contacts(session: &mut Session, events: &[ContactEvent]) {
    for event in events {
        if session.is_game_over() {
            return;
        }
        match *event {
            ContactEvent::Began(a, b) => {
                for contact in classify(session, a, b) {
                    if session.is_game_over() {
                        return;
                    }
                    dispatch(session, contact);
                }
            }
            ContactEvent::Separated(BodyTag::Block(id)) => {
                stack::check_detachment(session, id);
            }
            ContactEvent::Separated(_) => {}
        }
    }
}

fn dispatch(session: &mut Session, contact: Contact) {
    match contact {
        Contact::Landed { block } => handle_block_landed(session, block),
        Contact::ProjectileHitBlock { projectile, block } => {
            handle_projectile_hit(session, projectile, block)
        }
        Contact::ProjectileHitPlatform { projectile } => handle_platform_hit(session, projectile),
        Contact::Fell { body } => handle_body_fallen(session, body),
    }
}

/// The falling block came to rest: stack it and start the settle pause
pub fn handle_block_landed(session: &mut Session, id: EntityId) {
    if session.is_game_over() {
        return;
    }
    match session.blocks.get_mut(&id) {
        Some(block) if !block.landed => block.landed = true,
        _ => return,
    }

    let physics = &mut session.physics;
    physics.set_material(id, session.config.landed);
    if let Some(vel) = physics.velocity(id) {
        physics.set_velocity(id, vel * LANDING_DAMPING);
    }
    if let Some(angvel) = physics.angular_velocity(id) {
        physics.set_angular_velocity(id, angvel * LANDING_SPIN_DAMPING);
    }

    if stack::add_to_stack(session, id) {
        let size_index = session.config.size_index(session.blocks_dropped) as f32;
        let table_len = session.config.block_sizes.len().max(1) as f32;
        let intensity = 1.0 - (size_index / table_len) * 0.5;

        session.push_cue(AudioCue::Landing { intensity });
        session.push_cue(AudioCue::Stack {
            height: session.current_height,
        });
        session.shake(3.0 + intensity * 3.0);
        log::debug!(
            "Block {:?} landed, stack of {} at {}px",
            id,
            session.blocks_stacked(),
            session.current_height
        );
    }

    if session.current_block == Some(id) {
        session.current_block = None;
    }
    if !session.is_game_over() {
        session.phase = GamePhase::Settling;
        session.schedule(session.config.settle_delay_ms, TimerAction::SettleElapsed);
    }
}

/// Knockback impulse for a projectile hit, before velocity scaling.
///
/// `direction` is +1 when the block is right of the projectile. Locked and
/// landed blocks take a reduced share.
pub fn knockback_impulse(
    impact_force: f32,
    direction: f32,
    mass: f32,
    locked: bool,
    landed: bool,
) -> Vec2 {
    let mut force = impact_force * 0.6;
    if locked {
        force *= 0.15;
    }
    if landed {
        force *= 0.5;
    }
    Vec2::new(direction * force * mass * 0.8, -force * mass * 0.15)
}

/// A projectile struck a block
pub fn handle_projectile_hit(session: &mut Session, projectile: EntityId, block: EntityId) {
    if session.is_game_over() {
        return;
    }
    let Some(kind) = session.projectiles.get(&projectile).map(|p| p.kind) else {
        return;
    };
    let Some(landed) = session.blocks.get(&block).map(|b| b.landed) else {
        return;
    };
    let (Some(block_pos), Some(projectile_pos)) =
        (session.position(block), session.position(projectile))
    else {
        return;
    };

    let locked = session.is_locked(block);
    let direction = if block_pos.x > projectile_pos.x { 1.0 } else { -1.0 };
    let mass = session.physics.mass(block).unwrap_or(0.0);
    let impulse = knockback_impulse(kind.spec().impact_force, direction, mass, locked, landed)
        * session.config.impact_velocity_scale;
    session.physics.apply_impulse(block, impulse);

    let spin = if locked { HIT_SPIN_LOCKED } else { HIT_SPIN };
    let angvel = (session.rng.random::<f32>() - 0.5) * spin;
    session.physics.set_angular_velocity(block, angvel);

    session.push_cue(AudioCue::Impact(kind));
    session.shake(if locked { 4.0 } else { 8.0 });

    if let Some(b) = session.blocks.get_mut(&block) {
        b.flash = Some(if locked {
            BlockFlash::LockedHit
        } else {
            BlockFlash::Hit
        });
    }
    session.schedule(
        session.config.hit_flash_ms,
        TimerAction::ClearBlockFlash(block),
    );

    log::debug!(
        "{} hit block {:?} (locked: {}, impulse {:.1})",
        kind.as_str(),
        block,
        locked,
        impulse.length()
    );
    schedule_projectile_removal(session, projectile);
}

/// A projectile struck the platform: lose a life unless invulnerable
pub fn handle_platform_hit(session: &mut Session, projectile: EntityId) {
    if session.is_game_over() || !session.projectiles.contains_key(&projectile) {
        return;
    }
    schedule_projectile_removal(session, projectile);
    if session.invulnerable {
        return;
    }

    session.lives = session.lives.saturating_sub(1);
    session.push_cue(AudioCue::LoseLife);
    session.shake(12.0);
    log::info!("Platform hit, {} lives left", session.lives);

    if session.lives == 0 {
        tick::end_game(session);
        return;
    }

    session.invulnerable = true;
    session.platform.flash_on = true;
    session.schedule(
        session.config.invulnerability_flash_ms,
        TimerAction::InvulnerabilityFlash { count: 1 },
    );
}

/// Step the invulnerability flash; the last step ends invulnerability
pub fn handle_invulnerability_flash(session: &mut Session, count: u32) {
    if count >= session.config.invulnerability_flashes.max(1) {
        session.platform.flash_on = false;
        session.invulnerable = false;
        return;
    }
    session.platform.flash_on = count % 2 == 0;
    session.schedule(
        session.config.invulnerability_flash_ms,
        TimerAction::InvulnerabilityFlash { count: count + 1 },
    );
}

/// Despawn a projectile after the impact beat. Repeated hits keep the first
/// pending removal.
pub fn schedule_projectile_removal(session: &mut Session, id: EntityId) {
    match session.projectiles.get(&id) {
        Some(p) if p.removal.is_none() => {}
        _ => return,
    }
    let handle = session.schedule(
        session.config.projectile_removal_delay_ms,
        TimerAction::RemoveProjectile(id),
    );
    if let Some(p) = session.projectiles.get_mut(&id) {
        p.removal = Some(handle);
    }
}

/// Remove a projectile from the session and the world. No-op if it is
/// already gone.
pub fn remove_projectile(session: &mut Session, id: EntityId) -> bool {
    let Some(projectile) = session.projectiles.remove(&id) else {
        return false;
    };
    if let Some(handle) = projectile.removal {
        session.timers.cancel(handle);
    }
    session.physics.remove(id);
    true
}

/// Something left the play field
pub fn handle_body_fallen(session: &mut Session, body: BodyTag) {
    match body {
        BodyTag::Block(id) => handle_block_fallen(session, id),
        BodyTag::Projectile(id) => {
            remove_projectile(session, id);
        }
        BodyTag::Platform | BodyTag::Wall | BodyTag::FloorSensor => {}
    }
}

fn handle_block_fallen(session: &mut Session, id: EntityId) {
    let Some(block) = session.blocks.remove(&id) else {
        return;
    };
    stack::remove_from_stack(session, id);
    session.physics.remove(id);

    let was_current = session.current_block == Some(id);
    if was_current {
        session.current_block = None;
    }
    if session.is_game_over() {
        return;
    }

    if block.landed && session.blocks_dropped >= 1 {
        log::info!("Stacked block {:?} fell off", id);
        lose_and_end(session);
    } else if was_current {
        log::info!("Block {} missed the platform", block.drop_index);
        lose_and_end(session);
    } else if session.stack.is_empty()
        && session.blocks_dropped > 2
        && session.phase != GamePhase::Settling
        && session.current_block.is_none()
    {
        log::info!("Stack lost");
        tick::end_game(session);
    }
}

fn lose_and_end(session: &mut Session) {
    session.push_cue(AudioCue::LoseLife);
    session.shake(15.0);
    tick::end_game(session);
}
