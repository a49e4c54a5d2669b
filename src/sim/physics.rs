//! rapier2d physics world adapter
//!
//! Owns the rapier sets and maps colliders to typed [`BodyTag`]s so the
//! collision router never has to inspect rapier handles. Coordinates are
//! screen space: x to the right, y downward, gravity positive.

use std::collections::HashMap;

use glam::Vec2;
use rapier2d::prelude::*;

use super::state::EntityId;
use crate::consts::*;
use crate::tuning::{BlockSize, Material, ProjectileShape, ProjectileSpec};

/// What a physics body is, resolved once when the body is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyTag {
    Platform,
    Wall,
    FloorSensor,
    Block(EntityId),
    Projectile(EntityId),
}

/// Contact notification produced by a physics step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    /// Two bodies started touching
    Began(BodyTag, BodyTag),
    /// A body lost contact with something (one event per surviving side)
    Separated(BodyTag),
}

/// Axis-aligned bounds of a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    /// Overlap test with `tolerance` pixels of slack on every side
    pub fn touches(&self, other: &Bounds, tolerance: f32) -> bool {
        !(self.max.x < other.min.x - tolerance
            || self.min.x > other.max.x + tolerance
            || self.max.y < other.min.y - tolerance
            || self.min.y > other.max.y + tolerance)
    }
}

/// Launch parameters for a projectile body
#[derive(Debug, Clone, Copy)]
pub struct ProjectileLaunch {
    pub pos: Vec2,
    pub vel: Vec2,
    pub angvel: f32,
}

fn to_vector(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

fn to_vec2(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

/// Manages the rapier simulation for one session
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    platform: Option<RigidBodyHandle>,
    /// Maps session entities to rapier bodies
    entity_to_body: HashMap<EntityId, RigidBodyHandle>,
    /// Maps rapier colliders to tags for collision lookup
    collider_tags: HashMap<ColliderHandle, BodyTag>,
}

impl PhysicsWorld {
    /// Create an empty world with downward gravity (px/s²)
    pub fn new(gravity: f32) -> Self {
        let integration_params = IntegrationParameters {
            length_unit: PHYSICS_LENGTH_UNIT,
            ..IntegrationParameters::default()
        };
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![0.0, gravity],
            integration_params,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            platform: None,
            entity_to_body: HashMap::new(),
            collider_tags: HashMap::new(),
        }
    }

    fn attach(&mut self, collider: Collider, body: RigidBodyHandle, tag: BodyTag) {
        let handle = self
            .collider_set
            .insert_with_parent(collider, body, &mut self.rigid_body_set);
        self.collider_tags.insert(handle, tag);
    }

    /// Kinematic platform with a base and two raised bumpers
    pub fn add_platform(&mut self, center: Vec2, width: f32, height: f32) {
        let body = RigidBodyBuilder::kinematic_position_based()
            .translation(to_vector(center))
            .build();
        let handle = self.rigid_body_set.insert(body);

        let base = ColliderBuilder::round_cuboid(width / 2.0 - 4.0, height / 2.0 - 4.0, 4.0)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.attach(base, handle, BodyTag::Platform);

        for side in [-1.0, 1.0] {
            let bumper = ColliderBuilder::round_cuboid(3.0, 8.0, 2.0)
                .translation(vector![side * (width / 2.0 + 3.0), -12.0])
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build();
            self.attach(bumper, handle, BodyTag::Platform);
        }

        self.platform = Some(handle);
    }

    /// Side walls and the floor sensor below the canvas
    pub fn add_bounds(&mut self, canvas_width: f32, canvas_height: f32) {
        for x in [-WALL_THICKNESS / 2.0, canvas_width + WALL_THICKNESS / 2.0] {
            let body = RigidBodyBuilder::fixed()
                .translation(vector![x, canvas_height / 2.0])
                .build();
            let handle = self.rigid_body_set.insert(body);
            let wall = ColliderBuilder::cuboid(WALL_THICKNESS / 2.0, canvas_height).build();
            self.attach(wall, handle, BodyTag::Wall);
        }

        let body = RigidBodyBuilder::fixed()
            .translation(vector![canvas_width / 2.0, canvas_height + FLOOR_SENSOR_OFFSET])
            .build();
        let handle = self.rigid_body_set.insert(body);
        let floor = ColliderBuilder::cuboid(canvas_width, FLOOR_SENSOR_THICKNESS / 2.0)
            .sensor(true)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.attach(floor, handle, BodyTag::FloorSensor);
    }

    /// Dynamic block body
    pub fn add_block(
        &mut self,
        id: EntityId,
        center: Vec2,
        size: BlockSize,
        material: Material,
        density: f32,
        restitution: f32,
    ) {
        let body = RigidBodyBuilder::dynamic()
            .translation(to_vector(center))
            .linear_damping(material.linear_damping)
            .ccd_enabled(true)
            .build();
        let handle = self.rigid_body_set.insert(body);

        let border = 4.0_f32.min(size.width / 4.0).min(size.height / 4.0);
        let collider = ColliderBuilder::round_cuboid(
            size.width / 2.0 - border,
            size.height / 2.0 - border,
            border,
        )
        .friction(material.friction)
        .restitution(restitution)
        .density(density)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .build();
        self.attach(collider, handle, BodyTag::Block(id));
        self.entity_to_body.insert(id, handle);
    }

    /// Dynamic projectile body shaped after its kind
    pub fn add_projectile(&mut self, id: EntityId, spec: &ProjectileSpec, launch: ProjectileLaunch) {
        let body = RigidBodyBuilder::dynamic()
            .translation(to_vector(launch.pos))
            .linvel(to_vector(launch.vel))
            .angvel(launch.angvel)
            .ccd_enabled(true)
            .build();
        let handle = self.rigid_body_set.insert(body);

        let builder = match spec.shape {
            ProjectileShape::Circle => ColliderBuilder::ball(spec.size),
            ProjectileShape::Polygon { sides } => {
                let points = regular_polygon(sides, spec.size);
                ColliderBuilder::convex_hull(&points).unwrap_or_else(|| ColliderBuilder::ball(spec.size))
            }
            ProjectileShape::Rectangle { width, height } => {
                ColliderBuilder::cuboid(spec.size * width / 2.0, spec.size * height / 2.0)
            }
        };
        let collider = builder
            .friction(0.3)
            .restitution(spec.restitution)
            .density(spec.density)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        self.attach(collider, handle, BodyTag::Projectile(id));
        self.entity_to_body.insert(id, handle);
    }

    /// Remove an entity's body and colliders. Returns false if it was already gone.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(handle) = self.entity_to_body.remove(&id) else {
            return false;
        };
        if let Some(body) = self.rigid_body_set.get(handle) {
            for collider in body.colliders() {
                self.collider_tags.remove(collider);
            }
        }
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        true
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entity_to_body.contains_key(&id)
    }

    fn body(&self, id: EntityId) -> Option<&RigidBody> {
        self.entity_to_body
            .get(&id)
            .and_then(|h| self.rigid_body_set.get(*h))
    }

    fn body_mut(&mut self, id: EntityId) -> Option<&mut RigidBody> {
        let handle = *self.entity_to_body.get(&id)?;
        self.rigid_body_set.get_mut(handle)
    }

    /// Move the platform; takes effect during the next step
    pub fn move_platform(&mut self, center: Vec2) {
        if let Some(body) = self.platform.and_then(|h| self.rigid_body_set.get_mut(h)) {
            body.set_next_kinematic_translation(to_vector(center));
        }
    }

    pub fn position(&self, id: EntityId) -> Option<Vec2> {
        self.body(id).map(|b| to_vec2(b.translation()))
    }

    /// Shift a body without touching its velocity
    pub fn translate(&mut self, id: EntityId, delta: Vec2) {
        if let Some(body) = self.body_mut(id) {
            let moved = body.translation() + to_vector(delta);
            body.set_translation(moved, true);
        }
    }

    pub fn set_position(&mut self, id: EntityId, pos: Vec2) {
        if let Some(body) = self.body_mut(id) {
            body.set_translation(to_vector(pos), true);
        }
    }

    pub fn velocity(&self, id: EntityId) -> Option<Vec2> {
        self.body(id).map(|b| to_vec2(b.linvel()))
    }

    pub fn set_velocity(&mut self, id: EntityId, vel: Vec2) {
        if let Some(body) = self.body_mut(id) {
            body.set_linvel(to_vector(vel), true);
        }
    }

    pub fn angular_velocity(&self, id: EntityId) -> Option<f32> {
        self.body(id).map(|b| b.angvel())
    }

    pub fn set_angular_velocity(&mut self, id: EntityId, angvel: f32) {
        if let Some(body) = self.body_mut(id) {
            body.set_angvel(angvel, true);
        }
    }

    pub fn mass(&self, id: EntityId) -> Option<f32> {
        self.body(id).map(|b| b.mass())
    }

    /// Multiply a body's mass by `factor`
    pub fn scale_mass(&mut self, id: EntityId, factor: f32) {
        let Some(handle) = self.entity_to_body.get(&id).copied() else {
            return;
        };
        let collider_mass: f32 = self
            .rigid_body_set
            .get(handle)
            .map(|b| {
                b.colliders()
                    .iter()
                    .filter_map(|c| self.collider_set.get(*c))
                    .map(|c| c.mass())
                    .sum()
            })
            .unwrap_or(0.0);
        if let Some(body) = self.rigid_body_set.get_mut(handle) {
            body.set_additional_mass(collider_mass * (factor - 1.0).max(0.0), true);
        }
    }

    /// Apply friction and damping to a body and its colliders
    pub fn set_material(&mut self, id: EntityId, material: Material) {
        let Some(handle) = self.entity_to_body.get(&id).copied() else {
            return;
        };
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return;
        };
        body.set_linear_damping(material.linear_damping);
        let colliders: Vec<ColliderHandle> = body.colliders().to_vec();
        for handle in colliders {
            if let Some(collider) = self.collider_set.get_mut(handle) {
                collider.set_friction(material.friction);
            }
        }
    }

    pub fn apply_impulse(&mut self, id: EntityId, impulse: Vec2) {
        if let Some(body) = self.body_mut(id) {
            body.apply_impulse(to_vector(impulse), true);
        }
    }

    /// Bounds of an entity's colliders
    pub fn bounds(&self, id: EntityId) -> Option<Bounds> {
        let body = self.body(id)?;
        let mut bounds: Option<Bounds> = None;
        for handle in body.colliders() {
            let Some(collider) = self.collider_set.get(*handle) else {
                continue;
            };
            let aabb = collider.compute_aabb();
            let (min, max) = (
                Vec2::new(aabb.mins.x, aabb.mins.y),
                Vec2::new(aabb.maxs.x, aabb.maxs.y),
            );
            bounds = Some(match bounds {
                Some(b) => Bounds {
                    min: b.min.min(min),
                    max: b.max.max(max),
                },
                None => Bounds { min, max },
            });
        }
        bounds
    }

    /// Step the simulation by `dt` seconds of physics time.
    ///
    /// Contact events are returned in delivery order. Events involving a
    /// collider removed before the step are dropped (or reduced to the
    /// surviving side for separations).
    pub fn step(&mut self, dt: f32) -> Vec<ContactEvent> {
        self.integration_params.dt = dt;

        let (collision_send, collision_recv) =
            rapier2d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) =
            rapier2d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &event_handler,
        );

        let mut events = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            match event {
                CollisionEvent::Started(h1, h2, _flags) => {
                    let a = self.collider_tags.get(&h1).copied();
                    let b = self.collider_tags.get(&h2).copied();
                    if let (Some(a), Some(b)) = (a, b) {
                        events.push(ContactEvent::Began(a, b));
                    }
                }
                CollisionEvent::Stopped(h1, h2, _flags) => {
                    for handle in [h1, h2] {
                        if let Some(tag) = self.collider_tags.get(&handle) {
                            events.push(ContactEvent::Separated(*tag));
                        }
                    }
                }
            }
        }
        events
    }

    /// Number of rapier bodies, including platform, walls and floor
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }
}

fn regular_polygon(sides: u8, radius: f32) -> Vec<Point<Real>> {
    let sides = sides.max(3);
    (0..sides)
        .map(|i| {
            let theta = std::f32::consts::TAU * i as f32 / sides as f32 - std::f32::consts::FRAC_PI_2;
            point![radius * theta.cos(), radius * theta.sin()]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::ProjectileKind;

    fn material() -> Material {
        Material {
            friction: 0.9,
            linear_damping: 0.0,
        }
    }

    #[test]
    fn test_bounds_touch_tolerance() {
        let a = Bounds {
            min: Vec2::new(0.0, 0.0),
            max: Vec2::new(10.0, 10.0),
        };
        let near = Bounds {
            min: Vec2::new(14.0, 0.0),
            max: Vec2::new(20.0, 10.0),
        };
        let far = Bounds {
            min: Vec2::new(16.0, 0.0),
            max: Vec2::new(20.0, 10.0),
        };
        assert!(a.touches(&near, 5.0));
        assert!(!a.touches(&far, 5.0));
    }

    #[test]
    fn test_block_falls_under_gravity() {
        let mut world = PhysicsWorld::new(250.0);
        let id = EntityId(1);
        world.add_block(id, Vec2::new(100.0, 40.0), BlockSize::new(60.0, 30.0), material(), 0.001, 0.0);
        for _ in 0..30 {
            world.step(1.0 / 60.0);
        }
        let pos = world.position(id).expect("block exists");
        assert!(pos.y > 40.0);
    }

    #[test]
    fn test_world_uses_pixel_length_unit() {
        let world = PhysicsWorld::new(250.0);
        assert_eq!(world.integration_params.length_unit, PHYSICS_LENGTH_UNIT);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut world = PhysicsWorld::new(250.0);
        let spec = ProjectileKind::Star.spec();
        let id = EntityId(3);
        world.add_projectile(
            id,
            &spec,
            ProjectileLaunch {
                pos: Vec2::new(50.0, -20.0),
                vel: Vec2::ZERO,
                angvel: 0.0,
            },
        );
        assert!(world.contains(id));
        assert!(world.remove(id));
        assert!(!world.remove(id));
        assert!(world.position(id).is_none());
    }

    #[test]
    fn test_block_lands_on_platform() {
        let mut world = PhysicsWorld::new(500.0);
        world.add_platform(Vec2::new(200.0, 300.0), 220.0, 18.0);
        let id = EntityId(1);
        world.add_block(id, Vec2::new(200.0, 250.0), BlockSize::new(60.0, 30.0), material(), 0.001, 0.0);

        let mut landed = false;
        for _ in 0..240 {
            for event in world.step(1.0 / 60.0) {
                if let ContactEvent::Began(a, b) = event {
                    let pair = [a, b];
                    if pair.contains(&BodyTag::Platform) && pair.contains(&BodyTag::Block(id)) {
                        landed = true;
                    }
                }
            }
        }
        assert!(landed, "block should touch the platform");
    }

    #[test]
    fn test_translate_keeps_velocity() {
        let mut world = PhysicsWorld::new(0.0);
        let id = EntityId(1);
        world.add_block(id, Vec2::new(100.0, 100.0), BlockSize::new(40.0, 20.0), material(), 0.001, 0.0);
        world.set_velocity(id, Vec2::new(5.0, 0.0));
        world.translate(id, Vec2::new(10.0, 0.0));
        assert_eq!(world.position(id), Some(Vec2::new(110.0, 100.0)));
        assert_eq!(world.velocity(id), Some(Vec2::new(5.0, 0.0)));
    }
}
