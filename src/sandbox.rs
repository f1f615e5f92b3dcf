use crate::{
    body::{Body, BodyKind, BodyPatch, BodySnapshot},
    collision::CollisionResolver,
    config::{SandboxConfig, Status},
    error::{Result, SandboxError, require_finite, require_positive},
    integrator,
    possession::{Handoff, PossessionController},
    scene,
    spawn,
    store::BodyStore,
};

use ultraviolet::DVec2;

/// Parameters for [`Sandbox::spawn`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnRequest {
    pub x: f64,
    pub y: f64,
    pub mass: f64,
    /// User-facing size; the radius is `size * size_scale`.
    pub size: f64,
    /// Falls back to the configured default when `None`.
    pub elasticity: Option<f64>,
    pub kind: BodyKind,
}

impl SpawnRequest {
    pub const DEFAULT_MASS: f64 = 10.0;
    pub const DEFAULT_SIZE: f64 = 10.0;

    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            mass: Self::DEFAULT_MASS,
            size: Self::DEFAULT_SIZE,
            elasticity: None,
            kind: BodyKind::Normal,
        }
    }

    pub fn mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn elasticity(mut self, elasticity: f64) -> Self {
        self.elasticity = Some(elasticity);
        self
    }

    pub fn kind(mut self, kind: BodyKind) -> Self {
        self.kind = kind;
        self
    }
}

/// One sandbox simulation: the body store, its configuration, the drag
/// controller and the collision resolver.
///
/// All operations take `&mut self`; callers that share a sandbox across
/// requests must serialize access themselves.
#[derive(Debug)]
pub struct Sandbox {
    config: SandboxConfig,
    store: BodyStore,
    possession: PossessionController,
    resolver: CollisionResolver,
    /// Ticks completed since creation.
    frame: u64,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    /// A sandbox with the default configuration and its generated starting scene.
    pub fn new() -> Self {
        let config = SandboxConfig::default();
        let bodies = scene::scatter(&config);
        Self::assemble(config, bodies)
    }

    /// A sandbox with a custom configuration and its generated starting scene.
    pub fn with_config(config: SandboxConfig) -> Result<Self> {
        config.validate()?;
        let bodies = scene::scatter(&config);
        Ok(Self::assemble(config, bodies))
    }

    /// A sandbox starting from the given bodies, which also become the reset target.
    pub fn with_bodies(config: SandboxConfig, bodies: Vec<Body>) -> Result<Self> {
        config.validate()?;
        let store = BodyStore::with_bodies(bodies)?;
        Ok(Self::from_store(config, store))
    }

    fn assemble(config: SandboxConfig, bodies: Vec<Body>) -> Self {
        let mut store = BodyStore::new();
        for body in bodies {
            if let Err(err) = store.append(body) {
                log::warn!("skipping generated body: {err}");
            }
        }
        store.capture_initial();
        Self::from_store(config, store)
    }

    fn from_store(config: SandboxConfig, store: BodyStore) -> Self {
        Self {
            config,
            store,
            possession: PossessionController::new(),
            resolver: CollisionResolver::new(),
            frame: 0,
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn store(&self) -> &BodyStore {
        &self.store
    }

    pub fn possession(&self) -> &PossessionController {
        &self.possession
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn body(&self, index: usize) -> Result<&Body> {
        self.store.get(index)
    }

    /// Snapshot of every body, in store order.
    pub fn bodies(&self) -> Vec<BodySnapshot> {
        self.store.list()
    }

    /// Advances the simulation by one tick and returns the new snapshot.
    ///
    /// 1. Removes explosive bodies that detonated during the previous tick.
    /// 2. Integrates gravity, decay, motion and walls for free bodies.
    /// 3. Re-applies the drag controller's position to the held body.
    /// 4. Resolves body-body collisions in a single pass.
    pub fn step(&mut self) -> Vec<BodySnapshot> {
        for id in self.resolver.take_detonated() {
            if let Some(body) = self.store.remove(id) {
                log::debug!(
                    "removed detonated body at ({:.1}, {:.1})",
                    body.pos.x,
                    body.pos.y
                );
            }
        }

        integrator::integrate(self.store.bodies_mut(), &self.config);
        self.possession.enforce(&mut self.store);
        self.resolver.resolve(self.store.bodies_mut(), &self.config);

        self.frame += 1;
        log::trace!("frame {} with {} bodies", self.frame, self.store.len());
        self.store.list()
    }

    /// External move of a body.
    ///
    /// Without a velocity this is a drag update: the body is possessed, moved
    /// to `(x, y)` and kept at rest. If a different body was being dragged it is
    /// let go at rest first. With a velocity this is a throw: the body is
    /// moved, given that velocity and freed.
    ///
    /// While a body is held, an index it was acquired at keeps referring to it
    /// even after removals shift it; see [`PossessionController::route`].
    pub fn move_body(&mut self, index: usize, x: f64, y: f64, vel: Option<(f64, f64)>) -> Result<()> {
        let pos = DVec2::new(require_finite("x", x)?, require_finite("y", y)?);
        match vel {
            None => self.drag(index, pos),
            Some((vx, vy)) => {
                let vel = DVec2::new(require_finite("vx", vx)?, require_finite("vy", vy)?);
                self.throw(index, pos, vel)
            }
        }
    }

    fn drag(&mut self, index: usize, pos: DVec2) -> Result<()> {
        match self.possession.drag(&mut self.store, index, pos) {
            Err(SandboxError::PossessionConflict { held }) => {
                log::warn!("drag moved from body {held} to body {index}; letting {held} go");
                self.possession
                    .release_with(&mut self.store, held, DVec2::zero())?;
                self.possession.drag(&mut self.store, index, pos)?;
            }
            other => {
                other?;
            }
        }
        Ok(())
    }

    fn throw(&mut self, index: usize, pos: DVec2, vel: DVec2) -> Result<()> {
        let Some(index) = self.possession.route(&self.store, index) else {
            // The thrown body was removed mid-drag; nothing left to throw.
            log::warn!("dropping throw of removed body (was index {index})");
            self.possession.clear();
            return Ok(());
        };

        let id = self.store.id_at(index)?;
        self.store.replace(
            index,
            BodyPatch {
                pos: Some(pos),
                vel: Some(vel),
                possessed: Some(false),
                ..Default::default()
            },
        )?;
        if self.possession.grab().is_some_and(|grab| grab.id == id) {
            self.possession.clear();
        }
        Ok(())
    }

    /// Takes control of a body without moving it.
    pub fn acquire(&mut self, index: usize) -> Result<()> {
        self.possession.acquire(&mut self.store, index)
    }

    /// Lets go of the held body, throwing it with the last drag delta times
    /// the configured throw factor. Silently does nothing if the body has
    /// since been removed.
    pub fn release(&mut self, index: usize) -> Result<Handoff> {
        self.possession
            .release(&mut self.store, index, self.config.throw_factor)
    }

    /// Sets a body's size and derives its radius from it.
    pub fn set_size(&mut self, index: usize, size: f64) -> Result<()> {
        let size = require_positive("size", size)?;
        self.store.replace(
            index,
            BodyPatch {
                size: Some(size),
                radius: Some(size * self.config.size_scale),
                ..Default::default()
            },
        )
    }

    /// Creates a body near the requested point, pushed clear of existing
    /// bodies, and returns its index.
    pub fn spawn(&mut self, request: SpawnRequest) -> Result<usize> {
        let x = require_finite("x", request.x)?;
        let y = require_finite("y", request.y)?;
        let mass = require_positive("mass", request.mass)?;
        let size = require_positive("size", request.size)?;
        let elasticity = self
            .config
            .check_elasticity(request.elasticity.unwrap_or(self.config.default_elasticity))?;

        let radius = size * self.config.size_scale;
        let placement = spawn::place(self.store.bodies(), DVec2::new(x, y), radius);
        let body = Body::new(placement.pos, DVec2::zero(), mass, radius)
            .with_size(size, self.config.size_scale)
            .with_kind(request.kind)
            .with_elasticity(elasticity);

        let index = self.store.append(body)?;
        log::debug!(
            "spawned {} body {index} at ({:.1}, {:.1}) after {} pushes",
            request.kind,
            placement.pos.x,
            placement.pos.y,
            placement.pushes
        );
        Ok(index)
    }

    pub fn toggle_gravity(&mut self) -> bool {
        self.config.toggle_gravity()
    }

    pub fn toggle_decay(&mut self) -> bool {
        self.config.toggle_decay()
    }

    pub fn set_gravity_force(&mut self, force: f64) -> Result<()> {
        self.config.set_gravity_force(force)
    }

    pub fn set_decay_factor(&mut self, factor: f64) -> Result<()> {
        self.config.set_decay_factor(factor)
    }

    /// Sets the elasticity of one body, or with no index the default for new
    /// spawns together with every existing body.
    pub fn set_elasticity(&mut self, elasticity: f64, index: Option<usize>) -> Result<()> {
        let elasticity = self.config.check_elasticity(elasticity)?;
        match index {
            Some(index) => self.store.replace(
                index,
                BodyPatch {
                    elasticity: Some(elasticity),
                    ..Default::default()
                },
            ),
            None => {
                self.config.set_default_elasticity(elasticity)?;
                for body in self.store.bodies_mut() {
                    body.elasticity = elasticity;
                }
                Ok(())
            }
        }
    }

    pub fn status(&self) -> Status {
        self.config.status()
    }

    /// Restores the initial snapshot. Any drag in progress is abandoned.
    pub fn reset(&mut self) {
        self.store.reset();
        self.possession.clear();
        self.resolver.clear();
        log::info!("reset to {} bodies", self.store.len());
    }

    /// Makes the current bodies the target of future resets.
    pub fn capture_initial(&mut self) {
        self.store.capture_initial();
        log::info!("captured {} bodies as the reset snapshot", self.store.len());
    }

    /// Index of the topmost body containing the point, if any.
    pub fn body_at(&self, x: f64, y: f64) -> Option<usize> {
        let point = DVec2::new(x, y);
        self.store
            .bodies()
            .iter()
            .rposition(|body| body.contains(point))
    }
}
