use crate::body::{Body, BodyId, BodyPatch, BodySnapshot};
use crate::error::{Result, SandboxError, require_positive};

use slotmap::SlotMap;
use ultraviolet::DVec2;

use std::collections::HashSet;

/// Ordered collection of bodies plus the snapshot restored on reset.
///
/// Callers address bodies by index; each body also carries a generational
/// [`BodyId`] so that removals can be detected instead of silently shifting
/// a reference onto the next body.
#[derive(Debug, Default)]
pub struct BodyStore {
    bodies: Vec<Body>,
    /// Maps each live id to its current index in `bodies`.
    slots: SlotMap<BodyId, usize>,
    initial: Vec<Body>,
}

impl BodyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from `bodies` and takes them as the initial snapshot.
    pub fn with_bodies(bodies: impl IntoIterator<Item = Body>) -> Result<Self> {
        let mut store = Self::new();
        for body in bodies {
            store.append(body)?;
        }
        store.capture_initial();
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub(crate) fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    /// Read-only snapshot of every body, in store order.
    pub fn list(&self) -> Vec<BodySnapshot> {
        self.bodies.iter().map(Body::snapshot).collect()
    }

    /// Appends a body, assigning it a fresh id. Returns its index.
    pub fn append(&mut self, mut body: Body) -> Result<usize> {
        check_body(&body)?;
        let index = self.bodies.len();
        body.id = self.slots.insert(index);
        self.bodies.push(body);
        Ok(index)
    }

    pub fn get(&self, index: usize) -> Result<&Body> {
        let len = self.bodies.len();
        self.bodies
            .get(index)
            .ok_or(SandboxError::IndexOutOfRange { index, len })
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Result<&mut Body> {
        let len = self.bodies.len();
        self.bodies
            .get_mut(index)
            .ok_or(SandboxError::IndexOutOfRange { index, len })
    }

    /// Applies a partial update. The patch is validated in full before any
    /// field is written.
    pub fn replace(&mut self, index: usize, patch: BodyPatch) -> Result<()> {
        let mut updated = *self.get(index)?;
        if let Some(pos) = patch.pos {
            updated.pos = pos;
        }
        if let Some(vel) = patch.vel {
            updated.vel = vel;
        }
        if let Some(mass) = patch.mass {
            updated.mass = mass;
        }
        if let Some(radius) = patch.radius {
            updated.radius = radius;
        }
        if let Some(size) = patch.size {
            updated.size = size;
        }
        if let Some(kind) = patch.kind {
            updated.kind = kind;
        }
        if let Some(elasticity) = patch.elasticity {
            updated.elasticity = elasticity;
        }
        if let Some(possessed) = patch.possessed {
            updated.possessed = possessed;
        }
        check_body(&updated)?;
        self.bodies[index] = updated;
        Ok(())
    }

    pub fn index_of(&self, id: BodyId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    pub fn id_at(&self, index: usize) -> Result<BodyId> {
        self.get(index).map(|body| body.id)
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.slots.contains_key(id)
    }

    /// Removes a body, keeping the order of the others. Indices after it shift down by one.
    pub fn remove(&mut self, id: BodyId) -> Option<Body> {
        let index = self.slots.remove(id)?;
        let removed = self.bodies.remove(index);
        debug_assert_eq!(removed.id, id);
        for (offset, body) in self.bodies[index..].iter().enumerate() {
            self.slots[body.id] = index + offset;
        }
        Some(removed)
    }

    /// Replaces the initial snapshot with the current bodies, at rest and free.
    pub fn capture_initial(&mut self) {
        self.initial = self.bodies.iter().copied().map(at_rest).collect();
    }

    pub fn initial(&self) -> &[Body] {
        &self.initial
    }

    /// Restores every body from the initial snapshot with zero velocity.
    ///
    /// Bodies that survived since the snapshot keep their id; bodies spawned
    /// since are dropped and removed ones come back under a fresh id.
    pub fn reset(&mut self) {
        let restored: HashSet<BodyId> = self.initial.iter().map(|body| body.id).collect();
        for body in &self.bodies {
            if !restored.contains(&body.id) {
                self.slots.remove(body.id);
            }
        }

        self.bodies.clear();
        for (index, template) in self.initial.iter_mut().enumerate() {
            match self.slots.get_mut(template.id) {
                Some(slot) => *slot = index,
                None => template.id = self.slots.insert(index),
            }
            self.bodies.push(at_rest(*template));
        }
    }
}

fn at_rest(mut body: Body) -> Body {
    body.vel = DVec2::zero();
    body.possessed = false;
    body
}

fn check_body(body: &Body) -> Result<()> {
    require_positive("mass", body.mass)?;
    require_positive("radius", body.radius)?;
    require_positive("size", body.size)?;
    if !(body.elasticity.is_finite() && body.elasticity >= 0.0) {
        return Err(SandboxError::invalid(
            "elasticity",
            body.elasticity,
            "must be finite and non-negative",
        ));
    }
    if !(body.pos.x.is_finite() && body.pos.y.is_finite()) {
        return Err(SandboxError::invalid(
            "position",
            if body.pos.x.is_finite() { body.pos.y } else { body.pos.x },
            "must be finite",
        ));
    }
    if !(body.vel.x.is_finite() && body.vel.y.is_finite()) {
        return Err(SandboxError::invalid(
            "velocity",
            if body.vel.x.is_finite() { body.vel.y } else { body.vel.x },
            "must be finite",
        ));
    }
    Ok(())
}
