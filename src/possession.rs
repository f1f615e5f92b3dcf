use crate::body::BodyId;
use crate::error::{Result, SandboxError};
use crate::store::BodyStore;

use ultraviolet::DVec2;

/// The body currently held by an external controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grab {
    pub id: BodyId,
    /// Index the body had when acquired. Calls aimed at it keep reaching this
    /// body after removals elsewhere shift it, and are swallowed once the body
    /// itself is gone.
    pub index: usize,
    /// Last position written by the controller.
    pub pos: DVec2,
    /// Pointer position of the previous drag; `None` until the first drag.
    pub pointer: Option<DVec2>,
    /// Most recent frame-to-frame drag delta; becomes the throw velocity.
    pub delta: DVec2,
}

/// What happened to a possession request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handoff {
    /// The request was applied to the held body.
    Applied,
    /// The held body no longer exists; the stale reference was dropped.
    Dropped,
}

/// Tracks which body, if any, is being dragged. At most one at a time.
///
/// Only the id is held; the body itself always lives in the store.
#[derive(Debug, Default)]
pub struct PossessionController {
    grab: Option<Grab>,
}

impl PossessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grab(&self) -> Option<&Grab> {
        self.grab.as_ref()
    }

    /// Id of the held body, if it still exists.
    pub fn held(&self, store: &BodyStore) -> Option<BodyId> {
        self.grab
            .map(|grab| grab.id)
            .filter(|&id| store.contains(id))
    }

    /// Takes control of the body at `index`. Zeroes its velocity and the
    /// throw accumulator.
    ///
    /// Re-acquiring the held body, by its current index or the one it was
    /// acquired at, is a no-op. A stale grab (its body was removed) is
    /// discarded first.
    pub fn acquire(&mut self, store: &mut BodyStore, index: usize) -> Result<()> {
        let index = self.route(store, index).unwrap_or(index);
        let id = store.id_at(index)?;
        self.discard_stale(store);

        if let Some(grab) = self.grab {
            if grab.id == id {
                return Ok(());
            }
            let held = store.index_of(grab.id).unwrap_or(grab.index);
            return Err(SandboxError::PossessionConflict { held });
        }

        let body = store.get_mut(index)?;
        body.possessed = true;
        body.vel = DVec2::zero();
        self.grab = Some(Grab {
            id,
            index,
            pos: body.pos,
            pointer: None,
            delta: DVec2::zero(),
        });
        log::debug!("acquired body {index}");
        Ok(())
    }

    /// Moves the held body to `pos` and records the delta from the previous
    /// drag position. The first drag after acquiring records no motion. The
    /// body's own velocity stays zero.
    pub fn drag(&mut self, store: &mut BodyStore, index: usize, pos: DVec2) -> Result<Handoff> {
        let Some((index, grab)) = self.target(store, index, false)? else {
            return Ok(Handoff::Dropped);
        };

        let body = store.get_mut(index)?;
        body.pos = pos;
        body.vel = DVec2::zero();
        grab.delta = grab.pointer.map_or(DVec2::zero(), |last| pos - last);
        grab.pointer = Some(pos);
        grab.pos = pos;
        Ok(Handoff::Applied)
    }

    /// Frees the held body, giving it `delta * throw_factor` as velocity.
    pub fn release(
        &mut self,
        store: &mut BodyStore,
        index: usize,
        throw_factor: f64,
    ) -> Result<Handoff> {
        let Some((index, grab)) = self.target(store, index, true)? else {
            return Ok(Handoff::Dropped);
        };

        let throw = grab.delta * throw_factor;
        let body = store.get_mut(index)?;
        body.possessed = false;
        body.vel = throw;
        self.grab = None;
        log::debug!("released body {index} with velocity ({:.2}, {:.2})", throw.x, throw.y);
        Ok(Handoff::Applied)
    }

    /// Frees the held body with an explicit velocity instead of the accumulated delta.
    pub fn release_with(
        &mut self,
        store: &mut BodyStore,
        index: usize,
        vel: DVec2,
    ) -> Result<Handoff> {
        let Some((index, _)) = self.target(store, index, true)? else {
            return Ok(Handoff::Dropped);
        };

        let body = store.get_mut(index)?;
        body.possessed = false;
        body.vel = vel;
        self.grab = None;
        Ok(Handoff::Applied)
    }

    /// Re-applies the held position and zero velocity. Run once per tick after
    /// integration so nothing but the controller moves a held body.
    ///
    /// A grab whose body was removed is kept until the caller's next drag or
    /// release reaches it.
    pub fn enforce(&mut self, store: &mut BodyStore) {
        let Some(grab) = self.grab else {
            return;
        };
        let Some(index) = store.index_of(grab.id) else {
            return;
        };
        if let Ok(body) = store.get_mut(index) {
            body.possessed = true;
            body.pos = grab.pos;
            body.vel = DVec2::zero();
        }
    }

    /// Forgets the grab without touching the store, e.g. after a reset.
    pub fn clear(&mut self) {
        self.grab = None;
    }

    /// Index of the body a call aimed at `index` refers to.
    ///
    /// While a grab is live, calls aimed at the index it was acquired at, or at
    /// the held body's current index, go to the held body wherever it now sits.
    /// `None` means that body was removed. Other indices pass through.
    pub fn route(&self, store: &BodyStore, index: usize) -> Option<usize> {
        match self.grab {
            Some(grab) if grab.index == index || store.index_of(grab.id) == Some(index) => {
                store.index_of(grab.id)
            }
            _ => Some(index),
        }
    }

    /// Resolves the body and grab a call aimed at `index` refers to.
    ///
    /// `Ok(None)` means the call targets a body that no longer exists and must
    /// be swallowed; the stale grab survives drags so that the closing release
    /// is swallowed too, and `finishing` drops it. Calls for a body that isn't
    /// held fail with a conflict if another body is held, otherwise they are
    /// applied to a fresh grab.
    fn target(
        &mut self,
        store: &mut BodyStore,
        index: usize,
        finishing: bool,
    ) -> Result<Option<(usize, &mut Grab)>> {
        let Some(index) = self.route(store, index) else {
            if finishing {
                log::warn!("dropping possession of removed body (was index {index})");
                self.grab = None;
            }
            return Ok(None);
        };
        let id = store.id_at(index)?;
        self.discard_stale(store);

        match self.grab.map(|grab| (grab.id, grab.index)) {
            Some((held_id, held_index)) if held_id != id => {
                let held = store.index_of(held_id).unwrap_or(held_index);
                Err(SandboxError::PossessionConflict { held })
            }
            Some(_) => Ok(self.grab.as_mut().map(|grab| (index, grab))),
            None => {
                self.acquire(store, index)?;
                Ok(self.grab.as_mut().map(|grab| (index, grab)))
            }
        }
    }

    /// Drops a grab whose body was removed.
    fn discard_stale(&mut self, store: &BodyStore) {
        if let Some(grab) = self.grab {
            if !store.contains(grab.id) {
                log::warn!(
                    "dropping possession of removed body (was index {})",
                    grab.index
                );
                self.grab = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;

    fn store() -> BodyStore {
        BodyStore::with_bodies([
            Body::new(DVec2::new(10.0, 10.0), DVec2::new(3.0, 3.0), 1.0, 5.0),
            Body::new(DVec2::new(50.0, 50.0), DVec2::zero(), 1.0, 5.0),
            Body::new(DVec2::new(90.0, 90.0), DVec2::zero(), 1.0, 5.0),
        ])
        .unwrap()
    }

    #[test]
    fn acquire_marks_body_and_zeroes_velocity() {
        let mut store = store();
        let mut control = PossessionController::new();
        control.acquire(&mut store, 0).unwrap();
        let body = store.get(0).unwrap();
        assert!(body.possessed);
        assert_eq!(body.vel, DVec2::zero());
        assert_eq!(control.grab().unwrap().delta, DVec2::zero());
    }

    #[test]
    fn acquire_rejects_bad_index_and_second_body() {
        let mut store = store();
        let mut control = PossessionController::new();
        assert!(matches!(
            control.acquire(&mut store, 7),
            Err(SandboxError::IndexOutOfRange { index: 7, .. })
        ));
        control.acquire(&mut store, 0).unwrap();
        control.acquire(&mut store, 0).unwrap();
        assert!(matches!(
            control.acquire(&mut store, 1),
            Err(SandboxError::PossessionConflict { held: 0 })
        ));
        assert!(!store.get(1).unwrap().possessed);
    }

    #[test]
    fn drag_then_release_throws_with_last_delta() {
        let mut store = store();
        let mut control = PossessionController::new();
        control.acquire(&mut store, 1).unwrap();
        control.drag(&mut store, 1, DVec2::new(52.0, 50.0)).unwrap();
        control.drag(&mut store, 1, DVec2::new(55.0, 49.0)).unwrap();
        assert_eq!(store.get(1).unwrap().vel, DVec2::zero());

        assert_eq!(
            control.release(&mut store, 1, 6.0).unwrap(),
            Handoff::Applied
        );
        let body = store.get(1).unwrap();
        assert!(!body.possessed);
        assert_eq!(body.pos, DVec2::new(55.0, 49.0));
        assert_eq!(body.vel, DVec2::new(18.0, -6.0));
        assert!(control.grab().is_none());
    }

    #[test]
    fn drag_acquires_implicitly() {
        let mut store = store();
        let mut control = PossessionController::new();
        control.drag(&mut store, 2, DVec2::new(1.0, 2.0)).unwrap();
        assert!(store.get(2).unwrap().possessed);
        assert_eq!(control.held(&store), store.id_at(2).ok());
    }

    #[test]
    fn release_after_removal_is_silent_and_not_redirected() {
        let mut store = store();
        let mut control = PossessionController::new();
        control.acquire(&mut store, 1).unwrap();
        let id = store.id_at(1).unwrap();
        store.remove(id);

        // Index 1 now holds what used to be body 2; it must not be touched.
        let survivor = *store.get(1).unwrap();
        assert_eq!(
            control.release(&mut store, 1, 6.0).unwrap(),
            Handoff::Dropped
        );
        assert_eq!(*store.get(1).unwrap(), survivor);
        assert!(control.grab().is_none());
    }

    #[test]
    fn drags_after_removal_are_swallowed_until_release() {
        let mut store = store();
        let mut control = PossessionController::new();
        control.acquire(&mut store, 0).unwrap();
        store.remove(store.id_at(0).unwrap());

        let survivor = *store.get(0).unwrap();
        control.enforce(&mut store);
        assert_eq!(
            control.drag(&mut store, 0, DVec2::new(1.0, 1.0)).unwrap(),
            Handoff::Dropped
        );
        assert_eq!(
            control.drag(&mut store, 0, DVec2::new(2.0, 2.0)).unwrap(),
            Handoff::Dropped
        );
        assert!(control.grab().is_some());
        assert_eq!(
            control.release(&mut store, 0, 6.0).unwrap(),
            Handoff::Dropped
        );
        assert_eq!(*store.get(0).unwrap(), survivor);
        assert!(control.grab().is_none());

        // A new drag on that index is a new possession.
        control.drag(&mut store, 0, DVec2::new(3.0, 3.0)).unwrap();
        assert!(store.get(0).unwrap().possessed);
    }

    #[test]
    fn calls_follow_held_body_when_an_earlier_body_is_removed() {
        let mut store = store();
        let mut control = PossessionController::new();
        control.drag(&mut store, 2, DVec2::new(90.0, 90.0)).unwrap();
        let held = store.id_at(2).unwrap();
        store.remove(store.id_at(0).unwrap());

        // The held body now sits at index 1; index 2 no longer exists.
        assert_eq!(control.route(&store, 2), Some(1));
        assert_eq!(
            control.drag(&mut store, 2, DVec2::new(95.0, 90.0)).unwrap(),
            Handoff::Applied
        );
        assert_eq!(store.get(1).unwrap().pos, DVec2::new(95.0, 90.0));
        control.acquire(&mut store, 2).unwrap();

        assert_eq!(
            control.release(&mut store, 2, 6.0).unwrap(),
            Handoff::Applied
        );
        let body = store.get(1).unwrap();
        assert_eq!(body.id, held);
        assert!(!body.possessed);
        assert_eq!(body.vel, DVec2::new(30.0, 0.0));
        assert!(!store.get(0).unwrap().possessed);
    }

    #[test]
    fn shifted_index_is_not_handed_to_the_body_now_there() {
        let mut store = BodyStore::with_bodies([
            Body::new(DVec2::new(10.0, 10.0), DVec2::zero(), 1.0, 5.0),
            Body::new(DVec2::new(50.0, 50.0), DVec2::zero(), 1.0, 5.0),
            Body::new(DVec2::new(90.0, 90.0), DVec2::zero(), 1.0, 5.0),
            Body::new(DVec2::new(130.0, 130.0), DVec2::zero(), 1.0, 5.0),
        ])
        .unwrap();
        let mut control = PossessionController::new();
        control.drag(&mut store, 2, DVec2::new(90.0, 90.0)).unwrap();
        store.remove(store.id_at(0).unwrap());

        // Index 2 now names the last body; the drag still reaches the held one.
        let bystander = *store.get(2).unwrap();
        control.drag(&mut store, 2, DVec2::new(100.0, 90.0)).unwrap();
        assert_eq!(*store.get(2).unwrap(), bystander);
        assert_eq!(store.get(1).unwrap().pos, DVec2::new(100.0, 90.0));
        assert!(store.get(1).unwrap().possessed);
    }

    #[test]
    fn first_drag_records_no_motion() {
        let mut store = store();
        let mut control = PossessionController::new();
        control.acquire(&mut store, 1).unwrap();
        // Grabbed off-center: the jump to the pointer is not a throw.
        control.drag(&mut store, 1, DVec2::new(58.0, 53.0)).unwrap();
        assert_eq!(control.grab().unwrap().delta, DVec2::zero());

        control.release(&mut store, 1, 6.0).unwrap();
        let body = store.get(1).unwrap();
        assert_eq!(body.pos, DVec2::new(58.0, 53.0));
        assert_eq!(body.vel, DVec2::zero());
    }

    #[test]
    fn release_of_removed_last_body_is_silent() {
        let mut store = store();
        let mut control = PossessionController::new();
        control.acquire(&mut store, 2).unwrap();
        store.remove(store.id_at(2).unwrap());
        assert_eq!(
            control.release(&mut store, 2, 6.0).unwrap(),
            Handoff::Dropped
        );
    }

    #[test]
    fn enforce_restores_held_kinematics() {
        let mut store = store();
        let mut control = PossessionController::new();
        control.drag(&mut store, 0, DVec2::new(20.0, 20.0)).unwrap();
        let body = store.get_mut(0).unwrap();
        body.pos = DVec2::new(0.0, 0.0);
        body.vel = DVec2::new(1.0, 1.0);

        control.enforce(&mut store);
        let body = store.get(0).unwrap();
        assert_eq!(body.pos, DVec2::new(20.0, 20.0));
        assert_eq!(body.vel, DVec2::zero());
    }
}
