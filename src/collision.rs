use crate::body::{Body, BodyId, BodyKind};
use crate::config::SandboxConfig;

use broccoli::aabb::Rect;
use ultraviolet::DVec2;

use std::collections::{BTreeSet, HashSet};

/// Padding added to broad-phase boxes so that exactly touching circles are
/// still reported as candidates.
const BROAD_PHASE_MARGIN: f64 = 1e-6;

/// Normal used when two centers coincide.
pub const FALLBACK_NORMAL: DVec2 = DVec2 { x: 1.0, y: 0.0 };

/// Outcome of resolving a single pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub normal: DVec2,
    pub penetration: f64,
    /// Whether an explosive impulse was applied this tick.
    pub detonated: bool,
}

/// Detects and resolves body-body overlaps once per tick.
///
/// Keeps the set of pairs that were touching at the end of the previous tick
/// so explosives only fire on first contact, and collects explosive bodies
/// that must be removed before the next tick.
#[derive(Debug, Default)]
pub struct CollisionResolver {
    contacts: HashSet<(BodyId, BodyId)>,
    pending_removal: Vec<BodyId>,
}

impl CollisionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every overlapping pair in ascending `(i, j)` order against
    /// live positions. A single relaxation pass: residual overlap in dense
    /// clusters is left for the next tick.
    ///
    /// The broad phase seeds the queue. Whenever a separation moves a body,
    /// its new neighbours that come later in the order are queued too, so a
    /// pair that only starts overlapping mid-pass is still visited in turn.
    pub fn resolve(&mut self, bodies: &mut [Body], config: &SandboxConfig) {
        let mut touching = HashSet::with_capacity(self.contacts.len());
        let mut queue: BTreeSet<(usize, usize)> = candidate_pairs(bodies).into_iter().collect();

        while let Some((i, j)) = queue.pop_first() {
            let (head, tail) = bodies.split_at_mut(j);
            let (a, b) = (&mut head[i], &mut tail[0]);

            let key = pair_key(a.id, b.id);
            let first_contact = !self.contacts.contains(&key);
            let Some(contact) = resolve_pair(a, b, config, first_contact) else {
                continue;
            };
            touching.insert(key);

            if contact.detonated {
                for body in [&*a, &*b] {
                    if body.kind == BodyKind::Explosive && !self.pending_removal.contains(&body.id)
                    {
                        log::debug!("body {:?} detonated", body.id);
                        self.pending_removal.push(body.id);
                    }
                }
            }

            if contact.penetration > 0.0 {
                for moved in [i, j] {
                    queue.extend(neighbours(bodies, moved).filter(|&pair| pair > (i, j)));
                }
            }
        }

        self.contacts = touching;
    }

    /// Explosive bodies that detonated since the last call.
    pub fn take_detonated(&mut self) -> Vec<BodyId> {
        std::mem::take(&mut self.pending_removal)
    }

    pub fn is_touching(&self, a: BodyId, b: BodyId) -> bool {
        self.contacts.contains(&pair_key(a, b))
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
        self.pending_removal.clear();
    }
}

fn pair_key(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a < b { (a, b) } else { (b, a) }
}

/// Broad phase: index pairs whose padded bounding boxes intersect, sorted
/// ascending with `i < j`.
pub fn candidate_pairs(bodies: &[Body]) -> Vec<(usize, usize)> {
    let mut rects = bodies
        .iter()
        .enumerate()
        .map(|(index, body)| {
            let extent = body.radius + BROAD_PHASE_MARGIN;
            let min = body.pos - DVec2::one() * extent;
            let max = body.pos + DVec2::one() * extent;
            (Rect::new(min.x, max.x, min.y, max.y), index)
        })
        .collect::<Vec<_>>();

    let mut pairs = Vec::new();
    let mut tree = broccoli::Tree::new(&mut rects);
    tree.find_colliding_pairs(|a, b| {
        let i = *a.unpack_inner();
        let j = *b.unpack_inner();
        pairs.push(if i < j { (i, j) } else { (j, i) });
    });

    pairs.sort_unstable();
    pairs.dedup();
    pairs
}

/// Pairs containing `index` whose padded boxes intersect at the current
/// positions, as `(i, j)` with `i < j`.
fn neighbours(bodies: &[Body], index: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
    let body = &bodies[index];
    bodies
        .iter()
        .enumerate()
        .filter(move |&(other, candidate)| other != index && boxes_overlap(body, candidate))
        .map(move |(other, _)| (index.min(other), index.max(other)))
}

fn boxes_overlap(a: &Body, b: &Body) -> bool {
    let reach = a.radius + b.radius + 2.0 * BROAD_PHASE_MARGIN;
    (a.pos.x - b.pos.x).abs() <= reach && (a.pos.y - b.pos.y).abs() <= reach
}

/// Combined elasticity of a pair: the lesser of the two, floored at 1.0 when
/// either side is bouncy.
pub fn pair_elasticity(a: &Body, b: &Body) -> f64 {
    let e = a.elasticity.min(b.elasticity);
    if a.kind == BodyKind::Bouncy || b.kind == BodyKind::Bouncy {
        e.max(1.0)
    } else {
        e
    }
}

/// Narrow phase and response for one pair. Returns `None` if the circles
/// don't overlap.
///
/// `first_contact` is false when the pair was already touching on the
/// previous tick; explosives only fire on first contact.
pub fn resolve_pair(
    a: &mut Body,
    b: &mut Body,
    config: &SandboxConfig,
    first_contact: bool,
) -> Option<Contact> {
    let d = b.pos - a.pos;
    let r = a.radius + b.radius;
    let dist_sq = d.mag_sq();
    if dist_sq > r * r {
        return None;
    }

    let inv_a = a.inverse_mass();
    let inv_b = b.inverse_mass();
    let inv_sum = inv_a + inv_b;

    let dist = dist_sq.sqrt();
    let normal = if dist > 0.0 { d / dist } else { FALLBACK_NORMAL };
    let penetration = r - dist;
    let mut contact = Contact {
        normal,
        penetration,
        detonated: false,
    };

    // Both held: nothing may move either of them.
    if inv_sum == 0.0 {
        return Some(contact);
    }

    // Push apart, heavier bodies move less.
    if penetration > 0.0 {
        let correction = normal * (penetration / inv_sum);
        a.pos -= correction * inv_a;
        b.pos += correction * inv_b;
    }

    let sticky = a.kind == BodyKind::Sticky || b.kind == BodyKind::Sticky;
    let approach = (b.vel - a.vel).dot(normal);
    if sticky {
        // Perfectly inelastic along the normal.
        if approach < 0.0 {
            let impulse = -approach / inv_sum;
            a.vel -= normal * (impulse * inv_a);
            b.vel += normal * (impulse * inv_b);
        }
    } else if approach < 0.0 {
        let e = pair_elasticity(a, b);
        let impulse = -(1.0 + e) * approach / inv_sum;
        a.vel -= normal * (impulse * inv_a);
        b.vel += normal * (impulse * inv_b);
    }

    let explosive = a.kind == BodyKind::Explosive || b.kind == BodyKind::Explosive;
    if explosive && first_contact {
        a.vel -= normal * (config.explosion_strength * inv_a);
        b.vel += normal * (config.explosion_strength * inv_b);
        contact.detonated = true;
    }

    Some(contact)
}
