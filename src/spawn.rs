use crate::body::Body;
use crate::collision::FALLBACK_NORMAL;

use ultraviolet::DVec2;

/// Result of placing a new body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub pos: DVec2,
    /// Number of existing bodies that pushed the point.
    pub pushes: usize,
    /// Whether a push had to use the fallback direction because the point sat
    /// exactly on another body's center.
    pub degenerate: bool,
}

/// Finds a spot for a body of `radius` near `requested`.
///
/// Walks the existing bodies once, in store order, pushing the point out of
/// each body it overlaps by the overlap amount. Pushes accumulate; a later push
/// may move the point back into an earlier body, which the collision pass
/// sorts out on the following ticks.
pub fn place(existing: &[Body], requested: DVec2, radius: f64) -> Placement {
    let mut placement = Placement {
        pos: requested,
        pushes: 0,
        degenerate: false,
    };

    for body in existing {
        let d = placement.pos - body.pos;
        let dist = d.mag();
        let reach = radius + body.radius;
        if dist >= reach {
            continue;
        }

        let direction = if dist > 0.0 {
            d / dist
        } else {
            placement.degenerate = true;
            FALLBACK_NORMAL
        };
        placement.pos += direction * (reach - dist);
        placement.pushes += 1;
    }

    if placement.degenerate {
        log::debug!(
            "spawn at ({:.1}, {:.1}) coincided with a body center, pushed along the fallback axis",
            requested.x,
            requested.y
        );
    }
    placement
}
