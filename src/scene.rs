use crate::body::Body;
use crate::config::SandboxConfig;
use crate::spawn;

use ultraviolet::DVec2;

/// Size range of generated bodies, in user-facing size units.
const SIZE_RANGE: (f64, f64) = (3.0, 8.0);
/// Mass range of generated bodies.
const MASS_RANGE: (f64, f64) = (5.0, 20.0);

/// Generates the starting scene: `config.initial_bodies` normal bodies at rest,
/// scattered over the arena.
/// - Positions, sizes and masses come from a generator seeded with `config.seed`,
///   so the same config always yields the same scene.
/// - Each body is run through the spawn placer against the ones before it.
pub fn scatter(config: &SandboxConfig) -> Vec<Body> {
    let mut rng = fastrand::Rng::with_seed(config.seed);
    let mut bodies: Vec<Body> = Vec::with_capacity(config.initial_bodies);

    while bodies.len() < config.initial_bodies {
        let size = lerp(SIZE_RANGE, rng.f64());
        let radius = size * config.size_scale;
        let mass = lerp(MASS_RANGE, rng.f64());

        // Keep the requested point clear of the walls where the arena allows it.
        let x = inset(config.bounds_width, radius, rng.f64());
        let y = inset(config.bounds_height, radius, rng.f64());
        let placement = spawn::place(&bodies, DVec2::new(x, y), radius);

        let body = Body::new(placement.pos, DVec2::zero(), mass, radius)
            .with_size(size, config.size_scale)
            .with_elasticity(config.default_elasticity);
        bodies.push(body);
    }

    bodies
}

fn lerp((lo, hi): (f64, f64), t: f64) -> f64 {
    lo + (hi - lo) * t
}

fn inset(extent: f64, radius: f64, t: f64) -> f64 {
    if extent > 2.0 * radius {
        radius + (extent - 2.0 * radius) * t
    } else {
        extent * 0.5
    }
}
