use crate::body::Body;
use crate::config::SandboxConfig;

use rayon::prelude::*;

/// Length of one tick. The engine is tick-based, so this never varies.
pub const DT: f64 = 1.0;

/// Advances every free body by one tick: gravity, decay, position, then walls.
/// Possessed bodies are left exactly as the controller wrote them.
pub fn integrate(bodies: &mut [Body], config: &SandboxConfig) {
    if config.parallel {
        bodies.par_iter_mut().for_each(|body| advance(body, config));
    } else {
        bodies.iter_mut().for_each(|body| advance(body, config));
    }
}

/// Updates a single body. Velocity is updated before position (semi-implicit Euler).
pub fn advance(body: &mut Body, config: &SandboxConfig) {
    if body.possessed {
        return;
    }

    if config.gravity_enabled {
        body.vel.y += config.gravity_force * DT;
    }
    if config.decay_enabled {
        body.vel *= config.decay_factor;
    }
    body.pos += body.vel * DT;

    bounce_off_walls(body, config.bounds_width, config.bounds_height);
}

/// Clamps a body inside the arena and reflects any velocity component pointing
/// into a wall it touches. Returns true if a wall was hit.
///
/// A body wider than the arena on an axis is centred on that axis and stops
/// moving along it.
pub fn bounce_off_walls(body: &mut Body, width: f64, height: f64) -> bool {
    let e = body.kind.wall_elasticity(body.elasticity);
    let r = body.radius;
    let hit_x = confine(&mut body.pos.x, &mut body.vel.x, r, width, e);
    let hit_y = confine(&mut body.pos.y, &mut body.vel.y, r, height, e);
    hit_x || hit_y
}

/// One axis of [`bounce_off_walls`]: the arena spans `0..extent`.
fn confine(pos: &mut f64, vel: &mut f64, r: f64, extent: f64, e: f64) -> bool {
    if 2.0 * r > extent {
        *pos = extent / 2.0;
        *vel = 0.0;
        true
    } else if *pos - r < 0.0 {
        *pos = r;
        *vel = reflect(*vel, e, -1.0);
        true
    } else if *pos + r > extent {
        *pos = extent - r;
        *vel = reflect(*vel, e, 1.0);
        true
    } else {
        false
    }
}

/// `wall` is the sign of the direction pointing into the wall.
fn reflect(v: f64, e: f64, wall: f64) -> f64 {
    if v * wall > 0.0 { -v * e } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyKind;
    use ultraviolet::DVec2;

    fn still_config() -> SandboxConfig {
        SandboxConfig {
            gravity_enabled: false,
            decay_enabled: false,
            ..Default::default()
        }
    }

    fn body(pos: (f64, f64), vel: (f64, f64)) -> Body {
        Body::new(DVec2::new(pos.0, pos.1), DVec2::new(vel.0, vel.1), 1.0, 10.0)
    }

    #[test]
    fn gravity_then_decay_then_position() {
        let config = SandboxConfig {
            gravity_force: 1.0,
            decay_factor: 0.5,
            ..Default::default()
        };
        let mut b = body((100.0, 100.0), (4.0, 0.0));
        advance(&mut b, &config);
        assert_eq!(b.vel, DVec2::new(2.0, 0.5));
        assert_eq!(b.pos, DVec2::new(102.0, 100.5));
    }

    #[test]
    fn decay_of_one_is_a_no_op() {
        let config = SandboxConfig {
            gravity_enabled: false,
            decay_factor: 1.0,
            ..Default::default()
        };
        let mut b = body((100.0, 100.0), (3.0, -2.0));
        advance(&mut b, &config);
        assert_eq!(b.vel, DVec2::new(3.0, -2.0));
    }

    #[test]
    fn possessed_bodies_are_untouched() {
        let mut b = body((100.0, 100.0), (0.0, 0.0));
        b.possessed = true;
        let before = b;
        advance(&mut b, &SandboxConfig::default());
        assert_eq!(b, before);
    }

    #[test]
    fn elastic_wall_reflection_keeps_speed() {
        let config = still_config();
        let mut b = body((785.0, 300.0), (10.0, 0.0));
        advance(&mut b, &config);
        assert_eq!(b.pos.x, config.bounds_width - 10.0);
        assert_eq!(b.vel.x, -10.0);
    }

    #[test]
    fn wall_response_by_kind() {
        let config = still_config();
        let cases = [
            (BodyKind::Normal, 0.5, -5.0),
            (BodyKind::Heavy, 1.0, -5.0),
            (BodyKind::Bouncy, 0.2, -10.0),
            (BodyKind::Sticky, 1.0, 0.0),
            (BodyKind::Explosive, 1.0, -10.0),
        ];
        for (kind, elasticity, expected) in cases {
            let mut b = body((15.0, 300.0), (-10.0, 0.0))
                .with_kind(kind)
                .with_elasticity(elasticity);
            b.vel.x = -10.0;
            advance(&mut b, &config);
            assert_eq!(b.pos.x, 10.0, "{kind}");
            assert_eq!(b.vel.x, -expected, "{kind}");
        }
    }

    #[test]
    fn clamped_body_moving_away_is_not_reflected() {
        let mut b = body((5.0, 300.0), (2.0, 0.0));
        assert!(bounce_off_walls(&mut b, 800.0, 600.0));
        assert_eq!(b.pos.x, 10.0);
        assert_eq!(b.vel.x, 2.0);
    }

    #[test]
    fn body_taller_than_arena_settles_in_the_middle() {
        let config = SandboxConfig::default();
        let mut b = body((400.0, 100.0), (3.0, 5.0));
        b.radius = 350.0;
        for _ in 0..4 {
            advance(&mut b, &config);
            assert_eq!(b.pos.y, config.bounds_height / 2.0);
            assert_eq!(b.vel.y, 0.0);
        }
        // 700 wide still fits the 800 wide arena and moves freely across it.
        assert!(b.pos.x > 400.0);
        assert!(b.pos.x + 350.0 <= config.bounds_width);
    }

    #[test]
    fn parallel_matches_sequential() {
        let make = || {
            (0..64)
                .map(|i| body((20.0 + i as f64 * 11.0, 50.0), (i as f64 - 32.0, 3.0)))
                .collect::<Vec<_>>()
        };
        let mut seq = make();
        let mut par = make();
        let config = SandboxConfig::default();
        integrate(&mut seq, &config);
        integrate(
            &mut par,
            &SandboxConfig {
                parallel: true,
                ..config
            },
        );
        assert_eq!(seq, par);
    }
}
