use serde::{Deserialize, Serialize};
use slotmap::{Key, new_key_type};
use ultraviolet::DVec2;

use std::fmt;
use std::str::FromStr;

new_key_type! {
    /// Stable generational handle for a body, assigned by the store on insertion.
    pub struct BodyId;
}

impl BodyId {
    /// Opaque integer form, suitable for handing across the API boundary.
    pub fn to_bits(self) -> u64 {
        self.data().as_ffi()
    }
}

/// Material type of a body. Changes how it responds to walls and contacts.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    #[default]
    Normal = 0,
    /// Bounces off walls at half elasticity.
    Heavy = 1,
    /// Never loses energy: elasticity is floored at 1.0.
    Bouncy = 2,
    /// Comes to rest against walls and clings to other bodies.
    Sticky = 3,
    /// Detonates on first contact and is removed on the following tick.
    Explosive = 4,
}

impl BodyKind {
    pub const ALL: [BodyKind; 5] = [
        BodyKind::Normal,
        BodyKind::Heavy,
        BodyKind::Bouncy,
        BodyKind::Sticky,
        BodyKind::Explosive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BodyKind::Normal => "normal",
            BodyKind::Heavy => "heavy",
            BodyKind::Bouncy => "bouncy",
            BodyKind::Sticky => "sticky",
            BodyKind::Explosive => "explosive",
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Effective elasticity against an arena wall.
    pub fn wall_elasticity(self, elasticity: f64) -> f64 {
        match self {
            BodyKind::Normal | BodyKind::Explosive => elasticity,
            BodyKind::Heavy => elasticity * 0.5,
            BodyKind::Bouncy => elasticity.max(1.0),
            BodyKind::Sticky => 0.0,
        }
    }
}

impl fmt::Display for BodyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown body type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown body type `{}`", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for BodyKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind(s.to_owned()))
    }
}

/// A circular body in the sandbox.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    /// Assigned by the store; null until the body is appended.
    pub id: BodyId,
    /// Center position.
    pub pos: DVec2,
    /// Velocity in units per tick.
    pub vel: DVec2,
    pub mass: f64,
    pub radius: f64,
    /// User-facing size the radius was derived from.
    pub size: f64,
    pub kind: BodyKind,
    pub elasticity: f64,
    /// True while an external controller drives this body.
    pub possessed: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self::new(DVec2::zero(), DVec2::zero(), 1.0, 1.0)
    }
}

impl Body {
    /// Creates a free, normal body with elasticity 1.
    /// The size is set equal to the radius until [`Body::with_size`] says otherwise.
    pub fn new(pos: DVec2, vel: DVec2, mass: f64, radius: f64) -> Self {
        Self {
            id: BodyId::null(),
            pos,
            vel,
            mass,
            radius,
            size: radius,
            kind: BodyKind::Normal,
            elasticity: 1.0,
            possessed: false,
        }
    }

    /// Sets size and the radius derived from it.
    pub fn with_size(mut self, size: f64, scale: f64) -> Self {
        self.size = size;
        self.radius = size * scale;
        self
    }

    pub fn with_kind(mut self, kind: BodyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_elasticity(mut self, elasticity: f64) -> Self {
        self.elasticity = elasticity;
        self
    }

    /// Inverse mass used for impulse weighting. Possessed bodies are immovable.
    pub fn inverse_mass(&self) -> f64 {
        if self.possessed { 0.0 } else { 1.0 / self.mass }
    }

    pub fn momentum(&self) -> DVec2 {
        self.vel * self.mass
    }

    /// Whether the point lies inside (or on) the body's circle.
    pub fn contains(&self, point: DVec2) -> bool {
        (point - self.pos).mag_sq() <= self.radius * self.radius
    }

    pub fn snapshot(&self) -> BodySnapshot {
        BodySnapshot {
            id: self.id.to_bits(),
            x: self.pos.x,
            y: self.pos.y,
            vx: self.vel.x,
            vy: self.vel.y,
            mass: self.mass,
            radius: self.radius,
            size: self.size,
            kind: self.kind,
            elasticity: self.elasticity,
            possessed: self.possessed,
        }
    }
}

/// Flat, serializable view of a body as handed to callers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub mass: f64,
    pub radius: f64,
    pub size: f64,
    #[serde(rename = "type")]
    pub kind: BodyKind,
    pub elasticity: f64,
    pub possessed: bool,
}

/// Partial update applied by [`crate::store::BodyStore::replace`]. `None` fields are left untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyPatch {
    pub pos: Option<DVec2>,
    pub vel: Option<DVec2>,
    pub mass: Option<f64>,
    pub radius: Option<f64>,
    pub size: Option<f64>,
    pub kind: Option<BodyKind>,
    pub elasticity: Option<f64>,
    pub possessed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in BodyKind::ALL {
            assert_eq!(kind.as_str().parse::<BodyKind>(), Ok(kind));
            assert_eq!(BodyKind::from_code(kind as u8), Some(kind));
        }
        assert_eq!("HEAVY".parse::<BodyKind>(), Ok(BodyKind::Heavy));
        assert!("jelly".parse::<BodyKind>().is_err());
        assert_eq!(BodyKind::from_code(9), None);
    }

    #[test]
    fn wall_elasticity_by_kind() {
        assert_eq!(BodyKind::Normal.wall_elasticity(0.8), 0.8);
        assert_eq!(BodyKind::Explosive.wall_elasticity(0.8), 0.8);
        assert_eq!(BodyKind::Heavy.wall_elasticity(0.8), 0.4);
        assert_eq!(BodyKind::Bouncy.wall_elasticity(0.3), 1.0);
        assert_eq!(BodyKind::Bouncy.wall_elasticity(1.5), 1.5);
        assert_eq!(BodyKind::Sticky.wall_elasticity(1.0), 0.0);
    }

    #[test]
    fn size_derives_radius() {
        let body = Body::default().with_size(10.0, 4.0);
        assert_eq!(body.radius, 40.0);
        assert_eq!(body.size, 10.0);
    }

    #[test]
    fn possessed_body_has_no_inverse_mass() {
        let mut body = Body::new(DVec2::zero(), DVec2::zero(), 4.0, 1.0);
        assert_eq!(body.inverse_mass(), 0.25);
        body.possessed = true;
        assert_eq!(body.inverse_mass(), 0.0);
    }

    #[test]
    fn snapshot_uses_wire_field_names() {
        let body = Body::new(DVec2::new(1.0, 2.0), DVec2::new(3.0, 4.0), 5.0, 6.0)
            .with_kind(BodyKind::Sticky);
        let json = serde_json::to_value(body.snapshot()).unwrap();
        assert_eq!(json["x"], 1.0);
        assert_eq!(json["vy"], 4.0);
        assert_eq!(json["type"], "sticky");
        assert_eq!(json["possessed"], false);
    }
}
