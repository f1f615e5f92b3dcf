use crate::error::{Result, SandboxError, require_finite, require_positive};

use serde::{Deserialize, Serialize};

/// Process-wide tunables of one sandbox.
///
/// The toggles and factors are mutated only through the explicit setters below;
/// the remaining fields are fixed once the sandbox is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Whether gravity is applied each tick.
    pub gravity_enabled: bool,
    /// Downward acceleration in units/tick².
    pub gravity_force: f64,
    /// Whether velocities are damped each tick.
    pub decay_enabled: bool,
    /// Per-tick velocity multiplier, in (0, 1].
    pub decay_factor: f64,
    /// Elasticity given to spawned bodies that don't specify one.
    pub default_elasticity: f64,
    /// Upper bound of any elasticity value; values above 1 are super-elastic.
    pub max_elasticity: f64,
    /// Arena width.
    pub bounds_width: f64,
    /// Arena height.
    pub bounds_height: f64,
    /// Radius per unit of user-facing size.
    pub size_scale: f64,
    /// Multiplier from the last drag delta to the release velocity.
    pub throw_factor: f64,
    /// Impulse applied along the contact normal when an explosive body detonates.
    pub explosion_strength: f64,
    /// Number of bodies in the generated starting scene.
    pub initial_bodies: usize,
    /// Seed for the generated starting scene.
    pub seed: u64,
    /// Integrate bodies on the rayon pool.
    pub parallel: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            gravity_enabled: true,
            gravity_force: 0.5,
            decay_enabled: true,
            decay_factor: 0.99,
            default_elasticity: 1.0,
            max_elasticity: 2.0,
            bounds_width: 800.0,
            bounds_height: 600.0,
            size_scale: 4.0,
            throw_factor: 6.0,
            explosion_strength: 40.0,
            initial_bodies: 5,
            seed: 0,
            parallel: false,
        }
    }
}

/// Current state of the two physics toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub gravity: bool,
    pub decay: bool,
}

impl SandboxConfig {
    /// Parses a JSON document. Missing fields take their default value.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field, reporting the first one out of range.
    pub fn validate(&self) -> Result<()> {
        require_finite("gravity_force", self.gravity_force)?;
        check_decay_factor(self.decay_factor)?;
        require_positive("max_elasticity", self.max_elasticity)?;
        self.check_elasticity(self.default_elasticity)?;
        require_positive("bounds_width", self.bounds_width)?;
        require_positive("bounds_height", self.bounds_height)?;
        require_positive("size_scale", self.size_scale)?;
        require_finite("throw_factor", self.throw_factor)?;
        require_finite("explosion_strength", self.explosion_strength)?;
        if self.explosion_strength < 0.0 {
            return Err(SandboxError::invalid(
                "explosion_strength",
                self.explosion_strength,
                "must not be negative",
            ));
        }
        Ok(())
    }

    pub fn toggle_gravity(&mut self) -> bool {
        self.gravity_enabled = !self.gravity_enabled;
        self.gravity_enabled
    }

    pub fn toggle_decay(&mut self) -> bool {
        self.decay_enabled = !self.decay_enabled;
        self.decay_enabled
    }

    pub fn set_gravity_force(&mut self, force: f64) -> Result<()> {
        self.gravity_force = require_finite("gravity_force", force)?;
        Ok(())
    }

    /// Sets the per-tick decay multiplier. Values outside (0, 1] are rejected, not clamped.
    pub fn set_decay_factor(&mut self, factor: f64) -> Result<()> {
        self.decay_factor = check_decay_factor(factor)?;
        Ok(())
    }

    pub fn set_default_elasticity(&mut self, elasticity: f64) -> Result<()> {
        self.default_elasticity = self.check_elasticity(elasticity)?;
        Ok(())
    }

    /// Accepts elasticity values in `[0, max_elasticity]`.
    pub fn check_elasticity(&self, elasticity: f64) -> Result<f64> {
        if elasticity.is_finite() && (0.0..=self.max_elasticity).contains(&elasticity) {
            Ok(elasticity)
        } else {
            Err(SandboxError::invalid(
                "elasticity",
                elasticity,
                "must lie within [0, max_elasticity]",
            ))
        }
    }

    pub fn status(&self) -> Status {
        Status {
            gravity: self.gravity_enabled,
            decay: self.decay_enabled,
        }
    }
}

fn check_decay_factor(factor: f64) -> Result<f64> {
    if factor.is_finite() && factor > 0.0 && factor <= 1.0 {
        Ok(factor)
    } else {
        Err(SandboxError::invalid(
            "decay_factor",
            factor,
            "must lie within (0, 1]",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SandboxConfig::default().validate().is_ok());
    }

    #[test]
    fn toggles_flip_and_report_new_state() {
        let mut config = SandboxConfig::default();
        assert!(!config.toggle_gravity());
        assert!(config.toggle_gravity());
        assert!(!config.toggle_decay());
        assert_eq!(
            config.status(),
            Status {
                gravity: true,
                decay: false
            }
        );
    }

    #[test]
    fn decay_factor_bounds() {
        let mut config = SandboxConfig::default();
        assert!(config.set_decay_factor(1.0).is_ok());
        assert!(config.set_decay_factor(0.5).is_ok());
        assert!(matches!(
            config.set_decay_factor(0.0),
            Err(SandboxError::Validation { field: "decay_factor", .. })
        ));
        assert!(config.set_decay_factor(1.01).is_err());
        assert!(config.set_decay_factor(f64::NAN).is_err());
        // Rejected values leave the previous one in place.
        assert_eq!(config.decay_factor, 0.5);
    }

    #[test]
    fn gravity_force_must_be_finite() {
        let mut config = SandboxConfig::default();
        assert!(config.set_gravity_force(2.5).is_ok());
        assert!(config.set_gravity_force(f64::INFINITY).is_err());
        assert_eq!(config.gravity_force, 2.5);
    }

    #[test]
    fn elasticity_range() {
        let mut config = SandboxConfig::default();
        assert!(config.set_default_elasticity(0.0).is_ok());
        assert!(config.set_default_elasticity(2.0).is_ok());
        assert!(config.set_default_elasticity(-0.1).is_err());
        assert!(config.set_default_elasticity(2.1).is_err());
        assert_eq!(config.default_elasticity, 2.0);
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config =
            SandboxConfig::from_json_str(r#"{ "gravity_enabled": false, "bounds_width": 1024 }"#)
                .unwrap();
        assert!(!config.gravity_enabled);
        assert_eq!(config.bounds_width, 1024.0);
        assert_eq!(config.decay_factor, SandboxConfig::default().decay_factor);
    }

    #[test]
    fn json_rejects_out_of_range_values() {
        assert!(matches!(
            SandboxConfig::from_json_str(r#"{ "decay_factor": 0 }"#),
            Err(SandboxError::Validation { .. })
        ));
        assert!(matches!(
            SandboxConfig::from_json_str("not json"),
            Err(SandboxError::Config(_))
        ));
    }
}
