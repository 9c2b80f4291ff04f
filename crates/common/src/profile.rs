use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ConfigError;
use crate::ColorTag;

/// A named ride mode: how many g each indicator step represents, and the
/// status color shown while the mode is active.
///
/// `accel_tolerance_forward` scales the braking indicators and
/// `accel_tolerance_brake` scales the acceleration indicators. The names are
/// kept as the installed base uses them; see [`crate::mapper`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub name: String,
    pub lateral_tolerance: f64,
    pub accel_tolerance_forward: f64,
    pub accel_tolerance_brake: f64,
    pub display_color: ColorTag,
}

impl ThresholdProfile {
    /// Builds a profile, rejecting any tolerance that is not strictly positive.
    pub fn new(
        name: impl Into<String>,
        lateral_tolerance: f64,
        accel_tolerance_forward: f64,
        accel_tolerance_brake: f64,
        display_color: ColorTag,
    ) -> Result<Self, ConfigError> {
        let profile = Self {
            name: name.into(),
            lateral_tolerance,
            accel_tolerance_forward,
            accel_tolerance_brake,
            display_color,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("lateral_tolerance", self.lateral_tolerance),
            ("accel_tolerance_forward", self.accel_tolerance_forward),
            ("accel_tolerance_brake", self.accel_tolerance_brake),
        ];
        for (field, value) in fields {
            // NaN fails this comparison too
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidTolerance {
                    profile: self.name.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Built-in ride modes, in cycling order.
pub fn default_profiles() -> Vec<ThresholdProfile> {
    let modes = [
        ("comfort", 0.3, 0.8, 0.25, ColorTag::Blue),
        ("street", 0.4, 1.0, 0.3, ColorTag::Green),
        ("sport", 0.5, 1.2, 0.4, ColorTag::Yellow),
        ("track", 0.6, 1.4, 0.5, ColorTag::Red),
    ];
    modes
        .into_iter()
        .map(|(name, lat, fwd, brake, color)| ThresholdProfile {
            name: name.to_string(),
            lateral_tolerance: lat,
            accel_tolerance_forward: fwd,
            accel_tolerance_brake: brake,
            display_color: color,
        })
        .collect()
}

/// The fixed, ordered set of ride modes plus a cursor to the active one.
#[derive(Debug, Clone)]
pub struct ModeSet {
    profiles: Vec<ThresholdProfile>,
    active: usize,
}

impl ModeSet {
    pub fn new(profiles: Vec<ThresholdProfile>) -> Result<Self, ConfigError> {
        if profiles.is_empty() {
            return Err(ConfigError::NoProfiles);
        }
        let mut seen = HashSet::new();
        for profile in &profiles {
            profile.validate()?;
            if !seen.insert(profile.name.as_str()) {
                return Err(ConfigError::DuplicateProfile(profile.name.clone()));
            }
        }
        Ok(Self { profiles, active: 0 })
    }

    pub fn list_modes(&self) -> &[ThresholdProfile] {
        &self.profiles
    }

    pub fn active(&self) -> &ThresholdProfile {
        &self.profiles[self.active]
    }

    pub fn by_name(&self, name: &str) -> Result<&ThresholdProfile, ConfigError> {
        self.position(name).map(|i| &self.profiles[i])
    }

    /// The profile after `current` in cycling order, wrapping from last to first.
    pub fn advance(&self, current: &ThresholdProfile) -> Result<&ThresholdProfile, ConfigError> {
        let index = self.position(&current.name)?;
        Ok(&self.profiles[(index + 1) % self.profiles.len()])
    }

    /// Moves the cursor to the next mode and returns it.
    pub fn advance_active(&mut self) -> &ThresholdProfile {
        self.active = (self.active + 1) % self.profiles.len();
        self.active()
    }

    /// Makes `name` the active mode. Leaves the cursor alone on error.
    pub fn select(&mut self, name: &str) -> Result<&ThresholdProfile, ConfigError> {
        self.active = self.position(name)?;
        Ok(self.active())
    }

    fn position(&self, name: &str) -> Result<usize, ConfigError> {
        self.profiles
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }
}

impl Default for ModeSet {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            active: 0,
        }
    }
}
