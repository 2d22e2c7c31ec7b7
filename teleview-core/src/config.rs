//! Render configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Point budget, depth window and draw settings for one point-cloud view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub point_size: f32,
    /// Capacity of the GPU point buffer
    pub max_points: usize,
    /// Points requested per draw, at most `max_points`
    pub display_points: usize,
    pub min_depth: f32,
    pub max_depth: f32,
    /// Keep every Nth point
    pub downsample_rate: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            point_size: 1.0,
            max_points: 10_000,
            display_points: 10_000,
            min_depth: 0.0,
            max_depth: 10.0,
            downsample_rate: 1,
        }
    }
}

impl RenderConfig {
    /// Validate `config` and clamp `display_points` into `[0, max_points]`
    pub fn new(config: RenderConfig) -> Result<Self> {
        let mut config = config;
        config.validate()?;
        config.display_points = config.display_points.min(config.max_points);
        Ok(config)
    }

    /// Check the invariants that cannot be fixed by clamping
    pub fn validate(&self) -> Result<()> {
        if !(self.point_size > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "point_size must be positive, got {}",
                self.point_size
            )));
        }
        if self.max_points == 0 {
            return Err(Error::InvalidConfig("max_points must be greater than 0".to_string()));
        }
        if !(self.min_depth <= self.max_depth) {
            return Err(Error::InvalidConfig(format!(
                "min_depth {} exceeds max_depth {}",
                self.min_depth, self.max_depth
            )));
        }
        if self.downsample_rate == 0 {
            return Err(Error::InvalidConfig("downsample_rate must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Scale the per-draw point count: `display_points = density * max_points`
    pub fn set_density(&mut self, density: f32) {
        let density = if density.is_nan() { 0.0 } else { density.clamp(0.0, 1.0) };
        self.display_points = ((density * self.max_points as f32) as usize).min(self.max_points);
    }

    pub fn set_point_size(&mut self, size: f32) -> Result<()> {
        if !(size > 0.0) {
            return Err(Error::InvalidConfig(format!("point_size must be positive, got {}", size)));
        }
        self.point_size = size;
        Ok(())
    }

    /// Whether `depth` lies in the inclusive depth window
    pub fn accepts_depth(&self, depth: f32) -> bool {
        depth >= self.min_depth && depth <= self.max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_display_points() {
        let config = RenderConfig::new(RenderConfig {
            max_points: 100,
            display_points: 500,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.display_points, 100);
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let bad = [
            RenderConfig { point_size: 0.0, ..Default::default() },
            RenderConfig { point_size: f32::NAN, ..Default::default() },
            RenderConfig { max_points: 0, ..Default::default() },
            RenderConfig { min_depth: 5.0, max_depth: 1.0, ..Default::default() },
            RenderConfig { downsample_rate: 0, ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(RenderConfig::new(config), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_set_density_scales_and_clamps() {
        let mut config = RenderConfig { max_points: 1000, ..Default::default() };
        config.set_density(0.25);
        assert_eq!(config.display_points, 250);
        config.set_density(3.0);
        assert_eq!(config.display_points, 1000);
        config.set_density(-1.0);
        assert_eq!(config.display_points, 0);
    }

    #[test]
    fn test_depth_window_is_inclusive() {
        let config = RenderConfig { min_depth: 1.0, max_depth: 2.0, ..Default::default() };
        assert!(config.accepts_depth(1.0));
        assert!(config.accepts_depth(2.0));
        assert!(!config.accepts_depth(0.999));
        assert!(!config.accepts_depth(2.001));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RenderConfig = serde_json::from_str(r#"{ "max_points": 42 }"#).unwrap();
        assert_eq!(config.max_points, 42);
        assert_eq!(config.downsample_rate, 1);
    }
}
