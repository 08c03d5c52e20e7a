// Generator configuration.
//
// Every tunable of graph generation lives in `GeneratorConfig`, loadable
// from JSON. Missing fields fall back to `Default`, whose values are the
// conventional human-scale limits: a 0.197-unit step and 20° slopes in both
// directions, 8-connected expansion, all cores.
//
// See also: `generator.rs` which consumes the config, `classifier.rs` for
// `ClassifierLimits` (the subset the per-candidate test needs).

use crate::error::{Error, Result};
use crate::oracle::SurfaceFilter;
use crate::types::Point3;
use serde::{Deserialize, Serialize};

/// Limits applied to a single parent→candidate classification.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierLimits {
    /// Highest rise that can be stepped up.
    pub up_step: f32,
    /// Deepest drop that can be stepped down.
    pub down_step: f32,
    /// Steepest walkable uphill slope, in degrees.
    pub up_slope: f32,
    /// Steepest walkable downhill slope, in degrees (positive number).
    pub down_slope: f32,
    /// Minimum clear passage radius at step height. Zero disables the test.
    pub min_passage_width: f32,
}

impl Default for ClassifierLimits {
    fn default() -> Self {
        Self {
            up_step: 0.197,
            down_step: 0.197,
            up_slope: 20.0,
            down_slope: 20.0,
            min_passage_width: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Seed position; projected onto the floor below before use.
    pub start_point: Point3,
    /// Grid offset between neighbouring candidates. `z` is how far above
    /// the parent each floor probe starts.
    pub spacing: Point3,
    /// Stop once this many nodes exist. Negative means unbounded.
    pub max_nodes: i64,
    pub up_step: f32,
    pub up_slope: f32,
    pub down_step: f32,
    pub down_slope: f32,
    /// Ring multiplier: 1 is the 8-neighbourhood, 2 adds the 8 knight moves.
    pub max_step_connections: u32,
    /// Parents with fewer valid children than this are dead ends.
    pub min_connections: usize,
    /// Worker threads. 0 or 1 runs serially, -1 uses every core.
    pub cores: i32,
    pub obstacle_ids: Vec<u32>,
    pub walkable_ids: Vec<u32>,
    pub min_passage_width: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let limits = ClassifierLimits::default();
        Self {
            start_point: Point3::default(),
            spacing: Point3::new(1.0, 1.0, 1.0),
            max_nodes: -1,
            up_step: limits.up_step,
            up_slope: limits.up_slope,
            down_step: limits.down_step,
            down_slope: limits.down_slope,
            max_step_connections: 1,
            min_connections: 1,
            cores: -1,
            obstacle_ids: Vec::new(),
            walkable_ids: Vec::new(),
            min_passage_width: limits.min_passage_width,
        }
    }
}

impl GeneratorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn limits(&self) -> ClassifierLimits {
        ClassifierLimits {
            up_step: self.up_step,
            down_step: self.down_step,
            up_slope: self.up_slope,
            down_slope: self.down_slope,
            min_passage_width: self.min_passage_width,
        }
    }

    pub fn surface_filter(&self) -> SurfaceFilter {
        SurfaceFilter::new(self.obstacle_ids.clone(), self.walkable_ids.clone())
    }

    /// Node cap, or `None` when unbounded.
    pub fn node_cap(&self) -> Option<usize> {
        usize::try_from(self.max_nodes).ok()
    }

    /// Rejects configurations that cannot make progress.
    pub fn validate(&self) -> Result<()> {
        let finite = |v: f32| v.is_finite();
        if !(self.spacing.x > 0.0 && self.spacing.y > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "planar spacing must be positive, got {}",
                self.spacing
            )));
        }
        if !finite(self.spacing.z) || !finite(self.start_point.x) || !finite(self.start_point.y) {
            return Err(Error::InvalidConfig("non-finite coordinate".into()));
        }
        for (name, value) in [
            ("up_step", self.up_step),
            ("down_step", self.down_step),
            ("up_slope", self.up_slope),
            ("down_slope", self.down_slope),
            ("min_passage_width", self.min_passage_width),
        ] {
            if !finite(value) || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.max_nodes == 0 {
            return Err(Error::InvalidConfig(
                "max_nodes must be positive, or negative for no cap".into(),
            ));
        }
        if self.max_step_connections == 0 {
            return Err(Error::InvalidConfig(
                "max_step_connections must be at least 1".into(),
            ));
        }
        if self.cores < -1 {
            return Err(Error::InvalidConfig(format!(
                "cores must be -1, 0 or a thread count, got {}",
                self.cores
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GeneratorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.up_step, 0.197);
        assert_eq!(config.max_step_connections, 1);
        assert_eq!(config.node_cap(), None);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = GeneratorConfig {
            start_point: Point3::new(-30.0, 0.0, 20.0),
            spacing: Point3::new(1.0, 1.0, 10.0),
            max_nodes: 5000,
            up_step: 5.0,
            down_step: 5.0,
            up_slope: 60.0,
            down_slope: 60.0,
            obstacle_ids: vec![2],
            ..GeneratorConfig::default()
        };
        let json = config.to_json().unwrap();
        let restored = GeneratorConfig::from_json(&json).unwrap();
        assert_eq!(restored, config);
        assert_eq!(restored.node_cap(), Some(5000));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config = GeneratorConfig::from_json(r#"{ "max_nodes": 10, "cores": 0 }"#).unwrap();
        assert_eq!(config.max_nodes, 10);
        assert_eq!(config.cores, 0);
        assert_eq!(config.spacing, Point3::new(1.0, 1.0, 1.0));
        assert_eq!(config.limits(), ClassifierLimits::default());
    }

    #[test]
    fn zero_spacing_is_rejected() {
        let err = GeneratorConfig::from_json(r#"{ "spacing": { "x": 0.0, "y": 1.0, "z": 1.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn zero_node_cap_is_rejected() {
        let err = GeneratorConfig::from_json(r#"{ "max_nodes": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(GeneratorConfig::from_json(r#"{ "max_nodes": 1 }"#).is_ok());
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        let err = GeneratorConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn surface_filter_carries_ids() {
        let config = GeneratorConfig {
            obstacle_ids: vec![1],
            walkable_ids: vec![0],
            ..GeneratorConfig::default()
        };
        let filter = config.surface_filter();
        assert!(filter.is_walkable(0));
        assert!(!filter.is_walkable(1));
        assert!(!filter.is_walkable(5));
    }
}
