//! Layout tunables.
//!
//! [`ForceConfig`] is what callers hand to the orchestrator (and may load from JSON);
//! [`EngineParams`] is the subset the physics engine consumes after the viewport has been
//! resolved.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sirenia_graph::Point;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceConfig {
    /// Multiplier on the ideal edge length `k`.
    pub scaling: f64,
    pub gravity: f64,
    /// Strong gravity grows with distance from the center, weak gravity fades with it.
    pub strong_gravity: bool,
    /// Exponent applied to edge weights. `0` ignores weights entirely.
    pub edge_weight_influence: f64,
    pub barnes_hut_optimize: bool,
    pub barnes_hut_theta: f64,
    /// Use `degree + 1` instead of the node mass for repulsion.
    pub repulsion_by_degree: bool,
    pub prevent_node_overlap: bool,
    pub prevent_node_edge_overlap: bool,
    pub max_speed_increase: f64,
    /// Per-iteration temperature decay.
    pub cool_down: f64,
    /// Gravity target. `None` pulls toward the current center of mass.
    pub center: Option<Point>,
    pub width: f64,
    pub height: f64,
    /// Keep the viewport aspect ratio. When `false` the engine simulates in a square of side
    /// `min(width, height)`.
    pub ratio_scaling: bool,
    /// Seed for the initial placement of nodes without a position.
    pub random_seed: u64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            scaling: 1.0,
            gravity: 1.0,
            strong_gravity: true,
            edge_weight_influence: 1.0,
            barnes_hut_optimize: false,
            barnes_hut_theta: 1.5,
            repulsion_by_degree: false,
            prevent_node_overlap: false,
            prevent_node_edge_overlap: false,
            max_speed_increase: 1.0,
            cool_down: 0.99,
            center: Some(Point::new(0.0, 0.0)),
            width: 500.0,
            height: 500.0,
            ratio_scaling: false,
            random_seed: 0,
        }
    }
}

impl ForceConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns a copy with the keys of `overrides` (a JSON object, camelCase keys) merged on top.
    pub fn with_overrides(&self, overrides: &Value) -> Result<Self> {
        let mut base = serde_json::to_value(self)?;
        deep_merge_value(&mut base, overrides);
        let config: Self = serde_json::from_value(base)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let checks: [(&'static str, bool, &'static str); 7] = [
            ("scaling", self.scaling > 0.0, "must be positive"),
            (
                "coolDown",
                self.cool_down > 0.0 && self.cool_down <= 1.0,
                "must be in (0, 1]",
            ),
            ("barnesHutTheta", self.barnes_hut_theta >= 0.0, "must not be negative"),
            (
                "edgeWeightInfluence",
                self.edge_weight_influence >= 0.0 && self.edge_weight_influence.is_finite(),
                "must be a finite, non-negative number",
            ),
            ("width", self.width > 0.0, "must be positive"),
            ("height", self.height > 0.0, "must be positive"),
            (
                "maxSpeedIncrease",
                self.max_speed_increase >= 0.0,
                "must not be negative",
            ),
        ];
        for (field, ok, reason) in checks {
            if !ok {
                return Err(Error::InvalidConfig { field, reason });
            }
        }
        Ok(())
    }

    /// Extent handed to the engine, honoring `ratio_scaling`.
    pub fn extent(&self) -> (f64, f64) {
        if self.ratio_scaling {
            (self.width, self.height)
        } else {
            let side = self.width.min(self.height);
            (side, side)
        }
    }

    pub fn engine_params(&self) -> EngineParams {
        let (width, height) = self.extent();
        EngineParams {
            scaling: self.scaling,
            gravity: self.gravity,
            strong_gravity: self.strong_gravity,
            edge_weight_influence: self.edge_weight_influence,
            barnes_hut_optimize: self.barnes_hut_optimize,
            barnes_hut_theta: self.barnes_hut_theta,
            repulsion_by_degree: self.repulsion_by_degree,
            prevent_node_overlap: self.prevent_node_overlap,
            prevent_node_edge_overlap: self.prevent_node_edge_overlap,
            max_speed_increase: self.max_speed_increase,
            center: self.center,
            width,
            height,
        }
    }
}

fn deep_merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge_value(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}

/// Engine-side tunables. Cheap to copy across the worker boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParams {
    pub scaling: f64,
    pub gravity: f64,
    pub strong_gravity: bool,
    pub edge_weight_influence: f64,
    pub barnes_hut_optimize: bool,
    pub barnes_hut_theta: f64,
    pub repulsion_by_degree: bool,
    pub prevent_node_overlap: bool,
    pub prevent_node_edge_overlap: bool,
    pub max_speed_increase: f64,
    pub center: Option<Point>,
    pub width: f64,
    pub height: f64,
}

impl Default for EngineParams {
    fn default() -> Self {
        ForceConfig::default().engine_params()
    }
}
