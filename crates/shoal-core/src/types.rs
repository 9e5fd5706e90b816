//! Shared types used across the school model and the distributed crates.

use crate::error::{Result, ShoalError};
use serde::{Deserialize, Serialize};

/// Simulation step counter.
pub type Step = u64;

/// Lower bound every agent weight is clamped to.
pub const DEFAULT_WEIGHT_FLOOR: f64 = 10.0;

/// Upper bound of an agent weight, as a multiple of its initial weight.
pub const DEFAULT_MAX_WEIGHT_SCALE: f64 = 2.0;

/// Half-width of the symmetric interval swim perturbations are drawn from.
pub const DEFAULT_SWIM_STEP: f64 = 0.1;

/// A position in the lake.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self::default()
    }

    /// Euclidean norm of the position.
    pub fn distance_from_origin(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Offset the position by `(dx, dy)`.
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Rectangular bounds `[min_x, max_x] × [min_y, max_y]` agents are confined to.
///
/// Both ends of each interval are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Domain {
    /// Create a domain, rejecting inverted or non-finite bounds.
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Result<Self> {
        for (field, value) in [
            ("min_x", min_x),
            ("max_x", max_x),
            ("min_y", min_y),
            ("max_y", max_y),
        ] {
            if !value.is_finite() {
                return Err(ShoalError::invalid_config(
                    field,
                    value.to_string(),
                    "must be finite",
                ));
            }
        }
        if min_x > max_x {
            return Err(ShoalError::invalid_config(
                "min_x",
                min_x.to_string(),
                format!("must not exceed max_x ({})", max_x),
            ));
        }
        if min_y > max_y {
            return Err(ShoalError::invalid_config(
                "min_y",
                min_y.to_string(),
                format!("must not exceed max_y ({})", max_y),
            ));
        }
        Ok(Self {
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// A `width × height` lake centred on the origin.
    pub fn centred(width: f64, height: f64) -> Result<Self> {
        if !(width > 0.0) || !width.is_finite() {
            return Err(ShoalError::invalid_config(
                "lake_width",
                width.to_string(),
                "must be a positive number",
            ));
        }
        if !(height > 0.0) || !height.is_finite() {
            return Err(ShoalError::invalid_config(
                "lake_height",
                height.to_string(),
                "must be a positive number",
            ));
        }
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Self::new(-half_w, half_w, -half_h, half_h)
    }

    pub fn contains_x(&self, x: f64) -> bool {
        x >= self.min_x && x <= self.max_x
    }

    pub fn contains_y(&self, y: f64) -> bool {
        y >= self.min_y && y <= self.max_y
    }

    pub fn contains(&self, position: &Position) -> bool {
        self.contains_x(position.x) && self.contains_y(position.y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Bounds applied to every weight update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightLimits {
    /// No agent ever weighs less than this.
    pub floor: f64,
    /// No agent ever weighs more than `initial_weight * max_scale`.
    pub max_scale: f64,
}

impl Default for WeightLimits {
    fn default() -> Self {
        Self {
            floor: DEFAULT_WEIGHT_FLOOR,
            max_scale: DEFAULT_MAX_WEIGHT_SCALE,
        }
    }
}

impl WeightLimits {
    pub fn new(floor: f64, max_scale: f64) -> Result<Self> {
        if !floor.is_finite() || floor < 0.0 {
            return Err(ShoalError::invalid_config(
                "weight_floor",
                floor.to_string(),
                "must be a non-negative number",
            ));
        }
        // Below 1 an unchanged initial weight would already exceed its ceiling.
        if !(max_scale >= 1.0) || !max_scale.is_finite() {
            return Err(ShoalError::invalid_config(
                "max_weight_scale",
                max_scale.to_string(),
                "must be a number no smaller than 1",
            ));
        }
        Ok(Self { floor, max_scale })
    }

    /// Largest weight an agent with the given initial weight may reach.
    pub fn ceiling(&self, initial_weight: f64) -> f64 {
        initial_weight * self.max_scale
    }

    /// True when an agent starting at `initial_weight` can satisfy both
    /// bounds, i.e. `floor <= initial_weight <= ceiling(initial_weight)`.
    pub fn admits(&self, initial_weight: f64) -> bool {
        initial_weight >= self.floor && initial_weight <= self.ceiling(initial_weight)
    }

    /// Clamp `weight` into `[floor, ceiling(initial_weight)]`.
    ///
    /// Only meaningful for initial weights the limits [admit](Self::admits).
    pub fn clamp(&self, weight: f64, initial_weight: f64) -> f64 {
        weight.max(self.floor).min(self.ceiling(initial_weight))
    }
}

/// One simulated fish.
///
/// The cached distance from the origin is recomputed by every position
/// mutation, so it can never be observed stale.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Agent {
    position: Position,
    distance_from_origin: f64,
    initial_weight: f64,
    weight: f64,
    delta: f64,
}

impl Agent {
    /// Create an agent at `position` carrying `initial_weight`.
    pub fn new(position: Position, initial_weight: f64) -> Self {
        Self {
            position,
            distance_from_origin: position.distance_from_origin(),
            initial_weight,
            weight: initial_weight,
            delta: 0.0,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn distance_from_origin(&self) -> f64 {
        self.distance_from_origin
    }

    pub fn initial_weight(&self) -> f64 {
        self.initial_weight
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Change in distance from the origin produced by the last move.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// This agent's term of the barycentre numerator.
    pub fn weighted_distance(&self) -> f64 {
        self.distance_from_origin * self.weight
    }

    /// Move to `position`, refresh the cached distance and record the delta.
    ///
    /// Returns `|new distance - old distance|`.
    pub fn move_to(&mut self, position: Position) -> f64 {
        let old_distance = self.distance_from_origin;
        self.position = position;
        self.distance_from_origin = position.distance_from_origin();
        self.delta = (self.distance_from_origin - old_distance).abs();
        self.delta
    }

    /// Set the weight, clamped by `limits`.
    pub fn set_weight(&mut self, weight: f64, limits: &WeightLimits) {
        self.weight = limits.clamp(weight, self.initial_weight);
    }
}
