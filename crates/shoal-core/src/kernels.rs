//! SWIM and EAT, the per-agent update kernels.
//!
//! Every step each agent first swims (a small random move that is rejected
//! per axis at the lake shore) and then eats (its weight grows by its share
//! of the school's largest movement). Both kernels touch exactly one agent
//! and share no mutable state, so callers may run them over disjoint slices
//! on as many threads as they like.

use crate::error::{Result, ShoalError};
use crate::types::{Agent, Domain, Position, WeightLimits, DEFAULT_SWIM_STEP};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Pluggable local update rules.
///
/// Implementations must uphold the agent invariants:
/// - after `swim`, the agent lies inside `domain` and its delta equals the
///   change in its distance from the origin (use [`Agent::move_to`]);
/// - after `eat`, the weight lies within the configured limits (use
///   [`Agent::set_weight`]);
/// - `eat` with a non-positive or non-finite `max_delta` leaves the agent
///   untouched.
pub trait LocalKernels: Send + Sync {
    /// Move one agent and return its delta metric.
    fn swim(&self, agent: &mut Agent, domain: &Domain, rng: &mut dyn RngCore) -> f64;

    /// Adjust one agent's weight given the population-wide maximum delta.
    fn eat(&self, agent: &mut Agent, max_delta: f64);

    /// Kernel name (for logging).
    fn name(&self) -> &str {
        "custom"
    }
}

/// The simplified fish school search rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchoolKernels {
    /// Perturbations are drawn uniformly from `[-swim_step, swim_step]`.
    pub swim_step: f64,
    /// Bounds for every weight update.
    pub limits: WeightLimits,
}

impl Default for SchoolKernels {
    fn default() -> Self {
        Self {
            swim_step: DEFAULT_SWIM_STEP,
            limits: WeightLimits::default(),
        }
    }
}

impl SchoolKernels {
    pub fn new(swim_step: f64, limits: WeightLimits) -> Self {
        Self { swim_step, limits }
    }

    /// Kernels for `domain`, rejecting a swim step no lake can use.
    ///
    /// A perturbation may span at most half of the lake's shorter side.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::OutOfRange` for a negative, non-finite or
    /// oversized `swim_step`.
    pub fn for_domain(swim_step: f64, limits: WeightLimits, domain: &Domain) -> Result<Self> {
        // Halving before subtracting keeps the extent finite on any valid domain.
        // The cap leaves headroom for the uniform sampler's scale computation.
        let reach = (domain.max_x / 2.0 - domain.min_x / 2.0)
            .min(domain.max_y / 2.0 - domain.min_y / 2.0)
            .min(f64::MAX / 4.0);
        if !(swim_step >= 0.0) || swim_step > reach {
            return Err(ShoalError::out_of_range("swim_step", swim_step, 0.0, reach));
        }
        Ok(Self::new(swim_step, limits))
    }

    /// Apply an explicit `(dx, dy)` move.
    ///
    /// Each axis is checked on its own: a coordinate that would leave the
    /// domain keeps its previous value while the other axis still moves.
    pub fn swim_by(&self, agent: &mut Agent, domain: &Domain, dx: f64, dy: f64) -> f64 {
        let old = agent.position();
        let mut next = old.offset(dx, dy);
        if !domain.contains_x(next.x) {
            next.x = old.x;
        }
        if !domain.contains_y(next.y) {
            next.y = old.y;
        }
        agent.move_to(Position::new(next.x, next.y))
    }

    fn draw(&self, rng: &mut dyn RngCore) -> f64 {
        if self.swim_step > 0.0 {
            rng.gen_range(-self.swim_step..=self.swim_step)
        } else {
            0.0
        }
    }
}

impl LocalKernels for SchoolKernels {
    fn swim(&self, agent: &mut Agent, domain: &Domain, rng: &mut dyn RngCore) -> f64 {
        let dx = self.draw(rng);
        let dy = self.draw(rng);
        self.swim_by(agent, domain, dx, dy)
    }

    fn eat(&self, agent: &mut Agent, max_delta: f64) {
        // Zero max means nobody moved this step.
        if !(max_delta > 0.0) || !max_delta.is_finite() {
            return;
        }
        let gained = agent.weight() + agent.delta() / max_delta;
        agent.set_weight(gained, &self.limits);
    }

    fn name(&self) -> &str {
        "school"
    }
}
