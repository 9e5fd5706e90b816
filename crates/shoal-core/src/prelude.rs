//! Shoal Core Prelude: convenient imports for common usage.
//!
//! ```rust
//! use shoal_core::prelude::*;
//! ```

pub use crate::types::{
    Agent, Domain, Position, Step, WeightLimits,
    DEFAULT_MAX_WEIGHT_SCALE, DEFAULT_SWIM_STEP, DEFAULT_WEIGHT_FLOOR,
};

pub use crate::kernels::{LocalKernels, SchoolKernels};

pub use crate::population::{
    PopulationSeeder, DEFAULT_INITIAL_WEIGHT_MAX, DEFAULT_INITIAL_WEIGHT_MIN,
};

pub use crate::error::{ConfigError, Result, ShoalError};
