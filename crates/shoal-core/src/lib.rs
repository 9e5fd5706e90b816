//! # Shoal Core
//!
//! Agent model and local update kernels for a simplified fish school search.
//!
//! - **Agent**: a fish with a position, a cached distance from the origin,
//!   an initial and a current weight, and the delta produced by its last move
//! - **Domain**: the rectangular lake every fish is confined to
//! - **Kernels**: SWIM (bounded random move) and EAT (clamped weight gain),
//!   pluggable through [`kernels::LocalKernels`]
//! - **Seeding**: uniform sampling of a fresh population
//!
//! ## Quick Start
//!
//! ```rust
//! use shoal_core::prelude::*;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let domain = Domain::centred(200.0, 200.0).unwrap();
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let mut school = PopulationSeeder::with_default_weights(domain).seed(16, &mut rng);
//!
//! let kernels = SchoolKernels::default();
//! let max_delta = school
//!     .iter_mut()
//!     .map(|fish| kernels.swim(fish, &domain, &mut rng))
//!     .fold(0.0, f64::max);
//! for fish in &mut school {
//!     kernels.eat(fish, max_delta);
//! }
//! ```

pub mod error;
pub mod kernels;
pub mod population;
pub mod prelude;
pub mod types;
