//! Cut-and-project point clouds of quasicrystalline tilings.
//!
//! Lattice vectors of a 4- or 6-dimensional integer lattice are drawn at
//! random, projected into a 3D physical space and a 3D perpendicular space,
//! and kept when both projections fall inside their spherical windows.
//! Several samplers run in parallel and stream batches into one bounded
//! point buffer; a `Generator` restarts the whole pipeline whenever the
//! parameters change.
//!
//! Layout (leaf first)
//! - `structures`: projection matrices per symmetry.
//! - `accept`: the window test and colour ramp.
//! - `sampler`: seeded rejection sampling into batches.
//! - `aggregate`: the single-writer point buffer.
//! - `pool`: sampler threads plus the aggregation thread.
//! - `session`: the `Generator` state machine.

pub mod accept;
pub mod aggregate;
pub mod api;
mod cfg;
pub mod error;
pub mod params;
pub mod pool;
pub mod sampler;
pub mod session;
pub mod structures;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::GenerationError;
pub use params::GenerationParams;
pub use session::{Generator, SessionState};
pub use structures::StructureKind;

/// Common exports for callers driving a generator.
pub mod prelude {
    pub use crate::aggregate::{
        CloudStats, PointsSnapshot, PointsView, SessionSummary, SharedPoints,
    };
    pub use crate::error::GenerationError;
    pub use crate::params::{lattice_range_for_clip, GenerationParams};
    pub use crate::session::{Generator, SessionState};
    pub use crate::structures::StructureKind;
}
