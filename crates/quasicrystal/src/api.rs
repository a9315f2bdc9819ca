//! Building blocks below the `Generator`, for callers that wire their own pipeline.
//!
//! Each piece can be driven on its own: evaluate single vectors, run a
//! `Sampler` on a thread of your choosing, or feed a `StreamAggregator`
//! from any source of batches.

pub use crate::accept::{color_ramp, evaluate, AcceptanceWindow, AcceptedPoint};
pub use crate::aggregate::{
    BatchOutcome, CloudStats, CompletionHook, PointBuffer, PointsSnapshot, PointsView,
    SessionSummary, SharedPoints, StreamAggregator,
};
pub use crate::pool::{PoolStats, SamplerPool};
pub use crate::sampler::{Batch, BatchToken, Sampler, SamplerStats};
pub use crate::structures::{StructureDefinition, StructureKind};
