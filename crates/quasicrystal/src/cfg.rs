//! Limits and defaults for generation (internal).
//!
//! Policy
//! - Defaults are fixed constants; callers override them through
//!   `GenerationParams`, never by editing these values at runtime.

/// Upper bound on `target_count`; larger requests fail before any allocation.
pub(crate) const MAX_TARGET_COUNT: usize = 50_000_000;
/// Upper bound on `batch_size`.
pub(crate) const MAX_BATCH_SIZE: usize = MAX_TARGET_COUNT;
/// Upper bound on `concurrency`.
pub(crate) const MAX_CONCURRENCY: usize = 1024;
/// Bounded depth of the batch channel, per sampler.
pub(crate) const CHANNEL_DEPTH_PER_SAMPLER: usize = 2;
/// Perpendicular window used by `GenerationParams::for_radius`.
pub(crate) const DEFAULT_PERP_WINDOW: f64 = 1.5;
/// Streaming granularity used by `GenerationParams::for_radius`.
pub(crate) const DEFAULT_BATCH_SIZE: usize = 20_000;
/// Worker count when the platform cannot report its parallelism.
pub(crate) const FALLBACK_CONCURRENCY: usize = 4;
/// Physical radius of `GenerationParams::default()`.
pub(crate) const DEFAULT_RADIUS: f64 = 13.0;
/// Point count of `GenerationParams::default()`.
pub(crate) const DEFAULT_TARGET_COUNT: usize = 100_000;
