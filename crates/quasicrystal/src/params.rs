//! Generation parameters and their validation.
//!
//! A `GenerationParams` value is frozen for the lifetime of one session;
//! changing any field means starting a new session.

use crate::cfg::{
    DEFAULT_BATCH_SIZE, DEFAULT_PERP_WINDOW, DEFAULT_RADIUS, DEFAULT_TARGET_COUNT,
    FALLBACK_CONCURRENCY, MAX_BATCH_SIZE, MAX_CONCURRENCY, MAX_TARGET_COUNT,
};
use crate::error::GenerationError;
use crate::structures::{StructureDefinition, StructureKind};

/// Full parameter set for one generation session.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParams {
    pub structure: StructureKind,
    /// Candidate coordinates are drawn from `[-lattice_range, lattice_range]`.
    pub lattice_range: i32,
    /// Acceptance radius in perpendicular space.
    pub perp_window: f64,
    /// Acceptance radius in physical space.
    pub clip_radius: f64,
    /// Desired accepted count; also the point buffer capacity.
    pub target_count: usize,
    pub batch_size: usize,
    /// Added to every perpendicular coordinate before the window test.
    pub phason_offset: f64,
    pub concurrency: usize,
    /// Derive per-point colours from the perpendicular distance.
    pub colorize: bool,
    /// Base seed; `None` draws a fresh one per session.
    pub seed: Option<u64>,
}

impl GenerationParams {
    /// Parameters for a cloud of physical radius `radius`, with the lattice
    /// range chosen so the clip sphere is reachable.
    pub fn for_radius(structure: StructureKind, radius: f64, target_count: usize) -> Self {
        Self {
            structure,
            lattice_range: lattice_range_for_clip(radius),
            perp_window: DEFAULT_PERP_WINDOW,
            clip_radius: radius,
            target_count,
            batch_size: DEFAULT_BATCH_SIZE,
            phason_offset: 0.0,
            concurrency: default_concurrency(),
            colorize: false,
            seed: None,
        }
    }

    pub fn definition(&self) -> &'static StructureDefinition {
        self.structure.definition()
    }

    /// Reject configurations that cannot run. Zero or negative windows pass:
    /// they are valid, merely never accept anything.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.target_count == 0 {
            return Err(GenerationError::invalid("target_count must be > 0"));
        }
        if self.batch_size == 0 {
            return Err(GenerationError::invalid("batch_size must be > 0"));
        }
        if self.concurrency == 0 {
            return Err(GenerationError::invalid("concurrency must be >= 1"));
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(GenerationError::invalid(format!(
                "batch_size must be <= {MAX_BATCH_SIZE}"
            )));
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(GenerationError::invalid(format!(
                "concurrency must be <= {MAX_CONCURRENCY}"
            )));
        }
        if self.lattice_range < 0 {
            return Err(GenerationError::invalid("lattice_range must be >= 0"));
        }
        if !(self.perp_window.is_finite()
            && self.clip_radius.is_finite()
            && self.phason_offset.is_finite())
        {
            return Err(GenerationError::invalid(
                "perp_window, clip_radius and phason_offset must be finite",
            ));
        }
        if self.target_count > MAX_TARGET_COUNT {
            return Err(GenerationError::ResourceExhausted {
                requested: self.target_count,
            });
        }
        Ok(())
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::for_radius(
            StructureKind::Icosahedral,
            DEFAULT_RADIUS,
            DEFAULT_TARGET_COUNT,
        )
    }
}

/// Smallest lattice range whose candidate box covers a clip sphere of `radius`.
pub fn lattice_range_for_clip(radius: f64) -> i32 {
    if !radius.is_finite() || radius <= 0.0 {
        return 1;
    }
    (radius.ceil() as i32).saturating_add(1)
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_CONCURRENCY)
}
