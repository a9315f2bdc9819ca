//! Structure registry: lattice dimension plus the two projection bases per symmetry.
//!
//! Model
//! - A structure is a pair of fixed 3×dim matrices: `P` maps a lattice vector
//!   into physical space, `W` into perpendicular space.
//! - Definitions are built once per process and shared read-only by every
//!   sampler (`&'static StructureDefinition`).
//! - `decagonal` and `dodecagonal` are registered names that reuse the
//!   icosahedral and octagonal matrices respectively.

use crate::error::GenerationError;
use nalgebra::{DMatrix, Vector3};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Immutable cut-and-project data for one symmetry.
#[derive(Clone, Debug)]
pub struct StructureDefinition {
    pub name: &'static str,
    pub lattice_dim: usize,
    /// Physical-space rows (3×dim).
    pub physical: DMatrix<f64>,
    /// Perpendicular-space rows (3×dim).
    pub perp: DMatrix<f64>,
    // Row-major copies for the per-candidate dot products.
    physical_rows: Vec<f64>,
    perp_rows: Vec<f64>,
}

impl StructureDefinition {
    fn new(name: &'static str, lattice_dim: usize, physical: &[f64], perp: &[f64]) -> Self {
        debug_assert_eq!(physical.len(), 3 * lattice_dim);
        debug_assert_eq!(perp.len(), 3 * lattice_dim);
        Self {
            name,
            lattice_dim,
            physical: DMatrix::from_row_slice(3, lattice_dim, physical),
            perp: DMatrix::from_row_slice(3, lattice_dim, perp),
            physical_rows: physical.to_vec(),
            perp_rows: perp.to_vec(),
        }
    }

    /// `P · v`.
    #[inline]
    pub fn project_physical(&self, v: &[i32]) -> Vector3<f64> {
        Vector3::new(
            self.row(&self.physical_rows, 0, v),
            self.row(&self.physical_rows, 1, v),
            self.row(&self.physical_rows, 2, v),
        )
    }

    /// `W · v` (no phason shift).
    #[inline]
    pub fn project_perp(&self, v: &[i32]) -> Vector3<f64> {
        Vector3::new(
            self.row(&self.perp_rows, 0, v),
            self.row(&self.perp_rows, 1, v),
            self.row(&self.perp_rows, 2, v),
        )
    }

    /// One perpendicular coordinate, `W[axis] · v`.
    #[inline]
    pub fn perp_axis(&self, axis: usize, v: &[i32]) -> f64 {
        self.row(&self.perp_rows, axis, v)
    }

    #[inline]
    fn row(&self, rows: &[f64], row: usize, v: &[i32]) -> f64 {
        let start = row * self.lattice_dim;
        rows[start..start + self.lattice_dim]
            .iter()
            .zip(v)
            .map(|(a, &x)| a * f64::from(x))
            .sum()
    }
}

/// Named symmetries accepted by `GenerationParams`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StructureKind {
    Icosahedral,
    Octagonal,
    Danzer,
    Decagonal,
    Dodecagonal,
}

impl StructureKind {
    pub const ALL: [StructureKind; 5] = [
        StructureKind::Icosahedral,
        StructureKind::Octagonal,
        StructureKind::Danzer,
        StructureKind::Decagonal,
        StructureKind::Dodecagonal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StructureKind::Icosahedral => "icosahedral",
            StructureKind::Octagonal => "octagonal",
            StructureKind::Danzer => "danzer",
            StructureKind::Decagonal => "decagonal",
            StructureKind::Dodecagonal => "dodecagonal",
        }
    }

    pub fn definition(self) -> &'static StructureDefinition {
        let reg = registry();
        match self {
            StructureKind::Icosahedral | StructureKind::Decagonal => &reg.icosahedral,
            StructureKind::Octagonal | StructureKind::Dodecagonal => &reg.octagonal,
            StructureKind::Danzer => &reg.danzer,
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StructureKind {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StructureKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GenerationError::UnknownStructure {
                name: s.to_string(),
            })
    }
}

struct Registry {
    icosahedral: StructureDefinition,
    octagonal: StructureDefinition,
    danzer: StructureDefinition,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

fn build_registry() -> Registry {
    let phi = (1.0 + 5f64.sqrt()) / 2.0;
    let norm = (2.0 + phi).sqrt();
    let scaled = |xs: [f64; 18]| xs.map(|x| x / norm);
    let s = std::f64::consts::SQRT_2 / 2.0;

    #[rustfmt::skip]
    let icosahedral = StructureDefinition::new(
        "icosahedral",
        6,
        &scaled([
            1.0, phi, 0.0, -1.0, -phi, 0.0,
            phi, 0.0, 1.0, -phi, 0.0, -1.0,
            0.0, 1.0, phi, 0.0, -1.0, -phi,
        ]),
        &scaled([
            -phi, 1.0, 0.0, -phi, -1.0, 0.0,
            0.0, -phi, 1.0, 0.0, -phi, -1.0,
            1.0, 0.0, -phi, 1.0, 0.0, -phi,
        ]),
    );

    #[rustfmt::skip]
    let octagonal = StructureDefinition::new(
        "octagonal",
        4,
        &[
            1.0, s, 0.0, -s,
            0.0, s, 1.0, s,
            -s, 0.0, s, -1.0,
        ],
        &[
            1.0, -s, 0.0, s,
            0.0, -s, 1.0, -s,
            s, 0.0, -s, -1.0,
        ],
    );

    #[rustfmt::skip]
    let danzer = StructureDefinition::new(
        "danzer",
        6,
        &scaled([
            1.0, phi, 0.0, 0.0, -phi, -1.0,
            0.0, 1.0, phi, -1.0, 0.0, -phi,
            phi, 0.0, 1.0, -phi, -1.0, 0.0,
        ]),
        &scaled([
            1.0, -phi, 0.0, 0.0, phi, -1.0,
            0.0, 1.0, -phi, 1.0, 0.0, -phi,
            -phi, 0.0, 1.0, phi, -1.0, 0.0,
        ]),
    );

    Registry {
        icosahedral,
        octagonal,
        danzer,
    }
}
