//! JSON parameter files and flag overrides for `generate`.

use anyhow::{Context, Result};
use quasicrystal::{GenerationParams, StructureKind};
use serde::Deserialize;
use std::path::Path;

/// On-disk form of `GenerationParams`; every field is optional.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ParamsFile {
    pub structure_name: Option<String>,
    pub radius: Option<f64>,
    pub lattice_range: Option<i32>,
    pub perp_window: Option<f64>,
    pub clip_radius: Option<f64>,
    pub target_count: Option<usize>,
    pub batch_size: Option<usize>,
    pub phason_offset: Option<f64>,
    pub concurrency: Option<usize>,
    pub colorize: Option<bool>,
    pub seed: Option<u64>,
}

impl ParamsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Field-wise override: values set in `other` win.
    pub fn merge(self, other: ParamsFile) -> ParamsFile {
        ParamsFile {
            structure_name: other.structure_name.or(self.structure_name),
            radius: other.radius.or(self.radius),
            lattice_range: other.lattice_range.or(self.lattice_range),
            perp_window: other.perp_window.or(self.perp_window),
            clip_radius: other.clip_radius.or(self.clip_radius),
            target_count: other.target_count.or(self.target_count),
            batch_size: other.batch_size.or(self.batch_size),
            phason_offset: other.phason_offset.or(self.phason_offset),
            concurrency: other.concurrency.or(self.concurrency),
            colorize: other.colorize.or(self.colorize),
            seed: other.seed.or(self.seed),
        }
    }

    /// Resolve against the library defaults. `radius` seeds clip radius and
    /// lattice range; explicit `clipRadius`/`latticeRange` take precedence.
    pub fn resolve(&self) -> Result<GenerationParams> {
        let mut params = GenerationParams::default();
        if let Some(name) = &self.structure_name {
            params.structure = name.parse::<StructureKind>()?;
        }
        if let Some(radius) = self.radius {
            params = GenerationParams::for_radius(params.structure, radius, params.target_count);
        }
        set(&mut params.lattice_range, self.lattice_range);
        set(&mut params.perp_window, self.perp_window);
        set(&mut params.clip_radius, self.clip_radius);
        set(&mut params.target_count, self.target_count);
        set(&mut params.batch_size, self.batch_size);
        set(&mut params.phason_offset, self.phason_offset);
        set(&mut params.concurrency, self.concurrency);
        set(&mut params.colorize, self.colorize);
        params.seed = self.seed.or(params.seed);
        Ok(params)
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}
