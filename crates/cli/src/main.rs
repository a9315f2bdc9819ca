use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use quasicrystal::prelude::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

mod config;
mod provenance;

use config::ParamsFile;

#[derive(Parser)]
#[command(name = "cli")]
#[command(about = "Generate cut-and-project quasicrystal point clouds")]
struct Cmd {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Run one generation session and print a JSON summary
    Generate(GenerateArgs),
    /// List the registered structures
    Structures,
    /// Print a small provenance JSON block
    Report,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// JSON params file; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    structure: Option<String>,
    /// Physical radius; sets clip radius and a matching lattice range
    #[arg(long)]
    radius: Option<f64>,
    #[arg(long)]
    lattice_range: Option<i32>,
    #[arg(long)]
    perp_window: Option<f64>,
    #[arg(long)]
    clip_radius: Option<f64>,
    #[arg(long)]
    target: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long, allow_hyphen_values = true)]
    phason: Option<f64>,
    #[arg(long)]
    workers: Option<usize>,
    /// Derive per-point colours from the perpendicular distance
    #[arg(long)]
    colorize: bool,
    #[arg(long)]
    seed: Option<u64>,
    /// Give up (and cancel) after this many seconds
    #[arg(long)]
    timeout_secs: Option<f64>,
    /// Progress log cadence
    #[arg(long, default_value_t = 250)]
    progress_ms: u64,
    /// Also write the summary here, with a provenance sidecar
    #[arg(long)]
    out: Option<PathBuf>,
}

impl GenerateArgs {
    fn overrides(&self) -> ParamsFile {
        ParamsFile {
            structure_name: self.structure.clone(),
            radius: self.radius,
            lattice_range: self.lattice_range,
            perp_window: self.perp_window,
            clip_radius: self.clip_radius,
            target_count: self.target,
            batch_size: self.batch_size,
            phason_offset: self.phason,
            concurrency: self.workers,
            colorize: self.colorize.then_some(true),
            seed: self.seed,
        }
    }
}

fn main() -> Result<()> {
    SubscriberBuilder::default()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Generate(args) => generate(args),
        Action::Structures => structures(),
        Action::Report => report(),
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let base = match &args.config {
        Some(path) => ParamsFile::load(path)?,
        None => ParamsFile::default(),
    };
    let params = base.merge(args.overrides()).resolve()?;

    let mut gen = Generator::new();
    gen.configure(params.clone())
        .context("rejected generation params")?;
    let started = Instant::now();
    let session = gen.start()?;
    let deadline = args
        .timeout_secs
        .map(|s| started + Duration::from_secs_f64(s.max(0.0)));
    let cadence = Duration::from_millis(args.progress_ms.max(1));

    while !gen.wait(cadence) {
        tracing::info!(
            session,
            accepted = gen.accepted_count(),
            progress_pct = gen.progress() * 100.0,
            "building"
        );
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::warn!(session, "timeout reached; cancelling");
            break;
        }
    }

    let state = gen.state();
    let base_seed = gen.session_params().map(|(_, seed)| seed);
    let (accepted, progress, stats) = match gen.points() {
        Some(points) => (points.accepted(), points.progress(), points.view().stats()),
        None => (0, 0.0, CloudStats::from_positions(&[])),
    };
    let pool = gen.cancel();
    let elapsed = started.elapsed();

    let params_json = params_to_json(&params);
    let summary = json!({
        "session": session,
        "state": format!("{state:?}"),
        "params": params_json,
        "base_seed": base_seed,
        "accepted": accepted,
        "progress": progress,
        "elapsed_ms": elapsed.as_millis() as u64,
        "candidates": pool.map(|p| p.candidates),
        "cloud": {
            "count": stats.count,
            "centroid": [stats.centroid.x, stats.centroid.y, stats.centroid.z],
            "min": [stats.min.x, stats.min.y, stats.min.z],
            "max": [stats.max.x, stats.max.y, stats.max.z],
            "max_radius": stats.max_radius,
        }
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(out) = &args.out {
        write_summary(out, &summary)?;
        let sidecar = provenance::write_sidecar(
            out,
            provenance::RunRecord::new(params_json, base_seed),
        )?;
        tracing::info!(out = %out.display(), sidecar = %sidecar.display(), "summary written");
    }
    Ok(())
}

fn write_summary(out: &Path, summary: &Value) -> Result<()> {
    if let Some(parent) = out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    std::fs::write(out, serde_json::to_vec_pretty(summary)?)
        .with_context(|| format!("writing {}", out.display()))
}

fn params_to_json(p: &GenerationParams) -> Value {
    json!({
        "structureName": p.structure.name(),
        "latticeRange": p.lattice_range,
        "perpWindow": p.perp_window,
        "clipRadius": p.clip_radius,
        "targetCount": p.target_count,
        "batchSize": p.batch_size,
        "phasonOffset": p.phason_offset,
        "concurrency": p.concurrency,
        "colorize": p.colorize,
        "seed": p.seed,
    })
}

fn structures() -> Result<()> {
    let rows: Vec<Value> = StructureKind::ALL
        .iter()
        .map(|k| {
            let def = k.definition();
            json!({ "name": k.name(), "lattice_dim": def.lattice_dim, "matrices": def.name })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn report() -> Result<()> {
    let obj = json!({
        "code_rev": provenance::current_git_rev(),
        "lib_version": quasicrystal::VERSION,
        "structures": StructureKind::ALL.iter().map(|k| k.name()).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&obj)?);
    Ok(())
}
