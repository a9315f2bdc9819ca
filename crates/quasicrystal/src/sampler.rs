//! Sampler: rejection sampling of lattice vectors into fixed-capacity batches.
//!
//! Model
//! - Each candidate is `lattice_dim` independent integers, uniform in
//!   `[-lattice_range, lattice_range]`. No structure is imposed on which
//!   vectors are tried; the acceptance rate is whatever the geometry gives.
//! - Every batch is drawn from its own generator, derived from the replay
//!   token `(worker_seed, batch_index)`. Any batch can be regenerated in
//!   isolation with `replay_batch`.
//! - The stop flag is polled once per candidate, so cancellation latency is a
//!   single projection even when nothing is ever accepted.

use crate::accept::{evaluate, AcceptanceWindow, AcceptedPoint};
use crate::params::GenerationParams;
use crate::structures::StructureDefinition;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;

/// A unit of streamed work: up to `batch_size` accepted points from one sampler.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    pub worker: usize,
    pub index: u64,
    pub points: Vec<AcceptedPoint>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Replay token for one batch of one sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchToken {
    pub seed: u64,
    pub index: u64,
}

impl BatchToken {
    #[inline]
    fn to_std_rng(self) -> StdRng {
        // SplitMix64 finaliser; keeps neighbouring (seed, index) pairs far apart.
        fn mix(mut x: u64) -> u64 {
            x ^= x >> 30;
            x = x.wrapping_mul(0xbf58476d1ce4e5b9);
            x ^= x >> 27;
            x = x.wrapping_mul(0x94d049bb133111eb);
            x ^ (x >> 31)
        }
        let k = mix(self.seed ^ mix(self.index.wrapping_add(0x9e3779b97f4a7c15)));
        StdRng::seed_from_u64(k)
    }
}

/// Per-sampler counters, reported when the sampler exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplerStats {
    pub candidates: u64,
    pub accepted: u64,
    pub batches: u64,
}

pub struct Sampler {
    worker: usize,
    seed: u64,
    structure: &'static StructureDefinition,
    window: AcceptanceWindow,
    lattice_range: i32,
    batch_size: usize,
    next_batch: u64,
    stats: SamplerStats,
}

impl Sampler {
    /// Distinct for every worker index of the same base seed.
    #[inline]
    pub fn worker_seed(base_seed: u64, worker: usize) -> u64 {
        base_seed.wrapping_add(worker as u64)
    }

    pub fn new(worker: usize, base_seed: u64, params: &GenerationParams) -> Self {
        Self {
            worker,
            seed: Self::worker_seed(base_seed, worker),
            structure: params.definition(),
            window: AcceptanceWindow::from_params(params),
            lattice_range: params.lattice_range,
            // a batch never needs to hold more than the whole target
            batch_size: params.batch_size.min(params.target_count).max(1),
            next_batch: 0,
            stats: SamplerStats::default(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    /// Fill the next batch. Returns `None` if `stop` was raised first; the
    /// partial batch is dropped.
    pub fn fill_batch(&mut self, stop: &AtomicBool) -> Option<Batch> {
        let token = BatchToken {
            seed: self.seed,
            index: self.next_batch,
        };
        self.next_batch = self.next_batch.wrapping_add(1);
        let batch = self.draw(token, stop, true)?;
        self.stats.batches += 1;
        Some(batch)
    }

    /// Regenerate batch `index` without touching this sampler's state.
    pub fn replay_batch(&self, index: u64, stop: &AtomicBool) -> Option<Batch> {
        let mut twin = Self {
            stats: SamplerStats::default(),
            ..*self
        };
        twin.draw(
            BatchToken {
                seed: self.seed,
                index,
            },
            stop,
            false,
        )
    }

    fn draw(&mut self, token: BatchToken, stop: &AtomicBool, count: bool) -> Option<Batch> {
        let mut rng = token.to_std_rng();
        let mut v = vec![0i32; self.structure.lattice_dim];
        let mut points = Vec::with_capacity(self.batch_size);
        let r = self.lattice_range;
        while points.len() < self.batch_size {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            for x in v.iter_mut() {
                *x = rng.gen_range(-r..=r);
            }
            if count {
                self.stats.candidates += 1;
            }
            if let Some(pt) = evaluate(&v, self.structure, &self.window) {
                if count {
                    self.stats.accepted += 1;
                }
                points.push(pt);
            }
        }
        Some(Batch {
            worker: self.worker,
            index: token.index,
            points,
        })
    }

    /// Produce batches into `tx` until `stop` is raised or the receiver hangs up.
    pub fn run(mut self, stop: &AtomicBool, tx: SyncSender<Batch>) -> SamplerStats {
        while !stop.load(Ordering::Relaxed) {
            let Some(batch) = self.fill_batch(stop) else {
                break;
            };
            if tx.send(batch).is_err() {
                break;
            }
        }
        tracing::debug!(
            worker = self.worker,
            candidates = self.stats.candidates,
            accepted = self.stats.accepted,
            batches = self.stats.batches,
            "sampler exit"
        );
        self.stats
    }
}
