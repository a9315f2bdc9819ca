//! Sampler pool: N sampler threads feeding one aggregation thread.
//!
//! Topology
//! - Every sampler owns a clone of one bounded `SyncSender<Batch>`; a single
//!   drain thread owns the receiver and the `StreamAggregator`. That drain
//!   thread is the only place the point buffer is mutated.
//! - One `AtomicBool` stop flag is shared by all threads. The drain thread
//!   raises it when the target is reached; `cancel` raises it from outside.
//! - After the flag is up the drain thread keeps receiving (and discarding)
//!   until every sender is gone, so a sampler blocked on a full channel is
//!   always released.

use crate::aggregate::{SharedPoints, StreamAggregator};
use crate::cfg::CHANNEL_DEPTH_PER_SAMPLER;
use crate::error::GenerationError;
use crate::params::GenerationParams;
use crate::sampler::{Batch, Sampler, SamplerStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Totals over all samplers of a pool, available after it is joined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub candidates: u64,
    pub accepted: u64,
    pub batches: u64,
}

impl PoolStats {
    fn absorb(&mut self, s: SamplerStats) {
        self.workers += 1;
        self.candidates += s.candidates;
        self.accepted += s.accepted;
        self.batches += s.batches;
    }
}

pub struct SamplerPool {
    stop: Arc<AtomicBool>,
    shared: Arc<SharedPoints>,
    samplers: Vec<JoinHandle<SamplerStats>>,
    drain: Option<JoinHandle<()>>,
}

impl SamplerPool {
    /// Spawn `params.concurrency` samplers seeded from `base_seed` and the
    /// drain thread running `aggregator`. Returns immediately.
    pub fn start(
        params: &GenerationParams,
        base_seed: u64,
        aggregator: StreamAggregator,
    ) -> Result<Self, GenerationError> {
        let workers = params.concurrency.max(1);
        let (tx, rx) = sync_channel::<Batch>(workers * CHANNEL_DEPTH_PER_SAMPLER);
        let stop = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            stop: Arc::clone(&stop),
            shared: Arc::clone(aggregator.shared()),
            samplers: Vec::with_capacity(workers),
            drain: None,
        };

        let drain_stop = Arc::clone(&stop);
        let drain = thread::Builder::new()
            .name(format!("aggregate-{}", pool.shared.session()))
            .spawn(move || drain_batches(rx, aggregator, &drain_stop))
            .map_err(spawn_error)?;
        pool.drain = Some(drain);

        for worker in 0..workers {
            let sampler = Sampler::new(worker, base_seed, params);
            let flag = Arc::clone(&stop);
            let sender = tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("sampler-{worker}"))
                .spawn(move || sampler.run(&flag, sender));
            match spawned {
                Ok(handle) => pool.samplers.push(handle),
                Err(err) => {
                    // Dropping `pool` stops and joins whatever already started.
                    drop(tx);
                    return Err(spawn_error(err));
                }
            }
        }
        Ok(pool)
    }

    pub fn shared(&self) -> &Arc<SharedPoints> {
        &self.shared
    }

    /// True once the stop flag is up (target reached or cancelled).
    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Signal every sampler and wait until all threads have exited. Batches
    /// still in flight are discarded.
    pub fn cancel(mut self) -> PoolStats {
        self.shutdown()
    }

    fn shutdown(&mut self) -> PoolStats {
        self.stop.store(true, Ordering::Release);
        let mut stats = PoolStats::default();
        for handle in self.samplers.drain(..) {
            match handle.join() {
                Ok(s) => stats.absorb(s),
                Err(_) => tracing::warn!("sampler thread panicked"),
            }
        }
        if let Some(drain) = self.drain.take() {
            if drain.join().is_err() {
                tracing::warn!("aggregation thread panicked");
            }
        }
        stats
    }
}

impl Drop for SamplerPool {
    fn drop(&mut self) {
        if !self.samplers.is_empty() || self.drain.is_some() {
            self.shutdown();
        }
    }
}

fn drain_batches(rx: Receiver<Batch>, mut aggregator: StreamAggregator, stop: &AtomicBool) {
    for batch in rx {
        if stop.load(Ordering::Acquire) {
            continue;
        }
        if aggregator.on_batch(batch).done {
            stop.store(true, Ordering::Release);
        }
    }
}

fn spawn_error(err: std::io::Error) -> GenerationError {
    GenerationError::WorkerSpawn {
        reason: err.to_string(),
    }
}
