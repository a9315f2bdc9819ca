//! Stream aggregation into the single bounded point buffer.
//!
//! Ownership
//! - `SharedPoints` is the buffer plus its counters. Readers (renderers, the
//!   CLI) hold an `Arc` and take read snapshots at any rate.
//! - `StreamAggregator` is the only writer. One aggregator exists per session
//!   and it applies batches strictly one after another, so each slot in
//!   `[0, accepted)` is written exactly once and never revisited.
//! - The write critical section is "copy up to N points at the current end and
//!   advance the count"; everything else happens outside the lock.

use crate::accept::AcceptedPoint;
use crate::error::GenerationError;
use crate::sampler::Batch;
use nalgebra::Vector3;
use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Growing, bounded sequence of accepted points. Length is the valid length.
#[derive(Debug)]
pub struct PointBuffer {
    positions: Vec<[f64; 3]>,
    perp_distances: Vec<f64>,
    colors: Option<Vec<[f32; 3]>>,
    capacity: usize,
}

impl PointBuffer {
    /// Reserve room for `capacity` points up front; fails instead of aborting
    /// when the allocator refuses.
    pub fn with_capacity(capacity: usize, colorize: bool) -> Result<Self, GenerationError> {
        let exhausted = |_| GenerationError::ResourceExhausted {
            requested: capacity,
        };
        let mut positions = Vec::new();
        positions.try_reserve_exact(capacity).map_err(exhausted)?;
        let mut perp_distances = Vec::new();
        perp_distances.try_reserve_exact(capacity).map_err(exhausted)?;
        let colors = if colorize {
            let mut c = Vec::new();
            c.try_reserve_exact(capacity).map_err(exhausted)?;
            Some(c)
        } else {
            None
        };
        Ok(Self {
            positions,
            perp_distances,
            colors,
            capacity,
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.positions.len()
    }

    /// Append up to `remaining()` points; the rest are dropped. Returns how many were kept.
    fn append(&mut self, points: &[AcceptedPoint]) -> usize {
        let take = points.len().min(self.remaining());
        let kept = &points[..take];
        self.positions
            .extend(kept.iter().map(|p| [p.position.x, p.position.y, p.position.z]));
        self.perp_distances.extend(kept.iter().map(|p| p.perp_distance));
        if let Some(colors) = self.colors.as_mut() {
            colors.extend(kept.iter().map(|p| p.color.unwrap_or_default()));
        }
        take
    }
}

/// Point buffer shared between the session's aggregator and its readers.
#[derive(Debug)]
pub struct SharedPoints {
    session: u64,
    target: usize,
    accepted: AtomicUsize,
    buffer: RwLock<PointBuffer>,
    complete: Mutex<bool>,
    complete_cv: Condvar,
}

impl SharedPoints {
    pub fn new(session: u64, target: usize, colorize: bool) -> Result<Self, GenerationError> {
        Ok(Self {
            session,
            target,
            accepted: AtomicUsize::new(0),
            buffer: RwLock::new(PointBuffer::with_capacity(target, colorize)?),
            complete: Mutex::new(false),
            complete_cv: Condvar::new(),
        })
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Points accepted so far; never exceeds `target()`.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Acquire)
    }

    /// `accepted / target` in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.target == 0 {
            return 0.0;
        }
        self.accepted() as f64 / self.target as f64
    }

    pub fn is_complete(&self) -> bool {
        *self.complete.lock()
    }

    /// Block until the buffer is full or `timeout` elapses. Returns completion.
    pub fn wait_complete(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.complete.lock();
        while !*done {
            if self.complete_cv.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }

    /// Borrowing read view; its valid length is fixed for as long as the view lives.
    ///
    /// The view holds the buffer's read lock. While it is alive the aggregator
    /// cannot apply batches, and once the channel fills the samplers block
    /// too. Keep views short-lived; use `snapshot` to hold points across frames.
    pub fn view(&self) -> PointsView<'_> {
        PointsView {
            buffer: self.buffer.read(),
        }
    }

    /// Owned copy of the valid prefix. The lock is held only while copying.
    pub fn snapshot(&self) -> PointsSnapshot {
        let buf = self.buffer.read();
        PointsSnapshot {
            positions: buf.positions.clone(),
            perp_distances: buf.perp_distances.clone(),
            colors: buf.colors.clone(),
        }
    }

    fn mark_complete(&self) {
        let mut done = self.complete.lock();
        *done = true;
        self.complete_cv.notify_all();
    }
}

/// Read-only snapshot of the point buffer.
pub struct PointsView<'a> {
    buffer: RwLockReadGuard<'a, PointBuffer>,
}

impl PointsView<'_> {
    pub fn valid_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn positions(&self) -> &[[f64; 3]] {
        &self.buffer.positions
    }

    /// `‖W·v + phason‖` per point, parallel to `positions()`.
    pub fn perp_distances(&self) -> &[f64] {
        &self.buffer.perp_distances
    }

    /// `None` when the session was configured without colours.
    pub fn colors(&self) -> Option<&[[f32; 3]]> {
        self.buffer.colors.as_deref()
    }

    pub fn stats(&self) -> CloudStats {
        CloudStats::from_positions(self.positions())
    }
}

/// Owned copy of a point buffer's valid prefix, detached from the lock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointsSnapshot {
    pub positions: Vec<[f64; 3]>,
    pub perp_distances: Vec<f64>,
    pub colors: Option<Vec<[f32; 3]>>,
}

impl PointsSnapshot {
    pub fn valid_len(&self) -> usize {
        self.positions.len()
    }

    pub fn stats(&self) -> CloudStats {
        CloudStats::from_positions(&self.positions)
    }
}

/// Summary geometry of a point set in physical space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CloudStats {
    pub count: usize,
    pub centroid: Vector3<f64>,
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
    /// Largest distance from the origin.
    pub max_radius: f64,
}

impl CloudStats {
    pub fn from_positions(positions: &[[f64; 3]]) -> Self {
        if positions.is_empty() {
            return Self {
                count: 0,
                centroid: Vector3::zeros(),
                min: Vector3::zeros(),
                max: Vector3::zeros(),
                max_radius: 0.0,
            };
        }
        let mut sum = Vector3::zeros();
        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        let mut max_radius: f64 = 0.0;
        for p in positions {
            let v = Vector3::from(*p);
            sum += v;
            min = min.inf(&v);
            max = max.sup(&v);
            max_radius = max_radius.max(v.norm());
        }
        Self {
            count: positions.len(),
            centroid: sum / positions.len() as f64,
            min,
            max,
            max_radius,
        }
    }
}

/// Reported once per completed session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionSummary {
    pub session: u64,
    pub accepted: usize,
    pub target: usize,
    pub elapsed: Duration,
}

/// Completion callback; runs on the aggregation thread.
pub type CompletionHook = Arc<dyn Fn(&SessionSummary) + Send + Sync>;

/// Result of applying one batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub done: bool,
}

/// Single writer of a `SharedPoints` buffer.
pub struct StreamAggregator {
    shared: Arc<SharedPoints>,
    on_complete: Option<CompletionHook>,
    started: Instant,
    done: bool,
}

impl StreamAggregator {
    pub fn new(shared: Arc<SharedPoints>, on_complete: Option<CompletionHook>) -> Self {
        Self {
            shared,
            on_complete,
            started: Instant::now(),
            done: false,
        }
    }

    pub fn shared(&self) -> &Arc<SharedPoints> {
        &self.shared
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Apply one batch. Surplus points beyond capacity are dropped; after
    /// completion every batch is ignored.
    pub fn on_batch(&mut self, batch: Batch) -> BatchOutcome {
        if self.done || batch.is_empty() {
            return self.outcome();
        }
        let accepted = {
            let mut buf = self.shared.buffer.write();
            let kept = buf.append(&batch.points);
            let len = buf.len();
            self.shared.accepted.store(len, Ordering::Release);
            tracing::trace!(
                worker = batch.worker,
                batch = batch.index,
                kept,
                dropped = batch.len() - kept,
                accepted = len,
                "batch applied"
            );
            len
        };
        if accepted == self.shared.target {
            self.finish();
        }
        self.outcome()
    }

    fn outcome(&self) -> BatchOutcome {
        BatchOutcome {
            accepted: self.shared.accepted(),
            done: self.done,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.shared.mark_complete();
        let summary = SessionSummary {
            session: self.shared.session,
            accepted: self.shared.accepted(),
            target: self.shared.target,
            elapsed: self.started.elapsed(),
        };
        tracing::info!(
            session = summary.session,
            accepted = summary.accepted,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "session complete"
        );
        if let Some(hook) = &self.on_complete {
            hook(&summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicU32;

    /// Points whose x coordinate carries a (batch, slot) tag.
    fn tagged(tag: u32, n: usize) -> Batch {
        let points = (0..n)
            .map(|i| AcceptedPoint {
                position: Vector3::new(tag as f64, i as f64, 0.0),
                perp_distance: 0.0,
                color: Some([tag as f32, 0.0, 0.0]),
            })
            .collect();
        Batch {
            worker: 0,
            index: tag as u64,
            points,
        }
    }

    fn aggregator(capacity: usize) -> StreamAggregator {
        let shared = Arc::new(SharedPoints::new(1, capacity, true).unwrap());
        StreamAggregator::new(shared, None)
    }

    #[test]
    fn counts_are_monotone_and_bounded() {
        let mut agg = aggregator(100);
        let mut last = 0;
        for (tag, n) in [(1, 30), (2, 0), (3, 45), (4, 40), (5, 10)] {
            let out = agg.on_batch(tagged(tag, n));
            assert!(out.accepted >= last && out.accepted <= 100);
            assert_eq!(agg.shared().view().valid_len(), out.accepted);
            last = out.accepted;
        }
        assert_eq!(last, 100);
        assert!(agg.is_done());
        assert!(agg.shared().is_complete());
        assert!((agg.shared().progress() - 1.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn any_batch_sequence_keeps_buffer_invariants(
            capacity in 1usize..200,
            lens in prop::collection::vec(0usize..80, 0..20),
        ) {
            let mut agg = aggregator(capacity);
            let mut last = 0;
            let mut written: Vec<[f64; 3]> = Vec::new();
            for (tag, n) in lens.into_iter().enumerate() {
                let out = agg.on_batch(tagged(tag as u32 + 1, n));
                prop_assert!(out.accepted >= last);
                prop_assert!(out.accepted <= capacity);
                prop_assert_eq!(out.done, out.accepted == capacity);
                let view = agg.shared().view();
                prop_assert_eq!(view.valid_len(), out.accepted);
                prop_assert_eq!(agg.shared().accepted(), out.accepted);
                // earlier slots keep their tags
                prop_assert_eq!(&view.positions()[..written.len()], &written[..]);
                written = view.positions().to_vec();
                last = out.accepted;
            }
        }
    }

    #[test]
    fn slots_are_written_exactly_once() {
        let mut agg = aggregator(50);
        agg.on_batch(tagged(1, 20));
        let before: Vec<[f64; 3]> = agg.shared().view().positions().to_vec();
        agg.on_batch(tagged(2, 20));
        agg.on_batch(tagged(3, 20));
        let view = agg.shared().view();
        assert_eq!(&view.positions()[..20], &before[..]);
        assert!(view.positions()[20..40].iter().all(|p| p[0] == 2.0));
        // batch 3 was truncated to the 10 remaining slots
        assert!(view.positions()[40..].iter().all(|p| p[0] == 3.0));
        assert_eq!(view.valid_len(), 50);
        assert_eq!(view.colors().unwrap().len(), 50);
    }

    #[test]
    fn completion_is_idempotent() {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let shared = Arc::new(SharedPoints::new(9, 10, false).unwrap());
        let hook: CompletionHook = Arc::new(move |s: &SessionSummary| {
            assert_eq!(s.accepted, 10);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut agg = StreamAggregator::new(shared, Some(hook));
        assert!(agg.on_batch(tagged(1, 25)).done);
        let snapshot: Vec<[f64; 3]> = agg.shared().view().positions().to_vec();
        for tag in 2..5 {
            let out = agg.on_batch(tagged(tag, 5));
            assert_eq!(out, BatchOutcome { accepted: 10, done: true });
        }
        assert_eq!(agg.shared().view().positions(), &snapshot[..]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(agg.shared().view().colors().is_none());
    }

    #[test]
    fn empty_batches_are_no_ops() {
        let mut agg = aggregator(5);
        let out = agg.on_batch(Batch::default());
        assert_eq!(out, BatchOutcome { accepted: 0, done: false });
        assert!(!agg.shared().wait_complete(Duration::from_millis(5)));
    }

    #[test]
    fn snapshot_does_not_block_the_writer() {
        let mut agg = aggregator(40);
        agg.on_batch(tagged(1, 15));
        let snap = agg.shared().snapshot();
        // writer proceeds while the snapshot is alive
        let out = agg.on_batch(tagged(2, 15));
        assert_eq!(out.accepted, 30);
        assert_eq!(snap.valid_len(), 15);
        assert_eq!(snap.perp_distances.len(), 15);
        assert_eq!(snap.colors.as_ref().unwrap().len(), 15);
        assert_eq!(&agg.shared().view().positions()[..15], &snap.positions[..]);
        assert_eq!(snap.stats().count, 15);
    }

    #[test]
    fn cloud_stats_bound_the_points() {
        let stats = CloudStats::from_positions(&[[1.0, 0.0, 0.0], [-1.0, 2.0, 0.0], [0.0, -2.0, 3.0]]);
        assert_eq!(stats.count, 3);
        assert!((stats.centroid - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
        assert_eq!(stats.min, Vector3::new(-1.0, -2.0, 0.0));
        assert_eq!(stats.max, Vector3::new(1.0, 2.0, 3.0));
        assert!((stats.max_radius - 13f64.sqrt()).abs() < 1e-12);
        assert_eq!(CloudStats::from_positions(&[]).count, 0);
    }
}
