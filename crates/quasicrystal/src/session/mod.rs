//! Generation session control: configure, start, restart, cancel.
//!
//! State machine
//! - `Idle`: no pool, no buffer. Initial state and the state after `cancel`.
//! - `Building`: one pool running, one buffer filling.
//! - `Complete`: target reached; the pool has been told to stop and the
//!   buffer no longer changes.
//! - `start` from `Building` or `Complete` tears the old pool down (joining
//!   every thread) before the next pool exists, so two pools never share a
//!   buffer. Each start allocates a fresh buffer; nothing carries over.
//!
//! Failure policy
//! - Parameter errors are returned from `configure`/`start` without touching
//!   the running session. The new buffer is allocated before the old session
//!   is torn down, so an allocation failure also leaves it in place.
//! - Thread spawning happens after the old pool is joined (two pools never
//!   run at once). If spawning fails the old session is already gone and the
//!   generator is left `Idle` with the error returned.

use crate::aggregate::{CompletionHook, PointsView, SessionSummary, SharedPoints, StreamAggregator};
use crate::error::GenerationError;
use crate::params::GenerationParams;
use crate::pool::{PoolStats, SamplerPool};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Building,
    Complete,
}

struct ActiveSession {
    id: u64,
    params: GenerationParams,
    base_seed: u64,
    pool: SamplerPool,
}

/// Front door for the rendering/UI side.
pub struct Generator {
    params: Option<GenerationParams>,
    active: Option<ActiveSession>,
    sessions_started: u64,
    on_complete: Option<CompletionHook>,
}

impl Generator {
    pub fn new() -> Self {
        Self {
            params: None,
            active: None,
            sessions_started: 0,
            on_complete: None,
        }
    }

    /// Validate and store params for the next `start`. The running session is untouched.
    pub fn configure(&mut self, params: GenerationParams) -> Result<(), GenerationError> {
        params.validate()?;
        self.params = Some(params);
        Ok(())
    }

    pub fn params(&self) -> Option<&GenerationParams> {
        self.params.as_ref()
    }

    /// Register a callback fired once per session when the target is reached.
    /// Applies to sessions started after this call.
    pub fn on_complete<F>(&mut self, hook: F)
    where
        F: Fn(&SessionSummary) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(hook));
    }

    /// Begin a new session with the configured params, replacing any current
    /// one. Returns the new session id without waiting for any points.
    pub fn start(&mut self) -> Result<u64, GenerationError> {
        let params = self.params.clone().ok_or(GenerationError::NotConfigured)?;
        params.validate()?;
        let id = self.sessions_started + 1;
        let shared = Arc::new(SharedPoints::new(id, params.target_count, params.colorize)?);

        self.stop_active("restart");

        let base_seed = params.seed.unwrap_or_else(rand::random);
        let aggregator = StreamAggregator::new(shared, self.on_complete.clone());
        // On spawn failure the previous session has already been stopped.
        let pool = SamplerPool::start(&params, base_seed, aggregator)?;
        tracing::info!(
            session = id,
            structure = %params.structure,
            target = params.target_count,
            workers = params.concurrency,
            lattice_range = params.lattice_range,
            perp_window = params.perp_window,
            clip_radius = params.clip_radius,
            phason = params.phason_offset,
            base_seed,
            "session start"
        );
        self.sessions_started = id;
        self.active = Some(ActiveSession {
            id,
            params,
            base_seed,
            pool,
        });
        Ok(id)
    }

    /// Stop the current session (if any) and return to `Idle`.
    pub fn cancel(&mut self) -> Option<PoolStats> {
        self.stop_active("cancel")
    }

    fn stop_active(&mut self, reason: &str) -> Option<PoolStats> {
        let active = self.active.take()?;
        let accepted = active.pool.shared().accepted();
        let stats = active.pool.cancel();
        tracing::info!(
            session = active.id,
            reason,
            accepted,
            candidates = stats.candidates,
            "session stopped"
        );
        Some(stats)
    }

    pub fn state(&self) -> SessionState {
        match &self.active {
            None => SessionState::Idle,
            Some(a) if a.pool.shared().is_complete() => SessionState::Complete,
            Some(_) => SessionState::Building,
        }
    }

    pub fn session_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Params and base seed of the running session; fixed until the next start.
    pub fn session_params(&self) -> Option<(&GenerationParams, u64)> {
        self.active.as_ref().map(|a| (&a.params, a.base_seed))
    }

    /// `accepted / target` of the current session; 0 when idle.
    pub fn progress(&self) -> f64 {
        self.points().map_or(0.0, |p| p.progress())
    }

    pub fn accepted_count(&self) -> usize {
        self.points().map_or(0, |p| p.accepted())
    }

    /// Shared handle to the current buffer, for readers that outlive a borrow.
    pub fn points(&self) -> Option<&Arc<SharedPoints>> {
        self.active.as_ref().map(|a| a.pool.shared())
    }

    pub fn points_view(&self) -> Option<PointsView<'_>> {
        self.points().map(|p| p.view())
    }

    /// Wait for the current session to complete. `false` on timeout or when idle.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.points().is_some_and(|p| p.wait_complete(timeout))
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        self.stop_active("drop");
    }
}

#[cfg(test)]
mod tests;
