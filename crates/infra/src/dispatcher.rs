//! Dispatch loop: hands queued jobs to the device one at a time.
//!
//! The loop dispatches only when the device is IDLE and the queue is non-empty.
//! A dispatch is a claim (IDLE -> PROCESSING) followed by a dequeue; the
//! network send then runs in its own task so the loop never waits on the
//! device. The device goes back to IDLE through [`DispatcherHandle::receive_completion`]
//! or, when the send fails, through the failure path in this module.
//!
//! The loop wakes on three triggers: an explicit [`DispatcherHandle::notify`]
//! (enqueue, release), a fallback poll tick (state changed by another process
//! sharing the store), and shutdown.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use web2wire_core::{DeviceState, Job, SequenceId};

use crate::device_state::DeviceStateStore;
use crate::error::StoreError;
use crate::queue::JobQueue;
use crate::transport::{DEFAULT_DEVICE_TIMEOUT, DeviceTransport, DispatchOutcome};

/// What happens to a job the device did not accept.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop the job (logged at WARN and counted).
    #[default]
    Drop,
    /// Put the job back at the head of the queue.
    Requeue,
}

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Fallback poll interval
    pub poll_interval: Duration,
    /// Hard bound on one device send
    pub send_timeout: Duration,
    pub failure_policy: FailurePolicy,
    /// Name for logging
    pub name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            send_timeout: DEFAULT_DEVICE_TIMEOUT,
            failure_policy: FailurePolicy::Drop,
            name: "dispatcher".to_string(),
        }
    }
}

impl DispatcherConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Dispatcher runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub dispatched: u64,
    pub accepted: u64,
    pub failed: u64,
    pub requeued: u64,
    pub dropped: u64,
    pub completed: u64,
    /// Job most recently handed to the device and not yet completed.
    pub in_flight: Option<SequenceId>,
}

/// Result of one observation of the queue and the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStep {
    DeviceBusy,
    QueueEmpty,
    /// Another dispatcher claimed the device between our read and our claim.
    LostRace,
    Dispatched(SequenceId),
    StoreUnavailable,
}

struct Shared {
    queue: Arc<dyn JobQueue>,
    device: Arc<dyn DeviceStateStore>,
    transport: Arc<dyn DeviceTransport>,
    config: DispatcherConfig,
    wake: Notify,
    stats: Mutex<DispatchStats>,
}

impl Shared {
    fn stats(&self) -> MutexGuard<'_, DispatchStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Background dispatcher.
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        device: Arc<dyn DeviceStateStore>,
        transport: Arc<dyn DeviceTransport>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue,
                device,
                transport,
                config,
                wake: Notify::new(),
                stats: Mutex::new(DispatchStats::default()),
            }),
        }
    }

    /// Spawn the loop on the current tokio runtime.
    ///
    /// The loop stops when `shutdown` is cancelled. Sends already in flight
    /// finish on their own (each is bounded by the send timeout).
    pub fn spawn(self, shutdown: CancellationToken) -> DispatcherHandle {
        let shared = self.shared.clone();
        let token = shutdown.clone();
        let join = tokio::spawn(dispatch_loop(shared, token));

        DispatcherHandle {
            shared: self.shared,
            shutdown,
            join: Arc::new(Mutex::new(Some(join))),
        }
    }

    /// Run a single observation without spawning the loop (tests, tooling).
    pub async fn dispatch_once(&self) -> DispatchStep {
        dispatch_once(&self.shared).await
    }

    /// Handle sharing this dispatcher's state, without a running loop.
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            shared: self.shared.clone(),
            shutdown: CancellationToken::new(),
            join: Arc::new(Mutex::new(None)),
        }
    }
}

/// Handle to signal, inspect and stop a running dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    join: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl core::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("name", &self.shared.config.name)
            .field("stopped", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl DispatcherHandle {
    /// Wake the loop (call after an enqueue).
    pub fn notify(&self) {
        self.shared.wake.notify_one();
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> DispatchStats {
        self.shared.stats().clone()
    }

    /// Ingest the device's "job complete" signal.
    ///
    /// Must only be called after the callback credential has been verified.
    /// `reference` is the sequence id the device reports, if any; a mismatch
    /// with the job in flight is logged but does not block the release.
    pub async fn receive_completion(&self, reference: Option<SequenceId>) -> Result<(), StoreError> {
        // Take ownership of the claim before releasing, so a job dispatched
        // right after the release is never cleared from the stats.
        let in_flight = self.shared.stats().in_flight.take();

        match (reference, in_flight) {
            (Some(reported), Some(expected)) if reported != expected => {
                warn!(%reported, %expected, "completion reported for a different job");
            }
            (_, None) => {
                debug!(reported = ?reference, "completion received with no job in flight");
            }
            _ => {}
        }

        if let Err(e) = self.shared.device.release().await {
            let mut stats = self.shared.stats();
            if stats.in_flight.is_none() {
                stats.in_flight = in_flight;
            }
            return Err(e);
        }

        self.shared.stats().completed += 1;
        info!(sequence_id = ?in_flight, "device released by completion callback");

        self.notify();
        Ok(())
    }

    /// Request shutdown and wait for the loop to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let join = self.join.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(join) = join {
            if let Err(e) = join.await {
                error!(error = %e, "dispatcher task ended abnormally");
            }
        }
    }
}

async fn dispatch_loop(shared: Arc<Shared>, shutdown: CancellationToken) {
    let name = shared.config.name.clone();
    info!(dispatcher = %name, poll_ms = shared.config.poll_interval.as_millis() as u64, "dispatcher started");

    let mut tick = tokio::time::interval(shared.config.poll_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let step = dispatch_once(&shared).await;
        debug!(dispatcher = %name, ?step, "dispatch cycle");

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = shared.wake.notified() => {}
            _ = tick.tick() => {}
        }
    }

    info!(dispatcher = %name, "dispatcher stopped");
}

async fn dispatch_once(shared: &Arc<Shared>) -> DispatchStep {
    match shared.device.read().await {
        Ok(DeviceState::Processing) => return DispatchStep::DeviceBusy,
        Ok(DeviceState::Idle) => {}
        Err(e) => {
            warn!(error = %e, "cannot read device state");
            return DispatchStep::StoreUnavailable;
        }
    }

    match shared.queue.size().await {
        Ok(0) => return DispatchStep::QueueEmpty,
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "cannot read queue size");
            return DispatchStep::StoreUnavailable;
        }
    }

    match shared.device.try_claim().await {
        Ok(true) => {}
        Ok(false) => return DispatchStep::LostRace,
        Err(e) => {
            warn!(error = %e, "device claim failed");
            return DispatchStep::StoreUnavailable;
        }
    }

    let job = match shared.queue.dequeue().await {
        Ok(Some(job)) => job,
        Ok(None) => {
            // Someone else emptied the queue after our size check.
            release_quietly(shared, "queue drained after claim").await;
            return DispatchStep::QueueEmpty;
        }
        Err(e) => {
            warn!(error = %e, "dequeue failed after claim");
            release_quietly(shared, "dequeue failed").await;
            return DispatchStep::StoreUnavailable;
        }
    };

    let sequence_id = job.sequence_id();
    {
        let mut stats = shared.stats();
        stats.dispatched += 1;
        stats.in_flight = Some(sequence_id);
    }
    info!(%sequence_id, name = %job.name(), country = %job.country(), "device claimed, dispatching job");

    tokio::spawn(deliver(shared.clone(), job));
    DispatchStep::Dispatched(sequence_id)
}

async fn deliver(shared: Arc<Shared>, job: Job) {
    let sequence_id = job.sequence_id();
    let outcome = match tokio::time::timeout(shared.config.send_timeout, shared.transport.send(&job)).await {
        Ok(outcome) => outcome,
        Err(_) => DispatchOutcome::Timeout,
    };

    if outcome.is_accepted() {
        shared.stats().accepted += 1;
        info!(%sequence_id, "device accepted job");
        return;
    }

    handle_failure(&shared, job, outcome).await;
}

/// Failure continuation: decide the job's fate, then free the device.
///
/// Only the job still recorded as in flight owns the claim. A send that fails
/// after its job was completed (and the device possibly claimed for the next
/// one) must not touch the device or the queue.
async fn handle_failure(shared: &Arc<Shared>, job: Job, outcome: DispatchOutcome) {
    let sequence_id = job.sequence_id();

    let owns_claim = {
        let mut stats = shared.stats();
        stats.failed += 1;
        if stats.in_flight == Some(sequence_id) {
            stats.in_flight = None;
            true
        } else {
            false
        }
    };

    if !owns_claim {
        warn!(%sequence_id, outcome = %outcome, "send failed after the job was completed; leaving device state alone");
        return;
    }

    match shared.config.failure_policy {
        FailurePolicy::Drop => {
            warn!(%sequence_id, outcome = %outcome, name = %job.name(), "device did not accept job; dropping it");
            shared.stats().dropped += 1;
            release_quietly(shared, outcome.label()).await;
            shared.wake.notify_one();
        }
        FailurePolicy::Requeue => {
            match shared.queue.requeue_front(job).await {
                Ok(()) => {
                    warn!(%sequence_id, outcome = %outcome, "device did not accept job; re-queued at head");
                    shared.stats().requeued += 1;
                }
                Err(e) => {
                    error!(%sequence_id, outcome = %outcome, error = %e, "device did not accept job and re-queue failed; job lost");
                    shared.stats().dropped += 1;
                }
            }
            // No wake-up: the retry waits for the next poll tick.
            release_quietly(shared, outcome.label()).await;
        }
    }
}

async fn release_quietly(shared: &Arc<Shared>, reason: &str) {
    match shared.device.release().await {
        Ok(()) => debug!(reason, "device released"),
        // The fallback poll cannot fix this on its own; a completion callback
        // or a restart (which resets the state) will.
        Err(e) => error!(reason, error = %e, "failed to release device"),
    }
}
