//! Device monitor loop
//!
//! [`DeviceMonitor`] owns the set of devices known to be attached and keeps
//! it current by re-enumerating on a fixed cadence. Each tick:
//!
//! 1. snapshot the devices on the blocking pool, bounded by the configured
//!    timeout and abandoned as soon as the monitor is stopped. An abandoned
//!    call still holds the enumeration slot until it returns, so a hung
//!    backend never has more than one loop enumeration running against it
//! 2. diff the snapshot against the stored set
//! 3. replace the stored set and publish one event per added/removed device
//!
//! Ticks run strictly one after another on a single task, so the stored set
//! has exactly one writer. Readers only ever get copies.
//!
//! # Example
//!
//! ```ignore
//! let monitor = DeviceMonitor::new(CpalEnumerator::default_host(), MonitorConfig::default())?;
//! monitor.on(Topic::Add, |device| println!("added {device}"));
//! monitor.on(Topic::Remove, |device| println!("removed {device}"));
//! monitor.start();
//!
//! let devices = monitor.find().await?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use audio_detect_core::{
    diff, AudioDevice, Delta, DetectError, DeviceEnumerator, DeviceFilter, DeviceSet, Result,
    Snapshotter,
};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::{DeviceEvents, NotificationBus, Subscription, Topic};
use crate::churn::ChurnDetector;
use crate::config::MonitorConfig;
use crate::state::{MonitorState, MonitorStats, StatsCounters};

/// Live inventory of audio devices with add/remove notifications
///
/// Cloning is cheap; all clones drive the same loop. The loop is cancelled
/// once the last clone is dropped.
#[derive(Clone)]
pub struct DeviceMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    snapshotter: Snapshotter,
    config: MonitorConfig,
    bus: NotificationBus,
    runtime: Handle,
    /// Written only by the loop task; cleared by `stop`
    known: Mutex<DeviceSet>,
    running: Mutex<Option<RunningLoop>>,
    rescan: Arc<Notify>,
    /// Set while a loop enumeration is running on the blocking pool,
    /// including one whose tick already timed out or was cancelled
    enumerating: Arc<AtomicBool>,
    stats: StatsCounters,
}

/// Releases the enumeration slot when the blocking call returns
struct EnumerationSlot(Arc<AtomicBool>);

impl Drop for EnumerationSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct RunningLoop {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Per-start loop state
#[derive(Default)]
struct Session {
    seeded: bool,
    churn: ChurnDetector,
}

impl DeviceMonitor {
    /// Create a monitor driven by the tokio runtime of the calling context
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::NoRuntime`] outside of a tokio runtime, or
    /// [`DetectError::InvalidConfig`] if `config` does not validate.
    pub fn new<E: DeviceEnumerator>(enumerator: E, config: MonitorConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| DetectError::NoRuntime)?;
        Self::with_handle(enumerator, config, runtime)
    }

    /// Create a monitor whose loop runs on `runtime`
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::InvalidConfig`] if `config` does not validate.
    pub fn with_handle<E: DeviceEnumerator>(
        enumerator: E,
        config: MonitorConfig,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(MonitorInner {
                snapshotter: Snapshotter::new(enumerator),
                bus: NotificationBus::new(),
                config,
                runtime,
                known: Mutex::new(DeviceSet::new()),
                running: Mutex::new(None),
                rescan: Arc::new(Notify::new()),
                enumerating: Arc::new(AtomicBool::new(false)),
                stats: StatsCounters::default(),
            }),
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the monitor loop. No-op if it is already running.
    pub fn start(&self) {
        let mut running = lock(&self.inner.running);
        if running.is_some() {
            tracing::debug!("Device monitoring already running");
            return;
        }

        let token = CancellationToken::new();
        let task = self.inner.runtime.spawn(run_loop(
            Arc::downgrade(&self.inner),
            token.clone(),
            self.inner.rescan.clone(),
            self.inner.config.poll_interval,
        ));
        *running = Some(RunningLoop { token, task });

        tracing::info!(
            backend = self.inner.snapshotter.backend(),
            interval_ms = self.inner.config.poll_interval.as_millis() as u64,
            "Device monitoring started"
        );
    }

    /// Stop the monitor loop and clear the stored device set. No-op if it is
    /// already stopped.
    ///
    /// Does not wait for the loop task: an in-flight enumeration is
    /// abandoned and its result discarded.
    pub fn stop(&self) {
        // The loop task finishes on its own once it observes cancellation
        let _ = self.take_running();
    }

    /// Like [`stop`](Self::stop), but waits for the loop task to exit
    pub async fn shutdown(&self) {
        if let Some(task) = self.take_running() {
            if let Err(e) = task.await {
                tracing::debug!("Monitor task ended abnormally: {}", e);
            }
        }
    }

    fn take_running(&self) -> Option<JoinHandle<()>> {
        let running = lock(&self.inner.running).take()?;
        running.token.cancel();
        // The loop re-checks cancellation under this lock before writing
        lock(&self.inner.known).clear();
        tracing::info!("Device monitoring stopped");
        Some(running.task)
    }

    pub fn state(&self) -> MonitorState {
        if lock(&self.inner.running).is_some() {
            MonitorState::Running
        } else {
            MonitorState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Ask the loop to enumerate now instead of waiting for the next tick.
    ///
    /// Intended for OS hot-plug signals. Never overlaps a tick in progress;
    /// a request made during a tick triggers one more tick right after it.
    pub fn rescan(&self) {
        self.inner.rescan.notify_one();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Enumerate the attached devices right now.
    ///
    /// Independent of the monitor loop: works whether or not monitoring is
    /// running and never touches the stored set.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Enumeration`] if the platform call fails and
    /// [`DetectError::Timeout`] if it exceeds the configured timeout.
    pub async fn find(&self) -> Result<Vec<AudioDevice>> {
        let snapshotter = self.inner.snapshotter.clone();
        snapshot_with_timeout(
            &self.inner.runtime,
            self.inner.config.enumeration_timeout,
            move || snapshotter.snapshot(),
        )
        .await
    }

    /// [`find`](Self::find), keeping only devices that match `filter`
    ///
    /// # Errors
    ///
    /// Same as [`find`](Self::find).
    pub async fn find_matching(&self, filter: &DeviceFilter) -> Result<Vec<AudioDevice>> {
        self.find().await.map(|devices| filter.apply(devices))
    }

    /// Copy of the devices the loop currently knows about, sorted by id.
    /// Empty while stopped.
    pub fn known_devices(&self) -> Vec<AudioDevice> {
        lock(&self.inner.known).to_vec()
    }

    pub fn stats(&self) -> MonitorStats {
        self.inner.stats.snapshot()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub fn bus(&self) -> &NotificationBus {
        &self.inner.bus
    }

    /// Call `handler` for every device published on `topic`
    pub fn on<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(AudioDevice) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(topic, handler)
    }

    /// Call `handler` for every failed tick and identity anomaly
    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(DetectError) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe_errors(handler)
    }

    pub fn events(&self, topic: Topic) -> DeviceEvents {
        self.inner.bus.events(topic)
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inner.bus.unsubscribe(subscription)
    }
}

impl std::fmt::Debug for DeviceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceMonitor")
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .field("snapshotter", &self.inner.snapshotter)
            .finish()
    }
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = running.take() {
            running.token.cancel();
        }
    }
}

// ============================================================================
// Loop
// ============================================================================

async fn run_loop(
    inner: Weak<MonitorInner>,
    token: CancellationToken,
    rescan: Arc<Notify>,
    interval: Duration,
) {
    let mut session = Session::default();

    loop {
        let Some(monitor) = inner.upgrade() else {
            break;
        };
        let keep_going = monitor.tick(&token, &mut session).await;
        drop(monitor);

        if !keep_going {
            break;
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
            _ = rescan.notified() => {
                tracing::debug!("Rescan requested");
            }
        }
    }

    tracing::debug!("Device monitor loop exited");
}

impl MonitorInner {
    /// Run one enumerate-diff-publish cycle. Returns `false` once the loop
    /// has been cancelled.
    async fn tick(&self, token: &CancellationToken, session: &mut Session) -> bool {
        self.stats.record_tick();

        let result = tokio::select! {
            _ = token.cancelled() => return false,
            result = self.snapshot_for_tick() => result,
        };

        let devices = match result {
            Ok(devices) => devices,
            Err(e) => {
                if token.is_cancelled() {
                    return false;
                }
                self.stats.record_failure();
                tracing::warn!(error = %e, "Device enumeration failed, skipping tick");
                self.bus.publish_error(&e);
                return true;
            }
        };

        let Some(delta) = self.apply(token, session, &devices) else {
            return !token.is_cancelled();
        };

        self.stats.record_delta(delta.added.len(), delta.removed.len());
        for device in &delta.added {
            tracing::info!(
                id = %device.id,
                name = %device.name,
                kind = %device.device_type,
                "Device added"
            );
        }
        for device in &delta.removed {
            tracing::info!(
                id = %device.id,
                name = %device.name,
                kind = %device.device_type,
                "Device removed"
            );
        }

        if self.config.churn_detection {
            let anomalies = session.churn.inspect(&delta);
            self.stats.record_anomalies(anomalies.len());
            for anomaly in &anomalies {
                tracing::warn!("{}", anomaly);
                self.bus.publish_error(anomaly);
            }
        }

        true
    }

    /// Snapshot for one tick, unless an earlier loop enumeration is still
    /// running. That counts as a timeout for this tick too.
    async fn snapshot_for_tick(&self) -> Result<Vec<AudioDevice>> {
        let limit = self.config.enumeration_timeout;
        if self
            .enumerating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Previous enumeration still running, not starting another");
            return Err(DetectError::Timeout(limit));
        }

        let slot = EnumerationSlot(self.enumerating.clone());
        let snapshotter = self.snapshotter.clone();
        snapshot_with_timeout(&self.runtime, limit, move || {
            let _slot = slot;
            snapshotter.snapshot()
        })
        .await
    }

    /// Swap in the new device set and publish its delta, all under the set
    /// lock so `stop` can never observe a half-applied tick.
    ///
    /// Returns `None` when cancelled or when the tick only seeded the set.
    fn apply(
        &self,
        token: &CancellationToken,
        session: &mut Session,
        devices: &[AudioDevice],
    ) -> Option<Delta> {
        let mut known = lock(&self.known);
        if token.is_cancelled() {
            return None;
        }

        let delta = diff(&known, devices);
        *known = DeviceSet::from_devices(devices);

        if !session.seeded {
            session.seeded = true;
            if !self.config.announce_initial_devices {
                tracing::info!(count = known.len(), "Initial device set recorded");
                return None;
            }
        }

        for device in &delta.added {
            self.bus.publish(Topic::Add, device);
        }
        for device in &delta.removed {
            self.bus.publish(Topic::Remove, device);
        }

        tracing::debug!(
            known = known.len(),
            added = delta.added.len(),
            removed = delta.removed.len(),
            "Tick complete"
        );
        Some(delta)
    }
}

/// Run `snapshot` on the blocking pool, giving up after `limit`.
///
/// On timeout (or when the returned future is dropped) the blocking call is
/// left to finish on its own and its result is discarded.
async fn snapshot_with_timeout<F>(
    runtime: &Handle,
    limit: Duration,
    snapshot: F,
) -> Result<Vec<AudioDevice>>
where
    F: FnOnce() -> Result<Vec<AudioDevice>> + Send + 'static,
{
    let task = runtime.spawn_blocking(snapshot);
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(DetectError::Enumeration(format!(
            "enumeration task failed: {e}"
        ))),
        Err(_) => Err(DetectError::Timeout(limit)),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
