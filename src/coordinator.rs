use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::BiostarClient;
use crate::types::{
    DeviceMeta, HeatingCircuit, Program, SensorSnapshot, TempType, TemperatureConstraints,
};
use crate::{Error, Result};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

type SnapshotCallback = Box<dyn Fn(&SensorSnapshot) + Send + Sync>;
type FailureCallback = Box<dyn Fn(&Error) + Send + Sync>;

pub struct UpdateCoordinatorBuilder {
    client: BiostarClient,
    update_interval: Duration,
    refresh_timeout: Duration,
    snapshot_callbacks: Vec<SnapshotCallback>,
    failure_callbacks: Vec<FailureCallback>,
}

impl UpdateCoordinatorBuilder {
    pub fn new(client: BiostarClient) -> Self {
        Self {
            client,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            snapshot_callbacks: Vec::new(),
            failure_callbacks: Vec::new(),
        }
    }

    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&SensorSnapshot) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn on_update_failed(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.failure_callbacks.push(Box::new(f));
        self
    }

    pub fn build(self) -> UpdateCoordinator {
        UpdateCoordinator {
            inner: Arc::new(Inner {
                client: self.client,
                refresh_timeout: self.refresh_timeout,
                refresh_lock: tokio::sync::Mutex::new(()),
                generation: AtomicU64::new(0),
                refresh_requested: Notify::new(),
                state: Mutex::new(Cached::default()),
                snapshot_callbacks: self.snapshot_callbacks,
                failure_callbacks: self.failure_callbacks,
            }),
            update_interval: self.update_interval,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }
}

#[derive(Default)]
struct Cached {
    snapshot: Option<Arc<SensorSnapshot>>,
    device_meta: Option<DeviceMeta>,
    heating_circuits: Vec<HeatingCircuit>,
    heat_constraints: TemperatureConstraints,
    last_error: Option<String>,
}

struct Inner {
    client: BiostarClient,
    refresh_timeout: Duration,
    refresh_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    refresh_requested: Notify,
    state: Mutex<Cached>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    failure_callbacks: Vec<FailureCallback>,
}

/// Owns the polling cadence and the caches collaborators read.
///
/// Refreshes are single-flight: every trigger (timer tick, explicit
/// `refresh()`, write follow-up) funnels through one guard, and a caller
/// that waited behind a successful in-flight refresh re-uses its result
/// instead of fetching again. A failed refresh never clears cached
/// values.
pub struct UpdateCoordinator {
    inner: Arc<Inner>,
    update_interval: Duration,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl UpdateCoordinator {
    pub fn builder(client: BiostarClient) -> UpdateCoordinatorBuilder {
        UpdateCoordinatorBuilder::new(client)
    }

    /// Start the periodic refresh loop. The first refresh runs
    /// immediately. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = self.inner.clone();
        let cancel = self.cancel.clone();
        let interval = self.update_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                    _ = inner.refresh_requested.notified() => {}
                }
                if let Err(err) = inner.run_refresh().await {
                    warn!(error = %err, "scheduled update failed");
                }
            }
            debug!("update loop stopped");
        });
    }

    /// Stop the refresh loop. Cached data stays readable.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Run one refresh now, coalescing with any in-flight refresh.
    pub async fn refresh(&self) -> Result<Arc<SensorSnapshot>> {
        self.inner.run_refresh().await
    }

    /// Ask the refresh loop for an extra cycle without waiting for it.
    /// Requests collapse: many nudges produce at most one queued refresh.
    pub fn request_refresh(&self) {
        self.inner.refresh_requested.notify_one();
    }

    pub fn snapshot(&self) -> Option<Arc<SensorSnapshot>> {
        self.inner.state().snapshot.clone()
    }

    pub fn device_meta(&self) -> Option<DeviceMeta> {
        self.inner.state().device_meta.clone()
    }

    pub fn heating_circuits(&self) -> Vec<HeatingCircuit> {
        self.inner.state().heating_circuits.clone()
    }

    pub fn heat_constraints(&self) -> TemperatureConstraints {
        self.inner.state().heat_constraints
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.state().last_error.clone()
    }

    pub fn last_update_success(&self) -> bool {
        let state = self.inner.state();
        state.snapshot.is_some() && state.last_error.is_none()
    }

    pub fn has_write_access(&self) -> bool {
        self.inner.client.has_write_access()
    }

    pub fn client(&self) -> &BiostarClient {
        &self.inner.client
    }

    /// Select the heating program, then schedule a refresh so the new
    /// state becomes visible without waiting for the next tick.
    pub async fn set_program(&self, program: Program) -> Result<()> {
        self.inner.client.set_program(program).await?;
        self.request_refresh();
        Ok(())
    }

    /// Set a circuit's day or night set-point, then schedule a refresh.
    pub async fn set_temperature(
        &self,
        circuit_nr: u32,
        temp_type: TempType,
        value: f64,
    ) -> Result<()> {
        self.inner.client.set_temperature(circuit_nr, temp_type, value).await?;
        self.request_refresh();
        Ok(())
    }
}

impl Drop for UpdateCoordinator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Inner {
    fn state(&self) -> std::sync::MutexGuard<'_, Cached> {
        self.state.lock().expect("coordinator state lock poisoned")
    }

    async fn run_refresh(&self) -> Result<Arc<SensorSnapshot>> {
        let seen = self.generation.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        // A refresh completed while we waited for the guard: re-use it
        // rather than starting another fetch sequence.
        if self.generation.load(Ordering::Acquire) != seen
            && let Some(snapshot) = self.state().snapshot.clone()
        {
            return Ok(snapshot);
        }

        let outcome = tokio::time::timeout(self.refresh_timeout, self.client.refresh_data()).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        };

        match result {
            Ok(data) => {
                let snapshot = Arc::new(data.snapshot);
                {
                    let mut state = self.state();
                    state.snapshot = Some(snapshot.clone());
                    if let Some(meta) = data.device_meta {
                        state.device_meta = Some(meta);
                    }
                    if let Some(circuits) = data.heating_circuits {
                        state.heating_circuits = circuits;
                    }
                    if let Some(constraints) = data.heat_constraints {
                        state.heat_constraints = constraints;
                    }
                    state.last_error = None;
                }
                self.generation.fetch_add(1, Ordering::Release);
                for cb in &self.snapshot_callbacks {
                    cb(&snapshot);
                }
                Ok(snapshot)
            }
            Err(err) => {
                self.state().last_error = Some(err.to_string());
                for cb in &self.failure_callbacks {
                    cb(&err);
                }
                Err(err)
            }
        }
    }
}
