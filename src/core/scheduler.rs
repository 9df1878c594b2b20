//! Cadence-driven scheduler for pipeline cycles

use cron::Schedule;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Cadence;
use crate::core::http::HealthStatus;
use crate::core::runtime::CycleRuntime;
use crate::core::shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
use crate::error::ConfigError;
use crate::jobs::types::CycleReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// Waiting for the next tick.
    Idle,
    /// A cycle is in flight.
    Running,
    /// Shut down; no further cycles will start.
    Stopped,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Stopped => "stopped",
        }
    }
}

#[derive(Clone)]
enum Timing {
    /// First cycle runs at once, then sleep this long after each one.
    Interval(Duration),
    Cron(Box<Schedule>),
}

impl Timing {
    fn delay(&self, first: bool) -> Duration {
        match self {
            Timing::Interval(_) if first => Duration::ZERO,
            Timing::Interval(every) => *every,
            Timing::Cron(schedule) => match schedule.upcoming(chrono::Utc).next() {
                Some(next_tick) => (next_tick - chrono::Utc::now()).to_std().unwrap_or_default(),
                // No more scheduled times, wait a bit and check again
                None => Duration::from_secs(60),
            },
        }
    }
}

/// Drives [`CycleRuntime`] on a fixed cadence.
///
/// Cycles never overlap: the next delay only starts once the previous
/// cycle has returned.
pub struct CycleScheduler {
    runtime: Arc<CycleRuntime>,
    timing: Timing,
    state: Arc<RwLock<SchedulerState>>,
    last_report: Arc<RwLock<Option<CycleReport>>>,
    health: Option<Arc<RwLock<HealthStatus>>>,
    trigger: ShutdownTrigger,
    shutdown: Shutdown,
    handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl CycleScheduler {
    pub fn new(runtime: Arc<CycleRuntime>, cadence: &Cadence) -> Result<Self, ConfigError> {
        let timing = match cadence {
            Cadence::Interval(every) if every.is_zero() => {
                return Err(ConfigError::Invalid {
                    key: "CYCLE_INTERVAL_SECONDS",
                    reason: "must be greater than 0".to_string(),
                })
            }
            Cadence::Interval(every) => Timing::Interval(*every),
            Cadence::Cron(expr) => {
                let schedule = Schedule::from_str(expr).map_err(|e| ConfigError::Invalid {
                    key: "CYCLE_CRON",
                    reason: format!("invalid cron expression '{}': {}", expr, e),
                })?;
                Timing::Cron(Box::new(schedule))
            }
        };

        info!(
            cadence = ?cadence,
            symbols = runtime.symbols().len(),
            "CycleScheduler: created"
        );

        let (trigger, shutdown) = shutdown_channel();
        Ok(Self {
            runtime,
            timing,
            state: Arc::new(RwLock::new(SchedulerState::Idle)),
            last_report: Arc::new(RwLock::new(None)),
            health: None,
            trigger,
            shutdown,
            handle: Arc::new(RwLock::new(None)),
        })
    }

    /// Mirror state and cycle results into the health endpoint.
    pub fn with_health(mut self, health: Arc<RwLock<HealthStatus>>) -> Self {
        self.health = Some(health);
        self
    }

    /// Shutdown signal observed by this scheduler's cycles.
    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Start the cycle loop in the background. Starting twice is a no-op.
    pub async fn start(&self) {
        let mut handle_slot = self.handle.write().await;
        if handle_slot.is_some() {
            warn!("CycleScheduler: already started");
            return;
        }
        if self.trigger.is_triggered() {
            warn!("CycleScheduler: already stopped, not starting");
            return;
        }

        let runtime = self.runtime.clone();
        let timing = self.timing.clone();
        let shutdown = self.shutdown.clone();
        let state = self.state.clone();
        let last_report = self.last_report.clone();
        let health = self.health.clone();

        let handle = tokio::spawn(async move {
            info!("CycleScheduler: started");
            let mut first = true;

            loop {
                let delay = timing.delay(first);
                first = false;
                if !delay.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.wait() => break,
                    }
                }
                if shutdown.is_triggered() {
                    break;
                }

                set_state(&state, health.as_ref(), SchedulerState::Running).await;
                let report = runtime.run_cycle(&shutdown).await;

                if let Some(health) = health.as_ref() {
                    let mut h = health.write().await;
                    h.last_cycle_at = Some(report.finished_at);
                    h.last_cycle_failures = report.failed();
                    h.status = if report.failed() == 0 { "healthy" } else { "degraded" }.to_string();
                }
                *last_report.write().await = Some(report);
                set_state(&state, health.as_ref(), SchedulerState::Idle).await;
            }

            set_state(&state, health.as_ref(), SchedulerState::Stopped).await;
            info!("CycleScheduler: loop exited");
        });

        *handle_slot = Some(handle);
        info!("CycleScheduler: started successfully");
    }

    /// Signal shutdown and wait for an in-flight cycle to drain.
    ///
    /// The running cycle finishes its current stage per symbol; stages and
    /// symbols not yet started are reported as cancelled.
    pub async fn stop(&self) {
        self.trigger.trigger();
        let handle = self.handle.write().await.take();
        if let Some(h) = handle {
            if let Err(e) = h.await {
                error!(error = %e, "CycleScheduler: loop task failed");
            }
        }
        set_state(&self.state, self.health.as_ref(), SchedulerState::Stopped).await;
        info!("CycleScheduler: stopped");
    }

    /// Check if the scheduler loop is running
    pub async fn is_running(&self) -> bool {
        let handle = self.handle.read().await;
        handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }
}

async fn set_state(
    state: &RwLock<SchedulerState>,
    health: Option<&Arc<RwLock<HealthStatus>>>,
    next: SchedulerState,
) {
    *state.write().await = next;
    if let Some(health) = health {
        health.write().await.scheduler_state = next;
    }
}
