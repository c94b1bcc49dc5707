//! Adaptive health monitoring.
//!
//! The monitor is the only writer of an instance's `status`, `last_check_ms`,
//! failure counter and session token. Probes for due instances run
//! concurrently, but their outcomes are applied from the monitor task.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::HealthConfig;
use crate::core::instance::{WorkerInstance, WorkerRegistry, WorkerStatus};
use crate::protocol::ClientFactory;
use crate::util::clock::now_ms_u64;

/// Status plus consecutive-failure count; the input and output of [`HealthPolicy::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthState {
    /// Health status.
    pub status: WorkerStatus,
    /// Consecutive failed checks.
    pub failures: u32,
}

impl HealthState {
    /// State of a never-probed instance.
    pub const UNKNOWN: Self = Self {
        status: WorkerStatus::Unknown,
        failures: 0,
    };

    fn of(instance: &WorkerInstance) -> Self {
        Self {
            status: instance.status(),
            failures: instance.health_check_failures(),
        }
    }
}

/// Probe schedule and failure thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Base loop period.
    pub tick: Duration,
    /// Probe interval while `Unknown`.
    pub unknown_interval: Duration,
    /// Probe interval while `Unhealthy`.
    pub unhealthy_interval: Duration,
    /// Probe interval while `Healthy`.
    pub healthy_interval: Duration,
    /// Failures that condemn a healthy instance.
    pub healthy_threshold: u32,
    /// Failures that keep an unhealthy instance flagged.
    pub unhealthy_threshold: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for HealthPolicy {
    fn from(cfg: &HealthConfig) -> Self {
        Self {
            tick: Duration::from_millis(cfg.tick_interval_ms),
            unknown_interval: Duration::from_millis(cfg.unknown_interval_ms),
            unhealthy_interval: Duration::from_millis(cfg.unhealthy_interval_ms),
            healthy_interval: Duration::from_millis(cfg.healthy_interval_ms),
            healthy_threshold: cfg.healthy_failure_threshold,
            unhealthy_threshold: cfg.unhealthy_failure_threshold,
        }
    }
}

impl HealthPolicy {
    /// Probe interval for an instance in `status`.
    #[must_use]
    pub const fn interval_for(&self, status: WorkerStatus) -> Duration {
        match status {
            WorkerStatus::Unknown => self.unknown_interval,
            WorkerStatus::Unhealthy => self.unhealthy_interval,
            WorkerStatus::Healthy => self.healthy_interval,
        }
    }

    /// Consecutive failures that mark an instance in `status` unhealthy.
    #[must_use]
    pub const fn failure_threshold(&self, status: WorkerStatus) -> u32 {
        match status {
            WorkerStatus::Healthy => self.healthy_threshold,
            WorkerStatus::Unknown | WorkerStatus::Unhealthy => self.unhealthy_threshold,
        }
    }

    /// Whether an instance last checked at `last_check_ms` is due at `now_ms`.
    #[must_use]
    pub fn is_due(&self, status: WorkerStatus, last_check_ms: u64, now_ms: u64) -> bool {
        if last_check_ms == 0 {
            return true;
        }
        let elapsed = now_ms.saturating_sub(last_check_ms);
        u128::from(elapsed) >= self.interval_for(status).as_millis()
    }

    /// Apply one check outcome.
    ///
    /// An `Unknown` instance moves straight to `Healthy` or `Unhealthy`. A
    /// single success promotes a non-healthy instance and clears its
    /// failures; a success on a healthy instance leaves the count alone, so
    /// failures accumulate across a healthy stretch and demote once they
    /// reach the threshold for the current status.
    #[must_use]
    pub const fn transition(&self, state: HealthState, succeeded: bool) -> HealthState {
        if succeeded {
            return match state.status {
                WorkerStatus::Healthy => state,
                WorkerStatus::Unknown | WorkerStatus::Unhealthy => HealthState {
                    status: WorkerStatus::Healthy,
                    failures: 0,
                },
            };
        }

        let failures = state.failures.saturating_add(1);
        let status = match state.status {
            WorkerStatus::Unknown => WorkerStatus::Unhealthy,
            current => {
                if failures >= self.failure_threshold(current) {
                    WorkerStatus::Unhealthy
                } else {
                    current
                }
            }
        };
        HealthState { status, failures }
    }
}

struct CheckOutcome {
    instance: Arc<WorkerInstance>,
    succeeded: bool,
    session_id: Option<String>,
}

/// Periodically probes every registered instance.
pub struct HealthMonitor {
    registry: Arc<WorkerRegistry>,
    factory: Arc<dyn ClientFactory>,
    policy: HealthPolicy,
}

impl HealthMonitor {
    /// Create a monitor over `registry`.
    pub fn new(
        registry: Arc<WorkerRegistry>,
        factory: Arc<dyn ClientFactory>,
        policy: HealthPolicy,
    ) -> Self {
        Self {
            registry,
            factory,
            policy,
        }
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Run one pass at time `now_ms`: probe every due instance and apply the
    /// outcomes. Returns how many instances were checked.
    pub async fn check_due(&self, now_ms: u64) -> usize {
        let due: Vec<Arc<WorkerInstance>> = self
            .registry
            .all()
            .into_iter()
            .filter(|i| self.policy.is_due(i.status(), i.last_check_ms(), now_ms))
            .collect();
        if due.is_empty() {
            return 0;
        }

        let outcomes = join_all(due.into_iter().map(|i| self.check_one(i))).await;
        let checked = outcomes.len();
        for outcome in outcomes {
            self.apply(outcome);
        }
        checked
    }

    async fn check_one(&self, instance: Arc<WorkerInstance>) -> CheckOutcome {
        let mut client = self.factory.connect(instance.url());
        let (succeeded, session_id) = if instance.status() == WorkerStatus::Unknown {
            let ok = client.open().await;
            (ok, client.session_id().map(str::to_string))
        } else {
            (client.probe().await, None)
        };
        client.close();
        CheckOutcome {
            instance,
            succeeded,
            session_id,
        }
    }

    fn apply(&self, outcome: CheckOutcome) {
        let CheckOutcome {
            instance,
            succeeded,
            session_id,
        } = outcome;

        let before = HealthState::of(&instance);
        let after = self.policy.transition(before, succeeded);
        instance.set_health(after.status, after.failures);
        instance.set_last_check_ms(now_ms_u64());
        if before.status == WorkerStatus::Unknown && succeeded {
            instance.set_session_id(session_id);
        }

        if before.status == after.status {
            debug!(
                instance = %instance.id(),
                status = %after.status,
                failures = after.failures,
                "health check complete"
            );
        } else if after.status == WorkerStatus::Healthy {
            info!(instance = %instance.id(), from = %before.status, "instance healthy");
        } else {
            warn!(
                instance = %instance.id(),
                from = %before.status,
                failures = after.failures,
                "instance unhealthy"
            );
        }
    }

    /// Run until `cancel` fires. A panic inside a pass is logged and the loop
    /// continues with the next tick.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.policy.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(instances = self.registry.len(), "health monitor started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let pass = AssertUnwindSafe(self.check_due(now_ms_u64())).catch_unwind();
            let result = tokio::select! {
                () = cancel.cancelled() => break,
                r = pass => r,
            };
            if result.is_err() {
                error!("health check pass panicked");
            }
        }

        info!("health monitor stopped");
    }
}
