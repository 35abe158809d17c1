//! State Poller - Wait for a remote object to reach a target status
//!
//! Each tick refreshes the object once and classifies what it sees:
//!
//! 1. not found, and "not found" is a target -> succeeded
//! 2. status in `target_states` -> succeeded
//! 3. status in `failure_states` -> failed (checked before pending)
//! 4. anything else -> pending; sleep `poll_interval` and tick again
//!
//! The loop is bound to `min(start + timeout, caller deadline)`. Sleeps are
//! clamped to that deadline and the last tick happens at the deadline, so a
//! run performs at most `ceil(timeout / interval) + 1` ticks.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::time::Instant;

use crate::error::{LifecycleError, LifecycleResult};

/// Default interval between ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default overall timeout
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Longest offset a deadline is placed in the future; longer timeouts clamp to it
pub const MAX_DEADLINE_OFFSET: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `start + timeout`, clamped so that huge timeouts cannot overflow
pub fn deadline_from(start: Instant, timeout: Duration) -> Instant {
    start + timeout.min(MAX_DEADLINE_OFFSET)
}

/// What one refresh observed
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// The object exists; `status` is `None` when the response carries none
    Found {
        status: Option<String>,
        document: serde_json::Value,
    },
    /// The object does not exist (e.g. HTTP 404 with a not-found code)
    NotFound,
}

impl Observation {
    pub fn status(status: impl Into<String>) -> Self {
        Observation::Found {
            status: Some(status.into()),
            document: serde_json::Value::Null,
        }
    }
}

/// Source of observations for the poller
#[async_trait]
pub trait StateRefresh: Send {
    async fn refresh(&mut self) -> LifecycleResult<Observation>;
}

#[async_trait]
impl<F, Fut> StateRefresh for F
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = LifecycleResult<Observation>> + Send,
{
    async fn refresh(&mut self) -> LifecycleResult<Observation> {
        (self)().await
    }
}

/// Poll Specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSpec {
    pub pending_states: BTreeSet<String>,
    pub target_states: BTreeSet<String>,
    pub failure_states: BTreeSet<String>,
    pub poll_interval: Duration,
    pub initial_delay: Duration,
    pub timeout: Duration,
    /// "Not found" counts as reaching the target (delete flows)
    pub not_found_is_target: bool,
    /// Consecutive "not found" ticks tolerated before failing
    pub not_found_checks: u32,
}

fn state_set(states: &[&str]) -> BTreeSet<String> {
    states.iter().map(|s| s.to_string()).collect()
}

impl PollSpec {
    pub fn new(pending: &[&str], target: &[&str]) -> Self {
        Self {
            pending_states: state_set(pending),
            target_states: state_set(target),
            failure_states: BTreeSet::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            initial_delay: Duration::ZERO,
            timeout: DEFAULT_POLL_TIMEOUT,
            not_found_is_target: false,
            not_found_checks: 0,
        }
    }

    /// Spec for delete flows: done once the object is gone
    pub fn until_deleted(pending: &[&str]) -> Self {
        Self {
            not_found_is_target: true,
            ..Self::new(pending, &[])
        }
    }

    pub fn with_targets(mut self, target: &[&str]) -> Self {
        self.target_states.extend(target.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_failures(mut self, failure: &[&str]) -> Self {
        self.failure_states = state_set(failure);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Check the invariants that can be checked statically
    pub fn validate(&self) -> LifecycleResult<()> {
        if let Some(state) = self.target_states.intersection(&self.pending_states).next() {
            return Err(LifecycleError::InvalidPollSpec(format!(
                "state '{}' is both pending and target",
                state
            )));
        }
        if self.target_states.is_empty() && !self.not_found_is_target {
            return Err(LifecycleError::InvalidPollSpec(
                "no target state and not-found is not a target".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(LifecycleError::InvalidPollSpec(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Terminal result of one poller run
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Target reached; the final document, or `None` when the object is gone
    Succeeded(Option<serde_json::Value>),
    Failed(String),
    TimedOut,
}

/// Outcome plus what the run observed
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    pub ticks: u32,
    pub elapsed: Duration,
    pub last_status: Option<String>,
}

impl PollReport {
    /// Convert a non-success outcome into the matching error
    pub fn into_result(self, resource: &str) -> LifecycleResult<Option<serde_json::Value>> {
        match self.outcome {
            PollOutcome::Succeeded(document) => Ok(document),
            PollOutcome::Failed(status) => Err(LifecycleError::PollFailure {
                resource: resource.to_string(),
                status,
                elapsed: self.elapsed,
            }),
            PollOutcome::TimedOut => Err(LifecycleError::PollTimeout {
                resource: resource.to_string(),
                last_status: self.last_status,
                elapsed: self.elapsed,
            }),
        }
    }
}

enum Tick {
    Done(PollOutcome),
    Pending,
}

/// Drives one [`PollSpec`] against one [`StateRefresh`]
pub struct StatePoller<'a> {
    spec: &'a PollSpec,
    label: &'a str,
}

impl<'a> StatePoller<'a> {
    pub fn new(spec: &'a PollSpec, label: &'a str) -> Self {
        Self { spec, label }
    }

    /// Run until a terminal outcome
    ///
    /// Refresh errors abort the run unchanged; no retry happens here.
    pub async fn run<R>(&self, refresh: &mut R, deadline: Option<Instant>) -> LifecycleResult<PollReport>
    where
        R: StateRefresh + ?Sized,
    {
        self.spec.validate()?;

        let start = Instant::now();
        let own_deadline = deadline_from(start, self.spec.timeout);
        let deadline = deadline.map_or(own_deadline, |d| d.min(own_deadline));

        let mut ticks = 0u32;
        let mut last_status = None;
        let mut not_found_seen = 0u32;

        if !self.spec.initial_delay.is_zero() {
            debug!("{}: waiting {:?} before first poll", self.label, self.spec.initial_delay);
            sleep_until_or(deadline, self.spec.initial_delay).await;
        }

        loop {
            ticks += 1;
            let observation = refresh.refresh().await?;

            let tick = match observation {
                Observation::NotFound => {
                    last_status = None;
                    if self.spec.not_found_is_target {
                        Tick::Done(PollOutcome::Succeeded(None))
                    } else if not_found_seen < self.spec.not_found_checks {
                        not_found_seen += 1;
                        Tick::Pending
                    } else {
                        Tick::Done(PollOutcome::Failed("not found".to_string()))
                    }
                }
                Observation::Found { status, document } => {
                    not_found_seen = 0;
                    let tick = self.classify(status.as_deref(), document);
                    last_status = status;
                    tick
                }
            };

            debug!(
                "{}: tick {} status {} after {:?}",
                self.label,
                ticks,
                last_status.as_deref().unwrap_or("<none>"),
                start.elapsed()
            );

            if let Tick::Done(outcome) = tick {
                return Ok(PollReport {
                    outcome,
                    ticks,
                    elapsed: start.elapsed(),
                    last_status,
                });
            }

            if Instant::now() >= deadline {
                return Ok(PollReport {
                    outcome: PollOutcome::TimedOut,
                    ticks,
                    elapsed: start.elapsed(),
                    last_status,
                });
            }

            sleep_until_or(deadline, self.spec.poll_interval).await;
        }
    }

    fn classify(&self, status: Option<&str>, document: serde_json::Value) -> Tick {
        let Some(status) = status else {
            return Tick::Pending;
        };
        if self.spec.target_states.contains(status) {
            Tick::Done(PollOutcome::Succeeded(Some(document)))
        } else if self.spec.failure_states.contains(status) {
            Tick::Done(PollOutcome::Failed(status.to_string()))
        } else {
            // pending or not classified
            Tick::Pending
        }
    }
}

/// Sleep for `duration`, but never past `deadline`
async fn sleep_until_or(deadline: Instant, duration: Duration) {
    let wake = deadline_from(Instant::now(), duration).min(deadline);
    tokio::time::sleep_until(wake).await;
}
