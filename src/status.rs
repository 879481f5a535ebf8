//! Hysteresis state machine translating probe observations into a stable
//! per-record status.
//!
//! A record starts in [`Status::Initial`] and settles into
//! [`Status::Healthy`] or [`Status::Unhealthy`] once enough consecutive
//! observations agree. Once settled, a streak counter guards every
//! transition so that a single flapping probe cannot move a record between
//! states.

use serde::Deserialize;

/// Metric label for the initial state.
pub const INITIAL_STATE_NAME: &str = "initial";
/// Metric label for the healthy state.
pub const HEALTHY_STATE_NAME: &str = "healthy";
/// Metric label for the unhealthy state.
pub const UNHEALTHY_STATE_NAME: &str = "unhealthy";

/// Outcome of a single probe run, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The probe reached the address and it passed the check.
    Healthy,
    /// The probe reached a verdict: the address is not serving.
    Unhealthy,
    /// The probe could not produce a verdict (transport error, cancellation).
    Error,
}

/// Streak thresholds governing state transitions.
///
/// Field names mirror the `status` block of a record's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StatusPolicy {
    /// Consecutive healthy observations required to leave `unhealthy`.
    #[serde(default = "default_healthy_streak")]
    pub healthy: u32,
    /// Consecutive unhealthy observations required to leave `healthy`.
    #[serde(default = "default_unhealthy_streak")]
    pub unhealthy: u32,
    /// Consecutive healthy observations required to settle from `initial`.
    #[serde(default = "default_initial_healthy_streak")]
    pub initial_healthy: u32,
    /// Consecutive unhealthy observations required to settle from `initial`.
    #[serde(default = "default_initial_unhealthy_streak")]
    pub initial_unhealthy: u32,
}

fn default_healthy_streak() -> u32 {
    5
}

fn default_unhealthy_streak() -> u32 {
    5
}

fn default_initial_healthy_streak() -> u32 {
    2
}

fn default_initial_unhealthy_streak() -> u32 {
    1
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            healthy: default_healthy_streak(),
            unhealthy: default_unhealthy_streak(),
            initial_healthy: default_initial_healthy_streak(),
            initial_unhealthy: default_initial_unhealthy_streak(),
        }
    }
}

/// Current status of a managed record.
///
/// The streak counter always counts down towards the *opposite* state:
/// `Healthy` holds the remaining unhealthy observations before the record is
/// declared unhealthy, `Unhealthy` the remaining healthy observations before
/// recovery. `Initial` counts towards whichever direction its observations
/// are pointing, re-seeding whenever they flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No verdict yet; the record has not settled since startup.
    Initial {
        /// Remaining agreeing observations before settling.
        streak: u32,
        /// The direction the current streak is pointing (healthy or
        /// unhealthy, never error).
        last_seen: Observation,
    },
    /// The record is serving and eligible for selection.
    Healthy {
        /// Remaining unhealthy observations before demotion.
        streak: u32,
    },
    /// The record is down and excluded from selection.
    Unhealthy {
        /// Remaining healthy observations before recovery.
        streak: u32,
    },
}

impl Status {
    /// The status every record starts in.
    pub fn initial(policy: &StatusPolicy) -> Self {
        Status::Initial {
            streak: policy.initial_healthy,
            last_seen: Observation::Healthy,
        }
    }

    /// Stable name, used as the `status` metric label.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Initial { .. } => INITIAL_STATE_NAME,
            Status::Healthy { .. } => HEALTHY_STATE_NAME,
            Status::Unhealthy { .. } => UNHEALTHY_STATE_NAME,
        }
    }

    /// True iff the record may be selected as active.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Status::Healthy { .. })
    }

    /// True iff the record has not settled since startup.
    pub fn is_initial(&self) -> bool {
        matches!(self, Status::Initial { .. })
    }

    /// Advance the machine by one observation.
    #[must_use]
    pub fn step(self, observation: Observation, policy: &StatusPolicy) -> Status {
        match (self, observation) {
            (Status::Initial { mut streak, last_seen }, Observation::Healthy) => {
                if last_seen == Observation::Unhealthy {
                    streak = policy.initial_healthy;
                }
                streak = streak.saturating_sub(1);
                if streak == 0 {
                    Status::Healthy {
                        streak: policy.unhealthy,
                    }
                } else {
                    Status::Initial {
                        streak,
                        last_seen: Observation::Healthy,
                    }
                }
            }
            (Status::Initial { mut streak, last_seen }, Observation::Unhealthy) => {
                if last_seen == Observation::Healthy {
                    streak = policy.initial_unhealthy;
                }
                streak = streak.saturating_sub(1);
                if streak == 0 {
                    Status::Unhealthy {
                        streak: policy.healthy,
                    }
                } else {
                    Status::Initial {
                        streak,
                        last_seen: Observation::Unhealthy,
                    }
                }
            }
            // An errored probe carries no signal while the record is unsettled.
            (status @ Status::Initial { .. }, Observation::Error) => status,

            (Status::Healthy { .. }, Observation::Healthy) => Status::Healthy {
                streak: policy.unhealthy,
            },
            (Status::Healthy { mut streak }, _) => {
                streak = streak.saturating_sub(1);
                if streak == 0 {
                    Status::Unhealthy {
                        streak: policy.healthy,
                    }
                } else {
                    Status::Healthy { streak }
                }
            }

            (Status::Unhealthy { mut streak }, Observation::Healthy) => {
                streak = streak.saturating_sub(1);
                if streak == 0 {
                    Status::Healthy {
                        streak: policy.unhealthy,
                    }
                } else {
                    Status::Unhealthy { streak }
                }
            }
            (Status::Unhealthy { .. }, _) => Status::Unhealthy {
                streak: policy.healthy,
            },
        }
    }
}
