//! Spacing between consecutive unit launches.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::time::{self, Duration, Instant};

/// How the launch delay is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// Sleep for the delay after every launch. Time spent launching adds to
    /// the gap, so the effective rate drifts below 1/delay over long runs.
    #[default]
    Fixed,

    /// Launch on an absolute schedule `start + i * delay`. Overshoot on one
    /// tick is absorbed by the next, keeping the long-run rate at 1/delay.
    Scheduled,
}

impl Pacing {
    pub fn label(&self) -> &'static str {
        match self {
            Pacing::Fixed => "fixed",
            Pacing::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for Pacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Pacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(Pacing::Fixed),
            "scheduled" => Ok(Pacing::Scheduled),
            other => Err(format!(
                "Unknown pacing mode '{}'. Use 'fixed' or 'scheduled'.",
                other
            )),
        }
    }
}

/// Stateful launch pacer for one run.
#[derive(Debug)]
pub struct Pacer {
    pacing: Pacing,
    delay: Duration,
    next_fire: Instant,
}

impl Pacer {
    pub fn new(pacing: Pacing, delay: Duration) -> Self {
        Self {
            pacing,
            delay,
            next_fire: Instant::now(),
        }
    }

    /// Waits out the gap that follows a launch.
    pub async fn wait(&mut self) {
        if self.delay.is_zero() {
            // Still yield so a zero-delay run lets spawned tasks make progress.
            tokio::task::yield_now().await;
            return;
        }

        match self.pacing {
            Pacing::Fixed => time::sleep(self.delay).await,
            Pacing::Scheduled => {
                // If launching ran long and next_fire is already in the past,
                // sleep_until returns immediately and the schedule catches up.
                self.next_fire += self.delay;
                time::sleep_until(self.next_fire).await;
            }
        }
    }
}
