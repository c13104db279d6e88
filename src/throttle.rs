//! Alert throttling.
//!
//! `AlertThrottle` is a two-state machine (Armed / Suppressed) evaluated once
//! per processed frame pair. It decides whether the current movement verdict
//! should raise a notification, and keeps quiet until the cooldown elapses.
//!
//! The throttle never reads a clock itself: the loop passes `now`, which keeps
//! the state machine deterministic under test.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::config::AlertSettings;

/// How elapsed time since the last alert is compared against the cooldown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownMode {
    /// Re-arm once `elapsed >= cooldown`.
    #[default]
    Elapsed,
    /// Legacy comparator: re-arm once `(elapsed mod 60s) >= cooldown`.
    ///
    /// Re-arm timing is wrong whenever the elapsed time crosses a minute
    /// boundary, and a cooldown of 60s or more never re-arms.
    MinuteWrap,
}

impl FromStr for CooldownMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "elapsed" => Ok(Self::Elapsed),
            "minute_wrap" | "minute-wrap" => Ok(Self::MinuteWrap),
            other => Err(anyhow!(
                "unknown cooldown mode '{}'; expected 'elapsed' or 'minute_wrap'",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleState {
    Armed,
    Suppressed,
}

/// Outcome of one throttle tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertDecision {
    /// Capture a snapshot and dispatch a notification.
    Fire,
    /// Nothing to send this tick.
    Hold,
}

/// Mutable alert bookkeeping. Owned by the processing loop only.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlertState {
    pub last_alert: Option<Instant>,
    pub suppressed: bool,
}

pub struct AlertThrottle {
    cooldown: Duration,
    mode: CooldownMode,
    state: AlertState,
}

impl AlertThrottle {
    pub fn new(settings: AlertSettings) -> Self {
        if settings.cooldown_mode == CooldownMode::MinuteWrap {
            log::warn!(
                "cooldown mode minute_wrap compares elapsed time modulo 60s; re-arm timing is unreliable{}",
                if settings.cooldown >= Duration::from_secs(60) {
                    " and a cooldown of 60s or more never re-arms"
                } else {
                    ""
                }
            );
        }
        Self {
            cooldown: settings.cooldown,
            mode: settings.cooldown_mode,
            state: AlertState::default(),
        }
    }

    pub fn state(&self) -> ThrottleState {
        if self.state.suppressed {
            ThrottleState::Suppressed
        } else {
            ThrottleState::Armed
        }
    }

    pub fn alert_state(&self) -> AlertState {
        self.state
    }

    /// Evaluate one frame pair.
    ///
    /// A suppressed throttle re-arms first, so movement on the tick where the
    /// cooldown runs out fires immediately.
    pub fn tick(&mut self, now: Instant, movement_detected: bool) -> AlertDecision {
        if self.state.suppressed {
            if let Some(last) = self.state.last_alert {
                if self.cooldown_elapsed(now.saturating_duration_since(last)) {
                    log::debug!("alert throttle re-armed");
                    self.state.suppressed = false;
                }
            }
        }

        if movement_detected && !self.state.suppressed {
            self.state.last_alert = Some(now);
            self.state.suppressed = true;
            return AlertDecision::Fire;
        }
        AlertDecision::Hold
    }

    fn cooldown_elapsed(&self, elapsed: Duration) -> bool {
        match self.mode {
            CooldownMode::Elapsed => elapsed >= self.cooldown,
            CooldownMode::MinuteWrap => {
                elapsed.as_secs_f64() % 60.0 >= self.cooldown.as_secs_f64()
            }
        }
    }
}
