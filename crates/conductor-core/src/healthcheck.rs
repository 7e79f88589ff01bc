//! Bounded-retry readiness tracking for the worker process.
//!
//! Probes themselves run elsewhere (see [`crate::backend::SessionBackend`]);
//! this module only counts outcomes and decides when to give up.

use std::fmt;

/// Number of failed probes after which the current attempt is abandoned.
pub const MAX_HEALTHCHECK_RETRIES: u32 = 10;

/// What to do after recording a probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The worker answered; setup can continue.
    Healthy,
    /// Probe again. `retries` is the failure count so far.
    Retry { retries: u32 },
    /// The bound was reached; stop probing.
    Exhausted { retries: u32 },
}

/// User-facing notice raised once when probing is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatalNotice {
    pub retries: u32,
}

impl fmt::Display for FatalNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Application failed health check\n\nRetries: {}\n\n\
             Please report / find more info on this issue with the worker logs.",
            self.retries
        )
    }
}

/// Retry counter plus the one-shot flag for the fatal notice.
///
/// The two are tracked separately: the counter describes the probe history,
/// the flag records whether the user has already been told.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthcheckState {
    retries: u32,
    reported: bool,
}

impl HealthcheckState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn is_exhausted(&self) -> bool {
        self.retries >= MAX_HEALTHCHECK_RETRIES
    }

    /// Whether the fatal notice has already been handed out.
    pub fn is_reported(&self) -> bool {
        self.reported
    }

    pub fn record_success(&mut self) -> ProbeOutcome {
        self.retries = 0;
        ProbeOutcome::Healthy
    }

    pub fn record_failure(&mut self) -> ProbeOutcome {
        self.retries = self.retries.saturating_add(1);
        if self.is_exhausted() {
            ProbeOutcome::Exhausted {
                retries: self.retries,
            }
        } else {
            ProbeOutcome::Retry {
                retries: self.retries,
            }
        }
    }

    /// Hand out the fatal notice, at most once per exhaustion.
    pub fn take_fatal_notice(&mut self) -> Option<FatalNotice> {
        if !self.is_exhausted() || self.reported {
            return None;
        }
        self.reported = true;
        Some(FatalNotice {
            retries: self.retries,
        })
    }
}
