//! Controller configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default pause between failed health probes.
pub const DEFAULT_HEALTHCHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Default pause between event polls while a session is active.
pub const DEFAULT_EVENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Timing and logging settings for a [`SessionController`](crate::session::SessionController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub healthcheck_interval: Duration,
    pub event_poll_interval: Duration,
    /// Directory for the transition log. `None` disables it.
    pub log_dir: Option<PathBuf>,
    /// File stem of the transition log.
    pub log_id: String,
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn healthcheck_interval(mut self, interval: Duration) -> Self {
        self.healthcheck_interval = interval;
        self
    }

    pub fn event_poll_interval(mut self, interval: Duration) -> Self {
        self.event_poll_interval = interval;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn log_id(mut self, id: impl Into<String>) -> Self {
        self.log_id = id.into();
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            healthcheck_interval: DEFAULT_HEALTHCHECK_INTERVAL,
            event_poll_interval: DEFAULT_EVENT_POLL_INTERVAL,
            log_dir: None,
            log_id: "session".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.healthcheck_interval, Duration::from_secs(1));
        assert_eq!(config.event_poll_interval, Duration::from_millis(500));
        assert!(config.log_dir.is_none());
        assert_eq!(config.log_id, "session");
    }

    #[test]
    fn setters_chain() {
        let config = ControllerConfig::new()
            .healthcheck_interval(Duration::from_millis(10))
            .event_poll_interval(Duration::from_millis(5))
            .log_dir("/tmp/logs")
            .log_id("UI");

        assert_eq!(config.healthcheck_interval, Duration::from_millis(10));
        assert_eq!(config.event_poll_interval, Duration::from_millis(5));
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert_eq!(config.log_id, "UI");
    }
}
