//! Engine configuration.

use std::time::Duration;

use crate::types::IsolationLevel;

/// Configuration for a transaction manager.
#[derive(Debug, Clone)]
pub struct Config {
    /// Isolation level used by `begin_default`.
    pub default_isolation: IsolationLevel,

    /// Backstop for lock waits (`None` = wait indefinitely).
    ///
    /// Deadlock detection is always on; the timeout only covers waits
    /// the wait-for graph cannot see, such as a caller that blocks and
    /// never commits. An expired wait is treated like a deadlock
    /// victimization.
    pub lock_wait_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_isolation: IsolationLevel::RepeatableRead,
            lock_wait_timeout: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the isolation level used by `begin_default`.
    #[must_use]
    pub const fn default_isolation(mut self, level: IsolationLevel) -> Self {
        self.default_isolation = level;
        self
    }

    /// Sets the lock-wait backstop timeout.
    #[must_use]
    pub const fn lock_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_wait_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.default_isolation, IsolationLevel::RepeatableRead);
        assert!(config.lock_wait_timeout.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .default_isolation(IsolationLevel::Serializable)
            .lock_wait_timeout(Some(Duration::from_millis(250)));

        assert_eq!(config.default_isolation, IsolationLevel::Serializable);
        assert_eq!(
            config.lock_wait_timeout,
            Some(Duration::from_millis(250))
        );
    }
}
