use std::time::Duration;

const DEFAULT_RECONNECT_DELAY_DURATION: Duration = Duration::from_millis(3000);

/// Configuration for channel behavior.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Fixed delay between a closure and the next connection attempt.
    ///
    /// Every closure waits exactly this long; there is no growth and no retry limit.
    pub reconnect_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY_DURATION,
        }
    }
}

impl Config {
    /// Replace the reconnect delay.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}
