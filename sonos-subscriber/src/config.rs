//! Configuration types for the sonos-subscriber crate
//!
//! Only the per-subscription knobs live here. The watchdog thresholds are
//! constants in [`crate::watcher`] and [`crate::monitor`]; they are part of
//! the failure model, not tunables.

use std::time::Duration;

use crate::error::{Result, SubscriberError};

/// Default subscription interval requested from the endpoint, in seconds
pub const DEFAULT_SUBSCRIPTION_INTERVAL_SECS: u32 = 600;

/// Default delay before retrying a failed SUBSCRIBE
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(5000);

/// Configuration for a single [`Subscription`](crate::Subscription)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
    /// Event endpoint SUBSCRIBE/UNSUBSCRIBE requests are sent to
    pub subscribe_url: String,

    /// URL the endpoint should deliver NOTIFY requests to
    pub notification_url: String,

    /// Subscription lifetime requested in the TIMEOUT header, in seconds
    /// Default: 600
    pub subscription_interval: u32,

    /// Delay before retrying after a failed SUBSCRIBE
    /// Default: 5000 ms
    pub retry_interval: Duration,
}

impl SubscriptionConfig {
    /// Create a config with default intervals
    pub fn new(subscribe_url: impl Into<String>, notification_url: impl Into<String>) -> Self {
        Self {
            subscribe_url: subscribe_url.into(),
            notification_url: notification_url.into(),
            subscription_interval: DEFAULT_SUBSCRIPTION_INTERVAL_SECS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_subscription_interval(mut self, seconds: u32) -> Self {
        self.subscription_interval = seconds;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Delay between a successful SUBSCRIBE and the renewal: half the interval
    pub fn renewal_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.subscription_interval) * 500)
    }

    /// Value of the TIMEOUT header
    pub fn timeout_header(&self) -> String {
        format!("Second-{}", self.subscription_interval)
    }

    /// Value of the CALLBACK header
    pub fn callback_header(&self) -> String {
        format!("<{}>", self.notification_url)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.subscribe_url.trim().is_empty() {
            return Err(SubscriberError::Configuration(
                "subscribe_url must not be empty".to_string(),
            ));
        }

        if self.notification_url.trim().is_empty() {
            return Err(SubscriberError::Configuration(
                "notification_url must not be empty".to_string(),
            ));
        }

        if self.subscription_interval == 0 {
            return Err(SubscriberError::Configuration(
                "Subscription interval must be greater than 0".to_string(),
            ));
        }

        if self.retry_interval == Duration::ZERO {
            return Err(SubscriberError::Configuration(
                "Retry interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SubscriptionConfig::new("http://host1/sub", "http://10.0.0.5:3400/notify");
        assert_eq!(config.subscription_interval, 600);
        assert_eq!(config.retry_interval, Duration::from_millis(5000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_values() {
        let config = SubscriptionConfig::new("http://host1/sub", "http://10.0.0.5:3400/notify")
            .with_subscription_interval(600);

        assert_eq!(config.renewal_delay(), Duration::from_secs(300));
        assert_eq!(config.timeout_header(), "Second-600");
        assert_eq!(config.callback_header(), "<http://10.0.0.5:3400/notify>");

        let short = config.with_subscription_interval(3);
        assert_eq!(short.renewal_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn test_config_validation() {
        let config = SubscriptionConfig::new("", "http://10.0.0.5:3400/notify");
        assert!(config.validate().is_err());

        let config = SubscriptionConfig::new("http://host1/sub", "  ");
        assert!(config.validate().is_err());

        let config = SubscriptionConfig::new("http://host1/sub", "http://10.0.0.5:3400/notify")
            .with_subscription_interval(0);
        assert!(config.validate().is_err());

        let config = SubscriptionConfig::new("http://host1/sub", "http://10.0.0.5:3400/notify")
            .with_retry_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = SubscriptionConfig::new("http://host1/sub", "http://10.0.0.5:3400/notify")
            .with_subscription_interval(1800)
            .with_retry_interval(Duration::from_millis(250));

        assert_eq!(config.subscription_interval, 1800);
        assert_eq!(config.retry_interval, Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }
}
