//! Configuration loaded from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// What happens to a promo code's usage counter when an order that redeemed it is cancelled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PromoUsagePolicy {
    /// A redeemed code stays spent whatever happens to the order.
    #[default]
    Spent,
    /// Cancelling the order gives the use back to the code.
    ReleaseOnCancel,
}

impl FromStr for PromoUsagePolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spent" => Ok(Self::Spent),
            "release_on_cancel" => Ok(Self::ReleaseOnCancel),
            other => Err(format!("unknown promo usage policy: {other}")),
        }
    }
}

/// How the automatic reply for a five-star review is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AutoReplyMode {
    #[default]
    Random,
    First,
}

impl FromStr for AutoReplyMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "first" => Ok(Self::First),
            other => Err(format!("unknown auto reply mode: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub promo_usage: PromoUsagePolicy,
    pub support_poll_interval: Duration,
    pub auto_reply: AutoReplyMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
            port: 8083,
            nats_url: None,
            promo_usage: PromoUsagePolicy::Spent,
            support_poll_interval: Duration::from_secs(5),
            auto_reply: AutoReplyMode::Random,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: env::var("DATABASE_URL").ok(),
            max_connections: parsed("DATABASE_MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            port: parsed("PORT").unwrap_or(defaults.port),
            nats_url: env::var("NATS_URL").ok().filter(|u| !u.is_empty()),
            promo_usage: parsed("PROMO_USAGE_POLICY").unwrap_or(defaults.promo_usage),
            support_poll_interval: parsed("SUPPORT_POLL_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.support_poll_interval),
            auto_reply: parsed("AUTO_REPLY_MODE").unwrap_or(defaults.auto_reply),
        }
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!("spent".parse::<PromoUsagePolicy>().unwrap(), PromoUsagePolicy::Spent);
        assert_eq!("Release_On_Cancel".parse::<PromoUsagePolicy>().unwrap(), PromoUsagePolicy::ReleaseOnCancel);
        assert!("sometimes".parse::<PromoUsagePolicy>().is_err());
        assert_eq!("first".parse::<AutoReplyMode>().unwrap(), AutoReplyMode::First);
    }

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.port, 8083);
        assert_eq!(c.support_poll_interval, Duration::from_secs(5));
        assert_eq!(c.promo_usage, PromoUsagePolicy::Spent);
    }
}
