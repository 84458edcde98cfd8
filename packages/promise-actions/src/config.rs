use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Default capacity of the channel sagas observe actions on.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Saga runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaConfig {
    /// How many actions may be buffered before slow sagas start lagging.
    pub channel_capacity: usize,
}

impl SagaConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let channel_capacity = match env::var("PROMISE_ACTIONS_CHANNEL_CAPACITY") {
            Ok(raw) => raw
                .parse()
                .context("PROMISE_ACTIONS_CHANNEL_CAPACITY must be a valid number")?,
            Err(_) => DEFAULT_CHANNEL_CAPACITY,
        };
        anyhow::ensure!(
            channel_capacity > 0,
            "PROMISE_ACTIONS_CHANNEL_CAPACITY must be greater than zero"
        );

        Ok(Self { channel_capacity })
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(SagaConfig::default().channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_from_env() {
        // One test owns the variable so parallel tests never race on it.
        const VAR: &str = "PROMISE_ACTIONS_CHANNEL_CAPACITY";

        env::remove_var(VAR);
        assert_eq!(SagaConfig::from_env().unwrap(), SagaConfig::default());

        env::set_var(VAR, "16");
        assert_eq!(SagaConfig::from_env().unwrap().channel_capacity, 16);

        env::set_var(VAR, "lots");
        let err = SagaConfig::from_env().unwrap_err();
        assert_eq!(err.to_string(), "PROMISE_ACTIONS_CHANNEL_CAPACITY must be a valid number");

        env::set_var(VAR, "0");
        let err = SagaConfig::from_env().unwrap_err();
        assert_eq!(
            err.to_string(),
            "PROMISE_ACTIONS_CHANNEL_CAPACITY must be greater than zero"
        );

        env::remove_var(VAR);
    }

    #[test]
    fn test_with_channel_capacity() {
        let config = SagaConfig::default().with_channel_capacity(8);
        assert_eq!(config.channel_capacity, 8);
    }
}
