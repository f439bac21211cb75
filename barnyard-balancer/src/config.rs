//! Balancer configuration
//!
//! Configuration loaded from environment variables and command line.

use barnyard_core::{DEFAULT_BARN_CAPACITY, DEFAULT_MAX_REDISTRIBUTION_STEPS};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Balancer configuration
#[derive(Debug, Clone)]
pub struct BalancerConfig {
    /// Capacity given to barns created on demand
    pub barn_capacity: u32,

    /// Upper bound on redistribution steps within one operation
    pub max_redistribution_steps: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            barn_capacity: DEFAULT_BARN_CAPACITY,
            max_redistribution_steps: DEFAULT_MAX_REDISTRIBUTION_STEPS,
        }
    }
}

impl BalancerConfig {
    /// Create configuration from environment variables
    ///
    /// Unset variables fall back to defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let barn_capacity = env_or("BARNYARD_BARN_CAPACITY", defaults.barn_capacity)?;
        let max_redistribution_steps = env_or(
            "BARNYARD_MAX_REDISTRIBUTION_STEPS",
            defaults.max_redistribution_steps,
        )?;

        let config = Self {
            barn_capacity,
            max_redistribution_steps,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the capacity of new barns
    pub fn with_barn_capacity(mut self, capacity: u32) -> Self {
        self.barn_capacity = capacity;
        self
    }

    /// Set the redistribution step cap
    pub fn with_max_redistribution_steps(mut self, steps: usize) -> Self {
        self.max_redistribution_steps = steps;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.barn_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "barn_capacity".to_string(),
                "must be positive".to_string(),
            ));
        }
        if self.max_redistribution_steps == 0 {
            return Err(ConfigError::InvalidValue(
                "max_redistribution_steps".to_string(),
                "must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), v)),
        Err(_) => Ok(default),
    }
}
