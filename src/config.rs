//! 工作池配置
//!
//! Sizing bounds plus the scaling policy. Every field is fixed once the pool
//! is built; `validate` runs inside `AdaptivePool::new`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{PoolError, Result};

/// Scaling controller tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingPolicy {
    pub tick_interval_ms: u64,
    pub cooldown_ms: u64,
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    /// Most drones added by one scale-up.
    pub scale_up_step: usize,
    /// Most drones retired by one scale-down.
    pub scale_down_step: usize,
    pub report_interval_ms: u64,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            cooldown_ms: 5_000,
            scale_up_threshold: 0.75,
            scale_down_threshold: 0.25,
            scale_up_step: 2,
            scale_down_step: 1,
            report_interval_ms: 5_000,
        }
    }
}

impl ScalingPolicy {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    #[serde(default)]
    pub scaling: ScalingPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 2,
            max_workers: num_cpus::get().max(2) * 2,
            queue_capacity: 100,
            scaling: ScalingPolicy::default(),
        }
    }
}

impl PoolConfig {
    /// Bounds with the default scaling policy.
    pub fn new(min_workers: usize, max_workers: usize, queue_capacity: usize) -> Self {
        Self {
            min_workers,
            max_workers,
            queue_capacity,
            scaling: ScalingPolicy::default(),
        }
    }

    pub fn with_scaling(mut self, scaling: ScalingPolicy) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_workers == 0 {
            return Err(invalid("min_workers must be greater than 0"));
        }
        if self.max_workers < self.min_workers {
            return Err(invalid(format!(
                "max_workers ({}) must not be below min_workers ({})",
                self.max_workers, self.min_workers
            )));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity must be greater than 0"));
        }

        let s = &self.scaling;
        for (name, value) in [
            ("scale_up_threshold", s.scale_up_threshold),
            ("scale_down_threshold", s.scale_down_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        if s.scale_down_threshold >= s.scale_up_threshold {
            return Err(invalid("scale_down_threshold must be below scale_up_threshold"));
        }
        if s.scale_up_step == 0 || s.scale_down_step == 0 {
            return Err(invalid("scaling steps must be greater than 0"));
        }
        if s.tick_interval_ms == 0 || s.report_interval_ms == 0 {
            return Err(invalid("tick and report intervals must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> PoolError {
    PoolError::InvalidConfig(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_equal_bounds() {
        assert!(PoolConfig::new(3, 3, 1).validate().is_ok());
    }

    #[test]
    fn rejects_bad_bounds() {
        for config in [
            PoolConfig::new(0, 4, 10),
            PoolConfig::new(5, 4, 10),
            PoolConfig::new(1, 4, 0),
        ] {
            assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));
        }
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let config = PoolConfig::new(1, 4, 10).with_scaling(ScalingPolicy {
            scale_up_threshold: 0.2,
            scale_down_threshold: 0.5,
            ..ScalingPolicy::default()
        });
        assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(PoolConfig::default().validate().is_ok());
    }

    #[test]
    fn json_fills_policy_defaults() {
        let config = PoolConfig::from_json(
            r#"{"min_workers":2,"max_workers":8,"queue_capacity":10,"scaling":{"cooldown_ms":100}}"#,
        )
        .unwrap();
        assert_eq!(config.scaling.cooldown(), Duration::from_millis(100));
        assert_eq!(config.scaling.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.scaling.scale_up_step, 2);
    }

    #[test]
    fn json_is_validated() {
        let err = PoolConfig::from_json(r#"{"min_workers":4,"max_workers":2,"queue_capacity":10}"#)
            .unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));

        let err = PoolConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, PoolError::ConfigParse(_)));
    }
}
