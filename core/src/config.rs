//! Typed configuration fragments owned by `core`. The engine only ever consumes an
//! already-constructed [`BusConfig`]/[`BreakerConfig`]; parsing them out of a config file
//! or CLI flags is the out-of-scope caller's job (spec §1).

use crate::breaker::BreakerParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    pub buffer_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            buffer_size: crate::bus::DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub open_duration_ms: u64,
    pub half_open_successes_required: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        let defaults = BreakerParams::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            open_duration_ms: defaults.open_duration.as_millis() as u64,
            half_open_successes_required: defaults.half_open_successes_required,
        }
    }
}

impl From<BreakerConfig> for BreakerParams {
    fn from(config: BreakerConfig) -> Self {
        BreakerParams {
            failure_threshold: config.failure_threshold,
            open_duration: Duration::from_millis(config.open_duration_ms),
            half_open_successes_required: config.half_open_successes_required,
        }
    }
}
