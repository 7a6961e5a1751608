use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::EngineError;

/// How often the Newton-Raphson loop re-forms the Jacobian.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JacobianUpdate {
    /// Form a fresh Jacobian on every iteration.
    #[default]
    EveryIteration,
    /// Form the Jacobian on odd iterations and reuse it on the even ones.
    EveryOtherIteration,
}

/// Options for one load-flow run: convergence tolerance, iteration budget,
/// voltage limits and the acceleration factor applied to each update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerFlowConfig {
    /// Converged when `max|dP| + max|dQ|` is at or below this value.
    pub tolerance: f64,
    pub max_it: usize,
    pub v_min: f64,
    pub v_max: f64,
    pub acceleration: f64,
    pub jacobian: JacobianUpdate,
}

impl Default for PowerFlowConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.02,
            max_it: 15,
            v_min: 0.95,
            v_max: 1.05,
            acceleration: 1.0,
            jacobian: JacobianUpdate::EveryIteration,
        }
    }
}

/// Limits applied while building the element graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Maximum number of lines a single bus may connect to.
    pub bus_capacity: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self { bus_capacity: 10 }
    }
}

/// Full engine configuration.
///
/// ```
/// use livegrid::prelude::EngineConfig;
///
/// let cfg = EngineConfig::from_json_str(r#"{ "poll_timeout_ms": 20, "powerflow": { "max_it": 30 } }"#).unwrap();
/// assert_eq!(cfg.poll_timeout().as_millis(), 20);
/// assert_eq!(cfg.powerflow.max_it, 30);
/// assert_eq!(cfg.powerflow.tolerance, 0.02);
/// assert_eq!(cfg.topology.bus_capacity, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on how long one cycle waits for the first queued command.
    pub poll_timeout_ms: u64,
    pub topology: TopologyConfig,
    pub powerflow: PowerFlowConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 100,
            topology: TopologyConfig::default(),
            powerflow: PowerFlowConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
