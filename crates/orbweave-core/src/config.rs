//! Orbweave configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaverConfig {
    /// Ingress and signal-history parameters.
    pub signals: SignalConfig,
    /// Dispatch bus tick and tier caps.
    pub bus: BusConfig,
    /// Trail reinforcement and evaporation parameters.
    pub trails: TrailConfig,
    /// Cycle driver parameters.
    pub cycle: CycleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Bounded signal history: oldest signals are evicted past this count.
    pub history_window: usize,
    /// Source-id prefixes treated as systemic origin for medium stickiness.
    pub systemic_prefixes: Vec<String>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            history_window: 500,
            systemic_prefixes: vec![
                "system".to_string(),
                "health-check".to_string(),
                "scheduler".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Fixed tick interval in milliseconds.
    pub tick_ms: u64,
    /// Batch lane chunk size: this many batch events processed concurrently.
    pub batch_size: usize,
    /// Per-tick cap for the high lane. Critical has no cap.
    pub high_cap: usize,
    /// Per-tick cap for the normal lane. Must stay below high_cap.
    pub normal_cap: usize,
    /// Per-tick cap for the low lane. Must stay below normal_cap.
    pub low_cap: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            batch_size: 16,
            high_cap: 8,
            normal_cap: 4,
            low_cap: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    /// Strength added on a successful traversal.
    pub reinforce_delta: f64,
    /// Strength removed on a failed traversal.
    pub weaken_delta: f64,
    /// EMA weight for success-rate samples.
    pub success_ema_weight: f64,
    /// EMA weight for latency samples.
    pub latency_ema_weight: f64,
    /// Trails at or below this strength are never returned by routing.
    pub strength_floor: f64,
    /// Trails decayed below this strength are pruned.
    pub prune_epsilon: f64,
    /// Default per-second evaporation rate for new trails.
    pub evaporation_rate: f64,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            reinforce_delta: 0.1,
            weaken_delta: 0.2,
            success_ema_weight: 0.1,
            latency_ema_weight: 0.1,
            strength_floor: 0.1,
            prune_epsilon: 0.01,
            evaporation_rate: 0.0005,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// How many threads/signals the status snapshot samples.
    pub sample_size: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self { sample_size: 5 }
    }
}

impl WeaverConfig {
    /// Load from a TOML file. Unknown keys are ignored; missing sections use
    /// defaults.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| crate::error::Error::ConfigError(e.to_string()))
    }

    /// Load from `path` if it exists, otherwise the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("invalid config at {}: {} (using defaults)", path.display(), e);
                }
            }
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_caps_strictly_decreasing() {
        let config = BusConfig::default();
        assert!(config.high_cap > config.normal_cap);
        assert!(config.normal_cap > config.low_cap);
        assert!(config.low_cap > 0);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: WeaverConfig = toml::from_str(
            r#"
            [bus]
            tick_ms = 100

            [trails]
            evaporation_rate = 0.01
            "#,
        )
        .unwrap();
        assert_eq!(config.bus.tick_ms, 100);
        assert_eq!(config.bus.batch_size, BusConfig::default().batch_size);
        assert_eq!(config.trails.evaporation_rate, 0.01);
        assert_eq!(config.signals.history_window, 500);
    }

    #[test]
    fn empty_toml_is_default() {
        let config: WeaverConfig = toml::from_str("").unwrap();
        assert_eq!(config.cycle.sample_size, 5);
        assert_eq!(config.trails.strength_floor, 0.1);
        assert_eq!(config.trails.prune_epsilon, 0.01);
    }
}
