//! Trail store and decay math (pure math where it matters, no clocks in
//! the arithmetic)

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orbweave_core::{Trail, TrailConfig};
use std::sync::Mutex;
use tracing::debug;

/// Strength after `elapsed_secs` of disuse: `s * e^(-rate * elapsed)`.
/// Non-positive rate or elapsed time leaves the strength unchanged.
pub fn decayed_strength(strength: f64, elapsed_secs: f64, rate: f64) -> f64 {
    if rate <= 0.0 || elapsed_secs <= 0.0 {
        return strength;
    }
    (strength * (-rate * elapsed_secs).exp()).clamp(0.0, 1.0)
}

/// Exponential moving average step toward `sample` with the given weight.
fn ema(current: f64, sample: f64, weight: f64) -> f64 {
    current * (1.0 - weight) + sample * weight
}

/// Holds trails keyed by id. Lookups on a missing id are no-ops, never
/// errors.
pub struct TrailStore {
    trails: DashMap<String, Trail>,
    config: TrailConfig,
    /// Watermark for evaporation passes: decay is computed from the elapsed
    /// time since the previous pass so repeated passes compose to
    /// `e^(-rate * total_elapsed)`.
    last_decay: Mutex<DateTime<Utc>>,
}

impl TrailStore {
    pub fn new(config: TrailConfig) -> Self {
        Self {
            trails: DashMap::new(),
            config,
            last_decay: Mutex::new(Utc::now()),
        }
    }

    pub fn config(&self) -> &TrailConfig {
        &self.config
    }

    /// Create a trail for a freshly discovered path, seeded at full
    /// strength.
    pub fn create(&self, path: Vec<String>, latency_ms: f64) -> Trail {
        let trail = Trail {
            id: uuid::Uuid::new_v4().to_string(),
            path,
            strength: 1.0,
            success_rate: 1.0,
            latency_ms,
            last_used: Utc::now(),
            evaporation_rate: self.config.evaporation_rate,
        };
        debug!("new trail {} -> {:?}", trail.id, trail.destination());
        self.trails.insert(trail.id.clone(), trail.clone());
        trail
    }

    pub fn get(&self, id: &str) -> Option<Trail> {
        self.trails.get(id).map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }

    /// All trails above the routing floor, strongest product first.
    pub fn active(&self) -> Vec<Trail> {
        let mut trails: Vec<Trail> = self
            .trails
            .iter()
            .filter(|t| t.strength > self.config.strength_floor)
            .map(|t| t.clone())
            .collect();
        trails.sort_by(|a, b| {
            let score_a = a.strength * a.success_rate;
            let score_b = b.strength * b.success_rate;
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });
        trails
    }

    /// Strongest usable trail ending at `destination`: strength above the
    /// floor, ranked by strength x success rate.
    pub fn best_for(&self, destination: &str) -> Option<Trail> {
        self.active()
            .into_iter()
            .find(|t| t.destination() == Some(destination))
    }

    /// A successful traversal: strength up by the reinforce delta (clamped
    /// to 1.0), success-rate and latency EMAs move toward the observed
    /// sample.
    pub fn reinforce(&self, id: &str, latency_ms: f64) {
        if let Some(mut trail) = self.trails.get_mut(id) {
            trail.strength = (trail.strength + self.config.reinforce_delta).min(1.0);
            trail.success_rate = ema(trail.success_rate, 1.0, self.config.success_ema_weight);
            trail.latency_ms = ema(trail.latency_ms, latency_ms, self.config.latency_ema_weight);
            trail.last_used = Utc::now();
        }
    }

    /// A failed traversal: strength down by the weaken delta (clamped to
    /// 0.0), success-rate EMA moves toward zero.
    pub fn weaken(&self, id: &str) {
        if let Some(mut trail) = self.trails.get_mut(id) {
            trail.strength = (trail.strength - self.config.weaken_delta).max(0.0);
            trail.success_rate = ema(trail.success_rate, 0.0, self.config.success_ema_weight);
            trail.last_used = Utc::now();
        }
    }

    /// Periodic decay pass. Returns how many trails were pruned.
    pub fn evaporate(&self) -> usize {
        self.evaporate_at(Utc::now())
    }

    /// Decay every trail for the time elapsed since the previous pass —
    /// bounded per trail by its own time since last use, so a trail
    /// reinforced mid-window only decays for its idle tail. Trails falling
    /// below the prune epsilon are removed.
    pub fn evaporate_at(&self, now: DateTime<Utc>) -> usize {
        let mut last_decay = self.last_decay.lock().expect("decay watermark lock");
        let window_secs = (now - *last_decay).num_milliseconds() as f64 / 1000.0;
        if window_secs <= 0.0 {
            return 0;
        }
        *last_decay = now;
        drop(last_decay);

        let mut doomed = Vec::new();
        for mut trail in self.trails.iter_mut() {
            let idle_secs = (now - trail.last_used).num_milliseconds() as f64 / 1000.0;
            let elapsed = window_secs.min(idle_secs.max(0.0));
            trail.strength = decayed_strength(trail.strength, elapsed, trail.evaporation_rate);
            if trail.strength < self.config.prune_epsilon {
                doomed.push(trail.id.clone());
            }
        }
        for id in &doomed {
            self.trails.remove(id);
            debug!("trail {} evaporated below epsilon, pruned", id);
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_halves_per_half_life() {
        // rate * t = ln 2 is one half-life
        let half_life = std::f64::consts::LN_2;
        let result = decayed_strength(1.0, half_life, 1.0);
        assert!((result - 0.5).abs() < 1e-9, "expected ~0.5, got {}", result);
    }

    #[test]
    fn decay_ten_half_lives() {
        let elapsed = 10.0 * std::f64::consts::LN_2;
        let result = decayed_strength(0.5, elapsed, 1.0);
        let expected = 0.5 * (-elapsed).exp();
        assert!((result - expected).abs() < 1e-12);
        assert!(result < 0.001);
    }

    #[test]
    fn zero_rate_or_elapsed_returns_input() {
        assert_eq!(decayed_strength(0.7, 100.0, 0.0), 0.7);
        assert_eq!(decayed_strength(0.7, 0.0, 0.5), 0.7);
        assert_eq!(decayed_strength(0.7, -5.0, 0.5), 0.7);
    }

    #[test]
    fn ema_moves_toward_sample() {
        let moved = ema(0.8, 1.0, 0.1);
        assert!((moved - 0.82).abs() < 1e-12);
        let down = ema(0.8, 0.0, 0.1);
        assert!((down - 0.72).abs() < 1e-12);
    }
}
