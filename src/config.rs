// src/config.rs
//
// Central configuration for the doseloop engine: learning hyperparameters,
// engine cadence knobs, and the dose process model. This is the single
// source of truth for defaults; the CLI and environment overrides in
// `main.rs` layer on top of it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Full engine configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Learning hyperparameters (mutable at runtime via setParams).
    pub hyper: Hyperparams,
    /// Tick cadence and log cadence.
    pub engine: EngineConfig,
    /// Dose process model parameters.
    pub env: EnvConfig,
}

/// SARSA hyperparameters.
///
/// Serialized field names match the wire payloads observers consume
/// (`init` / `paramsUpdated` events and the `/config` endpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparams {
    /// Learning rate.
    #[serde(rename = "ALPHA")]
    pub alpha: f64,
    /// Discount factor.
    #[serde(rename = "GAMMA")]
    pub gamma: f64,
    /// Exploration rate.
    #[serde(rename = "EPSILON")]
    pub epsilon: f64,
    /// Number of episodes to train for.
    #[serde(rename = "NUM_EPISODES")]
    pub episode_target: u32,
    /// Fixed number of steps per episode.
    #[serde(rename = "STEPS_PER_EPISODE")]
    pub steps_per_episode: u32,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.2,
            episode_target: 100,
            steps_per_episode: 100,
        }
    }
}

/// Tick / logging cadence.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed tick interval in milliseconds (~20 ticks/s by default).
    pub tick_interval_ms: u64,
    /// Emit an episodeLog event every N closed episodes (the final episode
    /// always logs). Clamped to at least 1.
    pub episode_log_every: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            episode_log_every: 5,
        }
    }
}

/// Dose process model parameters.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Dose level the reward pulls the state toward.
    pub target_dose: f64,
    /// Organ-at-risk limit; state above it is penalised.
    pub oar_limit: f64,
    /// Maximum magnitude of a single-step dose change.
    pub max_step: f64,
    /// Lower bound of the initial-state sampling range.
    pub init_min: f64,
    /// Width of the initial-state sampling range.
    pub init_span: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            target_dose: 70.0,
            oar_limit: 26.0,
            max_step: 5.0,
            init_min: 30.0,
            init_span: 40.0,
        }
    }
}

impl Config {
    /// Apply `DOSELOOP_*` environment overrides on top of the current
    /// values. Unparseable values are ignored.
    ///
    /// Environment variables:
    /// - DOSELOOP_ALPHA, DOSELOOP_GAMMA, DOSELOOP_EPSILON
    /// - DOSELOOP_EPISODES, DOSELOOP_STEPS_PER_EPISODE
    /// - DOSELOOP_TICK_INTERVAL_MS, DOSELOOP_EPISODE_LOG_EVERY
    pub fn apply_env_overrides(&mut self) {
        use std::env;

        if let Ok(raw) = env::var("DOSELOOP_ALPHA") {
            if let Ok(v) = raw.parse::<f64>() {
                if v.is_finite() {
                    self.hyper.alpha = v;
                }
            }
        }

        if let Ok(raw) = env::var("DOSELOOP_GAMMA") {
            if let Ok(v) = raw.parse::<f64>() {
                if v.is_finite() {
                    self.hyper.gamma = v;
                }
            }
        }

        if let Ok(raw) = env::var("DOSELOOP_EPSILON") {
            if let Ok(v) = raw.parse::<f64>() {
                if v.is_finite() {
                    self.hyper.epsilon = v;
                }
            }
        }

        if let Ok(raw) = env::var("DOSELOOP_EPISODES") {
            if let Ok(v) = raw.parse::<u32>() {
                if v >= 1 {
                    self.hyper.episode_target = v;
                }
            }
        }

        if let Ok(raw) = env::var("DOSELOOP_STEPS_PER_EPISODE") {
            if let Ok(v) = raw.parse::<u32>() {
                if v >= 1 {
                    self.hyper.steps_per_episode = v;
                }
            }
        }

        if let Ok(raw) = env::var("DOSELOOP_TICK_INTERVAL_MS") {
            if let Ok(v) = raw.parse::<u64>() {
                if v >= 1 {
                    self.engine.tick_interval_ms = v;
                }
            }
        }

        if let Ok(raw) = env::var("DOSELOOP_EPISODE_LOG_EVERY") {
            if let Ok(v) = raw.parse::<u32>() {
                self.engine.episode_log_every = v.max(1);
            }
        }
    }
}

/// Partial hyperparameter update as received from setParams / POST /config.
///
/// Each present field overwrites the corresponding hyperparameter; absent,
/// unknown or non-numeric fields are skipped without error. Non-finite
/// floats and non-positive counts are rejected the same way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialHyperparams {
    pub alpha: Option<f64>,
    pub gamma: Option<f64>,
    pub epsilon: Option<f64>,
    pub episode_target: Option<u32>,
    pub steps_per_episode: Option<u32>,
}

impl PartialHyperparams {
    /// Extract the recognised numeric fields from an arbitrary JSON value.
    ///
    /// Anything that is not a finite number under the expected key is
    /// dropped field-by-field, mirroring the tolerant merge semantics of
    /// the control surface.
    pub fn from_value(value: &Value) -> Self {
        let finite = |key: &str| value.get(key).and_then(Value::as_f64).filter(|v| v.is_finite());

        let count = |key: &str| finite(key).filter(|v| *v >= 1.0).map(|v| v as u32);

        Self {
            alpha: finite("ALPHA"),
            gamma: finite("GAMMA"),
            epsilon: finite("EPSILON"),
            episode_target: count("NUM_EPISODES"),
            steps_per_episode: count("STEPS_PER_EPISODE"),
        }
    }

    /// Merge the present fields into `hyper`. Returns true if anything
    /// changed.
    pub fn apply(&self, hyper: &mut Hyperparams) -> bool {
        let mut changed = false;

        if let Some(v) = self.alpha.filter(|v| v.is_finite()) {
            hyper.alpha = v;
            changed = true;
        }
        if let Some(v) = self.gamma.filter(|v| v.is_finite()) {
            hyper.gamma = v;
            changed = true;
        }
        if let Some(v) = self.epsilon.filter(|v| v.is_finite()) {
            hyper.epsilon = v;
            changed = true;
        }
        if let Some(v) = self.episode_target.filter(|v| *v >= 1) {
            hyper.episode_target = v;
            changed = true;
        }
        if let Some(v) = self.steps_per_episode.filter(|v| *v >= 1) {
            hyper.steps_per_episode = v;
            changed = true;
        }

        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_from_value_picks_numeric_fields_only() {
        let value = json!({
            "ALPHA": 0.5,
            "GAMMA": "not a number",
            "NUM_EPISODES": 25,
            "unknownField": "x",
        });

        let partial = PartialHyperparams::from_value(&value);
        assert_eq!(partial.alpha, Some(0.5));
        assert_eq!(partial.gamma, None);
        assert_eq!(partial.episode_target, Some(25));
        assert_eq!(partial.steps_per_episode, None);
    }

    #[test]
    fn partial_rejects_non_positive_counts() {
        let value = json!({ "NUM_EPISODES": 0, "STEPS_PER_EPISODE": -3 });
        let partial = PartialHyperparams::from_value(&value);
        assert_eq!(partial.episode_target, None);
        assert_eq!(partial.steps_per_episode, None);
    }

    #[test]
    fn apply_skips_non_finite_floats() {
        let mut hyper = Hyperparams::default();
        let before = hyper.clone();

        let partial = PartialHyperparams {
            alpha: Some(f64::NAN),
            gamma: Some(f64::INFINITY),
            ..Default::default()
        };

        assert!(!partial.apply(&mut hyper));
        assert_eq!(hyper, before);
    }

    #[test]
    fn apply_merges_present_fields() {
        let mut hyper = Hyperparams::default();
        let partial = PartialHyperparams {
            alpha: Some(0.42),
            steps_per_episode: Some(10),
            ..Default::default()
        };

        assert!(partial.apply(&mut hyper));
        assert_eq!(hyper.alpha, 0.42);
        assert_eq!(hyper.steps_per_episode, 10);
        // Untouched fields keep their defaults.
        assert_eq!(hyper.gamma, 0.9);
        assert_eq!(hyper.epsilon, 0.2);
        assert_eq!(hyper.episode_target, 100);
    }

    #[test]
    fn hyperparams_serialize_with_wire_names() {
        let json = serde_json::to_value(Hyperparams::default()).unwrap();
        assert!(json.get("ALPHA").is_some());
        assert!(json.get("NUM_EPISODES").is_some());
        assert!(json.get("STEPS_PER_EPISODE").is_some());
    }
}
