// src/env.rs
//
// Dose process environment: one scalar state in [0, 100], three actions,
// and a reward that pulls the state toward the target dose while penalising
// excursions above the organ-at-risk limit.
//
// Both reset and step draw from a pseudo-random source, so exact
// trajectories are only reproducible when the env is seeded explicitly
// (`with_seed`). Tests assert structural properties, not trajectories.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::EnvConfig;
use crate::types::Action;

/// Upper bound of the raw state domain.
pub const STATE_MAX: f64 = 100.0;

/// Result of a single environment step.
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    /// State after applying the action, clamped to [0, STATE_MAX].
    pub next_state: f64,
    /// Reward for landing on `next_state`.
    pub reward: f64,
}

/// Simulated dose process.
pub struct DoseEnv {
    cfg: EnvConfig,
    state: f64,
    rng: ChaCha8Rng,
}

impl DoseEnv {
    /// Environment with a fresh entropy-seeded random source.
    pub fn new(cfg: &EnvConfig) -> Self {
        Self::from_rng(cfg, ChaCha8Rng::from_entropy())
    }

    /// Deterministic environment for tests and reproducible sessions.
    pub fn with_seed(cfg: &EnvConfig, seed: u64) -> Self {
        Self::from_rng(cfg, ChaCha8Rng::seed_from_u64(seed))
    }

    fn from_rng(cfg: &EnvConfig, rng: ChaCha8Rng) -> Self {
        let mut env = Self {
            cfg: cfg.clone(),
            state: 0.0,
            rng,
        };
        env.state = env.sample_initial_state();
        env
    }

    fn sample_initial_state(&mut self) -> f64 {
        self.cfg.init_min + self.rng.gen::<f64>() * self.cfg.init_span
    }

    /// Current raw state.
    pub fn state(&self) -> f64 {
        self.state
    }

    /// Re-sample the state uniformly from the initial range and return it.
    pub fn reset(&mut self) -> f64 {
        self.state = self.sample_initial_state();
        self.state
    }

    /// Advance the process by one action.
    ///
    /// The dose moves by a random magnitude in [0, max_step) signed by the
    /// action direction (hold contributes no drift), clamped to the domain.
    /// The reward is always well-defined: negative distance to the target
    /// dose minus a linear penalty for the excess above the OAR limit.
    pub fn step(&mut self, action: Action) -> StepOutcome {
        let delta = action.direction() * self.rng.gen::<f64>() * self.cfg.max_step;
        self.state = (self.state + delta).clamp(0.0, STATE_MAX);

        let target_error = (self.cfg.target_dose - self.state).abs();
        let oar_penalty = ((self.state - self.cfg.oar_limit) / 10.0).max(0.0);

        StepOutcome {
            next_state: self.state,
            reward: -target_error - oar_penalty,
        }
    }
}
