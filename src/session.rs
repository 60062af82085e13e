// src/session.rs
//
// The training session: sole owner and mutator of the environment, the
// Q-table, the episode tracker and the run state. Every mutation goes
// through one of the methods below, each of which runs to completion
// (including its broadcasts) before the next; the runner serializes them.
//
// The session is fully synchronous; the async layer (runner + ticker) only
// decides *when* to call in. Queued ticks are tagged with the generation
// they were scheduled under, so a tick that raced a pause or reset is a
// guaranteed no-op.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{Config, EngineConfig, EnvConfig, Hyperparams, PartialHyperparams};
use crate::env::{DoseEnv, StepOutcome};
use crate::episode::EpisodeTracker;
use crate::events::{
    EpisodeLogPayload, Event, InitPayload, ResetCompletePayload, StatusSnapshot,
    TrainingCompletePayload, UpdatePayload,
};
use crate::learner::sarsa_update;
use crate::logging::EventSink;
use crate::policy::select_action;
use crate::qtable::{bucket, QTable};
use crate::types::Action;

/// What a tick invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stale generation or not running: nothing happened.
    Stale,
    /// One environment/learner/bookkeeping step was performed.
    Stepped,
    /// The episode target was reached; the session stopped itself.
    Completed,
}

pub struct Session {
    hyper: Hyperparams,
    engine: EngineConfig,
    env_cfg: EnvConfig,

    env: DoseEnv,
    qtable: QTable,
    tracker: EpisodeTracker,

    /// Randomness for the policy (and for deriving fresh env seeds).
    rng: ChaCha8Rng,

    /// Current (state, action) pair; None only before first initialization.
    current: Option<(f64, Action)>,
    running: bool,
    /// Whether trainingComplete has been emitted for this run.
    completed: bool,
    /// Bumped by pause/reset to invalidate queued ticks.
    generation: u64,
}

impl Session {
    /// Build a session via the same path as `reset`. Pass a seed for
    /// deterministic behaviour (tests); None seeds from entropy.
    pub fn new(cfg: Config, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut session = Self {
            hyper: cfg.hyper,
            engine: cfg.engine,
            env_cfg: cfg.env.clone(),
            env: DoseEnv::new(&cfg.env),
            qtable: QTable::new(),
            tracker: EpisodeTracker::new(),
            rng,
            current: None,
            running: false,
            completed: false,
            generation: 0,
        };
        session.reinitialize();
        session
    }

    /// Reset routine shared by the constructor and `reset`: zero the table
    /// and counters, rebuild the environment with a fresh seed, re-derive
    /// the current (state, action) pair.
    fn reinitialize(&mut self) {
        self.qtable.reset();
        self.tracker.reset();

        let env_seed = self.rng.gen();
        self.env = DoseEnv::with_seed(&self.env_cfg, env_seed);

        let state = self.env.reset();
        let action = select_action(&self.qtable, state, self.hyper.epsilon, &mut self.rng);
        self.current = Some((state, action));

        self.running = false;
        self.completed = false;
    }

    /// Begin (or resume) ticking. Returns true when the caller should
    /// spawn a ticker for the current generation.
    ///
    /// Idempotent: starting while running only re-acknowledges. Starting
    /// once the episode target is reached never re-enters Running; if the
    /// completion event is still pending (e.g. the session was paused on
    /// the closing tick), it is emitted here instead.
    pub fn start(&mut self, sink: &mut dyn EventSink) -> bool {
        if self.tracker.episode() >= self.hyper.episode_target {
            self.emit_training_complete(sink);
            return false;
        }

        if self.running {
            sink.emit(&Event::Started);
            return false;
        }

        if self.current.is_none() {
            let state = self.env.reset();
            let action = select_action(&self.qtable, state, self.hyper.epsilon, &mut self.rng);
            self.current = Some((state, action));
        }

        self.running = true;
        sink.emit(&Event::Started);
        true
    }

    /// Stop ticking, preserving all learning state. Idempotent.
    pub fn pause(&mut self, sink: &mut dyn EventSink) {
        self.generation += 1;
        self.running = false;
        sink.emit(&Event::Paused);
    }

    /// Full reinitialization: invalidates any in-flight tick first, then
    /// rebuilds everything and announces the new state.
    pub fn reset(&mut self, sink: &mut dyn EventSink) {
        self.generation += 1;
        self.reinitialize();

        let state = match self.current {
            Some((state, _)) => state,
            None => 0.0,
        };
        sink.emit(&Event::ResetComplete(ResetCompletePayload {
            current_episode: 0,
            rewards: Vec::new(),
            state,
        }));
    }

    /// Merge a partial hyperparameter update and return the full current
    /// set (the caller unicasts it back as paramsUpdated). Takes effect on
    /// the next tick. Raising the target past the current episode re-arms
    /// the completion event.
    pub fn set_params(&mut self, partial: &PartialHyperparams) -> Hyperparams {
        partial.apply(&mut self.hyper);

        if self.completed && self.tracker.episode() < self.hyper.episode_target {
            self.completed = false;
        }

        self.hyper.clone()
    }

    /// One scheduler tick.
    ///
    /// Order is fixed: completion check, env step with the current action,
    /// next-action selection, SARSA update with the carried quintuple,
    /// state/action advance, episode bookkeeping, broadcasts.
    pub fn on_tick(&mut self, generation: u64, sink: &mut dyn EventSink) -> TickOutcome {
        if generation != self.generation || !self.running {
            return TickOutcome::Stale;
        }

        // Boundary check first: no stepping past the target, ever.
        if self.tracker.episode() >= self.hyper.episode_target {
            self.running = false;
            self.emit_training_complete(sink);
            return TickOutcome::Completed;
        }

        let Some((state, action)) = self.current else {
            return TickOutcome::Stale;
        };

        let StepOutcome { next_state, reward } = self.env.step(action);

        // On-policy: the action selected here is both the bootstrap target
        // and the action actually taken next tick.
        let next_action = select_action(&self.qtable, next_state, self.hyper.epsilon, &mut self.rng);

        sarsa_update(
            &mut self.qtable,
            state,
            action,
            reward,
            next_state,
            next_action,
            self.hyper.alpha,
            self.hyper.gamma,
        );

        self.current = Some((next_state, next_action));

        self.tracker.record_step(reward);
        if let Some(avg) = self.tracker.maybe_close_episode(self.hyper.steps_per_episode) {
            let episode = self.tracker.episode();
            let every = self.engine.episode_log_every.max(1);
            if episode % every == 0 || episode == self.hyper.episode_target {
                sink.emit(&Event::EpisodeLog(EpisodeLogPayload {
                    episode,
                    avg_reward: format!("{avg:.3}"),
                }));
            }
        }

        sink.emit(&Event::Update(UpdatePayload {
            state: next_state,
            action: next_action.index(),
            current_episode: self.tracker.episode(),
            step_in_episode: self.tracker.step_in_episode(),
            rewards: self.tracker.rewards().to_vec(),
            q_sample: self.qtable.row(bucket(next_state)).to_vec(),
        }));

        TickOutcome::Stepped
    }

    fn emit_training_complete(&mut self, sink: &mut dyn EventSink) {
        if self.completed {
            return;
        }
        self.completed = true;
        sink.emit(&Event::TrainingComplete(TrainingCompletePayload {
            current_episode: self.tracker.episode(),
            rewards: self.tracker.rewards().to_vec(),
        }));
    }

    /// One-time snapshot for a newly connected observer.
    pub fn init_snapshot(&self) -> Event {
        Event::Init(InitPayload {
            hyper: self.hyper.clone(),
            current_episode: self.tracker.episode(),
            rewards: self.tracker.rewards().to_vec(),
        })
    }

    /// Synchronous status for the ops surface.
    pub fn status(&self) -> StatusSnapshot {
        let (state, action) = match self.current {
            Some((state, action)) => (state, action.index()),
            None => (0.0, Action::Hold.index()),
        };

        StatusSnapshot {
            running: self.running,
            current_episode: self.tracker.episode(),
            step_in_episode: self.tracker.step_in_episode(),
            state,
            action,
            rewards_length: self.tracker.rewards().len(),
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Current tick generation; ticks scheduled under an older generation
    /// are ignored.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn hyper(&self) -> &Hyperparams {
        &self.hyper
    }

    pub fn qtable(&self) -> &QTable {
        &self.qtable
    }

    pub fn current(&self) -> Option<(f64, Action)> {
        self.current
    }

    pub fn rewards(&self) -> &[f64] {
        self.tracker.rewards()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::VecSink;

    fn session() -> Session {
        Session::new(Config::default(), Some(42))
    }

    #[test]
    fn new_session_is_initialized_and_stopped() {
        let session = session();
        assert!(!session.running());
        let (state, _) = session.current().expect("current pair set");
        assert!((30.0..70.0).contains(&state));
        assert!(session.rewards().is_empty());
    }

    #[test]
    fn start_is_idempotent() {
        let mut session = session();
        let mut sink = VecSink::new();

        assert!(session.start(&mut sink));
        assert!(session.running());
        // Second start: ack only, no new ticker requested.
        assert!(!session.start(&mut sink));
        assert_eq!(sink.of_kind("started").len(), 2);
    }

    #[test]
    fn pause_invalidates_queued_ticks() {
        let mut session = session();
        let mut sink = VecSink::new();

        session.start(&mut sink);
        let stale_generation = session.generation();
        session.pause(&mut sink);
        assert!(!session.running());

        let before = session.current();
        assert_eq!(
            session.on_tick(stale_generation, &mut sink),
            TickOutcome::Stale
        );
        assert_eq!(session.current(), before);
    }

    #[test]
    fn set_params_rearms_completion_when_target_raised() {
        let mut cfg = Config::default();
        cfg.hyper.steps_per_episode = 2;
        cfg.hyper.episode_target = 1;
        cfg.hyper.epsilon = 0.0;
        let mut session = Session::new(cfg, Some(7));
        let mut sink = VecSink::new();

        session.start(&mut sink);
        let generation = session.generation();
        for _ in 0..3 {
            session.on_tick(generation, &mut sink);
        }
        assert_eq!(sink.of_kind("trainingComplete").len(), 1);

        let partial = PartialHyperparams {
            episode_target: Some(3),
            ..Default::default()
        };
        session.set_params(&partial);

        // Training can resume toward the new target.
        assert!(session.start(&mut sink));
        assert!(session.running());
    }
}
