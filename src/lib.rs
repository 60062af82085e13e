//! doseloop core library.
//!
//! This crate exposes a live SARSA training engine for a scalar
//! dose-control process: the environment model, the discretized Q-table,
//! the epsilon-greedy policy, the on-policy update rule, episode
//! bookkeeping, and the tick-driven session that streams its state to
//! observers. The binary (`src/main.rs`) is just a thin harness wiring
//! the engine to its WebSocket and ops HTTP transports.

pub mod config;
pub mod env;
pub mod episode;
pub mod events;
pub mod learner;
pub mod logging;
pub mod metrics;
pub mod policy;
pub mod qtable;
pub mod runner;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use config::{Config, Hyperparams, PartialHyperparams};

pub use env::{DoseEnv, StepOutcome, STATE_MAX};

pub use episode::EpisodeTracker;

pub use events::{Command, Event, StatusSnapshot};

pub use learner::sarsa_update;

pub use logging::{BroadcastSink, EventSink, JsonlSink, NoopSink, TeeSink, VecSink};

pub use metrics::EngineMetrics;

pub use policy::{greedy_action, select_action};

pub use qtable::{bucket, QTable, ACTION_SIZE, STATE_SIZE};

pub use runner::{SessionRequest, SessionRunner};

pub use scheduler::Ticker;

pub use session::{Session, TickOutcome};

pub use types::{Action, TimestampMs};

// --- Whole-pipeline unit tests ----------------------------------------------
