// src/main.rs
//
// Thin harness around the doseloop library.
// All of the real logic lives in the lib crate (session, runner, etc);
// this file parses the CLI, layers env overrides on the config, and wires
// the runner to its transports.

use clap::Parser;
use tokio::sync::broadcast;

use doseloop::config::Config;
use doseloop::events::Event;
use doseloop::logging::{BroadcastSink, EventSink, JsonlSink, TeeSink};
use doseloop::metrics::EngineMetrics;
use doseloop::runner::SessionRunner;
use doseloop::server::http::start_ops_server;
use doseloop::server::ws::run_ws_server;

/// Command-line arguments for the doseloop binary.
#[derive(Parser, Debug)]
#[command(name = "doseloop")]
struct Cli {
    /// WebSocket listen address for observers.
    #[arg(long, default_value = "127.0.0.1:4000")]
    ws_addr: String,

    /// Ops HTTP listen address (/status, /config, /metrics, /health).
    #[arg(long, default_value = "127.0.0.1:9090")]
    ops_addr: String,

    /// Tick interval in milliseconds.
    #[arg(long)]
    tick_interval_ms: Option<u64>,

    /// Learning rate alpha.
    #[arg(long)]
    alpha: Option<f64>,

    /// Discount factor gamma.
    #[arg(long)]
    gamma: Option<f64>,

    /// Exploration rate epsilon.
    #[arg(long)]
    epsilon: Option<f64>,

    /// Number of episodes to train for.
    #[arg(long)]
    episodes: Option<u32>,

    /// Steps per episode.
    #[arg(long)]
    steps_per_episode: Option<u32>,

    /// Seed for a deterministic session (omit for entropy seeding).
    #[arg(long)]
    seed: Option<u64>,

    /// Optional JSONL path mirroring every emitted event.
    #[arg(long)]
    log_jsonl: Option<String>,
}

/// Build Config from defaults, then apply CLI + env overrides.
///
/// This keeps src/config.rs as the single source of truth, while letting
/// research harnesses sweep parameters via environment variables.
fn build_config(cli: &Cli) -> Config {
    let mut cfg = Config::default();

    if let Some(v) = cli.alpha {
        cfg.hyper.alpha = v;
    }
    if let Some(v) = cli.gamma {
        cfg.hyper.gamma = v;
    }
    if let Some(v) = cli.epsilon {
        cfg.hyper.epsilon = v;
    }
    if let Some(v) = cli.episodes {
        cfg.hyper.episode_target = v;
    }
    if let Some(v) = cli.steps_per_episode {
        cfg.hyper.steps_per_episode = v;
    }
    if let Some(v) = cli.tick_interval_ms {
        cfg.engine.tick_interval_ms = v;
    }

    cfg.apply_env_overrides();
    cfg
}

/// Build the event sink: always the live broadcast, optionally teed into a
/// JSONL file for offline analysis.
fn build_sink(
    events: broadcast::Sender<Event>,
    log_jsonl: Option<&str>,
) -> Box<dyn EventSink + Send> {
    let broadcast_sink: Box<dyn EventSink + Send> = Box::new(BroadcastSink::new(events));

    match log_jsonl {
        Some(path) => match JsonlSink::create(path) {
            Ok(file_sink) => Box::new(TeeSink::new(vec![broadcast_sink, Box::new(file_sink)])),
            Err(err) => {
                eprintln!(
                    "Failed to create log file ({path}), \
                     events will not be mirrored to disk: {err}"
                );
                broadcast_sink
            }
        },
        None => broadcast_sink,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = build_config(&cli);

    let (events_tx, _) = broadcast::channel(256);
    let metrics = EngineMetrics::new();
    let sink = build_sink(events_tx.clone(), cli.log_jsonl.as_deref());

    let (runner, session_tx) = SessionRunner::new(cfg, cli.seed, sink, metrics.clone());

    start_ops_server(&cli.ops_addr, session_tx.clone(), metrics.clone());
    let runner_task = tokio::spawn(runner.run());

    let result = run_ws_server(cli.ws_addr.clone(), session_tx, events_tx, metrics).await;
    runner_task.abort();
    result
}
