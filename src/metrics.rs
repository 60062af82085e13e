// src/metrics.rs
//
// Prometheus metrics for the engine, served by the ops HTTP endpoint.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct EngineMetrics {
    registry: Registry,
    ticks_total: IntCounter,
    commands_total: IntCounterVec,
    resets_total: IntCounter,
    training_complete_total: IntCounter,
    episodes_completed: IntGauge,
    observers_connected: IntGauge,
    last_tick_ms: IntGauge,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let ticks_total = IntCounter::with_opts(Opts::new("doseloop_ticks_total", "Tick count"))
            .expect("tick counter");
        let commands_total = IntCounterVec::new(
            Opts::new("doseloop_commands_total", "Commands by kind"),
            &["command"],
        )
        .expect("commands counter");
        let resets_total = IntCounter::with_opts(Opts::new("doseloop_resets_total", "Reset count"))
            .expect("resets counter");
        let training_complete_total = IntCounter::with_opts(Opts::new(
            "doseloop_training_complete_total",
            "Completed training runs",
        ))
        .expect("training complete counter");
        let episodes_completed = IntGauge::with_opts(Opts::new(
            "doseloop_episodes_completed",
            "Episodes completed in the current run",
        ))
        .expect("episodes gauge");
        let observers_connected = IntGauge::with_opts(Opts::new(
            "doseloop_observers_connected",
            "Connected WebSocket observers",
        ))
        .expect("observers gauge");
        let last_tick_ms = IntGauge::with_opts(Opts::new(
            "doseloop_last_tick_ms",
            "Last tick timestamp ms",
        ))
        .expect("tick gauge");

        registry
            .register(Box::new(ticks_total.clone()))
            .expect("reg ticks");
        registry
            .register(Box::new(commands_total.clone()))
            .expect("reg commands");
        registry
            .register(Box::new(resets_total.clone()))
            .expect("reg resets");
        registry
            .register(Box::new(training_complete_total.clone()))
            .expect("reg training complete");
        registry
            .register(Box::new(episodes_completed.clone()))
            .expect("reg episodes");
        registry
            .register(Box::new(observers_connected.clone()))
            .expect("reg observers");
        registry
            .register(Box::new(last_tick_ms.clone()))
            .expect("reg tick gauge");

        Self {
            registry,
            ticks_total,
            commands_total,
            resets_total,
            training_complete_total,
            episodes_completed,
            observers_connected,
            last_tick_ms,
        }
    }

    pub fn inc_tick(&self, now_ms: i64) {
        self.ticks_total.inc();
        self.last_tick_ms.set(now_ms);
    }

    pub fn inc_command(&self, command: &str) {
        self.commands_total.with_label_values(&[command]).inc();
    }

    pub fn inc_reset(&self) {
        self.resets_total.inc();
        self.episodes_completed.set(0);
    }

    pub fn inc_training_complete(&self) {
        self.training_complete_total.inc();
    }

    pub fn set_episodes_completed(&self, episodes: u32) {
        self.episodes_completed.set(episodes as i64);
    }

    pub fn observer_connected(&self) {
        self.observers_connected.inc();
    }

    pub fn observer_disconnected(&self) {
        self.observers_connected.dec();
    }

    /// Prometheus text exposition of all registered metrics.
    pub fn gather(&self) -> String {
        let mf = self.registry.gather();
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let _ = encoder.encode(&mf, &mut buf);
        String::from_utf8(buf).unwrap_or_default()
    }
}
