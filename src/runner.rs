// src/runner.rs
//
// Single-owner actor loop around the session.
//
// All mutation funnels through one mpsc channel: control commands, the
// synchronous request/response surface, and scheduler ticks. The loop
// processes one message to completion (including broadcasts) before the
// next, which gives every handler the atomicity the session relies on.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::config::{Config, Hyperparams, PartialHyperparams};
use crate::events::{Event, StatusSnapshot};
use crate::logging::EventSink;
use crate::metrics::EngineMetrics;
use crate::scheduler::Ticker;
use crate::session::{Session, TickOutcome};

/// Message processed by the session runner.
#[derive(Debug)]
pub enum SessionRequest {
    Start,
    Pause,
    Reset,
    SetParams {
        params: Value,
        /// When present, receives the full post-merge hyperparameter set
        /// for a unicast paramsUpdated acknowledgement.
        reply: Option<oneshot::Sender<Hyperparams>>,
    },
    /// One-time snapshot for a newly connected observer.
    InitSnapshot { reply: oneshot::Sender<Event> },
    /// Synchronous status query.
    Status { reply: oneshot::Sender<StatusSnapshot> },
    /// Scheduler tick, tagged with the generation it was scheduled under.
    Tick { generation: u64 },
}

pub struct SessionRunner {
    session: Session,
    rx: mpsc::Receiver<SessionRequest>,
    /// Kept for handing to tickers.
    tx: mpsc::Sender<SessionRequest>,
    sink: Box<dyn EventSink + Send>,
    metrics: EngineMetrics,
    tick_interval: Duration,
    ticker: Option<Ticker>,
}

impl SessionRunner {
    /// Build the runner and the sender used by transports to reach it.
    pub fn new(
        cfg: Config,
        seed: Option<u64>,
        sink: Box<dyn EventSink + Send>,
        metrics: EngineMetrics,
    ) -> (Self, mpsc::Sender<SessionRequest>) {
        let tick_interval = Duration::from_millis(cfg.engine.tick_interval_ms.max(1));
        let session = Session::new(cfg, seed);
        let (tx, rx) = mpsc::channel(64);

        let runner = Self {
            session,
            rx,
            tx: tx.clone(),
            sink,
            metrics,
            tick_interval,
            ticker: None,
        };
        (runner, tx)
    }

    /// Drive the actor loop until every sender is gone.
    pub async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            self.handle(request);
        }
    }

    fn handle(&mut self, request: SessionRequest) {
        match request {
            SessionRequest::Start => {
                self.metrics.inc_command("start");
                if self.session.start(self.sink.as_mut()) {
                    self.spawn_ticker();
                }
            }

            SessionRequest::Pause => {
                self.metrics.inc_command("pause");
                self.stop_ticker();
                self.session.pause(self.sink.as_mut());
            }

            SessionRequest::Reset => {
                self.metrics.inc_command("reset");
                // Stop the ticker before touching state; the generation
                // bump inside reset covers anything already queued.
                self.stop_ticker();
                self.session.reset(self.sink.as_mut());
                self.metrics.inc_reset();
            }

            SessionRequest::SetParams { params, reply } => {
                self.metrics.inc_command("setParams");
                let partial = PartialHyperparams::from_value(&params);
                let hyper = self.session.set_params(&partial);
                if let Some(reply) = reply {
                    let _ = reply.send(hyper);
                }
            }

            SessionRequest::InitSnapshot { reply } => {
                let _ = reply.send(self.session.init_snapshot());
            }

            SessionRequest::Status { reply } => {
                let _ = reply.send(self.session.status());
            }

            SessionRequest::Tick { generation } => {
                match self.session.on_tick(generation, self.sink.as_mut()) {
                    TickOutcome::Stepped => {
                        self.metrics.inc_tick(now_ms());
                        self.metrics
                            .set_episodes_completed(self.session.status().current_episode);
                    }
                    TickOutcome::Completed => {
                        self.stop_ticker();
                        self.metrics.inc_training_complete();
                    }
                    TickOutcome::Stale => {}
                }
            }
        }
    }

    fn spawn_ticker(&mut self) {
        self.ticker = Some(Ticker::spawn(
            self.tx.clone(),
            self.session.generation(),
            self.tick_interval,
        ));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::BroadcastSink;
    use tokio::sync::broadcast;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Event {
        loop {
            match timeout(WAIT, rx.recv()).await.expect("event within timeout") {
                Ok(event) => return event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("broadcast closed"),
            }
        }
    }

    #[tokio::test]
    async fn start_ticks_and_pause_stops() {
        let (btx, mut brx) = broadcast::channel(1024);
        let mut cfg = Config::default();
        cfg.engine.tick_interval_ms = 1;

        let (runner, tx) = SessionRunner::new(
            cfg,
            Some(1),
            Box::new(BroadcastSink::new(btx)),
            EngineMetrics::new(),
        );
        tokio::spawn(runner.run());

        tx.send(SessionRequest::Start).await.expect("send start");
        assert_eq!(next_event(&mut brx).await, Event::Started);

        // The ticker must produce update events on its own.
        loop {
            if let Event::Update(_) = next_event(&mut brx).await {
                break;
            }
        }

        let (reply, rx) = oneshot::channel();
        tx.send(SessionRequest::Status { reply }).await.expect("send status");
        let status = rx.await.expect("status reply");
        assert!(status.running);

        tx.send(SessionRequest::Pause).await.expect("send pause");
        loop {
            if next_event(&mut brx).await == Event::Paused {
                break;
            }
        }

        let (reply, rx) = oneshot::channel();
        tx.send(SessionRequest::Status { reply }).await.expect("send status");
        assert!(!rx.await.expect("status reply").running);
    }

    #[tokio::test]
    async fn set_params_replies_with_full_set() {
        let (btx, _brx) = broadcast::channel(64);
        let (runner, tx) = SessionRunner::new(
            Config::default(),
            Some(2),
            Box::new(BroadcastSink::new(btx)),
            EngineMetrics::new(),
        );
        tokio::spawn(runner.run());

        let (reply, rx) = oneshot::channel();
        tx.send(SessionRequest::SetParams {
            params: serde_json::json!({"ALPHA": 0.7, "bogus": true}),
            reply: Some(reply),
        })
        .await
        .expect("send setParams");

        let hyper = rx.await.expect("params reply");
        assert_eq!(hyper.alpha, 0.7);
        assert_eq!(hyper.gamma, 0.9);
    }

    #[tokio::test]
    async fn init_snapshot_reflects_session_state() {
        let (btx, _brx) = broadcast::channel(64);
        let (runner, tx) = SessionRunner::new(
            Config::default(),
            Some(3),
            Box::new(BroadcastSink::new(btx)),
            EngineMetrics::new(),
        );
        tokio::spawn(runner.run());

        let (reply, rx) = oneshot::channel();
        tx.send(SessionRequest::InitSnapshot { reply })
            .await
            .expect("send init");
        match rx.await.expect("init reply") {
            Event::Init(init) => {
                assert_eq!(init.current_episode, 0);
                assert!(init.rewards.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
