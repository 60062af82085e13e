// src/scheduler.rs
//
// Fixed-interval ticker for the session runner.
//
// The ticker is a spawned task that enqueues one Tick message per period
// into the runner's channel. It carries the generation it was started
// under; the session ignores ticks from an older generation, which closes
// the race between a queued tick and a pause/reset that already ran.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::runner::SessionRequest;

/// Handle to a running tick task. Dropping it stops the ticking.
pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Start ticking into `tx` every `period`, tagged with `generation`.
    ///
    /// The first tick fires one full period after start, matching the
    /// recurring-interval semantics of the control surface.
    pub fn spawn(tx: mpsc::Sender<SessionRequest>, generation: u64, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() yields immediately on the first call; consume it.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                if tx.send(SessionRequest::Tick { generation }).await.is_err() {
                    break;
                }
            }
        });
        Self { handle }
    }

    /// Stop the tick task. Messages already queued are handled by the
    /// session's generation check, not here.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn ticker_emits_tagged_ticks() {
        let (tx, mut rx) = mpsc::channel(16);
        let ticker = Ticker::spawn(tx, 7, Duration::from_millis(1));

        for _ in 0..3 {
            let msg = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("tick within timeout")
                .expect("channel open");
            match msg {
                SessionRequest::Tick { generation } => assert_eq!(generation, 7),
                other => panic!("unexpected message: {other:?}"),
            }
        }

        ticker.abort();
    }

    #[tokio::test]
    async fn dropping_the_ticker_stops_ticks() {
        let (tx, mut rx) = mpsc::channel(16);
        let ticker = Ticker::spawn(tx, 0, Duration::from_millis(1));
        drop(ticker);

        // Drain anything enqueued before the abort landed, then the
        // channel must go quiet (sender dropped with the task).
        while let Ok(Some(_)) = timeout(Duration::from_millis(50), rx.recv()).await {}
        assert!(rx.try_recv().is_err());
    }
}
