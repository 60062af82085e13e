//! WebSocket observer surface.
//!
//! Each connection gets a one-time init snapshot, then a forwarded copy of
//! every broadcast event. Inbound frames are control commands; malformed
//! frames are logged and ignored. `paramsUpdated` acknowledgements go only
//! to the socket that sent the setParams command.

use anyhow::Result;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

use crate::events::{Command, Event};
use crate::metrics::EngineMetrics;
use crate::runner::SessionRequest;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Accept observer connections forever.
pub async fn run_ws_server(
    addr: String,
    session_tx: mpsc::Sender<SessionRequest>,
    events: broadcast::Sender<Event>,
    metrics: EngineMetrics,
) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    println!("doseloop observer endpoint listening on ws://{addr}");

    loop {
        let (stream, peer) = listener.accept().await?;
        let session_tx = session_tx.clone();
        let events_rx = events.subscribe();
        let metrics = metrics.clone();

        tokio::spawn(async move {
            metrics.observer_connected();
            println!("observer connected: {peer}");
            // A dropped observer never affects the session; the engine
            // keeps running headless.
            match handle_observer(stream, session_tx, events_rx).await {
                Ok(()) => println!("observer disconnected: {peer}"),
                Err(err) => eprintln!("observer {peer} closed with error: {err}"),
            }
            metrics.observer_disconnected();
        });
    }
}

async fn handle_observer(
    stream: TcpStream,
    session_tx: mpsc::Sender<SessionRequest>,
    mut events_rx: broadcast::Receiver<Event>,
) -> Result<()> {
    let ws = accept_async(stream).await?;
    let (mut write, mut read) = ws.split();

    // One-time snapshot so a late joiner can rebuild chart/log state from
    // this plus the subsequent event stream.
    let (reply, init_rx) = oneshot::channel();
    send_request(&session_tx, SessionRequest::InitSnapshot { reply }).await?;
    let init = init_rx.await?;
    send_event(&mut write, &init).await?;

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Ok(event) => send_event(&mut write, &event).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Slow observer: missed events are dropped, delivery is
                    // at-most-current-state.
                    eprintln!("observer lagging, dropped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    dispatch_command(&text, &session_tx, &mut write).await?;
                }
                Some(Ok(Message::Ping(payload))) => {
                    write.send(Message::Pong(payload)).await?;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
            },
        }
    }

    Ok(())
}

async fn dispatch_command(
    text: &str,
    session_tx: &mpsc::Sender<SessionRequest>,
    write: &mut WsSink,
) -> Result<()> {
    let command: Command = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("ignoring malformed command: {err}");
            return Ok(());
        }
    };

    match command {
        Command::Start => send_request(session_tx, SessionRequest::Start).await,
        Command::Pause => send_request(session_tx, SessionRequest::Pause).await,
        Command::Reset => send_request(session_tx, SessionRequest::Reset).await,
        Command::SetParams { params } => {
            let (reply, reply_rx) = oneshot::channel();
            send_request(
                session_tx,
                SessionRequest::SetParams {
                    params,
                    reply: Some(reply),
                },
            )
            .await?;

            // Unicast acknowledgement with the full current set.
            if let Ok(hyper) = reply_rx.await {
                send_event(write, &Event::ParamsUpdated(hyper)).await?;
            }
            Ok(())
        }
    }
}

async fn send_event(write: &mut WsSink, event: &Event) -> Result<()> {
    let text = serde_json::to_string(event)?;
    write.send(Message::Text(text)).await?;
    Ok(())
}

async fn send_request(
    tx: &mpsc::Sender<SessionRequest>,
    request: SessionRequest,
) -> Result<()> {
    tx.send(request)
        .await
        .map_err(|_| anyhow::anyhow!("session runner channel closed"))
}
