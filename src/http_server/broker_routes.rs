//! Broker WebSocket Route
//!
//! `GET /broker` upgrades to a WebSocket that streams every change event as
//! a JSON text frame. The subscription is registered before the upgrade
//! completes, so nothing published after the handshake is missed.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::realtime::{Broker, Subscriber};

/// Create the broker route
pub fn broker_routes(broker: Broker) -> Router {
    Router::new()
        .route("/broker", get(broker_handler))
        .with_state(broker)
}

async fn broker_handler(ws: WebSocketUpgrade, State(broker): State<Broker>) -> impl IntoResponse {
    let subscriber = broker.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, subscriber))
}

/// Forward events until either side goes away
async fn stream_events(socket: WebSocket, mut subscriber: Subscriber) {
    let id = subscriber.id();
    debug!(subscriber = id, "broker websocket connected");
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = subscriber.recv() => {
                let Some(event) = event else {
                    let (code, reason) = if subscriber.was_evicted() {
                        (close_code::POLICY, "subscriber fell behind")
                    } else {
                        (close_code::AWAY, "broker closed")
                    };
                    let frame = CloseFrame { code, reason: reason.into() };
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    break;
                };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "unable to encode event");
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    let _ = sender.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    }

    debug!(subscriber = id, "broker websocket disconnected");
}
