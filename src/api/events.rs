//! Real-time event stream for dashboard clients
//!
//! WebSocket fan-out of payment events. Each frame is one self-contained
//! JSON event; clients never need a follow-up query to render it.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::AppState;
use crate::events::PaymentEvent;

pub async fn subscribe(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let receiver = state.notifier.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, receiver))
}

async fn stream_events(mut socket: WebSocket, mut receiver: broadcast::Receiver<PaymentEvent>) {
    debug!("Dashboard client connected to event stream");
    loop {
        match receiver.recv().await {
            Ok(event) => {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!("Failed to serialize payment event: {}", err);
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event subscriber lagged, {} events dropped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!("Dashboard client disconnected from event stream");
}
