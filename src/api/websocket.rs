//! WebSocket handler for the AAC message protocol
//!
//! Each inbound frame is dispatched on its own task so a slow external call
//! never holds up the socket. The reader queues the task handles in arrival
//! order and the writer awaits them in that order, so responses go out in
//! request order without interleaving.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::ApiState;
use crate::protocol::{ERROR_REQUEST_TYPE, ErrorCode, Response};
use crate::router::EventRouter;

/// In-flight frames per connection before the reader stops pulling
const MAX_PENDING: usize = 32;

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ws", get(ws_upgrade)).with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let router = state.router.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, router))
}

/// A dispatched frame; aborted if dropped before completion
struct Pending(JoinHandle<Response>);

impl Pending {
    async fn response(mut self) -> Response {
        match (&mut self.0).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "dispatch task failed");
                Response::error(
                    ERROR_REQUEST_TYPE,
                    ErrorCode::InternalError,
                    "request handling failed",
                )
            }
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, router: EventRouter) {
    let connection_id = uuid::Uuid::new_v4().simple().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Pending>(MAX_PENDING);

    tracing::info!(connection_id = %connection_id, "WebSocket connected");

    // Forward responses in arrival order
    let mut send_task = tokio::spawn(async move {
        while let Some(pending) = rx.recv().await {
            let response = pending.response().await;
            match serde_json::to_string(&response) {
                Ok(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to serialize response"),
            }
        }
    });

    let conn_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let router = router.clone();
                    let frame = text.as_str().to_owned();
                    let handle = tokio::spawn(async move { router.dispatch(&frame).await });
                    if tx.send(Pending(handle)).await.is_err() {
                        break;
                    }
                }
                Message::Binary(data) => {
                    tracing::warn!(
                        connection_id = %conn_id,
                        len = data.len(),
                        "ignoring binary frame"
                    );
                }
                Message::Close(_) => {
                    tracing::info!(connection_id = %conn_id, "WebSocket closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    // Either side finishing ends the connection; dropping the queue aborts in-flight work
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(connection_id = %connection_id, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_dropped_pending_is_aborted() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
            Response::error(ERROR_REQUEST_TYPE, ErrorCode::InternalError, "late")
        });

        drop(Pending(handle));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_pending_resolves_in_queue_order() {
        let (tx, mut rx) = mpsc::channel::<Pending>(MAX_PENDING);
        for (i, delay) in [30u64, 0, 10].into_iter().enumerate() {
            let handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Response::error(i.to_string(), ErrorCode::InternalError, "")
            });
            tx.send(Pending(handle)).await.unwrap();
        }
        drop(tx);

        let mut order = Vec::new();
        while let Some(pending) = rx.recv().await {
            order.push(pending.response().await.request_type);
        }
        assert_eq!(order, ["0", "1", "2"]);
    }

    #[tokio::test]
    async fn test_panicked_dispatch_still_answers() {
        let handle: JoinHandle<Response> = tokio::spawn(async { panic!("handler bug") });
        let response = Pending(handle).response().await;
        assert_eq!(response.error.unwrap().code, ErrorCode::InternalError);
    }
}
