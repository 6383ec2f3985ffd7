//! Front-end Bridge Server: a single-client, newline-delimited JSON server
//! over local TCP. Library-level transport framing only; application-level
//! `ping`/`pong` carries the liveness signal (there is no websocket keepalive
//! to disable here since the transport is raw TCP).

use crate::bridge::wire::{
    CancelOrder, EmergencyClose, ExecuteOrder, FrontendReady, InboundEnvelope, MarketData,
    OutboundEnvelope, OrderPlaced, OrderUpdate,
};
use chrono::Utc;
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Inbound events surfaced to the coordinator.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    FrontendReady(FrontendReady),
    MarketData(MarketData),
    OrderPlaced(OrderPlaced),
    OrderUpdate(OrderUpdate),
    Disconnected,
}

struct ClientHandle {
    outbound_tx: mpsc::Sender<String>,
    ready: bool,
}

/// A registered handler for a `type` not otherwise recognized by the fixed
/// dispatch table. Takes the message's `data` payload and returns either a
/// result value or an error string; both are echoed back tagged with the
/// request's own `requestId`, same as the original's `register_handler`.
pub type HandlerFn =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, String>> + Send + Sync>;

/// Accepts exactly one front-end connection at a time (a new connection
/// replaces any prior one) and dispatches inbound messages to the coordinator
/// over `events_rx`.
pub struct BridgeServer {
    client: Arc<Mutex<Option<ClientHandle>>>,
    events_tx: mpsc::Sender<BridgeEvent>,
    handlers: Arc<parking_lot::Mutex<HashMap<String, HandlerFn>>>,
}

impl BridgeServer {
    pub fn new() -> (Self, mpsc::Receiver<BridgeEvent>) {
        let (events_tx, events_rx) = mpsc::channel(256);
        (
            Self {
                client: Arc::new(Mutex::new(None)),
                events_tx,
                handlers: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            },
            events_rx,
        )
    }

    /// Register a handler for an otherwise-unrecognized inbound `type`.
    pub fn register_handler(&self, msg_type: impl Into<String>, handler: HandlerFn) {
        self.handlers.lock().insert(msg_type.into(), handler);
    }

    pub async fn serve(&self, host: &str, port: u16) -> Result<(), BridgeError> {
        let listener = TcpListener::bind((host, port)).await?;
        tracing::info!(host, port, "bridge server listening");
        loop {
            let (socket, addr) = listener.accept().await?;
            tracing::info!(%addr, "front-end connected");
            let client = self.client.clone();
            let events_tx = self.events_tx.clone();
            let handlers = self.handlers.clone();
            tokio::spawn(async move {
                if let Err(err) = Self::handle_connection(socket, client, events_tx, handlers).await {
                    tracing::warn!(error = %err, "bridge connection ended with error");
                }
            });
        }
    }

    async fn handle_connection(
        socket: TcpStream,
        client: Arc<Mutex<Option<ClientHandle>>>,
        events_tx: mpsc::Sender<BridgeEvent>,
        handlers: Arc<parking_lot::Mutex<HashMap<String, HandlerFn>>>,
    ) -> Result<(), BridgeError> {
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half).lines();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(256);
        {
            let mut guard = client.lock().await;
            *guard = Some(ClientHandle {
                outbound_tx: outbound_tx.clone(),
                ready: false,
            });
        }

        let welcome = OutboundEnvelope::new("welcome", "connected").to_line();
        write_half.write_all(welcome.as_bytes()).await?;

        let writer_task = tokio::spawn(async move {
            while let Some(line) = outbound_rx.recv().await {
                if write_half.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        loop {
            match reader.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    Self::dispatch(&line, &client, &events_tx, &handlers).await;
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "bridge read error");
                    break;
                }
            }
        }

        let was_ready = client
            .lock()
            .await
            .take()
            .map(|h| h.ready)
            .unwrap_or(false);
        writer_task.abort();
        if was_ready {
            let _ = events_tx.send(BridgeEvent::Disconnected).await;
        }
        Ok(())
    }

    async fn dispatch(
        line: &str,
        client: &Arc<Mutex<Option<ClientHandle>>>,
        events_tx: &mpsc::Sender<BridgeEvent>,
        handlers: &Arc<parking_lot::Mutex<HashMap<String, HandlerFn>>>,
    ) {
        let envelope: InboundEnvelope = match serde_json::from_str(line) {
            Ok(e) => e,
            Err(err) => {
                tracing::debug!(error = %err, line, "ignoring malformed bridge message");
                return;
            }
        };

        match envelope.msg_type.as_str() {
            "ping" => {
                if let Some(handle) = client.lock().await.as_ref() {
                    let pong = OutboundEnvelope::new("pong", envelope.timestamp).to_line();
                    let _ = handle.outbound_tx.send(pong).await;
                }
            }
            "frontend_ready" => {
                if let Ok(ready) = serde_json::from_value::<FrontendReady>(envelope.data) {
                    if let Some(handle) = client.lock().await.as_mut() {
                        handle.ready = true;
                    }
                    let _ = events_tx.send(BridgeEvent::FrontendReady(ready)).await;
                }
            }
            "edgex_market_data" => {
                if let Ok(md) = serde_json::from_value::<MarketData>(envelope.data) {
                    let _ = events_tx.send(BridgeEvent::MarketData(md)).await;
                }
            }
            "order_placed" => {
                if let Ok(placed) = serde_json::from_value::<OrderPlaced>(envelope.data) {
                    let _ = events_tx.send(BridgeEvent::OrderPlaced(placed)).await;
                }
            }
            "order_update" => {
                if let Ok(update) = serde_json::from_value::<OrderUpdate>(envelope.data) {
                    let _ = events_tx.send(BridgeEvent::OrderUpdate(update)).await;
                }
            }
            "order_canceled" | "status_report" => {
                tracing::debug!(msg_type = envelope.msg_type.as_str(), "bridge notice");
            }
            other => {
                let handler = handlers.lock().get(other).cloned();
                match handler {
                    Some(handler) => {
                        let request_id = envelope.request_id.clone();
                        let result = handler(envelope.data).await;
                        if let Some(request_id) = request_id {
                            let reply = match result {
                                Ok(data) => serde_json::json!({ "requestId": request_id, "data": data }),
                                Err(err) => serde_json::json!({ "requestId": request_id, "error": err }),
                            };
                            if let Some(handle) = client.lock().await.as_ref() {
                                let mut line = reply.to_string();
                                line.push('\n');
                                let _ = handle.outbound_tx.send(line).await;
                            }
                        }
                    }
                    None => {
                        tracing::warn!(msg_type = other, "unrecognized bridge message type");
                    }
                }
            }
        }
    }

    async fn send(&self, line: String) {
        if let Some(handle) = self.client.lock().await.as_ref() {
            let _ = handle.outbound_tx.send(line).await;
        }
    }

    pub async fn execute_order(&self, side: &str, quantity: Decimal, price: Decimal, client_order_id: &str) {
        let cmd = ExecuteOrder {
            side: side.to_string(),
            quantity,
            price,
            client_order_id: client_order_id.to_string(),
        };
        self.send(OutboundEnvelope::new("execute_order", cmd).to_line()).await;
    }

    pub async fn cancel_order(&self, order_id: &str) {
        let cmd = CancelOrder {
            order_id: order_id.to_string(),
        };
        self.send(OutboundEnvelope::new("cancel_order", cmd).to_line()).await;
    }

    pub async fn emergency_close(&self, side: &str, quantity: Decimal) {
        let cmd = EmergencyClose {
            side: side.to_string(),
            quantity,
        };
        self.send(OutboundEnvelope::new("emergency_close", cmd).to_line()).await;
    }

    pub async fn query_status(&self) {
        self.send(OutboundEnvelope::new("query_status", Utc::now().timestamp_millis()).to_line())
            .await;
    }
}
