//! Venue-L Client: persistent book subscription plus REST placement/account
//! queries for the directly-integrated backend venue.

use crate::book::BookStore;
use crate::config::VenueLConfig;
use crate::types::{Quote, Side, Venue};
use crate::venue_l::wire::{parse_inbound, Inbound, PingMessage, SubscribeRequest};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message as WsMessage;

#[derive(Debug, Error)]
pub enum VenueLError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("order rejected: {0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone)]
pub struct PlacementResult {
    pub order_index: Option<u64>,
}

/// Events surfaced from the venue-L stream to the coordinator, mirroring the
/// Bridge Server's `events_tx`/`BridgeEvent` pattern.
#[derive(Debug, Clone)]
pub enum VenueLEvent {
    OrderUpdate(crate::venue_l::wire::OrderUpdate),
}

/// Abstraction over the duplex stream transport so tests can substitute an
/// in-memory channel pair instead of a real socket.
#[async_trait::async_trait]
pub trait DuplexStream: Send {
    async fn send_text(&mut self, text: String) -> Result<(), VenueLError>;
    async fn recv_text(&mut self) -> Option<String>;
}

pub struct VenueLClient {
    cfg: VenueLConfig,
    http: reqwest::Client,
    book: Arc<BookStore>,
    events_tx: mpsc::Sender<VenueLEvent>,
    ws_connected: AtomicBool,
    order_book_ready: AtomicBool,
    reconnect_count: AtomicU32,
}

impl VenueLClient {
    /// Returns the client plus the receiving half of its event channel, the
    /// same construction shape as [`crate::bridge::BridgeServer::new`].
    pub fn new(
        cfg: VenueLConfig,
        http: reqwest::Client,
        book: Arc<BookStore>,
    ) -> (Self, mpsc::Receiver<VenueLEvent>) {
        let (events_tx, events_rx) = mpsc::channel(256);
        (
            Self {
                cfg,
                http,
                book,
                events_tx,
                ws_connected: AtomicBool::new(false),
                order_book_ready: AtomicBool::new(false),
                reconnect_count: AtomicU32::new(0),
            },
            events_rx,
        )
    }

    pub fn is_connected(&self) -> bool {
        self.ws_connected.load(Ordering::Relaxed) && self.order_book_ready.load(Ordering::Relaxed)
    }

    /// Drives the subscribe -> read -> reconnect loop for one connection
    /// attempt's lifetime. Callers wrap this in a reconnect loop (see
    /// [`Self::run`]); split out here so the backoff policy is independently
    /// testable from an in-memory `DuplexStream`.
    pub async fn handle_connection<S: DuplexStream>(
        &self,
        mut stream: S,
        mut shutdown: mpsc::Receiver<()>,
    ) -> Result<(), VenueLError> {
        let sub = SubscribeRequest::order_book(self.cfg.market_index);
        stream
            .send_text(serde_json::to_string(&sub).unwrap())
            .await?;
        self.ws_connected.store(true, Ordering::Relaxed);
        self.reconnect_count.store(0, Ordering::Relaxed);

        let mut heartbeat = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    self.ws_connected.store(false, Ordering::Relaxed);
                    return Ok(());
                }
                _ = heartbeat.tick() => {
                    let ping = serde_json::to_string(&PingMessage::default()).unwrap();
                    stream.send_text(ping).await?;
                }
                msg = stream.recv_text() => {
                    match msg {
                        Some(text) => self.handle_message(&text, &mut stream).await?,
                        None => {
                            self.ws_connected.store(false, Ordering::Relaxed);
                            return Err(VenueLError::Transport("stream closed".into()));
                        }
                    }
                }
            }
        }
    }

    async fn handle_message<S: DuplexStream>(
        &self,
        raw: &str,
        stream: &mut S,
    ) -> Result<(), VenueLError> {
        match parse_inbound(raw) {
            Inbound::Snapshot(payload) => {
                let bids = payload.bids.iter().map(|l| (l.price, l.size)).collect();
                let asks = payload.asks.iter().map(|l| (l.price, l.size)).collect();
                self.book.apply_snapshot(Venue::L, bids, asks);
                self.order_book_ready.store(true, Ordering::Relaxed);
            }
            Inbound::Diff(payload) => {
                let bids = payload.bids.iter().map(|l| (l.price, l.size)).collect();
                let asks = payload.asks.iter().map(|l| (l.price, l.size)).collect();
                self.book.apply_diff(Venue::L, bids, asks);
            }
            Inbound::OrderUpdate(update) => {
                if self
                    .events_tx
                    .send(VenueLEvent::OrderUpdate(update))
                    .await
                    .is_err()
                {
                    tracing::warn!("venue-L event receiver dropped, discarding order update");
                }
            }
            Inbound::Ping => {
                let pong = serde_json::to_string(&PingMessage::default()).unwrap();
                stream.send_text(pong).await?;
            }
            Inbound::Unknown => {
                tracing::debug!(raw, "ignoring unrecognized venue-L message shape");
            }
        }
        Ok(())
    }

    /// Exponential backoff in seconds for the nth reconnect attempt: `min(2^n, 30)`.
    pub fn backoff_secs(attempt: u32) -> u64 {
        2u64.saturating_pow(attempt).min(30)
    }

    pub async fn reconnect_delay(&self) {
        let attempt = self.reconnect_count.fetch_add(1, Ordering::Relaxed);
        sleep(Duration::from_secs(Self::backoff_secs(attempt))).await;
    }

    /// Connect-read-reconnect loop against the real venue-L stream. Runs
    /// until `shutdown` fires; each dropped connection triggers the
    /// exponential backoff before retrying.
    pub async fn run(self: &Arc<Self>, mut shutdown: mpsc::Receiver<()>) {
        loop {
            if shutdown.try_recv().is_ok() {
                return;
            }
            match tokio_tungstenite::connect_async(&self.cfg.ws_url).await {
                Ok((ws, _)) => {
                    tracing::info!(url = %self.cfg.ws_url, "connected to venue L stream");
                    let stream = WsDuplexStream { inner: ws };
                    let (_conn_shutdown_tx, conn_shutdown_rx) = mpsc::channel(1);
                    if let Err(err) = self.handle_connection(stream, conn_shutdown_rx).await {
                        tracing::warn!(error = %err, "venue L stream dropped");
                    }
                    self.order_book_ready.store(false, Ordering::Relaxed);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to connect to venue L stream");
                }
            }
            if shutdown.try_recv().is_ok() {
                return;
            }
            self.reconnect_delay().await;
        }
    }

    fn top_of_book(&self, venue: Venue) -> Option<Quote> {
        self.book.top(venue)
    }

    /// Place an aggressive order. If no price is supplied, derive one that
    /// guarantees immediacy through the configured slippage guard.
    pub async fn place_aggressive(
        &self,
        side: Side,
        quantity: Decimal,
        price: Option<Decimal>,
        slippage_pct: Decimal,
    ) -> Result<PlacementResult, VenueLError> {
        let price = match price {
            Some(p) => p,
            None => {
                let top = self
                    .top_of_book(Venue::L)
                    .ok_or_else(|| VenueLError::Rejected("no bid/ask price".to_string()))?;
                match side {
                    Side::Buy => top.ask * (Decimal::ONE + slippage_pct),
                    Side::Sell => top.bid * (Decimal::ONE - slippage_pct),
                }
            }
        };

        let size_units = (quantity * self.cfg.base_amount_multiplier)
            .round()
            .to_string();
        let price_units = (price * self.cfg.price_multiplier).round().to_string();

        let body = serde_json::json!({
            "market_index": self.cfg.market_index,
            "side": side.to_string(),
            "size": size_units,
            "price": price_units,
            "type": "limit",
        });

        let url = format!("{}/api/v1/order", self.cfg.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| VenueLError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(VenueLError::Rejected(format!("status {}", resp.status())));
        }
        let parsed: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VenueLError::MalformedResponse(e.to_string()))?;
        let order_index = parsed.get("order_index").and_then(|v| v.as_u64());
        Ok(PlacementResult { order_index })
    }

    /// Queries the account position. Any transport or parse failure is
    /// logged and yields zero rather than propagated, matching the source's
    /// blanket try/except around this call: callers treat a zero result as
    /// potentially stale, not necessarily flat.
    pub async fn get_position(&self) -> Decimal {
        match self.fetch_position().await {
            Ok(size) => size,
            Err(err) => {
                tracing::error!(error = %err, "failed to fetch venue-L position, treating as zero");
                Decimal::ZERO
            }
        }
    }

    async fn fetch_position(&self) -> Result<Decimal, VenueLError> {
        let url = format!(
            "{}/api/v1/account?by=index&value={}",
            self.cfg.base_url, self.cfg.account_index
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| VenueLError::Transport(e.to_string()))?;
        let parsed: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VenueLError::MalformedResponse(e.to_string()))?;

        let accounts = parsed
            .get("accounts")
            .and_then(|v| v.as_array())
            .ok_or_else(|| VenueLError::MalformedResponse("missing accounts[]".into()))?;
        let account = accounts
            .first()
            .ok_or_else(|| VenueLError::MalformedResponse("empty accounts[]".into()))?;
        let positions = account
            .get("positions")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        for p in positions {
            let market_index = p.get("market_index").and_then(|v| v.as_u64());
            if market_index == Some(self.cfg.market_index) {
                let size: Decimal = p
                    .get("size")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(Decimal::ZERO);
                let is_long = p.get("is_long").and_then(|v| v.as_bool()).unwrap_or(true);
                return Ok(if is_long { size } else { -size });
            }
        }
        Ok(Decimal::ZERO)
    }

    /// No-op if the position is already within dust tolerance, else places an
    /// opposite-side aggressive order for the full size.
    pub async fn flatten_position(&self, slippage_pct: Decimal) -> Result<(), VenueLError> {
        let pos = self.get_position().await;
        if pos.abs() < Decimal::new(1, 4) {
            return Ok(());
        }
        let side = if pos > Decimal::ZERO {
            Side::Sell
        } else {
            Side::Buy
        };
        self.place_aggressive(side, pos.abs(), None, slippage_pct)
            .await?;
        Ok(())
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Adapts a real websocket connection to the [`DuplexStream`] abstraction
/// `handle_connection` drives; non-text frames are swallowed, matching the
/// source's disregard for anything but JSON text messages.
struct WsDuplexStream {
    inner: WsStream,
}

#[async_trait::async_trait]
impl DuplexStream for WsDuplexStream {
    async fn send_text(&mut self, text: String) -> Result<(), VenueLError> {
        self.inner
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| VenueLError::Transport(e.to_string()))
    }

    async fn recv_text(&mut self) -> Option<String> {
        loop {
            match self.inner.next().await {
                Some(Ok(WsMessage::Text(text))) => return Some(text),
                Some(Ok(WsMessage::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(_)) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_thirty_seconds() {
        assert_eq!(VenueLClient::backoff_secs(0), 1);
        assert_eq!(VenueLClient::backoff_secs(1), 2);
        assert_eq!(VenueLClient::backoff_secs(5), 30);
        assert_eq!(VenueLClient::backoff_secs(10), 30);
    }
}
