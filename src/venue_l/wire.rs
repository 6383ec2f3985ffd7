//! Venue-L stream message shapes.
//!
//! Messages are discriminated by which keys are present, not by a single
//! `type` tag, so we parse into a raw `serde_json::Value` first and peek at
//! the discriminating fields before picking a variant.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct BookLevel {
    #[serde(deserialize_with = "crate::venue_l::wire::decimal_from_any")]
    pub price: Decimal,
    #[serde(deserialize_with = "crate::venue_l::wire::decimal_from_any")]
    pub size: Decimal,
}

pub fn decimal_from_any<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .as_f64()
            .and_then(|f| Decimal::try_from(f).ok())
            .ok_or_else(|| serde::de::Error::custom("invalid numeric price/size")),
        other => Err(serde::de::Error::custom(format!("unexpected value {other}"))),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookSnapshot {
    pub order_book: OrderBookPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookPayload {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookUpdate {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderUpdate {
    pub market_index: u64,
    pub side: String,
    pub status: String,
    pub filled_size: Option<String>,
}

/// The subscription message actually sent on connect. Two other shapes are
/// declared in the source this was ported from but never exercised there, so
/// no fallback ladder is implemented here.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub method: &'static str,
    pub params: Vec<String>,
}

impl SubscribeRequest {
    pub fn order_book(market_index: u64) -> Self {
        Self {
            method: "subscribe",
            params: vec![format!("order_book/{market_index}")],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PingMessage {
    pub method: &'static str,
}

impl Default for PingMessage {
    fn default() -> Self {
        Self { method: "ping" }
    }
}

/// A parsed inbound message, tagged by the shape-sniffing rule above.
#[derive(Debug, Clone)]
pub enum Inbound {
    Snapshot(OrderBookPayload),
    Diff(OrderBookUpdate),
    OrderUpdate(OrderUpdate),
    Ping,
    Unknown,
}

pub fn parse_inbound(raw: &str) -> Inbound {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return Inbound::Unknown,
    };

    if value.get("order_book").is_some() {
        if let Ok(snapshot) = serde_json::from_value::<OrderBookSnapshot>(value.clone()) {
            return Inbound::Snapshot(snapshot.order_book);
        }
    }

    let type_field = value.get("type").and_then(Value::as_str);
    let method_field = value.get("method").and_then(Value::as_str);

    if type_field == Some("order_book_update") {
        if let Ok(diff) = serde_json::from_value::<OrderBookUpdate>(value.clone()) {
            return Inbound::Diff(diff);
        }
    }

    if type_field == Some("order_update") {
        if let Ok(update) = serde_json::from_value::<OrderUpdate>(value.clone()) {
            return Inbound::OrderUpdate(update);
        }
    }

    if type_field == Some("ping") || method_field == Some("ping") {
        return Inbound::Ping;
    }

    Inbound::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_snapshot_by_order_book_key() {
        let raw = r#"{"order_book": {"bids": [{"price": "100.0", "size": "1"}], "asks": []}}"#;
        assert!(matches!(parse_inbound(raw), Inbound::Snapshot(_)));
    }

    #[test]
    fn recognizes_ping_by_method_or_type() {
        assert!(matches!(parse_inbound(r#"{"method":"ping"}"#), Inbound::Ping));
        assert!(matches!(parse_inbound(r#"{"type":"ping"}"#), Inbound::Ping));
    }

    #[test]
    fn unknown_shape_is_ignored_not_an_error() {
        assert!(matches!(
            parse_inbound(r#"{"weird":"shape"}"#),
            Inbound::Unknown
        ));
    }
}
