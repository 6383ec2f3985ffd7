//! Front-end bridge wire protocol: newline-delimited JSON over a local TCP
//! socket. See module docs on [`super::server::BridgeServer`] for the
//! dispatch table.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundEnvelope<T: Serialize> {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub data: T,
    pub timestamp: i64,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl<T: Serialize> OutboundEnvelope<T> {
    pub fn new(msg_type: &'static str, data: T) -> Self {
        Self {
            msg_type,
            data,
            timestamp: Utc::now().timestamp_millis(),
            request_id: None,
        }
    }

    pub fn to_line(&self) -> String {
        let mut s = serde_json::to_string(self).unwrap_or_default();
        s.push('\n');
        s
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteOrder {
    pub side: String,
    pub quantity: Decimal,
    pub price: Decimal,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOrder {
    #[serde(rename = "orderId")]
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyClose {
    pub side: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendReady {
    pub exchange: String,
    pub ticker: Option<String>,
    #[serde(rename = "contractId")]
    pub contract_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketData {
    #[serde(rename = "bestBid")]
    pub best_bid: Decimal,
    #[serde(rename = "bestAsk")]
    pub best_ask: Decimal,
    #[serde(rename = "bidSize", default)]
    pub bid_size: Option<Decimal>,
    #[serde(rename = "askSize", default)]
    pub ask_size: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderPlaced {
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    pub success: bool,
    #[serde(rename = "orderId", default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub latency: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Placed,
    Filled,
    Canceled,
    Rejected,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderUpdate {
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    pub status: OrderStatus,
    #[serde(rename = "filledSize", default)]
    pub filled_size: Option<Decimal>,
    pub side: Option<String>,
    pub price: Option<Decimal>,
}
