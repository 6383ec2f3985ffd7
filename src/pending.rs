//! Pending order bookkeeping shared by the Coordinator.

use crate::signal::Signal;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    Pending,
    Placed,
    Filled,
    Canceled,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub signal: Signal,
    pub status: PendingStatus,
    pub issued_at: DateTime<Utc>,
    pub f_order_id: Option<String>,
}

impl PendingOrder {
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            status: PendingStatus::Pending,
            issued_at: Utc::now(),
            f_order_id: None,
        }
    }
}
