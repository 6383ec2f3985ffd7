//! Front-end bridge: local TCP server speaking newline-delimited JSON.

pub mod server;
pub mod wire;

pub use server::{BridgeError, BridgeEvent, BridgeServer, HandlerFn};
