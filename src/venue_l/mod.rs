//! Venue-L integration: direct-backend stream subscription and REST client.

pub mod client;
pub mod wire;

pub use client::{DuplexStream, PlacementResult, VenueLClient, VenueLError, VenueLEvent};
