//! Telemetry Relay
//!
//! A local relay that receives device readings over an in-process bus,
//! suppresses readings that have not materially changed, and forwards the
//! rest to a remote HTTP ingestion endpoint.

pub mod bus;
pub mod config;
pub mod filter;
pub mod forward;
pub mod reading;
pub mod relay;
pub mod sampler;
pub mod time;
