//! A path-prefix reverse proxy that advertises itself on the local network over SSDP.
//!
//! Requests for `/<prefix>/<rest>` are forwarded to the backend configured for `prefix`,
//! while an SSDP advertiser announces the proxy's location to devices on the network.
//! Both run until the shared [`shutdown::Shutdown`] signal fires.

pub mod config;
pub mod discovery;
pub mod proxy;
pub mod shutdown;
pub mod utils;
