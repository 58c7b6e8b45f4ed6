// Proxy module
//
// - http_server: binding, serving and draining the HTTP listener
// - request_handler: prefix routing and dispatch
// - cache: lazily built forwarding handlers, one per prefix
// - forwarder: relaying a request to a single backend target

pub mod cache;
pub mod forwarder;
pub mod http_server;
pub mod request_handler;

pub use http_server::{ProxyServer, SHUTDOWN_GRACE_PERIOD, start_rp_server};
pub use request_handler::ProxyRouter;
