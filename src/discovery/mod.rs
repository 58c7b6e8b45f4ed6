// Discovery module
//
// Makes the proxy findable on the local network over SSDP.
// - ssdp: wire messages and the UDP advertisement session
// - advertiser: the alive/bye lifecycle driven by the shutdown signal

pub mod advertiser;
pub mod ssdp;

pub use advertiser::{Announcer, run_advertiser};
pub use ssdp::{AdvertiseOptions, SsdpAdvertiser};

use crate::shutdown::ShutdownListener;
use anyhow::{Context, Result};
use log::warn;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tokio::task::JoinHandle;

/// Open the SSDP session and run the advertiser in the background.
/// Failing to open the session is returned as an error.
pub async fn start_discovery(options: AdvertiseOptions, shutdown: ShutdownListener) -> Result<JoinHandle<()>> {
    if let Some(interval) = options.alive_interval.filter(|i| i.as_secs() >= u64::from(options.max_age)) {
        warn!(
            "SSDP alive interval ({}s) is not shorter than max-age ({}s), clients may drop the proxy between announcements",
            interval.as_secs(),
            options.max_age
        );
    }
    let alive_interval = options.alive_interval;
    let advertiser = SsdpAdvertiser::open(options).await.context("Failed to start SSDP advertisement")?;
    Ok(tokio::spawn(run_advertiser(advertiser, alive_interval, shutdown)))
}

/// `http://<primary IPv4>:<port>/`, with loopback when no interface can be determined
pub fn default_location(port: u16) -> String {
    let ip = primary_ipv4().unwrap_or(Ipv4Addr::LOCALHOST);
    format!("http://{}:{}/", ip, port)
}

/// SERVER header value in the usual `OS/version UPnP/1.1 product/version` shape
pub fn default_server_header() -> String {
    format!(
        "{}/{} UPnP/1.1 {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

// Address of the interface that would carry SSDP multicast traffic. No packet is sent.
fn primary_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((ssdp::SSDP_MULTICAST_ADDR, ssdp::SSDP_PORT)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}
