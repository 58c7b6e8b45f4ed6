//! SSDP advertisement: NOTIFY alive/byebye messages and M-SEARCH answers.

use crate::discovery::advertiser::Announcer;
use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const SSDP_PORT: u16 = 1900;
pub const DEFAULT_SERVICE_TYPE: &str = "urn:SmartThingsCommunity:device:GenericProxy:1";
pub const DEFAULT_USN: &str = "uuid:de8a5619-2603-40d1-9e21-1967952d7f86";
pub const DEFAULT_MAX_AGE: u32 = 1800;
pub const DEFAULT_ALIVE_INTERVAL_SECS: i64 = 10;

const MULTICAST_TTL: u32 = 2;
const SEARCH_ALL: &str = "ssdp:all";
const DISCOVER_MAN: &str = "\"ssdp:discover\"";

/// What gets advertised, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertiseOptions {
    pub service_type: String,
    pub usn: String,
    pub location: String,
    pub server: String,
    pub max_age: u32,
    /// None disables periodic alive messages
    pub alive_interval: Option<Duration>,
    /// Destination of NOTIFY messages, the SSDP multicast group unless overridden
    pub notify_addr: SocketAddr,
    /// Listen on the SSDP port and answer matching M-SEARCH queries
    pub answer_searches: bool,
}

impl AdvertiseOptions {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            usn: DEFAULT_USN.to_string(),
            location: location.into(),
            server: String::new(),
            max_age: DEFAULT_MAX_AGE,
            alive_interval: alive_interval_from_secs(DEFAULT_ALIVE_INTERVAL_SECS),
            notify_addr: SocketAddr::from((SSDP_MULTICAST_ADDR, SSDP_PORT)),
            answer_searches: true,
        }
    }
}

/// Non-positive intervals disable the periodic heartbeat
pub fn alive_interval_from_secs(secs: i64) -> Option<Duration> {
    u64::try_from(secs).ok().filter(|s| *s > 0).map(Duration::from_secs)
}

fn push_header(msg: &mut String, name: &str, value: &str) {
    msg.push_str(name);
    msg.push_str(": ");
    msg.push_str(value);
    msg.push_str("\r\n");
}

fn multicast_host() -> String {
    format!("{}:{}", SSDP_MULTICAST_ADDR, SSDP_PORT)
}

pub fn alive_message(options: &AdvertiseOptions) -> String {
    let mut msg = String::from("NOTIFY * HTTP/1.1\r\n");
    push_header(&mut msg, "HOST", &multicast_host());
    push_header(&mut msg, "NT", &options.service_type);
    push_header(&mut msg, "NTS", "ssdp:alive");
    push_header(&mut msg, "USN", &options.usn);
    push_header(&mut msg, "LOCATION", &options.location);
    if !options.server.is_empty() {
        push_header(&mut msg, "SERVER", &options.server);
    }
    push_header(&mut msg, "CACHE-CONTROL", &format!("max-age={}", options.max_age));
    msg.push_str("\r\n");
    msg
}

pub fn bye_message(options: &AdvertiseOptions) -> String {
    let mut msg = String::from("NOTIFY * HTTP/1.1\r\n");
    push_header(&mut msg, "HOST", &multicast_host());
    push_header(&mut msg, "NT", &options.service_type);
    push_header(&mut msg, "NTS", "ssdp:byebye");
    push_header(&mut msg, "USN", &options.usn);
    msg.push_str("\r\n");
    msg
}

pub fn search_response(options: &AdvertiseOptions) -> String {
    let mut msg = String::from("HTTP/1.1 200 OK\r\n");
    push_header(&mut msg, "CACHE-CONTROL", &format!("max-age={}", options.max_age));
    push_header(&mut msg, "EXT", "");
    push_header(&mut msg, "LOCATION", &options.location);
    push_header(&mut msg, "SERVER", &options.server);
    push_header(&mut msg, "ST", &options.service_type);
    push_header(&mut msg, "USN", &options.usn);
    msg.push_str("\r\n");
    msg
}

/// The parts of an M-SEARCH request that decide whether we answer it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub st: String,
    pub man: String,
}

impl SearchRequest {
    pub fn wants(&self, service_type: &str) -> bool {
        self.man == DISCOVER_MAN && (self.st == SEARCH_ALL || self.st == service_type)
    }
}

/// Parse an M-SEARCH datagram. Anything else (including NOTIFY traffic) yields None.
pub fn parse_search(datagram: &[u8]) -> Option<SearchRequest> {
    let text = std::str::from_utf8(datagram).ok()?;
    let mut lines = text.lines();
    let request_line = lines.next()?;
    if !request_line.trim().eq_ignore_ascii_case("M-SEARCH * HTTP/1.1") {
        return None;
    }

    let mut st = None;
    let mut man = String::new();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("ST") {
            st = Some(value.to_string());
        } else if name.trim().eq_ignore_ascii_case("MAN") {
            man = value.to_string();
        }
    }
    Some(SearchRequest { st: st?, man })
}

/// An open SSDP advertisement session
#[derive(Debug)]
pub struct SsdpAdvertiser {
    socket: UdpSocket,
    options: Arc<AdvertiseOptions>,
    responder: Option<JoinHandle<()>>,
}

impl SsdpAdvertiser {
    /// Open the notify socket and, if enabled, the M-SEARCH responder.
    /// The responder is skipped with a warning when the SSDP port is taken.
    pub async fn open(options: AdvertiseOptions) -> Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await.context("Failed to open SSDP notify socket")?;
        socket.set_multicast_ttl_v4(MULTICAST_TTL).context("Failed to set SSDP multicast TTL")?;
        let options = Arc::new(options);

        let responder = if options.answer_searches {
            match bind_search_socket().await {
                Ok(search_socket) => {
                    debug!("SSDP responder listening on {}", multicast_host());
                    Some(tokio::spawn(answer_searches(search_socket, options.clone())))
                }
                Err(e) => {
                    warn!("Not answering SSDP searches, could not listen on port {}: {}", SSDP_PORT, e);
                    None
                }
            }
        } else {
            None
        };

        info!(
            "SSDP advertising {st} as {usn} at {location}",
            st = options.service_type,
            usn = options.usn,
            location = options.location
        );
        Ok(Self { socket, options, responder })
    }

    pub fn options(&self) -> &AdvertiseOptions {
        &self.options
    }

    async fn send(&self, msg: String) -> Result<()> {
        self.socket
            .send_to(msg.as_bytes(), self.options.notify_addr)
            .await
            .with_context(|| format!("Failed to send SSDP notify to {}", self.options.notify_addr))?;
        Ok(())
    }
}

impl Announcer for SsdpAdvertiser {
    async fn alive(&mut self) -> Result<()> {
        trace!("SSDP alive {}", self.options.usn);
        self.send(alive_message(&self.options)).await
    }

    async fn bye(&mut self) -> Result<()> {
        debug!("SSDP byebye {}", self.options.usn);
        self.send(bye_message(&self.options)).await
    }

    async fn close(mut self) -> Result<()> {
        if let Some(responder) = self.responder.take() {
            responder.abort();
        }
        debug!("SSDP session closed");
        Ok(())
    }
}

impl Drop for SsdpAdvertiser {
    fn drop(&mut self) {
        if let Some(responder) = self.responder.take() {
            responder.abort();
        }
    }
}

async fn bind_search_socket() -> Result<UdpSocket> {
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, SSDP_PORT))).await?;
    socket.join_multicast_v4(SSDP_MULTICAST_ADDR, Ipv4Addr::UNSPECIFIED)?;
    Ok(socket)
}

async fn answer_searches(socket: UdpSocket, options: Arc<AdvertiseOptions>) {
    let response = search_response(&options);
    let mut buf = vec![0u8; 2048];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, src)) => {
                let Some(search) = parse_search(&buf[..n]) else {
                    continue;
                };
                if !search.wants(&options.service_type) {
                    trace!("Ignoring M-SEARCH for {} from {}", search.st, src);
                    continue;
                }
                debug!("Answering M-SEARCH for {} from {}", search.st, src);
                if let Err(e) = socket.send_to(response.as_bytes(), src).await {
                    warn!("SSDP search response to {} failed: {}", src, e);
                }
            }
            Err(e) => {
                warn!("SSDP recv_from error: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> AdvertiseOptions {
        let mut options = AdvertiseOptions::new("http://192.168.1.10:8081/");
        options.server = "linux/x86_64 UPnP/1.1 stproxy/1.0.0".to_string();
        options
    }

    #[test]
    fn test_alive_interval_from_secs() {
        assert_eq!(alive_interval_from_secs(10), Some(Duration::from_secs(10)));
        assert_eq!(alive_interval_from_secs(0), None);
        assert_eq!(alive_interval_from_secs(-5), None);
    }

    #[test]
    fn test_alive_message() {
        let msg = alive_message(&options());
        assert_eq!(
            msg,
            "NOTIFY * HTTP/1.1\r\n\
             HOST: 239.255.255.250:1900\r\n\
             NT: urn:SmartThingsCommunity:device:GenericProxy:1\r\n\
             NTS: ssdp:alive\r\n\
             USN: uuid:de8a5619-2603-40d1-9e21-1967952d7f86\r\n\
             LOCATION: http://192.168.1.10:8081/\r\n\
             SERVER: linux/x86_64 UPnP/1.1 stproxy/1.0.0\r\n\
             CACHE-CONTROL: max-age=1800\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_alive_message_without_server() {
        let msg = alive_message(&AdvertiseOptions::new("http://127.0.0.1:8081/"));
        assert!(!msg.contains("SERVER:"));
        assert!(msg.ends_with("CACHE-CONTROL: max-age=1800\r\n\r\n"));
    }

    #[test]
    fn test_bye_message() {
        let msg = bye_message(&options());
        assert!(msg.starts_with("NOTIFY * HTTP/1.1\r\n"));
        assert!(msg.contains("NTS: ssdp:byebye\r\n"));
        assert!(msg.contains("USN: uuid:de8a5619-2603-40d1-9e21-1967952d7f86\r\n"));
        assert!(!msg.contains("LOCATION"));
    }

    #[test]
    fn test_search_response() {
        let msg = search_response(&options());
        assert!(msg.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(msg.contains("EXT: \r\n"));
        assert!(msg.contains("ST: urn:SmartThingsCommunity:device:GenericProxy:1\r\n"));
        assert!(msg.contains("LOCATION: http://192.168.1.10:8081/\r\n"));
    }

    #[test]
    fn test_parse_search_matching() {
        let datagram = b"M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nMX: 2\r\nST: urn:SmartThingsCommunity:device:GenericProxy:1\r\n\r\n";
        let search = parse_search(datagram).unwrap();
        assert_eq!(search.st, DEFAULT_SERVICE_TYPE);
        assert!(search.wants(DEFAULT_SERVICE_TYPE));
        assert!(!search.wants("urn:schemas-upnp-org:device:MediaServer:1"));
    }

    #[test]
    fn test_parse_search_all_and_lowercase_headers() {
        let datagram = b"m-search * HTTP/1.1\r\nman: \"ssdp:discover\"\r\nst: ssdp:all\r\n\r\n";
        let search = parse_search(datagram).unwrap();
        assert!(search.wants(DEFAULT_SERVICE_TYPE));
    }

    #[test]
    fn test_parse_search_rejects_other_traffic() {
        assert!(parse_search(alive_message(&options()).as_bytes()).is_none());
        assert!(parse_search(b"M-SEARCH * HTTP/1.1\r\nMAN: \"ssdp:discover\"\r\n\r\n").is_none());
        assert!(parse_search(&[0xff, 0xfe, 0x00]).is_none());

        let without_man = parse_search(b"M-SEARCH * HTTP/1.1\r\nST: ssdp:all\r\n\r\n").unwrap();
        assert!(!without_man.wants(DEFAULT_SERVICE_TYPE));
    }

    #[tokio::test]
    async fn test_advertiser_sends_alive_and_bye() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut options = options();
        options.notify_addr = receiver.local_addr().unwrap();
        options.answer_searches = false;

        let mut advertiser = SsdpAdvertiser::open(options).await.unwrap();
        let mut buf = vec![0u8; 2048];

        advertiser.alive().await.unwrap();
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf)).await.unwrap().unwrap();
        assert_eq!(std::str::from_utf8(&buf[..n]).unwrap(), alive_message(advertiser.options()));

        advertiser.bye().await.unwrap();
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf)).await.unwrap().unwrap();
        assert!(std::str::from_utf8(&buf[..n]).unwrap().contains("NTS: ssdp:byebye"));

        advertiser.close().await.unwrap();
    }
}
