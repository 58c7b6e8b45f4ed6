use crate::utils::path::{join_paths, join_queries};
use crate::utils::validation::validate_target_url;
use anyhow::{Result, anyhow};
use hyper::client::HttpConnector;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::http::Version;
use hyper::{Body, Client, Request, Response, StatusCode, Uri};
use hyper_tls::HttpsConnector;
use log::{debug, error};
use std::fmt;
use std::net::IpAddr;
use std::time::Instant;
use url::{Position, Url};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

// Headers that only apply to a single connection and must not be relayed
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Relays requests to a single backend target with its own pooled client.
pub struct ForwardingHandler {
    target: Url,
    // host[:port] of the target, used for the outbound URI and Host header
    authority: String,
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl fmt::Debug for ForwardingHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingHandler").field("target", &self.target.as_str()).finish()
    }
}

impl ForwardingHandler {
    /// Parse the target and build the handler. Fails for anything but an absolute http(s) URL.
    pub fn new(target: &str) -> Result<Self> {
        let target = validate_target_url(target).map_err(|e| anyhow!(e))?;
        let authority = target[Position::BeforeHost..Position::AfterPort].to_string();
        let https = HttpsConnector::new();
        let client: Client<_, Body> = Client::builder().build::<_, Body>(https);
        Ok(Self { target, authority, client })
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// The URI a request for `rest` (the path after the prefix) is sent to
    pub fn outbound_uri(&self, rest: &str, query: Option<&str>) -> Result<Uri> {
        let path = join_paths(self.target.path(), rest);
        let uri = match join_queries(self.target.query(), query) {
            Some(query) => format!("{}://{}{}?{}", self.target.scheme(), self.authority, path, query),
            None => format!("{}://{}{}", self.target.scheme(), self.authority, path),
        };
        Ok(uri.parse::<Uri>()?)
    }

    /// Forward the request and relay the backend response.
    /// Backend failures are answered with 502 rather than an error.
    pub async fn forward(&self, client_ip: IpAddr, rest: &str, req: Request<Body>) -> Result<Response<Body>> {
        let uri = self.outbound_uri(rest, req.uri().query())?;
        let (mut parts, body) = req.into_parts();

        remove_hop_headers(&mut parts.headers);
        parts.headers.insert(header::HOST, HeaderValue::from_str(&self.authority)?);
        append_forwarded_for(&mut parts.headers, client_ip);
        parts.uri = uri.clone();
        parts.version = Version::HTTP_11;

        let method = parts.method.clone();
        let start = Instant::now();
        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(mut response) => {
                debug!(
                    "Upstream {method} {uri} responded {status} in {ms} ms",
                    method = method,
                    uri = uri,
                    status = response.status(),
                    ms = start.elapsed().as_millis()
                );
                remove_hop_headers(response.headers_mut());
                Ok(response)
            }
            Err(e) => {
                error!(
                    "HTTP proxy error for {ip} -> {uri} after {ms} ms: {err}",
                    ip = client_ip,
                    uri = uri,
                    ms = start.elapsed().as_millis(),
                    err = e
                );
                Ok(Response::builder()
                    .status(StatusCode::BAD_GATEWAY)
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("Bad Gateway"))?)
            }
        }
    }
}

/// Strip hop-by-hop headers, including any listed in the Connection header
pub fn remove_hop_headers(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, client_ip),
        None => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
