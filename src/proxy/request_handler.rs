use crate::config::Configuration;
use crate::proxy::cache::ProxyCache;
use crate::proxy::forwarder::ForwardingHandler;
use crate::utils::path::split_prefix;
use anyhow::Result;
use hyper::{Body, Request, Response, StatusCode, header};
use log::{debug, info, warn};
use std::net::IpAddr;
use std::sync::Arc;

/// Routes `/<prefix>/<rest>` requests to the backend configured for `prefix`.
#[derive(Debug)]
pub struct ProxyRouter {
    config: Arc<Configuration>,
    cache: ProxyCache<ForwardingHandler>,
}

impl ProxyRouter {
    pub fn new(config: Arc<Configuration>) -> Self {
        Self { config, cache: ProxyCache::new() }
    }

    pub fn cache(&self) -> &ProxyCache<ForwardingHandler> {
        &self.cache
    }

    /// Dispatch one request: cached handler, else configured target, else 403.
    pub async fn handle_request(&self, client_ip: IpAddr, req: Request<Body>) -> Result<Response<Body>> {
        let path = req.uri().path().to_string();
        let Some(routed) = split_prefix(&path) else {
            warn!("Received malformed request path {path} from {ip}", path = path, ip = client_ip);
            return text_response(StatusCode::BAD_REQUEST, format!("400: Malformed request path {}", path));
        };
        let (prefix, rest) = (routed.prefix, routed.rest);

        if let Some(handler) = self.cache.get(prefix).await {
            debug!("Cache hit for path prefix {prefix} -> {target}", prefix = prefix, target = handler.target());
            return handler.forward(client_ip, rest, req).await;
        }

        let Some(target) = self.config.lookup_target(prefix) else {
            warn!("Received request from {ip} for forbidden path prefix {prefix}", ip = client_ip, prefix = prefix);
            return text_response(StatusCode::FORBIDDEN, format!("403: Host forbidden for path prefix {}", prefix));
        };

        let handler = match self.cache.get_or_try_insert(prefix, || ForwardingHandler::new(target)).await {
            Ok(handler) => handler,
            Err(e) => {
                warn!("target parse fail: {}", e);
                return text_response(StatusCode::BAD_GATEWAY, format!("502: Invalid target for path prefix {}", prefix));
            }
        };

        info!(
            "Received request from {ip} for /{prefix}/{rest} -> {target}",
            ip = client_ip,
            prefix = prefix,
            rest = rest,
            target = handler.target()
        );
        handler.forward(client_ip, rest, req).await
    }
}

fn text_response(status: StatusCode, body: String) -> Result<Response<Body>> {
    Ok(Response::builder().status(status).header(header::CONTENT_TYPE, "text/plain").body(Body::from(body))?)
}
