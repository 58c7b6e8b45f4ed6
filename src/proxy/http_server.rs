use crate::proxy::request_handler::ProxyRouter;
use crate::shutdown::{Shutdown, ShutdownListener};
use anyhow::{Result, anyhow};
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, StatusCode};
use log::{error, info, warn};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long in-flight requests may run after shutdown starts
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// A bound, running proxy listener
#[derive(Debug)]
pub struct ProxyServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ProxyServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait until the listener has stopped: drained, timed out, or failed
    pub async fn wait(self) -> Result<()> {
        self.handle.await.map_err(|e| anyhow!("Proxy Server task failed: {}", e))
    }
}

/// Bind the reverse proxy on `port` and serve it in the background until `shutdown` fires.
/// Failing to bind is returned as an error; everything after that is logged.
pub async fn start_rp_server(router: Arc<ProxyRouter>, port: u16, shutdown: ShutdownListener) -> Result<ProxyServer> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let make_svc = make_service_fn(move |conn: &AddrStream| {
        let remote_addr = conn.remote_addr().ip();
        let router = router.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let router = router.clone();
                async move {
                    match router.handle_request(remote_addr, req).await {
                        Ok(resp) => Ok::<_, Infallible>(resp),
                        Err(e) => {
                            error!("handle_request error from {}: {}", remote_addr, e);
                            let mut resp = Response::new(Body::empty());
                            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                            Ok::<_, Infallible>(resp)
                        }
                    }
                }
            }))
        }
    });

    // Fired when the grace period runs out; cancels every connection still open.
    let abort = Shutdown::new();
    let builder = hyper::Server::try_bind(&addr).map_err(|e| anyhow!("Failed to bind reverse proxy on {}: {}", addr, e))?;
    let server = builder.executor(ConnectionExecutor { abort: abort.subscribe() }).serve(make_svc);
    let local_addr = server.local_addr();

    let mut drain = shutdown.clone();
    let graceful = server.with_graceful_shutdown(async move { drain.wait().await });
    info!("Proxy Server Started on {}", local_addr);

    let handle = tokio::spawn(supervise(graceful, shutdown, abort));
    Ok(ProxyServer { addr: local_addr, handle })
}

/// Spawns hyper's connection tasks so they can be cancelled together.
#[derive(Debug, Clone)]
struct ConnectionExecutor {
    abort: ShutdownListener,
}

impl<F> hyper::rt::Executor<F> for ConnectionExecutor
where
    F: Future + Send + 'static,
{
    fn execute(&self, fut: F) {
        let mut abort = self.abort.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = fut => {}
                _ = abort.wait() => {}
            }
        });
    }
}

// Runs the server, and once shutdown fires gives it the grace period to drain.
// Dropping `abort` on return also cancels any connection left behind.
async fn supervise<F>(graceful: F, mut shutdown: ShutdownListener, abort: Shutdown)
where
    F: Future<Output = hyper::Result<()>> + Send + 'static,
{
    let mut serving = tokio::spawn(graceful);

    tokio::select! {
        result = &mut serving => {
            match result {
                Ok(Ok(())) => warn!("Proxy Server exited before shutdown was requested"),
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Proxy Server task failed: {}", e),
            }
            return;
        }
        _ = shutdown.wait() => {}
    }

    info!("Proxy Server Stopped");
    match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut serving).await {
        Ok(Ok(Ok(()))) => info!("Proxy Server Exited Properly"),
        Ok(Ok(Err(e))) => error!("Proxy Server Shutdown Failed: {}", e),
        Ok(Err(e)) => error!("Proxy Server Shutdown Failed: {}", e),
        Err(_) => {
            error!(
                "Proxy Server Shutdown Failed: requests still in flight after {}s, closing them",
                SHUTDOWN_GRACE_PERIOD.as_secs()
            );
            abort.trigger();
            serving.abort();
        }
    }
}
