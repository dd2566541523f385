//! The server: listener, accept loop, options, and graceful shutdown.

mod io_pool;
pub use io_pool::{IoThreadPool, PoolError};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::connection::HttpConnection;
use crate::error::RouteError;
use crate::middleware::MiddlewareChain;
use crate::router::{Handler, Router};

/// Server timeouts. A zero duration disables the corresponding timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerOptions {
    /// The maximum duration an established connection may sit idle between
    /// requests.
    pub idle_timeout: Duration,

    /// The maximum duration allowed to read one entire request, including
    /// the body.
    pub read_timeout: Duration,

    /// The maximum duration allowed to read a request, handle it, and send
    /// back the response. Should be larger than `read_timeout`.
    pub serve_timeout: Duration,
}

impl ServerOptions {
    /// `read_timeout` may exceed `serve_timeout`, which would make the serve
    /// timeout effectively the read timeout.
    pub fn effective_read_timeout(&self) -> Duration {
        let (min, max) = if self.read_timeout <= self.serve_timeout {
            (self.read_timeout, self.serve_timeout)
        } else {
            (self.serve_timeout, self.read_timeout)
        };

        if max == Duration::ZERO {
            return Duration::ZERO;
        }
        if min > Duration::ZERO {
            min
        } else {
            max
        }
    }
}

/// Errors surfaced by [`Server::listen_and_serve`].
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind listener: {source}")]
    Bind { source: std::io::Error },
}

/// An embeddable HTTP/1.1 server.
///
/// Routes and options are configured first; serving starts with
/// [`listen_and_serve`](Server::listen_and_serve) (or
/// [`serve`](Server::serve) with a pre-bound listener) on an `Arc<Server>`,
/// after which the router must not change. [`stop`](Server::stop) triggers a
/// graceful shutdown: the acceptor closes, idle sessions end, and in-flight
/// requests finish their response first.
pub struct Server {
    router: Router,
    opts: ServerOptions,
    io_pool: Option<Arc<IoThreadPool>>,
    shutdown: CancellationToken,
    sessions: TaskTracker,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            opts: ServerOptions::default(),
            io_pool: None,
            shutdown: CancellationToken::new(),
            sessions: TaskTracker::new(),
        }
    }

    /// A server distributing sessions over `io_pool` round-robin.
    pub fn with_io_pool(io_pool: Arc<IoThreadPool>) -> Self {
        Self { io_pool: Some(io_pool), ..Self::new() }
    }

    pub fn set_options(&mut self, opts: ServerOptions) {
        self.opts = opts;
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Sets the router-level middleware chain. Must happen before serving.
    pub fn use_middlewares(&mut self, middlewares: MiddlewareChain) {
        self.router.use_middlewares(middlewares);
    }

    pub fn get<H: Handler + 'static>(&mut self, path: &str, handler: H) -> Result<(), RouteError> {
        self.router.add_route(Method::GET, path, handler)
    }

    pub fn get_with<H: Handler + 'static>(
        &mut self,
        path: &str,
        middlewares: MiddlewareChain,
        handler: H,
    ) -> Result<(), RouteError> {
        self.router.add_route_with(Method::GET, path, middlewares, handler)
    }

    pub fn post<H: Handler + 'static>(&mut self, path: &str, handler: H) -> Result<(), RouteError> {
        self.router.add_route(Method::POST, path, handler)
    }

    pub fn post_with<H: Handler + 'static>(
        &mut self,
        path: &str,
        middlewares: MiddlewareChain,
        handler: H,
    ) -> Result<(), RouteError> {
        self.router.add_route_with(Method::POST, path, middlewares, handler)
    }

    pub fn put<H: Handler + 'static>(&mut self, path: &str, handler: H) -> Result<(), RouteError> {
        self.router.add_route(Method::PUT, path, handler)
    }

    pub fn put_with<H: Handler + 'static>(
        &mut self,
        path: &str,
        middlewares: MiddlewareChain,
        handler: H,
    ) -> Result<(), RouteError> {
        self.router.add_route_with(Method::PUT, path, middlewares, handler)
    }

    pub fn patch<H: Handler + 'static>(&mut self, path: &str, handler: H) -> Result<(), RouteError> {
        self.router.add_route(Method::PATCH, path, handler)
    }

    pub fn patch_with<H: Handler + 'static>(
        &mut self,
        path: &str,
        middlewares: MiddlewareChain,
        handler: H,
    ) -> Result<(), RouteError> {
        self.router.add_route_with(Method::PATCH, path, middlewares, handler)
    }

    pub fn delete<H: Handler + 'static>(&mut self, path: &str, handler: H) -> Result<(), RouteError> {
        self.router.add_route(Method::DELETE, path, handler)
    }

    pub fn delete_with<H: Handler + 'static>(
        &mut self,
        path: &str,
        middlewares: MiddlewareChain,
        handler: H,
    ) -> Result<(), RouteError> {
        self.router.add_route_with(Method::DELETE, path, middlewares, handler)
    }

    pub fn head<H: Handler + 'static>(&mut self, path: &str, handler: H) -> Result<(), RouteError> {
        self.router.add_route(Method::HEAD, path, handler)
    }

    pub fn head_with<H: Handler + 'static>(
        &mut self,
        path: &str,
        middlewares: MiddlewareChain,
        handler: H,
    ) -> Result<(), RouteError> {
        self.router.add_route_with(Method::HEAD, path, middlewares, handler)
    }

    /// Binds `addr` and serves until [`stop`](Server::stop) is called.
    pub async fn listen_and_serve<A: ToSocketAddrs>(self: Arc<Self>, addr: A) -> Result<(), ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind { source })?;
        self.serve(listener).await;
        Ok(())
    }

    /// Serves connections accepted from `listener` until
    /// [`stop`](Server::stop) is called.
    ///
    /// Returns after the acceptor has closed and all sessions spawned on the
    /// serving runtime have finished. Sessions running on an io pool are
    /// drained by [`IoThreadPool::join`].
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "server listening");
        }

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!("acceptor is closed");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(cause = %e, "failed to accept new connection");
                            continue;
                        }
                    };

                    let server = Arc::clone(&self);
                    let session = async move { server.serve_session(stream, remote).await };
                    match &self.io_pool {
                        Some(io_pool) => {
                            io_pool.get_executor().spawn(session);
                        }
                        None => {
                            self.sessions.spawn(session);
                        }
                    }
                }
            }
        }

        drop(listener);
        self.sessions.close();
        self.sessions.wait().await;
    }

    /// Requests a graceful shutdown: no new connections are accepted, idle
    /// sessions end, and active sessions exit after finishing their current
    /// request and response.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    async fn serve_session(&self, stream: TcpStream, remote: SocketAddr) {
        let (reader, writer) = stream.into_split();
        let connection = HttpConnection::new(reader, writer);
        match connection.serve(&self.router, &self.opts, &self.shutdown).await {
            Ok(()) => debug!(%remote, "session finished"),
            Err(err) if err.is_timeout() => error!(%remote, cause = %err, "session timed out"),
            Err(err) if err.is_disconnect() => debug!(%remote, cause = %err, "remote session closed"),
            Err(err) => error!(%remote, cause = %err, "unhandled session error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_read_timeout_table() {
        let secs = Duration::from_secs;
        let mut opts = ServerOptions::default();

        // no timeout
        assert_eq!(opts.effective_read_timeout(), Duration::ZERO);

        let cases = [
            // (read, serve, effective)
            (secs(5), secs(10), secs(5)),  // read-timeout is applied
            (secs(10), secs(5), secs(5)),  // serve-timeout is applied
            (secs(5), secs(0), secs(5)),   // serve-timeout is not enabled
            (secs(0), secs(5), secs(5)),   // serve-timeout is still applied
            (secs(0), secs(0), secs(0)),   // both are not enabled
        ];

        for (read, serve, effective) in cases {
            opts.read_timeout = read;
            opts.serve_timeout = serve;
            assert_eq!(opts.effective_read_timeout(), effective, "read={read:?} serve={serve:?}");
        }
    }
}
