//! Router-level and per-route middlewares.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use http::{HeaderValue, StatusCode};
use tracing::info;
use wicket::{handler_fn, Decision, HandlerFuture, Middleware, MiddlewareChain, Request, Response, Server};

/// Logs every request entering and leaving the handler stack.
struct LogAccess;

#[async_trait]
impl Middleware for LogAccess {
    async fn pre_handle(&self, req: &mut Request, _resp: &mut Response) -> Decision {
        info!("entering {} {}", req.method(), req.target());
        Decision::Proceed
    }

    async fn post_handle(&self, req: &mut Request, resp: &mut Response) -> Decision {
        info!("leave {} -> {}", req.target(), resp.status());
        Decision::Proceed
    }
}

/// Mirrors an `x-tracking-id` header into the response, generating one when
/// the client did not send any.
struct TrackingId;

#[async_trait]
impl Middleware for TrackingId {
    async fn pre_handle(&self, req: &mut Request, resp: &mut Response) -> Decision {
        const NAME: &str = "x-tracking-id";

        match req.headers().get(NAME).cloned() {
            None => {
                info!("tracking-id not found in request, generate on the fly");
                let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
                if let Ok(new_id) = HeaderValue::from_str(&ts.to_string()) {
                    req.headers_mut().insert(NAME, new_id.clone());
                    resp.headers_mut().insert(NAME, new_id);
                }
            }
            Some(id) => {
                resp.headers_mut().insert(NAME, id);
            }
        }

        Decision::Proceed
    }
}

fn now<'a>(_req: &'a Request, resp: &'a mut Response) -> HandlerFuture<'a> {
    Box::pin(async move {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        resp.text(StatusCode::OK, format!("{}", ts.as_secs()));
        Ok(())
    })
}

fn healthcheck<'a>(_req: &'a Request, resp: &'a mut Response) -> HandlerFuture<'a> {
    Box::pin(async move {
        resp.text(StatusCode::OK, "pong");
        Ok(())
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let mut server = Server::new();

    // Global middlewares, shared by all routes.
    server.use_middlewares(MiddlewareChain::new().with(LogAccess));

    // Per-route middlewares.
    server
        .get_with("/now", MiddlewareChain::new().with(TrackingId), handler_fn(now))
        .expect("route registration failed");
    server.get("/healthcheck", handler_fn(healthcheck)).expect("route registration failed");

    if let Err(e) = Arc::new(server).listen_and_serve(("0.0.0.0", 7890)).await {
        tracing::error!("unexpected error: {e}");
    }
}
