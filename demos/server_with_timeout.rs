//! A server with all three timeouts enabled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use tracing::info;
use wicket::{
    handler_fn, Decision, HandlerFuture, Middleware, MiddlewareChain, Request, Response, Server, ServerOptions,
};

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

fn query<'a>(_req: &'a Request, resp: &'a mut Response) -> HandlerFuture<'a> {
    Box::pin(async move {
        resp.text(StatusCode::OK, "hello world");
        Ok(())
    })
}

fn slow<'a>(_req: &'a Request, resp: &'a mut Response) -> HandlerFuture<'a> {
    Box::pin(async move {
        // Longer than the serve timeout: the session is cancelled mid-flight.
        tokio::time::sleep(Duration::from_secs(30)).await;
        resp.text(StatusCode::OK, "you should never see this");
        Ok(())
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let mut server = Server::new();
    server.set_options(ServerOptions {
        idle_timeout: Duration::from_secs(30),
        read_timeout: Duration::from_secs(5),
        serve_timeout: Duration::from_secs(15),
    });

    server
        .get_with("/query", MiddlewareChain::new().with(LogAccess), handler_fn(query))
        .expect("route registration failed");
    server.get("/slow", handler_fn(slow)).expect("route registration failed");

    if let Err(e) = Arc::new(server).listen_and_serve(("0.0.0.0", 7890)).await {
        tracing::error!("unexpected error: {e}");
    }
}
