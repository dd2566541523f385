//! The smallest possible server: `GET /ping` answers `Pong!`.

use std::sync::Arc;

use http::StatusCode;
use wicket::{handler_fn, HandlerFuture, Request, Response, Server};

fn ping<'a>(_req: &'a Request, resp: &'a mut Response) -> HandlerFuture<'a> {
    Box::pin(async move {
        resp.text(StatusCode::OK, "Pong!");
        Ok(())
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let mut server = Server::new();
    server.get("/ping", handler_fn(ping)).expect("route registration failed");

    if let Err(e) = Arc::new(server).listen_and_serve(("0.0.0.0", 9876)).await {
        tracing::error!("unexpected error: {e}");
    }
}
