//! Graceful shutdown on ctrl-c.
//!
//! `stop()` closes the acceptor so no new connections are accepted, lets idle
//! connections go, and lets active connections finish their current request
//! and response. The io pool is then joined to drain its sessions.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use tracing::info;
use wicket::{handler_fn, HandlerFuture, IoThreadPool, Request, Response, Server, ServerOptions};

fn work<'a>(_req: &'a Request, resp: &'a mut Response) -> HandlerFuture<'a> {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        resp.text(StatusCode::OK, "done");
        Ok(())
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let io_pool = Arc::new(IoThreadPool::new(4).expect("failed to build io pool"));

    let mut server = Server::with_io_pool(io_pool.clone());
    // Enable the serve timeout, in case some handler gets stuck.
    server.set_options(ServerOptions { serve_timeout: Duration::from_secs(15), ..Default::default() });
    server.get("/work", handler_fn(work)).expect("route registration failed");

    let server = Arc::new(server);

    {
        let server = server.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
            info!("received signal, shutting down the server");
            server.stop();
        });
    }

    if let Err(e) = server.listen_and_serve(("0.0.0.0", 7890)).await {
        tracing::error!("unexpected error: {e}");
    }

    // Wait for active io events to finish first.
    io_pool.join();
    info!("server stopped");
}
