//! Distributing sessions over a pool of single-threaded executors.

use std::sync::Arc;

use http::StatusCode;
use wicket::{handler_fn, HandlerFuture, IoThreadPool, Request, Response, Server};

fn tid<'a>(_req: &'a Request, resp: &'a mut Response) -> HandlerFuture<'a> {
    Box::pin(async move {
        let name = std::thread::current().name().unwrap_or("unnamed").to_string();
        resp.text(StatusCode::OK, format!("running on thread={name}"));
        Ok(())
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let io_pool = Arc::new(IoThreadPool::new(4).expect("failed to build io pool"));

    let mut server = Server::with_io_pool(io_pool.clone());
    server.get("/tid", handler_fn(tid)).expect("route registration failed");

    if let Err(e) = Arc::new(server).listen_and_serve(("0.0.0.0", 7890)).await {
        tracing::error!("unexpected error: {e}");
    }

    io_pool.join();
}
