//! A lightweight, embeddable HTTP/1.1 server library for building REST-style
//! services.
//!
//! Applications register route handlers keyed by method and path template,
//! optionally composing middlewares around them; the library accepts TCP
//! connections, parses requests, dispatches to the matching handler, and
//! writes responses, honoring keep-alive and the configured timeouts.
//!
//! # Routing
//!
//! Routes are path templates stored in one compressed trie per verb. A
//! segment is plain, a named parameter (`:name`, matching one non-`/`
//! segment), or a catch-all (`*name`, matching the rest of the path). Lookup
//! is O(path length) and binds matched parameters into the request.
//! Conflicting templates are rejected at registration time.
//!
//! # Middlewares
//!
//! A [`Middleware`] contributes a pre-handle and/or post-handle stage.
//! Router-level middlewares wrap every route; per-route middlewares wrap one
//! handler. Pre-phases run in registration order, post-phases in reverse, and
//! any stage can abort the remainder of its phase.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wicket::{handler_fn, HandlerFuture, Request, Response, Server};
//!
//! fn ping<'a>(_req: &'a Request, resp: &'a mut Response) -> HandlerFuture<'a> {
//!     Box::pin(async move {
//!         resp.text(http::StatusCode::OK, "Pong!");
//!         Ok(())
//!     })
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut server = Server::new();
//!     server.get("/ping", handler_fn(ping)).unwrap();
//!
//!     let server = Arc::new(server);
//!     server.listen_and_serve(("0.0.0.0", 9876)).await.unwrap();
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod cookie;
pub mod error;
pub mod middleware;
pub mod params;
mod percent;
pub mod request;
pub mod response;
pub mod router;
pub mod server;

pub use cookie::{Cookie, CookieJar, SameSite};
pub use error::{BoxError, HttpError, RouteError};
pub use middleware::{Decision, Middleware, MiddlewareChain};
pub use params::{Param, PathParams, QueryParams};
pub use request::Request;
pub use response::Response;
pub use router::{handler_fn, Handler, HandlerFn, HandlerFuture, RouteHandler, Router};
pub use server::{IoThreadPool, Server, ServerError, ServerOptions};
