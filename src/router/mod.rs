//! Request routing.
//!
//! A [`Router`] owns one radix tree per HTTP verb plus a router-level
//! middleware chain applied around every route. Registering a route wraps the
//! user handler together with its per-route middleware chain into a
//! [`RouteHandler`], the callable stored in the tree.
//!
//! Route registration is not safe to run concurrently with serving: all
//! routes and middleware chains must be installed before the server starts.

pub(crate) mod tree;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};

use crate::error::{BoxError, HttpError, RouteError};
use crate::middleware::{Decision, MiddlewareChain};
use crate::params::PathParams;
use crate::request::Request;
use crate::response::Response;
use tree::Node;

/// The boxed future returned by function-based handlers.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'a>>;

/// A user request handler.
///
/// Handlers read the request and write the response. Returning an error that
/// downcasts to [`HttpError`] produces a response with that status and a JSON
/// error body; any other error produces a `500 Internal Server Error`.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, req: &Request, resp: &mut Response) -> Result<(), BoxError>;
}

/// Adapts a plain function or closure into a [`Handler`].
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync,
{
    async fn call(&self, req: &Request, resp: &mut Response) -> Result<(), BoxError> {
        (self.f)(req, resp).await
    }
}

/// Wraps `f` into a [`Handler`].
///
/// ```
/// use wicket::{handler_fn, HandlerFuture, Request, Response};
///
/// fn ping<'a>(_req: &'a Request, resp: &'a mut Response) -> HandlerFuture<'a> {
///     Box::pin(async move {
///         resp.text(http::StatusCode::OK, "Pong!");
///         Ok(())
///     })
/// }
///
/// let handler = handler_fn(ping);
/// # let _ = handler;
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a Request, &'a mut Response) -> HandlerFuture<'a> + Send + Sync,
{
    HandlerFn { f }
}

/// The callable installed at a route terminus: per-route pre-phase, then the
/// user handler, then the per-route post-phase.
pub struct RouteHandler {
    middlewares: MiddlewareChain,
    handler: Arc<dyn Handler>,
}

impl RouteHandler {
    pub(crate) fn new(middlewares: MiddlewareChain, handler: Arc<dyn Handler>) -> Self {
        Self { middlewares, handler }
    }

    /// Runs the per-route composition and returns the decision gating the
    /// router-level post-phase.
    ///
    /// An abort from the per-route pre-phase skips the handler and the
    /// per-route post-phase, but the router-level post-phase still runs. A
    /// handler error is rendered into the response and does not abort either
    /// middleware phase; only an abort from the per-route post-phase skips
    /// the router-level post-phase.
    pub async fn call(&self, req: &mut Request, resp: &mut Response) -> Decision {
        if self.middlewares.pre_handle(req, resp).await == Decision::Abort {
            return Decision::Proceed;
        }

        if let Err(err) = self.handler.call(req, resp).await {
            render_error(resp, err);
        }

        self.middlewares.post_handle(req, resp).await
    }
}

fn render_error(resp: &mut Response, err: BoxError) {
    match err.downcast::<HttpError>() {
        Ok(err) => err.render(resp),
        Err(err) => {
            let body = serde_json::json!({ "error": { "message": err.to_string() } });
            resp.json(StatusCode::INTERNAL_SERVER_ERROR, body.to_string());
        }
    }
}

/// Routes requests to handlers by verb and path template.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, Node>,
    middlewares: MiddlewareChain,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` and `path`.
    ///
    /// Fails with [`RouteError`] on any template conflict; see the conflict
    /// rules on [`RouteError`]'s variants.
    pub fn add_route<H>(&mut self, method: Method, path: &str, handler: H) -> Result<(), RouteError>
    where
        H: Handler + 'static,
    {
        self.add_route_with(method, path, MiddlewareChain::new(), handler)
    }

    /// Registers `handler` with a per-route middleware chain.
    pub fn add_route_with<H>(
        &mut self,
        method: Method,
        path: &str,
        middlewares: MiddlewareChain,
        handler: H,
    ) -> Result<(), RouteError>
    where
        H: Handler + 'static,
    {
        let route_handler = RouteHandler::new(middlewares, Arc::new(handler));
        self.routes.entry(method).or_default().add_route(path, route_handler)
    }

    /// Finds the route callable for `(method, path)`, binding any path
    /// parameters into `params`. Router-level middlewares are not involved.
    pub fn locate_route(&self, method: &Method, path: &str, params: &mut PathParams) -> Option<&RouteHandler> {
        self.routes.get(method)?.locate(path.as_bytes(), params)
    }

    /// Sets the router-level middleware chain, applied to all routes.
    ///
    /// Must be called before serving begins.
    pub fn use_middlewares(&mut self, middlewares: MiddlewareChain) {
        self.middlewares = middlewares;
    }

    /// Runs the router-level pre-phase.
    pub async fn run_pre_handle(&self, req: &mut Request, resp: &mut Response) -> Decision {
        self.middlewares.pre_handle(req, resp).await
    }

    /// Runs the router-level post-phase.
    pub async fn run_post_handle(&self, req: &mut Request, resp: &mut Response) -> Decision {
        self.middlewares.post_handle(req, resp).await
    }
}
