//! The middleware pipeline.
//!
//! A middleware implements any subset of the [`Middleware`] hooks; absent
//! hooks behave as [`Decision::Proceed`]. Chains evaluate the pre-phase in
//! registration order and the post-phase in reverse registration order, and an
//! `Abort` from any hook short-circuits the remainder of that phase.
//!
//! Synchronous and suspending middlewares share the same trait: a stage that
//! has nothing to await simply returns without suspending.
//!
//! ```
//! use async_trait::async_trait;
//! use wicket::{Decision, Middleware, MiddlewareChain, Request, Response};
//!
//! struct RequireApiKey;
//!
//! #[async_trait]
//! impl Middleware for RequireApiKey {
//!     async fn pre_handle(&self, req: &mut Request, resp: &mut Response) -> Decision {
//!         if req.headers().contains_key("x-api-key") {
//!             Decision::Proceed
//!         } else {
//!             resp.text(http::StatusCode::UNAUTHORIZED, "missing api key");
//!             Decision::Abort
//!         }
//!     }
//! }
//!
//! let chain = MiddlewareChain::new().with(RequireApiKey);
//! # let _ = chain;
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::request::Request;
use crate::response::Response;

/// The outcome of a middleware hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Continue with the next stage.
    Proceed,
    /// Short-circuit the enclosing phase.
    Abort,
}

/// A pre-handle and/or post-handle processing stage around a handler.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Runs before the handler. Returning [`Decision::Abort`] skips the
    /// remaining pre-hooks and the handler.
    async fn pre_handle(&self, _req: &mut Request, _resp: &mut Response) -> Decision {
        Decision::Proceed
    }

    /// Runs after the handler, in reverse registration order.
    async fn post_handle(&self, _req: &mut Request, _resp: &mut Response) -> Decision {
        Decision::Proceed
    }
}

/// An ordered, type-erased middleware collection.
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware to the chain.
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Evaluates the pre-phase in registration order. An empty chain
    /// proceeds.
    pub async fn pre_handle(&self, req: &mut Request, resp: &mut Response) -> Decision {
        for middleware in &self.middlewares {
            if middleware.pre_handle(req, resp).await == Decision::Abort {
                return Decision::Abort;
            }
        }
        Decision::Proceed
    }

    /// Evaluates the post-phase in reverse registration order.
    pub async fn post_handle(&self, req: &mut Request, resp: &mut Response) -> Decision {
        for middleware in self.middlewares.iter().rev() {
            if middleware.post_handle(req, resp).await == Decision::Abort {
                return Decision::Abort;
            }
        }
        Decision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_request() -> Request {
        let head = http::Request::builder().uri("/").body(()).unwrap().into();
        Request::from_wire(head, Bytes::new()).unwrap()
    }

    fn test_response() -> Response {
        Response::new(http::Version::HTTP_11, true)
    }

    struct CountPre(Arc<AtomicUsize>);

    #[async_trait]
    impl Middleware for CountPre {
        async fn pre_handle(&self, _req: &mut Request, _resp: &mut Response) -> Decision {
            self.0.fetch_add(1, Ordering::Relaxed);
            Decision::Proceed
        }
    }

    struct CountPost(Arc<AtomicUsize>);

    #[async_trait]
    impl Middleware for CountPost {
        async fn post_handle(&self, _req: &mut Request, _resp: &mut Response) -> Decision {
            self.0.fetch_add(1, Ordering::Relaxed);
            Decision::Proceed
        }
    }

    struct CountBoth {
        pre: Arc<AtomicUsize>,
        post: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Middleware for CountBoth {
        async fn pre_handle(&self, _req: &mut Request, _resp: &mut Response) -> Decision {
            self.pre.fetch_add(1, Ordering::Relaxed);
            Decision::Proceed
        }

        async fn post_handle(&self, _req: &mut Request, _resp: &mut Response) -> Decision {
            self.post.fetch_add(1, Ordering::Relaxed);
            Decision::Proceed
        }
    }

    struct AbortPre;

    #[async_trait]
    impl Middleware for AbortPre {
        async fn pre_handle(&self, _req: &mut Request, _resp: &mut Response) -> Decision {
            Decision::Abort
        }
    }

    struct AbortPost;

    #[async_trait]
    impl Middleware for AbortPost {
        async fn post_handle(&self, _req: &mut Request, _resp: &mut Response) -> Decision {
            Decision::Abort
        }
    }

    // Suspends before touching the response, exercising the suspending path.
    struct AppendAfterYield(&'static str);

    #[async_trait]
    impl Middleware for AppendAfterYield {
        async fn pre_handle(&self, _req: &mut Request, resp: &mut Response) -> Decision {
            tokio::task::yield_now().await;
            resp.body_mut().push_str(self.0);
            Decision::Proceed
        }
    }

    struct AbortAfterYield;

    #[async_trait]
    impl Middleware for AbortAfterYield {
        async fn pre_handle(&self, _req: &mut Request, _resp: &mut Response) -> Decision {
            tokio::task::yield_now().await;
            Decision::Abort
        }
    }

    #[tokio::test]
    async fn chain_with_both_pre_and_post_handle() {
        let pre = Arc::new(AtomicUsize::new(0));
        let post = Arc::new(AtomicUsize::new(0));
        let chain = MiddlewareChain::new()
            .with(CountPre(pre.clone()))
            .with(CountPost(post.clone()))
            .with(CountBoth { pre: pre.clone(), post: post.clone() });

        let mut req = test_request();
        let mut resp = test_response();

        assert_eq!(chain.pre_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(pre.load(Ordering::Relaxed), 2);
        assert_eq!(post.load(Ordering::Relaxed), 0);

        assert_eq!(chain.post_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(pre.load(Ordering::Relaxed), 2);
        assert_eq!(post.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn chain_with_only_pre_handle() {
        let pre = Arc::new(AtomicUsize::new(0));
        let chain = MiddlewareChain::new()
            .with(CountPre(pre.clone()))
            .with(CountPre(pre.clone()))
            .with(CountPre(pre.clone()));

        let mut req = test_request();
        let mut resp = test_response();

        assert_eq!(chain.pre_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(pre.load(Ordering::Relaxed), 3);

        // post hooks are absent and behave as proceed
        assert_eq!(chain.post_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(pre.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn chain_with_only_post_handle() {
        let post = Arc::new(AtomicUsize::new(0));
        let chain = MiddlewareChain::new()
            .with(CountPost(post.clone()))
            .with(CountPost(post.clone()))
            .with(CountPost(post.clone()));

        let mut req = test_request();
        let mut resp = test_response();

        assert_eq!(chain.pre_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(post.load(Ordering::Relaxed), 0);

        assert_eq!(chain.post_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(post.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn missing_pre_handle_in_the_middle() {
        let pre = Arc::new(AtomicUsize::new(0));
        let post = Arc::new(AtomicUsize::new(0));
        let chain = MiddlewareChain::new()
            .with(CountPre(pre.clone()))
            .with(CountPost(post.clone()))
            .with(CountPre(pre.clone()));

        let mut req = test_request();
        let mut resp = test_response();

        assert_eq!(chain.pre_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(pre.load(Ordering::Relaxed), 2);
        assert_eq!(post.load(Ordering::Relaxed), 0);

        assert_eq!(chain.post_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(post.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn abort_from_pre_handle_short_circuits() {
        let pre = Arc::new(AtomicUsize::new(0));
        let chain = MiddlewareChain::new()
            .with(CountPre(pre.clone()))
            .with(AbortPre)
            .with(CountPre(pre.clone()));

        let mut req = test_request();
        let mut resp = test_response();

        assert_eq!(chain.pre_handle(&mut req, &mut resp).await, Decision::Abort);
        assert_eq!(pre.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn abort_from_post_handle_short_circuits() {
        let post = Arc::new(AtomicUsize::new(0));
        let chain = MiddlewareChain::new()
            .with(CountPost(post.clone()))
            .with(AbortPost)
            .with(CountPost(post.clone()));

        let mut req = test_request();
        let mut resp = test_response();

        // Reverse order: the last middleware runs first, then the abort stops
        // the first one from running.
        assert_eq!(chain.post_handle(&mut req, &mut resp).await, Decision::Abort);
        assert_eq!(post.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn empty_chain_is_a_no_op() {
        let chain = MiddlewareChain::new();
        let mut req = test_request();
        let mut resp = test_response();

        assert_eq!(chain.pre_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(chain.post_handle(&mut req, &mut resp).await, Decision::Proceed);
    }

    #[tokio::test]
    async fn suspending_middlewares_run_sequentially() {
        let chain = MiddlewareChain::new()
            .with(AppendAfterYield("A"))
            .with(AppendAfterYield("B"))
            .with(AppendAfterYield("C"));

        let mut req = test_request();
        let mut resp = test_response();

        assert_eq!(chain.pre_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(resp.body(), "ABC");
    }

    #[tokio::test]
    async fn mixing_suspending_and_immediate_middlewares() {
        let pre = Arc::new(AtomicUsize::new(0));
        let chain = MiddlewareChain::new()
            .with(CountPre(pre.clone()))
            .with(AppendAfterYield("X"))
            .with(CountPre(pre.clone()))
            .with(AppendAfterYield("Y"));

        let mut req = test_request();
        let mut resp = test_response();

        assert_eq!(chain.pre_handle(&mut req, &mut resp).await, Decision::Proceed);
        assert_eq!(pre.load(Ordering::Relaxed), 2);
        assert_eq!(resp.body(), "XY");
    }

    #[tokio::test]
    async fn suspending_abort_after_immediate_middleware() {
        let pre = Arc::new(AtomicUsize::new(0));
        let chain = MiddlewareChain::new()
            .with(CountPre(pre.clone()))
            .with(AbortAfterYield)
            .with(CountPre(pre.clone()));

        let mut req = test_request();
        let mut resp = test_response();

        assert_eq!(chain.pre_handle(&mut req, &mut resp).await, Decision::Abort);
        assert_eq!(pre.load(Ordering::Relaxed), 1);
    }
}
