//! The registrable unit: a handler plus its route-local middleware chain.

use std::sync::Arc;

use serde_json::Value;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::middleware::{Middleware, Next, Terminal};
use crate::request::Request;
use crate::response::Response;

/// A terminal handler, optionally wrapped in ordered middleware and tagged
/// with schema metadata.
///
/// Bare handlers register directly; build an `Endpoint` when a route needs
/// its own middleware or a schema:
///
/// ```rust,no_run
/// # use ramal::{Endpoint, Error, Request, Response, Router};
/// # fn require_auth(req: Request, next: ramal::Next<'_>) -> ramal::BoxFuture<'_, Result<Response, Error>> { unimplemented!() }
/// # async fn create_user(_req: Request) -> Result<Response, Error> { Ok(Response::text("")) }
/// Router::new().post(
///     "/users",
///     Endpoint::new(create_user)
///         .wrap(require_auth)
///         .schema(serde_json::json!({ "type": "object" })),
/// );
/// ```
pub struct Endpoint {
    pub(crate) middlewares: Vec<Arc<dyn Middleware>>,
    pub(crate) handler: BoxedHandler,
    pub(crate) schema: Option<Value>,
}

impl Endpoint {
    pub fn new(handler: impl Handler) -> Self {
        Self { middlewares: Vec::new(), handler: handler.into_boxed_handler(), schema: None }
    }

    /// Appends a route-local middleware. Wrap order is run order.
    pub fn wrap(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Attaches schema metadata. Opaque to the router — it is only carried
    /// through to [`Router::routes`](crate::Router::routes) for
    /// documentation and startup-listing consumers.
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Runs the route-local chain, then the handler. With no middleware the
    /// handler is invoked directly.
    pub(crate) async fn run(&self, req: Request) -> Result<Response, Error> {
        if self.middlewares.is_empty() {
            return self.handler.call(req).await;
        }
        let terminal = HandlerTerminal(&self.handler);
        Next::new(&self.middlewares, &terminal).run(req).await
    }
}

struct HandlerTerminal<'h>(&'h BoxedHandler);

impl Terminal for HandlerTerminal<'_> {
    fn call<'a>(&'a self, req: Request) -> BoxFuture<'a, Result<Response, Error>> {
        self.0.call(req)
    }
}

// ── IntoEndpoint ──────────────────────────────────────────────────────────────

/// Anything a route can be registered with: a bare handler or a built
/// [`Endpoint`]. The `M` marker only disambiguates the two blanket impls;
/// inference always picks it for you.
pub trait IntoEndpoint<M> {
    fn into_endpoint(self) -> Endpoint;
}

#[doc(hidden)]
pub enum BareHandler {}

#[doc(hidden)]
pub enum BuiltEndpoint {}

impl<H: Handler> IntoEndpoint<BareHandler> for H {
    fn into_endpoint(self) -> Endpoint {
        Endpoint::new(self)
    }
}

impl IntoEndpoint<BuiltEndpoint> for Endpoint {
    fn into_endpoint(self) -> Endpoint {
        self
    }
}
