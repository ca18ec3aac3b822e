//! # ramal
//!
//! A minimal HTTP router for Rust services: Express-style middleware
//! chaining, `:param` and `*` path patterns, and recursive sub-router
//! mounting. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! ramal owns the part of a service that changes between applications:
//!
//! - **Matching** — a backtracking path trie with static > `:param` > `*`
//!   precedence and an exact-match fast path for literal routes
//! - **Middleware** — ordered, optionally path-scoped chains with an explicit
//!   `next` continuation, at the router level and per route
//! - **Mounting** — child routers nested under a prefix, matched recursively
//!   with the prefix stripped
//! - **Fallbacks** — unmatched paths answer `404 Not Found`; uncaught errors
//!   are logged and answer `500 Internal Server Error`, detail withheld
//!
//! Everything a reverse proxy already ships — TLS, rate limiting, body-size
//! limits, slow-client protection — ramal intentionally ignores. The bundled
//! [`Server`] is a thin tokio/hyper transport with graceful shutdown; the
//! router is equally happy driven directly through [`Router::handle`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ramal::{Error, Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/users/:id", get_user)
//!         .get("/files/*", get_file);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Error> {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes()))
//! }
//!
//! async fn get_file(req: Request) -> Result<Response, Error> {
//!     Ok(Response::text(req.param("*").unwrap_or("").to_owned()))
//! }
//! ```
//!
//! Middleware continues the chain with `next.run(req).await`, finalizes the
//! exchange by returning its own response, or aborts with an error:
//!
//! ```rust,no_run
//! use ramal::{BoxFuture, Error, Next, Request, Response, Router, StatusCode};
//!
//! fn require_token(req: Request, next: Next<'_>) -> BoxFuture<'_, Result<Response, Error>> {
//!     Box::pin(async move {
//!         if req.header("authorization").is_none() {
//!             return Ok(Response::status(StatusCode::UNAUTHORIZED));
//!         }
//!         next.run(req).await
//!     })
//! }
//!
//! let app = Router::new().with_at("/admin", require_token);
//! ```

mod endpoint;
mod error;
mod handler;
mod matcher;
mod method;
mod middleware;
mod path;
mod request;
mod response;
mod router;
mod server;

pub mod health;

pub use endpoint::{Endpoint, IntoEndpoint};
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use http::StatusCode;
pub use method::Method;
pub use middleware::{Middleware, Next};
pub use path::{normalize_path, parse_query};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{RouteInfo, Router};
pub use server::Server;
