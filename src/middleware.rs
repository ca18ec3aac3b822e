//! Middleware trait, the `next` continuation, and the scoped registry.
//!
//! A middleware receives the request and a [`Next`] holding the rest of the
//! chain. It continues with `next.run(req).await`, finalizes the exchange by
//! returning its own response without running the continuation, or aborts by
//! returning an error, which propagates to the router's top-level catch. The
//! chain is strictly sequential: a middleware never starts before its
//! predecessor has continued.
//!
//! Write one either as a plain function returning a boxed future:
//!
//! ```rust,no_run
//! use ramal::{BoxFuture, Error, Next, Request, Response};
//!
//! fn request_id(req: Request, next: Next<'_>) -> BoxFuture<'_, Result<Response, Error>> {
//!     Box::pin(async move {
//!         let mut res = next.run(req).await?;
//!         res.add_header("x-request-id", "1");
//!         Ok(res)
//!     })
//! }
//! ```
//!
//! or by implementing [`Middleware`] on a type that carries state.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Distinct request paths whose applicable-middleware list is memoized.
/// Bounded so high-cardinality paths (UUID-bearing URLs) cannot grow the
/// cache without limit; evicted paths are recomputed on their next hit.
const APPLICABLE_CACHE_CAP: usize = 512;

// ── Middleware trait ──────────────────────────────────────────────────────────

/// A cross-cutting handler run before route resolution (when registered on
/// the router) or before a specific route's handler (when wrapped on an
/// endpoint).
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Error>>;
}

/// Any `fn(Request, Next) -> BoxFuture` is a middleware.
impl<F> Middleware for F
where
    F: Send + Sync + 'static,
    F: for<'a> Fn(Request, Next<'a>) -> BoxFuture<'a, Result<Response, Error>>,
{
    fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Error>> {
        self(req, next)
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The action a chain ends in once every middleware has continued: the route
/// handler for an endpoint chain, route resolution for the router's global
/// chain.
pub(crate) trait Terminal: Send + Sync {
    fn call<'a>(&'a self, req: Request) -> BoxFuture<'a, Result<Response, Error>>;
}

/// The remainder of a middleware chain.
///
/// Consumed by [`run`](Next::run), so a middleware can continue the chain at
/// most once. Dropping it without running it finalizes the exchange with
/// whatever the middleware returns instead.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    terminal: &'a (dyn Terminal + 'a),
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn Middleware>], terminal: &'a (dyn Terminal + 'a)) -> Self {
        Self { chain, terminal }
    }

    /// Runs the rest of the chain and returns its response.
    pub async fn run(self, req: Request) -> Result<Response, Error> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                head.handle(req, Next { chain: rest, terminal: self.terminal }).await
            }
            None => self.terminal.call(req).await,
        }
    }
}

// ── Scoped registry ───────────────────────────────────────────────────────────

struct Entry {
    prefix: Option<String>,
    middleware: Arc<dyn Middleware>,
}

impl Entry {
    /// Plain string-prefix test, not segment-aware: an entry scoped to
    /// `/api` also applies to `/apikey/x`.
    fn applies_to(&self, path: &str) -> bool {
        match &self.prefix {
            None => true,
            Some(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

/// Ordered, optionally path-scoped middleware entries, with a bounded
/// per-path cache of the applicable subset.
pub(crate) struct MiddlewareStack {
    entries: Vec<Entry>,
    cache: Mutex<LruCache<String, Arc<Vec<Arc<dyn Middleware>>>>>,
}

impl MiddlewareStack {
    pub(crate) fn new() -> Self {
        let cap = NonZeroUsize::new(APPLICABLE_CACHE_CAP).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Vec::new(), cache: Mutex::new(LruCache::new(cap)) }
    }

    /// Appends an entry and invalidates the cached applicability index.
    pub(crate) fn push(&mut self, prefix: Option<String>, middleware: Arc<dyn Middleware>) {
        self.entries.push(Entry { prefix, middleware });
        self.lock_cache().clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries applying to `path`, in registration order.
    pub(crate) fn applicable(&self, path: &str) -> Arc<Vec<Arc<dyn Middleware>>> {
        let mut cache = self.lock_cache();
        if let Some(hit) = cache.get(path) {
            return Arc::clone(hit);
        }
        let list: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.applies_to(path))
            .map(|entry| Arc::clone(&entry.middleware))
            .collect();
        let list = Arc::new(list);
        cache.put(path.to_owned(), Arc::clone(&list));
        list
    }

    fn lock_cache(&self) -> MutexGuard<'_, LruCache<String, Arc<Vec<Arc<dyn Middleware>>>>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(req: Request, next: Next<'_>) -> BoxFuture<'_, Result<Response, Error>> {
        Box::pin(async move { next.run(req).await })
    }

    fn stack(prefixes: &[Option<&str>]) -> (MiddlewareStack, Vec<Arc<dyn Middleware>>) {
        let mut stack = MiddlewareStack::new();
        let mut handles = Vec::new();
        for prefix in prefixes {
            let mw: Arc<dyn Middleware> = Arc::new(pass);
            stack.push(prefix.map(str::to_owned), Arc::clone(&mw));
            handles.push(mw);
        }
        (stack, handles)
    }

    fn applied(stack: &MiddlewareStack, handles: &[Arc<dyn Middleware>], path: &str) -> Vec<usize> {
        stack
            .applicable(path)
            .iter()
            .map(|mw| handles.iter().position(|h| Arc::ptr_eq(h, mw)).unwrap())
            .collect()
    }

    #[test]
    fn pathless_applies_everywhere() {
        let (stack, handles) = stack(&[None]);
        assert_eq!(applied(&stack, &handles, "/anything"), [0]);
    }

    #[test]
    fn prefix_scopes_by_string_prefix() {
        let (stack, handles) = stack(&[Some("/admin")]);
        assert_eq!(applied(&stack, &handles, "/admin"), [0]);
        assert_eq!(applied(&stack, &handles, "/admin/x"), [0]);
        assert!(applied(&stack, &handles, "/public").is_empty());
        // Not segment-aware: /adminx shares the string prefix.
        assert_eq!(applied(&stack, &handles, "/adminx"), [0]);
    }

    #[test]
    fn registration_order_is_preserved() {
        let (stack, handles) = stack(&[Some("/api"), None, Some("/api/v1")]);
        assert_eq!(applied(&stack, &handles, "/api/v1/x"), [0, 1, 2]);
        assert_eq!(applied(&stack, &handles, "/api/zzz"), [0, 1]);
        assert_eq!(applied(&stack, &handles, "/other"), [1]);
    }

    #[test]
    fn repeated_paths_hit_the_cache() {
        let (stack, _) = stack(&[None]);
        let first = stack.applicable("/a");
        let second = stack.applicable("/a");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn push_invalidates_the_cache() {
        let (mut stack, _) = stack(&[None]);
        let before = stack.applicable("/a");
        stack.push(None, Arc::new(pass));
        let after = stack.applicable("/a");
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.len(), 2);
    }
}
