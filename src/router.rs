//! The request router.
//!
//! Registration is chained and happens once, at startup; handling is
//! read-only and shared across connection tasks. One exchange flows:
//! normalize the path and parse the query, run the applicable global
//! middleware as a chain whose terminal action is route resolution, resolve
//! (exact table, then pattern trie, then mounted sub-routers in registration
//! order), bind path parameters, run the route's own chain and handler. An
//! unmatched path answers `404 Not Found`; an error that reaches the top is
//! logged and answers `500 Internal Server Error`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::error;

use crate::endpoint::{Endpoint, IntoEndpoint};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::matcher::Node;
use crate::method::Method;
use crate::middleware::{Middleware, MiddlewareStack, Next, Terminal};
use crate::path::{normalize_path, parse_query, segments};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve)
/// or drive it directly with [`handle`](Router::handle). Each registration
/// method returns `self` so registrations chain naturally. Registration is
/// append-only: there is no route removal, and a router must not be mutated
/// once it is serving.
pub struct Router {
    prefix: Option<String>,
    routes: Vec<Route>,
    exact: HashMap<Method, HashMap<String, usize>>,
    trees: HashMap<Method, Node>,
    middleware: MiddlewareStack,
    mounts: Vec<Mount>,
}

struct Route {
    method: Method,
    path: String,
    param_names: Vec<String>,
    endpoint: Endpoint,
}

/// A child router attached under an optional path prefix.
struct Mount {
    prefix: Option<String>,
    router: Router,
}

impl Mount {
    /// The path the child would see, if this mount is eligible for `path`.
    fn strip(&self, path: &str) -> Option<String> {
        match &self.prefix {
            None => Some(path.to_owned()),
            Some(prefix) => {
                if path == prefix {
                    Some("/".to_owned())
                } else {
                    let rest = path.strip_prefix(prefix.as_str())?;
                    rest.starts_with('/').then(|| rest.to_owned())
                }
            }
        }
    }
}

/// One registered route, as reported by [`Router::routes`].
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub method: Method,
    /// Pattern with any mount prefixes applied, e.g. `/api/users/:id`.
    pub path: String,
    /// `:name` tokens in pattern order; a trailing wildcard is `*`.
    pub param_names: Vec<String>,
    pub schema: Option<Value>,
}

impl Router {
    pub fn new() -> Self {
        Self::with_base(None)
    }

    /// A router whose every registration — routes, scoped middleware, and
    /// mounts — implicitly carries `prefix`.
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = normalize_path(prefix);
        Self::with_base((prefix != "/").then_some(prefix))
    }

    fn with_base(prefix: Option<String>) -> Self {
        Self {
            prefix,
            routes: Vec::new(),
            exact: HashMap::new(),
            trees: HashMap::new(),
            middleware: MiddlewareStack::new(),
            mounts: Vec::new(),
        }
    }

    // ── Registration ─────────────────────────────────────────────────────────

    pub fn get<M>(self, path: &str, endpoint: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Get, path, endpoint)
    }

    pub fn post<M>(self, path: &str, endpoint: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Post, path, endpoint)
    }

    pub fn put<M>(self, path: &str, endpoint: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Put, path, endpoint)
    }

    pub fn delete<M>(self, path: &str, endpoint: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Delete, path, endpoint)
    }

    pub fn patch<M>(self, path: &str, endpoint: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Patch, path, endpoint)
    }

    pub fn head<M>(self, path: &str, endpoint: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Head, path, endpoint)
    }

    pub fn options<M>(self, path: &str, endpoint: impl IntoEndpoint<M>) -> Self {
        self.on(Method::Options, path, endpoint)
    }

    /// Registers an endpoint for a method + path pattern. Patterns use
    /// `:name` for a single dynamic segment and a trailing `*` to capture
    /// the rest of the path.
    pub fn on<M>(mut self, method: Method, path: &str, endpoint: impl IntoEndpoint<M>) -> Self {
        self.add(method, path, endpoint.into_endpoint());
        self
    }

    fn add(&mut self, method: Method, path: &str, endpoint: Endpoint) {
        let path = self.prefixed(path);
        let id = self.routes.len();
        if is_literal(&path) {
            // Fast-path table for patternless routes; the trie stays the
            // source of truth and holds every route.
            self.exact.entry(method).or_default().entry(path.clone()).or_insert(id);
        }
        self.trees.entry(method).or_default().insert(&path, id);
        let param_names = param_names(&path);
        self.routes.push(Route { method, path, param_names, endpoint });
    }

    /// Registers a global middleware, applied to every request this router
    /// handles, in registration order.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        let prefix = self.prefix.clone();
        self.middleware.push(prefix, Arc::new(middleware));
        self
    }

    /// Registers a middleware scoped to a path prefix.
    ///
    /// Scoping is a plain string-prefix test on the normalized request path,
    /// not segment-aware: middleware at `/api` also runs for `/apikey/x`.
    pub fn with_at(mut self, path: &str, middleware: impl Middleware) -> Self {
        let prefix = self.prefixed(path);
        self.middleware.push(Some(prefix), Arc::new(middleware));
        self
    }

    /// Mounts a child router under a path prefix. A request under the prefix
    /// that this router does not match itself is delegated to the child with
    /// the prefix stripped from its path.
    pub fn nest(mut self, prefix: &str, child: Router) -> Self {
        let prefix = self.prefixed(prefix);
        let prefix = (prefix != "/").then_some(prefix);
        self.mounts.push(Mount { prefix, router: child });
        self
    }

    /// Mounts a child router with no prefix: the child sees the request path
    /// unchanged.
    pub fn merge(mut self, child: Router) -> Self {
        self.mounts.push(Mount { prefix: self.prefix.clone(), router: child });
        self
    }

    fn prefixed(&self, path: &str) -> String {
        let path = normalize_path(path);
        match &self.prefix {
            None => path,
            Some(prefix) => join_under(prefix, &path),
        }
    }

    // ── Introspection ────────────────────────────────────────────────────────

    /// Every registered route, recursively including mounted children with
    /// their prefixes applied. Consumed by startup listings and
    /// documentation tooling; the router itself never reads it.
    pub fn routes(&self) -> Vec<RouteInfo> {
        let mut out: Vec<RouteInfo> = self
            .routes
            .iter()
            .map(|route| RouteInfo {
                method: route.method,
                path: route.path.clone(),
                param_names: route.param_names.clone(),
                schema: route.endpoint.schema.clone(),
            })
            .collect();
        for mount in &self.mounts {
            for mut info in mount.router.routes() {
                if let Some(prefix) = &mount.prefix {
                    info.path = join_under(prefix, &info.path);
                }
                out.push(info);
            }
        }
        out
    }

    // ── Handling ─────────────────────────────────────────────────────────────

    /// Handles one exchange and produces its response. Infallible from the
    /// caller's side: misses become `404` and uncaught errors become `500`
    /// (logged, detail withheld from the client).
    pub async fn handle(&self, mut req: Request) -> Response {
        let raw = req.url().split('?').next().unwrap_or_default().to_owned();
        let query = parse_query(req.url());
        req.prepare(normalize_path(&raw), query);

        let method = req.method();
        let path = req.path().to_owned();
        match self.dispatch(req).await {
            Ok(response) => response,
            Err(err) => {
                error!(method = %method, path = %path, error = %err, "request failed");
                Response::internal_error()
            }
        }
    }

    /// Global middleware chain, ending in route resolution. Boxed because
    /// mount delegation recurses through it.
    fn dispatch<'a>(&'a self, req: Request) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(async move {
            if self.middleware.is_empty() {
                return self.resolve(req).await;
            }
            let chain = self.middleware.applicable(req.path());
            let terminal = ResolveTerminal(self);
            Next::new(chain.as_slice(), &terminal).run(req).await
        })
    }

    async fn resolve(&self, mut req: Request) -> Result<Response, Error> {
        let method = req.method();

        if let Some(&id) = self.exact.get(&method).and_then(|table| table.get(req.path())) {
            req.set_params(HashMap::new());
            return self.routes[id].endpoint.run(req).await;
        }

        if let Some(tree) = self.trees.get(&method) {
            if let Some((id, bindings)) = tree.search(req.path()) {
                req.set_params(bindings.into_iter().collect());
                return self.routes[id].endpoint.run(req).await;
            }
        }

        for mount in &self.mounts {
            let Some(stripped) = mount.strip(req.path()) else {
                continue;
            };
            // Only delegate when the child actually owns the stripped path,
            // so a miss here cannot swallow a later sibling's match or this
            // router's own 404.
            if !mount.router.owns(method, &stripped) {
                continue;
            }
            req.rewrite_for_mount(&stripped);
            return mount.router.dispatch(req).await;
        }

        Ok(Response::not_found())
    }

    /// Whether this router (or, recursively, one of its mounts) has a route
    /// for the method + path.
    fn owns(&self, method: Method, path: &str) -> bool {
        if self.exact.get(&method).is_some_and(|table| table.contains_key(path)) {
            return true;
        }
        if self.trees.get(&method).is_some_and(|tree| tree.matches(path)) {
            return true;
        }
        self.mounts.iter().any(|mount| {
            mount
                .strip(path)
                .is_some_and(|stripped| mount.router.owns(method, &stripped))
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

struct ResolveTerminal<'r>(&'r Router);

impl Terminal for ResolveTerminal<'_> {
    fn call<'a>(&'a self, req: Request) -> BoxFuture<'a, Result<Response, Error>> {
        Box::pin(self.0.resolve(req))
    }
}

fn join_under(prefix: &str, path: &str) -> String {
    if path == "/" { prefix.to_owned() } else { format!("{prefix}{path}") }
}

fn is_literal(path: &str) -> bool {
    segments(path).iter().all(|seg| !seg.starts_with(':') && *seg != "*")
}

fn param_names(path: &str) -> Vec<String> {
    let mut names = Vec::new();
    for seg in segments(path) {
        if seg == "*" {
            names.push("*".to_owned());
            break;
        }
        if let Some(name) = seg.strip_prefix(':') {
            names.push(name.to_owned());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use http::StatusCode;
    use serde_json::json;

    use super::*;

    async fn pong(_req: Request) -> Result<Response, Error> {
        Ok(Response::text("pong"))
    }

    fn body_text(res: &Response) -> &str {
        std::str::from_utf8(res.body()).unwrap()
    }

    type Log = Arc<Mutex<Vec<String>>>;

    /// Appends its tag to the log, then continues the chain.
    struct Tag {
        log: Log,
        name: &'static str,
    }

    impl Middleware for Tag {
        fn handle<'a>(&'a self, req: Request, next: Next<'a>) -> BoxFuture<'a, Result<Response, Error>> {
            self.log.lock().unwrap().push(self.name.to_owned());
            Box::pin(async move { next.run(req).await })
        }
    }

    fn boom(_req: Request, _next: Next<'_>) -> BoxFuture<'_, Result<Response, Error>> {
        Box::pin(async { Err(Error::msg("boom")) })
    }

    fn deny(_req: Request, _next: Next<'_>) -> BoxFuture<'_, Result<Response, Error>> {
        Box::pin(async { Ok(Response::builder().status(StatusCode::UNAUTHORIZED).text("denied")) })
    }

    #[tokio::test]
    async fn exact_route_resolves_with_empty_params() {
        let app = Router::new().get("/health", |req: Request| async move {
            assert!(req.params().is_empty());
            Ok::<_, Error>(Response::text("ok"))
        });
        let res = app.handle(Request::new(Method::Get, "/health")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(body_text(&res), "ok");
    }

    #[tokio::test]
    async fn missing_route_is_404() {
        let app = Router::new().get("/health", pong);
        let res = app.handle(Request::new(Method::Get, "/missing")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(&res), "Not Found");
    }

    #[tokio::test]
    async fn method_mismatch_is_404() {
        let app = Router::new().get("/health", pong);
        let res = app.handle(Request::new(Method::Post, "/health")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn params_bind_from_the_pattern() {
        let app = Router::new().post("/users/:id", |req: Request| async move {
            Ok::<_, Error>(Response::text(req.param("id").unwrap_or("").to_owned()))
        });
        let res = app.handle(Request::new(Method::Post, "/users/42")).await;
        assert_eq!(body_text(&res), "42");
    }

    #[tokio::test]
    async fn wildcard_binds_the_tail() {
        let app = Router::new().get("/files/*", |req: Request| async move {
            Ok::<_, Error>(Response::text(req.param("*").unwrap_or("").to_owned()))
        });
        let res = app.handle(Request::new(Method::Get, "/files/a/b.txt")).await;
        assert_eq!(body_text(&res), "a/b.txt");
    }

    #[tokio::test]
    async fn static_route_beats_param_route() {
        let app = Router::new()
            .get("/users/me", |_req: Request| async { Ok::<_, Error>(Response::text("me")) })
            .get("/users/:id", |req: Request| async move {
                Ok::<_, Error>(Response::text(format!("id={}", req.param("id").unwrap_or(""))))
            });
        let res = app.handle(Request::new(Method::Get, "/users/me")).await;
        assert_eq!(body_text(&res), "me");
        let res = app.handle(Request::new(Method::Get, "/users/7")).await;
        assert_eq!(body_text(&res), "id=7");
    }

    #[tokio::test]
    async fn trailing_slash_and_empty_url_normalize() {
        let app = Router::new()
            .get("/", |_req: Request| async { Ok::<_, Error>(Response::text("root")) })
            .get("/users", pong);
        assert_eq!(body_text(&app.handle(Request::new(Method::Get, "")).await), "root");
        assert_eq!(body_text(&app.handle(Request::new(Method::Get, "/users/")).await), "pong");
    }

    #[tokio::test]
    async fn query_is_parsed_and_decoded() {
        let app = Router::new().get("/search", |req: Request| async move {
            Ok::<_, Error>(Response::text(req.query("q").unwrap_or("").to_owned()))
        });
        let res = app.handle(Request::new(Method::Get, "/search?q=rust%20lang")).await;
        assert_eq!(body_text(&res), "rust lang");
    }

    #[tokio::test]
    async fn global_then_route_middleware_then_handler() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);
        let handler = move |_req: Request| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().unwrap().push("handler".to_owned());
                Ok::<_, Error>(Response::text(""))
            }
        };
        let app = Router::new()
            .with(Tag { log: Arc::clone(&log), name: "global" })
            .get(
                "/x",
                Endpoint::new(handler)
                    .wrap(Tag { log: Arc::clone(&log), name: "route-a" })
                    .wrap(Tag { log: Arc::clone(&log), name: "route-b" }),
            );
        app.handle(Request::new(Method::Get, "/x")).await;
        assert_eq!(*log.lock().unwrap(), ["global", "route-a", "route-b", "handler"]);
    }

    #[tokio::test]
    async fn middleware_error_yields_500_and_skips_the_route() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let handler = move |_req: Request| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, Error>(Response::text("hit"))
            }
        };
        let app = Router::new().with(boom).get("/x", handler);
        let res = app.handle(Request::new(Method::Get, "/x")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(&res), "Internal Server Error");
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn handler_error_yields_500() {
        let app = Router::new().get("/x", |_req: Request| async {
            Err::<Response, _>(Error::msg("db down"))
        });
        let res = app.handle(Request::new(Method::Get, "/x")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(&res), "Internal Server Error");
    }

    #[tokio::test]
    async fn middleware_can_finalize_without_continuing() {
        let app = Router::new().with_at("/admin", deny).get("/admin/stats", pong);
        let res = app.handle(Request::new(Method::Get, "/admin/stats")).await;
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_text(&res), "denied");
    }

    #[tokio::test]
    async fn scoped_middleware_skips_other_prefixes() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .with_at("/admin", Tag { log: Arc::clone(&log), name: "admin" })
            .get("/admin/stats", pong)
            .get("/public", pong);
        app.handle(Request::new(Method::Get, "/public")).await;
        assert!(log.lock().unwrap().is_empty());
        app.handle(Request::new(Method::Get, "/admin/stats")).await;
        assert_eq!(*log.lock().unwrap(), ["admin"]);
    }

    #[tokio::test]
    async fn nested_router_sees_the_stripped_path() {
        let child = Router::new().get("/widgets/:id", |req: Request| async move {
            Ok::<_, Error>(Response::text(format!(
                "{}|{}|{}",
                req.path(),
                req.url(),
                req.param("id").unwrap_or("")
            )))
        });
        let app = Router::new().nest("/api", child);
        let res = app.handle(Request::new(Method::Get, "/api/widgets/7?v=1")).await;
        assert_eq!(body_text(&res), "/widgets/7|/widgets/7?v=1|7");
    }

    #[tokio::test]
    async fn nested_miss_falls_through_to_the_parent_404() {
        let child = Router::new().get("/ping", pong);
        let app = Router::new().nest("/v1", child);
        let res = app.handle(Request::new(Method::Get, "/v1/ping")).await;
        assert_eq!(body_text(&res), "pong");
        let res = app.handle(Request::new(Method::Get, "/v1/pingx")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(&res), "Not Found");
    }

    #[tokio::test]
    async fn sibling_mounts_are_tried_in_order() {
        let first = Router::new().get("/a", |_req: Request| async { Ok::<_, Error>(Response::text("first")) });
        let second = Router::new().get("/b", |_req: Request| async { Ok::<_, Error>(Response::text("second")) });
        let app = Router::new().nest("/api", first).nest("/api", second);
        let res = app.handle(Request::new(Method::Get, "/api/b")).await;
        assert_eq!(body_text(&res), "second");
    }

    #[tokio::test]
    async fn mount_prefix_alone_maps_to_the_child_root() {
        let child = Router::new().get("/", |_req: Request| async { Ok::<_, Error>(Response::text("child root")) });
        let app = Router::new().nest("/api", child);
        let res = app.handle(Request::new(Method::Get, "/api")).await;
        assert_eq!(body_text(&res), "child root");
    }

    #[tokio::test]
    async fn nested_error_still_becomes_500() {
        let child = Router::new().get("/ping", |_req: Request| async {
            Err::<Response, _>(Error::msg("child failed"))
        });
        let app = Router::new().nest("/v1", child);
        let res = app.handle(Request::new(Method::Get, "/v1/ping")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn nested_child_runs_its_own_middleware() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let child = Router::new()
            .with(Tag { log: Arc::clone(&log), name: "child" })
            .get("/ping", pong);
        let app = Router::new()
            .with(Tag { log: Arc::clone(&log), name: "parent" })
            .nest("/v1", child);
        app.handle(Request::new(Method::Get, "/v1/ping")).await;
        assert_eq!(*log.lock().unwrap(), ["parent", "child"]);
    }

    #[tokio::test]
    async fn merged_router_sees_the_full_path() {
        let child = Router::new().get("/ping", pong);
        let app = Router::new().merge(child);
        let res = app.handle(Request::new(Method::Get, "/ping")).await;
        assert_eq!(body_text(&res), "pong");
    }

    #[tokio::test]
    async fn base_prefix_rewrites_registrations() {
        let app = Router::with_prefix("/api").get("/users", pong);
        let res = app.handle(Request::new(Method::Get, "/api/users")).await;
        assert_eq!(body_text(&res), "pong");
        let res = app.handle(Request::new(Method::Get, "/users")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn routes_lists_mounted_children_with_prefixes() {
        let child = Router::new().get("/ping", pong);
        let app = Router::new()
            .get(
                "/users/:id",
                Endpoint::new(pong).schema(json!({ "type": "object" })),
            )
            .get("/files/*", pong)
            .nest("/v1", child);
        let infos = app.routes();
        let paths: Vec<&str> = infos.iter().map(|info| info.path.as_str()).collect();
        assert_eq!(paths, ["/users/:id", "/files/*", "/v1/ping"]);
        assert_eq!(infos[0].param_names, ["id"]);
        assert!(infos[0].schema.is_some());
        assert_eq!(infos[1].param_names, ["*"]);
        assert!(infos[2].schema.is_none());
    }
}
