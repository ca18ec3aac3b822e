//! Minimal ramal example — JSON endpoints, scoped middleware, a mounted
//! sub-router, and health checks.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl http://localhost:3000/api/v1/widgets/7
//!   curl -X POST http://localhost:3000/api/v1/widgets \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"gear"}'
//!   curl http://localhost:3000/admin/stats            # 401 without a token
//!   curl http://localhost:3000/healthz

use ramal::{
    BoxFuture, Endpoint, Error, Next, Request, Response, Router, Server, StatusCode, health,
};
use serde_json::json;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // Sub-router mounted under /api/v1 — it matches against the stripped path.
    let api = Router::new()
        .get("/widgets/:id", get_widget)
        .post(
            "/widgets",
            Endpoint::new(create_widget)
                .wrap(require_json)
                .schema(json!({ "type": "object", "required": ["name"] })),
        );

    let app = Router::new()
        .with(request_log)
        .with_at("/admin", require_token)
        .get("/users/:id", get_user)
        .get("/admin/stats", admin_stats)
        .get("/healthz", health::liveness)
        .get("/readyz", health::readiness)
        .nest("/api/v1", api);

    for route in app.routes() {
        info!(method = %route.method, path = %route.path, "route");
    }

    Server::bind("0.0.0.0:3000").serve(app).await.expect("server error");
}

// Logs method, path, and status once the rest of the chain has produced a
// response.
fn request_log(req: Request, next: Next<'_>) -> BoxFuture<'_, Result<Response, Error>> {
    Box::pin(async move {
        let method = req.method();
        let path = req.path().to_owned();
        let response = next.run(req).await?;
        info!(%method, %path, status = response.status_code().as_u16(), "request");
        Ok(response)
    })
}

fn require_token(req: Request, next: Next<'_>) -> BoxFuture<'_, Result<Response, Error>> {
    Box::pin(async move {
        if req.header("authorization").is_none() {
            return Ok(Response::status(StatusCode::UNAUTHORIZED));
        }
        next.run(req).await
    })
}

fn require_json(req: Request, next: Next<'_>) -> BoxFuture<'_, Result<Response, Error>> {
    Box::pin(async move {
        match req.header("content-type") {
            Some(ct) if ct.starts_with("application/json") => next.run(req).await,
            _ => Ok(Response::status(StatusCode::UNSUPPORTED_MEDIA_TYPE)),
        }
    })
}

async fn get_user(req: Request) -> Result<Response, Error> {
    let id = req.param("id").unwrap_or("unknown");
    Ok(Response::json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes()))
}

async fn get_widget(req: Request) -> Result<Response, Error> {
    let id = req.param("id").unwrap_or("unknown");
    Ok(Response::json(format!(r#"{{"id":"{id}","kind":"widget"}}"#).into_bytes()))
}

async fn create_widget(req: Request) -> Result<Response, Error> {
    if req.body().is_empty() {
        return Ok(Response::status(StatusCode::BAD_REQUEST));
    }
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/api/v1/widgets/99")
        .json(r#"{"id":"99"}"#.to_owned().into_bytes()))
}

async fn admin_stats(_req: Request) -> Result<Response, Error> {
    Ok(Response::json(r#"{"requests":12345}"#.to_owned().into_bytes()))
}
