// rest/mod.rs — HTTP server for the task API and the embedded client.
//
// Endpoints:
//   GET    /api/task          list all tasks
//   POST   /api/task          insert, 201 + Location
//   GET    /api/task/{id}     fetch one, 404 if absent
//   PUT    /api/task/{id}     full update, 204 / 400 / 404
//   DELETE /api/task/{id}     remove, 204 / 404
//   GET    /api/health
//   GET    /api/openapi.json
//   /, /app.js, /style.css    embedded client; unmatched non-API paths fall
//                             back to index.html

pub mod error;
pub mod openapi;
pub mod routes;

use anyhow::Result;
use axum::{http::HeaderValue, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::{web, AppContext};

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("todod listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = cors_layer(&ctx.config);
    Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/openapi.json", get(openapi::openapi_spec))
        .route(
            "/api/task",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/api/task/{id}",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .merge(web::router())
        .layer(cors)
        .with_state(ctx)
}

/// An empty allowlist means any origin may call the API — the usual case,
/// since the client is served from this binary and same-origin requests
/// carry no CORS preflight at all.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parse_origins(&config.cors_allowed_origins)))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Parse the configured CORS allowlist, warning on each entry that is not
/// a valid header value rather than dropping it silently.
fn parse_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(origin = %origin, err = %err, "ignoring malformed CORS origin from config");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origins_keeps_valid_and_drops_malformed() {
        let origins = vec![
            "http://localhost:5173".to_string(),
            "bad\norigin".to_string(),
        ];
        let parsed = parse_origins(&origins);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0], HeaderValue::from_static("http://localhost:5173"));
    }
}
