#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use medwatch_api::config::ServerConfig;
use medwatch_api::routes;
use medwatch_api::state::AppState;
use medwatch_events::{ExpoPushSender, NotificationFanout, PushConfig};
use medwatch_pipeline::config::SourceConfig;
use medwatch_pipeline::{SyncConfig, SyncOrchestrator};
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub const TRIGGER_TOKEN: &str = "test-trigger-token";

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8081".to_string()],
        request_timeout_secs: 30,
        sync_trigger_token: Some(TRIGGER_TOKEN.to_string()),
    }
}

/// Write a registry file as Latin-1, one record per line.
pub fn write_registry_file(dir: &Path, name: &str, lines: &[&str]) {
    let text: String = lines.iter().map(|l| format!("{l}\n")).collect();
    let bytes: Vec<u8> = text.chars().map(|c| c as u32 as u8).collect();
    std::fs::write(dir.join(name), bytes).unwrap();
}

/// Build the full router with the production middleware stack. Sync passes
/// read registry files from `registry_dir`.
pub fn build_test_app(pool: PgPool, registry_dir: &Path) -> Router {
    build_test_app_with(pool, registry_dir, test_config())
}

pub fn build_test_app_with(pool: PgPool, registry_dir: &Path, config: ServerConfig) -> Router {
    let sync_config = SyncConfig {
        source: SourceConfig::Directory(registry_dir.to_path_buf()),
        ..SyncConfig::default()
    };
    let source = sync_config.source.build(Duration::from_secs(5)).unwrap();
    let push = ExpoPushSender::new(PushConfig::default()).unwrap();
    let fanout = NotificationFanout::new(pool.clone(), Arc::new(push));
    let orchestrator = SyncOrchestrator::new(pool.clone(), source, fanout, sync_config);

    let state = AppState {
        pool,
        config: Arc::new(config),
        orchestrator,
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:8081".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

pub async fn send(app: Router, method: Method, uri: &str, token: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
