pub mod api;
pub mod config;
pub mod error;
pub mod worker;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use xlport_xlsx::{Dispatcher, Template};

use crate::config::Config;
use crate::worker::WorkerHandle;

/// Application state shared across all handlers
#[derive(Clone, Debug)]
pub struct AppState {
    pub worker: WorkerHandle,
}

/// Load the configured template, or the built-in one.
pub fn load_template(config: &Config) -> anyhow::Result<Template> {
    let Some(path) = &config.template else {
        return Ok(Template::default());
    };
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading template {}", path.display()))?;
    let template = Template::from_bytes(&bytes)
        .with_context(|| format!("loading template {}", path.display()))?;
    tracing::info!(path = %path.display(), "using custom template");
    Ok(template)
}

/// Build the router around a running worker
pub fn app(state: AppState, config: &Config) -> Router {
    Router::new()
        .merge(api::router())
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the server with the given configuration
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let template = load_template(&config)?;
    let worker = WorkerHandle::spawn(Dispatcher::new(template))?;
    let app = app(AppState { worker }, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use xlport_core::{Cell, CellCoord, SerializedModel, SerializedSheet};
    use xlport_xlsx::XLSX_MEDIA_TYPE;

    fn test_app() -> Router {
        let worker = WorkerHandle::spawn(Dispatcher::default()).unwrap();
        app(AppState { worker }, &Config::default())
    }

    fn model_json() -> String {
        let mut sheet = SerializedSheet::new("s1", "Report");
        sheet.set_cell(CellCoord::new(0, 0), Cell::number(42.0));
        serde_json::to_string(&SerializedModel::new(vec![sheet])).unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    fn post(uri: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["worker"], true);
    }

    #[tokio::test]
    async fn test_export_then_import() {
        let app = test_app();
        let response = app
            .clone()
            .oneshot(post("/api/export", "application/json", model_json()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_MEDIA_TYPE);
        assert_eq!(response.headers()["x-xlport-warnings"], "0");
        let package = body_bytes(response).await;
        assert!(package.starts_with(b"PK"));

        let response = app
            .oneshot(post("/api/import", "application/octet-stream", package))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let model: SerializedModel = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(model.sheets[0].name, "Report");
        assert_eq!(
            model.sheets[0].get_cell(CellCoord::new(0, 0)).unwrap().value,
            Cell::number(42.0).value
        );
    }

    #[tokio::test]
    async fn test_worker_protocol_errors_stay_in_protocol() {
        let response = test_app()
            .oneshot(post(
                "/api/worker",
                "application/json",
                json!({"command": "export", "sheet": {"sheets": []}}).to_string(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_bad_package_is_unprocessable() {
        let response = test_app()
            .oneshot(post("/api/import", "application/octet-stream", "not a zip"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
