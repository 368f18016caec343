//! # shelf-api — Axum API Service for the Shelf Chart Repository
//!
//! The HTTP surface over the repository index coherence engine.
//!
//! ## API Surface
//!
//! | Route                              | Module             | Notes |
//! |------------------------------------|--------------------|-------|
//! | `GET /index.yaml`                  | [`routes::index`]  | serialized repository index |
//! | `GET /charts/:filename`            | [`routes::objects`]| artifact download |
//! | `GET /api/charts`                  | [`routes::charts`] | all charts |
//! | `GET /api/charts/:name`            | [`routes::charts`] | versions of one chart |
//! | `GET /api/charts/:name/:version`   | [`routes::charts`] | one version (`latest` ok) |
//! | `POST /api/charts`                 | [`routes::manage`] | multipart or raw upload |
//! | `POST /api/prov`                   | [`routes::manage`] | provenance upload |
//! | `DELETE /api/charts/:name/:version`| [`routes::manage`] | delete a version |
//! | `GET /health`                      | here               | liveness probe |
//! | `GET /openapi.json`                | [`openapi`]        | OpenAPI document |
//!
//! The `/api` routes are mounted only when the API is enabled in
//! [`state::RepoConfig`]; without them the server is a read-only
//! repository.
//!
//! ## Refresh modes
//!
//! With a zero cache interval every read reconciles the index against the
//! backend inline (strongest freshness, reads serialize with writes). With
//! a non-zero interval reads are lock-free against a published snapshot
//! maintained by the background ticker and by incremental mutation
//! updates.

pub mod cache;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(routes::index::router())
        .merge(routes::objects::router());

    if state.config.enable_api {
        router = router
            .merge(routes::charts::router())
            .merge(routes::manage::router());
    }

    router
        .merge(openapi::router())
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe — returns 200 whenever the process is serving.
async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RepoConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use shelf_storage::LocalBackend;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app(config: RepoConfig) -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalBackend::new(dir.path()));
        let state = AppState::new(backend, config);
        (dir, app(state))
    }

    #[tokio::test]
    async fn health_probe_responds() {
        let (_dir, app) = test_app(RepoConfig::default());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn disabled_api_unmounts_chart_routes() {
        let (_dir, app) = test_app(RepoConfig {
            enable_api: false,
            ..RepoConfig::default()
        });
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/charts").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // The repository surface itself stays up.
        let response = app
            .oneshot(Request::builder().uri("/index.yaml").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn index_yaml_of_empty_repository_is_a_valid_document() {
        let (_dir, app) = test_app(RepoConfig::default());
        let response = app
            .oneshot(Request::builder().uri("/index.yaml").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            shelf_repo::INDEX_FILE_CONTENT_TYPE
        );
        use http_body_util::BodyExt;
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = std::str::from_utf8(&bytes).unwrap();
        assert!(
            body.contains("apiVersion"),
            "empty repository must still serve a well-formed index: {body:?}"
        );
    }
}
