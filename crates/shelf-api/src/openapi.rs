//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the repository API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shelf Chart Repository API",
        version = "0.3.2",
        description = "Self-hosted chart repository server.\n\nServes the canonical `index.yaml`, raw artifact downloads, and — when write mode is enabled — chart publication and deletion.",
        license(name = "Apache-2.0")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        crate::routes::index::get_index_file,
        crate::routes::objects::get_storage_object,
        crate::routes::charts::list_charts,
        crate::routes::charts::get_chart,
        crate::routes::charts::get_chart_version,
        crate::routes::manage::post_charts,
        crate::routes::manage::post_provenance,
        crate::routes::manage::delete_chart_version,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::manage::SavedResponse,
            crate::routes::manage::DeletedResponse,
        ),
    ),
    tags(
        (name = "repo", description = "Repository index and artifact downloads"),
        (name = "charts", description = "Chart queries over the in-memory index"),
        (name = "manage", description = "Chart publication and deletion"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router, serving the JSON spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_generates_successfully() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Shelf Chart Repository API");
    }

    #[test]
    fn spec_has_repository_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/index.yaml",
            "/charts/{filename}",
            "/api/charts",
            "/api/charts/{name}",
            "/api/charts/{name}/{version}",
            "/api/prov",
        ] {
            assert!(
                spec.paths.paths.contains_key(path),
                "spec should contain {path}"
            );
        }
    }

    #[test]
    fn spec_has_error_schema() {
        let spec = ApiDoc::openapi();
        let schemas = &spec.components.as_ref().unwrap().schemas;
        assert!(schemas.contains_key("ErrorBody"));
        assert!(schemas.contains_key("SavedResponse"));
    }

    #[test]
    fn spec_serializes_to_json() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("openapi"));
        assert!(json.contains("/index.yaml"));
    }
}
