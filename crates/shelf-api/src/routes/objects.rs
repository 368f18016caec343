//! Raw artifact downloads.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::error::AppError;
use crate::state::AppState;
use shelf_repo::{
    CHART_PACKAGE_CONTENT_TYPE, CHART_PACKAGE_FILE_EXTENSION, PROVENANCE_FILE_CONTENT_TYPE,
    PROVENANCE_FILE_EXTENSION,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/charts/:filename", get(get_storage_object))
}

/// GET /charts/:filename — Download a chart package or provenance file.
///
/// Serves straight from the backend; the index is not consulted, so a
/// download works even for artifacts the index has not absorbed yet.
#[utoipa::path(
    get,
    path = "/charts/{filename}",
    params(("filename" = String, Path, description = "Artifact filename, `.pkg` or `.pkg.prov`")),
    responses(
        (status = 200, description = "Artifact bytes"),
        (status = 404, description = "No such artifact", body = crate::error::ErrorBody),
        (status = 500, description = "Unsupported extension or backend failure", body = crate::error::ErrorBody),
    ),
    tag = "repo"
)]
pub async fn get_storage_object(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let is_provenance = filename.ends_with(&format!(".{PROVENANCE_FILE_EXTENSION}"));
    let is_chart = !is_provenance && filename.ends_with(&format!(".{CHART_PACKAGE_FILE_EXTENSION}"));
    if !is_chart && !is_provenance {
        return Err(AppError::UnsupportedExtension(filename));
    }

    let object = state.backend.get_object(&filename).await?;
    let content_type = if is_provenance {
        PROVENANCE_FILE_CONTENT_TYPE
    } else {
        CHART_PACKAGE_CONTENT_TYPE
    };
    Ok(([(header::CONTENT_TYPE, content_type)], object.content))
}
