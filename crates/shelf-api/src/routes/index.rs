//! The repository index endpoint.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::error::AppError;
use crate::state::AppState;
use shelf_repo::INDEX_FILE_CONTENT_TYPE;

pub fn router() -> Router<AppState> {
    Router::new().route("/index.yaml", get(get_index_file))
}

/// GET /index.yaml — The serialized repository index.
///
/// In refresh-on-read mode the index is reconciled against the backend
/// before serving, so out-of-band storage mutations are visible to the
/// very next request.
#[utoipa::path(
    get,
    path = "/index.yaml",
    responses(
        (status = 200, description = "Repository index in YAML form"),
        (status = 500, description = "Backend failure", body = crate::error::ErrorBody),
    ),
    tag = "repo"
)]
pub async fn get_index_file(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    if state.config.refresh_on_read() {
        state.cache.reconcile().await?;
    }
    Ok((
        [(header::CONTENT_TYPE, INDEX_FILE_CONTENT_TYPE)],
        state.cache.index_bytes(),
    ))
}
