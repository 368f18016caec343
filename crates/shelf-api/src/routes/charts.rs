//! Chart query endpoints over the in-memory index.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::error::AppError;
use crate::state::AppState;
use shelf_repo::chart::ChartVersion;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/charts", get(list_charts))
        .route("/api/charts/:name", get(get_chart))
        .route("/api/charts/:name/:version", get(get_chart_version))
}

/// Reconcile inline when the server runs in refresh-on-read mode.
async fn refresh_if_on_read(state: &AppState) -> Result<(), AppError> {
    if state.config.refresh_on_read() {
        state.cache.reconcile().await?;
    }
    Ok(())
}

/// GET /api/charts — All charts with all their versions.
#[utoipa::path(
    get,
    path = "/api/charts",
    responses(
        (status = 200, description = "Map of chart name to versions, newest first"),
        (status = 500, description = "Backend failure", body = crate::error::ErrorBody),
    ),
    tag = "charts"
)]
pub async fn list_charts(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Vec<ChartVersion>>>, AppError> {
    refresh_if_on_read(&state).await?;
    Ok(Json(state.cache.current().entries.clone()))
}

/// GET /api/charts/:name — All versions of one chart, newest first.
#[utoipa::path(
    get,
    path = "/api/charts/{name}",
    params(("name" = String, Path, description = "Chart name")),
    responses(
        (status = 200, description = "Versions of the chart, newest first"),
        (status = 404, description = "Unknown chart", body = crate::error::ErrorBody),
    ),
    tag = "charts"
)]
pub async fn get_chart(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<ChartVersion>>, AppError> {
    refresh_if_on_read(&state).await?;
    state
        .cache
        .current()
        .entries
        .get(&name)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("chart {name} not found")))
}

/// GET /api/charts/:name/:version — One chart version.
///
/// `latest` selects the newest version of the chart.
#[utoipa::path(
    get,
    path = "/api/charts/{name}/{version}",
    params(
        ("name" = String, Path, description = "Chart name"),
        ("version" = String, Path, description = "Chart version, or `latest`"),
    ),
    responses(
        (status = 200, description = "The chart version"),
        (status = 404, description = "Unknown chart or version", body = crate::error::ErrorBody),
    ),
    tag = "charts"
)]
pub async fn get_chart_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<ChartVersion>, AppError> {
    let version = if version == "latest" { String::new() } else { version };
    refresh_if_on_read(&state).await?;
    state
        .cache
        .current()
        .get(&name, &version)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("chart {name} version {version} not found")))
}
