//! The write surface: chart and provenance uploads, version deletion.
//!
//! Uploads never trust a client-chosen path — the stored filename is
//! always derived from the uploaded content. Every handler here holds the
//! cache lock for its whole critical section (conflict probe, backend
//! write, incremental index update) so writers serialize and the
//! `(index, storage cache)` pair can never tear.

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::routing::{delete, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cache::CacheState;
use crate::error::AppError;
use crate::state::AppState;
use shelf_repo::chart::{
    chart_package_filename, chart_package_filename_from_content, provenance_filename,
    provenance_filename_from_content,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/charts", post(post_charts))
        .route("/api/prov", post(post_provenance))
        .route("/api/charts/:name/:version", delete(delete_chart_version))
}

/// Body returned by successful uploads.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SavedResponse {
    pub saved: bool,
}

/// Body returned by successful deletes.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedResponse {
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactKind {
    Chart,
    Provenance,
}

/// One validated upload: canonical filename plus the bytes to store.
struct ArtifactFile {
    filename: String,
    content: Bytes,
    kind: ArtifactKind,
    field: String,
}

/// POST /api/charts — Publish a chart package.
///
/// Accepts either a multipart form (chart and/or provenance fields, field
/// names per configuration) or the classic raw-body upload carrying
/// package bytes alone.
#[utoipa::path(
    post,
    path = "/api/charts",
    responses(
        (status = 201, description = "Artifact(s) stored", body = SavedResponse),
        (status = 400, description = "Undecodable or missing content", body = crate::error::ErrorBody),
        (status = 409, description = "Already exists and overwrite is disabled", body = crate::error::ErrorBody),
        (status = 500, description = "Backend failure", body = crate::error::ErrorBody),
    ),
    tag = "manage"
)]
pub async fn post_charts(
    State(state): State<AppState>,
    request: Request,
) -> Result<(StatusCode, Json<SavedResponse>), AppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|err| AppError::BadRequest(err.to_string()))?;
        post_multipart_charts(state, multipart).await
    } else {
        let content = Bytes::from_request(request, &())
            .await
            .map_err(|err| AppError::Internal(err.to_string()))?;
        post_raw_chart(state, content).await
    }
}

/// Form-based upload of a chart package and/or its provenance file.
async fn post_multipart_charts(
    state: AppState,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SavedResponse>), AppError> {
    let mut guard = state.cache.lock_state().await;

    let mut files: Vec<ArtifactFile> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.to_string()))?
    {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };
        let kind = if field_name == state.config.chart_post_form_field_name {
            ArtifactKind::Chart
        } else if field_name == state.config.prov_post_form_field_name {
            ArtifactKind::Provenance
        } else {
            continue;
        };

        let content = field
            .bytes()
            .await
            .map_err(|err| AppError::Internal(err.to_string()))?;
        if content.is_empty() {
            continue;
        }

        let filename = match kind {
            ArtifactKind::Chart => chart_package_filename_from_content(&content),
            ArtifactKind::Provenance => provenance_filename_from_content(&content),
        }
        .map_err(|err| AppError::BadRequest(err.to_string()))?;

        ensure_writable(&state, &filename).await?;
        files.push(ArtifactFile {
            filename,
            content,
            kind,
            field: field_name,
        });
    }

    if files.is_empty() {
        return Err(AppError::BadRequest(format!(
            "no package or provenance file found in form fields {} and {}",
            state.config.chart_post_form_field_name, state.config.prov_post_form_field_name
        )));
    }

    store_files(&state, &mut guard, &files).await?;
    Ok((StatusCode::CREATED, Json(SavedResponse { saved: true })))
}

/// Store every validated file, admitting charts into the index as we go.
///
/// A multipart upload carrying both files is not atomic across the two
/// writes: on failure, everything already stored is best-effort deleted.
/// If that cleanup itself fails, storage is left with a partial upload and
/// the original error is still returned.
async fn store_files(
    state: &AppState,
    guard: &mut CacheState,
    files: &[ArtifactFile],
) -> Result<(), AppError> {
    let mut stored: Vec<&str> = Vec::new();
    let mut failure: Option<AppError> = None;

    for file in files {
        tracing::debug!(filename = %file.filename, field = %file.field, "adding file to storage");
        if let Err(err) = state
            .backend
            .put_object(&file.filename, file.content.clone())
            .await
        {
            failure = Some(err.into());
            break;
        }
        stored.push(&file.filename);

        if state.config.periodic_refresh() && file.kind == ArtifactKind::Chart {
            let admitted = match state.backend.get_object(&file.filename).await {
                Ok(object) => state.cache.add_chart(guard, object).map_err(AppError::from),
                Err(err) => Err(err.into()),
            };
            if let Err(err) = admitted {
                failure = Some(err);
                break;
            }
        }
    }

    let Some(err) = failure else { return Ok(()) };
    for filename in stored {
        if let Err(cleanup_err) = state.backend.delete_object(filename).await {
            tracing::warn!(
                %filename,
                error = %cleanup_err,
                "cleanup of stored file failed after upload error"
            );
        }
    }
    Err(err)
}

/// Classic raw-body chart upload.
async fn post_raw_chart(
    state: AppState,
    content: Bytes,
) -> Result<(StatusCode, Json<SavedResponse>), AppError> {
    let mut guard = state.cache.lock_state().await;

    let filename = chart_package_filename_from_content(&content)
        .map_err(|err| AppError::BadRequest(err.to_string()))?;

    if !state.config.allow_overwrite {
        match state.backend.get_object(&filename).await {
            Ok(_) => return Err(AppError::AlreadyExists(filename)),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
    }

    tracing::debug!(package = %filename, "adding package to storage");
    state.backend.put_object(&filename, content).await?;

    if state.config.periodic_refresh() {
        let object = state.backend.get_object(&filename).await?;
        state.cache.add_chart(&mut guard, object)?;
    }
    Ok((StatusCode::CREATED, Json(SavedResponse { saved: true })))
}

/// POST /api/prov — Publish a detached provenance file.
#[utoipa::path(
    post,
    path = "/api/prov",
    responses(
        (status = 201, description = "Provenance stored", body = SavedResponse),
        (status = 400, description = "Undecodable provenance", body = crate::error::ErrorBody),
        (status = 500, description = "Already exists, or backend failure", body = crate::error::ErrorBody),
    ),
    tag = "manage"
)]
pub async fn post_provenance(
    State(state): State<AppState>,
    content: Bytes,
) -> Result<(StatusCode, Json<SavedResponse>), AppError> {
    // Provenance files never enter the index, but writers still serialize.
    let _guard = state.cache.lock_state().await;

    let filename = provenance_filename_from_content(&content)
        .map_err(|err| AppError::BadRequest(err.to_string()))?;

    if !state.config.allow_overwrite {
        match state.backend.get_object(&filename).await {
            Ok(_) => return Err(AppError::AlreadyExists(filename)),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
    }

    tracing::debug!(provenance_file = %filename, "adding provenance file to storage");
    state.backend.put_object(&filename, content).await?;
    Ok((StatusCode::CREATED, Json(SavedResponse { saved: true })))
}

/// DELETE /api/charts/:name/:version — Remove a chart version.
///
/// Deletes the package (404 when absent), best-effort deletes its
/// provenance file, and retires the version from the index.
#[utoipa::path(
    delete,
    path = "/api/charts/{name}/{version}",
    params(
        ("name" = String, Path, description = "Chart name"),
        ("version" = String, Path, description = "Chart version"),
    ),
    responses(
        (status = 200, description = "Chart version deleted", body = DeletedResponse),
        (status = 404, description = "No such chart version", body = crate::error::ErrorBody),
        (status = 500, description = "Backend failure", body = crate::error::ErrorBody),
    ),
    tag = "manage"
)]
pub async fn delete_chart_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, String)>,
) -> Result<Json<DeletedResponse>, AppError> {
    let mut guard = state.cache.lock_state().await;

    let filename = chart_package_filename(&name, &version);
    tracing::debug!(package = %filename, "deleting package from storage");
    state.backend.delete_object(&filename).await?;

    // The provenance file may simply not exist; anything else is worth a
    // warning but never fails the delete.
    let prov = provenance_filename(&name, &version);
    if let Err(err) = state.backend.delete_object(&prov).await {
        if !err.is_not_found() {
            tracing::warn!(provenance_file = %prov, error = %err, "provenance cleanup failed");
        }
    }

    if state.config.periodic_refresh() {
        state.cache.remove_chart(&mut guard, &filename)?;
    }
    Ok(Json(DeletedResponse { deleted: true }))
}

/// Conflict probe: with overwrite disabled, only a `NotFound` from the
/// backend grants permission to create the file.
async fn ensure_writable(state: &AppState, filename: &str) -> Result<(), AppError> {
    if state.config.allow_overwrite {
        return Ok(());
    }
    match state.backend.get_object(filename).await {
        Ok(_) => Err(AppError::Conflict(format!("{filename} already exists"))),
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use http_body_util::BodyExt;
    use std::io::Write;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::state::{AppState, RepoConfig};
    use shelf_storage::{Backend, LocalBackend};

    fn chart_tgz(name: &str, version: &str) -> Bytes {
        let manifest = format!("name: {name}\nversion: \"{version}\"\n");
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(manifest.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{name}/Chart.yaml"), manifest.as_bytes())
            .unwrap();
        let tarball = builder.into_inner().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tarball).unwrap();
        Bytes::from(encoder.finish().unwrap())
    }

    fn test_state(config: RepoConfig) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalBackend::new(dir.path()));
        (dir, AppState::new(backend, config))
    }

    fn raw_upload(content: Bytes) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/charts")
            .header("content-type", "application/octet-stream")
            .body(Body::from(content))
            .unwrap()
    }

    #[tokio::test]
    async fn raw_upload_stores_package() {
        let (_dir, state) = test_state(RepoConfig::default());
        let backend = state.backend.clone();
        let app = crate::app(state);

        let response = app.oneshot(raw_upload(chart_tgz("alpha", "1.0"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], br#"{"saved":true}"#);

        assert!(backend.get_object("alpha-1.0.pkg").await.is_ok());
    }

    #[tokio::test]
    async fn raw_upload_of_garbage_is_bad_request() {
        let (_dir, state) = test_state(RepoConfig::default());
        let app = crate::app(state);
        let response = app
            .oneshot(raw_upload(Bytes::from_static(b"not a chart")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn raw_upload_conflict_is_a_server_error() {
        let (_dir, state) = test_state(RepoConfig::default());
        let app = crate::app(state.clone());

        let first = app
            .clone()
            .oneshot(raw_upload(chart_tgz("alpha", "1.0")))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app.oneshot(raw_upload(chart_tgz("alpha", "1.0"))).await.unwrap();
        // The classic binary route has always reported conflicts as 500.
        assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn raw_upload_overwrite_allowed_when_configured() {
        let (_dir, state) = test_state(RepoConfig {
            allow_overwrite: true,
            ..RepoConfig::default()
        });
        let app = crate::app(state);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(raw_upload(chart_tgz("alpha", "1.0")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }
    }

    #[tokio::test]
    async fn periodic_mode_admits_upload_into_index_immediately() {
        let (_dir, state) = test_state(RepoConfig {
            cache_interval: std::time::Duration::from_secs(3600),
            ..RepoConfig::default()
        });
        state.cache.reconcile().await.unwrap();
        let app = crate::app(state.clone());

        let response = app.oneshot(raw_upload(chart_tgz("alpha", "1.0"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // No reconcile ran; the incremental path must have updated the index.
        assert!(state.cache.current().get("alpha", "1.0").is_some());
    }

    #[tokio::test]
    async fn delete_missing_chart_returns_404() {
        let (_dir, state) = test_state(RepoConfig::default());
        let app = crate::app(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/charts/ghost/1.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn provenance_upload_roundtrip() {
        let (_dir, state) = test_state(RepoConfig::default());
        let backend = state.backend.clone();
        let app = crate::app(state);

        let prov = "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA512\n\n\
                    name: alpha\nversion: \"1.0\"\n\n\
                    -----BEGIN PGP SIGNATURE-----\nsig\n-----END PGP SIGNATURE-----\n";
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/prov")
                    .body(Body::from(prov))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(backend.get_object("alpha-1.0.pkg.prov").await.is_ok());
    }
}
