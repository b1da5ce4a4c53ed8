//! HTTP route handlers for the dashboard API.

use std::fs;
use std::path::Path as FsPath;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use nbrun::core::types::{FileEntry, RunReport};
use nbrun::io::config::load_config;
use nbrun::io::workspace::{is_plain_file_name, list_files, place_dataset};
use nbrun::session::{SessionOptions, run_session};
use serde::Serialize;
use tracing::{info, warn};

use crate::state::{AppState, ChangeEvent};

/// Largest accepted dataset upload.
const MAX_DATASET_BYTES: usize = 64 * 1024 * 1024;

type ApiError = (StatusCode, String);

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/dataset",
            put(put_dataset).layer(DefaultBodyLimit::max(MAX_DATASET_BYTES)),
        )
        .route("/run", post(post_run))
        .route("/runs/last", get(get_last_run))
        .route("/files", get(get_files))
        .route("/files/{name}", get(get_file))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
pub struct DatasetSaved {
    name: String,
    size: usize,
}

/// PUT /api/dataset - store the body under the configured dataset name.
async fn put_dataset(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DatasetSaved>, ApiError> {
    let cfg = load_config(&state.config_path()).map_err(bad_request)?;
    place_dataset(&state.workdir, &cfg.dataset_name, &body).map_err(internal)?;
    Ok(Json(DatasetSaved {
        name: cfg.dataset_name,
        size: body.len(),
    }))
}

/// POST /api/run - run the configured script once.
///
/// 409 while another run holds the lock; 400 for pre-run errors.
async fn post_run(State(state): State<AppState>) -> Result<Json<RunReport>, ApiError> {
    let Ok(_guard) = state.run_lock.clone().try_lock_owned() else {
        return Err((StatusCode::CONFLICT, "a run is already in progress".to_string()));
    };

    state.notify(ChangeEvent::RunStarted);
    let workdir = state.workdir.clone();
    let joined =
        tokio::task::spawn_blocking(move || run_session(&workdir, &SessionOptions::default()))
            .await;
    let outcome = match joined {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(error = %err, "run task aborted");
            state.notify(ChangeEvent::RunFinished {
                failed: true,
                new_artifacts: 0,
            });
            return Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string()));
        }
    };

    let report = match outcome {
        Ok(report) => report,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "run not started");
            state.notify(ChangeEvent::RunFinished {
                failed: true,
                new_artifacts: 0,
            });
            return Err(bad_request(err));
        }
    };

    info!(
        failed = report.result.failed,
        artifacts = report.result.new_artifacts.len(),
        "run served"
    );
    state.notify(ChangeEvent::RunFinished {
        failed: report.result.failed,
        new_artifacts: report.result.new_artifacts.len(),
    });
    *state.last_report.write().await = Some(report.clone());
    Ok(Json(report))
}

/// GET /api/runs/last - the last report of this process.
async fn get_last_run(State(state): State<AppState>) -> Result<Json<RunReport>, StatusCode> {
    state
        .last_report
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/files - working directory listing.
async fn get_files(State(state): State<AppState>) -> Result<Json<Vec<FileEntry>>, ApiError> {
    list_files(&state.workdir).map(Json).map_err(internal)
}

/// GET /api/files/{name} - raw bytes of one file.
async fn get_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    if !is_plain_file_name(&name) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let path = state.workdir.join(&name);
    if !path.is_file() {
        return Err(StatusCode::NOT_FOUND);
    }
    let bytes = fs::read(&path).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], bytes))
}

fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "csv" => "text/csv; charset=utf-8",
        "json" => "application/json",
        "txt" | "rhai" | "md" | "log" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn bad_request(err: anyhow::Error) -> ApiError {
    (StatusCode::BAD_REQUEST, format!("{err:#}"))
}

fn internal(err: anyhow::Error) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_script(script: &str) -> (tempfile::TempDir, AppState) {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("notebook_code.rhai"), script).expect("script");
        let state = AppState::new(temp.path().to_path_buf());
        (temp, state)
    }

    #[tokio::test]
    async fn upload_then_run_returns_report() {
        let (_temp, state) = state_with_script(
            r#"let rows = read_csv(DATASET); print(rows.len()); plt::plot([1, 2]); plt::show();"#,
        );
        let mut rx = state.event_tx.subscribe();

        let saved = put_dataset(State(state.clone()), Bytes::from_static(b"AGE\n1\n2\n"))
            .await
            .expect("upload");
        assert_eq!(saved.0.name, "dataset.csv");

        let Json(report) = post_run(State(state.clone())).await.expect("run");
        assert_eq!(report.result.captured_output, "2\n");
        assert_eq!(report.widgets.len(), 1);

        assert_eq!(rx.try_recv().expect("started"), ChangeEvent::RunStarted);
        assert_eq!(
            rx.try_recv().expect("finished"),
            ChangeEvent::RunFinished {
                failed: false,
                new_artifacts: 0
            }
        );
        let Json(last) = get_last_run(State(state)).await.expect("last");
        assert_eq!(last, report);
    }

    #[tokio::test]
    async fn run_without_dataset_is_bad_request() {
        let (_temp, state) = state_with_script(r#"print("hi");"#);
        let (status, message) = post_run(State(state.clone())).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("dataset.csv"));
        assert_eq!(
            get_last_run(State(state)).await.unwrap_err(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let (_temp, state) = state_with_script(r#"print("hi");"#);
        let _held = state.run_lock.clone().try_lock_owned().expect("lock");
        let (status, _) = post_run(State(state)).await.unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn file_download_rejects_traversal() {
        let (_temp, state) = state_with_script("");
        let err = get_file(State(state.clone()), Path("../etc".to_string()))
            .await
            .err()
            .expect("rejected");
        assert_eq!(err, StatusCode::BAD_REQUEST);
        let err = get_file(State(state), Path("absent.png".to_string()))
            .await
            .err()
            .expect("missing");
        assert_eq!(err, StatusCode::NOT_FOUND);
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for(FsPath::new("a.PNG")), "image/png");
        assert_eq!(content_type_for(FsPath::new("a.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(FsPath::new("data.csv")), "text/csv; charset=utf-8");
        assert_eq!(content_type_for(FsPath::new("blob")), "application/octet-stream");
    }
}
