//! HTTP request handlers.

use askama::Template;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;

use super::template_structs::{IndexTemplate, ResultTemplate};
use super::upload::{receive_upload, UploadError};
use super::AppState;
use crate::services::ProcessOptions;

fn render_index(state: &AppState, error: Option<String>) -> Html<String> {
    let template = IndexTemplate {
        error,
        allowed_extensions: state.settings.allowed_extensions.join(", "),
    };
    Html(
        template
            .render()
            .unwrap_or_else(|e| format!("Template error: {}", e)),
    )
}

fn upload_status(err: &UploadError) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Upload form.
pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    render_index(&state, None)
}

/// Process a form upload and redirect to its result page.
pub async fn process_form(State(state): State<AppState>, multipart: Multipart) -> Response {
    let upload = match receive_upload(multipart, &state.settings).await {
        Ok(upload) => upload,
        Err(e) => {
            tracing::warn!("Rejected upload: {}", e);
            return (upload_status(&e), render_index(&state, Some(e.to_string()))).into_response();
        }
    };

    let result = state
        .pipeline
        .process(
            upload.path(),
            ProcessOptions {
                skip_faces: upload.skip_faces,
            },
        )
        .await;

    let result_id = state
        .results
        .write()
        .await
        .insert(upload.filename.clone(), result);

    Redirect::to(&format!("/result/{}", result_id)).into_response()
}

/// Show a stored result once; it is removed from the store when viewed.
/// Unknown, already viewed and expired ids get 404.
pub async fn show_result(
    State(state): State<AppState>,
    Path(result_id): Path<String>,
) -> Response {
    let stored = state.results.write().await.take(&result_id);
    let Some(stored) = stored else {
        return (
            StatusCode::NOT_FOUND,
            render_index(&state, Some("Result not found or expired".to_string())),
        )
            .into_response();
    };

    let template = ResultTemplate::new(&stored.filename, &stored.result);
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Template error: {}", e),
        )
            .into_response(),
    }
}

/// Process an upload and return the result as JSON.
pub async fn api_process(State(state): State<AppState>, multipart: Multipart) -> Response {
    let upload = match receive_upload(multipart, &state.settings).await {
        Ok(upload) => upload,
        Err(e) => {
            return (upload_status(&e), Json(json!({ "error": e.to_string() }))).into_response();
        }
    };

    let result = state
        .pipeline
        .process(
            upload.path(),
            ProcessOptions {
                skip_faces: upload.skip_faces,
            },
        )
        .await;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(result)).into_response()
}

/// Liveness check.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "analyzer": state.pipeline.analyzer_name(),
    }))
}
