//! HTTP surface: route table, request DTOs, and handlers.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::chat::ChatCoordinator;
use crate::config::DEFAULT_USER_ID;
use crate::error::GatewayError;
use crate::uploads::{UploadOrchestrator, UploadedFile};

#[derive(Debug, Deserialize)]
pub struct AssistantChatRequest {
    // Field spellings mirror the public API contract.
    #[serde(rename = "assistentId")]
    pub assistent_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct GatewayState {
    pub uploader: Arc<UploadOrchestrator>,
    pub chat: Arc<ChatCoordinator>,
    /// Header carrying the caller's identity; absent headers fall back to a
    /// fixed single-user identity.
    pub user_header: String,
}

/// API routes
pub fn routes(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/upload-first-time", post(upload_first_time))
        .route(
            "/upload-on-existing-assistant",
            post(upload_on_existing_assistant),
        )
        .route("/assistent", post(assistant_chat))
        .layer(axum::extract::DefaultBodyLimit::disable())
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Assistant Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "File uploads and chat relay for the OpenAI Assistants API"
    }))
}

/// Drain the multipart body: `file` fields become uploads, `assistantId` is
/// captured as text. Unknown fields are skipped.
async fn collect_multipart(multipart: &mut Multipart) -> (Vec<UploadedFile>, Option<String>) {
    let mut files = Vec::new();
    let mut assistant_id = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or("upload.bin").to_string();
            if let Ok(bytes) = field.bytes().await {
                files.push(UploadedFile {
                    name: filename,
                    bytes,
                });
            }
        } else if name == "assistantId" {
            if let Ok(text) = field.text().await {
                assistant_id = Some(text);
            }
        }
    }

    (files, assistant_id)
}

fn extract_user_id(headers: &HeaderMap, user_header: &str) -> String {
    headers
        .get(user_header)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_USER_ID)
        .to_string()
}

async fn upload_first_time(
    State(state): State<GatewayState>,
    mut multipart: Multipart,
) -> Response {
    let (files, _) = collect_multipart(&mut multipart).await;
    if files.is_empty() {
        return (StatusCode::BAD_REQUEST, "No files were uploaded.").into_response();
    }

    match state.uploader.create_assistant_with_files(files).await {
        Ok(assistant_id) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "New assistant created with uploaded files.",
                "assistantId": assistant_id
            })),
        )
            .into_response(),
        Err(err) => upload_error(err),
    }
}

async fn upload_on_existing_assistant(
    State(state): State<GatewayState>,
    mut multipart: Multipart,
) -> Response {
    let (files, assistant_id) = collect_multipart(&mut multipart).await;
    if files.is_empty() {
        return (StatusCode::BAD_REQUEST, "No files were uploaded.").into_response();
    }
    let assistant_id = match assistant_id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => return (StatusCode::BAD_REQUEST, "Assistant ID is required").into_response(),
    };

    match state.uploader.attach_files(&assistant_id, files).await {
        Ok(assistant_id) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Files uploaded and added to existing assistant's vector store.",
                "assistantId": assistant_id
            })),
        )
            .into_response(),
        Err(err) => upload_error(err),
    }
}

fn upload_error(err: GatewayError) -> Response {
    error!("Upload failed: {}", err);
    match err {
        GatewayError::Validation(message) => {
            (StatusCode::BAD_REQUEST, message).into_response()
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "message": other.to_string() })),
        )
            .into_response(),
    }
}

async fn assistant_chat(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(request): Json<AssistantChatRequest>,
) -> Response {
    let assistant_id = match request.assistent_id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "message": "Assistant ID is required" })),
            )
                .into_response()
        }
    };
    let message = match request.message.filter(|text| !text.is_empty()) {
        Some(text) => text,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "message": "Message is required" })),
            )
                .into_response()
        }
    };

    let user_id = extract_user_id(&headers, &state.user_header);

    match state.chat.send_message(&user_id, &assistant_id, &message).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(serde_json::json!({ "response": reply })),
        )
            .into_response(),
        Err(err) => {
            error!("Chat relay failed for user {}: {}", user_id, err);
            match err {
                GatewayError::Validation(message) => (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "message": message })),
                )
                    .into_response(),
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": other.to_string() })),
                )
                    .into_response(),
            }
        }
    }
}
