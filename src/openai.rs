//! Typed client for the OpenAI Assistants API (v2).
//!
//! Covers exactly the remote surface the gateway consumes: vector stores and
//! file batches, assistants, threads, messages, and runs. All calls go
//! through the [`AssistantApi`] trait so the orchestration layers can be
//! exercised against a scripted backend in tests.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GatewayError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

// ---------------------------------------------------------------------------
// Resource types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStore {
    pub id: String,
    pub name: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub id: String,
    pub filename: String,
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreFileBatch {
    pub id: String,
    pub vector_store_id: String,
    pub status: BatchStatus,
    pub file_counts: Option<FileCounts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileCounts {
    pub in_progress: u32,
    pub completed: u32,
    pub failed: u32,
    pub cancelled: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
            BatchStatus::Failed => "failed",
        }
    }
}

/// Tools an assistant can be configured with. Serializes to the wire shape
/// `{"type": "file_search"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    FileSearch,
    CodeInterpreter,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_search: Option<FileSearchResources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_interpreter: Option<CodeInterpreterResources>,
}

impl ToolResources {
    /// Resources referencing a single file-search vector store.
    pub fn file_search(vector_store_id: &str) -> Self {
        Self {
            file_search: Some(FileSearchResources {
                vector_store_ids: vec![vector_store_id.to_string()],
            }),
            code_interpreter: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSearchResources {
    #[serde(default)]
    pub vector_store_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeInterpreterResources {
    #[serde(default)]
    pub file_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Assistant {
    pub id: String,
    pub name: Option<String>,
    pub model: String,
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    pub tool_resources: Option<ToolResources>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAssistantRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_resources: Option<ToolResources>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateAssistantRequest {
    pub tool_resources: ToolResources,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
    pub created_at: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateMessageRequest {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    pub run_id: Option<String>,
    pub assistant_id: Option<String>,
}

impl Message {
    /// Text of the first text content block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            MessageContent::Text { text } => Some(text.value.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: MessageText },
    ImageFile { image_file: serde_json::Value },
    ImageUrl { image_url: serde_json::Value },
    Refusal { refusal: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageText {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub assistant_id: String,
    pub status: RunStatus,
    pub last_error: Option<LastError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Incomplete,
    Expired,
}

impl RunStatus {
    /// Whether the remote service will not transition this status further.
    /// `requires_action` is treated as terminal: the gateway submits no tool
    /// outputs, so such a run can never complete.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
            RunStatus::Incomplete => "incomplete",
            RunStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRunRequest {
    pub assistant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

#[derive(Debug, Clone, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: RemoteErrorDetail,
}

#[derive(Debug, Deserialize)]
struct RemoteErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Trait seam
// ---------------------------------------------------------------------------

/// The remote operations the gateway consumes, as one mockable surface.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn create_vector_store(&self, name: &str) -> Result<VectorStore, GatewayError>;
    async fn upload_file(&self, path: &Path) -> Result<FileObject, GatewayError>;
    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> Result<VectorStoreFileBatch, GatewayError>;
    async fn get_file_batch(
        &self,
        vector_store_id: &str,
        batch_id: &str,
    ) -> Result<VectorStoreFileBatch, GatewayError>;
    async fn create_assistant(
        &self,
        request: CreateAssistantRequest,
    ) -> Result<Assistant, GatewayError>;
    async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant, GatewayError>;
    async fn update_assistant(
        &self,
        assistant_id: &str,
        request: UpdateAssistantRequest,
    ) -> Result<Assistant, GatewayError>;
    async fn create_thread(&self) -> Result<Thread, GatewayError>;
    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<Message, GatewayError>;
    async fn create_run(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> Result<Run, GatewayError>;
    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError>;
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, GatewayError>;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| GatewayError::validation("API key contains invalid characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            HeaderName::from_static("openai-beta"),
            HeaderValue::from_static("assistants=v2"),
        );

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };

        Ok(Self { http, base_url })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        route: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base_url, route);
        debug!("OpenAI request [{}] {}", method, url);

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        Self::decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, route: &str) -> Result<T, GatewayError> {
        self.request(Method::GET, route, None).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let value = serde_json::to_value(body)
            .map_err(|e| GatewayError::validation(format!("unserializable body: {}", e)))?;
        self.request(Method::POST, route, Some(value)).await
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        route: &str,
        form: Form,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base_url, route);
        debug!("OpenAI request [POST multipart] {}", url);
        let response = self.http.post(&url).multipart(form).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let raw = response.text().await.unwrap_or_default();
        Err(remote_error(status, &raw))
    }
}

fn remote_error(status: StatusCode, raw: &str) -> GatewayError {
    match serde_json::from_str::<ErrorBody>(raw) {
        Ok(body) => GatewayError::Remote {
            message: body.error.message,
            error_type: body
                .error
                .error_type
                .unwrap_or_else(|| "unknown".to_string()),
        },
        Err(_) => GatewayError::Remote {
            message: format!("HTTP {}: {}", status.as_u16(), raw),
            error_type: "unknown".to_string(),
        },
    }
}

#[async_trait]
impl AssistantApi for OpenAiClient {
    async fn create_vector_store(&self, name: &str) -> Result<VectorStore, GatewayError> {
        self.post("vector_stores", &serde_json::json!({ "name": name }))
            .await
    }

    async fn upload_file(&self, path: &Path) -> Result<FileObject, GatewayError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let bytes = tokio::fs::read(path).await?;
        debug!("Uploading {} ({} bytes) to file store", filename, bytes.len());

        let part = Part::stream(bytes)
            .file_name(filename)
            .mime_str(mime.as_ref())?;
        let form = Form::new().part("file", part).text("purpose", "assistants");

        self.post_form("files", form).await
    }

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> Result<VectorStoreFileBatch, GatewayError> {
        self.post(
            &format!("vector_stores/{}/file_batches", vector_store_id),
            &serde_json::json!({ "file_ids": file_ids }),
        )
        .await
    }

    async fn get_file_batch(
        &self,
        vector_store_id: &str,
        batch_id: &str,
    ) -> Result<VectorStoreFileBatch, GatewayError> {
        self.get(&format!(
            "vector_stores/{}/file_batches/{}",
            vector_store_id, batch_id
        ))
        .await
    }

    async fn create_assistant(
        &self,
        request: CreateAssistantRequest,
    ) -> Result<Assistant, GatewayError> {
        self.post("assistants", &request).await
    }

    async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant, GatewayError> {
        self.get(&format!("assistants/{}", assistant_id)).await
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        request: UpdateAssistantRequest,
    ) -> Result<Assistant, GatewayError> {
        self.post(&format!("assistants/{}", assistant_id), &request)
            .await
    }

    async fn create_thread(&self) -> Result<Thread, GatewayError> {
        self.post("threads", &serde_json::json!({})).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<Message, GatewayError> {
        self.post(&format!("threads/{}/messages", thread_id), &request)
            .await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> Result<Run, GatewayError> {
        self.post(&format!("threads/{}/runs", thread_id), &request)
            .await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        self.get(&format!("threads/{}/runs/{}", thread_id, run_id))
            .await
    }

    /// Newest message first. The ordering is pinned with an explicit query
    /// parameter rather than relying on the remote default.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, GatewayError> {
        let list: List<Message> = self
            .get(&format!("threads/{}/messages?order=desc", thread_id))
            .await?;
        Ok(list.data)
    }
}
