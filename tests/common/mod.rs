//! Shared test support: a scripted in-memory assistant backend that records
//! every remote call, plus helpers for building gateway state and multipart
//! bodies.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use assistant_gateway::api::GatewayState;
use assistant_gateway::chat::ChatCoordinator;
use assistant_gateway::config::PollPolicy;
use assistant_gateway::error::GatewayError;
use assistant_gateway::openai::{
    Assistant, AssistantApi, BatchStatus, CreateAssistantRequest, CreateMessageRequest,
    CreateRunRequest, FileObject, Message, MessageContent, MessageText, Role, Run, RunStatus,
    Thread, UpdateAssistantRequest, VectorStore, VectorStoreFileBatch,
};
use assistant_gateway::storage::FileStore;
use assistant_gateway::uploads::UploadOrchestrator;

/// Scripted stand-in for the remote assistant service. Every operation is
/// appended to `calls` as `"<op> <details...>"`.
pub struct MockAssistantApi {
    calls: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    /// Vector store binding per known assistant id (None = unbound).
    pub assistants: Mutex<HashMap<String, Option<String>>>,
    /// Statuses consumed by `create_file_batch` then `get_file_batch`;
    /// empty means `completed`.
    pub batch_statuses: Mutex<VecDeque<BatchStatus>>,
    /// Status returned by `create_run`.
    pub initial_run_status: Mutex<RunStatus>,
    /// Statuses consumed by `get_run`; empty means `completed`.
    pub run_statuses: Mutex<VecDeque<RunStatus>>,
    pub reply_text: Mutex<String>,
    /// When set, `list_messages` returns an empty list.
    pub no_reply: AtomicBool,
    /// When set, `create_thread` fails.
    pub fail_thread_creation: AtomicBool,
}

impl MockAssistantApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            assistants: Mutex::new(HashMap::new()),
            batch_statuses: Mutex::new(VecDeque::new()),
            initial_run_status: Mutex::new(RunStatus::Queued),
            run_statuses: Mutex::new(VecDeque::new()),
            reply_text: Mutex::new("the answer from the file".to_string()),
            no_reply: AtomicBool::new(false),
            fail_thread_creation: AtomicBool::new(false),
        })
    }

    pub fn register_assistant(&self, assistant_id: &str, vector_store_id: Option<&str>) {
        self.assistants.lock().unwrap().insert(
            assistant_id.to_string(),
            vector_store_id.map(|id| id.to_string()),
        );
    }

    pub fn script_run_statuses(&self, statuses: &[RunStatus]) {
        *self.run_statuses.lock().unwrap() = statuses.iter().copied().collect();
    }

    pub fn script_batch_statuses(&self, statuses: &[BatchStatus]) {
        *self.batch_statuses.lock().unwrap() = statuses.iter().copied().collect();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls for one operation.
    pub fn count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|entry| entry.split_whitespace().next() == Some(op))
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("{}_{}", prefix, n)
    }

    fn assistant_value(&self, assistant_id: &str, binding: Option<String>) -> Assistant {
        let tool_resources = binding.map(|id| {
            serde_json::json!({ "file_search": { "vector_store_ids": [id] } })
        });
        serde_json::from_value(serde_json::json!({
            "id": assistant_id,
            "name": "file assistants",
            "model": "gpt-4o-mini",
            "instructions": null,
            "tools": [{ "type": "file_search" }, { "type": "code_interpreter" }],
            "tool_resources": tool_resources
        }))
        .unwrap()
    }

    fn run_value(&self, thread_id: &str, run_id: &str, status: RunStatus) -> Run {
        Run {
            id: run_id.to_string(),
            thread_id: thread_id.to_string(),
            assistant_id: "asst_mock".to_string(),
            status,
            last_error: None,
        }
    }
}

fn not_found(what: &str) -> GatewayError {
    GatewayError::Remote {
        message: format!("No {} found", what),
        error_type: "invalid_request_error".to_string(),
    }
}

#[async_trait]
impl AssistantApi for MockAssistantApi {
    async fn create_vector_store(&self, name: &str) -> Result<VectorStore, GatewayError> {
        self.record(format!("create_vector_store {}", name));
        Ok(VectorStore {
            id: self.fresh_id("vs"),
            name: Some(name.to_string()),
            status: Some("completed".to_string()),
        })
    }

    async fn upload_file(&self, path: &Path) -> Result<FileObject, GatewayError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        self.record(format!("upload_file {}", filename));
        Ok(FileObject {
            id: self.fresh_id("file"),
            filename,
            bytes: None,
        })
    }

    async fn create_file_batch(
        &self,
        vector_store_id: &str,
        file_ids: Vec<String>,
    ) -> Result<VectorStoreFileBatch, GatewayError> {
        self.record(format!(
            "create_file_batch {} {}",
            vector_store_id,
            file_ids.len()
        ));
        let status = self
            .batch_statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(BatchStatus::Completed);
        Ok(VectorStoreFileBatch {
            id: self.fresh_id("batch"),
            vector_store_id: vector_store_id.to_string(),
            status,
            file_counts: None,
        })
    }

    async fn get_file_batch(
        &self,
        vector_store_id: &str,
        batch_id: &str,
    ) -> Result<VectorStoreFileBatch, GatewayError> {
        self.record(format!("get_file_batch {}", batch_id));
        let status = self
            .batch_statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(BatchStatus::Completed);
        Ok(VectorStoreFileBatch {
            id: batch_id.to_string(),
            vector_store_id: vector_store_id.to_string(),
            status,
            file_counts: None,
        })
    }

    async fn create_assistant(
        &self,
        request: CreateAssistantRequest,
    ) -> Result<Assistant, GatewayError> {
        let binding = request
            .tool_resources
            .as_ref()
            .and_then(|resources| resources.file_search.as_ref())
            .and_then(|fs| fs.vector_store_ids.first())
            .cloned();
        let assistant_id = self.fresh_id("asst");
        self.record(format!(
            "create_assistant {} {}",
            assistant_id,
            binding.as_deref().unwrap_or("-")
        ));
        self.assistants
            .lock()
            .unwrap()
            .insert(assistant_id.clone(), binding.clone());
        Ok(self.assistant_value(&assistant_id, binding))
    }

    async fn get_assistant(&self, assistant_id: &str) -> Result<Assistant, GatewayError> {
        self.record(format!("get_assistant {}", assistant_id));
        let binding = self
            .assistants
            .lock()
            .unwrap()
            .get(assistant_id)
            .cloned()
            .ok_or_else(|| not_found("assistant"))?;
        Ok(self.assistant_value(assistant_id, binding))
    }

    async fn update_assistant(
        &self,
        assistant_id: &str,
        request: UpdateAssistantRequest,
    ) -> Result<Assistant, GatewayError> {
        let binding = request
            .tool_resources
            .file_search
            .as_ref()
            .and_then(|fs| fs.vector_store_ids.first())
            .cloned();
        self.record(format!(
            "update_assistant {} {}",
            assistant_id,
            binding.as_deref().unwrap_or("-")
        ));
        let mut assistants = self.assistants.lock().unwrap();
        if !assistants.contains_key(assistant_id) {
            return Err(not_found("assistant"));
        }
        assistants.insert(assistant_id.to_string(), binding.clone());
        Ok(self.assistant_value(assistant_id, binding))
    }

    async fn create_thread(&self) -> Result<Thread, GatewayError> {
        self.record("create_thread".to_string());
        if self.fail_thread_creation.load(Ordering::SeqCst) {
            return Err(GatewayError::Remote {
                message: "rate limited".to_string(),
                error_type: "rate_limit_error".to_string(),
            });
        }
        Ok(Thread {
            id: self.fresh_id("thread"),
            created_at: None,
        })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        request: CreateMessageRequest,
    ) -> Result<Message, GatewayError> {
        self.record(format!("create_message {}", thread_id));
        Ok(Message {
            id: self.fresh_id("msg"),
            role: request.role,
            content: vec![MessageContent::Text {
                text: MessageText {
                    value: request.content,
                    annotations: Vec::new(),
                },
            }],
            run_id: None,
            assistant_id: None,
        })
    }

    async fn create_run(
        &self,
        thread_id: &str,
        request: CreateRunRequest,
    ) -> Result<Run, GatewayError> {
        self.record(format!("create_run {} {}", thread_id, request.assistant_id));
        let status = *self.initial_run_status.lock().unwrap();
        let run_id = self.fresh_id("run");
        Ok(self.run_value(thread_id, &run_id, status))
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, GatewayError> {
        self.record(format!("get_run {}", run_id));
        let status = self
            .run_statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RunStatus::Completed);
        Ok(self.run_value(thread_id, run_id, status))
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Message>, GatewayError> {
        self.record(format!("list_messages {}", thread_id));
        if self.no_reply.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        // Newest first: the assistant reply precedes the user message.
        Ok(vec![
            Message {
                id: self.fresh_id("msg"),
                role: Role::Assistant,
                content: vec![MessageContent::Text {
                    text: MessageText {
                        value: self.reply_text.lock().unwrap().clone(),
                        annotations: Vec::new(),
                    },
                }],
                run_id: Some("run_0".to_string()),
                assistant_id: Some("asst_mock".to_string()),
            },
            Message {
                id: self.fresh_id("msg"),
                role: Role::User,
                content: vec![MessageContent::Text {
                    text: MessageText {
                        value: "question".to_string(),
                        annotations: Vec::new(),
                    },
                }],
                run_id: None,
                assistant_id: None,
            },
        ])
    }
}

/// Gateway state over the mock with zero-delay polling and a temp storage
/// root.
pub fn test_state(mock: Arc<MockAssistantApi>, storage_root: &Path) -> GatewayState {
    let store = FileStore::new(storage_root);
    GatewayState {
        uploader: Arc::new(UploadOrchestrator::with_poll_policy(
            mock.clone(),
            store,
            PollPolicy::immediate(50),
        )),
        chat: Arc::new(ChatCoordinator::with_poll_policy(
            mock,
            PollPolicy::immediate(50),
        )),
        user_header: "x-user-id".to_string(),
    }
}

pub const MULTIPART_BOUNDARY: &str = "gateway-test-boundary";

/// Hand-rolled multipart body: `(field name, optional file name, bytes)`.
pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY)
}
