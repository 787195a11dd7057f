//! Upload orchestration: persist incoming files, submit them to a vector
//! store as one batch, and create or rebind the owning assistant.
//!
//! Persistence happens before any remote call; a failing remote call leaves
//! stored files and already-created remote resources in place (no rollback).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::config::{
    ASSISTANT_DESCRIPTION, ASSISTANT_MODEL, ASSISTANT_NAME, PollPolicy, VECTOR_STORE_NAME,
};
use crate::error::GatewayError;
use crate::openai::{
    Assistant, AssistantApi, BatchStatus, CreateAssistantRequest, Tool, ToolResources,
    UpdateAssistantRequest,
};
use crate::storage::FileStore;

/// One request-scoped uploaded file.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Bytes,
}

/// Whether an assistant's file-search tool already references a vector store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorStoreBinding {
    Unbound,
    Bound(String),
}

impl VectorStoreBinding {
    pub fn of(assistant: &Assistant) -> Self {
        assistant
            .tool_resources
            .as_ref()
            .and_then(|resources| resources.file_search.as_ref())
            .and_then(|fs| fs.vector_store_ids.first())
            .map(|id| VectorStoreBinding::Bound(id.clone()))
            .unwrap_or(VectorStoreBinding::Unbound)
    }
}

pub struct UploadOrchestrator {
    api: Arc<dyn AssistantApi>,
    store: FileStore,
    batch_poll: PollPolicy,
}

impl UploadOrchestrator {
    pub fn new(api: Arc<dyn AssistantApi>, store: FileStore) -> Self {
        Self::with_poll_policy(api, store, PollPolicy::batches())
    }

    pub fn with_poll_policy(
        api: Arc<dyn AssistantApi>,
        store: FileStore,
        batch_poll: PollPolicy,
    ) -> Self {
        Self {
            api,
            store,
            batch_poll,
        }
    }

    /// Create a fresh vector store and assistant from the uploaded files.
    /// Returns the new assistant id.
    pub async fn create_assistant_with_files(
        &self,
        files: Vec<UploadedFile>,
    ) -> Result<String, GatewayError> {
        require_files(&files)?;
        let paths = self.persist_all(&files).await?;

        let vector_store = self.api.create_vector_store(VECTOR_STORE_NAME).await?;
        self.upload_batch(&vector_store.id, &paths).await?;

        let assistant = self
            .api
            .create_assistant(CreateAssistantRequest {
                model: ASSISTANT_MODEL.to_string(),
                name: Some(ASSISTANT_NAME.to_string()),
                description: Some(ASSISTANT_DESCRIPTION.to_string()),
                tools: vec![Tool::FileSearch, Tool::CodeInterpreter],
                tool_resources: Some(ToolResources::file_search(&vector_store.id)),
            })
            .await?;

        info!(
            "Created assistant {} over vector store {} ({} files)",
            assistant.id,
            vector_store.id,
            paths.len()
        );
        Ok(assistant.id)
    }

    /// Index the uploaded files into an existing assistant's vector store,
    /// binding one first if the assistant has none. Returns the same
    /// assistant id.
    pub async fn attach_files(
        &self,
        assistant_id: &str,
        files: Vec<UploadedFile>,
    ) -> Result<String, GatewayError> {
        require_files(&files)?;
        let paths = self.persist_all(&files).await?;

        let vector_store_id = self.resolve_vector_store(assistant_id).await?;
        self.upload_batch(&vector_store_id, &paths).await?;

        info!(
            "Attached {} files to assistant {} (vector store {})",
            paths.len(),
            assistant_id,
            vector_store_id
        );
        Ok(assistant_id.to_string())
    }

    async fn persist_all(&self, files: &[UploadedFile]) -> Result<Vec<PathBuf>, GatewayError> {
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            paths.push(self.store.persist(&file.name, &file.bytes).await?);
        }
        Ok(paths)
    }

    async fn resolve_vector_store(&self, assistant_id: &str) -> Result<String, GatewayError> {
        let assistant = self.api.get_assistant(assistant_id).await?;
        match VectorStoreBinding::of(&assistant) {
            VectorStoreBinding::Bound(id) => {
                debug!("Assistant {} already bound to vector store {}", assistant_id, id);
                Ok(id)
            }
            VectorStoreBinding::Unbound => {
                let vector_store = self.api.create_vector_store(VECTOR_STORE_NAME).await?;
                self.api
                    .update_assistant(
                        assistant_id,
                        UpdateAssistantRequest {
                            tool_resources: ToolResources::file_search(&vector_store.id),
                        },
                    )
                    .await?;
                debug!(
                    "Bound new vector store {} to assistant {}",
                    vector_store.id, assistant_id
                );
                Ok(vector_store.id)
            }
        }
    }

    /// Upload every stored file, then submit one batch and poll until the
    /// remote service finishes indexing.
    async fn upload_batch(
        &self,
        vector_store_id: &str,
        paths: &[PathBuf],
    ) -> Result<(), GatewayError> {
        let mut file_ids = Vec::with_capacity(paths.len());
        for path in paths {
            let file = self.api.upload_file(path).await?;
            file_ids.push(file.id);
        }

        let mut batch = self
            .api
            .create_file_batch(vector_store_id, file_ids)
            .await?;

        let mut attempts = 0;
        loop {
            if batch.status.is_terminal() {
                if batch.status == BatchStatus::Completed {
                    debug!("File batch {} indexed", batch.id);
                    return Ok(());
                }
                return Err(GatewayError::BatchFailed(batch.status.as_str().to_string()));
            }
            if attempts >= self.batch_poll.max_attempts {
                return Err(GatewayError::BatchTimedOut(attempts));
            }
            attempts += 1;
            tokio::time::sleep(self.batch_poll.interval).await;
            batch = self.api.get_file_batch(vector_store_id, &batch.id).await?;
        }
    }
}

fn require_files(files: &[UploadedFile]) -> Result<(), GatewayError> {
    if files.is_empty() {
        return Err(GatewayError::validation("No files were uploaded."));
    }
    Ok(())
}
