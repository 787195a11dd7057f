//! Session/run coordination for the chat endpoint.
//!
//! Per request: resolve the user's thread (creating it on first contact),
//! append the message, start a run against the caller's assistant, poll the
//! run to a terminal state under a bounded policy, then return the newest
//! message on the thread.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ASSISTANT_MODEL, PollPolicy, RUN_INSTRUCTIONS};
use crate::error::GatewayError;
use crate::openai::{
    AssistantApi, CreateMessageRequest, CreateRunRequest, Role, Run, RunStatus, Tool,
};
use crate::sessions::SessionStore;

pub struct ChatCoordinator {
    api: Arc<dyn AssistantApi>,
    sessions: SessionStore,
    run_poll: PollPolicy,
}

impl ChatCoordinator {
    pub fn new(api: Arc<dyn AssistantApi>) -> Self {
        Self::with_poll_policy(api, PollPolicy::runs())
    }

    pub fn with_poll_policy(api: Arc<dyn AssistantApi>, run_poll: PollPolicy) -> Self {
        Self {
            api,
            sessions: SessionStore::new(),
            run_poll,
        }
    }

    /// Relay one user message and return the assistant's reply text.
    pub async fn send_message(
        &self,
        user_id: &str,
        assistant_id: &str,
        message: &str,
    ) -> Result<String, GatewayError> {
        let api = self.api.clone();
        let thread_id = self
            .sessions
            .thread_for(user_id, || async move {
                api.create_thread().await.map(|thread| thread.id)
            })
            .await?;

        self.api
            .create_message(
                &thread_id,
                CreateMessageRequest {
                    role: Role::User,
                    content: message.to_string(),
                },
            )
            .await?;

        let run = self
            .api
            .create_run(
                &thread_id,
                CreateRunRequest {
                    assistant_id: assistant_id.to_string(),
                    model: Some(ASSISTANT_MODEL.to_string()),
                    instructions: Some(RUN_INSTRUCTIONS.to_string()),
                    tools: Some(vec![Tool::FileSearch]),
                },
            )
            .await?;
        debug!("Run {} started on thread {}", run.id, thread_id);

        let run = self.wait_for_run(&thread_id, run).await?;
        info!("Run {} completed on thread {}", run.id, thread_id);

        let messages = self.api.list_messages(&thread_id).await?;
        let reply = messages
            .first()
            .and_then(|message| message.text())
            .ok_or_else(|| GatewayError::EmptyReply(thread_id.clone()))?;
        Ok(reply.to_string())
    }

    /// Poll the run to a terminal state. Only `completed` succeeds; any other
    /// terminal status fails the request, and exhausting the attempt budget
    /// fails it with a timeout instead of hanging.
    async fn wait_for_run(&self, thread_id: &str, mut run: Run) -> Result<Run, GatewayError> {
        let mut attempts = 0;
        loop {
            match run.status {
                RunStatus::Completed => return Ok(run),
                status if status.is_terminal() => {
                    if let Some(last_error) = &run.last_error {
                        warn!(
                            "Run {} failed: {} ({})",
                            run.id, last_error.message, last_error.code
                        );
                    }
                    return Err(GatewayError::RunFailed(status.as_str().to_string()));
                }
                status => {
                    debug!("Run status: {}", status.as_str());
                }
            }
            if attempts >= self.run_poll.max_attempts {
                return Err(GatewayError::RunTimedOut(attempts));
            }
            attempts += 1;
            tokio::time::sleep(self.run_poll.interval).await;
            run = self.api.get_run(thread_id, &run.id).await?;
        }
    }

    /// Cached thread id for a user, if any. Exposed for tests.
    pub fn cached_thread(&self, user_id: &str) -> Option<String> {
        self.sessions.get(user_id)
    }
}
