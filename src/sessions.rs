//! Per-user conversation sessions.
//!
//! Maps a user identity to its remote thread id. The mapping is process-wide
//! and never persisted: a restart loses all sessions and new threads are
//! created on next contact.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::GatewayError;

#[derive(Clone, Default)]
pub struct SessionStore {
    threads: Arc<DashMap<String, Arc<OnceCell<String>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Thread id for this user, creating one through `create` on first
    /// contact. Concurrent first requests for the same identity race to a
    /// single creation; losers await the winner's result. A failed creation
    /// leaves the cell empty so the next request retries from scratch.
    pub async fn thread_for<F, Fut>(
        &self,
        user_id: &str,
        create: F,
    ) -> Result<String, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, GatewayError>>,
    {
        let cell = self
            .threads
            .entry(user_id.to_string())
            .or_default()
            .clone();

        let thread_id = cell
            .get_or_try_init(|| async {
                let thread_id = create().await?;
                info!("New thread {} created for user {}", thread_id, user_id);
                Ok::<String, GatewayError>(thread_id)
            })
            .await?;

        Ok(thread_id.clone())
    }

    /// Cached thread id, if this user has one.
    pub fn get(&self, user_id: &str) -> Option<String> {
        self.threads
            .get(user_id)
            .and_then(|cell| cell.get().cloned())
    }
}
