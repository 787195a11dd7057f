/// Fixed remote-assistant configuration for the gateway.

use std::time::Duration;

// Model and prompt configuration
pub const ASSISTANT_MODEL: &str = "gpt-4o-mini";
pub const ASSISTANT_NAME: &str = "file assistants";
pub const ASSISTANT_DESCRIPTION: &str =
    "you answer from the file it is attached under 50 words";
pub const RUN_INSTRUCTIONS: &str = "you answer only 50 words from the file.";

// Every assistant created by this gateway indexes uploads into a single
// named vector store.
pub const VECTOR_STORE_NAME: &str = "assistantFilesForChat";

// Run polling policy: fixed delay, bounded attempts (~2 minutes total).
pub const RUN_POLL_INTERVAL_MS: u64 = 500;
pub const RUN_POLL_MAX_ATTEMPTS: u32 = 240;

// File batch indexing is slower than a run; poll once per second.
pub const BATCH_POLL_INTERVAL_MS: u64 = 1000;
pub const BATCH_POLL_MAX_ATTEMPTS: u32 = 300;

// Identity assigned to requests that carry no user header.
pub const DEFAULT_USER_ID: &str = "default";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Bounded polling: fixed inter-attempt delay, hard attempt ceiling.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn runs() -> Self {
        Self {
            interval: Duration::from_millis(RUN_POLL_INTERVAL_MS),
            max_attempts: RUN_POLL_MAX_ATTEMPTS,
        }
    }

    pub fn batches() -> Self {
        Self {
            interval: Duration::from_millis(BATCH_POLL_INTERVAL_MS),
            max_attempts: BATCH_POLL_MAX_ATTEMPTS,
        }
    }

    /// Zero-delay policy for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            interval: Duration::ZERO,
            max_attempts,
        }
    }
}
