//! Error types for Orbweave

use crate::types::{ThreadId, ThreadStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("thread not found: {0}")]
    ThreadNotFound(ThreadId),

    #[error("thread {id} is not executable (status: {status})")]
    NotExecutable { id: ThreadId, status: ThreadStatus },

    #[error("thread {0} has no execution plan attached")]
    PlanMissing(ThreadId),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ThreadStatus,
        to: ThreadStatus,
    },

    #[error("action failed: {name} - {message}")]
    ActionFailed { name: String, message: String },

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn action_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActionFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn not_executable(id: ThreadId, status: ThreadStatus) -> Self {
        Self::NotExecutable { id, status }
    }
}
