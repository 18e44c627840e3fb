// ABOUTME: Call interface over the container engine consumed by the session core
// Every call is a single request/response; no call is retried here.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Docker connection error: {0}")]
    Connection(bollard::errors::Error),
    #[error("{message}")]
    Engine { status_code: u16, message: String },
    #[error("Stream error: {0}")]
    Stream(String),
}

impl EngineError {
    pub fn engine(status_code: u16, message: impl Into<String>) -> Self {
        Self::Engine {
            status_code,
            message: message.into(),
        }
    }

    /// HTTP status reported by the engine, when the engine answered at all.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Engine { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

impl From<bollard::errors::Error> for EngineError {
    fn from(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code,
                message,
            } => Self::Engine {
                status_code,
                message,
            },
            other => Self::Connection(other),
        }
    }
}

/// A local image as reported by an image lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Content digest including its algorithm prefix, e.g. `sha256:1234`
    pub id: String,
    pub repo_tags: Vec<String>,
}

/// Opaque identifier of the session container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerHandle(String);

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub handle: ContainerHandle,
    pub warnings: Vec<String>,
}

/// Fixed runtime profile used for every session container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeProfile {
    pub tty: bool,
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub entrypoint: Vec<String>,
}

impl Default for RuntimeProfile {
    fn default() -> Self {
        Self {
            tty: true,
            attach_stdin: true,
            attach_stdout: true,
            entrypoint: vec!["/bin/bash".to_string()],
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Local images matching `reference`.
    async fn find_image(&self, reference: &str) -> Result<Vec<ImageRecord>, EngineError>;

    /// Pull `reference`, yielding each status line the engine streams back.
    fn pull_image(&self, reference: &str) -> BoxStream<'static, Result<String, EngineError>>;

    async fn create_container(
        &self,
        image: &str,
        profile: &RuntimeProfile,
    ) -> Result<CreatedContainer, EngineError>;

    async fn start_container(&self, handle: &ContainerHandle) -> Result<(), EngineError>;

    /// Fresh sample of the container's running flag.
    async fn is_running(&self, handle: &ContainerHandle) -> Result<bool, EngineError>;

    /// Returns the exec identifier.
    async fn create_exec(
        &self,
        handle: &ContainerHandle,
        command: &[String],
    ) -> Result<String, EngineError>;

    /// Runs a created exec and returns everything it wrote.
    async fn start_exec(&self, exec_id: &str) -> Result<String, EngineError>;

    async fn stop_container(&self, handle: &ContainerHandle) -> Result<(), EngineError>;

    async fn remove_container(&self, handle: &ContainerHandle) -> Result<(), EngineError>;
}
