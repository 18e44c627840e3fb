// ABOUTME: Error taxonomy for a session, one variant per phase that can fail

use crate::docker::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Image lookup failed: {0}")]
    Lookup(#[source] EngineError),
    #[error("Image pull failed: {0}")]
    Pull(#[source] EngineError),
    #[error("Container creation failed: {0}")]
    Create(#[source] EngineError),
    #[error("Container start failed: {0}")]
    Start(#[source] EngineError),
    #[error("Container state query failed: {0}")]
    Query(#[source] EngineError),
    #[error("Exec creation failed: {0}")]
    ExecCreate(#[source] EngineError),
    #[error("Exec start failed: {0}")]
    ExecStart(#[source] EngineError),
    #[error("Container stop failed: {0}")]
    Stop(#[source] EngineError),
    #[error("Container removal failed: {0}")]
    Remove(#[source] EngineError),
    #[error("Container not running after {attempts} polls")]
    Timeout { attempts: u32 },
    #[error("Monitoring aborted after {failures} consecutive probe failures")]
    ProbeFailures { failures: u32 },
}
