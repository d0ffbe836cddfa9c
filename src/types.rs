/// Core types shared across the execution pipeline
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kernel-enforced limits applied to a sandboxed child before exec.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU time limit in seconds (soft; hard limit is soft + 1)
    pub cpu_time_seconds: u64,
    /// Address-space limit in bytes (soft = hard)
    pub memory_bytes: u64,
    /// Maximum number of processes. Applied only on Linux, where
    /// interpreter launchers tolerate the cap.
    pub max_processes: u32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_time_seconds: 2,
            memory_bytes: 50 * 1024 * 1024,
            max_processes: 250,
        }
    }
}

impl ResourceLimits {
    /// Limits applied to sandboxed run steps.
    pub fn sandboxed() -> Self {
        Self {
            cpu_time_seconds: 5,
            memory_bytes: 100 * 1024 * 1024,
            ..Self::default()
        }
    }
}

/// Outcome of one compile or run invocation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// True when the process exited normally with code 0
    pub success: bool,
    /// Exit code, or -1 when the process was signaled or never spawned
    pub exit_code: i32,
    /// Additional error context when not successful
    pub error_message: Option<String>,
}

impl ExecutionResult {
    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: -1,
            error_message: Some(message.into()),
        }
    }
}

/// Errors surfaced by the sandbox pipeline. Compile and run failures are
/// not errors at this level; they come back as `ExecutionResult`s.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for sandbox operations
pub type Result<T> = std::result::Result<T, SandboxError>;
