//! STT and LLM backend seams
//!
//! The core never speaks to a vendor API directly; both backends are
//! external commands wired through [`subprocess`]. The traits exist so
//! tests can drive the pipeline with in-memory fakes.

pub mod subprocess;

use crate::config::{LlmConfig, SttConfig};
use crate::error::BackendError;
use std::sync::Arc;

/// Speech-to-text backend
#[async_trait::async_trait]
pub trait SttBackend: Send + Sync {
    /// Transcribe a finalized WAV blob; empty output means "heard nothing"
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, BackendError>;
}

/// LLM refinement backend
#[async_trait::async_trait]
pub trait LlmBackend: Send + Sync {
    /// Refine the user message under the given system prompt.
    /// Empty or failed results are treated as "no change" by callers.
    async fn refine(&self, user_message: &str, system_prompt: &str)
        -> Result<String, BackendError>;
}

/// Create the configured STT backend, validating that its command exists
pub fn create_stt(config: &SttConfig) -> Result<Arc<dyn SttBackend>, BackendError> {
    check_command(&config.command)?;
    Ok(Arc::new(subprocess::SubprocessStt::new(config)))
}

/// Create the configured LLM backend, validating that its command exists
pub fn create_llm(config: &LlmConfig) -> Result<Arc<dyn LlmBackend>, BackendError> {
    check_command(&config.command)?;
    Ok(Arc::new(subprocess::SubprocessLlm::new(config)))
}

/// Verify the first word of a shell command resolves in PATH
fn check_command(command: &str) -> Result<(), BackendError> {
    let program = command
        .split_whitespace()
        .next()
        .ok_or_else(|| BackendError::CommandNotFound(command.to_string()))?;

    which::which(program)
        .map(|_| ())
        .map_err(|_| BackendError::CommandNotFound(program.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_command_finds_sh() {
        assert!(check_command("sh -c 'echo hi'").is_ok());
    }

    #[test]
    fn test_check_command_rejects_missing() {
        assert!(check_command("nonexistent_command_xyz_12345 --flag").is_err());
        assert!(check_command("").is_err());
    }
}
