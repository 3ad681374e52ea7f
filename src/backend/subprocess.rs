//! Subprocess-backed STT and LLM implementations
//!
//! Both run the configured shell command through `sh -c` so pipes and
//! quoting work. The STT command receives the recording as a temp WAV file
//! ({file} placeholder) and the language code ({lang}); the LLM command
//! receives the user message on stdin and the system prompt in the
//! VOICETYPE_SYSTEM_PROMPT environment variable. Both print their result
//! on stdout.

use super::{LlmBackend, SttBackend};
use crate::config::{LlmConfig, SttConfig};
use crate::error::BackendError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// STT through an external command ({file}, {lang} placeholders)
pub struct SubprocessStt {
    command: String,
    timeout: Duration,
}

impl SubprocessStt {
    pub fn new(config: &SttConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[async_trait::async_trait]
impl SttBackend for SubprocessStt {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<String, BackendError> {
        // The temp file must outlive the child process
        let wav = tempfile::Builder::new()
            .prefix("voicetype-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| BackendError::Io(e.to_string()))?;

        tokio::fs::write(wav.path(), audio)
            .await
            .map_err(|e| BackendError::Io(e.to_string()))?;

        let file_path = wav.path().to_string_lossy().to_string();
        let command = self
            .command
            .replace("{file}", &file_path)
            .replace("{lang}", language);

        tracing::debug!("Running STT command: {}", command);
        let output = run_command(&command, None, self.timeout).await?;
        Ok(output)
    }
}

/// LLM refinement through an external command
pub struct SubprocessLlm {
    command: String,
    timeout: Duration,
}

impl SubprocessLlm {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[async_trait::async_trait]
impl LlmBackend for SubprocessLlm {
    async fn refine(
        &self,
        user_message: &str,
        system_prompt: &str,
    ) -> Result<String, BackendError> {
        tracing::debug!("Running LLM command: {}", self.command);
        run_command(
            &self.command,
            Some((user_message, system_prompt)),
            self.timeout,
        )
        .await
    }
}

/// Spawn a shell command, optionally feeding stdin and a system-prompt
/// env var, and return trimmed stdout.
async fn run_command(
    command: &str,
    input: Option<(&str, &str)>,
    limit: Duration,
) -> Result<String, BackendError> {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some((_, system_prompt)) = input {
        cmd.env("VOICETYPE_SYSTEM_PROMPT", system_prompt);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| BackendError::SpawnFailed(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        if let Some((message, _)) = input {
            stdin
                .write_all(message.as_bytes())
                .await
                .map_err(|e| BackendError::Io(e.to_string()))?;
        }
        // Close stdin to signal EOF
        drop(stdin);
    }

    let output = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| BackendError::Timeout(limit.as_secs()))?
        .map_err(|e| BackendError::Io(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BackendError::NonZeroExit {
            code: output.status.code(),
            stderr: stderr.trim().to_string(),
        });
    }

    let stdout =
        String::from_utf8(output.stdout).map_err(|e| BackendError::InvalidUtf8(e.to_string()))?;

    Ok(stdout.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stt(command: &str) -> SubprocessStt {
        SubprocessStt::new(&SttConfig {
            command: command.to_string(),
            language: "zh".to_string(),
            timeout_ms: 5000,
        })
    }

    fn llm(command: &str, timeout_ms: u64) -> SubprocessLlm {
        SubprocessLlm::new(&LlmConfig {
            command: command.to_string(),
            timeout_ms,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_stt_placeholders_substituted() {
        // Echoes the substituted command line back
        let backend = stt("echo transcribed {lang}");
        let result = backend.transcribe(b"fake wav", "zh").await.unwrap();
        assert_eq!(result, "transcribed zh");
    }

    #[tokio::test]
    async fn test_stt_file_placeholder_points_at_audio() {
        let backend = stt("cat {file}");
        let result = backend.transcribe(b"hello from wav", "zh").await.unwrap();
        assert_eq!(result, "hello from wav");
    }

    #[tokio::test]
    async fn test_llm_reads_stdin() {
        let backend = llm("cat", 5000);
        let result = backend.refine("draft text", "system prompt").await.unwrap();
        assert_eq!(result, "draft text");
    }

    #[tokio::test]
    async fn test_llm_sees_system_prompt_env() {
        let backend = llm("printf '%s' \"$VOICETYPE_SYSTEM_PROMPT\"", 5000);
        let result = backend.refine("ignored", "the system prompt").await.unwrap();
        assert_eq!(result, "the system prompt");
    }

    #[tokio::test]
    async fn test_llm_timeout() {
        let backend = llm("sleep 10", 100);
        let result = backend.refine("text", "prompt").await;
        assert!(matches!(result, Err(BackendError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let backend = llm("exit 3", 5000);
        let result = backend.refine("text", "prompt").await;
        assert!(matches!(result, Err(BackendError::NonZeroExit { .. })));
    }
}
