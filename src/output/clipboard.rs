//! Clipboard-based text sink
//!
//! Uses wl-copy to copy text to the Wayland clipboard. Most reliable
//! fallback since it works on all compositors, but it cannot replace
//! previously injected text.
//!
//! Requires: wl-clipboard package installed

use super::TextSink;
use crate::error::OutputError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct ClipboardSink;

impl ClipboardSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClipboardSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy text to the clipboard without going through a sink chain.
/// Used as the post-injection fallback copy.
pub async fn copy_to_clipboard(text: &str) -> Result<(), OutputError> {
    ClipboardSink::new().inject(text).await
}

#[async_trait::async_trait]
impl TextSink for ClipboardSink {
    async fn inject(&self, text: &str) -> Result<(), OutputError> {
        if text.is_empty() {
            return Ok(());
        }

        let mut child = Command::new("wl-copy")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OutputError::WlCopyNotFound
                } else {
                    OutputError::InjectionFailed(e.to_string())
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| OutputError::InjectionFailed(e.to_string()))?;
            // Close stdin to signal EOF
            drop(stdin);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| OutputError::InjectionFailed(e.to_string()))?;

        if !status.success() {
            return Err(OutputError::InjectionFailed(
                "wl-copy exited with error".to_string(),
            ));
        }

        tracing::info!("Text copied to clipboard ({} chars)", text.chars().count());
        Ok(())
    }

    async fn select_back(&self, _char_count: usize) -> Result<(), OutputError> {
        Err(OutputError::ReplaceUnsupported)
    }

    fn supports_replace(&self) -> bool {
        false
    }

    async fn is_available(&self) -> bool {
        Command::new("which")
            .arg("wl-copy")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "clipboard (wl-copy)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_replace_support() {
        assert!(!ClipboardSink::new().supports_replace());
    }

    #[tokio::test]
    async fn test_select_back_is_unsupported() {
        let result = ClipboardSink::new().select_back(5).await;
        assert!(matches!(result, Err(OutputError::ReplaceUnsupported)));
    }

    #[tokio::test]
    async fn test_inject_empty_is_noop() {
        assert!(ClipboardSink::new().inject("").await.is_ok());
    }
}
