//! wtype-based text sink
//!
//! Uses wtype to simulate keyboard input on Wayland. Preferred because it
//! needs no daemon and handles Unicode/CJK well.
//!
//! Replacement protocol: `select_back(n)` holds Shift and presses Left n
//! times, selecting the previously typed text so the next inject replaces
//! it. This assumes the cursor has not moved since the original injection.

use super::TextSink;
use crate::error::OutputError;
use std::process::Stdio;
use tokio::process::Command;

/// Upper bound on select-back distance; anything longer than this is not
/// something the fast-refine path would have typed in one session
const MAX_SELECT_BACK: usize = 4000;

pub struct WtypeSink;

impl WtypeSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WtypeSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TextSink for WtypeSink {
    async fn inject(&self, text: &str) -> Result<(), OutputError> {
        if text.is_empty() {
            return Ok(());
        }

        let output = Command::new("wtype")
            .arg("--")
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OutputError::WtypeNotFound
                } else {
                    OutputError::InjectionFailed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OutputError::InjectionFailed(format!(
                "wtype failed: {}",
                stderr
            )));
        }

        Ok(())
    }

    async fn select_back(&self, char_count: usize) -> Result<(), OutputError> {
        if char_count == 0 {
            return Ok(());
        }
        if char_count > MAX_SELECT_BACK {
            return Err(OutputError::SelectBackFailed(format!(
                "refusing to select back {} characters",
                char_count
            )));
        }

        // One wtype invocation: press Shift, n Lefts, release Shift
        let mut args: Vec<&str> = vec!["-M", "shift"];
        for _ in 0..char_count {
            args.push("-k");
            args.push("Left");
        }
        args.push("-m");
        args.push("shift");

        let output = Command::new("wtype")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    OutputError::WtypeNotFound
                } else {
                    OutputError::SelectBackFailed(e.to_string())
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OutputError::SelectBackFailed(format!(
                "wtype failed: {}",
                stderr
            )));
        }

        Ok(())
    }

    fn supports_replace(&self) -> bool {
        true
    }

    async fn is_available(&self) -> bool {
        // Just check if wtype exists in PATH. Don't check WAYLAND_DISPLAY;
        // systemd services may not have it, and wtype fails naturally when
        // Wayland isn't there.
        Command::new("which")
            .arg("wtype")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "wtype"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_replace() {
        assert!(WtypeSink::new().supports_replace());
    }

    #[tokio::test]
    async fn test_inject_empty_is_noop() {
        // Must succeed even with no wtype binary present
        assert!(WtypeSink::new().inject("").await.is_ok());
    }

    #[tokio::test]
    async fn test_select_back_zero_is_noop() {
        assert!(WtypeSink::new().select_back(0).await.is_ok());
    }

    #[tokio::test]
    async fn test_select_back_bounded() {
        let result = WtypeSink::new().select_back(MAX_SELECT_BACK + 1).await;
        assert!(matches!(result, Err(OutputError::SelectBackFailed(_))));
    }
}
