//! Error types for voicetype
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.
//!
//! Propagation policy: capability errors (input device access, microphone)
//! are surfaced to the user; backend errors degrade to the best text
//! available; store errors are logged and swallowed by the caller.

use thiserror::Error;

/// Top-level error type for the voicetype application
#[derive(Error, Debug)]
pub enum VoiceTypeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Audio capture error: {0}")]
    Audio(#[from] AudioError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to global hotkey detection.
///
/// `DeviceAccess` and `NoKeyboard` are capability errors: the user must
/// grant permission out-of-band, so the daemon fails fast instead of
/// retrying silently.
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("Unknown key name: '{0}'. Use evtest or wev to find valid key names.")]
    UnknownKey(String),

    #[error("No keyboard device found in /dev/input/")]
    NoKeyboard,

    #[error("Duplicate key binding: '{0}' is assigned to more than one trigger mode")]
    DuplicateBinding(String),

    #[error("Global hotkey capture is not supported on this platform")]
    Unsupported,

    #[error("evdev error: {0}")]
    Evdev(String),
}

/// Errors related to audio capture.
///
/// These abort only the current recording session; the daemon keeps running.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio connection failed: {0}")]
    Connection(String),

    #[error("Audio device not found: '{0}'. List devices with: pactl list sources short")]
    DeviceNotFound(String),

    #[error("Audio capture did not respond within {0} seconds")]
    Timeout(u32),

    #[error("Audio stream error: {0}")]
    StreamError(String),

    #[error("WAV encoding failed: {0}")]
    Encoding(String),
}

/// Errors from STT/LLM backends.
///
/// Caught at the orchestration boundary; the pipeline degrades to the best
/// text available rather than aborting the user-visible outcome.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend command not found: '{0}'. Install it or adjust the configured command.")]
    CommandNotFound(String),

    #[error("Failed to spawn backend command: {0}")]
    SpawnFailed(String),

    #[error("Backend command timed out after {0}s")]
    Timeout(u64),

    #[error("Backend command exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Backend output is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("Backend IO error: {0}")]
    Io(String),
}

/// Errors related to text injection
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("wtype not found in PATH. Install via your package manager.")]
    WtypeNotFound,

    #[error("wl-copy not found in PATH. Install wl-clipboard via your package manager.")]
    WlCopyNotFound,

    #[error("Text injection failed: {0}")]
    InjectionFailed(String),

    #[error("Select-back failed: {0}")]
    SelectBackFailed(String),

    #[error("This sink cannot replace previously injected text")]
    ReplaceUnsupported,

    #[error("All output methods failed. Ensure wtype or wl-copy is available.")]
    AllMethodsFailed,
}

/// Errors from the persistence stores (memory, stats, vocabulary, templates).
///
/// Never propagated to the user-visible outcome; callers log and continue.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using VoiceTypeError
pub type Result<T> = std::result::Result<T, VoiceTypeError>;

#[cfg(target_os = "linux")]
impl From<evdev::Error> for HotkeyError {
    fn from(e: evdev::Error) -> Self {
        HotkeyError::Evdev(e.to_string())
    }
}
