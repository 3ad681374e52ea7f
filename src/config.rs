//! Configuration loading and types for voicetype
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/voicetype/config.toml)
//! 3. Environment variables (VOICETYPE_*)
//! 4. CLI arguments (highest priority)

use crate::error::VoiceTypeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Voicetype Configuration
#
# Location: ~/.config/voicetype/config.toml
# All settings can be overridden via CLI flags

# State file for external integrations (Waybar, polybar, etc.)
# Use "auto" for the default location ($XDG_RUNTIME_DIR/voicetype/state),
# a custom path, or "disabled" to turn off.
state_file = "auto"

[hotkey]
# Hold-to-talk key: hold to record, release to transcribe
hold = "RIGHTALT"

# Toggle key: press to start recording, press again to stop
toggle = "F13"

# Force-refine key: like hold-to-talk, but always runs LLM refinement
refine = "F14"

# Enable built-in hotkey detection (requires 'input' group membership)
enabled = true

[audio]
# Audio input device ("default" uses system default)
device = "default"

# Sample rate in Hz (STT backends expect 16000)
sample_rate = 16000

# Maximum recording duration in seconds (safety limit)
max_duration_secs = 120

[stt]
# Shell command that transcribes one recording. Receives the WAV path as
# {file} and the language code as {lang}; prints the transcript on stdout.
command = "whisper-cli -f {file} -l {lang} --no-timestamps"

# Language code passed to the backend ("zh", "en", "auto", ...)
language = "zh"

# Timeout in milliseconds
timeout_ms = 60000

[llm]
# Enable LLM refinement of every transcript (the force-refine hotkey and
# an active translation target run refinement regardless of this flag)
enabled = false

# Refinement strategy: "replace" (wait for the LLM before typing) or
# "fast" (type the raw transcript immediately, replace it in place when
# the refined text arrives)
mode = "replace"

# Shell command for refinement. Receives the user message on stdin and the
# system prompt in the VOICETYPE_SYSTEM_PROMPT environment variable;
# prints the refined text on stdout.
command = "ollama run llama3"

# Timeout in milliseconds
timeout_ms = 30000

# Keep short-term memory context out of refinement prompts (avoids
# context bleed into the refined text)
refine_only = true

# Custom refinement instruction (empty = built-in prompt)
prompt = ""

[assistant]
# Spoken prefix that activates the built-in action grammar
trigger = "小幫手"

# Treat every utterance as an assistant command (no prefix needed)
enabled = false

[memory]
# Persist session transcripts and feed recent context to the LLM
enabled = true

[output]
# Fall back to copying to the clipboard when no typing sink is available
fallback_to_clipboard = true
"#;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub hotkey: HotkeyConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub stt: SttConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Optional path to state file for external integrations (e.g., Waybar)
    #[serde(default = "default_state_file")]
    pub state_file: Option<String>,
}

/// Hotkey binding configuration.
///
/// Each trigger mode is bound to exactly one key. Bindings are immutable
/// after the resolver is built; changing them requires a daemon restart.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotkeyConfig {
    /// Hold-to-talk key (evdev KEY_* name without the prefix)
    #[serde(default = "default_hold_key")]
    pub hold: String,

    /// Toggle key: press to start, press again to stop
    #[serde(default = "default_toggle_key")]
    pub toggle: String,

    /// Hold-to-talk key that forces LLM refinement
    #[serde(default = "default_refine_key")]
    pub refine: String,

    /// Enable built-in hotkey detection
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            hold: default_hold_key(),
            toggle: default_toggle_key(),
            refine: default_refine_key(),
            enabled: true,
        }
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// PipeWire/PulseAudio device name, or "default"
    #[serde(default = "default_device")]
    pub device: String,

    /// Sample rate in Hz of the finalized waveform
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Maximum recording duration in seconds (safety limit)
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
            max_duration_secs: default_max_duration(),
        }
    }
}

/// Speech-to-text backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SttConfig {
    /// Shell command with {file} and {lang} placeholders
    #[serde(default = "default_stt_command")]
    pub command: String,

    /// Language code ("zh", "en", "auto", ...)
    #[serde(default = "default_language")]
    pub language: String,

    /// Timeout in milliseconds
    #[serde(default = "default_stt_timeout")]
    pub timeout_ms: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            command: default_stt_command(),
            language: default_language(),
            timeout_ms: default_stt_timeout(),
        }
    }
}

/// Refinement strategy selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    /// Wait for the LLM before typing anything
    #[default]
    Replace,
    /// Type the raw transcript immediately, replace it in place later
    Fast,
}

/// LLM refinement configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Run refinement on every transcript
    #[serde(default)]
    pub enabled: bool,

    /// Injection strategy
    #[serde(default)]
    pub mode: LlmMode,

    /// Shell command; user message on stdin, system prompt in
    /// VOICETYPE_SYSTEM_PROMPT, refined text on stdout
    #[serde(default = "default_llm_command")]
    pub command: String,

    /// Timeout in milliseconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_ms: u64,

    /// Keep short-term memory context out of refinement prompts
    #[serde(default = "default_true")]
    pub refine_only: bool,

    /// Custom refinement instruction (empty = built-in prompt)
    #[serde(default)]
    pub prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: LlmMode::default(),
            command: default_llm_command(),
            timeout_ms: default_llm_timeout(),
            refine_only: true,
            prompt: String::new(),
        }
    }
}

/// Assistant action-grammar configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantConfig {
    /// Spoken prefix that activates the action grammar
    #[serde(default = "default_trigger")]
    pub trigger: String,

    /// Treat every utterance as an assistant command
    #[serde(default)]
    pub enabled: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            trigger: default_trigger(),
            enabled: false,
        }
    }
}

/// Memory store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemoryConfig {
    /// Persist session transcripts and feed recent context to the LLM
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Text output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Copy to clipboard when no typing sink is available
    #[serde(default = "default_true")]
    pub fallback_to_clipboard: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fallback_to_clipboard: true,
        }
    }
}

fn default_hold_key() -> String {
    "RIGHTALT".to_string()
}

fn default_toggle_key() -> String {
    "F13".to_string()
}

fn default_refine_key() -> String {
    "F14".to_string()
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_max_duration() -> u32 {
    120
}

fn default_stt_command() -> String {
    "whisper-cli -f {file} -l {lang} --no-timestamps".to_string()
}

fn default_language() -> String {
    "zh".to_string()
}

fn default_stt_timeout() -> u64 {
    60000
}

fn default_llm_command() -> String {
    "ollama run llama3".to_string()
}

fn default_llm_timeout() -> u64 {
    30000
}

fn default_trigger() -> String {
    "小幫手".to_string()
}

fn default_state_file() -> Option<String> {
    Some("auto".to_string())
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: HotkeyConfig::default(),
            audio: AudioConfig::default(),
            stt: SttConfig::default(),
            llm: LlmConfig::default(),
            assistant: AssistantConfig::default(),
            memory: MemoryConfig::default(),
            output: OutputConfig::default(),
            state_file: default_state_file(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "voicetype")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "voicetype")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the data directory path (soul stack, stores, snippets)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "voicetype")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the runtime directory for ephemeral files (state, pid)
    pub fn runtime_dir() -> PathBuf {
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("voicetype")
    }

    /// Directory holding the persona/scenario/format prompt stack
    pub fn soul_dir() -> PathBuf {
        Self::data_dir().join("soul")
    }

    /// Directory holding snippet expansion files
    pub fn snippets_dir() -> PathBuf {
        Self::data_dir().join("snippets")
    }

    /// Directory holding the JSON stores (memory, stats, vocabulary)
    pub fn stores_dir() -> PathBuf {
        Self::data_dir().join("stores")
    }

    /// Resolve the state file path from config.
    /// Returns None if state_file is not configured or explicitly disabled.
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        self.state_file
            .as_ref()
            .and_then(|path| match path.to_lowercase().as_str() {
                "disabled" | "none" | "off" | "false" => None,
                "auto" => Some(Self::runtime_dir().join("state")),
                _ => Some(PathBuf::from(path)),
            })
    }

    /// Ensure all required directories exist
    pub fn ensure_directories() -> std::io::Result<()> {
        if let Some(config_dir) = Self::config_dir() {
            std::fs::create_dir_all(&config_dir)?;
        }

        let soul = Self::soul_dir();
        std::fs::create_dir_all(soul.join("scenario"))?;
        std::fs::create_dir_all(soul.join("format"))?;
        std::fs::create_dir_all(soul.join("templates"))?;
        std::fs::create_dir_all(Self::snippets_dir())?;
        std::fs::create_dir_all(Self::stores_dir())?;

        tracing::debug!("Ensured data directories under {:?}", Self::data_dir());
        Ok(())
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, VoiceTypeError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| VoiceTypeError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| VoiceTypeError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(key) = std::env::var("VOICETYPE_HOLD_KEY") {
        config.hotkey.hold = key;
    }
    if let Ok(cmd) = std::env::var("VOICETYPE_STT_COMMAND") {
        config.stt.command = cmd;
    }
    if let Ok(lang) = std::env::var("VOICETYPE_LANGUAGE") {
        config.stt.language = lang;
    }

    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &Config, path: &Path) -> Result<(), VoiceTypeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| VoiceTypeError::Config(format!("Failed to create config dir: {}", e)))?;
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| VoiceTypeError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, contents)
        .map_err(|e| VoiceTypeError::Config(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hotkey.hold, "RIGHTALT");
        assert_eq!(config.hotkey.toggle, "F13");
        assert_eq!(config.hotkey.refine, "F14");
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.stt.language, "zh");
        assert!(!config.llm.enabled);
        assert_eq!(config.llm.mode, LlmMode::Replace);
        assert!(config.llm.refine_only);
        assert!(config.memory.enabled);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
            [hotkey]
            hold = "PAUSE"
            toggle = "F20"

            [llm]
            enabled = true
            mode = "fast"

            [assistant]
            trigger = "助理"
            enabled = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.hotkey.hold, "PAUSE");
        assert_eq!(config.hotkey.toggle, "F20");
        assert_eq!(config.hotkey.refine, "F14"); // default preserved
        assert!(config.llm.enabled);
        assert_eq!(config.llm.mode, LlmMode::Fast);
        assert_eq!(config.assistant.trigger, "助理");
        assert!(config.assistant.enabled);
    }

    #[test]
    fn test_default_config_string_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.hotkey.hold, "RIGHTALT");
        assert_eq!(config.audio.max_duration_secs, 120);
        assert_eq!(config.assistant.trigger, "小幫手");
    }

    #[test]
    fn test_resolve_state_file() {
        let mut config = Config::default();
        assert!(config.resolve_state_file().is_some());

        config.state_file = Some("disabled".to_string());
        assert!(config.resolve_state_file().is_none());

        config.state_file = Some("/tmp/custom-state".to_string());
        assert_eq!(
            config.resolve_state_file(),
            Some(PathBuf::from("/tmp/custom-state"))
        );
    }
}
