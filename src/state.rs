//! Session state machine and shared dictation context
//!
//! The pipeline moves through:
//! Idle → Recording → Transcribing → Intercepting → Dispatching →
//! Refining → Injecting → PostProcessing → Idle
//!
//! `SessionState` is the daemon's observable state (written to the state
//! file); `SharedState` is the mutable dictation context that magic
//! commands toggle and the refinement planner reads.

use crate::hotkey::TriggerMode;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Observable pipeline state
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Waiting for a trigger
    Idle,

    /// Capture session running
    Recording {
        /// When recording started
        started_at: Instant,
    },

    /// Audio handed to the STT backend
    Transcribing,

    /// Checking the transcript against the magic-phrase table
    Intercepting,

    /// Assistant action in flight
    Dispatching,

    /// LLM refinement in flight
    Refining,

    /// Writing text to the focused application
    Injecting,

    /// Fire-and-forget store updates
    PostProcessing,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState::Idle
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording { .. })
    }

    /// Recording duration if currently recording
    pub fn recording_duration(&self) -> Option<Duration> {
        match self {
            SessionState::Recording { started_at } => Some(started_at.elapsed()),
            _ => None,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Recording { started_at } => {
                write!(f, "Recording ({:.1}s)", started_at.elapsed().as_secs_f32())
            }
            SessionState::Transcribing => write!(f, "Transcribing"),
            SessionState::Intercepting => write!(f, "Intercepting"),
            SessionState::Dispatching => write!(f, "Dispatching"),
            SessionState::Refining => write!(f, "Refining"),
            SessionState::Injecting => write!(f, "Injecting"),
            SessionState::PostProcessing => write!(f, "PostProcessing"),
        }
    }
}

/// One recording session, created at trigger start
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: Uuid,
    pub mode: TriggerMode,
    pub started_at: Instant,
}

impl RecordingSession {
    pub fn new(mode: TriggerMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            started_at: Instant::now(),
        }
    }
}

/// What a completed pipeline run produced
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    /// Text actually delivered to the user (possibly refined)
    pub final_text: String,
    /// Raw transcript before refinement
    pub stt_text: String,
    /// Recording duration in seconds
    pub duration_secs: f64,
}

/// Snapshot of the dictation context at pipeline time.
///
/// Taken once per session so a magic command landing mid-pipeline cannot
/// change a run that already started.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    pub translation_target: Option<String>,
    pub scenario: Option<String>,
    pub format: Option<String>,
    pub template_exemplar: Option<String>,
    pub assistant_mode: bool,
    pub llm_enabled: bool,
}

/// Mutable dictation context shared between the orchestrator, the command
/// interceptor and the refinement planner.
///
/// Plain std RwLock: every critical section is a short field read or write,
/// never held across await points.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: RwLock<SharedInner>,
}

#[derive(Debug, Default)]
struct SharedInner {
    translation_target: Option<String>,
    scenario: Option<String>,
    format: Option<String>,
    /// One-shot template exemplar, consumed by the next session
    template_exemplar: Option<String>,
    assistant_mode: bool,
    llm_enabled: bool,
    last_outcome: Option<PipelineOutcome>,
}

impl SharedState {
    pub fn new(llm_enabled: bool, assistant_mode: bool) -> Self {
        Self {
            inner: RwLock::new(SharedInner {
                llm_enabled,
                assistant_mode,
                ..Default::default()
            }),
        }
    }

    pub fn set_translation_target(&self, target: Option<String>) {
        self.inner.write().unwrap().translation_target = target;
    }

    pub fn translation_target(&self) -> Option<String> {
        self.inner.read().unwrap().translation_target.clone()
    }

    pub fn set_scenario(&self, scenario: Option<String>) {
        self.inner.write().unwrap().scenario = scenario;
    }

    pub fn set_format(&self, format: Option<String>) {
        self.inner.write().unwrap().format = format;
    }

    /// Arm a one-shot template exemplar for the next dictation
    pub fn set_template_exemplar(&self, content: String) {
        self.inner.write().unwrap().template_exemplar = Some(content);
    }

    /// Consume the armed template exemplar, if any
    pub fn take_template_exemplar(&self) -> Option<String> {
        self.inner.write().unwrap().template_exemplar.take()
    }

    pub fn set_assistant_mode(&self, on: bool) {
        self.inner.write().unwrap().assistant_mode = on;
    }

    pub fn assistant_mode(&self) -> bool {
        self.inner.read().unwrap().assistant_mode
    }

    pub fn set_llm_enabled(&self, on: bool) {
        self.inner.write().unwrap().llm_enabled = on;
    }

    pub fn llm_enabled(&self) -> bool {
        self.inner.read().unwrap().llm_enabled
    }

    pub fn record_outcome(&self, outcome: PipelineOutcome) {
        self.inner.write().unwrap().last_outcome = Some(outcome);
    }

    pub fn last_outcome(&self) -> Option<PipelineOutcome> {
        self.inner.read().unwrap().last_outcome.clone()
    }

    /// Reset every mode toggle back to plain dictation
    pub fn reset_modes(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.translation_target = None;
        inner.scenario = None;
        inner.format = None;
        inner.template_exemplar = None;
        inner.assistant_mode = false;
    }

    /// Take a consistent copy of the context for one pipeline run.
    ///
    /// Consumes the one-shot template exemplar.
    pub fn snapshot(&self) -> ContextSnapshot {
        let mut inner = self.inner.write().unwrap();
        ContextSnapshot {
            translation_target: inner.translation_target.clone(),
            scenario: inner.scenario.clone(),
            format: inner.format.clone(),
            template_exemplar: inner.template_exemplar.take(),
            assistant_mode: inner.assistant_mode,
            llm_enabled: inner.llm_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_idle() {
        let state = SessionState::new();
        assert!(state.is_idle());
        assert!(state.recording_duration().is_none());
    }

    #[test]
    fn test_recording_state() {
        let state = SessionState::Recording {
            started_at: Instant::now(),
        };
        assert!(state.is_recording());
        assert!(!state.is_idle());
        assert!(state.recording_duration().is_some());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", SessionState::Idle), "Idle");
        let recording = SessionState::Recording {
            started_at: Instant::now(),
        };
        assert!(format!("{}", recording).starts_with("Recording"));
    }

    #[test]
    fn test_template_exemplar_is_one_shot() {
        let shared = SharedState::new(false, false);
        shared.set_template_exemplar("範例內容".to_string());

        let first = shared.snapshot();
        assert_eq!(first.template_exemplar.as_deref(), Some("範例內容"));

        let second = shared.snapshot();
        assert_eq!(second.template_exemplar, None);
    }

    #[test]
    fn test_reset_modes_clears_everything() {
        let shared = SharedState::new(true, false);
        shared.set_translation_target(Some("英文".to_string()));
        shared.set_scenario(Some("complaint".to_string()));
        shared.set_format(Some("bullet".to_string()));
        shared.set_assistant_mode(true);

        shared.reset_modes();
        let snap = shared.snapshot();
        assert_eq!(snap.translation_target, None);
        assert_eq!(snap.scenario, None);
        assert_eq!(snap.format, None);
        assert!(!snap.assistant_mode);
        // llm_enabled is a config toggle, not a mode
        assert!(snap.llm_enabled);
    }

    #[test]
    fn test_sessions_get_unique_ids() {
        let a = RecordingSession::new(TriggerMode::HoldToTalk);
        let b = RecordingSession::new(TriggerMode::Toggle);
        assert_ne!(a.id, b.id);
    }
}
