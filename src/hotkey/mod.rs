//! Global hotkey capture and mode resolution
//!
//! On Linux, key events come from evdev (kernel-level, works on all
//! compositors). The platform mechanism is hidden behind the
//! [`GlobalInputSource`] trait; the [`HotkeyResolver`] turns raw
//! press/release events into mode start/stop signals while enforcing the
//! single-armed-mode invariant the rest of the pipeline depends on.
//!
//! Linux: requires the user to be in the 'input' group.

#[cfg(target_os = "linux")]
pub mod evdev_source;

use crate::config::HotkeyConfig;
use crate::error::HotkeyError;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Platform-neutral key identifier (evdev key code on Linux)
pub type KeyId = u16;

/// A raw key event from the global input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyId,
    pub pressed: bool,
}

/// Recording trigger mode, each bound to exactly one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerMode {
    /// Hold to record, release to transcribe
    HoldToTalk,
    /// Press to start recording, press again to stop
    Toggle,
    /// Hold to record with forced LLM refinement
    HoldForceRefine,
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerMode::HoldToTalk => write!(f, "hold-to-talk"),
            TriggerMode::Toggle => write!(f, "toggle"),
            TriggerMode::HoldForceRefine => write!(f, "force-refine"),
        }
    }
}

/// Signal emitted by the resolver toward the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeySignal {
    Start(TriggerMode),
    Stop(TriggerMode),
}

/// Immutable key → mode mapping.
///
/// Rebuilt only by reconstructing the resolver (hot-reload = stop +
/// reconstruct + start).
#[derive(Debug, Clone)]
pub struct HotkeyBindings {
    map: HashMap<KeyId, TriggerMode>,
}

impl HotkeyBindings {
    /// Build bindings from (key, mode) pairs, rejecting duplicate keys
    pub fn new(pairs: Vec<(KeyId, TriggerMode)>) -> Result<Self, HotkeyError> {
        let mut map = HashMap::new();
        for (key, mode) in pairs {
            if map.insert(key, mode).is_some() {
                return Err(HotkeyError::DuplicateBinding(format!("key code {}", key)));
            }
        }
        Ok(Self { map })
    }

    /// Key ids the input source should watch
    pub fn keys(&self) -> Vec<KeyId> {
        self.map.keys().copied().collect()
    }

    fn mode_for(&self, key: KeyId) -> Option<TriggerMode> {
        self.map.get(&key).copied()
    }
}

/// Maps raw key events to mode start/stop signals.
///
/// Invariant: at most one mode is armed (key physically down, or
/// toggle-engaged) at any instant. Presses for other modes while one is
/// armed are ignored, which transitively guarantees at most one concurrent
/// recording session.
pub struct HotkeyResolver {
    bindings: HotkeyBindings,
    armed: Option<TriggerMode>,
}

impl HotkeyResolver {
    pub fn new(bindings: HotkeyBindings) -> Self {
        Self {
            bindings,
            armed: None,
        }
    }

    /// The currently armed mode, if any
    pub fn armed(&self) -> Option<TriggerMode> {
        self.armed
    }

    /// Process one raw key event, returning the signal to dispatch (if any).
    ///
    /// The caller must dispatch signals fire-and-forget so the input event
    /// source never stalls waiting on pipeline work.
    pub fn handle(&mut self, event: KeyEvent) -> Option<HotkeySignal> {
        let mode = self.bindings.mode_for(event.key)?;

        match mode {
            TriggerMode::Toggle => {
                // Release events for toggle keys are ignored
                if !event.pressed {
                    return None;
                }
                match self.armed {
                    None => {
                        self.armed = Some(TriggerMode::Toggle);
                        Some(HotkeySignal::Start(TriggerMode::Toggle))
                    }
                    Some(TriggerMode::Toggle) => {
                        self.armed = None;
                        Some(HotkeySignal::Stop(TriggerMode::Toggle))
                    }
                    // Another mode is armed; exclusivity wins
                    Some(_) => None,
                }
            }
            hold => {
                if event.pressed {
                    if self.armed.is_none() {
                        self.armed = Some(hold);
                        Some(HotkeySignal::Start(hold))
                    } else {
                        None
                    }
                } else if self.armed == Some(hold) {
                    self.armed = None;
                    Some(HotkeySignal::Stop(hold))
                } else {
                    None
                }
            }
        }
    }
}

/// Trait for global key-event sources.
///
/// Implementations deliver raw (key, pressed|released) events on a channel
/// fed from a dedicated thread; they never block on consumers.
#[async_trait::async_trait]
pub trait GlobalInputSource: Send + Sync {
    /// Start listening; returns the raw key event stream
    async fn start(&mut self) -> Result<mpsc::Receiver<KeyEvent>, HotkeyError>;

    /// Stop listening and clean up
    async fn stop(&mut self) -> Result<(), HotkeyError>;
}

/// Create the platform input source and the resolved bindings for the
/// configured key chords.
#[cfg(target_os = "linux")]
pub fn create_source(
    config: &HotkeyConfig,
) -> Result<(Box<dyn GlobalInputSource>, HotkeyBindings), HotkeyError> {
    let bindings = HotkeyBindings::new(vec![
        (
            evdev_source::parse_key_name(&config.hold)?.code(),
            TriggerMode::HoldToTalk,
        ),
        (
            evdev_source::parse_key_name(&config.toggle)?.code(),
            TriggerMode::Toggle,
        ),
        (
            evdev_source::parse_key_name(&config.refine)?.code(),
            TriggerMode::HoldForceRefine,
        ),
    ])?;

    let source = evdev_source::EvdevSource::new(bindings.keys())?;
    Ok((Box::new(source), bindings))
}

/// Global hotkey capture is only implemented for Linux evdev; other
/// platforms must drive the daemon through an external trigger.
#[cfg(not(target_os = "linux"))]
pub fn create_source(
    _config: &HotkeyConfig,
) -> Result<(Box<dyn GlobalInputSource>, HotkeyBindings), HotkeyError> {
    Err(HotkeyError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLD: KeyId = 100;
    const TOGGLE: KeyId = 183; // F13
    const REFINE: KeyId = 184; // F14
    const UNBOUND: KeyId = 30;

    fn resolver() -> HotkeyResolver {
        HotkeyResolver::new(
            HotkeyBindings::new(vec![
                (HOLD, TriggerMode::HoldToTalk),
                (TOGGLE, TriggerMode::Toggle),
                (REFINE, TriggerMode::HoldForceRefine),
            ])
            .unwrap(),
        )
    }

    fn press(key: KeyId) -> KeyEvent {
        KeyEvent { key, pressed: true }
    }

    fn release(key: KeyId) -> KeyEvent {
        KeyEvent {
            key,
            pressed: false,
        }
    }

    #[test]
    fn test_unmapped_key_ignored() {
        let mut r = resolver();
        assert_eq!(r.handle(press(UNBOUND)), None);
        assert_eq!(r.handle(release(UNBOUND)), None);
        assert_eq!(r.armed(), None);
    }

    #[test]
    fn test_hold_press_release_cycle() {
        let mut r = resolver();
        assert_eq!(
            r.handle(press(HOLD)),
            Some(HotkeySignal::Start(TriggerMode::HoldToTalk))
        );
        assert_eq!(r.armed(), Some(TriggerMode::HoldToTalk));
        assert_eq!(
            r.handle(release(HOLD)),
            Some(HotkeySignal::Stop(TriggerMode::HoldToTalk))
        );
        assert_eq!(r.armed(), None);
    }

    #[test]
    fn test_toggle_twice_emits_one_start_one_stop() {
        let mut r = resolver();
        assert_eq!(
            r.handle(press(TOGGLE)),
            Some(HotkeySignal::Start(TriggerMode::Toggle))
        );
        // Toggle key release is ignored
        assert_eq!(r.handle(release(TOGGLE)), None);
        assert_eq!(r.armed(), Some(TriggerMode::Toggle));

        assert_eq!(
            r.handle(press(TOGGLE)),
            Some(HotkeySignal::Stop(TriggerMode::Toggle))
        );
        assert_eq!(r.handle(release(TOGGLE)), None);
        assert_eq!(r.armed(), None);
    }

    #[test]
    fn test_exclusivity_press_while_armed_is_ignored() {
        let mut r = resolver();
        assert!(r.handle(press(HOLD)).is_some());

        // Another hold mode and the toggle are both locked out
        assert_eq!(r.handle(press(REFINE)), None);
        assert_eq!(r.handle(press(TOGGLE)), None);
        assert_eq!(r.armed(), Some(TriggerMode::HoldToTalk));

        // Releasing the non-armed key emits nothing
        assert_eq!(r.handle(release(REFINE)), None);
        assert_eq!(
            r.handle(release(HOLD)),
            Some(HotkeySignal::Stop(TriggerMode::HoldToTalk))
        );
    }

    #[test]
    fn test_release_of_non_armed_key_emits_no_stop() {
        let mut r = resolver();
        assert!(r.handle(press(TOGGLE)).is_some());

        // Hold-key release while toggle is armed must not emit a stop
        assert_eq!(r.handle(release(HOLD)), None);
        assert_eq!(r.handle(release(REFINE)), None);
        assert_eq!(r.armed(), Some(TriggerMode::Toggle));
    }

    #[test]
    fn test_force_refine_mode_round_trip() {
        let mut r = resolver();
        assert_eq!(
            r.handle(press(REFINE)),
            Some(HotkeySignal::Start(TriggerMode::HoldForceRefine))
        );
        assert_eq!(
            r.handle(release(REFINE)),
            Some(HotkeySignal::Stop(TriggerMode::HoldForceRefine))
        );
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let result = HotkeyBindings::new(vec![
            (HOLD, TriggerMode::HoldToTalk),
            (HOLD, TriggerMode::Toggle),
        ]);
        assert!(result.is_err());
    }
}
