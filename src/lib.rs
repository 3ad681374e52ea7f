//! Voicetype: Hotkey-driven voice dictation for Wayland
//!
//! This library provides the core functionality for:
//! - Resolving global hotkeys via evdev into hold-to-talk / toggle /
//!   force-refine recording signals
//! - Capturing audio via cpal (supports PipeWire, PulseAudio, ALSA)
//! - Transcribing via an external STT command (whisper.cpp and friends)
//! - Intercepting spoken magic phrases (translation, scenario/format
//!   switches, templates) and assistant actions (weather, time, search,
//!   open-URL, calculator)
//! - Refining transcripts through an external LLM command, either
//!   synchronously or via the speculative inject-now-replace-later path
//! - Injecting text via wtype with a clipboard fallback
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────────────────┐
//!                    │               Daemon                │
//!                    └─────────────────────────────────────┘
//!                                      │
//!           ┌──────────────────────────┼──────────────────┐
//!           ▼                          ▼                  ▼
//!    ┌──────────────┐          ┌──────────────┐    ┌──────────────┐
//!    │    Hotkey    │          │ Orchestrator │    │  State file  │
//!    │   (evdev)    │          │ (one slot)   │    │   (Waybar)   │
//!    └──────────────┘          └──────────────┘    └──────────────┘
//!           │ start/stop               │
//!           ▼                          ▼
//!    ┌─────────────────────────────────────────────────────────────┐
//!    │                       Pipeline per session                  │
//!    │  Capture ─▶ STT ─▶ Intercept ─▶ Dispatch ─▶ Refine ─▶ Inject│
//!    │  (cpal)    (cmd)   (magic)      (assistant) (cmd)    (wtype)│
//!    └─────────────────────────────────────────────────────────────┘
//!                                      │
//!                                      ▼ fire-and-forget
//!                        memory / stats / vocabulary stores
//! ```

pub mod actions;
pub mod audio;
pub mod backend;
pub mod command;
pub mod config;
pub mod daemon;
pub mod error;
pub mod hotkey;
pub mod output;
pub mod refine;
pub mod soul;
pub mod state;
pub mod store;
pub mod text;

pub use config::Config;
pub use daemon::{Daemon, Orchestrator};
pub use error::{Result, VoiceTypeError};
