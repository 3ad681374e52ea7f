//! Daemon module - recording lifecycle orchestration
//!
//! The [`Orchestrator`] owns the single recording slot and runs the
//! pipeline for each finished recording:
//! transcribe → intercept → dispatch → refine → inject → post-process.
//! The [`Daemon`] wires it to the global hotkey source, Unix signals and
//! the state file, and enforces the recording duration limit.

use crate::actions::ActionDispatcher;
use crate::audio::capture::CaptureSession;
use crate::backend::{self, LlmBackend, SttBackend};
use crate::command::{CommandInterceptor, MagicCommand};
use crate::config::Config;
use crate::error::Result;
use crate::hotkey::{self, GlobalInputSource, HotkeyResolver, HotkeySignal, TriggerMode};
use crate::output::clipboard::copy_to_clipboard;
use crate::output::SinkChain;
use crate::refine::{output_acceptable, RefineStrategy, RefinementCoordinator, RefinementPlan};
use crate::soul::PromptLibrary;
use crate::state::{PipelineOutcome, RecordingSession, SharedState};
use crate::store::{MemoryStore, StatsStore, TemplateStore, VocabStore};
use crate::text::{normalize_punctuation, SnippetExpander};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::signal::unix::{signal, SignalKind};

/// Recordings shorter than this are treated as accidental presses
const MIN_RECORDING_SECS: f64 = 0.3;

/// Send a desktop notification
async fn send_notification(title: &str, body: &str) {
    let _ = Command::new("notify-send")
        .args(["--app-name=Voicetype", "--expire-time=2000", title, body])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}

/// Write state to file for external integrations (e.g., Waybar)
fn write_state_file(path: &PathBuf, state: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create state file directory: {}", e);
            return;
        }
    }

    if let Err(e) = std::fs::write(path, state) {
        tracing::warn!("Failed to write state file: {}", e);
    } else {
        tracing::trace!("State file updated: {}", state);
    }
}

/// Remove state file on shutdown
fn cleanup_state_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove state file: {}", e);
        }
    }
}

/// Write PID file for external control via signals
fn write_pid_file() -> Option<PathBuf> {
    let pid_path = Config::runtime_dir().join("pid");

    if let Some(parent) = pid_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create PID file directory: {}", e);
            return None;
        }
    }

    let pid = std::process::id();
    if let Err(e) = std::fs::write(&pid_path, pid.to_string()) {
        tracing::warn!("Failed to write PID file: {}", e);
        return None;
    }

    tracing::debug!("PID file written: {:?} (pid={})", pid_path, pid);
    Some(pid_path)
}

/// Remove PID file on shutdown
fn cleanup_pid_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove PID file: {}", e);
        }
    }
}

/// The single recording slot
struct ActiveSession {
    session: RecordingSession,
    capture: CaptureSession,
}

/// Runs the pipeline for each recording.
///
/// Shared behind an Arc so hotkey signals can be dispatched fire-and-forget;
/// the `current` mutex guarantees at most one active recording regardless of
/// how many signals arrive.
pub struct Orchestrator {
    config: Config,
    shared: SharedState,
    stt: Arc<dyn SttBackend>,
    llm: Option<Arc<dyn LlmBackend>>,
    sinks: SinkChain,
    interceptor: CommandInterceptor,
    dispatcher: ActionDispatcher,
    coordinator: RefinementCoordinator,
    prompts: PromptLibrary,
    snippets: SnippetExpander,
    memory: Arc<MemoryStore>,
    stats: Arc<StatsStore>,
    vocab: Arc<VocabStore>,
    templates: TemplateStore,
    current: tokio::sync::Mutex<Option<ActiveSession>>,
    /// Detached fast-replace task from the previous session, aborted
    /// before a new recording may start
    pending_replace: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    state_file: Option<PathBuf>,
}

impl Orchestrator {
    /// Assemble the pipeline around the given backends and sink chain.
    ///
    /// `data_dir` holds the soul prompt stack, snippets and JSON stores;
    /// tests point it at a temp directory.
    pub fn new(
        config: Config,
        stt: Arc<dyn SttBackend>,
        llm: Option<Arc<dyn LlmBackend>>,
        sinks: SinkChain,
        data_dir: PathBuf,
    ) -> Arc<Self> {
        let soul_dir = data_dir.join("soul");
        let stores_dir = data_dir.join("stores");
        let prompts = PromptLibrary::new(soul_dir.clone());
        let state_file = config.resolve_state_file();

        Arc::new(Self {
            shared: SharedState::new(config.llm.enabled, config.assistant.enabled),
            interceptor: CommandInterceptor::new(),
            dispatcher: ActionDispatcher::new(&config.assistant.trigger),
            coordinator: RefinementCoordinator::new(config.llm.clone(), prompts.clone()),
            snippets: SnippetExpander::load(&data_dir.join("snippets")),
            memory: Arc::new(MemoryStore::new(stores_dir.clone())),
            stats: Arc::new(StatsStore::new(stores_dir.clone())),
            vocab: Arc::new(VocabStore::new(stores_dir)),
            templates: TemplateStore::new(soul_dir.join("templates")),
            current: tokio::sync::Mutex::new(None),
            pending_replace: std::sync::Mutex::new(None),
            prompts,
            state_file,
            config,
            stt,
            llm,
            sinks,
        })
    }

    /// The shared dictation context (mode toggles, last outcome)
    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    /// How long the current recording has been running, if any
    pub async fn recording_duration(&self) -> Option<Duration> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|active| active.session.started_at.elapsed())
    }

    /// Update the state file if configured
    fn update_state(&self, state_name: &str) {
        if let Some(ref path) = self.state_file {
            write_state_file(path, state_name);
        }
    }

    /// Handle one resolved hotkey signal
    pub async fn handle_signal(self: Arc<Self>, signal: HotkeySignal) {
        match signal {
            HotkeySignal::Start(mode) => self.start_recording(mode).await,
            HotkeySignal::Stop(_) => self.stop_recording().await,
        }
    }

    /// Open the microphone and occupy the recording slot
    pub async fn start_recording(&self, mode: TriggerMode) {
        // A fast-replace still in flight would race the new session's
        // injection; cancel it before recording anything new
        if let Some(handle) = self.pending_replace.lock().unwrap().take() {
            handle.abort();
            tracing::debug!("Aborted pending fast-replace task");
        }

        let mut slot = self.current.lock().await;
        if slot.is_some() {
            tracing::warn!("Recording already in progress, ignoring start ({})", mode);
            return;
        }

        let mut capture = CaptureSession::new(&self.config.audio);
        if let Err(e) = capture.start().await {
            tracing::error!("Failed to start audio capture: {}", e);
            send_notification("Voicetype", &format!("Microphone error: {}", e)).await;
            return;
        }

        let session = RecordingSession::new(mode);
        tracing::info!("Recording started ({}, session {})", mode, session.id);
        *slot = Some(ActiveSession { session, capture });
        self.update_state("recording");
    }

    /// Release the recording slot and run the pipeline on what was captured
    pub async fn stop_recording(self: Arc<Self>) {
        let Some(mut active) = self.current.lock().await.take() else {
            tracing::debug!("Stop signal with no active recording, ignoring");
            return;
        };

        let duration = active.session.started_at.elapsed().as_secs_f64();
        tracing::info!("Recording stopped ({:.1}s)", duration);
        self.update_state("transcribing");

        let wav = match active.capture.stop().await {
            Ok(wav) => wav,
            Err(e) => {
                tracing::error!("Failed to stop audio capture: {}", e);
                self.update_state("idle");
                return;
            }
        };

        if duration < MIN_RECORDING_SECS {
            tracing::debug!("Recording too short ({:.2}s), ignoring", duration);
            self.update_state("idle");
            return;
        }

        self.clone()
            .complete_session(active.session, wav, duration)
            .await;
        self.update_state("idle");
    }

    /// Wait for a pending fast-replace task to finish, if any. Used when
    /// draining the pipeline before shutdown.
    pub async fn drain_pending_replace(&self) {
        let handle = self.pending_replace.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Discard the current recording without running the pipeline
    pub async fn abort_recording(&self) {
        if let Some(mut active) = self.current.lock().await.take() {
            let _ = active.capture.stop().await;
            tracing::info!("Recording discarded (session {})", active.session.id);
            self.update_state("idle");
        }
    }

    /// Run the post-recording pipeline for one finished WAV blob.
    ///
    /// `duration_secs` is the recording length measured at trigger-stop;
    /// it must not absorb transcription latency. Public so the pipeline
    /// can be driven without a microphone.
    pub async fn complete_session(
        self: Arc<Self>,
        session: RecordingSession,
        wav: Vec<u8>,
        duration_secs: f64,
    ) {
        if wav.is_empty() {
            tracing::debug!("Empty recording, nothing to transcribe");
            return;
        }

        let transcript = match self.stt.transcribe(&wav, &self.config.stt.language).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Transcription failed: {}", e);
                send_notification("Voicetype", &format!("Transcription failed: {}", e)).await;
                return;
            }
        };

        let transcript = transcript.trim();
        if transcript.is_empty() {
            tracing::info!("Heard nothing, back to idle");
            return;
        }
        tracing::info!("Transcript: {}", transcript);

        let text = self.snippets.expand(&normalize_punctuation(transcript));

        self.update_state("intercepting");
        if let Some(command) = self.interceptor.intercept(&text) {
            self.apply_magic(command).await;
            return;
        }

        // The shared flag is seeded from config.assistant.enabled at
        // construction; reading only the shared flag lets a spoken reset
        // actually turn the mode off
        if let Some(clause) = self.dispatcher.activation(&text, self.shared.assistant_mode()) {
            self.update_state("dispatching");
            if let Some(answer) = self.dispatcher.dispatch(&clause).await {
                self.inject(&answer).await;
                return;
            }
            // Addressed but no action matched; treat as plain dictation
            tracing::debug!("Assistant addressed, no action matched: {}", clause);
        }

        let snapshot = self.shared.snapshot();
        let memory_context = if self.config.memory.enabled {
            self.memory.context_for_llm().unwrap_or_else(|e| {
                tracing::warn!("Failed to read memory context: {}", e);
                String::new()
            })
        } else {
            String::new()
        };

        let vocab_hint = self.vocab.hint_prompt().unwrap_or_else(|e| {
            tracing::warn!("Failed to read vocabulary hints: {}", e);
            String::new()
        });

        let plan = self.coordinator.plan(
            &text,
            &snapshot,
            session.mode,
            &memory_context,
            &vocab_hint,
            self.llm.is_some(),
        );

        // A turn that runs no refinement must not burn the one-shot
        // exemplar; keep it armed for a session that can use it
        if plan.strategy == RefineStrategy::None {
            if let Some(exemplar) = snapshot.template_exemplar {
                self.shared.set_template_exemplar(exemplar);
            }
        }

        let stt_text = text.clone();

        let final_text = match plan.strategy {
            RefineStrategy::None => {
                self.update_state("injecting");
                self.inject(&text).await;
                text
            }
            RefineStrategy::SynchronousReplace => {
                self.update_state("refining");
                let refined = self.refine(&plan.user_message, &plan.system_prompt, &text).await;
                self.update_state("injecting");
                self.inject(&refined).await;
                refined
            }
            RefineStrategy::SpeculativeFast => {
                // Type the raw transcript now, replace it in place when the
                // refined text arrives
                self.update_state("injecting");
                self.inject(&text).await;
                let handle =
                    Self::spawn_fast_replace(self.clone(), session, plan, text, duration_secs);
                *self.pending_replace.lock().unwrap() = Some(handle);
                return;
            }
        };

        self.post_process(stt_text, final_text, duration_secs);
    }

    /// Mutate the shared context per a matched magic phrase and inject its
    /// spoken-style confirmation. Post-processing is skipped for
    /// command-only turns.
    async fn apply_magic(&self, command: MagicCommand) {
        let confirmation = match command {
            MagicCommand::TranslationSet(target) => {
                let message = format!("好的，我將為您翻譯成{}。", target);
                self.shared.set_translation_target(Some(target));
                message
            }
            MagicCommand::TranslationCleared => {
                self.shared.reset_modes();
                "已恢復正常模式。".to_string()
            }
            MagicCommand::ScenarioSet { id, label } => {
                self.shared.set_scenario(Some(id));
                format!("已切換到{}情境。", label)
            }
            MagicCommand::FormatSet { id, label } => {
                self.shared.set_format(Some(id));
                format!("已改用{}格式。", label)
            }
            MagicCommand::TemplateSave(label) => {
                let Some(outcome) = self.shared.last_outcome() else {
                    self.inject("沒有可以儲存的內容。").await;
                    return;
                };
                match self.templates.save(label.as_deref(), &outcome.final_text) {
                    Ok(stem) => format!("已儲存模板「{}」。", stem),
                    Err(e) => {
                        tracing::error!("Failed to save template: {}", e);
                        "模板儲存失敗。".to_string()
                    }
                }
            }
            MagicCommand::TemplateRecall(name) => match self.templates.recall(&name) {
                Ok(Some(content)) => {
                    self.shared.set_template_exemplar(content);
                    format!("已套用模板「{}」，下一句將模仿其風格。", name)
                }
                Ok(None) => format!("找不到模板「{}」。", name),
                Err(e) => {
                    tracing::error!("Failed to recall template: {}", e);
                    "模板載入失敗。".to_string()
                }
            },
        };

        self.update_state("injecting");
        self.inject(&confirmation).await;
    }

    /// One refinement round trip; empty, failed or guard-rejected results
    /// keep the draft unchanged
    async fn refine(&self, user_message: &str, system_prompt: &str, draft: &str) -> String {
        let Some(llm) = &self.llm else {
            return draft.to_string();
        };

        match llm.refine(user_message, system_prompt).await {
            Ok(refined) => {
                let refined = refined.trim();
                if refined.is_empty() {
                    tracing::warn!("Refinement returned nothing, keeping draft");
                    return draft.to_string();
                }
                if !output_acceptable(refined, draft, &self.prompts.base()) {
                    tracing::warn!("Refinement output rejected by validity guard");
                    return draft.to_string();
                }
                normalize_punctuation(refined)
            }
            Err(e) => {
                tracing::warn!("Refinement failed, keeping draft: {}", e);
                draft.to_string()
            }
        }
    }

    /// Detached refine-then-replace task for the speculative fast path.
    ///
    /// N for the select-back is the character count actually injected
    /// moments earlier; the replace assumes the cursor has not moved since.
    fn spawn_fast_replace(
        orchestrator: Arc<Self>,
        session: RecordingSession,
        plan: RefinementPlan,
        injected: String,
        duration_secs: f64,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let refined = orchestrator
                .refine(&plan.user_message, &plan.system_prompt, &injected)
                .await;

            if refined != injected {
                match orchestrator.sinks.first_available().await {
                    Some(sink) if sink.supports_replace() => {
                        let injected_chars = injected.chars().count();
                        match sink.select_back(injected_chars).await {
                            Ok(()) => {
                                if let Err(e) = sink.inject(&refined).await {
                                    tracing::error!("Fast replace injection failed: {}", e);
                                }
                            }
                            Err(e) => {
                                tracing::warn!("Select-back failed, refined text lost: {}", e);
                            }
                        }
                    }
                    _ => {
                        // No replace-capable sink; leave the raw text and
                        // park the refined version on the clipboard
                        tracing::debug!("No replace-capable sink for fast path");
                        let _ = copy_to_clipboard(&refined).await;
                    }
                }
            } else {
                tracing::debug!("Refined text identical, no replacement needed");
            }

            orchestrator.post_process(injected, refined, duration_secs);
            tracing::trace!("Fast-replace task for session {} finished", session.id);
        })
    }

    /// Deliver text through the sink chain, with the clipboard copy the
    /// full pipeline promises
    async fn inject(&self, text: &str) {
        if let Err(e) = self.sinks.inject(text).await {
            tracing::error!("Text injection failed: {}", e);
            send_notification("Voicetype", "Text injection failed. Is wtype installed?").await;
            return;
        }

        if self.config.output.fallback_to_clipboard {
            if let Err(e) = copy_to_clipboard(text).await {
                tracing::debug!("Clipboard copy failed: {}", e);
            }
        }
    }

    /// Fan out the store updates; none of these may block the return to
    /// idle, and all failures are logged and swallowed
    fn post_process(self: &Arc<Self>, stt_text: String, final_text: String, duration_secs: f64) {
        self.update_state("postprocessing");

        self.shared.record_outcome(PipelineOutcome {
            final_text: final_text.clone(),
            stt_text: stt_text.clone(),
            duration_secs,
        });

        if self.config.memory.enabled {
            let memory = self.memory.clone();
            let (stt, fin) = (stt_text.clone(), final_text.clone());
            tokio::task::spawn_blocking(move || {
                if let Err(e) = memory.add_entry(&stt, &fin) {
                    tracing::warn!("Memory store update failed: {}", e);
                }
            });
        }

        let stats = self.stats.clone();
        let char_count = final_text.chars().count();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = stats.record_session(duration_secs, char_count) {
                tracing::warn!("Stats store update failed: {}", e);
            }
        });

        let vocab = self.vocab.clone();
        let llm = if self.shared.llm_enabled() {
            self.llm.clone()
        } else {
            None
        };
        tokio::spawn(async move {
            if let Err(e) = vocab.learn_from_text(&stt_text) {
                tracing::warn!("Vocabulary update failed: {}", e);
            }
            if let Some(llm) = llm {
                if let Err(e) = vocab.learn_from_text_with_llm(llm, &stt_text).await {
                    tracing::warn!("Keyword extraction failed: {}", e);
                }
            }
        });

        self.update_state("idle");
    }
}

/// Main daemon that wires the orchestrator to the outside world
pub struct Daemon {
    config: Config,
    pid_file_path: Option<PathBuf>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pid_file_path: None,
        }
    }

    /// Run the daemon main loop
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting voicetype daemon");

        // Write PID file for external control via signals
        self.pid_file_path = write_pid_file();

        // Set up signal handlers for external control
        let mut sigusr1 = signal(SignalKind::user_defined1()).map_err(|e| {
            crate::error::VoiceTypeError::Config(format!("Failed to set up SIGUSR1 handler: {}", e))
        })?;
        let mut sigusr2 = signal(SignalKind::user_defined2()).map_err(|e| {
            crate::error::VoiceTypeError::Config(format!("Failed to set up SIGUSR2 handler: {}", e))
        })?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
            crate::error::VoiceTypeError::Config(format!("Failed to set up SIGTERM handler: {}", e))
        })?;

        Config::ensure_directories().map_err(|e| {
            crate::error::VoiceTypeError::Config(format!("Failed to create directories: {}", e))
        })?;

        let stt = backend::create_stt(&self.config.stt)?;
        tracing::info!("STT backend: {}", self.config.stt.command);

        // The LLM backend is created even when refinement is off; the
        // force-refine hotkey and translation targets can still need it
        let llm = match backend::create_llm(&self.config.llm) {
            Ok(llm) => {
                tracing::info!("LLM backend: {}", self.config.llm.command);
                Some(llm)
            }
            Err(e) => {
                tracing::warn!("LLM backend unavailable, refinement disabled: {}", e);
                None
            }
        };

        let sinks = SinkChain::new(&self.config.output);

        let orchestrator = Orchestrator::new(
            self.config.clone(),
            stt,
            llm,
            sinks,
            Config::data_dir(),
        );

        if let Some(path) = self.config.resolve_state_file() {
            tracing::info!("State file: {:?}", path);
        }

        // Initialize hotkey capture (if enabled)
        let (mut input_source, mut key_rx, mut resolver) = if self.config.hotkey.enabled {
            let (mut source, bindings) = hotkey::create_source(&self.config.hotkey)?;
            let rx = source.start().await?;
            tracing::info!(
                "Hotkeys: hold={} toggle={} refine={}",
                self.config.hotkey.hold,
                self.config.hotkey.toggle,
                self.config.hotkey.refine
            );
            (Some(source), Some(rx), Some(HotkeyResolver::new(bindings)))
        } else {
            tracing::info!("Built-in hotkeys disabled, use SIGUSR1/SIGUSR2 or compositor keybindings");
            (None, None, None)
        };

        let max_duration = Duration::from_secs(self.config.audio.max_duration_secs as u64);

        orchestrator.update_state("idle");

        loop {
            tokio::select! {
                // Raw key events, resolved to start/stop signals and
                // dispatched fire-and-forget so the input source never
                // stalls on pipeline work
                Some(event) = async {
                    match &mut key_rx {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some(resolver) = &mut resolver {
                        if let Some(signal) = resolver.handle(event) {
                            tracing::debug!("Hotkey signal: {:?}", signal);
                            let orch = orchestrator.clone();
                            tokio::spawn(async move {
                                orch.handle_signal(signal).await;
                            });
                        }
                    }
                }

                // Enforce the recording duration limit
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    if let Some(duration) = orchestrator.recording_duration().await {
                        if duration > max_duration {
                            tracing::warn!(
                                "Recording timeout ({:.0}s limit), discarding",
                                max_duration.as_secs_f32()
                            );
                            orchestrator.abort_recording().await;
                        }
                    }
                }

                // External start trigger (compositor keybindings, scripts)
                _ = sigusr1.recv() => {
                    tracing::debug!("Received SIGUSR1 (start recording)");
                    let orch = orchestrator.clone();
                    tokio::spawn(async move {
                        orch.handle_signal(HotkeySignal::Start(TriggerMode::Toggle)).await;
                    });
                }

                // External stop trigger
                _ = sigusr2.recv() => {
                    tracing::debug!("Received SIGUSR2 (stop recording)");
                    let orch = orchestrator.clone();
                    tokio::spawn(async move {
                        orch.handle_signal(HotkeySignal::Stop(TriggerMode::Toggle)).await;
                    });
                }

                // Graceful shutdown (SIGINT from Ctrl+C)
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received SIGINT, shutting down...");
                    break;
                }

                // Graceful shutdown (SIGTERM from systemctl stop)
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    break;
                }
            }
        }

        // Cleanup
        orchestrator.abort_recording().await;
        orchestrator.drain_pending_replace().await;
        if let Some(source) = &mut input_source {
            let _ = source.stop().await;
        }
        if let Some(path) = self.config.resolve_state_file() {
            cleanup_state_file(&path);
        }
        if let Some(ref path) = self.pid_file_path {
            cleanup_pid_file(path);
        }
        tracing::info!("Daemon stopped");

        Ok(())
    }
}
