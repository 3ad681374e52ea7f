//! Text output module
//!
//! Delivers finished text into the focused application. Fallback chain:
//! 1. wtype - Wayland-native, best Unicode/CJK support, no daemon needed
//! 2. clipboard - universal fallback via wl-copy
//!
//! A [`TextSink`] may additionally support in-place replacement
//! (`select_back`), used by the speculative fast refine path.

pub mod clipboard;
pub mod wtype;

use crate::config::OutputConfig;
use crate::error::OutputError;
use std::sync::Arc;

/// Trait for text sinks
#[async_trait::async_trait]
pub trait TextSink: Send + Sync {
    /// Deliver text at the current cursor position
    async fn inject(&self, text: &str) -> Result<(), OutputError>;

    /// Select the previous N characters so the next inject replaces them.
    /// Sinks without replace support return `ReplaceUnsupported`.
    async fn select_back(&self, char_count: usize) -> Result<(), OutputError>;

    /// Whether select_back is meaningful for this sink
    fn supports_replace(&self) -> bool;

    /// Check if this sink is usable right now
    async fn is_available(&self) -> bool;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Ordered sink fallback chain
pub struct SinkChain {
    sinks: Vec<Arc<dyn TextSink>>,
}

impl SinkChain {
    pub fn new(config: &OutputConfig) -> Self {
        let mut sinks: Vec<Arc<dyn TextSink>> = vec![Arc::new(wtype::WtypeSink::new())];
        if config.fallback_to_clipboard {
            sinks.push(Arc::new(clipboard::ClipboardSink::new()));
        }
        Self { sinks }
    }

    /// Build a chain from explicit sinks (custom setups and test drivers)
    pub fn from_sinks(sinks: Vec<Arc<dyn TextSink>>) -> Self {
        Self { sinks }
    }

    /// First sink whose availability check passes
    pub async fn first_available(&self) -> Option<Arc<dyn TextSink>> {
        for sink in &self.sinks {
            if sink.is_available().await {
                return Some(sink.clone());
            }
            tracing::debug!("{} not available, trying next", sink.name());
        }
        None
    }

    /// Inject through the chain, trying each sink until one succeeds
    pub async fn inject(&self, text: &str) -> Result<(), OutputError> {
        for sink in &self.sinks {
            if !sink.is_available().await {
                tracing::debug!("{} not available, trying next", sink.name());
                continue;
            }

            match sink.inject(text).await {
                Ok(()) => {
                    tracing::debug!("Text delivered via {}", sink.name());
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}, trying next", sink.name(), e);
                }
            }
        }

        Err(OutputError::AllMethodsFailed)
    }
}
