//! Persistence stores
//!
//! Small JSON-file stores fed by the post-processing fan-out: session
//! memory, usage stats, and learned vocabulary, plus the markdown template
//! store behind the template magic phrases. Every store failure is logged
//! and swallowed by callers; persistence must never abort an injection.

pub mod memory;
pub mod stats;
pub mod templates;
pub mod vocab;

pub use memory::MemoryStore;
pub use stats::StatsStore;
pub use templates::TemplateStore;
pub use vocab::VocabStore;
