//! Persona prompt stack loader
//!
//! The "soul" directory holds the persona base (`soul.md`) plus optional
//! scenario and format blocks, each a markdown file:
//!
//! ```text
//! soul/
//! ├── soul.md              persona base
//! ├── scenario/<id>.md     tone blocks (complaint, formal, ...)
//! └── format/<id>.md       structure blocks (bullet, email, ...)
//! ```
//!
//! Read-only key to text resolution; files are read at call time so edits
//! take effect on the next session without a restart.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct PromptLibrary {
    root: PathBuf,
}

impl PromptLibrary {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Persona base prompt, empty string when soul.md is absent
    pub fn base(&self) -> String {
        self.read(self.root.join("soul.md"))
    }

    /// Scenario tone block by internal id
    pub fn scenario(&self, id: &str) -> String {
        self.read(self.root.join("scenario").join(format!("{}.md", id)))
    }

    /// Format structure block by internal id
    pub fn format(&self, id: &str) -> String {
        self.read(self.root.join("format").join(format!("{}.md", id)))
    }

    fn read(&self, path: PathBuf) -> String {
        match std::fs::read_to_string(&path) {
            Ok(text) => text.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                tracing::warn!("Failed to read prompt block {:?}: {}", path, e);
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_files_yield_empty_blocks() {
        let lib = PromptLibrary::new(PathBuf::from("/nonexistent/soul"));
        assert_eq!(lib.base(), "");
        assert_eq!(lib.scenario("complaint"), "");
        assert_eq!(lib.format("bullet"), "");
    }

    #[test]
    fn test_reads_blocks_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("scenario")).unwrap();
        std::fs::write(dir.path().join("soul.md"), "你是一位溫柔的助理。\n").unwrap();
        std::fs::write(dir.path().join("scenario/formal.md"), "用正式語氣。").unwrap();

        let lib = PromptLibrary::new(dir.path().to_path_buf());
        assert_eq!(lib.base(), "你是一位溫柔的助理。");
        assert_eq!(lib.scenario("formal"), "用正式語氣。");
        assert_eq!(lib.scenario("unknown"), "");
    }
}
