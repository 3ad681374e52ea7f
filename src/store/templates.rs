//! Template store
//!
//! Backs the template magic phrases: "儲存成模板X" persists the last
//! pipeline outcome as a markdown file, "套用模板X" recalls it as a
//! one-shot style exemplar for the next refinement. Names are composite
//! (spoken label plus timestamp) so repeated saves never collide.

use crate::error::StoreError;
use chrono::Local;
use std::path::PathBuf;

pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Persist content under `{label}_{timestamp}.md`; returns the stem
    /// the user can recall it by
    pub fn save(&self, label: Option<&str>, content: &str) -> Result<String, StoreError> {
        std::fs::create_dir_all(&self.dir)?;

        let label = label
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("未命名");
        let stem = format!("{}_{}", label, Local::now().format("%Y%m%d-%H%M"));

        std::fs::write(self.dir.join(format!("{}.md", stem)), content)?;
        tracing::info!("Saved template {}", stem);
        Ok(stem)
    }

    /// Recall by exact stem, falling back to the newest stem that starts
    /// with the spoken name (so "週報" finds "週報_20260823-1005")
    pub fn recall(&self, name: &str) -> Result<Option<String>, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let mut prefix_match: Option<(String, PathBuf)> = None;

        for stem in self.list()? {
            if stem == name {
                let content = std::fs::read_to_string(self.dir.join(format!("{}.md", stem)))?;
                return Ok(Some(content));
            }
            if stem.starts_with(name) {
                let path = self.dir.join(format!("{}.md", stem));
                // list() is sorted ascending; keep the latest prefix match
                prefix_match = Some((stem, path));
            }
        }

        match prefix_match {
            Some((_, path)) => Ok(Some(std::fs::read_to_string(path)?)),
            None => Ok(None),
        }
    }

    /// All saved template stems, sorted ascending (timestamp order for a
    /// shared label)
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut stems = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stems),
            Err(e) => return Err(e.into()),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }

        stems.sort();
        Ok(stems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, TemplateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn test_save_and_recall_exact() {
        let (_dir, store) = store();
        let stem = store.save(Some("週報"), "本週進度如下").unwrap();
        assert!(stem.starts_with("週報_"));

        let content = store.recall(&stem).unwrap();
        assert_eq!(content.as_deref(), Some("本週進度如下"));
    }

    #[test]
    fn test_recall_by_label_prefix() {
        let (_dir, store) = store();
        store.save(Some("週報"), "範本內容").unwrap();
        let content = store.recall("週報").unwrap();
        assert_eq!(content.as_deref(), Some("範本內容"));
    }

    #[test]
    fn test_unnamed_save_gets_default_label() {
        let (_dir, store) = store();
        let stem = store.save(None, "內容").unwrap();
        assert!(stem.starts_with("未命名_"));
    }

    #[test]
    fn test_recall_missing_template() {
        let (_dir, store) = store();
        assert_eq!(store.recall("不存在").unwrap(), None);
        assert_eq!(store.recall("").unwrap(), None);
    }

    #[test]
    fn test_list_empty_directory() {
        let store = TemplateStore::new(PathBuf::from("/nonexistent/templates"));
        assert!(store.list().unwrap().is_empty());
    }
}
