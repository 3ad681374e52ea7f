//! Session memory store
//!
//! Keeps recent (raw transcript, final text) pairs across sessions and
//! serves a short context block to the refinement prompt. Entries older
//! than a week are compacted into an archive file plus a one-line summary
//! so memory.json stays small.

use crate::error::StoreError;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Full records kept in memory.json
const MAX_RECENT: usize = 50;
/// Entries fed to the LLM context block
const CONTEXT_KEEP: usize = 5;
/// Days between archive compactions
const ARCHIVE_DAYS: i64 = 7;
/// Entries kept after compaction
const KEEP_AFTER_ARCHIVE: usize = 5;

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub ts: String,
    pub stt: String,
    pub llm: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MemoryFile {
    #[serde(default)]
    entries: Vec<MemoryEntry>,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    last_archive: String,
}

#[derive(Debug, Clone, Serialize)]
struct ArchiveFile<'a> {
    archived_at: String,
    entries: &'a [MemoryEntry],
    summary: &'a str,
}

pub struct MemoryStore {
    path: PathBuf,
    archive_dir: PathBuf,
}

impl MemoryStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join("memory.json"),
            archive_dir: dir.join("archive"),
        }
    }

    /// Record one finished session, trimming to the recent cap and
    /// compacting into the archive when due
    pub fn add_entry(&self, stt_text: &str, final_text: &str) -> Result<(), StoreError> {
        let mut file = self.load()?;

        file.entries.push(MemoryEntry {
            ts: Local::now().format(TS_FORMAT).to_string(),
            stt: stt_text.to_string(),
            llm: if final_text.is_empty() {
                stt_text.to_string()
            } else {
                final_text.to_string()
            },
        });

        if file.entries.len() > MAX_RECENT {
            let excess = file.entries.len() - MAX_RECENT;
            file.entries.drain(..excess);
        }

        self.save(&file)?;
        self.maybe_archive(file)
    }

    /// Context block for the refinement prompt: long-term summary plus the
    /// most recent entries. Empty string when there is nothing to say.
    pub fn context_for_llm(&self) -> Result<String, StoreError> {
        let file = self.load()?;
        let mut parts = Vec::new();

        if !file.summary.is_empty() {
            parts.push(format!("[長期記憶摘要]\n{}", file.summary));
        }

        let recent_start = file.entries.len().saturating_sub(CONTEXT_KEEP);
        let recent = &file.entries[recent_start..];
        if !recent.is_empty() {
            let lines: Vec<String> = recent
                .iter()
                .map(|e| {
                    let ts: String = e.ts.chars().take(16).collect();
                    let text = if e.llm.is_empty() { &e.stt } else { &e.llm };
                    format!("- [{}] {}", ts, text)
                })
                .collect();
            parts.push(format!("[最近對話記錄]\n{}", lines.join("\n")));
        }

        Ok(parts.join("\n\n"))
    }

    /// Drop all entries and the summary (archives stay)
    pub fn clear(&self) -> Result<(), StoreError> {
        self.save(&MemoryFile::default())
    }

    /// Compact into the weekly archive when the last compaction is older
    /// than the archive window. Fewer than 10 entries is not worth it.
    fn maybe_archive(&self, mut file: MemoryFile) -> Result<(), StoreError> {
        if !file.last_archive.is_empty() {
            if let Ok(last) = NaiveDateTime::parse_from_str(&file.last_archive, TS_FORMAT) {
                let age = Local::now().naive_local() - last;
                if age.num_days() < ARCHIVE_DAYS {
                    return Ok(());
                }
            }
        }

        if file.entries.len() < 10 {
            return Ok(());
        }

        std::fs::create_dir_all(&self.archive_dir)?;
        let week = Local::now().format("%Y-W%W");
        let archive_path = self.archive_dir.join(format!("memory_{}.json", week));
        let archive = ArchiveFile {
            archived_at: Local::now().format(TS_FORMAT).to_string(),
            entries: &file.entries,
            summary: &file.summary,
        };
        std::fs::write(&archive_path, serde_json::to_string_pretty(&archive)?)?;
        tracing::info!("Archived memory to {:?}", archive_path);

        // New summary: tail texts, truncated, joined in one line
        let tail_start = file.entries.len().saturating_sub(10);
        let summary: Vec<String> = file.entries[tail_start..]
            .iter()
            .map(|e| {
                let text = if e.llm.is_empty() { &e.stt } else { &e.llm };
                text.chars().take(30).collect()
            })
            .filter(|s: &String| !s.is_empty())
            .collect();
        file.summary = summary.join("；");

        let keep_start = file.entries.len().saturating_sub(KEEP_AFTER_ARCHIVE);
        file.entries.drain(..keep_start);
        file.last_archive = Local::now().format(TS_FORMAT).to_string();
        self.save(&file)
    }

    fn load(&self) -> Result<MemoryFile, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MemoryFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, file: &MemoryFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }
}
