//! Vocabulary store
//!
//! Two layers: a user-maintained custom word list (proper nouns the STT
//! backend tends to miss) and an automatically learned frequency map of
//! 2-6 character Chinese terms seen in transcripts. Learned words that
//! cross the frequency threshold can be promoted into the custom list.

use crate::backend::LlmBackend;
use crate::error::StoreError;
use chrono::Local;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Occurrences before a learned word counts as frequent
pub const AUTO_LEARN_THRESHOLD: u32 = 3;
/// Learned map size cap; lowest-frequency words are dropped past this
const AUTO_MEMORY_MAX: usize = 200;

/// Seed words for a fresh custom vocabulary
const DEFAULT_VOCAB: &[&str] = &[
    "ChatGPT",
    "Gemini",
    "Whisper",
    "Ollama",
    "GitHub",
    "Notion",
    "Slack",
    "Figma",
    "Python",
    "API",
    "UI",
    "UX",
    "SaaS",
    "SDK",
    "JSON",
    "CSV",
    "繁體中文",
    "人工智慧",
    "機器學習",
    "語音辨識",
    "自動化",
    "工作流程",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CustomVocabFile {
    #[serde(default)]
    words: Vec<String>,
    #[serde(default)]
    updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AutoMemoryFile {
    #[serde(default)]
    memory: HashMap<String, u32>,
    #[serde(default)]
    updated_at: String,
}

pub struct VocabStore {
    custom_path: PathBuf,
    auto_path: PathBuf,
    cjk_term: Regex,
}

impl VocabStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            custom_path: dir.join("custom_vocab.json"),
            auto_path: dir.join("auto_memory.json"),
            cjk_term: Regex::new(r"[\x{4e00}-\x{9fff}]{2,6}").unwrap(),
        }
    }

    /// Custom word list, seeding the defaults on first use
    pub fn custom_words(&self) -> Result<Vec<String>, StoreError> {
        match std::fs::read_to_string(&self.custom_path) {
            Ok(contents) => {
                let file: CustomVocabFile = serde_json::from_str(&contents)?;
                Ok(file.words)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let words: Vec<String> = DEFAULT_VOCAB.iter().map(|w| w.to_string()).collect();
                self.save_custom(&words)?;
                Ok(words)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn add_custom_word(&self, word: &str) -> Result<(), StoreError> {
        let word = word.trim();
        if word.is_empty() {
            return Ok(());
        }
        let mut words = self.custom_words()?;
        if !words.iter().any(|w| w == word) {
            words.push(word.to_string());
            self.save_custom(&words)?;
        }
        Ok(())
    }

    /// Count 2-6 character Chinese terms from a transcript
    pub fn learn_from_text(&self, text: &str) -> Result<(), StoreError> {
        if text.is_empty() {
            return Ok(());
        }
        let mut file = self.load_auto()?;
        for m in self.cjk_term.find_iter(text) {
            *file.memory.entry(m.as_str().to_string()).or_insert(0) += 1;
        }
        self.trim_and_save(file)
    }

    /// LLM-assisted learning: extract likely proper nouns and give them a
    /// higher initial weight than plain frequency counting would
    pub async fn learn_from_text_with_llm(
        &self,
        llm: Arc<dyn LlmBackend>,
        text: &str,
    ) -> Result<(), StoreError> {
        if text.chars().count() < 5 {
            return Ok(());
        }

        let prompt = "你是語音辨識助手。請從以下文字中提取出 1-3 個可能的專有名詞、\
                      人名或專業術語（繁體中文）。只需回傳詞彙，以逗號分隔。\
                      如果沒有明顯的關鍵字，請回傳空字串。";

        let keywords = match llm.refine(text, prompt).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Keyword extraction failed: {}", e);
                return Ok(());
            }
        };

        let keywords: Vec<String> = keywords
            .replace('，', ",")
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return Ok(());
        }

        let mut file = self.load_auto()?;
        for keyword in &keywords {
            *file.memory.entry(keyword.clone()).or_insert(0) += 2;
        }
        tracing::debug!("Learned keywords: {:?}", keywords);
        self.trim_and_save(file)
    }

    /// Learned words at or above the frequency threshold, most frequent first
    pub fn frequent_words(&self) -> Result<Vec<String>, StoreError> {
        let file = self.load_auto()?;
        let mut words: Vec<(String, u32)> = file
            .memory
            .into_iter()
            .filter(|(_, count)| *count >= AUTO_LEARN_THRESHOLD)
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(words.into_iter().map(|(w, _)| w).collect())
    }

    /// Dictionary block for the refinement prompt: custom words plus
    /// frequent learned terms
    pub fn hint_prompt(&self) -> Result<String, StoreError> {
        let mut words = self.custom_words()?;
        for word in self.frequent_words()? {
            if !words.contains(&word) {
                words.push(word);
            }
        }
        if words.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(
            "【人格字典】以下詞彙經常出現，修正錯字時請優先採用這些寫法：{}",
            words.join("、")
        ))
    }

    /// Move a learned word into the permanent custom list
    pub fn promote(&self, word: &str) -> Result<(), StoreError> {
        let word = word.trim();
        if word.is_empty() {
            return Ok(());
        }
        self.add_custom_word(word)?;

        let mut file = self.load_auto()?;
        if file.memory.remove(word).is_some() {
            self.trim_and_save(file)?;
        }
        Ok(())
    }

    fn trim_and_save(&self, mut file: AutoMemoryFile) -> Result<(), StoreError> {
        if file.memory.len() > AUTO_MEMORY_MAX {
            let mut entries: Vec<(String, u32)> = file.memory.into_iter().collect();
            entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            entries.truncate(AUTO_MEMORY_MAX);
            file.memory = entries.into_iter().collect();
        }
        file.updated_at = Local::now().to_rfc3339();

        if let Some(parent) = self.auto_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.auto_path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    fn load_auto(&self) -> Result<AutoMemoryFile, StoreError> {
        match std::fs::read_to_string(&self.auto_path) {
            Ok(contents) => Ok(serde_json::from_str(&contents).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AutoMemoryFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_custom(&self, words: &[String]) -> Result<(), StoreError> {
        if let Some(parent) = self.custom_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = CustomVocabFile {
            words: words.to_vec(),
            updated_at: Local::now().to_rfc3339(),
        };
        std::fs::write(&self.custom_path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, VocabStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VocabStore::new(dir.path().to_path_buf());
        (dir, store)
    }

    #[test]
    fn test_custom_words_seeded_on_first_use() {
        let (_dir, store) = store();
        let words = store.custom_words().unwrap();
        assert!(words.iter().any(|w| w == "語音辨識"));
    }

    #[test]
    fn test_add_custom_word_deduplicates() {
        let (_dir, store) = store();
        store.add_custom_word("新詞彙").unwrap();
        store.add_custom_word("新詞彙").unwrap();
        let words = store.custom_words().unwrap();
        assert_eq!(words.iter().filter(|w| *w == "新詞彙").count(), 1);
    }

    #[test]
    fn test_learn_from_text_counts_terms() {
        let (_dir, store) = store();
        // Terms are maximal CJK runs, so punctuation bounds each occurrence
        store.learn_from_text("量子力學，量子力學").unwrap();
        store.learn_from_text("複習：量子力學！").unwrap();

        let frequent = store.frequent_words().unwrap();
        assert!(frequent.contains(&"量子力學".to_string()));
    }

    #[test]
    fn test_threshold_filters_rare_words() {
        let (_dir, store) = store();
        store.learn_from_text("偶爾出現的詞").unwrap();
        let frequent = store.frequent_words().unwrap();
        assert!(frequent.is_empty());
    }

    #[test]
    fn test_promote_moves_word_to_custom() {
        let (_dir, store) = store();
        for _ in 0..3 {
            store.learn_from_text("特別名詞").unwrap();
        }
        assert!(store.frequent_words().unwrap().contains(&"特別名詞".to_string()));

        store.promote("特別名詞").unwrap();
        assert!(store.custom_words().unwrap().contains(&"特別名詞".to_string()));
        assert!(!store.frequent_words().unwrap().contains(&"特別名詞".to_string()));
    }

    #[test]
    fn test_hint_prompt_includes_learned_words() {
        let (_dir, store) = store();
        for _ in 0..3 {
            store.learn_from_text("量子糾纏").unwrap();
        }
        let hint = store.hint_prompt().unwrap();
        assert!(hint.contains("量子糾纏"));
        assert!(hint.contains("語音辨識")); // seeded custom word
    }

    #[test]
    fn test_ignores_non_cjk_text() {
        let (_dir, store) = store();
        store.learn_from_text("just english words here").unwrap();
        assert!(store.frequent_words().unwrap().is_empty());
    }
}
