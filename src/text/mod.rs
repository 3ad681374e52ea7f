//! Transcript text processing
//!
//! Two offline steps run on every transcript before anything else sees it:
//! full-width punctuation normalization (CJK text only) and snippet
//! expansion (keyword to content, sourced from local files).

use std::path::Path;

/// ASCII to full-width punctuation
const PUNCT_MAP: &[(char, char)] = &[
    (',', '，'),
    ('.', '。'),
    ('?', '？'),
    ('!', '！'),
    (':', '：'),
    (';', '；'),
    ('(', '（'),
    (')', '）'),
    ('[', '【'),
    (']', '】'),
    ('"', '\u{201c}'),
    ('\'', '\u{2018}'),
];

/// Fraction of characters in the CJK Unified Ideographs block
pub fn cjk_ratio(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let cjk = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    cjk as f32 / total as f32
}

/// Convert ASCII punctuation to full-width equivalents.
///
/// Only applies when at least 20% of the characters are CJK, so English
/// sentences pass through untouched.
pub fn normalize_punctuation(text: &str) -> String {
    if cjk_ratio(text) < 0.2 {
        return text.to_string();
    }

    text.chars()
        .map(|c| {
            PUNCT_MAP
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}

/// Keyword to content text expansion, loaded from local files.
///
/// Each `*.txt` file under the snippets directory is one rule: the file
/// stem is the spoken keyword, the trimmed body is the replacement. Rules
/// apply longest-keyword-first so "公司地址" wins over "地址".
pub struct SnippetExpander {
    rules: Vec<(String, String)>,
}

impl SnippetExpander {
    /// Load rules from a directory; a missing directory yields no rules
    pub fn load(dir: &Path) -> Self {
        let mut rules = Vec::new();

        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                    continue;
                }
                let Some(keyword) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match std::fs::read_to_string(&path) {
                    Ok(body) => {
                        let content = body.trim().to_string();
                        if !keyword.is_empty() && !content.is_empty() {
                            rules.push((keyword.to_string(), content));
                        }
                    }
                    Err(e) => tracing::warn!("Skipping snippet {:?}: {}", path, e),
                }
            }
        }

        // Longest keyword first so broader keywords don't shadow longer ones
        rules.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });

        tracing::debug!("Loaded {} snippet rule(s) from {:?}", rules.len(), dir);
        Self { rules }
    }

    #[cfg(test)]
    pub fn from_rules(mut rules: Vec<(String, String)>) -> Self {
        rules.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Replace every keyword occurrence with its content
    pub fn expand(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (keyword, content) in &self.rules {
            if out.contains(keyword.as_str()) {
                out = out.replace(keyword.as_str(), content);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cjk_ratio() {
        assert_eq!(cjk_ratio(""), 0.0);
        assert_eq!(cjk_ratio("hello"), 0.0);
        assert_eq!(cjk_ratio("你好"), 1.0);
        assert!((cjk_ratio("你好ab") - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_is_identity_for_english() {
        let text = "Hello, world. How are you?";
        assert_eq!(normalize_punctuation(text), text);
    }

    #[test]
    fn test_normalize_converts_cjk_text() {
        assert_eq!(normalize_punctuation("你好,世界."), "你好，世界。");
        assert_eq!(normalize_punctuation("真的嗎?太好了!"), "真的嗎？太好了！");
        assert_eq!(normalize_punctuation("清單:(一)"), "清單：（一）");
    }

    #[test]
    fn test_normalize_respects_ratio_gate() {
        // One CJK char among many ASCII chars stays below 20%
        let text = "this is mostly english 好, ok.";
        assert_eq!(normalize_punctuation(text), text);
    }

    #[test]
    fn test_expand_replaces_keywords() {
        let expander = SnippetExpander::from_rules(vec![(
            "公司地址".to_string(),
            "台北市信義區市府路45號".to_string(),
        )]);
        assert_eq!(
            expander.expand("請寄到公司地址謝謝"),
            "請寄到台北市信義區市府路45號謝謝"
        );
    }

    #[test]
    fn test_expand_longest_keyword_first() {
        let expander = SnippetExpander::from_rules(vec![
            ("地址".to_string(), "SHORT".to_string()),
            ("公司地址".to_string(), "LONG".to_string()),
        ]);
        assert_eq!(expander.expand("公司地址"), "LONG");
        assert_eq!(expander.expand("我的地址"), "我的SHORT");
    }

    #[test]
    fn test_expand_no_rules_is_identity() {
        let expander = SnippetExpander::from_rules(vec![]);
        assert_eq!(expander.expand("原文不變"), "原文不變");
        assert!(expander.is_empty());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("簽名檔.txt"), "王小明 敬上\n").unwrap();
        std::fs::write(dir.path().join("ignored.md"), "not a snippet").unwrap();

        let expander = SnippetExpander::load(dir.path());
        assert_eq!(expander.expand("結尾加簽名檔"), "結尾加王小明 敬上");
    }

    #[test]
    fn test_load_missing_directory() {
        let expander = SnippetExpander::load(Path::new("/nonexistent/snippets"));
        assert!(expander.is_empty());
    }
}
