//! Assistant action grammar
//!
//! When the assistant trigger phrase prefixes an utterance (or assistant
//! mode is latched on), the rest of the utterance runs against a small
//! fixed grammar: weather, time, web search, open-URL, calculator. The
//! first matching rule fires its side effect, injects its answer, and
//! short-circuits LLM refinement for that turn.

pub mod builtins;
pub mod calc;

use regex::Regex;

/// Reserved mode names the open-URL rule must never navigate to
const URL_EXCLUSIONS: &[&str] = &["客訴模式", "IG模式", "正常模式"];

pub struct ActionDispatcher {
    trigger: String,
    weather: Regex,
    time: Regex,
    search: Regex,
    search_prefix_trim: Regex,
    search_suffix_trim: Regex,
    open_url: Regex,
    calc_hint: Regex,
}

impl ActionDispatcher {
    pub fn new(trigger: &str) -> Self {
        // Alternations list longer variants first; the regex engine keeps
        // the leftmost alternative, so "一下關於" must precede "一下"
        Self {
            trigger: trigger.to_string(),
            weather: Regex::new(r"天氣(如何|怎麼樣|好不好)?$").unwrap(),
            time: Regex::new(r"(現在)?幾點(了)?$|現在時間").unwrap(),
            search: Regex::new(r"(幫我)?(搜尋|搜一下|查詢一下|查一下|查詢|查|找一下)(.+)")
                .unwrap(),
            search_prefix_trim: Regex::new(r"^(一下關於|看看是|一下|看看|到底)").unwrap(),
            search_suffix_trim: Regex::new(r"(是多少錢|是多少|幾塊錢|的價格|是什麼呢|是什麼)$")
                .unwrap(),
            open_url: Regex::new(r"(打開|開啟)(?:網站)?(.+)").unwrap(),
            calc_hint: Regex::new(r"\d+[+\-*/x加減乘除]").unwrap(),
        }
    }

    /// Extract the command clause if the assistant is addressed.
    ///
    /// Exact prefix match first; if that fails, a normalized comparison
    /// (lowercased, punctuation stripped, whitespace removed) tolerates
    /// transcription variance in how the trigger was rendered. With the
    /// persistent assistant flag set, every utterance is a command.
    pub fn activation(&self, text: &str, assistant_always_on: bool) -> Option<String> {
        let trimmed = text.trim();

        if assistant_always_on {
            return Some(trimmed.to_string());
        }

        if let Some(rest) = trimmed.strip_prefix(&self.trigger) {
            return Some(rest.trim_start_matches(['，', ',', ' ', '、']).to_string());
        }

        let normalized = normalize_for_matching(trimmed);
        let trigger_normalized = normalize_for_matching(&self.trigger);
        if !trigger_normalized.is_empty() && normalized.starts_with(&trigger_normalized) {
            return Some(normalized[trigger_normalized.len()..].to_string());
        }

        None
    }

    /// Run the clause against the grammar; Some(answer) means an action
    /// fired and its result should be injected.
    pub async fn dispatch(&self, clause: &str) -> Option<String> {
        let clause = clause.trim_matches(['。', '，', '！', '？', ' ']);
        if clause.is_empty() {
            return None;
        }

        // 1. Weather
        if self.weather.is_match(clause) || clause.contains("查天氣") {
            return Some(builtins::get_weather().await);
        }

        // 2. Time
        if self.time.is_match(clause) {
            return Some(builtins::get_current_time());
        }

        // 3. Web search, with filler trimming around the query
        if let Some(caps) = self.search.captures(clause) {
            let mut query = caps.get(3).map(|m| m.as_str().trim()).unwrap_or("");
            if let Some(m) = self.search_prefix_trim.find(query) {
                query = query[m.end()..].trim();
            }
            if let Some(m) = self.search_suffix_trim.find(query) {
                query = query[..m.start()].trim();
            }
            return Some(builtins::open_search(query).await);
        }

        // 4. Open URL, skipping reserved mode names
        if let Some(caps) = self.open_url.captures(clause) {
            let site = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            if !site.is_empty() && !URL_EXCLUSIONS.contains(&site) {
                return Some(builtins::open_website(site).await);
            }
        }

        // 5. Calculator (digit adjacent to an operator token)
        if self.calc_hint.is_match(clause) {
            return Some(builtins::run_calculator(clause));
        }

        None
    }

    /// The query a search clause would produce, without side effects
    #[cfg(test)]
    fn search_query(&self, clause: &str) -> Option<String> {
        let caps = self.search.captures(clause)?;
        let mut query = caps.get(3).map(|m| m.as_str().trim())?;
        if let Some(m) = self.search_prefix_trim.find(query) {
            query = query[m.end()..].trim();
        }
        if let Some(m) = self.search_suffix_trim.find(query) {
            query = query[..m.start()].trim();
        }
        Some(query.to_string())
    }
}

/// Lowercase, drop punctuation (half and full width), remove whitespace
fn normalize_for_matching(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| {
            !c.is_whitespace()
                && !matches!(
                    c,
                    ',' | '.'
                        | '?'
                        | '!'
                        | ':'
                        | ';'
                        | '，'
                        | '。'
                        | '？'
                        | '！'
                        | '：'
                        | '；'
                        | '、'
                )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> ActionDispatcher {
        ActionDispatcher::new("小幫手")
    }

    #[test]
    fn test_activation_exact_prefix() {
        let d = dispatcher();
        assert_eq!(
            d.activation("小幫手現在幾點", false),
            Some("現在幾點".to_string())
        );
        assert_eq!(
            d.activation("小幫手，查一下天氣", false),
            Some("查一下天氣".to_string())
        );
    }

    #[test]
    fn test_activation_normalized_fallback() {
        let d = dispatcher();
        // Transcription inserted punctuation inside the trigger region
        assert_eq!(
            d.activation("小幫手。現在幾點", false),
            Some("現在幾點".to_string())
        );
    }

    #[test]
    fn test_activation_requires_trigger() {
        let d = dispatcher();
        assert_eq!(d.activation("現在幾點", false), None);
        // Latched assistant mode accepts everything
        assert_eq!(d.activation("現在幾點", true), Some("現在幾點".to_string()));
    }

    #[test]
    fn test_search_trim_rules() {
        let d = dispatcher();
        assert_eq!(
            d.search_query("幫我查一下特斯拉股價"),
            Some("特斯拉股價".to_string())
        );
        assert_eq!(
            d.search_query("查一下特斯拉的價格"),
            Some("特斯拉".to_string())
        );
        assert_eq!(
            d.search_query("搜尋一下關於量子力學"),
            Some("量子力學".to_string())
        );
        assert_eq!(
            d.search_query("查詢一下匯率是多少"),
            Some("匯率".to_string())
        );
    }

    #[tokio::test]
    async fn test_dispatch_time() {
        let d = dispatcher();
        let answer = d.dispatch("現在幾點了").await.unwrap();
        assert!(answer.starts_with("現在時間是："));
    }

    #[tokio::test]
    async fn test_dispatch_calculator() {
        let d = dispatcher();
        let answer = d.dispatch("3加5等於多少").await.unwrap();
        assert_eq!(answer, "計算結果：3加5等於多少 = 8");
    }

    #[tokio::test]
    async fn test_dispatch_excluded_site_does_not_navigate() {
        let d = dispatcher();
        // "打開客訴模式" names a reserved scenario, and the clause has no
        // digits, so nothing in the grammar fires
        assert_eq!(d.dispatch("打開客訴模式").await, None);
    }

    #[tokio::test]
    async fn test_dispatch_unmatched_clause() {
        let d = dispatcher();
        assert_eq!(d.dispatch("今天心情很好").await, None);
        assert_eq!(d.dispatch("").await, None);
    }
}
