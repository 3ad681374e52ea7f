//! Magic phrase interception
//!
//! Recognized spoken commands short-circuit the normal dictation pipeline:
//! the matched command mutates the shared dictation context and the
//! orchestrator injects a spoken-style confirmation instead of the
//! transcript.
//!
//! Detection order is fixed. Translation and cancel phrases come first
//! because their grammars overlap textually with the scenario and format
//! switches ("恢復正常模式" must cancel, not switch to a "正常" scenario).

use regex::Regex;

/// Result of intercepting one transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MagicCommand {
    /// Sticky translation target set; refinement force-enabled
    TranslationSet(String),
    /// Translation target cleared and all modes reset
    TranslationCleared,
    /// Scenario switched (tone of the refinement persona)
    ScenarioSet { id: String, label: String },
    /// Output format switched (structure of the refined text)
    FormatSet { id: String, label: String },
    /// Save the previous session's output as a named template
    TemplateSave(Option<String>),
    /// Recall a saved template as a one-shot style exemplar
    TemplateRecall(String),
}

/// Spoken label to internal scenario id
const SCENARIO_ALIASES: &[(&str, &str)] = &[
    ("客訴", "complaint"),
    ("IG", "instagram"),
    ("正式", "formal"),
    ("會議", "meeting"),
];

/// Spoken label to internal format id
const FORMAT_ALIASES: &[(&str, &str)] = &[
    ("條列", "bullet"),
    ("電子郵件", "email"),
    ("郵件", "email"),
    ("逐字", "verbatim"),
    ("摘要", "summary"),
];

enum Detector {
    Translation,
    Cancel,
    Scenario,
    Format,
    TemplateSave,
    TemplateRecall,
}

/// Fixed-priority magic phrase table.
///
/// Rules are evaluated in order; the first rule whose pattern matches and
/// whose detector produces a command wins. A matching pattern whose label
/// is not in the alias table falls through to the next rule.
pub struct CommandInterceptor {
    rules: Vec<(Regex, Detector)>,
}

impl Default for CommandInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandInterceptor {
    pub fn new() -> Self {
        // Patterns are static and known-valid
        let rules = vec![
            (
                Regex::new(r"(把下面這[句段]話|以下內容|把內容)，?翻譯成(.+)").unwrap(),
                Detector::Translation,
            ),
            (
                Regex::new(r"(取消|恢復|關閉|停止)翻譯|(恢復|回到)正常(模式)?").unwrap(),
                Detector::Cancel,
            ),
            (
                Regex::new(r"(?:切換到|進入|使用)(.+?)(?:情境|模式)$").unwrap(),
                Detector::Scenario,
            ),
            (
                Regex::new(r"(?:切換成|使用|改用)(.+?)格式$").unwrap(),
                Detector::Format,
            ),
            (
                Regex::new(r"(?:儲存|保存)(?:成|為)?模板(.*)$").unwrap(),
                Detector::TemplateSave,
            ),
            (
                Regex::new(r"(?:使用|套用|載入)模板(.+)$").unwrap(),
                Detector::TemplateRecall,
            ),
        ];
        Self { rules }
    }

    /// Check one normalized transcript against the phrase table
    pub fn intercept(&self, transcript: &str) -> Option<MagicCommand> {
        let text = trim_terminal_punctuation(transcript);
        if text.is_empty() {
            return None;
        }

        for (pattern, detector) in &self.rules {
            let Some(caps) = pattern.captures(text) else {
                continue;
            };

            let command = match detector {
                Detector::Translation => {
                    let target = trim_terminal_punctuation(caps.get(2)?.as_str()).to_string();
                    if target.is_empty() {
                        None
                    } else {
                        Some(MagicCommand::TranslationSet(target))
                    }
                }
                Detector::Cancel => Some(MagicCommand::TranslationCleared),
                Detector::Scenario => {
                    let label = caps.get(1)?.as_str().trim();
                    lookup(SCENARIO_ALIASES, label).map(|id| MagicCommand::ScenarioSet {
                        id: id.to_string(),
                        label: label.to_string(),
                    })
                }
                Detector::Format => {
                    let label = caps.get(1)?.as_str().trim();
                    lookup(FORMAT_ALIASES, label).map(|id| MagicCommand::FormatSet {
                        id: id.to_string(),
                        label: label.to_string(),
                    })
                }
                Detector::TemplateSave => {
                    let label = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
                    Some(MagicCommand::TemplateSave(if label.is_empty() {
                        None
                    } else {
                        Some(label.to_string())
                    }))
                }
                Detector::TemplateRecall => {
                    let name = caps.get(1)?.as_str().trim();
                    if name.is_empty() {
                        None
                    } else {
                        Some(MagicCommand::TemplateRecall(name.to_string()))
                    }
                }
            };

            if command.is_some() {
                return command;
            }
        }

        None
    }
}

fn lookup(table: &[(&'static str, &'static str)], label: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(alias, _)| *alias == label)
        .map(|(_, id)| *id)
}

/// Strip trailing sentence punctuation the STT step tends to append
fn trim_terminal_punctuation(text: &str) -> &str {
    text.trim()
        .trim_end_matches(['。', '，', '！', '？', '.', ',', '!', '?', ' '])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interceptor() -> CommandInterceptor {
        CommandInterceptor::new()
    }

    #[test]
    fn test_translation_set() {
        let cmd = interceptor().intercept("把下面這句話翻譯成英文");
        assert_eq!(cmd, Some(MagicCommand::TranslationSet("英文".to_string())));
    }

    #[test]
    fn test_translation_variants() {
        let i = interceptor();
        assert_eq!(
            i.intercept("以下內容翻譯成日文。"),
            Some(MagicCommand::TranslationSet("日文".to_string()))
        );
        assert_eq!(
            i.intercept("把內容，翻譯成法文"),
            Some(MagicCommand::TranslationSet("法文".to_string()))
        );
        assert_eq!(
            i.intercept("把下面這段話翻譯成德文"),
            Some(MagicCommand::TranslationSet("德文".to_string()))
        );
    }

    #[test]
    fn test_translation_empty_target_no_match() {
        assert_eq!(interceptor().intercept("把下面這句話翻譯成。"), None);
    }

    #[test]
    fn test_cancel_phrases() {
        let i = interceptor();
        assert_eq!(i.intercept("取消翻譯"), Some(MagicCommand::TranslationCleared));
        assert_eq!(i.intercept("停止翻譯。"), Some(MagicCommand::TranslationCleared));
        assert_eq!(
            i.intercept("恢復正常模式"),
            Some(MagicCommand::TranslationCleared)
        );
        assert_eq!(i.intercept("回到正常"), Some(MagicCommand::TranslationCleared));
    }

    #[test]
    fn test_cancel_beats_scenario_switch() {
        // "恢復正常模式" also matches the scenario-switch shape, but the
        // cancel rule is earlier in the table
        let cmd = interceptor().intercept("恢復正常模式。");
        assert_eq!(cmd, Some(MagicCommand::TranslationCleared));
    }

    #[test]
    fn test_scenario_switch() {
        let cmd = interceptor().intercept("切換到客訴模式");
        assert_eq!(
            cmd,
            Some(MagicCommand::ScenarioSet {
                id: "complaint".to_string(),
                label: "客訴".to_string(),
            })
        );
        let cmd = interceptor().intercept("進入會議情境。");
        assert_eq!(
            cmd,
            Some(MagicCommand::ScenarioSet {
                id: "meeting".to_string(),
                label: "會議".to_string(),
            })
        );
    }

    #[test]
    fn test_unknown_scenario_falls_through() {
        assert_eq!(interceptor().intercept("切換到外星模式"), None);
    }

    #[test]
    fn test_format_switch() {
        let cmd = interceptor().intercept("改用條列格式");
        assert_eq!(
            cmd,
            Some(MagicCommand::FormatSet {
                id: "bullet".to_string(),
                label: "條列".to_string(),
            })
        );
        let cmd = interceptor().intercept("使用電子郵件格式。");
        assert_eq!(
            cmd,
            Some(MagicCommand::FormatSet {
                id: "email".to_string(),
                label: "電子郵件".to_string(),
            })
        );
    }

    #[test]
    fn test_template_save() {
        let i = interceptor();
        assert_eq!(
            i.intercept("儲存成模板"),
            Some(MagicCommand::TemplateSave(None))
        );
        assert_eq!(
            i.intercept("保存為模板週報"),
            Some(MagicCommand::TemplateSave(Some("週報".to_string())))
        );
    }

    #[test]
    fn test_template_recall() {
        assert_eq!(
            interceptor().intercept("套用模板週報"),
            Some(MagicCommand::TemplateRecall("週報".to_string()))
        );
    }

    #[test]
    fn test_plain_dictation_passes_through() {
        let i = interceptor();
        assert_eq!(i.intercept("今天天氣很好，我們去散步吧。"), None);
        assert_eq!(i.intercept(""), None);
        assert_eq!(i.intercept("。"), None);
    }
}
