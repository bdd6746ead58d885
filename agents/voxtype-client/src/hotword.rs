//! File-backed hot-word substitution tables, applied to final results
//! before they are typed.
//!
//! `hot-zh.txt` / `hot-en.txt` / `hot-rule.txt` / `keywords.txt` live next
//! to the working directory; a missing file simply disables its layer.
//! Lines starting with `#` are comments.

use std::path::Path;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::config::ClientConfig;

pub struct HotWords {
    /// Literal replacements, `wrong → right`, applied as-is.
    zh: Vec<(String, String)>,
    /// Correctly-cased phrases, matched case-insensitively and replaced
    /// with the listed casing.
    en: Vec<(Regex, String)>,
    /// Regex rules, `pattern = replacement`.
    rules: Vec<(Regex, String)>,
    /// Keyword prefixes that split the markdown day-log.
    pub keywords: Vec<String>,
}

impl HotWords {
    pub fn load(dir: &Path) -> Self {
        let zh = read_lines(&dir.join("hot-zh.txt"))
            .into_iter()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                Some((parts.next()?.to_string(), parts.next()?.to_string()))
            })
            .collect();

        let en = read_lines(&dir.join("hot-en.txt"))
            .into_iter()
            .filter_map(|phrase| {
                let pattern = RegexBuilder::new(&regex::escape(&phrase))
                    .case_insensitive(true)
                    .build();
                match pattern {
                    Ok(re) => Some((re, phrase)),
                    Err(e) => {
                        warn!(phrase, error = %e, "unusable hot-en entry");
                        None
                    }
                }
            })
            .collect();

        let rules = read_lines(&dir.join("hot-rule.txt"))
            .into_iter()
            .filter_map(|line| {
                let (pattern, replacement) = line.split_once(" = ")?;
                match Regex::new(pattern.trim()) {
                    Ok(re) => Some((re, replacement.trim().to_string())),
                    Err(e) => {
                        warn!(pattern, error = %e, "unusable hot-rule entry");
                        None
                    }
                }
            })
            .collect();

        let keywords = read_lines(&dir.join("keywords.txt"));

        let loaded = Self {
            zh,
            en,
            rules,
            keywords,
        };
        debug!(
            zh = loaded.zh.len(),
            en = loaded.en.len(),
            rules = loaded.rules.len(),
            keywords = loaded.keywords.len(),
            "hot-word tables loaded"
        );
        loaded
    }

    pub fn empty() -> Self {
        Self {
            zh: Vec::new(),
            en: Vec::new(),
            rules: Vec::new(),
            keywords: Vec::new(),
        }
    }

    /// Applies the enabled substitution layers in order: zh, en, rule.
    pub fn apply(&self, input: &str, config: &ClientConfig) -> String {
        let mut text = input.to_string();
        if config.hot_zh {
            for (from, to) in &self.zh {
                text = text.replace(from, to);
            }
        }
        if config.hot_en {
            for (re, cased) in &self.en {
                text = re.replace_all(&text, cased.as_str()).into_owned();
            }
        }
        if config.hot_rule {
            for (re, replacement) in &self.rules {
                text = re.replace_all(&text, replacement.as_str()).into_owned();
            }
        }
        text
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_all_on() -> ClientConfig {
        ClientConfig::default()
    }

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn zh_layer_replaces_literals() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hot-zh.txt", "# comment\n生词 声纹\n");
        let hotwords = HotWords::load(dir.path());
        assert_eq!(
            hotwords.apply("这是生词测试", &config_all_on()),
            "这是声纹测试"
        );
    }

    #[test]
    fn en_layer_fixes_casing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hot-en.txt", "GitHub\nPyTorch\n");
        let hotwords = HotWords::load(dir.path());
        assert_eq!(
            hotwords.apply("push to github with pytorch", &config_all_on()),
            "push to GitHub with PyTorch"
        );
    }

    #[test]
    fn rule_layer_applies_regexes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hot-rule.txt", r"(\d+) 点 (\d+) 分 = $1:$2");
        let hotwords = HotWords::load(dir.path());
        assert_eq!(
            hotwords.apply("现在是 10 点 30 分", &config_all_on()),
            "现在是 10:30"
        );
    }

    #[test]
    fn disabled_layers_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hot-zh.txt", "错 对\n");
        let hotwords = HotWords::load(dir.path());
        let config = ClientConfig {
            hot_zh: false,
            ..ClientConfig::default()
        };
        assert_eq!(hotwords.apply("错了", &config), "错了");
    }

    #[test]
    fn missing_files_mean_empty_tables() {
        let dir = tempfile::tempdir().unwrap();
        let hotwords = HotWords::load(dir.path());
        assert_eq!(hotwords.apply("unchanged", &config_all_on()), "unchanged");
        assert!(hotwords.keywords.is_empty());
    }
}
