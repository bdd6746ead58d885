//! Token rendering and CJK/ASCII spacing normalization. All pure functions.

/// Renders the accumulated tokens to display text.
///
/// Tokens join with single spaces, the `"@@ "` subword-continuation marker
/// collapses to nothing, and a space is dropped when it follows a
/// non-ASCII-alphanumeric character and does not precede one — this keeps
/// English word boundaries while removing the spaces the join introduced
/// around CJK characters.
pub fn render_tokens(tokens: &[String]) -> String {
    let joined = tokens.join(" ").replace("@@ ", "");

    let chars: Vec<char> = joined.chars().collect();
    let mut out = String::with_capacity(joined.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            let prev = out.chars().next_back();
            let next = chars.get(i + 1);
            let prev_breaks = prev.is_some_and(|p| !p.is_ascii_alphanumeric());
            let next_continues = next.is_some_and(|n| n.is_ascii_alphanumeric());
            if prev_breaks && !next_continues {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

#[derive(Clone, Copy, PartialEq)]
enum CharClass {
    Cjk,
    Letter,
    Digit,
    Other,
}

fn class_of(c: char) -> CharClass {
    if is_cjk(c) {
        CharClass::Cjk
    } else if c.is_ascii_alphabetic() {
        CharClass::Letter
    } else if c.is_ascii_digit() {
        CharClass::Digit
    } else {
        CharClass::Other
    }
}

/// Normalizes spacing between CJK, Latin-letter and digit runs.
///
/// Whitespace is always compressed to single spaces and spaces between CJK
/// characters are always removed. Each boolean selects whether the
/// corresponding boundary carries one space (`true`) or none (`false`):
/// `cn_en` CJK↔letters, `cn_digit` CJK↔digits, `en_digit` letters↔digits.
pub fn adjust_space(text: &str, cn_en: bool, cn_digit: bool, en_digit: bool) -> String {
    let boundary_keeps_space = |a: CharClass, b: CharClass| -> Option<bool> {
        use CharClass::*;
        match (a, b) {
            (Cjk, Cjk) => Some(false),
            (Cjk, Letter) | (Letter, Cjk) => Some(cn_en),
            (Cjk, Digit) | (Digit, Cjk) => Some(cn_digit),
            (Letter, Digit) | (Digit, Letter) => Some(en_digit),
            _ => None,
        }
    };

    // Compress all whitespace runs to single spaces.
    let compressed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = compressed.chars().collect();

    // Drop the spaces the selected boundaries should not carry.
    let mut stripped = String::with_capacity(compressed.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ' '
            && let (Some(prev), Some(&next)) = (stripped.chars().next_back(), chars.get(i + 1))
            && boundary_keeps_space(class_of(prev), class_of(next)) == Some(false)
        {
            continue;
        }
        stripped.push(c);
    }

    // Insert the spaces the selected boundaries should carry.
    let mut out = String::with_capacity(stripped.len() + 8);
    for c in stripped.chars() {
        if let Some(prev) = out.chars().next_back()
            && prev != ' '
            && c != ' '
            && boundary_keeps_space(class_of(prev), class_of(c)) == Some(true)
        {
            out.push(' ');
        }
        out.push(c);
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn render_joins_english_with_spaces() {
        assert_eq!(
            render_tokens(&toks(&["A", "B", "C", "D", "E", "F", "G", "H"])),
            "A B C D E F G H"
        );
    }

    #[test]
    fn render_collapses_subword_markers() {
        assert_eq!(
            render_tokens(&toks(&["hel@@", "lo", "wor@@", "ld"])),
            "hello world"
        );
    }

    #[test]
    fn render_removes_spaces_around_cjk() {
        assert_eq!(render_tokens(&toks(&["你", "好"])), "你好");
        assert_eq!(
            render_tokens(&toks(&["你", "好", "hello", "世", "界"])),
            "你好 hello 世界"
        );
    }

    #[test]
    fn render_is_pure() {
        let tokens = toks(&["你", "好", "a@@", "b"]);
        assert_eq!(render_tokens(&tokens), render_tokens(&tokens));
    }

    #[test]
    fn adjust_space_cases() {
        // (input, expected, cn_en, cn_digit, en_digit)
        let cases: &[(&str, &str, bool, bool, bool)] = &[
            ("中文测试", "中文测试", false, false, false),
            ("English Test", "English Test", false, false, false),
            ("中文 测试", "中文测试", false, false, false),
            ("中文      测试   ", "中文测试", false, false, false),
            ("English        Test", "English Test", false, false, false),
            ("中文English", "中文English", false, false, false),
            ("中 文English", "中文 English", true, false, false),
            ("中      文          English", "中文 English", true, false, false),
            ("中文1", "中文 1", false, true, false),
            ("中文          1中文", "中文 1 中文", false, true, false),
            ("中文1English中文", "中文 1English中文", false, true, false),
            ("English1", "English 1", false, false, true),
            ("English        1", "English 1", false, false, true),
            (" English中文1 ", "English中文1", false, false, true),
            ("English1中文 ", "English 1中文", false, false, true),
            (
                "中文1              中文English1中文English",
                "中文 1 中文 English 1 中文 English",
                true,
                true,
                true,
            ),
        ];
        for (input, expected, cn_en, cn_digit, en_digit) in cases {
            assert_eq!(
                adjust_space(input, *cn_en, *cn_digit, *en_digit),
                *expected,
                "adjust_space({input:?}, {cn_en}, {cn_digit}, {en_digit})"
            );
        }
    }

    #[test]
    fn adjust_space_is_idempotent() {
        let once = adjust_space("中 文English1 中文", true, false, false);
        let twice = adjust_space(&once, true, false, false);
        assert_eq!(once, twice);
    }
}
