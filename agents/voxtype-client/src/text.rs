/// Strips the configured trailing punctuation from a result before it is
/// typed. Idempotent.
pub fn strip_punc<'a>(text: &'a str, trash: &str) -> &'a str {
    text.trim_end_matches(|c| trash.contains(c))
}
