//! Small text helpers shared by the scorer and the contradiction detector.

use std::collections::BTreeSet;

/// Words too common to carry meaning in an overlap measure.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "this", "to", "was", "we", "with",
];

/// Lowercased alphanumeric words. Apostrophes stay inside a word so that
/// contractions like `don't` survive as a single token.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Distinct tokens with stopwords removed.
pub fn content_words(text: &str) -> BTreeSet<String> {
    tokenize(text)
        .into_iter()
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Fraction of `query` words found in `field`, in `[0.0, 1.0]`.
/// An empty query matches nothing.
pub fn coverage(query: &BTreeSet<String>, field: &BTreeSet<String>) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let hits = query.iter().filter(|w| field.contains(*w)).count();
    hits as f64 / query.len() as f64
}

/// Jaccard similarity of two word sets, in `[0.0, 1.0]`. Two empty sets score 0.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Truncate content to max_chars, appending "..." if truncated.
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    if content.len() <= max_chars {
        content.to_string()
    } else {
        // Find a clean char boundary
        let end = content
            .char_indices()
            .take_while(|(i, _)| *i < max_chars)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(max_chars);
        format!("{}...", &content[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> BTreeSet<String> {
        content_words(s)
    }

    #[test]
    fn tokenize_keeps_contractions() {
        assert_eq!(tokenize("Don't use `unwrap()`!"), vec!["don't", "use", "unwrap"]);
    }

    #[test]
    fn content_words_drops_stopwords() {
        let w = words("The cache is flushed on shutdown");
        assert!(w.contains("cache"));
        assert!(!w.contains("the"));
        assert!(!w.contains("is"));
    }

    #[test]
    fn coverage_rewards_partial_overlap() {
        let field = words("database connection pooling");
        assert_eq!(coverage(&words("database pooling"), &field), 1.0);
        assert_eq!(coverage(&words("database migrations"), &field), 0.5);
        assert_eq!(coverage(&BTreeSet::new(), &field), 0.0);
    }

    #[test]
    fn jaccard_bounds() {
        assert_eq!(jaccard(&words("a b"), &words("")), 0.0);
        assert_eq!(jaccard(&words("cache flush"), &words("cache flush")), 1.0);
        let j = jaccard(&words("cache flush"), &words("cache evict"));
        assert!(j > 0.0 && j < 1.0);
    }

    #[test]
    fn truncate_preview_respects_char_boundaries() {
        assert_eq!(truncate_preview("short", 80), "short");
        assert_eq!(truncate_preview(&"a".repeat(100), 80), format!("{}...", "a".repeat(80)));
        let s = "é".repeat(50);
        let t = truncate_preview(&s, 5);
        assert!(t.ends_with("..."));
    }
}
