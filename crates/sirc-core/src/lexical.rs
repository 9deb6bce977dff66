//! Lexical similarity: trigram Jaccard over lowercased, whitespace-collapsed
//! text. Used by the Linker (C5) and Contextualizer (C6) as one signal in
//! the confidence blend.

use std::collections::HashSet;

/// Lowercase the input and collapse runs of non-word characters to single
/// spaces, so punctuation/whitespace differences don't perturb the trigram
/// set.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

fn trigrams(text: &str) -> HashSet<String> {
    let normalized = normalize(text);
    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() < 3 {
        let mut set = HashSet::new();
        if !normalized.is_empty() {
            set.insert(normalized);
        }
        return set;
    }
    chars
        .windows(3)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

/// Jaccard similarity of the two texts' trigram sets, in `[0, 1]`.
pub fn trigram_jaccard(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() && tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_similarity_one() {
        assert!((trigram_jaccard("hello world", "hello world") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unrelated_text_has_low_similarity() {
        let s = trigram_jaccard("the quick brown fox", "zzz qqq xxx yyy");
        assert!(s < 0.1);
    }

    #[test]
    fn punctuation_is_collapsed() {
        let a = trigram_jaccard("hello, world!", "hello world");
        assert!(a > 0.9);
    }

    #[test]
    fn empty_strings_are_zero_not_nan() {
        assert_eq!(trigram_jaccard("", ""), 0.0);
    }
}
