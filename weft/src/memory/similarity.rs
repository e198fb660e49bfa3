//! Lightweight, LLM-free similarity measures used for dedup and the no-embeddings
//! compression fallback.

use std::collections::HashSet;

/// Word-set Jaccard similarity, used for `add_entry`'s duplicate check.
pub fn jaccard_word_similarity(a: &str, b: &str) -> f32 {
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

fn char_ngrams(s: &str, n: usize) -> HashSet<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < n {
        return HashSet::from([s.to_string()]);
    }
    chars
        .windows(n)
        .map(|w| w.iter().collect::<String>())
        .collect()
}

fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Embedding-free text similarity, blending character 2-gram (weight 0.4) and 3-gram
/// (weight 0.3) Jaccard, character-set overlap (weight 0.2), and length ratio (weight
/// 0.1) — the compression fallback when embeddings aren't available.
pub fn text_similarity(a: &str, b: &str) -> f32 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();

    let bigram_sim = jaccard(&char_ngrams(&a_lower, 2), &char_ngrams(&b_lower, 2));
    let trigram_sim = jaccard(&char_ngrams(&a_lower, 3), &char_ngrams(&b_lower, 3));

    let charset_a: HashSet<char> = a_lower.chars().collect();
    let charset_b: HashSet<char> = b_lower.chars().collect();
    let charset_sim = jaccard(&charset_a, &charset_b);

    let len_a = a_lower.chars().count().max(1) as f32;
    let len_b = b_lower.chars().count().max(1) as f32;
    let length_ratio = len_a.min(len_b) / len_a.max(len_b);

    bigram_sim * 0.4 + trigram_sim * 0.3 + charset_sim * 0.2 + length_ratio * 0.1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_word_similarity_identical_strings_is_one() {
        assert_eq!(jaccard_word_similarity("the quick fox", "the quick fox"), 1.0);
    }

    #[test]
    fn jaccard_word_similarity_disjoint_is_zero() {
        assert_eq!(jaccard_word_similarity("apples", "oranges grapes"), 0.0);
    }

    #[test]
    fn text_similarity_identical_strings_is_one() {
        let sim = text_similarity("hello world", "hello world");
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn text_similarity_unrelated_strings_is_low() {
        let sim = text_similarity("the quick brown fox", "xyzzy plugh quux");
        assert!(sim < 0.3);
    }
}
