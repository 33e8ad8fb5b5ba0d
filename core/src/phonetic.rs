//! Surface-letter approximation of a word's rhyme sound.
//!
//! The key is the tail of the word starting at its last vowel, widened by one
//! letter when that tail would be a single character. Words without an inner
//! vowel fall back to their last three letters. No pronunciation data is
//! consulted, so unrelated words may share a key.

const FALLBACK_TAIL: usize = 3;

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Phonetic ending used as the grouping key, or `None` for words shorter than two characters.
pub fn phonetic_ending(word: &str) -> Option<String> {
    let chars: Vec<char> = word.to_lowercase().chars().collect();
    if chars.len() < 2 {
        return None;
    }

    let last_vowel = chars.iter().rposition(|&c| is_vowel(c));
    let ending = match last_vowel {
        Some(v) if v > 0 => {
            if chars.len() - v < 2 {
                &chars[v - 1..]
            } else {
                &chars[v..]
            }
        }
        _ => &chars[chars.len().saturating_sub(FALLBACK_TAIL)..],
    };
    Some(ending.iter().collect())
}

/// Whether two endings count as a near rhyme: lengths within one and the same final two letters.
fn similar_endings(a: &str, b: &str) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > 1 {
        return false;
    }
    if a.len().min(b.len()) < 2 {
        return false;
    }
    a[a.len() - 2..] == b[b.len() - 2..]
}

/// Pairwise rhyme check for ad hoc queries.
///
/// A word never rhymes with itself. Degenerate words without a key return
/// `false`. This is independent of the grouping pipeline.
pub fn words_rhyme(first: &str, second: &str) -> bool {
    if first == second {
        return false;
    }
    let (Some(a), Some(b)) = (phonetic_ending(first), phonetic_ending(second)) else {
        return false;
    };
    a == b || similar_endings(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(word: &str) -> String {
        phonetic_ending(word).unwrap()
    }

    #[test]
    fn tail_from_last_vowel() {
        assert_eq!(key("cat"), "at");
        assert_eq!(key("running"), "ing");
        assert_eq!(key("light"), "ight");
        assert_eq!(key("station"), "on");
    }

    #[test]
    fn widens_single_letter_tail() {
        assert_eq!(key("sea"), "ea");
        assert_eq!(key("tree"), "ee");
        assert_eq!(key("hello"), "lo");
    }

    #[test]
    fn falls_back_to_last_three_letters() {
        assert_eq!(key("rhythm"), "thm");
        assert_eq!(key("apt"), "apt");
        assert_eq!(key("art"), "art");
        assert_eq!(key("hm"), "hm");
    }

    #[test]
    fn short_words_have_no_key() {
        assert_eq!(phonetic_ending(""), None);
        assert_eq!(phonetic_ending("a"), None);
    }

    #[test]
    fn lowercases_input() {
        assert_eq!(key("NIGHT"), "ight");
    }

    #[test]
    fn pairwise_examples() {
        assert!(words_rhyme("cat", "hat"));
        assert!(!words_rhyme("cat", "cat"));
        assert!(words_rhyme("light", "right"));
        assert!(!words_rhyme("cat", "dog"));
    }

    #[test]
    fn pairwise_near_rhyme() {
        // "und" and "and" share their last two letters.
        assert!(words_rhyme("found", "band"));
        assert!(words_rhyme("rhythm", "ohm"));
        assert!(!words_rhyme("light", "ant"));
    }

    #[test]
    fn pairwise_degenerate_inputs() {
        assert!(!words_rhyme("", "cat"));
        assert!(!words_rhyme("x", "y"));
    }
}
