//! Text chunking for speech synthesis
//!
//! Speech requests are kept short so the first words play quickly. Text is
//! split into sentences and sentences are packed greedily into chunks; a
//! chunk never ends mid-sentence.

use std::sync::LazyLock;

use regex::Regex;

/// Default chunk size limit, in characters
pub const DEFAULT_MAX_CHUNK_LEN: usize = 150;

static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]+").expect("sentence pattern is valid"));

/// Split text into sentences
///
/// A sentence is a run ending in `.`, `!`, or `?`. Text after the last
/// terminator is a sentence of its own; text without any terminator is one
/// sentence. Sentences are trimmed and empty ones dropped.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut end = 0;

    for m in SENTENCE.find_iter(text) {
        push_trimmed(&mut sentences, &text[end..m.start()]);
        push_trimmed(&mut sentences, m.as_str());
        end = m.end();
    }
    push_trimmed(&mut sentences, &text[end..]);

    sentences
}

fn push_trimmed<'a>(sentences: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        sentences.push(s);
    }
}

/// Split `text` into chunks of whole sentences of at most `max_len` characters
///
/// A single sentence longer than `max_len` becomes its own chunk. When
/// `max_len` is 0, [`DEFAULT_MAX_CHUNK_LEN`] is used. Every returned chunk
/// is non-empty.
#[must_use]
pub fn split_text_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    let max_len = if max_len == 0 {
        DEFAULT_MAX_CHUNK_LEN
    } else {
        max_len
    };

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let len = sentence.chars().count();
        let joined_len = if current.is_empty() {
            len
        } else {
            current_len + 1 + len
        };

        if !current.is_empty() && joined_len > max_len {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(sentence);
        current_len += len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = split_text_into_chunks("Preheat the oven. Grease the pan!", 150);
        assert_eq!(chunks, vec!["Preheat the oven. Grease the pan!"]);
    }

    #[test]
    fn test_text_without_terminator_is_one_sentence() {
        assert_eq!(split_sentences("two cups of flour"), vec!["two cups of flour"]);
        assert_eq!(
            split_text_into_chunks("two cups of flour", 150),
            vec!["two cups of flour"]
        );
    }

    #[test]
    fn test_trailing_text_is_kept() {
        assert_eq!(
            split_sentences("Mix well. Then rest"),
            vec!["Mix well.", "Then rest"]
        );
    }

    #[test]
    fn test_repeated_terminators_stay_with_sentence() {
        assert_eq!(
            split_sentences("Really?! Yes... Done."),
            vec!["Really?!", "Yes...", "Done."]
        );
    }

    #[test]
    fn test_empty_and_blank_text_produce_nothing() {
        assert!(split_text_into_chunks("", 150).is_empty());
        assert!(split_text_into_chunks("   \n ", 150).is_empty());
    }

    #[test]
    fn test_packs_sentences_up_to_limit() {
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = split_text_into_chunks(text, 30);
        assert_eq!(chunks, vec!["One two three. Four five six.", "Seven eight nine."]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
    }

    #[test]
    fn test_long_sentence_is_never_split() {
        let long = format!("{}.", "word ".repeat(50).trim());
        let text = format!("Short one. {long} Short two.");
        let chunks = split_text_into_chunks(&text, 40);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "Short one.");
        assert_eq!(chunks[1], long);
        assert_eq!(chunks[2], "Short two.");
    }

    #[test]
    fn test_chunks_rejoin_to_input_sentences() {
        let text = "Whisk the eggs. Add milk and flour! Is the batter smooth? \
                    Heat a pan over medium heat. Pour a ladle of batter. \
                    Flip when bubbles form. Serve warm with syrup";
        for limit in [10, 30, 60, 150, 1000] {
            let chunks = split_text_into_chunks(text, limit);
            let rejoined = chunks.join(" ");
            assert_eq!(rejoined, split_sentences(text).join(" "), "limit {limit}");
        }
    }

    #[test]
    fn test_zero_limit_uses_default() {
        let text = "a. ".repeat(100);
        let chunks = split_text_into_chunks(&text, 0);
        assert!(chunks.iter().all(|c| c.chars().count() <= DEFAULT_MAX_CHUNK_LEN));
    }

    #[test]
    fn test_multibyte_text_is_counted_in_chars() {
        let text = "Crème brûlée. Café au lait.";
        let chunks = split_text_into_chunks(text, 13);
        assert_eq!(chunks, vec!["Crème brûlée.", "Café au lait."]);
    }
}
