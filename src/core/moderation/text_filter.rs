// Word filter - finds dictionary words in text and masks them.
//
// Every dictionary entry is matched against the ORIGINAL text, and the masks
// are applied in one pass at the end. Masking one word therefore can't hide
// or shift a match for another word.

use super::moderation_models::Violation;
use super::word_list::ModerationWordList;

/// What the word filter found in a piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct WordFilterOutcome {
    pub filtered_text: String,
    /// One `ProhibitedWord` per matching dictionary entry, in dictionary order
    pub violations: Vec<Violation>,
}

/// A byte range of the original text to mask, and how many mask chars to emit.
#[derive(Debug, Clone, Copy)]
struct MaskSpan {
    start: usize,
    end: usize,
    mask_len: usize,
}

/// Scan `text` for every dictionary word and mask each match with `mask`.
///
/// A match is masked with as many mask chars as the dictionary word has chars.
pub fn filter_words(words: &ModerationWordList, text: &str, mask: char) -> WordFilterOutcome {
    let mut violations = Vec::new();
    let mut spans = Vec::new();

    for entry in words.entries() {
        let mask_len = entry.word().chars().count();
        let before = spans.len();

        spans.extend(entry.matcher().find_iter(text).map(|m| MaskSpan {
            start: m.start(),
            end: m.end(),
            mask_len,
        }));

        if spans.len() > before {
            violations.push(Violation::ProhibitedWord(entry.word().to_string()));
        }
    }

    WordFilterOutcome {
        filtered_text: apply_masks(text, spans, mask),
        violations,
    }
}

fn apply_masks(text: &str, mut spans: Vec<MaskSpan>, mask: char) -> String {
    if spans.is_empty() {
        return text.to_string();
    }

    spans.sort_by_key(|s| (s.start, s.end));

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for span in spans {
        if span.start >= cursor {
            out.push_str(&text[cursor..span.start]);
            out.extend(std::iter::repeat(mask).take(span.mask_len));
            cursor = span.end;
        } else if span.end > cursor {
            // Overlaps the previous mask: cover the extra part char for char
            let extra = text[cursor..span.end].chars().count();
            out.extend(std::iter::repeat(mask).take(extra));
            cursor = span.end;
        }
    }

    out.push_str(&text[cursor..]);
    out
}
