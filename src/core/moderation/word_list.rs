// The prohibited-word dictionary.
//
// Built once at startup and never mutated afterwards. The service holds it
// behind an `Arc`, so any number of concurrent moderation calls can read it.

use regex::Regex;

/// One dictionary entry together with its compiled whole-word matcher.
#[derive(Debug, Clone)]
pub struct WordEntry {
    word: String,
    matcher: Regex,
}

impl WordEntry {
    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }
}

/// Ordered, immutable list of lowercase prohibited words.
#[derive(Debug, Clone, Default)]
pub struct ModerationWordList {
    entries: Vec<WordEntry>,
}

impl ModerationWordList {
    /// An empty dictionary. Text matching always comes back clean.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the dictionary from raw words.
    ///
    /// Words are trimmed and lowercased; blanks are dropped and duplicates keep
    /// their first position. Each word is regex-escaped before it goes into a
    /// `\b...\b` pattern, so punctuation in an entry only ever matches itself.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<WordEntry> = Vec::new();

        for raw in words {
            let word = raw.as_ref().trim().to_lowercase();
            if word.is_empty() || entries.iter().any(|e| e.word == word) {
                continue;
            }

            let pattern = format!(r"(?i)\b{}\b", regex::escape(&word));
            match Regex::new(&pattern) {
                Ok(matcher) => entries.push(WordEntry { word, matcher }),
                Err(e) => {
                    // Only reachable for absurdly long entries (regex size limit)
                    tracing::warn!(word = %word, "Skipping dictionary entry: {}", e);
                }
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[WordEntry] {
        &self.entries
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.word.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_are_normalized_and_deduplicated() {
        let list = ModerationWordList::from_words(["  Spam ", "scam", "", "SPAM", "fraud"]);
        let words: Vec<&str> = list.words().collect();
        assert_eq!(words, vec!["spam", "scam", "fraud"]);
    }

    #[test]
    fn test_matcher_is_whole_word_and_case_insensitive() {
        let list = ModerationWordList::from_words(["ass"]);
        let matcher = list.entries()[0].matcher();

        assert!(matcher.is_match("what an ASS"));
        assert!(!matcher.is_match("an assassin"));
        assert!(!matcher.is_match("class"));
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let list = ModerationWordList::from_words(["a.b", "c++"]);

        assert!(list.entries()[0].matcher().is_match("say a.b now"));
        assert!(!list.entries()[0].matcher().is_match("say axb now"));
        // "c++" compiles instead of blowing up on a dangling repetition
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_empty_list() {
        let list = ModerationWordList::empty();
        assert!(list.is_empty());
        assert_eq!(list.words().count(), 0);
    }
}
