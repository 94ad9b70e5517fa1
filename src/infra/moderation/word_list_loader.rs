// Loads the prohibited-word dictionary from a bundled file.
//
// Two formats are accepted:
// - a JSON array of strings: `["spam", "scam"]`
// - plain text, one word per line (blank lines and `#` comments are skipped)

use crate::core::moderation::ModerationWordList;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WordListError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON word list: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse dictionary file contents into raw words.
pub fn parse_words(contents: &str) -> Result<Vec<String>, WordListError> {
    if contents.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(contents)?);
    }

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Read and parse a dictionary file.
pub fn read_word_list(path: &Path) -> Result<ModerationWordList, WordListError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(ModerationWordList::from_words(parse_words(&contents)?))
}

/// Load the dictionary, falling back to an empty one if anything goes wrong.
///
/// An empty dictionary means the word filter never matches; the sentiment and
/// image checks are unaffected.
pub fn load_word_list(path: &Path) -> ModerationWordList {
    match read_word_list(path) {
        Ok(list) => {
            tracing::info!(path = %path.display(), words = list.len(), "Loaded moderation word list");
            list
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                "Failed to load moderation word list, word filtering disabled: {}",
                e
            );
            ModerationWordList::empty()
        }
    }
}
