// Moderation domain models - data structures for the content moderation pipeline.
//
// These are pure domain types with no HTTP or storage dependencies.
// Every value here is created fresh per moderation call and dropped once the
// caller has consumed it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Image labels below this confidence (classifier percentage scale) are ignored.
pub const MIN_IMAGE_CONFIDENCE: f32 = 60.0;

/// Sentiment scores strictly below this value count as strongly negative.
pub const NEGATIVE_SENTIMENT_THRESHOLD: f32 = -0.7;

/// Mask character used when the configuration doesn't provide one.
pub const DEFAULT_REPLACEMENT_CHAR: char = '*';

// ============================================================================
// VIOLATIONS
// ============================================================================

/// A labeled reason a piece of content failed a moderation check.
///
/// Labels arrive as free strings (dictionary words, classifier category names,
/// our own markers). Parsing them into this enum up front means the trust-score
/// policy can match exhaustively instead of falling through a string switch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Violation {
    /// Classifier category "Explicit Nudity"
    ExplicitNudity,
    /// Classifier category "Graphic Violence"
    GraphicViolence,
    /// Classifier category "Hate Symbols"
    HateSymbols,
    /// Sentiment analysis scored the text as strongly negative
    NegativeSentiment,
    /// A dictionary word was found in the text (carries the dictionary entry)
    ProhibitedWord(String),
    /// Any label we have no dedicated handling for (carries the raw label)
    Unrecognized(String),
}

impl Violation {
    pub const EXPLICIT_NUDITY: &'static str = "Explicit Nudity";
    pub const GRAPHIC_VIOLENCE: &'static str = "Graphic Violence";
    pub const HATE_SYMBOLS: &'static str = "Hate Symbols";
    pub const NEGATIVE_SENTIMENT: &'static str = "negative_sentiment";

    /// Parse a raw label string into a violation.
    ///
    /// Known labels are matched exactly (case-sensitive, as the classifier
    /// vocabulary is). Everything else becomes `Unrecognized`.
    pub fn from_label(label: &str) -> Self {
        match label {
            Self::EXPLICIT_NUDITY => Violation::ExplicitNudity,
            Self::GRAPHIC_VIOLENCE => Violation::GraphicViolence,
            Self::HATE_SYMBOLS => Violation::HateSymbols,
            Self::NEGATIVE_SENTIMENT => Violation::NegativeSentiment,
            other => Violation::Unrecognized(other.to_string()),
        }
    }

    /// The label string this violation is reported as.
    pub fn label(&self) -> &str {
        match self {
            Violation::ExplicitNudity => Self::EXPLICIT_NUDITY,
            Violation::GraphicViolence => Self::GRAPHIC_VIOLENCE,
            Violation::HateSymbols => Self::HATE_SYMBOLS,
            Violation::NegativeSentiment => Self::NEGATIVE_SENTIMENT,
            Violation::ProhibitedWord(word) => word,
            Violation::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Violation {
    fn from(label: String) -> Self {
        Violation::from_label(&label)
    }
}

impl From<Violation> for String {
    fn from(violation: Violation) -> Self {
        violation.label().to_string()
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// Result of running the text filter (and sentiment check) over a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextModerationResult {
    /// True iff `violations` is empty
    pub is_clean: bool,
    /// Input text with every prohibited word masked
    pub filtered_text: String,
    pub violations: Vec<Violation>,
}

impl TextModerationResult {
    /// Build a result, deriving `is_clean` from the violations.
    pub fn new(filtered_text: String, violations: Vec<Violation>) -> Self {
        Self {
            is_clean: violations.is_empty(),
            filtered_text,
            violations,
        }
    }

    /// The result for empty input.
    pub fn empty() -> Self {
        Self::new(String::new(), Vec::new())
    }
}

/// Result of running an image through the content-safety classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageModerationResult {
    /// True iff `violations` is empty
    pub is_clean: bool,
    pub violations: Vec<Violation>,
}

impl ImageModerationResult {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self {
            is_clean: violations.is_empty(),
            violations,
        }
    }

    /// A clean result. Also what the caller sees when the classifier failed,
    /// so "clean" here never means "confirmed safe" during an outage.
    pub fn clean() -> Self {
        Self::new(Vec::new())
    }
}

/// A single label returned by the image classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLabel {
    pub name: String,
    /// Confidence on the classifier's percentage scale (0..=100)
    pub confidence: f32,
}

/// Text and image moderation for one piece of user content, plus the
/// reputation delta for everything that was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentModerationReport {
    pub text: Option<TextModerationResult>,
    pub image: Option<ImageModerationResult>,
    /// Text violations first, then image violations
    pub violations: Vec<Violation>,
    pub trust_score_adjustment: i32,
}

impl ContentModerationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Failures of the external classifiers.
///
/// None of these ever reach a caller of the moderation service: they are
/// logged and the check contributes no violations.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request signing failed: {0}")]
    Signing(String),
}

impl From<reqwest::Error> for ModerationError {
    fn from(e: reqwest::Error) -> Self {
        ModerationError::Api(e.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
