// Moderation service - core business logic for content moderation.
//
// This service handles:
// - Prohibited-word filtering and masking (always on)
// - Negative sentiment flagging (external, behind the auto-moderation gate)
// - Unsafe image detection (external, behind the auto-moderation gate)
// - Combining both into a single report with a trust-score delta
//
// NO HTTP here - the external classifiers come in through the ports below.
//
// **Fail-open:** when a classifier errors, times out, or is cancelled, the
// failure is logged and the check contributes no violations. A clean result
// during an outage means "nothing detected", not "confirmed safe".

use super::external_call::{guarded_call, CallPolicy};
use super::moderation_config::ModerationConfig;
use super::moderation_models::{
    ContentModerationReport, ImageLabel, ImageModerationResult, ModerationError,
    TextModerationResult, Violation, MIN_IMAGE_CONFIDENCE, NEGATIVE_SENTIMENT_THRESHOLD,
};
use super::text_filter::filter_words;
use super::trust_policy::calculate_trust_score_adjustment;
use super::word_list::ModerationWordList;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// CLASSIFIER TRAITS (PORTS)
// ============================================================================

/// Scores the sentiment of a piece of text.
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    /// Returns a score in [-1, 1]; negative means negative sentiment.
    ///
    /// A response that can't be read as a score must be an error, never a
    /// made-up score.
    async fn analyze(&self, text: &str) -> Result<f32, ModerationError>;
}

/// Labels unsafe content in an image.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Returns every label the classifier found with at least `min_confidence`
    /// (percentage scale).
    async fn detect_labels(
        &self,
        image: &[u8],
        min_confidence: f32,
    ) -> Result<Vec<ImageLabel>, ModerationError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Runs text and image moderation for the platform.
pub struct ModerationService {
    words: Arc<ModerationWordList>,
    replacement_char: char,
    auto_moderation: bool,
    call_policy: CallPolicy,
    sentiment: Option<Arc<dyn SentimentAnalyzer>>,
    images: Option<Arc<dyn ImageClassifier>>,
}

impl ModerationService {
    /// Create a service with only the word filter. Add classifiers with
    /// [`with_sentiment_analyzer`](Self::with_sentiment_analyzer) and
    /// [`with_image_classifier`](Self::with_image_classifier).
    pub fn new(words: Arc<ModerationWordList>, config: &ModerationConfig) -> Self {
        Self {
            words,
            replacement_char: config.replacement_char,
            auto_moderation: config.auto_moderation,
            call_policy: config.call_policy.clone(),
            sentiment: None,
            images: None,
        }
    }

    pub fn with_sentiment_analyzer(mut self, analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        self.sentiment = Some(analyzer);
        self
    }

    pub fn with_image_classifier(mut self, classifier: Arc<dyn ImageClassifier>) -> Self {
        self.images = Some(classifier);
        self
    }

    pub fn word_list(&self) -> &ModerationWordList {
        &self.words
    }

    pub fn auto_moderation_enabled(&self) -> bool {
        self.auto_moderation
    }

    /// Check text for prohibited words (and negative sentiment, if enabled).
    pub async fn moderate_text(&self, text: &str) -> TextModerationResult {
        self.moderate_text_with_cancel(text, &CancellationToken::new())
            .await
    }

    /// Same as [`moderate_text`](Self::moderate_text), but the sentiment call
    /// is abandoned as soon as `cancel` fires.
    pub async fn moderate_text_with_cancel(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> TextModerationResult {
        if text.is_empty() {
            return TextModerationResult::empty();
        }

        let outcome = filter_words(&self.words, text, self.replacement_char);
        let mut violations = outcome.violations;

        if let Some(score) = self.sentiment_score(text, cancel).await {
            if score < NEGATIVE_SENTIMENT_THRESHOLD {
                violations.push(Violation::NegativeSentiment);
            }
        }

        TextModerationResult::new(outcome.filtered_text, violations)
    }

    /// Check an image for unsafe content.
    pub async fn moderate_image(&self, image: &[u8]) -> ImageModerationResult {
        self.moderate_image_with_cancel(image, &CancellationToken::new())
            .await
    }

    /// Same as [`moderate_image`](Self::moderate_image), but the classifier call
    /// is abandoned as soon as `cancel` fires.
    pub async fn moderate_image_with_cancel(
        &self,
        image: &[u8],
        cancel: &CancellationToken,
    ) -> ImageModerationResult {
        if !self.auto_moderation {
            return ImageModerationResult::clean();
        }

        let Some(classifier) = self.images.as_ref() else {
            tracing::debug!("No image classifier configured, skipping image check");
            return ImageModerationResult::clean();
        };

        if image.is_empty() {
            tracing::debug!("Empty image payload, skipping image check");
            return ImageModerationResult::clean();
        }

        let labels = guarded_call(&self.call_policy, cancel, "image_classifier", || {
            classifier.detect_labels(image, MIN_IMAGE_CONFIDENCE)
        })
        .await;

        match labels {
            Ok(labels) => {
                let violations = labels
                    .into_iter()
                    .filter(|label| label.confidence >= MIN_IMAGE_CONFIDENCE)
                    .map(|label| Violation::from_label(&label.name))
                    .collect();
                ImageModerationResult::new(violations)
            }
            Err(e) => {
                tracing::error!(error = %e, "Image moderation failed, treating image as clean");
                ImageModerationResult::clean()
            }
        }
    }

    /// Moderate the text and image of one piece of content together.
    ///
    /// Both checks run concurrently; missing inputs contribute nothing.
    pub async fn moderate_content(
        &self,
        text: Option<&str>,
        image: Option<&[u8]>,
    ) -> ContentModerationReport {
        self.moderate_content_with_cancel(text, image, &CancellationToken::new())
            .await
    }

    pub async fn moderate_content_with_cancel(
        &self,
        text: Option<&str>,
        image: Option<&[u8]>,
        cancel: &CancellationToken,
    ) -> ContentModerationReport {
        let text_check = async {
            match text {
                Some(text) => Some(self.moderate_text_with_cancel(text, cancel).await),
                None => None,
            }
        };
        let image_check = async {
            match image {
                Some(image) => Some(self.moderate_image_with_cancel(image, cancel).await),
                None => None,
            }
        };

        let (text, image) = tokio::join!(text_check, image_check);

        let violations: Vec<Violation> = text
            .iter()
            .flat_map(|r| r.violations.iter())
            .chain(image.iter().flat_map(|r| r.violations.iter()))
            .cloned()
            .collect();
        let trust_score_adjustment = calculate_trust_score_adjustment(&violations);

        ContentModerationReport {
            text,
            image,
            violations,
            trust_score_adjustment,
        }
    }

    /// Ask the sentiment analyzer for a score. `None` when the check is off,
    /// not configured, or failed.
    async fn sentiment_score(&self, text: &str, cancel: &CancellationToken) -> Option<f32> {
        if !self.auto_moderation {
            return None;
        }
        let analyzer = self.sentiment.as_ref()?;

        match guarded_call(&self.call_policy, cancel, "sentiment_analyzer", || {
            analyzer.analyze(text)
        })
        .await
        {
            Ok(score) => Some(score),
            Err(e) => {
                tracing::error!(error = %e, "Sentiment analysis failed, skipping sentiment check");
                None
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Sentiment analyzer that returns a fixed score (or error) and counts calls
    struct MockSentiment {
        score: Option<f32>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockSentiment {
        fn scoring(score: f32) -> Arc<Self> {
            Arc::new(Self {
                score: Some(score),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                score: None,
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                score: Some(-1.0),
                delay: Some(Duration::from_secs(30)),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SentimentAnalyzer for MockSentiment {
        async fn analyze(&self, _text: &str) -> Result<f32, ModerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.score
                .ok_or_else(|| ModerationError::Api("connection refused".to_string()))
        }
    }

    /// Image classifier that returns fixed labels (or error) and counts calls
    struct MockClassifier {
        labels: Option<Vec<ImageLabel>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockClassifier {
        fn returning(labels: &[(&str, f32)]) -> Arc<Self> {
            Arc::new(Self {
                labels: Some(
                    labels
                        .iter()
                        .map(|(name, confidence)| ImageLabel {
                            name: name.to_string(),
                            confidence: *confidence,
                        })
                        .collect(),
                ),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                labels: None,
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                labels: Some(Vec::new()),
                delay: Some(Duration::from_secs(30)),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ImageClassifier for MockClassifier {
        async fn detect_labels(
            &self,
            _image: &[u8],
            _min_confidence: f32,
        ) -> Result<Vec<ImageLabel>, ModerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.labels
                .clone()
                .ok_or_else(|| ModerationError::Api("AccessDeniedException".to_string()))
        }
    }

    fn config(auto_moderation: bool) -> ModerationConfig {
        ModerationConfig {
            auto_moderation,
            call_policy: CallPolicy {
                timeout: Duration::from_millis(100),
                max_retries: 0,
            },
            ..Default::default()
        }
    }

    fn service(words: &[&str], auto_moderation: bool) -> ModerationService {
        let words = Arc::new(ModerationWordList::from_words(words.iter().copied()));
        ModerationService::new(words, &config(auto_moderation))
    }

    /// A service whose external calls would only time out after 10 seconds.
    fn patient_service(words: &[&str]) -> ModerationService {
        let words = Arc::new(ModerationWordList::from_words(words.iter().copied()));
        let config = ModerationConfig {
            call_policy: CallPolicy {
                timeout: Duration::from_secs(10),
                max_retries: 1,
            },
            ..config(true)
        };
        ModerationService::new(words, &config)
    }

    /// Cancel `token` shortly after the call under test has started.
    fn cancel_soon(token: &CancellationToken) {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });
    }

    fn labels(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.label()).collect()
    }

    const IMAGE: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    // --- Text ---------------------------------------------------------------

    #[tokio::test]
    async fn test_empty_text_is_clean_without_external_calls() {
        let sentiment = MockSentiment::scoring(-1.0);
        let service = service(&["spam"], true).with_sentiment_analyzer(sentiment.clone());

        let result = service.moderate_text("").await;

        assert_eq!(result, TextModerationResult::empty());
        assert!(result.is_clean);
        assert_eq!(sentiment.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spam_and_scam_end_to_end() {
        let service = service(&["spam", "scam"], false);

        let result = service
            .moderate_text("This is not spam, but could be a scam!")
            .await;

        assert!(!result.is_clean);
        assert_eq!(labels(&result.violations), vec!["spam", "scam"]);
        assert_eq!(
            result.filtered_text,
            "This is not ****, but could be a ****!"
        );
        assert_eq!(calculate_trust_score_adjustment(&result.violations), -6);
    }

    #[tokio::test]
    async fn test_configured_mask_character() {
        let words = Arc::new(ModerationWordList::from_words(["spam"]));
        let config = ModerationConfig {
            replacement_char: '#',
            ..config(false)
        };
        let service = ModerationService::new(words, &config);

        let result = service.moderate_text("no SPAM please").await;

        assert_eq!(result.filtered_text, "no #### please");
    }

    #[tokio::test]
    async fn test_strongly_negative_sentiment_is_flagged() {
        let service = service(&[], true).with_sentiment_analyzer(MockSentiment::scoring(-0.9));

        let result = service.moderate_text("I hate everything about this").await;

        assert!(!result.is_clean);
        assert_eq!(result.violations, vec![Violation::NegativeSentiment]);
        // Sentiment never changes the text
        assert_eq!(result.filtered_text, "I hate everything about this");
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let service = service(&[], true).with_sentiment_analyzer(MockSentiment::scoring(-0.7));

        let result = service.moderate_text("meh").await;

        assert!(result.is_clean);
    }

    #[tokio::test]
    async fn test_sentiment_failure_fails_open() {
        let sentiment = MockSentiment::failing();
        let service = service(&["spam"], true).with_sentiment_analyzer(sentiment.clone());

        let result = service.moderate_text("buy spam now").await;

        // Word filter result survives, sentiment contributes nothing
        assert_eq!(labels(&result.violations), vec!["spam"]);
        assert_eq!(sentiment.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_sentiment_call_fails_open() {
        let sentiment = MockSentiment::hanging();
        let service = patient_service(&["spam"]).with_sentiment_analyzer(sentiment.clone());
        let cancel = CancellationToken::new();
        cancel_soon(&cancel);

        let started = std::time::Instant::now();
        let result = service
            .moderate_text_with_cancel("buy spam now", &cancel)
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(labels(&result.violations), vec!["spam"]);
        assert_eq!(result.filtered_text, "buy **** now");
        // Cancellation is never retried
        assert_eq!(sentiment.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sentiment_skipped_when_auto_moderation_disabled() {
        let sentiment = MockSentiment::scoring(-1.0);
        let service = service(&["spam"], false).with_sentiment_analyzer(sentiment.clone());

        let result = service.moderate_text("spam").await;

        assert_eq!(labels(&result.violations), vec!["spam"]);
        assert_eq!(sentiment.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_word_list_degrades_to_clean() {
        let service = service(&[], false);

        let result = service.moderate_text("anything goes").await;

        assert!(result.is_clean);
        assert_eq!(result.filtered_text, "anything goes");
    }

    // --- Images -------------------------------------------------------------

    #[tokio::test]
    async fn test_image_labels_become_violations() {
        let classifier =
            MockClassifier::returning(&[("Explicit Nudity", 98.5), ("Suggestive", 71.0)]);
        let service = service(&[], true).with_image_classifier(classifier);

        let result = service.moderate_image(IMAGE).await;

        assert!(!result.is_clean);
        assert_eq!(
            result.violations,
            vec![
                Violation::ExplicitNudity,
                Violation::Unrecognized("Suggestive".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_low_confidence_labels_are_ignored() {
        let classifier = MockClassifier::returning(&[("Hate Symbols", 59.9), ("Drugs", 60.0)]);
        let service = service(&[], true).with_image_classifier(classifier);

        let result = service.moderate_image(IMAGE).await;

        assert_eq!(labels(&result.violations), vec!["Drugs"]);
    }

    #[tokio::test]
    async fn test_image_classifier_error_fails_open() {
        let classifier = MockClassifier::failing();
        let service = service(&[], true).with_image_classifier(classifier.clone());

        let result = service.moderate_image(IMAGE).await;

        assert_eq!(result, ImageModerationResult::clean());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_image_classifier_timeout_fails_open() {
        let service = service(&[], true).with_image_classifier(MockClassifier::hanging());

        let result = service.moderate_image(IMAGE).await;

        assert!(result.is_clean);
    }

    #[tokio::test]
    async fn test_cancelled_image_check_fails_open() {
        let classifier = MockClassifier::hanging();
        let service = service(&[], true).with_image_classifier(classifier);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = service.moderate_image_with_cancel(IMAGE, &cancel).await;

        assert!(result.is_clean);
    }

    #[tokio::test]
    async fn test_cancel_during_image_call_fails_open() {
        let classifier = MockClassifier::hanging();
        let service = patient_service(&[]).with_image_classifier(classifier.clone());
        let cancel = CancellationToken::new();
        cancel_soon(&cancel);

        let started = std::time::Instant::now();
        let result = service.moderate_image_with_cancel(IMAGE, &cancel).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(result, ImageModerationResult::clean());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_content_check_keeps_word_filter() {
        let service = patient_service(&["scam"])
            .with_sentiment_analyzer(MockSentiment::hanging())
            .with_image_classifier(MockClassifier::hanging());
        let cancel = CancellationToken::new();
        cancel_soon(&cancel);

        let started = std::time::Instant::now();
        let report = service
            .moderate_content_with_cancel(Some("total scam"), Some(IMAGE), &cancel)
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(labels(&report.violations), vec!["scam"]);
        assert_eq!(report.trust_score_adjustment, -3);
        assert!(report.image.as_ref().is_some_and(|i| i.is_clean));
    }

    #[tokio::test]
    async fn test_auto_moderation_gate_skips_classifier() {
        let classifier = MockClassifier::returning(&[("Hate Symbols", 99.0)]);
        let service = service(&[], false).with_image_classifier(classifier.clone());

        let result = service.moderate_image(IMAGE).await;

        assert!(result.is_clean);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_classifier_or_empty_image_is_clean() {
        let service_without = service(&[], true);
        assert!(service_without.moderate_image(IMAGE).await.is_clean);

        let classifier = MockClassifier::returning(&[("Hate Symbols", 99.0)]);
        let service_with = service(&[], true).with_image_classifier(classifier.clone());
        assert!(service_with.moderate_image(&[]).await.is_clean);
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 0);
    }

    // --- Combined -----------------------------------------------------------

    #[tokio::test]
    async fn test_content_report_merges_text_then_image() {
        let service = service(&["scam"], true)
            .with_sentiment_analyzer(MockSentiment::scoring(-0.95))
            .with_image_classifier(MockClassifier::returning(&[("Hate Symbols", 88.0)]));

        let report = service
            .moderate_content(Some("total scam"), Some(IMAGE))
            .await;

        assert!(!report.is_clean());
        assert_eq!(
            labels(&report.violations),
            vec!["scam", "negative_sentiment", "Hate Symbols"]
        );
        assert_eq!(report.trust_score_adjustment, -3 - 5 - 20);
        assert_eq!(
            report.text.as_ref().map(|t| t.filtered_text.as_str()),
            Some("total ****")
        );
    }

    #[tokio::test]
    async fn test_content_report_without_inputs() {
        let service = service(&["scam"], true);

        let report = service.moderate_content(None, None).await;

        assert!(report.is_clean());
        assert!(report.text.is_none());
        assert!(report.image.is_none());
        assert_eq!(report.trust_score_adjustment, 0);
    }
}
