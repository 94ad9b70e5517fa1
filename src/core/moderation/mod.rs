// Core moderation module - word filtering, classifier ports and the trust-score policy.
// Following the same pattern as the trust module: models, service, and pure helpers.

pub mod external_call;
pub mod moderation_config;
pub mod moderation_models;
pub mod moderation_service;
pub mod text_filter;
pub mod trust_policy;
pub mod word_list;

pub use external_call::CallPolicy;
pub use moderation_config::{AwsSettings, ModerationConfig};
pub use moderation_models::*;
pub use moderation_service::*;
pub use text_filter::{filter_words, WordFilterOutcome};
pub use trust_policy::{adjustment_for_labels, calculate_trust_score_adjustment};
pub use word_list::ModerationWordList;
