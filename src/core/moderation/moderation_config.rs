// Moderation configuration, read from environment variables.
//
// Nothing in here is fatal: a missing key just means the matching check is
// skipped, and a value that doesn't parse falls back to its default with a
// warning.

use super::external_call::CallPolicy;
use super::moderation_models::DEFAULT_REPLACEMENT_CHAR;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_REPLACEMENT_CHAR: &str = "MODERATION_REPLACEMENT_CHAR";
pub const ENV_AUTO_MODERATION: &str = "MODERATION_AUTO_MODERATION";
pub const ENV_WORD_LIST_PATH: &str = "MODERATION_WORD_LIST_PATH";
pub const ENV_EXTERNAL_TIMEOUT_MS: &str = "MODERATION_EXTERNAL_TIMEOUT_MS";
pub const ENV_EXTERNAL_RETRIES: &str = "MODERATION_EXTERNAL_RETRIES";
pub const ENV_GOOGLE_NLP_API_KEY: &str = "GOOGLE_NLP_API_KEY";
pub const ENV_AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_TRUST_DB_PATH: &str = "TRUST_DB_PATH";

const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Credentials for the image classifier (AWS Rekognition).
#[derive(Clone)]
pub struct AwsSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
}

// Keep secrets out of debug logs
impl std::fmt::Debug for AwsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSettings")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Everything the moderation pipeline can be configured with.
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// Mask character for prohibited words (`moderation.wordFilters.replacementChar`)
    pub replacement_char: char,
    /// Gate for the sentiment and image checks (`moderation.autoModeration`).
    /// The local word filter runs either way.
    pub auto_moderation: bool,
    /// Where to load the prohibited-word dictionary from
    pub word_list_path: Option<PathBuf>,
    /// Timeout and retry budget for each external call
    pub call_policy: CallPolicy,
    /// Enables the sentiment check
    pub google_api_key: Option<String>,
    /// Enables the image check
    pub aws: Option<AwsSettings>,
    /// SQLite file for trust scores; in-memory when unset
    pub trust_db_path: Option<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            replacement_char: DEFAULT_REPLACEMENT_CHAR,
            auto_moderation: false,
            word_list_path: None,
            call_policy: CallPolicy::default(),
            google_api_key: None,
            aws: None,
            trust_db_path: None,
        }
    }
}

impl ModerationConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let replacement_char = match get(ENV_REPLACEMENT_CHAR) {
            Some(value) => parse_mask_char(&value).unwrap_or_else(|| {
                tracing::warn!(
                    "{} must be a single character, got {:?}; using '{}'",
                    ENV_REPLACEMENT_CHAR,
                    value,
                    DEFAULT_REPLACEMENT_CHAR
                );
                DEFAULT_REPLACEMENT_CHAR
            }),
            None => defaults.replacement_char,
        };

        let auto_moderation = get(ENV_AUTO_MODERATION)
            .map(|v| parse_or_default(ENV_AUTO_MODERATION, &v, defaults.auto_moderation))
            .unwrap_or(defaults.auto_moderation);

        let timeout_ms = get(ENV_EXTERNAL_TIMEOUT_MS)
            .map(|v| {
                parse_or_default(
                    ENV_EXTERNAL_TIMEOUT_MS,
                    &v,
                    defaults.call_policy.timeout.as_millis() as u64,
                )
            })
            .unwrap_or(defaults.call_policy.timeout.as_millis() as u64);

        let max_retries = get(ENV_EXTERNAL_RETRIES)
            .map(|v| parse_or_default(ENV_EXTERNAL_RETRIES, &v, defaults.call_policy.max_retries))
            .unwrap_or(defaults.call_policy.max_retries);

        let aws = match (get(ENV_AWS_ACCESS_KEY_ID), get(ENV_AWS_SECRET_ACCESS_KEY)) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsSettings {
                access_key_id,
                secret_access_key,
                session_token: get(ENV_AWS_SESSION_TOKEN),
                region: get(ENV_AWS_REGION).unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            }),
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    "Only one of {} / {} is set; image moderation disabled",
                    ENV_AWS_ACCESS_KEY_ID,
                    ENV_AWS_SECRET_ACCESS_KEY
                );
                None
            }
            (None, None) => None,
        };

        Self {
            replacement_char,
            auto_moderation,
            word_list_path: get(ENV_WORD_LIST_PATH).map(PathBuf::from),
            call_policy: CallPolicy {
                timeout: Duration::from_millis(timeout_ms),
                max_retries,
            },
            google_api_key: get(ENV_GOOGLE_NLP_API_KEY),
            aws,
            trust_db_path: get(ENV_TRUST_DB_PATH),
        }
    }
}

fn parse_mask_char(value: &str) -> Option<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn parse_or_default<T>(key: &str, value: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    value.parse::<T>().unwrap_or_else(|_| {
        tracing::warn!("Invalid value {:?} for {}; using {}", value, key, default);
        default
    })
}
