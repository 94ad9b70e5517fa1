// Entry point of the `moderate` tool.
//
// Reads newline-delimited moderation requests from stdin and prints one JSON
// report per line. A line is either plain text, or a JSON object:
//
//   {"userId": 42, "text": "hello", "imagePath": "upload.png"}
//
// When `userId` is present the report's trust-score adjustment is applied to
// that user's ledger and the new score is included in the output.
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Pump stdin through the moderation service

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use stream_moderation::core::moderation::{
    ContentModerationReport, ModerationConfig, ModerationService, ModerationWordList,
};
use stream_moderation::core::trust::{TrustScoreService, TrustStore};
use stream_moderation::infra::moderation::{load_word_list, GoogleNlpClient, RekognitionClient};
use stream_moderation::infra::trust::{InMemoryTrustStore, SqliteTrustStore};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Conventional exit status for a process stopped by SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModerationRequest {
    user_id: Option<u64>,
    text: Option<String>,
    image_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModerationOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<u64>,
    #[serde(flatten)]
    report: ContentModerationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    trust_score: Option<i32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = ModerationConfig::from_env();

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================

    let words = match &config.word_list_path {
        Some(path) => load_word_list(path),
        None => {
            tracing::warn!("MODERATION_WORD_LIST_PATH not set, word filtering disabled");
            ModerationWordList::empty()
        }
    };

    let mut moderation = ModerationService::new(Arc::new(words), &config);

    if let Some(api_key) = config.google_api_key.clone() {
        moderation = moderation.with_sentiment_analyzer(Arc::new(GoogleNlpClient::new(api_key)));
    }
    if let Some(aws) = config.aws.clone() {
        match RekognitionClient::new(aws) {
            Ok(client) => moderation = moderation.with_image_classifier(Arc::new(client)),
            Err(e) => tracing::warn!("Image moderation disabled: {}", e),
        }
    }

    tracing::info!(
        auto_moderation = moderation.auto_moderation_enabled(),
        words = moderation.word_list().len(),
        "Moderation service ready"
    );

    let trust_store: Box<dyn TrustStore> = match &config.trust_db_path {
        Some(path) => Box::new(
            SqliteTrustStore::new(path)
                .await
                .context("Failed to open trust database")?,
        ),
        None => {
            tracing::info!("TRUST_DB_PATH not set, trust scores are kept in memory");
            Box::new(InMemoryTrustStore::new())
        }
    };
    let trust = TrustScoreService::new(trust_store);

    // Ctrl-C abandons in-flight classifier calls instead of waiting them out
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling in-flight moderation calls");
            signal_token.cancel();
        }
    });

    // ========================================================================
    // REQUEST LOOP
    // ========================================================================

    let stdout = std::io::stdout();
    run_requests(
        BufReader::new(tokio::io::stdin()),
        &mut stdout.lock(),
        &moderation,
        &trust,
        &shutdown,
    )
    .await?;

    if shutdown.is_cancelled() {
        // The pending stdin read runs on a blocking thread that runtime
        // shutdown would wait on, so leave without dropping the runtime.
        std::process::exit(EXIT_INTERRUPTED);
    }

    Ok(())
}

/// Moderate one request per input line until EOF or until `shutdown` fires.
///
/// Waiting for the next line races the token, so an interrupt is honoured
/// even while no input is arriving.
async fn run_requests<R, W, S>(
    reader: R,
    out: &mut W,
    moderation: &ModerationService,
    trust: &TrustScoreService<S>,
    shutdown: &CancellationToken,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    S: TrustStore,
{
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        let request = parse_request(&line);
        let output = handle_request(moderation, trust, request, shutdown).await;
        writeln!(out, "{}", serde_json::to_string(&output)?)?;
        out.flush()?;
    }

    Ok(())
}

/// JSON objects are requests; anything else is plain text.
fn parse_request(line: &str) -> ModerationRequest {
    if line.trim_start().starts_with('{') {
        match serde_json::from_str(line) {
            Ok(request) => return request,
            Err(e) => tracing::warn!("Treating line as plain text, not a valid request: {}", e),
        }
    }

    ModerationRequest {
        user_id: None,
        text: Some(line.to_string()),
        image_path: None,
    }
}

async fn handle_request<S: TrustStore>(
    moderation: &ModerationService,
    trust: &TrustScoreService<S>,
    request: ModerationRequest,
    cancel: &CancellationToken,
) -> ModerationOutput {
    let image = match &request.image_path {
        Some(path) => match tokio::fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!(path = %path.display(), "Failed to read image: {}", e);
                None
            }
        },
        None => None,
    };

    let report = moderation
        .moderate_content_with_cancel(request.text.as_deref(), image.as_deref(), cancel)
        .await;

    let mut trust_score = None;
    if let Some(user_id) = request.user_id {
        match trust.apply_violations(user_id, &report.violations).await {
            Ok(record) => trust_score = Some(record.score),
            Err(e) => tracing::error!(user_id, "Failed to update trust score: {}", e),
        }
    }

    ModerationOutput {
        user_id: request.user_id,
        report,
        trust_score,
    }
}
