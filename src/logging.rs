//! # Structured Logging Module
//!
//! Environment-aware `tracing` subscriber setup plus the structured audit
//! records emitted when a request settles.

use crate::state_machine::RequestState;
use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// `RUST_LOG` wins when set; otherwise the level follows
/// `ROUTE_ORCHESTRATOR_ENV`. `ROUTE_ORCHESTRATOR_LOG_FORMAT=json` switches
/// the console layer to JSON lines. Safe to call repeatedly and alongside a
/// host-installed subscriber.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let console_layer = if json_output_requested() {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(console_layer.with_filter(filter));

        // Use try_init to avoid panic if global subscriber already set
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            version = crate::constants::system::ROUTE_ORCHESTRATOR_VERSION,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("ROUTE_ORCHESTRATOR_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

fn json_output_requested() -> bool {
    std::env::var("ROUTE_ORCHESTRATOR_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Partially redact an identifier: first two and last two characters kept.
/// Values of four characters or fewer are fully masked.
pub fn mask_identifier(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}***{tail}")
}

/// Audit record for a request reaching a settled state
pub fn log_state_transition(
    request_id: &str,
    event_type: &str,
    state: RequestState,
    duration_ms: i64,
    error_code: Option<&str>,
) {
    tracing::info!(
        request_id = %mask_identifier(request_id),
        event_type = %event_type,
        state = %state,
        duration_ms = duration_ms,
        error_code = error_code,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 REQUEST_TRANSITION"
    );
}

/// Log structured data for outbox operations
pub fn log_outbox_operation(
    operation: &str,
    request_id: &str,
    event_type: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        request_id = %mask_identifier(request_id),
        event_type = %event_type,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📬 OUTBOX_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
