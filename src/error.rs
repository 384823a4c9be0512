//! Error taxonomy for the ingestion and reporting pipeline.
//!
//! None of these errors is fatal: the poller logs them and moves on to the
//! next cycle, and the narrative reporter turns them into a fixed fallback.

use thiserror::Error;

/// Recoverable failures raised by the pipeline's outbound calls.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upstream feed unreachable, non-2xx or non-JSON.
    #[error("FetchFailed: {0}")]
    FetchFailed(String),

    /// Geolocation call failed or returned unusable data.
    #[error("LookupFailed for {host}: {reason}")]
    LookupFailed { host: String, reason: String },

    /// Narrative text-completion collaborator failed.
    #[error("GenerationFailed: {0}")]
    GenerationFailed(String),
}

impl PipelineError {
    pub fn lookup(host: &str, reason: impl Into<String>) -> Self {
        PipelineError::LookupFailed {
            host: host.to_string(),
            reason: reason.into(),
        }
    }

    /// Taxonomy name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::FetchFailed(_) => "FetchFailed",
            PipelineError::LookupFailed { .. } => "LookupFailed",
            PipelineError::GenerationFailed(_) => "GenerationFailed",
        }
    }
}

/// Map a reqwest transport error to a readable reason, the same way for every
/// collaborator.
pub fn describe_transport_error(e: &reqwest::Error, timeout_seconds: u64) -> String {
    if e.is_timeout() {
        format!("request timed out after {}s", timeout_seconds)
    } else if e.is_connect() {
        format!("cannot connect: {}", e)
    } else {
        format!("failed to send request: {}", e)
    }
}

/// Longest slice of an error response body kept in an error message.
pub const MAX_ERROR_BODY_CHARS: usize = 200;

/// Trim an error response body to a loggable length.
pub fn truncate_body(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}... ({} bytes total)", &body[..cut], body.len()),
        None => body.to_string(),
    }
}
