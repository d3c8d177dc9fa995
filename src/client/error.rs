//! Failure taxonomy and error classification.
//!
//! Classification is an explicit step producing one of a fixed set of kinds,
//! decoupled from whatever reqwest surfaces natively. The retry policy in
//! the transport keys off the kind, not the library error type.

use serde::Deserialize;
use std::fmt;

use crate::client::adapter::ProviderFamily;

// ============================================================================
// Taxonomy
// ============================================================================

/// Every failure an Outcome can carry is one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Request exceeded the configured timeout. Retryable.
    Timeout,
    /// TLS/SSL handshake or certificate failure. Retryable.
    TlsError,
    /// Could not reach the endpoint through the configured proxy. Retryable,
    /// with a one-shot direct-connection fallback on the first attempt.
    ProxyError,
    /// Permanent 4xx (except 429). Never retried.
    ClientError,
    /// 429 or 5xx that persisted through the retry budget.
    ServerError,
    /// Missing or blank credential. Local; no network call is made.
    AuthError,
    /// Anything unclassifiable. Retried, then surfaced with the raw text.
    UnknownError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::TlsError => "tls_error",
            FailureKind::ProxyError => "proxy_error",
            FailureKind::ClientError => "client_error",
            FailureKind::ServerError => "server_error",
            FailureKind::AuthError => "auth_error",
            FailureKind::UnknownError => "unknown_error",
        }
    }

    /// Whether the retry loop should attempt again on this kind.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout
                | FailureKind::TlsError
                | FailureKind::ProxyError
                | FailureKind::ServerError
                | FailureKind::UnknownError
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure with a human-readable message.
#[derive(Debug, Clone)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FailureKind::AuthError, message)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Failure {}

// ============================================================================
// Classification
// ============================================================================

/// Maps a transport-level reqwest error to a failure kind.
///
/// reqwest does not expose typed proxy or TLS errors, so those are matched
/// on the lowercased error text of the source chain.
pub fn classify_transport_error(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        return FailureKind::Timeout;
    }

    let mut text = err.to_string().to_lowercase();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        text.push_str(&inner.to_string().to_lowercase());
        source = inner.source();
    }
    classify_error_text(&text)
}

/// Classifies already-lowercased error text. Proxy markers are checked
/// first: a failed proxy CONNECT often mentions TLS too, and the proxy is
/// the actionable part.
fn classify_error_text(text: &str) -> FailureKind {
    if text.contains("proxy") {
        FailureKind::ProxyError
    } else if text.contains("certificate")
        || text.contains("ssl")
        || text.contains("tls")
        || text.contains("handshake")
    {
        FailureKind::TlsError
    } else {
        FailureKind::UnknownError
    }
}

/// Maps an HTTP error status to a failure kind. 429 counts as a server-side
/// (transient) condition, every other 4xx is permanent.
pub fn classify_status(status: u16) -> FailureKind {
    if status == 429 || status >= 500 {
        FailureKind::ServerError
    } else {
        FailureKind::ClientError
    }
}

// ============================================================================
// Error Envelope
// ============================================================================

/// OpenAI-style error envelope: `{"error": {"message", "code", "type"}}`.
#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

/// Builds the user-facing message for a permanent 4xx response.
///
/// Known provider sub-errors are translated into actionable guidance that
/// names the responding family; everything else surfaces the raw status
/// and body.
pub fn client_error_message(status: u16, body: &str, family: ProviderFamily) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(error) = envelope.error {
            let message = error.message.unwrap_or_default();
            let code = error
                .code
                .map(|c| match c {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_default();
            let error_type = error.error_type.unwrap_or_default();
            let haystack = format!("{} {} {}", message, code, error_type).to_lowercase();

            if haystack.contains("unsupported_country_region_territory")
                || haystack.contains("region")
                || haystack.contains("territory")
            {
                // Don't recommend the provider that just refused us
                let alternative = match family {
                    ProviderFamily::OpenRouter => {
                        "try routing the model through a different provider"
                    }
                    _ => "try the same model via OpenRouter instead",
                };
                return format!(
                    "The model is not available in your region on {} (HTTP {status}) — {alternative}",
                    family.label()
                );
            }
            if haystack.contains("request_not_allowed") || haystack.contains("not allowed") {
                return format!(
                    "The provider rejected this request as not allowed (HTTP {status}) — \
                     check that your key has access to this model and endpoint"
                );
            }
            if haystack.contains("model_not_found") || haystack.contains("does not exist") {
                return format!(
                    "The requested model was not found (HTTP {status}) — \
                     check the model identifier in the target configuration"
                );
            }
            if !message.is_empty() {
                return format!("HTTP {status}: {message}");
            }
        }
    }

    if status == 401 || status == 403 {
        return format!("HTTP {status}: request rejected — check the API key for this target");
    }

    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {body}")
    }
}
