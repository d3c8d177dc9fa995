//! Resilient HTTP transport.
//!
//! Executes one completion POST with a bounded retry loop. Recoverable
//! conditions (timeouts, 429/5xx, TLS glitches, proxy misconfiguration) are
//! retried with a linear backoff; permanent ones (4xx except 429) are
//! surfaced immediately. The transport never propagates a library error to
//! the caller — every exit is a parsed success or a classified [`Failure`].

use log::{debug, info, warn};
use serde_json::Value;
use std::time::Duration;

use crate::client::adapter::Adapter;
use crate::client::error::{
    classify_status, classify_transport_error, client_error_message, Failure, FailureKind,
};

/// Maximum attempts per call, proxy fallback excluded.
pub const MAX_ATTEMPTS: u32 = 3;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Certificate verification. Turning this off is a diagnostic escape
    /// hatch (corporate VPNs, broken cert stores) and is warn-logged.
    pub verify_tls: bool,
    /// Proxy opt-in. Off means a direct connection regardless of system or
    /// environment proxy settings, which are a common source of spurious
    /// connection failures.
    pub use_proxy: bool,
    /// Base backoff delay; the wait before attempt N+1 is `base * N`.
    pub retry_base_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            verify_tls: true,
            use_proxy: false,
            retry_base_delay: Duration::from_secs(2),
        }
    }
}

/// A parsed 2xx response: the answer text plus the raw body.
#[derive(Debug, Clone)]
pub struct CallSuccess {
    pub text: String,
    pub raw: Value,
}

// ============================================================================
// Transport
// ============================================================================

pub struct Transport {
    config: TransportConfig,
    /// Built lazily on first use and reused across calls and retries.
    /// Rebuilt only when the proxy policy flips mid-session.
    client: Option<reqwest::Client>,
    /// Set after a proxy connection failure; forces direct connections for
    /// the rest of the session.
    proxy_disabled: bool,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        if !config.verify_tls {
            warn!(
                "TLS certificate verification is DISABLED — all completion \
                 traffic is exposed to interception"
            );
        }
        Self {
            config,
            client: None,
            proxy_disabled: false,
        }
    }

    fn client(&mut self) -> Result<reqwest::Client, Failure> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT);

        if !self.config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if !self.config.use_proxy || self.proxy_disabled {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(|e| {
            Failure::new(
                FailureKind::UnknownError,
                format!("failed to build HTTP client: {e}"),
            )
        })?;
        self.client = Some(client.clone());
        Ok(client)
    }

    /// Executes one completion call against `endpoint_url`.
    ///
    /// Retries recoverable failures up to [`MAX_ATTEMPTS`] times with a
    /// linear backoff (`retry_base_delay * attempt`). A proxy connection
    /// failure on the first attempt disables proxying for the session and
    /// retries immediately without consuming an attempt.
    pub async fn execute(
        &mut self,
        endpoint_url: &str,
        adapter: &Adapter,
        prompt: &str,
        model: &str,
    ) -> Result<CallSuccess, Failure> {
        let (headers, body) = adapter.build_request(prompt, model);
        info!(
            "Sending request to {} endpoint {} (model: {})",
            adapter.family().label(),
            endpoint_url,
            body.model
        );

        let mut attempt: u32 = 1;
        let mut last_kind = FailureKind::UnknownError;
        let mut last_detail = String::new();

        loop {
            let client = self.client()?;
            let mut request = client.post(endpoint_url);
            for (name, value) in &headers {
                request = request.header(*name, value.as_str());
            }

            match request.json(&body).send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!("Response status from {}: {}", endpoint_url, status);

                    if status.is_success() {
                        let raw = response.json::<Value>().await.unwrap_or_else(|e| {
                            warn!("Response body is not valid JSON: {e}");
                            Value::Null
                        });
                        let text = Adapter::parse_text(&raw);
                        info!(
                            "Completion received from {} ({} chars)",
                            endpoint_url,
                            text.len()
                        );
                        return Ok(CallSuccess { text, raw });
                    }

                    let code = status.as_u16();
                    let response_body = response.text().await.unwrap_or_default();
                    match classify_status(code) {
                        FailureKind::ClientError => {
                            warn!("Permanent HTTP {} from {}: {}", code, endpoint_url, response_body);
                            return Err(Failure::new(
                                FailureKind::ClientError,
                                client_error_message(code, &response_body, adapter.family()),
                            ));
                        }
                        _ => {
                            last_kind = FailureKind::ServerError;
                            last_detail = code.to_string();
                            warn!(
                                "Transient HTTP {} from {} (attempt {}/{})",
                                code, endpoint_url, attempt, MAX_ATTEMPTS
                            );
                        }
                    }
                }
                Err(err) => {
                    let kind = classify_transport_error(&err);
                    if kind == FailureKind::ProxyError && attempt == 1 && !self.proxy_disabled {
                        warn!(
                            "Proxy connection failed ({err}); falling back to a \
                             direct connection for this session"
                        );
                        self.proxy_disabled = true;
                        self.client = None;
                        continue; // does not consume an attempt
                    }
                    last_kind = kind;
                    last_detail = err.to_string();
                    warn!(
                        "Request to {} failed ({}, attempt {}/{}): {}",
                        endpoint_url, kind, attempt, MAX_ATTEMPTS, err
                    );
                }
            }

            if attempt >= MAX_ATTEMPTS {
                return Err(exhausted_failure(last_kind, &last_detail, &self.config));
            }

            let delay = self.config.retry_base_delay * attempt;
            debug!("Backing off {:?} before attempt {}", delay, attempt + 1);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Builds the final failure after the retry budget is spent.
fn exhausted_failure(kind: FailureKind, detail: &str, config: &TransportConfig) -> Failure {
    let message = match kind {
        FailureKind::Timeout => format!(
            "Request timed out after {} attempts ({}s each) — the endpoint \
             may be overloaded or unreachable",
            MAX_ATTEMPTS,
            config.timeout.as_secs()
        ),
        FailureKind::TlsError => format!(
            "TLS handshake failed after {} attempts — possible causes: an \
             unstable network connection, a firewall or VPN intercepting \
             traffic, an outdated certificate store, or a server-side TLS \
             problem",
            MAX_ATTEMPTS
        ),
        FailureKind::ProxyError => "Could not reach the endpoint through the configured proxy — \
             check the proxy settings or disable proxy usage"
            .to_string(),
        FailureKind::ServerError => format!(
            "Server error (HTTP {}) persisted after {} attempts — the \
             provider may be having an outage, try again later",
            detail, MAX_ATTEMPTS
        ),
        _ => format!("Unexpected error after {} attempts: {}", MAX_ATTEMPTS, detail),
    };
    Failure::new(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.verify_tls);
        assert!(!config.use_proxy);
        assert_eq!(config.retry_base_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_exhausted_messages_name_the_condition() {
        let config = TransportConfig::default();
        let timeout = exhausted_failure(FailureKind::Timeout, "", &config);
        assert_eq!(timeout.kind, FailureKind::Timeout);
        assert!(timeout.message.contains("timed out"));
        assert!(timeout.message.contains("30s"));

        let tls = exhausted_failure(FailureKind::TlsError, "", &config);
        assert!(tls.message.contains("firewall"));
        assert!(tls.message.contains("certificate"));

        let server = exhausted_failure(FailureKind::ServerError, "503", &config);
        assert!(server.message.contains("503"));

        let unknown = exhausted_failure(FailureKind::UnknownError, "boom", &config);
        assert!(unknown.message.contains("boom"));
    }
}
