//! Completion dispatcher: one prompt in, one classified outcome per target.
//!
//! Targets are processed one at a time, in registry order. A slow or failing
//! target never aborts the round — its failure is contained in its own
//! outcome. The full list is returned only after every target was attempted.

use log::{error, info};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::client::adapter::{Adapter, Attribution, ProviderFamily};
use crate::client::error::Failure;
use crate::client::transport::Transport;
use crate::core::credentials::CredentialStore;
use crate::core::registry::{Target, TargetRegistry};

// ============================================================================
// Outcome
// ============================================================================

/// The result of querying one target: success with plain answer text, or a
/// classified failure. Exactly one per target per round.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub target_id: i64,
    pub target_name: String,
    pub success: bool,
    pub text: String,
    pub error: Option<Failure>,
    pub raw_response: Option<Value>,
}

impl Outcome {
    fn success(target: &Target, text: String, raw: Value) -> Self {
        Self {
            target_id: target.id,
            target_name: target.name.clone(),
            success: true,
            text,
            error: None,
            raw_response: Some(raw),
        }
    }

    fn failure(target: &Target, failure: Failure) -> Self {
        Self {
            target_id: target.id,
            target_name: target.name.clone(),
            success: false,
            text: String::new(),
            error: Some(failure),
            raw_response: None,
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Fans one prompt out to every active target and aggregates the outcomes.
///
/// Owns an adapter cache keyed by target id so credential resolution and
/// family detection happen once per target per session. The cache is only
/// invalidated explicitly via [`clear_cache`](Self::clear_cache).
pub struct CompletionDispatcher {
    registry: Arc<dyn TargetRegistry>,
    credentials: Arc<dyn CredentialStore>,
    transport: Transport,
    attribution: Attribution,
    adapters: HashMap<i64, Adapter>,
}

impl CompletionDispatcher {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        credentials: Arc<dyn CredentialStore>,
        transport: Transport,
        attribution: Attribution,
    ) -> Self {
        Self {
            registry,
            credentials,
            transport,
            attribution,
            adapters: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<dyn TargetRegistry> {
        &self.registry
    }

    /// Sends `prompt` to every active target, sequentially, in registry
    /// order. Zero active targets yields an empty list, not an error.
    pub async fn dispatch(&mut self, prompt: &str) -> Vec<Outcome> {
        let targets = self.registry.list_active();
        info!("Dispatching prompt to {} active targets", targets.len());

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in &targets {
            outcomes.push(self.dispatch_to(prompt, target).await);
        }
        outcomes
    }

    /// Sends `prompt` to a single target. Always returns an outcome; every
    /// failure mode is classified, nothing propagates.
    pub async fn dispatch_to(&mut self, prompt: &str, target: &Target) -> Outcome {
        let adapter = match self.adapter_for(target) {
            Ok(adapter) => adapter,
            Err(failure) => {
                error!("Target {} unavailable: {}", target.name, failure);
                return Outcome::failure(target, failure);
            }
        };

        let model = target.effective_model().to_string();
        match self
            .transport
            .execute(&target.endpoint_url, &adapter, prompt, &model)
            .await
        {
            Ok(call) => Outcome::success(target, call.text, call.raw),
            Err(failure) => {
                error!("Target {} failed: {}", target.name, failure);
                Outcome::failure(target, failure)
            }
        }
    }

    /// Returns the cached adapter for a target, building it on first use.
    /// A missing or blank credential fails here, before any network I/O,
    /// and is never cached.
    fn adapter_for(&mut self, target: &Target) -> Result<Adapter, Failure> {
        if let Some(adapter) = self.adapters.get(&target.id) {
            return Ok(adapter.clone());
        }

        let api_key = self
            .credentials
            .resolve(&target.credential_ref)
            .ok_or_else(|| {
                Failure::auth(format!(
                    "No credential found for {} — set the {} environment variable",
                    target.name, target.credential_ref
                ))
            })?;

        let family = ProviderFamily::detect(&target.endpoint_url);
        info!(
            "Target {} resolved to {} family",
            target.name,
            family.label()
        );
        let adapter = Adapter::new(family, api_key, self.attribution.clone());
        self.adapters.insert(target.id, adapter.clone());
        Ok(adapter)
    }

    /// Drops all cached adapters. Call after target configuration changes.
    pub fn clear_cache(&mut self) {
        self.adapters.clear();
        info!("Adapter cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::TransportConfig;
    use crate::core::registry::ConfigRegistry;

    fn target(id: i64, name: &str) -> Target {
        Target {
            id,
            name: name.to_string(),
            endpoint_url: "https://api.example.com/v1/chat/completions".to_string(),
            credential_ref: "EXAMPLE_KEY".to_string(),
            model: None,
            active: true,
        }
    }

    fn dispatcher(credentials: HashMap<String, String>) -> CompletionDispatcher {
        let registry = ConfigRegistry::from_targets(vec![target(1, "a")]);
        CompletionDispatcher::new(
            Arc::new(registry),
            Arc::new(credentials),
            Transport::new(TransportConfig::default()),
            Attribution::default(),
        )
    }

    #[test]
    fn test_adapter_cache_hit_skips_credential_resolution() {
        let creds: HashMap<String, String> =
            [("EXAMPLE_KEY".to_string(), "sk-1".to_string())].into();
        let mut dispatcher = dispatcher(creds);
        let t = target(1, "a");

        assert!(dispatcher.adapter_for(&t).is_ok());
        assert_eq!(dispatcher.adapters.len(), 1);

        // Cached adapter survives even if the credential disappears
        dispatcher.credentials = Arc::new(HashMap::<String, String>::new());
        assert!(dispatcher.adapter_for(&t).is_ok());

        dispatcher.clear_cache();
        assert!(dispatcher.adapter_for(&t).is_err());
    }

    #[test]
    fn test_missing_credential_is_auth_failure_and_not_cached() {
        let mut dispatcher = dispatcher(HashMap::new());
        let t = target(1, "a");

        let failure = dispatcher.adapter_for(&t).unwrap_err();
        assert_eq!(failure.kind, crate::client::error::FailureKind::AuthError);
        assert!(failure.message.contains("EXAMPLE_KEY"));
        assert!(dispatcher.adapters.is_empty());
    }

    #[tokio::test]
    async fn test_zero_targets_yields_empty_list() {
        let registry = ConfigRegistry::from_targets(vec![]);
        let mut dispatcher = CompletionDispatcher::new(
            Arc::new(registry),
            Arc::new(HashMap::<String, String>::new()),
            Transport::new(TransportConfig::default()),
            Attribution::default(),
        );
        assert!(dispatcher.dispatch("hello").await.is_empty());
    }
}
