//! Credential lookup.
//!
//! Keys are resolved by name at call time and never logged in full — only
//! their presence and length. A missing or blank key is not an error here;
//! the dispatcher turns it into a per-target auth failure.

use log::{debug, warn};
use std::collections::HashMap;

/// Read-only, side-effect-free secret lookup.
pub trait CredentialStore: Send + Sync {
    /// Resolves a credential by reference (env var name in the default
    /// store). Returns None for missing or blank values.
    fn resolve(&self, credential_ref: &str) -> Option<String>;
}

/// Credential store backed by process env vars (`.env` is loaded at startup).
pub struct EnvCredentials;

impl CredentialStore for EnvCredentials {
    fn resolve(&self, credential_ref: &str) -> Option<String> {
        match std::env::var(credential_ref) {
            Ok(value) if value.trim().is_empty() => {
                warn!("Credential {} is set but blank. Check your .env file.", credential_ref);
                None
            }
            Ok(value) => {
                debug!("Credential {} loaded (length: {})", credential_ref, value.len());
                Some(value)
            }
            Err(_) => {
                warn!("Credential {} not found. Check your .env file.", credential_ref);
                None
            }
        }
    }
}

/// A fixed map makes a valid store; used for embedding and in tests.
impl CredentialStore for HashMap<String, String> {
    fn resolve(&self, credential_ref: &str) -> Option<String> {
        self.get(credential_ref)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_store_resolves_present_keys() {
        let store: HashMap<String, String> =
            [("API_KEY".to_string(), "sk-test".to_string())].into();
        assert_eq!(store.resolve("API_KEY").as_deref(), Some("sk-test"));
        assert!(store.resolve("OTHER_KEY").is_none());
    }

    #[test]
    fn test_map_store_treats_blank_as_missing() {
        let store: HashMap<String, String> =
            [("API_KEY".to_string(), "   ".to_string())].into();
        assert!(store.resolve("API_KEY").is_none());
    }
}
