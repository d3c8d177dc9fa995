//! Target registry: the set of configured provider endpoints.
//!
//! The dispatcher only ever reads targets through the [`TargetRegistry`]
//! trait, so the backing store (TOML config here, a database elsewhere) can
//! change without touching the dispatch path.

use crate::core::config::TargetEntry;

/// One configured provider endpoint the system can query.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: i64,
    pub name: String,
    pub endpoint_url: String,
    /// Name of the env var (or other store key) holding this target's API key.
    pub credential_ref: String,
    /// Model identifier for the API. Blank/absent falls back to `name`.
    pub model: Option<String>,
    pub active: bool,
}

impl Target {
    /// The model identifier actually sent to the API: the explicit `model`
    /// if non-blank, otherwise the target's display name.
    pub fn effective_model(&self) -> &str {
        match &self.model {
            Some(m) if !m.trim().is_empty() => m,
            _ => &self.name,
        }
    }
}

/// Read-only view over the configured targets.
pub trait TargetRegistry: Send + Sync {
    /// All active targets, in registry order. The dispatcher preserves this
    /// order in its results and never re-sorts.
    fn list_active(&self) -> Vec<Target>;

    /// Looks up a single target by id, active or not.
    fn get(&self, id: i64) -> Option<Target>;
}

/// Registry backed by the `[[targets]]` tables of the config file.
///
/// Targets are sorted by name and given sequential ids at load time, so the
/// iteration order is stable across rounds within a session.
pub struct ConfigRegistry {
    targets: Vec<Target>,
}

impl ConfigRegistry {
    pub fn from_entries(entries: &[TargetEntry]) -> Self {
        let mut sorted: Vec<&TargetEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let targets = sorted
            .into_iter()
            .enumerate()
            .map(|(i, entry)| Target {
                id: i as i64 + 1,
                name: entry.name.clone(),
                endpoint_url: entry.url.clone(),
                credential_ref: entry.credential.clone(),
                model: entry.model.clone(),
                active: entry.active.unwrap_or(true),
            })
            .collect();

        Self { targets }
    }

    /// Builds a registry from already-materialized targets (tests, embedding).
    pub fn from_targets(targets: Vec<Target>) -> Self {
        Self { targets }
    }
}

impl TargetRegistry for ConfigRegistry {
    fn list_active(&self) -> Vec<Target> {
        self.targets.iter().filter(|t| t.active).cloned().collect()
    }

    fn get(&self, id: i64) -> Option<Target> {
        self.targets.iter().find(|t| t.id == id).cloned()
    }
}
