//! Prompt improvement: asks one configured model to rewrite a prompt and
//! recovers a structured reply from whatever it answers.
//!
//! This is just another consumer of the completion dispatcher — it sends to
//! a single named target instead of fanning out.

use log::{info, warn};
use std::fmt;

use crate::client::dispatcher::CompletionDispatcher;
use crate::improve::extractor::{extract, StructuredReply};

// ============================================================================
// Configuration & Errors
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ImproverConfig {
    pub enabled: bool,
    /// Name of the registry target used for improvement requests.
    pub target: Option<String>,
}

#[derive(Debug)]
pub enum ImproveError {
    /// The feature is switched off in the config.
    Disabled,
    /// No improvement target configured.
    NoTarget,
    /// The configured target name matches no active target.
    UnknownTarget(String),
    /// The completion round failed; carries the outcome's message.
    Request(String),
    /// The model answered with empty text.
    EmptyReply,
}

impl fmt::Display for ImproveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImproveError::Disabled => {
                write!(f, "prompt improvement is disabled in the configuration")
            }
            ImproveError::NoTarget => write!(
                f,
                "no improvement target configured — set [improver] target in the config"
            ),
            ImproveError::UnknownTarget(name) => {
                write!(f, "improvement target {name:?} matches no active target")
            }
            ImproveError::Request(message) => write!(f, "improvement request failed: {message}"),
            ImproveError::EmptyReply => write!(f, "the model returned an empty reply"),
        }
    }
}

impl std::error::Error for ImproveError {}

// ============================================================================
// Improver
// ============================================================================

pub struct PromptImprover {
    config: ImproverConfig,
}

impl PromptImprover {
    pub fn new(config: ImproverConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// The instruction sent to the model: rewrite the prompt and answer in a
    /// fixed JSON shape. The extractor copes when the model ignores the shape.
    pub fn instruction_prompt(original_prompt: &str) -> String {
        format!(
            r#"You are an expert at improving prompts for AI models. Improve the following prompt, making it clearer, more specific and more effective.

Original prompt:
{original_prompt}

Reply in exactly this JSON format:
{{
    "improved": "the improved version of the prompt",
    "alternatives": [
        "a first alternative phrasing",
        "a second alternative phrasing",
        "a third alternative phrasing"
    ],
    "adaptations": {{
        "code": "a version tuned for programming tasks",
        "analysis": "a version tuned for analytical tasks",
        "creative": "a version tuned for creative tasks"
    }}
}}

If the original prompt is already good, you may keep it almost unchanged, but still provide the alternatives and adaptations."#
        )
    }

    /// Improves `original_prompt` using the configured target.
    pub async fn improve(
        &self,
        dispatcher: &mut CompletionDispatcher,
        original_prompt: &str,
    ) -> Result<StructuredReply, ImproveError> {
        if !self.config.enabled {
            return Err(ImproveError::Disabled);
        }

        let name = self
            .config
            .target
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ImproveError::NoTarget)?;

        let target = dispatcher
            .registry()
            .list_active()
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ImproveError::UnknownTarget(name.to_string()))?;

        info!("Improving prompt via target {}", target.name);
        let outcome = dispatcher
            .dispatch_to(&Self::instruction_prompt(original_prompt), &target)
            .await;

        if !outcome.success {
            let message = outcome
                .error
                .map(|f| f.message)
                .unwrap_or_else(|| "unknown failure".to_string());
            return Err(ImproveError::Request(message));
        }
        if outcome.text.trim().is_empty() {
            warn!("Improvement target {} returned empty text", target.name);
            return Err(ImproveError::EmptyReply);
        }

        Ok(extract(&outcome.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::adapter::Attribution;
    use crate::client::transport::{Transport, TransportConfig};
    use crate::core::registry::ConfigRegistry;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn dispatcher() -> CompletionDispatcher {
        CompletionDispatcher::new(
            Arc::new(ConfigRegistry::from_targets(vec![])),
            Arc::new(HashMap::<String, String>::new()),
            Transport::new(TransportConfig::default()),
            Attribution::default(),
        )
    }

    #[test]
    fn test_instruction_prompt_embeds_original() {
        let prompt = PromptImprover::instruction_prompt("translate this text");
        assert!(prompt.contains("translate this text"));
        assert!(prompt.contains("\"improved\""));
        assert!(prompt.contains("\"alternatives\""));
        assert!(prompt.contains("\"adaptations\""));
    }

    #[tokio::test]
    async fn test_disabled_improver_errors_without_dispatch() {
        let improver = PromptImprover::new(ImproverConfig {
            enabled: false,
            target: Some("x".to_string()),
        });
        let result = improver.improve(&mut dispatcher(), "p").await;
        assert!(matches!(result, Err(ImproveError::Disabled)));
    }

    #[tokio::test]
    async fn test_missing_target_config_errors() {
        let improver = PromptImprover::new(ImproverConfig {
            enabled: true,
            target: None,
        });
        let result = improver.improve(&mut dispatcher(), "p").await;
        assert!(matches!(result, Err(ImproveError::NoTarget)));

        let improver = PromptImprover::new(ImproverConfig {
            enabled: true,
            target: Some("  ".to_string()),
        });
        let result = improver.improve(&mut dispatcher(), "p").await;
        assert!(matches!(result, Err(ImproveError::NoTarget)));
    }

    #[tokio::test]
    async fn test_unknown_target_errors_with_name() {
        let improver = PromptImprover::new(ImproverConfig {
            enabled: true,
            target: Some("ghost".to_string()),
        });
        let result = improver.improve(&mut dispatcher(), "p").await;
        match result {
            Err(ImproveError::UnknownTarget(name)) => assert_eq!(name, "ghost"),
            other => panic!("expected UnknownTarget, got {other:?}"),
        }
    }
}
