//! Provider adapters: pure request/response shaping per backend family.
//!
//! Every supported family speaks the OpenAI chat-completions schema; what
//! differs is the auth header, optional attribution headers, and the default
//! model used when a target leaves its model blank. The family is detected
//! once per target from URL substring markers and the adapter is cached by
//! the dispatcher for the lifetime of the session.

use log::warn;
use serde::Serialize;
use serde_json::Value;

/// Sampling temperature sent with every request.
const TEMPERATURE: f64 = 0.7;

// ============================================================================
// Provider Families
// ============================================================================

/// Closed set of supported backend families. Anything without a recognized
/// URL marker is treated as generic OpenAI-compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    OpenRouter,
    OpenAi,
    DeepSeek,
    Groq,
    Compatible,
}

impl ProviderFamily {
    /// Detects the family from URL substring markers, case-insensitive.
    /// Priority: openrouter > openai > deepseek > groq > compatible.
    /// First match wins.
    pub fn detect(endpoint_url: &str) -> Self {
        let url = endpoint_url.to_lowercase();
        if url.contains("openrouter") {
            ProviderFamily::OpenRouter
        } else if url.contains("openai") {
            ProviderFamily::OpenAi
        } else if url.contains("deepseek") {
            ProviderFamily::DeepSeek
        } else if url.contains("groq") {
            ProviderFamily::Groq
        } else {
            ProviderFamily::Compatible
        }
    }

    /// Model identifier used when the target doesn't configure one.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderFamily::OpenRouter => "openai/gpt-3.5-turbo",
            ProviderFamily::OpenAi | ProviderFamily::Compatible => "gpt-3.5-turbo",
            ProviderFamily::DeepSeek => "deepseek-chat",
            ProviderFamily::Groq => "llama2-70b-4096",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProviderFamily::OpenRouter => "openrouter",
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::DeepSeek => "deepseek",
            ProviderFamily::Groq => "groq",
            ProviderFamily::Compatible => "openai-compatible",
        }
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// A single chat message in the request body.
#[derive(Serialize, Debug, Clone)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// The OpenAI-style chat completion request body shared by all families.
#[derive(Serialize, Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
}

/// Optional attribution headers some providers ask clients to send.
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    /// `HTTP-Referer` value. Empty string disables the header.
    pub referrer: String,
    /// `X-Title` value. Empty string disables the header.
    pub app_title: String,
}

// ============================================================================
// Adapter
// ============================================================================

/// Stateless request/response transformation for one provider family.
///
/// Both `build_request` and `parse_text` are pure — no I/O happens here.
#[derive(Debug, Clone)]
pub struct Adapter {
    family: ProviderFamily,
    api_key: String,
    attribution: Attribution,
}

impl Adapter {
    pub fn new(family: ProviderFamily, api_key: String, attribution: Attribution) -> Self {
        Self {
            family,
            api_key,
            attribution,
        }
    }

    pub fn family(&self) -> ProviderFamily {
        self.family
    }

    /// Builds the headers and body for one completion request.
    ///
    /// A blank `model` falls back to the family default.
    pub fn build_request(&self, prompt: &str, model: &str) -> (Vec<(&'static str, String)>, ChatRequest) {
        let model = if model.trim().is_empty() {
            self.family.default_model().to_string()
        } else {
            model.to_string()
        };

        let mut headers = vec![
            ("Authorization", format!("Bearer {}", self.api_key.trim())),
            ("Content-Type", "application/json".to_string()),
        ];

        // OpenRouter asks clients to identify themselves; both headers are
        // optional on their side and configurable on ours.
        if self.family == ProviderFamily::OpenRouter {
            if !self.attribution.referrer.is_empty() {
                headers.push(("HTTP-Referer", self.attribution.referrer.clone()));
            }
            if !self.attribution.app_title.is_empty() {
                headers.push(("X-Title", self.attribution.app_title.clone()));
            }
        }

        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: TEMPERATURE,
        };

        (headers, body)
    }

    /// Extracts the answer text from a completion response body.
    ///
    /// Reads `choices[0].message.content`. A 200 body without it yields an
    /// empty string and a warning, not a failure — the round treats it as an
    /// empty answer.
    pub fn parse_text(body: &Value) -> String {
        match body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
        {
            Some(text) => text.to_string(),
            None => {
                warn!("Response body has no choices[0].message.content, treating as empty answer");
                String::new()
            }
        }
    }
}
