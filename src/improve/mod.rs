//! # Prompt improvement
//!
//! A secondary consumer of the completion client: sends a rewrite
//! instruction to one configured target and recovers a structured reply
//! from the model's free-form answer.

pub mod extractor;
pub mod improver;

pub use extractor::{extract, Adaptations, StructuredReply};
pub use improver::{ImproveError, ImproverConfig, PromptImprover};
