//! # Core
//!
//! Configuration and the two consumed interfaces: the target registry and
//! the credential store. It knows nothing about HTTP or any specific
//! provider — the `client` module builds on these seams.
//!
//! ## Modules
//!
//! - [`config`]: TOML config file + defaults/env/CLI resolution
//! - [`registry`]: `Target` and the `TargetRegistry` trait
//! - [`credentials`]: the `CredentialStore` trait and the env-backed store

pub mod config;
pub mod credentials;
pub mod registry;

pub use credentials::{CredentialStore, EnvCredentials};
pub use registry::{ConfigRegistry, Target, TargetRegistry};
