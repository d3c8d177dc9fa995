//! # Completion client
//!
//! The multi-provider completion core: provider adapters, the resilient
//! transport, the failure taxonomy, and the dispatcher that fans one prompt
//! out to every active target.

pub mod adapter;
pub mod dispatcher;
pub mod error;
pub mod transport;

pub use adapter::{Adapter, Attribution, ProviderFamily};
pub use dispatcher::{CompletionDispatcher, Outcome};
pub use error::{Failure, FailureKind};
pub use transport::{CallSuccess, Transport, TransportConfig, MAX_ATTEMPTS};
