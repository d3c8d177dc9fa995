//! Promptcast: send one prompt to several chat-completion endpoints and
//! compare the classified outcomes.

pub mod client;
pub mod core;
pub mod improve;
