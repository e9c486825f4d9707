//! Core of the message relay: validated config, routing, forwarding and the
//! service lifecycle.
//!
//! Platform specifics live behind [`messaging::port::MessagingPort`] and the
//! [`lifecycle::Service`] trait, implemented in adapter crates.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod forward;
pub mod health;
pub mod lifecycle;
pub mod logging;
pub mod messaging;
pub mod routing;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
