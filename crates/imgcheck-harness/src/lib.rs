//! The deployment-harness contract: apply configuration, verify
//! config-driven service restarts, pause and resume services.
//!
//! The harness talks to the deployment's control plane over HTTP. All
//! waiting lives here, behind a bounded attempts-times-delay polling
//! policy; callers see either success or a timeout error.

pub mod client;
pub mod error;
mod verify;

pub use client::HarnessClient;
pub use error::HarnessError;
