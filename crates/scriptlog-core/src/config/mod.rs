//! Deployment configuration
//!
//! A single YAML file (`scriptlog.yaml` by default) with every field
//! defaulted, plus a few environment overrides for container deployments.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

#[cfg(test)]
mod tests;
