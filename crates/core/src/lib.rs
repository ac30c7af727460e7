//! Core domain types, error taxonomy, and configuration for the sage agent.
//!
//! Everything here is transport-agnostic: the pipeline crates (`sage-memory`,
//! `sage-sandbox`, `sage-agent`) and the interface crates (`sage-server`,
//! `sage-cli`) all depend on this crate and nothing in it depends on them.

pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::{Complexity, ExecutionResult, IntentDescriptor, InteractionRecord};
pub use errors::{MemoryError, ToolError};
