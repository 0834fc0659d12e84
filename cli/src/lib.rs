//! CLI utilities for voicegate.
//!
//! This crate provides configuration loading and output rendering shared
//! by the voicegate binaries.

pub mod config;
pub mod output;

pub use config::{Config, DatasetConfig, load_config};
pub use output::{Output, OutputFormat};
