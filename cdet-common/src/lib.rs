//! # cdet Common Library
//!
//! Shared code for the copyright detection services:
//! - Error types
//! - Bootstrap configuration loading (TOML file, environment, compiled defaults)

pub mod config;
pub mod error;

pub use error::{Error, Result};
