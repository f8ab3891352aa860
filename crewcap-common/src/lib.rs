//! # Crewcap Common Library
//!
//! Shared code for crewcap services:
//! - Common error types
//! - Configuration loading and root folder resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
