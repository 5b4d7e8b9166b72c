//! # Cicero Common Library
//!
//! Shared code for the Cicero protocol processing crates:
//! - Domain enumerations (country, institution kind, language, protocol kind)
//! - Database initialization, durable models and reference data seeding
//! - Extraction event types and EventBus
//! - Configuration loading and root folder resolution
//! - Error type and id helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod types;
pub mod uuid_utils;

pub use error::{Error, Result};
