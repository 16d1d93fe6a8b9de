//! # Shelf Common Library
//!
//! Shared code for the Shelf services:
//! - Common error type
//! - Root folder and TOML configuration resolution
//! - SQLite pool initialization

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
