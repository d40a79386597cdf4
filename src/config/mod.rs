//! Configuration module for texscale
//!
//! Provides types and parsing for `texscale.toml`.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
