//! Shared types for the MCP OAuth toolkit

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, serialize_exposed};
