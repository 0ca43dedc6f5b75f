//! Shared types for the civil registry console workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
