//! # Core Module
//!
//! Configuration, error taxonomy, and message utilities shared by every layer.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false

pub mod config;
pub mod error;
pub mod response;

// Re-export commonly used items
pub use config::Config;
pub use error::{FlowError, StoreError};
pub use response::{chunk_for_message, chunk_text, MESSAGE_LIMIT};
