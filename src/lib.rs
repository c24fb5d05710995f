//! # Jarvis - desktop skills for a voice assistant
//!
//! A catalogue of named tools (power, files, OCR, launching, messaging,
//! system queries) that a realtime voice runtime can call by name with
//! JSON arguments. Every call comes back as a uniform result envelope.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use jarvis::{default_registry, Config, ToolContext};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = Arc::new(ToolContext::new(Config::load(None)?));
//!     let registry = default_registry();
//!
//!     let result = registry
//!         .dispatch(&ctx, "get_formatted_datetime", serde_json::json!({}))
//!         .await;
//!     println!("{}", result.to_value());
//!
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod platform;
pub mod tools;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::Config;
pub use context::ToolContext;
pub use error::{ErrorKind, ToolError};
pub use platform::Platform;
pub use tools::{default_registry, ToolRegistry, ToolResult};
