//! Adventure Land script uploader library
//!
//! Compiles character scripts with an external bundler, fingerprints the
//! output, and pushes changed bundles to the game's save_code API.

pub mod api;
pub mod build;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod upload;
pub mod watch;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, UploaderError};
