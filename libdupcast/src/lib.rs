//! Dupcast - mirror one social account's posts onto another
//!
//! This library provides the duplication pipeline (fetch, age filter,
//! duplicate filter, publish), the post source abstraction it runs against,
//! and the runner, configuration, and logging shared by the trigger binaries.

pub mod config;
pub mod duplicator;
pub mod error;
pub mod logging;
pub mod runner;
pub mod sources;
pub mod time;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use duplicator::Duplicator;
pub use error::{DupcastError, Result};
pub use runner::Runner;
pub use types::{Outcome, Post, PublishedPost};
