//! Shared infrastructure: errors and logging

pub mod error;
pub mod logging;

pub use error::{Error, Result};
