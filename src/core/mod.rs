//! Core types shared across the bootstrapper.

pub mod error;

pub use error::{BootstrapError, ErrorContext, user_friendly_error};
