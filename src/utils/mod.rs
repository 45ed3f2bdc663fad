//! Cross-cutting utilities: file system helpers and progress indicators.

pub mod fs;
pub mod progress;
