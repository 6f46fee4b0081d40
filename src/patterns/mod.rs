//! Path patterns deciding which files a run checks
//!
//! Architectural Principle: Service Layer - Path selection is kept apart from rule matching
//! - Glob patterns from configuration and ignore files are evaluated in order
//! - Rule matching itself lives in the rules module

pub mod path_filter;

pub use path_filter::PathFilter;
