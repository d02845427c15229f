//! Shared types and models for the print supplies inventory
//!
//! Domain vocabulary with no I/O: category table layout, report and filter
//! parsing, display formatting, and the allowlists the backend enforces.

pub mod format;
pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
