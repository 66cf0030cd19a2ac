//! hostfacts common types and errors.
//!
//! This crate provides the foundational types shared across hf-core modules:
//! - The fact value model and the namespace merge rules
//! - The unified error type

pub mod error;
pub mod facts;

pub use error::{Error, ErrorCategory, Result};
pub use facts::{FactNamespace, FactValue, Fragment};
