//! Domain layer - billing records and shared primitives.
//!
//! No dependencies on adapters or the HTTP stack.

pub mod billing;
pub mod foundation;
