//! Utility types for the PLY codec.
//!
//! - [`PropertyType`] - the type registry (widths, kinds, header tokens)
//! - [`Scalar`] / [`PlyScalar`] - value model and Rust type mapping
//! - [`Error`] / [`Result`] - error handling

mod error;
mod property_type;

pub use error::*;
pub use property_type::*;
