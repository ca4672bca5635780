//! Core layer - schema and column storage.
//!
//! This module provides:
//! - [`FileSchema`] / [`ElementSchema`] / [`PropertySchema`] - what a header declares
//! - [`Encoding`] - ascii / binary little-endian / binary big-endian bodies
//! - [`TypedBuffer`] / [`ColumnValues`] / [`ListLayout`] - decoded column data

mod schema;
mod buffer;

pub use schema::{Encoding, ElementSchema, FileSchema, PropertyKind, PropertySchema};
pub use buffer::{ColumnValues, ListLayout, TypedBuffer};
