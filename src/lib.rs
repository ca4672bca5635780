//! # plyio
//!
//! Reader and writer for the PLY (Polygon File Format / Stanford Triangle
//! Format) in its ASCII, binary little-endian and binary big-endian encodings.
//!
//! ## Modules
//!
//! - [`util`] - Property types, scalar values, errors
//! - [`core`] - Header schema and typed column buffers
//! - [`ply`] - Header parsing, body decoding/encoding, the [`PlyFile`] session
//!
//! ## Example
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use plyio::PlyFile;
//!
//! # fn main() -> plyio::Result<()> {
//! let mut reader = BufReader::new(File::open("mesh.ply")?);
//! let mut ply = PlyFile::parse_header(&mut reader)?;
//!
//! let vertices = ply.request_properties("vertex", &["x", "y", "z"])?;
//! let faces = ply.request_list_properties("face", "vertex_indices", 3)?;
//!
//! let data = ply.read(&mut reader)?;
//! if let Some(buf) = data.get(vertices) {
//!     println!("{} vertices", buf.count());
//! }
//! if let Some(buf) = data.get(faces) {
//!     println!("{} faces", buf.count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod util;
pub mod core;
pub mod ply;

// Re-export commonly used types
pub use util::{Error, PlyScalar, PropertyType, Result, Scalar};
pub use crate::core::{Encoding, ListLayout, TypedBuffer};
pub use ply::{PlyData, PlyFile, RequestHandle};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, PlyScalar, PropertyType, Result, Scalar};
    pub use crate::core::{ElementSchema, Encoding, FileSchema, ListLayout, PropertyKind, PropertySchema, TypedBuffer};
    pub use crate::ply::{PlyData, PlyFile, RequestHandle};
}
