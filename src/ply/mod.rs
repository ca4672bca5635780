//! PLY (Polygon File Format) reader and writer.
//!
//! A PLY stream is a text header describing named elements and their typed
//! properties, followed by a body holding every instance of every element in
//! declaration order.
//!
//! ## File Structure
//!
//! ```text
//! +----------------------------------+
//! | ply                              |  magic line
//! | format binary_little_endian 1.0  |  ascii | binary_little_endian | binary_big_endian
//! | comment ...                      |  any number, kept in order
//! | obj_info ...                     |
//! | element vertex 8                 |  name, instance count
//! | property float x                 |  scalar property
//! | element face 6                   |
//! | property list uchar int v_idx    |  count type, item type
//! | end_header                       |
//! +----------------------------------+
//! | vertex 0 .. vertex 7             |  body, instance by instance,
//! | face 0 .. face 5                 |  properties in declared order
//! +----------------------------------+
//! ```
//!
//! Reading resolves column requests against the header first, then decodes
//! the whole body in one pass, copying each requested value straight into its
//! destination buffer.

mod format;
mod header;
mod reader;
mod writer;
mod file;

pub use format::*;
pub use header::{parse_header, write_header};
pub use file::{PlyData, PlyFile, RequestHandle};
