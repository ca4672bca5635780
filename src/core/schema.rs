//! File schema - elements, properties, encoding and comments of a PLY file.

use std::fmt;

use crate::util::PropertyType;

/// Body encoding declared by the `format` header line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Encoding {
    #[default]
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl Encoding {
    /// Header token for this encoding.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::BinaryLittleEndian => "binary_little_endian",
            Self::BinaryBigEndian => "binary_big_endian",
        }
    }

    /// Parse a `format` line encoding token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ascii" => Some(Self::Ascii),
            "binary_little_endian" => Some(Self::BinaryLittleEndian),
            "binary_big_endian" => Some(Self::BinaryBigEndian),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_binary(self) -> bool {
        !matches!(self, Self::Ascii)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Scalar or list shape of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Scalar(PropertyType),
    List {
        /// Integer type of the per-instance length prefix
        count: PropertyType,
        /// Type of each list entry
        item: PropertyType,
    },
}

/// A named field of an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertySchema {
    pub name: String,
    pub kind: PropertyKind,
}

impl PropertySchema {
    pub fn scalar(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Scalar(ty),
        }
    }

    pub fn list(name: impl Into<String>, count: PropertyType, item: PropertyType) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::List { count, item },
        }
    }

    #[inline]
    pub fn is_list(&self) -> bool {
        matches!(self.kind, PropertyKind::List { .. })
    }

    /// Type of the stored values (the item type for lists).
    #[inline]
    pub fn value_type(&self) -> PropertyType {
        match self.kind {
            PropertyKind::Scalar(ty) => ty,
            PropertyKind::List { item, .. } => item,
        }
    }

    /// Count type for lists, `None` for scalars.
    #[inline]
    pub fn count_type(&self) -> Option<PropertyType> {
        match self.kind {
            PropertyKind::Scalar(_) => None,
            PropertyKind::List { count, .. } => Some(count),
        }
    }
}

impl fmt::Display for PropertySchema {
    /// Formats as the header declaration, without the `property` keyword.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PropertyKind::Scalar(ty) => write!(f, "{} {}", ty, self.name),
            PropertyKind::List { count, item } => write!(f, "list {} {} {}", count, item, self.name),
        }
    }
}

/// A named, fixed-count collection of property records.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementSchema {
    pub name: String,
    /// Declared number of instances
    pub count: usize,
    /// Properties in body layout order
    pub properties: Vec<PropertySchema>,
}

impl ElementSchema {
    pub fn new(name: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            count,
            properties: Vec::new(),
        }
    }

    /// Find a property by name. With duplicate names the first declaration wins.
    pub fn property(&self, name: &str) -> Option<(usize, &PropertySchema)> {
        self.properties.iter().enumerate().find(|(_, p)| p.name == name)
    }

    /// Bytes per instance in a binary body, if every property is scalar.
    pub fn fixed_stride(&self) -> Option<usize> {
        self.properties
            .iter()
            .map(|p| match p.kind {
                PropertyKind::Scalar(ty) => Some(ty.width()),
                PropertyKind::List { .. } => None,
            })
            .sum()
    }
}

/// Everything the header declares.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileSchema {
    pub encoding: Encoding,
    /// Version token of the `format` line
    pub version: String,
    pub elements: Vec<ElementSchema>,
    pub comments: Vec<String>,
    pub obj_info: Vec<String>,
}

impl FileSchema {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            version: crate::ply::FORMAT_VERSION.to_string(),
            ..Default::default()
        }
    }

    pub fn element(&self, name: &str) -> Option<(usize, &ElementSchema)> {
        self.elements.iter().enumerate().find(|(_, e)| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_tokens() {
        for enc in [Encoding::Ascii, Encoding::BinaryLittleEndian, Encoding::BinaryBigEndian] {
            assert_eq!(Encoding::from_token(enc.token()), Some(enc));
        }
        assert_eq!(Encoding::from_token("binary"), None);
        assert!(!Encoding::Ascii.is_binary());
    }

    #[test]
    fn test_property_display() {
        let p = PropertySchema::scalar("x", PropertyType::Float32);
        assert_eq!(p.to_string(), "float x");
        let p = PropertySchema::list("vertex_indices", PropertyType::Uint8, PropertyType::Int32);
        assert_eq!(p.to_string(), "list uchar int vertex_indices");
        assert_eq!(p.value_type(), PropertyType::Int32);
        assert_eq!(p.count_type(), Some(PropertyType::Uint8));
    }

    #[test]
    fn test_fixed_stride() {
        let mut e = ElementSchema::new("vertex", 4);
        e.properties.push(PropertySchema::scalar("x", PropertyType::Float32));
        e.properties.push(PropertySchema::scalar("red", PropertyType::Uint8));
        assert_eq!(e.fixed_stride(), Some(5));
        e.properties.push(PropertySchema::list("l", PropertyType::Uint8, PropertyType::Int32));
        assert_eq!(e.fixed_stride(), None);
    }

    #[test]
    fn test_duplicate_property_first_wins() {
        let mut e = ElementSchema::new("vertex", 1);
        e.properties.push(PropertySchema::scalar("x", PropertyType::Float32));
        e.properties.push(PropertySchema::scalar("x", PropertyType::Float64));
        let (idx, p) = e.property("x").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(p.value_type(), PropertyType::Float32);
    }
}
