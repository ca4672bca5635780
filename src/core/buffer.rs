//! Typed column storage filled by the reader and drained by the writer.

use std::ops::Range;

use crate::util::{Error, PlyScalar, PropertyType, Result, Scalar};

/// Contiguous values of one property type.
///
/// Each variant owns a plain `Vec` of the matching Rust type, so the storage
/// is always correctly aligned for typed access.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnValues {
    Int8(Vec<i8>),
    Uint8(Vec<u8>),
    Int16(Vec<i16>),
    Uint16(Vec<u16>),
    Int32(Vec<i32>),
    Uint32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! with_vec {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            ColumnValues::Int8($v) => $body,
            ColumnValues::Uint8($v) => $body,
            ColumnValues::Int16($v) => $body,
            ColumnValues::Uint16($v) => $body,
            ColumnValues::Int32($v) => $body,
            ColumnValues::Uint32($v) => $body,
            ColumnValues::Float32($v) => $body,
            ColumnValues::Float64($v) => $body,
        }
    };
}

impl ColumnValues {
    /// Empty storage for the given type.
    pub fn new(ty: PropertyType) -> Self {
        Self::with_capacity(ty, 0)
    }

    pub fn with_capacity(ty: PropertyType, capacity: usize) -> Self {
        match ty {
            PropertyType::Int8 => Self::Int8(Vec::with_capacity(capacity)),
            PropertyType::Uint8 => Self::Uint8(Vec::with_capacity(capacity)),
            PropertyType::Int16 => Self::Int16(Vec::with_capacity(capacity)),
            PropertyType::Uint16 => Self::Uint16(Vec::with_capacity(capacity)),
            PropertyType::Int32 => Self::Int32(Vec::with_capacity(capacity)),
            PropertyType::Uint32 => Self::Uint32(Vec::with_capacity(capacity)),
            PropertyType::Float32 => Self::Float32(Vec::with_capacity(capacity)),
            PropertyType::Float64 => Self::Float64(Vec::with_capacity(capacity)),
        }
    }

    /// Copy a typed slice into new storage.
    pub fn from_slice<T: PlyScalar>(values: &[T]) -> Self {
        let mut out = Self::with_capacity(T::PROPERTY_TYPE, values.len());
        for v in values {
            out.push(v.to_scalar());
        }
        out
    }

    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Int8(_) => PropertyType::Int8,
            Self::Uint8(_) => PropertyType::Uint8,
            Self::Int16(_) => PropertyType::Int16,
            Self::Uint16(_) => PropertyType::Uint16,
            Self::Int32(_) => PropertyType::Int32,
            Self::Uint32(_) => PropertyType::Uint32,
            Self::Float32(_) => PropertyType::Float32,
            Self::Float64(_) => PropertyType::Float64,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        with_vec!(self, v => v.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native-endian byte view of the values.
    pub fn as_bytes(&self) -> &[u8] {
        with_vec!(self, v => bytemuck::cast_slice(v.as_slice()))
    }

    /// Typed view. Fails if `T` is not the column's storage type.
    pub fn as_slice<T: PlyScalar>(&self) -> Result<&[T]> {
        if T::PROPERTY_TYPE != self.property_type() {
            return Err(Error::TypeMismatch {
                expected: self.property_type().to_string(),
                actual: T::PROPERTY_TYPE.to_string(),
            });
        }
        bytemuck::try_cast_slice(self.as_bytes())
            .map_err(|e| Error::InternalInconsistency(format!("column cast failed: {e}")))
    }

    pub fn get(&self, index: usize) -> Option<Scalar> {
        with_vec!(self, v => v.get(index).map(|x| x.to_scalar()))
    }

    /// Append one value, converting to the storage type.
    pub fn push(&mut self, value: Scalar) {
        match self {
            Self::Int8(v) => v.push(value.to_i64() as i8),
            Self::Uint8(v) => v.push(value.to_u64() as u8),
            Self::Int16(v) => v.push(value.to_i64() as i16),
            Self::Uint16(v) => v.push(value.to_u64() as u16),
            Self::Int32(v) => v.push(value.to_i64() as i32),
            Self::Uint32(v) => v.push(value.to_u64() as u32),
            Self::Float32(v) => v.push(value.to_f64() as f32),
            Self::Float64(v) => v.push(value.to_f64()),
        }
    }

    /// Overwrite the value at `index`. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, value: Scalar) {
        match self {
            Self::Int8(v) => set_at(v, index, value.to_i64() as i8),
            Self::Uint8(v) => set_at(v, index, value.to_u64() as u8),
            Self::Int16(v) => set_at(v, index, value.to_i64() as i16),
            Self::Uint16(v) => set_at(v, index, value.to_u64() as u16),
            Self::Int32(v) => set_at(v, index, value.to_i64() as i32),
            Self::Uint32(v) => set_at(v, index, value.to_u64() as u32),
            Self::Float32(v) => set_at(v, index, value.to_f64() as f32),
            Self::Float64(v) => set_at(v, index, value.to_f64()),
        }
    }

    /// Grow by `n` zero values.
    pub fn extend_zeroed(&mut self, n: usize) {
        with_vec!(self, v => v.resize(v.len() + n, Default::default()))
    }
}

#[inline]
fn set_at<T>(v: &mut [T], index: usize, value: T) {
    if let Some(slot) = v.get_mut(index) {
        *slot = value;
    }
}

/// How the flat values of a buffer split into instances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListLayout {
    /// Scalar columns: `stride` values per instance, interleaved.
    Scalar { stride: usize },
    /// Every instance's list has the same length.
    Uniform(usize),
    /// Per-instance list lengths.
    Variable(Vec<u32>),
}

/// Values for one column request, plus the instance structure.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedBuffer {
    values: ColumnValues,
    layout: ListLayout,
    count: usize,
}

impl TypedBuffer {
    /// Empty buffer for a group of `stride` interleaved scalar columns.
    pub fn scalar(ty: PropertyType, stride: usize) -> Self {
        Self {
            values: ColumnValues::new(ty),
            layout: ListLayout::Scalar { stride },
            count: 0,
        }
    }

    /// Empty buffer for a list column, optionally expecting a fixed length.
    pub fn list(ty: PropertyType, len_hint: Option<usize>) -> Self {
        let layout = match len_hint {
            Some(n) => ListLayout::Uniform(n),
            None => ListLayout::Variable(Vec::new()),
        };
        Self {
            values: ColumnValues::new(ty),
            layout,
            count: 0,
        }
    }

    /// Wrap interleaved scalar values (`stride` per instance).
    pub fn from_scalars<T: PlyScalar>(values: &[T], stride: usize) -> Result<Self> {
        if stride == 0 || values.len() % stride != 0 {
            return Err(Error::request(format!(
                "{} values do not divide into instances of {} properties",
                values.len(),
                stride
            )));
        }
        Ok(Self {
            values: ColumnValues::from_slice(values),
            layout: ListLayout::Scalar { stride },
            count: values.len() / stride,
        })
    }

    /// Wrap list values where every instance has `len` items.
    pub fn from_uniform_lists<T: PlyScalar>(values: &[T], len: usize) -> Result<Self> {
        if len == 0 || values.len() % len != 0 {
            return Err(Error::request(format!(
                "{} values do not divide into lists of length {}",
                values.len(),
                len
            )));
        }
        Ok(Self {
            values: ColumnValues::from_slice(values),
            layout: ListLayout::Uniform(len),
            count: values.len() / len,
        })
    }

    /// Wrap list values with explicit per-instance lengths.
    pub fn from_variable_lists<T: PlyScalar>(values: &[T], lengths: &[u32]) -> Result<Self> {
        let total: u64 = lengths.iter().map(|&n| n as u64).sum();
        if total != values.len() as u64 {
            return Err(Error::request(format!(
                "list lengths sum to {} but {} values were given",
                total,
                values.len()
            )));
        }
        Ok(Self {
            values: ColumnValues::from_slice(values),
            layout: ListLayout::Variable(lengths.to_vec()),
            count: lengths.len(),
        })
    }

    #[inline]
    pub fn property_type(&self) -> PropertyType {
        self.values.property_type()
    }

    /// Total number of values across all instances.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of element instances represented.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn layout(&self) -> &ListLayout {
        &self.layout
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.values.as_bytes()
    }

    #[inline]
    pub fn as_slice<T: PlyScalar>(&self) -> Result<&[T]> {
        self.values.as_slice()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Scalar> {
        self.values.get(index)
    }

    /// Number of values belonging to `instance`.
    pub fn instance_len(&self, instance: usize) -> Option<usize> {
        if instance >= self.count {
            return None;
        }
        match &self.layout {
            ListLayout::Scalar { stride } => Some(*stride),
            ListLayout::Uniform(n) => Some(*n),
            ListLayout::Variable(lengths) => lengths.get(instance).map(|&n| n as usize),
        }
    }

    /// Flat value ranges of each instance, in order.
    pub fn instances(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        let mut start = 0;
        (0..self.count).map(move |i| {
            let len = self.instance_len(i).unwrap_or(0);
            let range = start..start + len;
            start += len;
            range
        })
    }

    pub(crate) fn values_mut(&mut self) -> &mut ColumnValues {
        &mut self.values
    }

    /// Open a new scalar instance; returns the flat index of its first slot.
    pub(crate) fn begin_scalar_instance(&mut self) -> usize {
        let stride = match self.layout {
            ListLayout::Scalar { stride } => stride,
            _ => 0,
        };
        let base = self.values.len();
        self.values.extend_zeroed(stride);
        self.count += 1;
        base
    }

    /// Record the length of one decoded list instance.
    ///
    /// A uniform layout demotes to per-instance lengths on the first mismatch.
    pub(crate) fn record_list_len(&mut self, len: usize) {
        match &mut self.layout {
            ListLayout::Uniform(n) if *n == len => {}
            ListLayout::Uniform(n) => {
                let mut lengths = vec![*n as u32; self.count];
                lengths.push(len as u32);
                self.layout = ListLayout::Variable(lengths);
            }
            ListLayout::Variable(lengths) => lengths.push(len as u32),
            ListLayout::Scalar { .. } => debug_assert!(false, "list length on scalar buffer"),
        }
        self.count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let values = ColumnValues::from_slice(&[1.0f32, 2.0, 3.0]);
        assert_eq!(values.property_type(), PropertyType::Float32);
        assert_eq!(values.as_slice::<f32>().unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(values.as_bytes().len(), 12);
        assert!(matches!(values.as_slice::<i32>(), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_push_converts() {
        let mut values = ColumnValues::new(PropertyType::Float64);
        values.push(Scalar::Int(-3));
        values.push(Scalar::Float(0.5));
        assert_eq!(values.as_slice::<f64>().unwrap(), &[-3.0, 0.5]);
    }

    #[test]
    fn test_scalar_instances() {
        let mut buf = TypedBuffer::scalar(PropertyType::Int32, 3);
        let base = buf.begin_scalar_instance();
        buf.values_mut().set(base + 2, Scalar::Int(7));
        assert_eq!(buf.count(), 1);
        assert_eq!(buf.as_slice::<i32>().unwrap(), &[0, 0, 7]);
    }

    #[test]
    fn test_uniform_demotes_on_mismatch() {
        let mut buf = TypedBuffer::list(PropertyType::Int32, Some(3));
        buf.record_list_len(3);
        buf.record_list_len(3);
        assert_eq!(buf.layout(), &ListLayout::Uniform(3));
        buf.record_list_len(4);
        assert_eq!(buf.layout(), &ListLayout::Variable(vec![3, 3, 4]));
        assert_eq!(buf.count(), 3);
    }

    #[test]
    fn test_variable_instances() {
        let buf = TypedBuffer::from_variable_lists(&[0i32, 1, 2, 3, 4, 5, 6], &[3, 4]).unwrap();
        let ranges: Vec<_> = buf.instances().collect();
        assert_eq!(ranges, vec![0..3, 3..7]);
        assert!(TypedBuffer::from_variable_lists(&[0i32, 1], &[3]).is_err());
    }

    #[test]
    fn test_from_scalars_requires_whole_instances() {
        assert!(TypedBuffer::from_scalars(&[1.0f32, 2.0], 3).is_err());
        let buf = TypedBuffer::from_scalars(&[1u8, 2, 3, 4, 5, 6], 3).unwrap();
        assert_eq!(buf.count(), 2);
        assert_eq!(buf.instance_len(1), Some(3));
        assert_eq!(buf.instance_len(2), None);
    }
}
