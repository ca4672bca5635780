//! Body encoding - element instances in declared property order.

use std::io::{self, Write};
use std::marker::PhantomData;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::core::{Encoding, FileSchema, PropertyKind, TypedBuffer};
use crate::util::{Error, PropertyType, Result, Scalar};

/// Data source for one declared property.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PropertySource {
    /// Index into the element's column list
    pub column: usize,
    /// Position within the column's per-instance stride (0 for lists)
    pub slot: usize,
}

/// Columns and per-property sources for one element.
#[derive(Debug, Default)]
pub(crate) struct ElementSource<'a> {
    pub columns: Vec<&'a TypedBuffer>,
    pub properties: Vec<PropertySource>,
}

/// Per-encoding value output.
trait ValueSink {
    fn value(&mut self, ty: PropertyType, value: Scalar) -> io::Result<()>;
    fn end_instance(&mut self) -> io::Result<()>;
}

struct AsciiSink<'w, W> {
    out: &'w mut W,
    first: bool,
}

impl<W: Write> ValueSink for AsciiSink<'_, W> {
    fn value(&mut self, ty: PropertyType, value: Scalar) -> io::Result<()> {
        if !self.first {
            self.out.write_all(b" ")?;
        }
        self.first = false;
        ty.write_token(self.out, value)
    }

    fn end_instance(&mut self) -> io::Result<()> {
        self.first = true;
        self.out.write_all(b"\n")
    }
}

struct BinarySink<'w, W, B> {
    out: &'w mut W,
    order: PhantomData<B>,
}

impl<W: Write, B: ByteOrder> ValueSink for BinarySink<'_, W, B> {
    #[inline]
    fn value(&mut self, ty: PropertyType, value: Scalar) -> io::Result<()> {
        ty.encode::<B, _>(self.out, value)
    }

    #[inline]
    fn end_instance(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Encode every element instance of `schema` from `sources`.
pub(crate) fn write_body<W: Write>(
    out: &mut W,
    schema: &FileSchema,
    encoding: Encoding,
    sources: &[ElementSource<'_>],
) -> Result<()> {
    match encoding {
        Encoding::Ascii => encode(&mut AsciiSink { out, first: true }, schema, sources),
        Encoding::BinaryLittleEndian => encode(
            &mut BinarySink::<_, LittleEndian> { out, order: PhantomData },
            schema,
            sources,
        ),
        Encoding::BinaryBigEndian => encode(
            &mut BinarySink::<_, BigEndian> { out, order: PhantomData },
            schema,
            sources,
        ),
    }
}

fn encode<S: ValueSink>(sink: &mut S, schema: &FileSchema, sources: &[ElementSource<'_>]) -> Result<()> {
    for (element, source) in schema.elements.iter().zip(sources) {
        if source.properties.len() != element.properties.len() {
            return Err(Error::InternalInconsistency(format!(
                "element '{}' declares {} properties but {} have data",
                element.name,
                element.properties.len(),
                source.properties.len()
            )));
        }
        // Flat start of the current instance in each column.
        let mut cursors = vec![0usize; source.columns.len()];
        let missing = |i: usize, name: &str| {
            Error::InternalInconsistency(format!(
                "no data for property '{}' of element '{}' instance {}",
                name, element.name, i
            ))
        };

        for i in 0..element.count {
            for (property, src) in element.properties.iter().zip(&source.properties) {
                let column = source.columns[src.column];
                let start = cursors[src.column];
                match property.kind {
                    PropertyKind::Scalar(ty) => {
                        let value = column.get(start + src.slot).ok_or_else(|| missing(i, &property.name))?;
                        sink.value(ty, value)?;
                    }
                    PropertyKind::List { count, item } => {
                        let len = column.instance_len(i).ok_or_else(|| missing(i, &property.name))?;
                        sink.value(count, Scalar::Uint(len as u64))?;
                        for k in 0..len {
                            let value = column.get(start + k).ok_or_else(|| missing(i, &property.name))?;
                            sink.value(item, value)?;
                        }
                    }
                }
            }
            sink.end_instance()?;
            for (cursor, column) in cursors.iter_mut().zip(&source.columns) {
                *cursor += column.instance_len(i).unwrap_or(0);
            }
        }
    }
    Ok(())
}
