//! `PlyFile` - header inspection, column requests, read and write.

use std::io::{BufRead, BufWriter, Write};

use tracing::debug;

use super::header::{parse_header, write_header};
use super::reader::{read_body, ElementPlan, Target};
use super::writer::{write_body, ElementSource, PropertySource};
use crate::core::{ElementSchema, Encoding, FileSchema, ListLayout, PropertySchema, TypedBuffer};
use crate::util::{Error, PlyScalar, PropertyType, Result};

/// Handle to a column request, redeemed against [`PlyData`] after a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestHandle {
    index: usize,
    ty: PropertyType,
    list: bool,
}

impl RequestHandle {
    /// Storage type of the buffer this request fills.
    #[inline]
    pub fn property_type(&self) -> PropertyType {
        self.ty
    }

    #[inline]
    pub fn is_list(&self) -> bool {
        self.list
    }
}

/// A registered projection of named properties of one element.
#[derive(Clone, Debug)]
struct ColumnRequest {
    element: usize,
    /// Property indices in requested order
    properties: Vec<usize>,
    ty: PropertyType,
    list: bool,
    len_hint: Option<usize>,
}

impl ColumnRequest {
    fn new_buffer(&self) -> TypedBuffer {
        if self.list {
            TypedBuffer::list(self.ty, self.len_hint)
        } else {
            TypedBuffer::scalar(self.ty, self.properties.len())
        }
    }
}

/// Data added on the write path for some properties of one element.
#[derive(Clone, Debug)]
struct WriteColumn {
    element: usize,
    properties: Vec<usize>,
    buffer: TypedBuffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Session {
    /// Built through `add_*` calls for writing
    Building,
    /// Header parsed, body not yet read
    Parsed,
    /// Body read (or a read failed); the stream position is spent
    Consumed,
}

/// A PLY file being read or written.
///
/// Reading: [`PlyFile::parse_header`], then any number of
/// [`request_properties`](PlyFile::request_properties) calls, then one
/// [`read`](PlyFile::read) over the same stream.
///
/// Writing: [`PlyFile::new`], `add_*` calls, then [`write`](PlyFile::write).
///
/// The codec never opens or closes streams; callers own them.
#[derive(Clone, Debug)]
pub struct PlyFile {
    schema: FileSchema,
    session: Session,
    requests: Vec<ColumnRequest>,
    columns: Vec<WriteColumn>,
}

impl Default for PlyFile {
    fn default() -> Self {
        Self::new()
    }
}

impl PlyFile {
    /// Start an empty file for writing.
    pub fn new() -> Self {
        Self {
            schema: FileSchema::new(Encoding::Ascii),
            session: Session::Building,
            requests: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Parse the header from `reader`, leaving it positioned at the body.
    pub fn parse_header<R: BufRead>(reader: &mut R) -> Result<Self> {
        let schema = parse_header(reader)?;
        Ok(Self {
            schema,
            session: Session::Parsed,
            requests: Vec::new(),
            columns: Vec::new(),
        })
    }

    #[inline]
    pub fn schema(&self) -> &FileSchema {
        &self.schema
    }

    /// Body encoding declared by the parsed header.
    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.schema.encoding
    }

    #[inline]
    pub fn elements(&self) -> &[ElementSchema] {
        &self.schema.elements
    }

    pub fn element(&self, name: &str) -> Option<&ElementSchema> {
        self.schema.element(name).map(|(_, e)| e)
    }

    #[inline]
    pub fn comments(&self) -> &[String] {
        &self.schema.comments
    }

    #[inline]
    pub fn obj_info(&self) -> &[String] {
        &self.schema.obj_info
    }

    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.schema.comments.push(comment.into());
    }

    pub fn add_obj_info(&mut self, info: impl Into<String>) {
        self.schema.obj_info.push(info.into());
    }

    // ========================================================================
    // Read path
    // ========================================================================

    /// Request properties of an element, materialized into one buffer.
    ///
    /// Several scalar properties are interleaved per instance in the order
    /// given. A list property must be requested on its own; its buffer
    /// records per-instance lengths.
    pub fn request_properties(&mut self, element: &str, names: &[&str]) -> Result<RequestHandle> {
        self.request(element, names, None)
    }

    /// Request a list property that is expected to hold `len` items per instance.
    ///
    /// The resulting layout is [`ListLayout::Uniform`] if every instance
    /// matches, otherwise it falls back to per-instance lengths.
    pub fn request_list_properties(&mut self, element: &str, name: &str, len: usize) -> Result<RequestHandle> {
        self.request(element, &[name], Some(len))
    }

    fn request(&mut self, element_name: &str, names: &[&str], len_hint: Option<usize>) -> Result<RequestHandle> {
        match self.session {
            Session::Parsed => {}
            Session::Building => return Err(Error::request("properties can only be requested from a parsed header")),
            Session::Consumed => return Err(Error::request("body has already been read")),
        }
        let (element_index, element) = self
            .schema
            .element(element_name)
            .ok_or_else(|| Error::UnknownElement(element_name.to_string()))?;
        if names.is_empty() {
            return Err(Error::request(format!("no properties requested from '{}'", element_name)));
        }

        let mut properties = Vec::with_capacity(names.len());
        for &name in names {
            let (index, _) = element.property(name).ok_or_else(|| Error::UnknownProperty {
                element: element_name.to_string(),
                property: name.to_string(),
            })?;
            properties.push(index);
        }

        let schemas: Vec<&PropertySchema> = properties.iter().map(|&i| &element.properties[i]).collect();
        let list = schemas.iter().any(|p| p.is_list());
        if list && names.len() > 1 {
            return Err(Error::request(format!(
                "list properties of '{}' must be requested one at a time",
                element_name
            )));
        }
        if len_hint.is_some() && !list {
            return Err(Error::request(format!("'{}' is not a list property", names[0])));
        }

        let mut ty = schemas[0].value_type();
        for p in &schemas[1..] {
            ty = ty.promote(p.value_type()).ok_or_else(|| {
                Error::request(format!(
                    "cannot combine {} and {} properties of '{}' in one request",
                    ty,
                    p.value_type(),
                    element_name
                ))
            })?;
        }

        let handle = RequestHandle {
            index: self.requests.len(),
            ty,
            list,
        };
        self.requests.push(ColumnRequest {
            element: element_index,
            properties,
            ty,
            list,
            len_hint,
        });
        debug!("Requested {:?} from '{}' as {}", names, element_name, ty);
        Ok(handle)
    }

    /// Read the body in a single pass, filling a buffer for every request.
    ///
    /// `reader` must be the stream the header was parsed from. On failure no
    /// buffers are returned and the file cannot be read again.
    #[tracing::instrument(skip_all, fields(requests = self.requests.len()))]
    pub fn read<R: BufRead>(&mut self, reader: &mut R) -> Result<PlyData> {
        match self.session {
            Session::Parsed => {}
            Session::Building => return Err(Error::request("no header has been parsed")),
            Session::Consumed => return Err(Error::request("body has already been read")),
        }
        self.session = Session::Consumed;

        let mut plan: Vec<ElementPlan> = self
            .schema
            .elements
            .iter()
            .map(|e| ElementPlan::new(e.properties.len()))
            .collect();
        for (r, request) in self.requests.iter().enumerate() {
            let element_plan = &mut plan[request.element];
            for (slot, &p) in request.properties.iter().enumerate() {
                element_plan.targets[p].push(Target { request: r, slot });
            }
            if !request.list {
                element_plan.scalar_requests.push(r);
            }
        }

        let mut buffers: Vec<TypedBuffer> = self.requests.iter().map(ColumnRequest::new_buffer).collect();
        read_body(reader, &self.schema, &plan, &mut buffers)?;

        debug!("Read {} elements into {} buffers", self.schema.elements.len(), buffers.len());
        Ok(PlyData {
            buffers: buffers.into_iter().map(Some).collect(),
        })
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Add interleaved scalar properties to an element, creating it if needed.
    ///
    /// `values` holds `names.len()` values per instance.
    pub fn add_properties<T: PlyScalar>(&mut self, element: &str, names: &[&str], values: &[T]) -> Result<()> {
        if names.is_empty() {
            return Err(Error::request(format!("no property names given for '{}'", element)));
        }
        let buffer = TypedBuffer::from_scalars(values, names.len())?;
        self.add_buffer(element, names, buffer, None)
    }

    /// Add a list property whose instances all hold `list_len` items.
    pub fn add_list_property<T: PlyScalar>(
        &mut self,
        element: &str,
        name: &str,
        values: &[T],
        list_len: usize,
        count_type: PropertyType,
    ) -> Result<()> {
        let buffer = TypedBuffer::from_uniform_lists(values, list_len)?;
        self.add_buffer(element, &[name], buffer, Some(count_type))
    }

    /// Add a list property with explicit per-instance lengths.
    pub fn add_variable_list_property<T: PlyScalar>(
        &mut self,
        element: &str,
        name: &str,
        values: &[T],
        lengths: &[u32],
        count_type: PropertyType,
    ) -> Result<()> {
        let buffer = TypedBuffer::from_variable_lists(values, lengths)?;
        self.add_buffer(element, &[name], buffer, Some(count_type))
    }

    /// Add a prepared buffer, e.g. one obtained from a read.
    ///
    /// List buffers take a single name and need an integer `count_type`.
    pub fn add_buffer(
        &mut self,
        element_name: &str,
        names: &[&str],
        buffer: TypedBuffer,
        count_type: Option<PropertyType>,
    ) -> Result<()> {
        if self.session != Session::Building {
            return Err(Error::request("properties can only be added to a file created with PlyFile::new"));
        }

        let ty = buffer.property_type();
        let new_properties: Vec<PropertySchema> = match buffer.layout() {
            ListLayout::Scalar { stride } => {
                if *stride != names.len() {
                    return Err(Error::request(format!(
                        "buffer holds {} properties per instance but {} names were given",
                        stride,
                        names.len()
                    )));
                }
                names.iter().map(|&n| PropertySchema::scalar(n, ty)).collect()
            }
            layout => {
                let [name] = names else {
                    return Err(Error::request("a list buffer takes exactly one property name"));
                };
                let count_type = count_type
                    .ok_or_else(|| Error::request(format!("list property '{}' needs a count type", name)))?;
                if !count_type.is_valid_count_type() {
                    return Err(Error::request(format!("list count type must be an integer, got {}", count_type)));
                }
                let longest = match layout {
                    ListLayout::Uniform(n) => *n as u64,
                    ListLayout::Variable(lengths) => lengths.iter().copied().max().unwrap_or(0) as u64,
                    ListLayout::Scalar { .. } => 0,
                };
                if longest > count_type.max_count() {
                    return Err(Error::request(format!(
                        "list '{}' has {} items, more than {} can count",
                        name, longest, count_type
                    )));
                }
                vec![PropertySchema::list(*name, count_type, ty)]
            }
        };

        for (i, property) in new_properties.iter().enumerate() {
            let repeated = new_properties[..i].iter().any(|p| p.name == property.name);
            let existing = self
                .schema
                .element(element_name)
                .is_some_and(|(_, e)| e.property(&property.name).is_some());
            if repeated || existing {
                return Err(Error::request(format!(
                    "property '{}' already exists on element '{}'",
                    property.name, element_name
                )));
            }
        }

        let element_index = match self.schema.element(element_name) {
            Some((index, existing)) => {
                if existing.count != buffer.count() {
                    return Err(Error::request(format!(
                        "element '{}' has {} instances, new data has {}",
                        element_name,
                        existing.count,
                        buffer.count()
                    )));
                }
                index
            }
            None => {
                self.schema.elements.push(ElementSchema::new(element_name, buffer.count()));
                self.schema.elements.len() - 1
            }
        };

        let element = &mut self.schema.elements[element_index];
        let first = element.properties.len();
        element.properties.extend(new_properties);
        let properties: Vec<usize> = (first..element.properties.len()).collect();

        debug!("Added {:?} to '{}' ({} instances, {})", names, element_name, buffer.count(), ty);
        self.columns.push(WriteColumn {
            element: element_index,
            properties,
            buffer,
        });
        Ok(())
    }

    /// Write header and body; `binary` selects little-endian binary over ASCII.
    pub fn write<W: Write>(&self, out: &mut W, binary: bool) -> Result<()> {
        let encoding = if binary { Encoding::BinaryLittleEndian } else { Encoding::Ascii };
        self.write_encoded(out, encoding)
    }

    /// Write header and body in an explicit encoding.
    #[tracing::instrument(skip_all, fields(encoding = %encoding))]
    pub fn write_encoded<W: Write>(&self, out: &mut W, encoding: Encoding) -> Result<()> {
        if self.session != Session::Building {
            return Err(Error::request("only files created with PlyFile::new can be written"));
        }

        let mut sources: Vec<ElementSource<'_>> = self.schema.elements.iter().map(|_| ElementSource::default()).collect();
        let mut slots: Vec<Vec<Option<PropertySource>>> =
            self.schema.elements.iter().map(|e| vec![None; e.properties.len()]).collect();
        for column in &self.columns {
            let source = &mut sources[column.element];
            let column_index = source.columns.len();
            source.columns.push(&column.buffer);
            for (slot, &p) in column.properties.iter().enumerate() {
                slots[column.element][p] = Some(PropertySource { column: column_index, slot });
            }
        }
        for ((source, slots), element) in sources.iter_mut().zip(slots).zip(&self.schema.elements) {
            source.properties = slots
                .into_iter()
                .zip(&element.properties)
                .map(|(slot, property)| {
                    slot.ok_or_else(|| {
                        Error::request(format!("property '{}' of '{}' has no data", property.name, element.name))
                    })
                })
                .collect::<Result<_>>()?;
        }

        let mut out = BufWriter::new(out);
        write_header(&mut out, &self.schema, encoding)?;
        write_body(&mut out, &self.schema, encoding, &sources)?;
        out.flush()?;
        debug!("Wrote {} elements", self.schema.elements.len());
        Ok(())
    }
}

/// Buffers produced by one [`PlyFile::read`], indexed by request handle.
#[derive(Clone, Debug, Default)]
pub struct PlyData {
    buffers: Vec<Option<TypedBuffer>>,
}

impl PlyData {
    /// Buffer for `handle`, unless it was taken.
    pub fn get(&self, handle: RequestHandle) -> Option<&TypedBuffer> {
        self.buffers.get(handle.index).and_then(Option::as_ref)
    }

    /// Move the buffer for `handle` out.
    pub fn take(&mut self, handle: RequestHandle) -> Option<TypedBuffer> {
        self.buffers.get_mut(handle.index).and_then(Option::take)
    }

    /// Number of requests served by this read.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
