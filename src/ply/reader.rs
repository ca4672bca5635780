//! Body decoding - one pass over every element, fanned out to requested columns.

use std::io::{self, BufRead, Read};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::core::{ElementSchema, Encoding, FileSchema, ListLayout, PropertyKind, TypedBuffer};
use crate::util::{Error, PropertyType, Result, Scalar};

/// Where one decoded property value goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Target {
    /// Index of the request (and of its buffer)
    pub request: usize,
    /// Position within the request's per-instance stride (0 for lists)
    pub slot: usize,
}

pub(crate) type Targets = SmallVec<[Target; 2]>;

/// Routing for one element: a target list per declared property.
#[derive(Clone, Debug, Default)]
pub(crate) struct ElementPlan {
    pub targets: Vec<Targets>,
    /// Scalar-group requests on this element, opened at every instance
    pub scalar_requests: Vec<usize>,
}

impl ElementPlan {
    pub fn new(num_properties: usize) -> Self {
        Self {
            targets: vec![Targets::new(); num_properties],
            scalar_requests: Vec::new(),
        }
    }

    fn is_wanted(&self) -> bool {
        self.targets.iter().any(|t| !t.is_empty())
    }
}

/// Decode the body following a parsed header into `buffers`.
///
/// `plan` has one entry per schema element. On error the buffers hold partial
/// data and must be discarded by the caller.
pub(crate) fn read_body<R: BufRead>(
    reader: &mut R,
    schema: &FileSchema,
    plan: &[ElementPlan],
    buffers: &mut [TypedBuffer],
) -> Result<()> {
    let mut router = Router::new(plan, buffers);
    match schema.encoding {
        Encoding::Ascii => read_ascii(reader, schema, &mut router)?,
        Encoding::BinaryLittleEndian => read_binary::<LittleEndian, _>(reader, schema, &mut router)?,
        Encoding::BinaryBigEndian => read_binary::<BigEndian, _>(reader, schema, &mut router)?,
    }
    router.finish(schema)
}

// ============================================================================
// Fan-out
// ============================================================================

/// Moves decoded values into every buffer that asked for them.
struct Router<'a> {
    plan: &'a [ElementPlan],
    buffers: &'a mut [TypedBuffer],
    /// Flat index of the current instance's first slot, per scalar request
    bases: Vec<usize>,
    /// Values each buffer should hold, tallied independently of the buffers
    expected: Vec<usize>,
}

impl<'a> Router<'a> {
    fn new(plan: &'a [ElementPlan], buffers: &'a mut [TypedBuffer]) -> Self {
        let n = buffers.len();
        Self {
            plan,
            buffers,
            bases: vec![0; n],
            expected: vec![0; n],
        }
    }

    #[inline]
    fn targets(&self, element: usize, property: usize) -> &'a [Target] {
        let plan: &'a [ElementPlan] = self.plan;
        &plan[element].targets[property]
    }

    fn begin_instance(&mut self, element: usize) {
        for &r in &self.plan[element].scalar_requests {
            self.bases[r] = self.buffers[r].begin_scalar_instance();
            if let ListLayout::Scalar { stride } = self.buffers[r].layout() {
                self.expected[r] += *stride;
            }
        }
    }

    fn scalar(&mut self, element: usize, property: usize, value: Scalar) {
        for t in self.targets(element, property) {
            let index = self.bases[t.request] + t.slot;
            self.buffers[t.request].values_mut().set(index, value);
        }
    }

    fn list_item(&mut self, element: usize, property: usize, value: Scalar) {
        for t in self.targets(element, property) {
            self.buffers[t.request].values_mut().push(value);
        }
    }

    fn end_list(&mut self, element: usize, property: usize, len: usize) {
        for t in self.targets(element, property) {
            self.buffers[t.request].record_list_len(len);
            self.expected[t.request] += len;
        }
    }

    /// Check every buffer against the tallies of this pass.
    fn finish(self, schema: &FileSchema) -> Result<()> {
        for (r, buffer) in self.buffers.iter().enumerate() {
            if buffer.len() != self.expected[r] {
                return Err(Error::InternalInconsistency(format!(
                    "request {} holds {} values, expected {}",
                    r,
                    buffer.len(),
                    self.expected[r]
                )));
            }
            let layout_total = match buffer.layout() {
                ListLayout::Scalar { stride } => buffer.count() * stride,
                ListLayout::Uniform(n) => buffer.count() * n,
                ListLayout::Variable(lengths) => lengths.iter().map(|&n| n as usize).sum(),
            };
            if layout_total != buffer.len() {
                return Err(Error::InternalInconsistency(format!(
                    "request {} layout covers {} values, buffer holds {}",
                    r,
                    layout_total,
                    buffer.len()
                )));
            }
        }
        // Every requested element must have contributed exactly its declared count.
        for (element, plan) in schema.elements.iter().zip(self.plan) {
            let requested = plan.targets.iter().flatten().map(|t| t.request);
            for r in requested {
                if self.buffers[r].count() != element.count {
                    return Err(Error::InternalInconsistency(format!(
                        "request {} saw {} instances of '{}', header declares {}",
                        r,
                        self.buffers[r].count(),
                        element.name,
                        element.count
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Binary bodies
// ============================================================================

fn read_binary<B: ByteOrder, R: Read>(reader: &mut R, schema: &FileSchema, router: &mut Router<'_>) -> Result<()> {
    let mut scratch = [0u8; 8];
    let mut items = Vec::new();

    for (e, element) in schema.elements.iter().enumerate() {
        if !router.plan[e].is_wanted() {
            if let Some(stride) = element.fixed_stride() {
                trace!("skipping element '{}' ({} x {} bytes)", element.name, element.count, stride);
                let total = (stride as u64)
                    .checked_mul(element.count as u64)
                    .ok_or_else(|| Error::body(format!("element '{}' is too large", element.name)))?;
                skip_bytes(reader, total, || format!("element '{}'", element.name))?;
                continue;
            }
        }

        for i in 0..element.count {
            let context = || format!("element '{}' instance {}", element.name, i);
            router.begin_instance(e);
            for (p, property) in element.properties.iter().enumerate() {
                let wanted = !router.targets(e, p).is_empty();
                match property.kind {
                    PropertyKind::Scalar(ty) => {
                        let buf = &mut scratch[..ty.width()];
                        reader.read_exact(buf).map_err(|err| Error::from_body_io(err, context))?;
                        if wanted {
                            router.scalar(e, p, ty.decode::<B>(buf));
                        }
                    }
                    PropertyKind::List { count, item } => {
                        let buf = &mut scratch[..count.width()];
                        reader.read_exact(buf).map_err(|err| Error::from_body_io(err, context))?;
                        let len = list_len(count.decode::<B>(buf), element, i)?;
                        let total = (len as u64) * item.width() as u64;
                        if !wanted {
                            skip_bytes(reader, total, context)?;
                            continue;
                        }
                        items.clear();
                        let got = reader.by_ref().take(total).read_to_end(&mut items)?;
                        if (got as u64) < total {
                            return Err(Error::body(format!("unexpected end of stream in {}", context())));
                        }
                        for chunk in items.chunks_exact(item.width()) {
                            router.list_item(e, p, item.decode::<B>(chunk));
                        }
                        router.end_list(e, p, len);
                    }
                }
            }
        }
    }
    Ok(())
}

fn skip_bytes<R: Read>(reader: &mut R, len: u64, context: impl FnOnce() -> String) -> Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(len), &mut io::sink())?;
    if skipped < len {
        return Err(Error::body(format!("unexpected end of stream in {}", context())));
    }
    Ok(())
}

fn list_len(count: Scalar, element: &ElementSchema, instance: usize) -> Result<usize> {
    count
        .as_count()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            Error::body(format!(
                "invalid list length {:?} in element '{}' instance {}",
                count, element.name, instance
            ))
        })
}

// ============================================================================
// ASCII bodies
// ============================================================================

fn read_ascii<R: BufRead>(reader: &mut R, schema: &FileSchema, router: &mut Router<'_>) -> Result<()> {
    let mut lines = BodyLines::new(reader);

    for (e, element) in schema.elements.iter().enumerate() {
        if element.properties.is_empty() {
            continue;
        }
        for i in 0..element.count {
            let line = lines.next_line()?.ok_or_else(|| {
                Error::body(format!(
                    "unexpected end of stream: element '{}' has {} of {} instances",
                    element.name, i, element.count
                ))
            })?;
            let mut tokens = line.split_ascii_whitespace();
            let mut next_token = |what: &str| {
                tokens.next().ok_or_else(|| {
                    Error::body(format!(
                        "line {}: missing {} in element '{}' instance {}",
                        lines.line_no, what, element.name, i
                    ))
                })
            };

            router.begin_instance(e);
            for (p, property) in element.properties.iter().enumerate() {
                match property.kind {
                    PropertyKind::Scalar(ty) => {
                        let value = parse_at(ty, next_token(property.name.as_str())?, lines.line_no)?;
                        router.scalar(e, p, value);
                    }
                    PropertyKind::List { count, item } => {
                        let len = list_len(parse_at(count, next_token(property.name.as_str())?, lines.line_no)?, element, i)?;
                        for _ in 0..len {
                            let value = parse_at(item, next_token(property.name.as_str())?, lines.line_no)?;
                            router.list_item(e, p, value);
                        }
                        router.end_list(e, p, len);
                    }
                }
            }
            if tokens.next().is_some() {
                warn!(
                    "line {}: ignoring trailing values in element '{}' instance {}",
                    lines.line_no, element.name, i
                );
            }
        }
    }
    Ok(())
}

fn parse_at(ty: PropertyType, token: &str, line_no: usize) -> Result<Scalar> {
    ty.parse_token(token).map_err(|err| match err {
        Error::MalformedBody(msg) => Error::body(format!("line {}: {}", line_no, msg)),
        other => other,
    })
}

/// Non-blank body lines, counted from the start of the body.
struct BodyLines<'a, R> {
    reader: &'a mut R,
    buf: Vec<u8>,
    line_no: usize,
}

impl<'a, R: BufRead> BodyLines<'a, R> {
    fn new(reader: &'a mut R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let text = std::str::from_utf8(&self.buf)
                .map_err(|_| Error::body(format!("line {} is not valid UTF-8", self.line_no)))?;
            if text.trim().is_empty() {
                continue;
            }
            return Ok(Some(text.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PropertySchema;
    use std::io::Cursor;

    fn vertex_schema(encoding: Encoding, count: usize) -> FileSchema {
        let mut schema = FileSchema::new(encoding);
        let mut vertex = ElementSchema::new("vertex", count);
        for name in ["x", "y", "z"] {
            vertex.properties.push(PropertySchema::scalar(name, PropertyType::Float32));
        }
        schema.elements.push(vertex);
        schema
    }

    fn xyz_plan(order: [usize; 3]) -> Vec<ElementPlan> {
        let mut plan = ElementPlan::new(3);
        for (slot, &p) in order.iter().enumerate() {
            plan.targets[p].push(Target { request: 0, slot });
        }
        plan.scalar_requests.push(0);
        vec![plan]
    }

    #[test]
    fn test_ascii_scalars() {
        let schema = vertex_schema(Encoding::Ascii, 2);
        let mut buffers = vec![TypedBuffer::scalar(PropertyType::Float32, 3)];
        let mut body = Cursor::new("1.0 2.0 3.0\n\n4 5 6\n");
        read_body(&mut body, &schema, &xyz_plan([0, 1, 2]), &mut buffers).unwrap();
        assert_eq!(buffers[0].as_slice::<f32>().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(buffers[0].count(), 2);
    }

    #[test]
    fn test_request_order_is_kept() {
        let schema = vertex_schema(Encoding::Ascii, 1);
        let mut buffers = vec![TypedBuffer::scalar(PropertyType::Float32, 3)];
        // request asks for z, y, x
        let mut body = Cursor::new("1 2 3\n");
        read_body(&mut body, &schema, &xyz_plan([2, 1, 0]), &mut buffers).unwrap();
        assert_eq!(buffers[0].as_slice::<f32>().unwrap(), &[3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_ascii_rejects_letters() {
        let schema = vertex_schema(Encoding::Ascii, 1);
        let mut buffers = vec![TypedBuffer::scalar(PropertyType::Float32, 3)];
        let mut body = Cursor::new("1.0 2.0 x\n");
        let err = read_body(&mut body, &schema, &xyz_plan([0, 1, 2]), &mut buffers).unwrap_err();
        assert!(matches!(err, Error::MalformedBody(_)));
    }

    #[test]
    fn test_ascii_missing_instances() {
        let schema = vertex_schema(Encoding::Ascii, 2);
        let mut buffers = vec![TypedBuffer::scalar(PropertyType::Float32, 3)];
        let mut body = Cursor::new("1 2 3\n");
        let err = read_body(&mut body, &schema, &xyz_plan([0, 1, 2]), &mut buffers).unwrap_err();
        assert!(matches!(err, Error::MalformedBody(_)));
    }

    #[test]
    fn test_binary_big_endian() {
        let schema = vertex_schema(Encoding::BinaryBigEndian, 1);
        let mut body = Vec::new();
        for v in [1.5f32, -2.0, 8.25] {
            body.extend_from_slice(&v.to_be_bytes());
        }
        let mut buffers = vec![TypedBuffer::scalar(PropertyType::Float32, 3)];
        read_body(&mut Cursor::new(body), &schema, &xyz_plan([0, 1, 2]), &mut buffers).unwrap();
        assert_eq!(buffers[0].as_slice::<f32>().unwrap(), &[1.5, -2.0, 8.25]);
    }

    #[test]
    fn test_binary_truncated() {
        let schema = vertex_schema(Encoding::BinaryLittleEndian, 2);
        let mut buffers = vec![TypedBuffer::scalar(PropertyType::Float32, 3)];
        let body = vec![0u8; 20];
        let err = read_body(&mut Cursor::new(body), &schema, &xyz_plan([0, 1, 2]), &mut buffers).unwrap_err();
        assert!(matches!(err, Error::MalformedBody(_)));
    }

    #[test]
    fn test_unrequested_element_is_skipped() {
        let schema = vertex_schema(Encoding::BinaryLittleEndian, 2);
        let plan = vec![ElementPlan::new(3)];
        let mut cursor = Cursor::new(vec![0u8; 24]);
        read_body(&mut cursor, &schema, &plan, &mut []).unwrap();
        assert_eq!(cursor.position(), 24);

        let mut short = Cursor::new(vec![0u8; 23]);
        assert!(read_body(&mut short, &schema, &plan, &mut []).is_err());
    }

    #[test]
    fn test_instance_count_mismatch() {
        // Target without an opened scalar instance: nothing is counted.
        let schema = vertex_schema(Encoding::Ascii, 2);
        let mut plan = ElementPlan::new(3);
        plan.targets[0].push(Target { request: 0, slot: 0 });
        let mut buffers = vec![TypedBuffer::scalar(PropertyType::Float32, 1)];
        let mut body = Cursor::new("1 2 3\n4 5 6\n");
        let err = read_body(&mut body, &schema, &[plan], &mut buffers).unwrap_err();
        assert!(matches!(err, Error::InternalInconsistency(_)), "got {:?}", err);
    }

    #[test]
    fn test_value_tally_mismatch() {
        // A buffer that already holds data ends up with more values than the pass produced.
        let schema = vertex_schema(Encoding::Ascii, 2);
        let mut buffers = vec![TypedBuffer::from_scalars(&[9.0f32; 3], 3).unwrap()];
        let mut body = Cursor::new("1 2 3\n4 5 6\n");
        let err = read_body(&mut body, &schema, &xyz_plan([0, 1, 2]), &mut buffers).unwrap_err();
        assert!(matches!(err, Error::InternalInconsistency(_)), "got {:?}", err);
    }
}
