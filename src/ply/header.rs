//! Header grammar - parsing the textual prologue and emitting it again.

use std::io::{BufRead, Read, Write};

use tracing::{debug, trace};

use super::format::*;
use crate::core::{ElementSchema, Encoding, FileSchema, PropertySchema};
use crate::util::{Error, PropertyType, Result};

/// Parse a PLY header, leaving `reader` at the first byte of the body.
///
/// Lines are consumed one at a time up to and including the `end_header`
/// line ending, so any bytes already buffered past it stay in `reader`.
pub fn parse_header<R: BufRead>(reader: &mut R) -> Result<FileSchema> {
    let mut lines = HeaderLines::new(reader);

    // Magic: first non-blank line
    loop {
        let line = lines
            .next_line()?
            .ok_or_else(|| Error::header("empty stream, expected 'ply' magic"))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line != PLY_MAGIC {
            return Err(Error::header(format!("expected '{}' magic, found '{}'", PLY_MAGIC, line)));
        }
        break;
    }

    let mut parser = HeaderParser::default();
    loop {
        let line_no = lines.line_no + 1;
        let line = lines
            .next_line()?
            .ok_or_else(|| Error::header(format!("missing '{}' sentinel", END_HEADER)))?;
        trace!("header line {}: {}", line_no, line);
        if parser.line(&line, line_no)? {
            break;
        }
    }

    let schema = parser.finish();
    debug!(
        "Parsed PLY header: {} encoding, {} elements, {} comments",
        schema.encoding,
        schema.elements.len(),
        schema.comments.len()
    );
    Ok(schema)
}

/// Line reader bounded to header-sized lines.
struct HeaderLines<'a, R> {
    reader: &'a mut R,
    buf: Vec<u8>,
    line_no: usize,
}

impl<'a, R: BufRead> HeaderLines<'a, R> {
    fn new(reader: &'a mut R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
        }
    }

    /// Next line without its line ending, or `None` at end of stream.
    fn next_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        let n = (&mut *self.reader)
            .take(MAX_HEADER_LINE as u64)
            .read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        if n == MAX_HEADER_LINE && self.buf.last() != Some(&b'\n') {
            return Err(Error::header(format!("line {} exceeds {} bytes", self.line_no, MAX_HEADER_LINE)));
        }
        let text = std::str::from_utf8(&self.buf)
            .map_err(|_| Error::header(format!("line {} is not valid UTF-8", self.line_no)))?;
        Ok(Some(strip_line_ending(text).to_string()))
    }
}

#[derive(Default)]
struct HeaderParser {
    schema: FileSchema,
    seen_format: bool,
}

impl HeaderParser {
    /// Consume one header line. Returns true at the sentinel.
    fn line(&mut self, line: &str, line_no: usize) -> Result<bool> {
        let (keyword, rest) = split_keyword(line);
        match keyword {
            "" => Ok(false),
            KW_COMMENT => {
                self.schema.comments.push(rest.to_string());
                Ok(false)
            }
            KW_OBJ_INFO => {
                self.schema.obj_info.push(rest.to_string());
                Ok(false)
            }
            KW_FORMAT => self.format(rest, line_no).map(|_| false),
            KW_ELEMENT => self.element(rest, line_no).map(|_| false),
            KW_PROPERTY => self.property(rest, line_no).map(|_| false),
            END_HEADER => {
                self.require_format(line_no)?;
                if !rest.trim().is_empty() {
                    return Err(Error::header(format!("line {}: unexpected text after {}", line_no, END_HEADER)));
                }
                Ok(true)
            }
            other => Err(Error::header(format!("line {}: unknown keyword '{}'", line_no, other))),
        }
    }

    fn format(&mut self, rest: &str, line_no: usize) -> Result<()> {
        if self.seen_format {
            return Err(Error::header(format!("line {}: duplicate format line", line_no)));
        }
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let [encoding, version] = tokens[..] else {
            return Err(Error::header(format!("line {}: expected 'format <encoding> <version>'", line_no)));
        };
        let encoding = Encoding::from_token(encoding)
            .ok_or_else(|| Error::UnsupportedFormat(encoding.to_string()))?;
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedFormat(format!("{} version {}", encoding, version)));
        }
        self.schema.encoding = encoding;
        self.schema.version = version.to_string();
        self.seen_format = true;
        Ok(())
    }

    fn element(&mut self, rest: &str, line_no: usize) -> Result<()> {
        self.require_format(line_no)?;
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let [name, count] = tokens[..] else {
            return Err(Error::header(format!("line {}: expected 'element <name> <count>'", line_no)));
        };
        let count: usize = count.parse().map_err(|_| {
            Error::header(format!("line {}: invalid count '{}' for element '{}'", line_no, count, name))
        })?;
        if self.schema.element(name).is_some() {
            return Err(Error::header(format!("line {}: duplicate element '{}'", line_no, name)));
        }
        self.schema.elements.push(ElementSchema::new(name, count));
        Ok(())
    }

    fn property(&mut self, rest: &str, line_no: usize) -> Result<()> {
        let element = self
            .schema
            .elements
            .last_mut()
            .ok_or_else(|| Error::header(format!("line {}: property declared before any element", line_no)))?;
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let property = match tokens[..] {
            [KW_LIST, count, item, name] => {
                let count = PropertyType::from_token(count)?;
                if !count.is_valid_count_type() {
                    return Err(Error::header(format!(
                        "line {}: list count type must be an integer, got '{}'",
                        line_no, count
                    )));
                }
                PropertySchema::list(name, count, PropertyType::from_token(item)?)
            }
            [KW_LIST, ..] => {
                return Err(Error::header(format!(
                    "line {}: expected 'property list <count type> <item type> <name>'",
                    line_no
                )));
            }
            [ty, name] => PropertySchema::scalar(name, PropertyType::from_token(ty)?),
            _ => {
                return Err(Error::header(format!("line {}: expected 'property <type> <name>'", line_no)));
            }
        };
        element.properties.push(property);
        Ok(())
    }

    fn require_format(&self, line_no: usize) -> Result<()> {
        if self.seen_format {
            Ok(())
        } else {
            Err(Error::header(format!("line {}: missing format line", line_no)))
        }
    }

    fn finish(self) -> FileSchema {
        self.schema
    }
}

/// Emit the header for `schema`, declaring `encoding` on the format line.
pub fn write_header<W: Write>(out: &mut W, schema: &FileSchema, encoding: Encoding) -> Result<()> {
    writeln!(out, "{}", PLY_MAGIC)?;
    writeln!(out, "{} {} {}", KW_FORMAT, encoding, FORMAT_VERSION)?;
    for comment in &schema.comments {
        writeln!(out, "{} {}", KW_COMMENT, comment)?;
    }
    for info in &schema.obj_info {
        writeln!(out, "{} {}", KW_OBJ_INFO, info)?;
    }
    for element in &schema.elements {
        writeln!(out, "{} {} {}", KW_ELEMENT, element.name, element.count)?;
        for property in &element.properties {
            writeln!(out, "{} {}", KW_PROPERTY, property)?;
        }
    }
    writeln!(out, "{}", END_HEADER)?;
    Ok(())
}
