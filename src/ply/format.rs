//! PLY format constants.

/// Magic line at the start of every PLY stream.
pub const PLY_MAGIC: &str = "ply";

/// The only format version in use.
pub const FORMAT_VERSION: &str = "1.0";

/// Header keywords.
pub const KW_FORMAT: &str = "format";
pub const KW_COMMENT: &str = "comment";
pub const KW_OBJ_INFO: &str = "obj_info";
pub const KW_ELEMENT: &str = "element";
pub const KW_PROPERTY: &str = "property";
pub const KW_LIST: &str = "list";

/// Header sentinel; the body starts at the byte after its line ending.
pub const END_HEADER: &str = "end_header";

/// Upper bound on a single header line, in bytes.
pub const MAX_HEADER_LINE: usize = 64 * 1024;

/// Strip a trailing `\n` or `\r\n` (or a lone `\r`).
#[inline]
pub fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Split a header line into its keyword and the text after one separator.
///
/// Used for free-text lines (`comment`, `obj_info`) whose payload is kept verbatim.
pub fn split_keyword(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.find(|c: char| c.is_ascii_whitespace()) {
        Some(pos) => {
            let rest = &line[pos..];
            let mut chars = rest.chars();
            chars.next();
            (&line[..pos], chars.as_str())
        }
        None => (line, ""),
    }
}
