/*!
 * Part-level XML reading and byte-span patching.
 *
 * Edits never re-serialize a whole part. The reader records the byte span of
 * every element it wants to change and the output is the original buffer with
 * only those spans replaced, so anything the code does not understand (styles,
 * merges, column widths, extension lists) survives untouched.
 */

use std::collections::{BTreeMap, HashMap, HashSet};

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use super::address::parse_cell_reference;
use crate::errors::DocumentError;

/// `(row, column)`, 1-based
pub type CellKey = (u32, u32);

/// Scalar content of a worksheet cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    /// Shared, inline or plain string
    Text(String),
    /// Number, boolean, error or date serial, kept raw
    Value(String),
    /// Cell backed by a formula; never treated as text
    Formula,
    /// Present in the XML without a value (usually styling only)
    Empty,
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }
}

/// A `<sheet>` element of the workbook part
#[derive(Debug, Clone)]
pub struct SheetRef {
    pub name: String,
    pub sheet_id: u32,
    pub rel_id: String,
}

/// A `<Relationship>` element of a rels part
#[derive(Debug, Clone)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// Byte range `[start, end)` to replace with `bytes`
#[derive(Debug)]
pub struct Splice {
    pub start: usize,
    pub end: usize,
    pub bytes: Vec<u8>,
}

/// Apply non-overlapping splices to `source`
pub fn apply_splices(source: &[u8], mut splices: Vec<Splice>) -> Vec<u8> {
    splices.sort_by_key(|s| s.start);
    let mut out = Vec::with_capacity(source.len() + 256);
    let mut cursor = 0;
    for splice in splices {
        if splice.start < cursor {
            continue;
        }
        out.extend_from_slice(&source[cursor..splice.start]);
        out.extend_from_slice(&splice.bytes);
        cursor = splice.end;
    }
    out.extend_from_slice(&source[cursor..]);
    out
}

fn new_reader(xml: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    reader
}

fn position(reader: &Reader<&[u8]>, part: &str) -> Result<usize, DocumentError> {
    usize::try_from(reader.buffer_position())
        .map_err(|_| DocumentError::Malformed(format!("{} is too large", part)))
}

fn attr(start: &BytesStart<'_>, key: &[u8], part: &str) -> Result<Option<String>, DocumentError> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| DocumentError::xml(part, e))?;
        if attribute.key.as_ref() == key {
            let value = attribute
                .unescape_value()
                .map_err(|e| DocumentError::xml(part, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Value of the first prefixed `*:id` attribute (the relationship id of a sheet)
fn relationship_id(start: &BytesStart<'_>, part: &str) -> Result<Option<String>, DocumentError> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| DocumentError::xml(part, e))?;
        if attribute.key.prefix().is_some() && attribute.key.local_name().as_ref() == b"id" {
            let value = attribute
                .unescape_value()
                .map_err(|e| DocumentError::xml(part, e))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// `x:` for `<x:c>`, empty for `<c>`
fn element_prefix(start: &BytesStart<'_>) -> Vec<u8> {
    let name = start.name();
    let full = name.as_ref();
    match full.iter().position(|b| *b == b':') {
        Some(idx) => full[..=idx].to_vec(),
        None => Vec::new(),
    }
}

/// Re-emit a start tag, dropping attributes listed in `skip`
///
/// Attribute values are copied as raw escaped bytes.
fn rebuild_start_tag(
    start: &BytesStart<'_>,
    skip: &[&[u8]],
    extra: &[(&str, &str)],
    self_closing: bool,
    part: &str,
) -> Result<Vec<u8>, DocumentError> {
    let mut out = Vec::with_capacity(start.len() + 32);
    out.push(b'<');
    out.extend_from_slice(start.name().as_ref());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| DocumentError::xml(part, e))?;
        if skip.contains(&attribute.key.as_ref()) {
            continue;
        }
        out.push(b' ');
        out.extend_from_slice(attribute.key.as_ref());
        out.extend_from_slice(b"=\"");
        for byte in attribute.value.iter() {
            if *byte == b'"' {
                out.extend_from_slice(b"&quot;");
            } else {
                out.push(*byte);
            }
        }
        out.push(b'"');
    }
    for (key, value) in extra {
        out.push(b' ');
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(escape(*value).as_bytes());
        out.push(b'"');
    }
    if self_closing {
        out.extend_from_slice(b"/>");
    } else {
        out.push(b'>');
    }
    Ok(out)
}

/// Collects the visible text of `<si>` / `<is>` content: every `<t>` run,
/// skipping phonetic `<rPh>` runs
#[derive(Default)]
struct RichText {
    text: String,
    in_t: bool,
    phonetic_depth: usize,
}

impl RichText {
    fn start(&mut self, local: &[u8]) {
        match local {
            b"t" => self.in_t = true,
            b"rPh" => self.phonetic_depth += 1,
            _ => {}
        }
    }

    fn end(&mut self, local: &[u8]) {
        match local {
            b"t" => self.in_t = false,
            b"rPh" => self.phonetic_depth = self.phonetic_depth.saturating_sub(1),
            _ => {}
        }
    }

    fn accepts_text(&self) -> bool {
        self.in_t && self.phonetic_depth == 0
    }
}

/// Parse the shared string table
pub fn parse_shared_strings(xml: &[u8], part: &str) -> Result<Vec<String>, DocumentError> {
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<RichText> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| DocumentError::xml(part, e))? {
            Event::Start(s) => {
                let local = s.local_name();
                if local.as_ref() == b"si" {
                    current = Some(RichText::default());
                } else if let Some(rich) = current.as_mut() {
                    rich.start(local.as_ref());
                }
            }
            Event::Empty(s) => {
                if s.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                if local.as_ref() == b"si" {
                    if let Some(rich) = current.take() {
                        strings.push(rich.text);
                    }
                } else if let Some(rich) = current.as_mut() {
                    rich.end(local.as_ref());
                }
            }
            Event::Text(t) => {
                if let Some(rich) = current.as_mut().filter(|r| r.accepts_text()) {
                    let text = t.unescape().map_err(|e| DocumentError::xml(part, e))?;
                    rich.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(rich) = current.as_mut().filter(|r| r.accepts_text()) {
                    rich.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Parse the `<sheet>` list of the workbook part
pub fn parse_workbook_sheets(xml: &[u8], part: &str) -> Result<Vec<SheetRef>, DocumentError> {
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| DocumentError::xml(part, e))? {
            Event::Start(s) | Event::Empty(s) if s.local_name().as_ref() == b"sheet" => {
                let name = attr(&s, b"name", part)?
                    .ok_or_else(|| DocumentError::Malformed("sheet without a name".to_string()))?;
                let sheet_id = attr(&s, b"sheetId", part)?
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
                let rel_id = relationship_id(&s, part)?.ok_or_else(|| {
                    DocumentError::Malformed(format!("sheet '{}' has no relationship id", name))
                })?;
                sheets.push(SheetRef {
                    name,
                    sheet_id,
                    rel_id,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

/// Parse a `.rels` part
pub fn parse_relationships(xml: &[u8], part: &str) -> Result<Vec<Relationship>, DocumentError> {
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| DocumentError::xml(part, e))? {
            Event::Start(s) | Event::Empty(s) if s.local_name().as_ref() == b"Relationship" => {
                let id = attr(&s, b"Id", part)?.unwrap_or_default();
                let rel_type = attr(&s, b"Type", part)?.unwrap_or_default();
                let target = attr(&s, b"Target", part)?.unwrap_or_default();
                let external = attr(&s, b"TargetMode", part)?
                    .is_some_and(|mode| mode.eq_ignore_ascii_case("External"));
                relationships.push(Relationship {
                    id,
                    rel_type,
                    target,
                    external,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(relationships)
}

/// `PartName -> ContentType` for every `<Override>` in `[Content_Types].xml`
pub fn parse_content_overrides(xml: &[u8], part: &str) -> Result<HashMap<String, String>, DocumentError> {
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    let mut overrides = HashMap::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| DocumentError::xml(part, e))? {
            Event::Start(s) | Event::Empty(s) if s.local_name().as_ref() == b"Override" => {
                if let (Some(name), Some(content_type)) =
                    (attr(&s, b"PartName", part)?, attr(&s, b"ContentType", part)?)
                {
                    overrides.insert(name, content_type);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(overrides)
}

/// Byte offset of the first closing tag with the given local name,
/// along with that element's prefix
pub fn closing_tag_offset(
    xml: &[u8],
    part: &str,
    local: &[u8],
) -> Result<Option<(usize, Vec<u8>)>, DocumentError> {
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let before = position(&reader, part)?;
        match reader.read_event_into(&mut buf).map_err(|e| DocumentError::xml(part, e))? {
            Event::End(e) if e.local_name().as_ref() == local => {
                let name = e.name();
                let full = name.as_ref();
                let prefix = match full.iter().position(|b| *b == b':') {
                    Some(idx) => full[..=idx].to_vec(),
                    None => Vec::new(),
                };
                return Ok(Some((before, prefix)));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Prefix and relationship attribute name used by existing `<sheet>` elements,
/// e.g. `("", "r:id")`
pub fn sheet_element_style(xml: &[u8], part: &str) -> Result<Option<(Vec<u8>, Vec<u8>)>, DocumentError> {
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| DocumentError::xml(part, e))? {
            Event::Start(s) | Event::Empty(s) if s.local_name().as_ref() == b"sheet" => {
                let prefix = element_prefix(&s);
                for attribute in s.attributes() {
                    let attribute = attribute.map_err(|e| DocumentError::xml(part, e))?;
                    if attribute.key.prefix().is_some()
                        && attribute.key.local_name().as_ref() == b"id"
                    {
                        return Ok(Some((prefix, attribute.key.as_ref().to_vec())));
                    }
                }
                return Ok(Some((prefix, b"r:id".to_vec())));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// One cell read from a worksheet part
#[derive(Debug, Clone)]
pub struct ParsedCell {
    pub row: u32,
    pub column: u32,
    pub value: CellValue,
}

/// Tracks row/column positions the way spreadsheet readers do when
/// `r` attributes are omitted
#[derive(Default)]
struct GridCursor {
    row: u32,
    last_column: u32,
}

impl GridCursor {
    fn enter_row(&mut self, start: &BytesStart<'_>, part: &str) -> Result<(), DocumentError> {
        self.row = match attr(start, b"r", part)?.and_then(|r| r.parse().ok()) {
            Some(row) => row,
            None => self.row + 1,
        };
        self.last_column = 0;
        Ok(())
    }

    fn place_cell(&mut self, start: &BytesStart<'_>, part: &str) -> Result<CellKey, DocumentError> {
        let (column, row) = match attr(start, b"r", part)?.as_deref().and_then(parse_cell_reference) {
            Some(found) => found,
            None => (self.last_column + 1, self.row.max(1)),
        };
        self.last_column = column;
        Ok((row, column))
    }
}

#[derive(Default)]
struct CellBuilder {
    key: CellKey,
    kind: Option<String>,
    value: Option<String>,
    in_value: bool,
    has_formula: bool,
    inline: Option<RichText>,
}

impl CellBuilder {
    fn finish(self, shared: &[String]) -> ParsedCell {
        let (row, column) = self.key;
        let value = if self.has_formula {
            CellValue::Formula
        } else {
            match self.kind.as_deref() {
                Some("s") => match self.value.as_deref().and_then(|v| v.trim().parse::<usize>().ok()) {
                    Some(index) if index < shared.len() => CellValue::Text(shared[index].clone()),
                    _ => self.value.map(CellValue::Value).unwrap_or(CellValue::Empty),
                },
                Some("inlineStr") => CellValue::Text(self.inline.map(|r| r.text).unwrap_or_default()),
                Some("str") => CellValue::Text(self.value.unwrap_or_default()),
                _ => self.value.map(CellValue::Value).unwrap_or(CellValue::Empty),
            }
        };
        ParsedCell { row, column, value }
    }
}

/// Read every `<c>` element of a worksheet part
pub fn parse_worksheet(xml: &[u8], part: &str, shared: &[String]) -> Result<Vec<ParsedCell>, DocumentError> {
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    let mut cursor = GridCursor::default();
    let mut cells = Vec::new();
    let mut current: Option<CellBuilder> = None;

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| DocumentError::xml(part, e))? {
            Event::Start(s) => {
                let local = s.local_name();
                match (local.as_ref(), current.as_mut()) {
                    (b"row", _) => cursor.enter_row(&s, part)?,
                    (b"c", _) => {
                        current = Some(CellBuilder {
                            key: cursor.place_cell(&s, part)?,
                            kind: attr(&s, b"t", part)?,
                            ..CellBuilder::default()
                        });
                    }
                    (b"v", Some(cell)) => cell.in_value = true,
                    (b"f", Some(cell)) => cell.has_formula = true,
                    (b"is", Some(cell)) => cell.inline = Some(RichText::default()),
                    (other, Some(cell)) => {
                        if let Some(rich) = cell.inline.as_mut() {
                            rich.start(other);
                        }
                    }
                    _ => {}
                }
            }
            Event::Empty(s) => {
                let local = s.local_name();
                match (local.as_ref(), current.as_mut()) {
                    (b"row", _) => cursor.enter_row(&s, part)?,
                    (b"c", _) => {
                        let (row, column) = cursor.place_cell(&s, part)?;
                        cells.push(ParsedCell {
                            row,
                            column,
                            value: CellValue::Empty,
                        });
                    }
                    (b"f", Some(cell)) => cell.has_formula = true,
                    _ => {}
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                match (local.as_ref(), current.as_mut()) {
                    (b"c", Some(_)) => {
                        if let Some(cell) = current.take() {
                            cells.push(cell.finish(shared));
                        }
                    }
                    (b"v", Some(cell)) => cell.in_value = false,
                    (other, Some(cell)) => {
                        if let Some(rich) = cell.inline.as_mut() {
                            rich.end(other);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                if let Some(cell) = current.as_mut() {
                    if cell.in_value {
                        let text = t.unescape().map_err(|e| DocumentError::xml(part, e))?;
                        cell.value.get_or_insert_with(String::new).push_str(&text);
                    } else if let Some(rich) = cell.inline.as_mut().filter(|r| r.accepts_text()) {
                        let text = t.unescape().map_err(|e| DocumentError::xml(part, e))?;
                        rich.text.push_str(&text);
                    }
                }
            }
            Event::CData(c) => {
                if let Some(rich) = current
                    .as_mut()
                    .and_then(|cell| cell.inline.as_mut())
                    .filter(|r| r.accepts_text())
                {
                    rich.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(cells)
}

/// Serialize a replacement `<c>` holding `text` as an inline string.
/// Every original attribute except the type (and value metadata) is kept.
fn inline_string_cell(start: &BytesStart<'_>, text: &str, part: &str) -> Result<Vec<u8>, DocumentError> {
    let prefix = element_prefix(start);
    let mut out = rebuild_start_tag(start, &[b"t", b"vm"], &[("t", "inlineStr")], false, part)?;
    let tag = |out: &mut Vec<u8>, closing: bool, local: &[u8]| {
        out.push(b'<');
        if closing {
            out.push(b'/');
        }
        out.extend_from_slice(&prefix);
        out.extend_from_slice(local);
    };
    tag(&mut out, false, b"is");
    out.push(b'>');
    tag(&mut out, false, b"t");
    out.extend_from_slice(b" xml:space=\"preserve\">");
    out.extend_from_slice(escape(text).as_bytes());
    tag(&mut out, true, b"t");
    out.push(b'>');
    tag(&mut out, true, b"is");
    out.push(b'>');
    tag(&mut out, true, b"c");
    out.push(b'>');
    Ok(out)
}

/// Rewrite the cells named in `edits`, leaving every other byte of the part as it was
pub fn patch_worksheet(
    xml: &[u8],
    part: &str,
    edits: &BTreeMap<CellKey, String>,
) -> Result<Vec<u8>, DocumentError> {
    if edits.is_empty() {
        return Ok(xml.to_vec());
    }
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    let mut cursor = GridCursor::default();
    let mut splices = Vec::new();
    // Start offset and replacement of the cell currently being skipped
    let mut open: Option<(usize, Vec<u8>)> = None;

    loop {
        buf.clear();
        let before = position(&reader, part)?;
        let event = reader.read_event_into(&mut buf).map_err(|e| DocumentError::xml(part, e))?;
        let after = position(&reader, part)?;
        match event {
            Event::Start(s) => match s.local_name().as_ref() {
                b"row" => cursor.enter_row(&s, part)?,
                b"c" => {
                    let key = cursor.place_cell(&s, part)?;
                    if let Some(text) = edits.get(&key) {
                        open = Some((before, inline_string_cell(&s, text, part)?));
                    }
                }
                _ => {}
            },
            Event::Empty(s) => match s.local_name().as_ref() {
                b"row" => cursor.enter_row(&s, part)?,
                b"c" => {
                    let key = cursor.place_cell(&s, part)?;
                    if let Some(text) = edits.get(&key) {
                        splices.push(Splice {
                            start: before,
                            end: after,
                            bytes: inline_string_cell(&s, text, part)?,
                        });
                    }
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"c" => {
                if let Some((start, bytes)) = open.take() {
                    splices.push(Splice {
                        start,
                        end: after,
                        bytes,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(apply_splices(xml, splices))
}

/// Worksheet children that point at other package parts through relationship ids
const RELATIONSHIP_BOUND: &[&[u8]] = &[
    b"drawing",
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"tableParts",
    b"hyperlinks",
    b"AlternateContent",
];

/// Prepare a worksheet part for use as a copy: drop elements that reference
/// relationships of the source sheet and clear the selected-tab flag
pub fn strip_for_copy(xml: &[u8], part: &str) -> Result<Vec<u8>, DocumentError> {
    let skip: HashSet<&[u8]> = RELATIONSHIP_BOUND.iter().copied().collect();
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    let mut splices = Vec::new();
    let mut depth: usize = 0;
    // (start offset, depth of the element being dropped)
    let mut dropping: Option<(usize, usize)> = None;

    loop {
        buf.clear();
        let before = position(&reader, part)?;
        let event = reader.read_event_into(&mut buf).map_err(|e| DocumentError::xml(part, e))?;
        let after = position(&reader, part)?;
        match event {
            Event::Start(s) => {
                depth += 1;
                if dropping.is_none() {
                    let local = s.local_name();
                    if depth == 2 && skip.contains(local.as_ref()) {
                        dropping = Some((before, depth));
                    } else if local.as_ref() == b"sheetView" {
                        splices.push(Splice {
                            start: before,
                            end: after,
                            bytes: rebuild_start_tag(&s, &[b"tabSelected"], &[], false, part)?,
                        });
                    }
                }
            }
            Event::Empty(s) => {
                if dropping.is_none() {
                    let local = s.local_name();
                    if depth == 1 && skip.contains(local.as_ref()) {
                        splices.push(Splice {
                            start: before,
                            end: after,
                            bytes: Vec::new(),
                        });
                    } else if local.as_ref() == b"sheetView" {
                        splices.push(Splice {
                            start: before,
                            end: after,
                            bytes: rebuild_start_tag(&s, &[b"tabSelected"], &[], true, part)?,
                        });
                    }
                }
            }
            Event::End(_) => {
                if let Some((start, level)) = dropping {
                    if level == depth {
                        splices.push(Splice {
                            start,
                            end: after,
                            bytes: Vec::new(),
                        });
                        dropping = None;
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(apply_splices(xml, splices))
}
