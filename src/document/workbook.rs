use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use log::{debug, warn};

use super::address::CellAddress;
use super::package::Package;
use super::xml::{self, CellKey, CellValue, Relationship};
use crate::errors::DocumentError;

const ROOT_RELS: &str = "_rels/.rels";
const CONTENT_TYPES: &str = "[Content_Types].xml";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

/// Longest sheet name a workbook accepts
pub const MAX_SHEET_NAME_CHARS: usize = 31;

/// A worksheet and its cells as found in the package
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    part_name: String,
    rel_id: String,
    sheet_id: u32,
    /// Name of the sheet this one was copied from, for translated copies
    origin: Option<String>,
    cells: BTreeMap<CellKey, CellValue>,
    edits: BTreeMap<CellKey, String>,
}

impl Worksheet {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// The name exclusion rules are evaluated against: the source sheet for copies
    pub fn rule_name(&self) -> &str {
        self.origin.as_deref().unwrap_or(&self.name)
    }

    pub fn cell(&self, column: u32, row: u32) -> Option<&CellValue> {
        self.cells.get(&(row, column))
    }

    /// Text cells in row-major order
    pub fn text_cells(&self) -> impl Iterator<Item = (CellAddress, &str)> + '_ {
        self.cells.iter().filter_map(move |((row, column), value)| {
            value
                .as_text()
                .map(|text| (CellAddress::new(self.name.clone(), *column, *row), text))
        })
    }
}

/// An opened `.xlsx` workbook that supports in-place cell text edits
///
/// The workbook keeps the whole package in memory. Saving writes every part
/// back unchanged except worksheet parts with edits and parts added by
/// [`Workbook::duplicate_sheet`].
#[derive(Debug, Clone)]
pub struct Workbook {
    package: Package,
    workbook_part: String,
    shared_strings: Vec<String>,
    sheets: Vec<Worksheet>,
}

impl Workbook {
    /// Open and index the workbook at `path`
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let package = Package::open(path)?;
        Self::from_package(package)
    }

    pub fn from_package(package: Package) -> Result<Self, DocumentError> {
        let workbook_part = locate_workbook_part(&package)?;
        let workbook_xml = package.require_part(&workbook_part)?;
        let sheet_refs = xml::parse_workbook_sheets(workbook_xml, &workbook_part)?;

        let rels_part = rels_part_for(&workbook_part);
        let relationships = match package.part(&rels_part) {
            Some(bytes) => xml::parse_relationships(bytes, &rels_part)?,
            None => Vec::new(),
        };
        let base_dir = parent_dir(&workbook_part);

        let shared_strings = match relationships
            .iter()
            .find(|r| r.rel_type.ends_with("/sharedStrings"))
        {
            Some(rel) => {
                let part = resolve_target(&base_dir, &rel.target);
                match package.part(&part) {
                    Some(bytes) => xml::parse_shared_strings(bytes, &part)?,
                    None => Vec::new(),
                }
            }
            None => Vec::new(),
        };

        let mut sheets = Vec::with_capacity(sheet_refs.len());
        for sheet_ref in sheet_refs {
            let Some(rel) = relationships.iter().find(|r| r.id == sheet_ref.rel_id) else {
                warn!("Sheet '{}' has no relationship entry, skipping", sheet_ref.name);
                continue;
            };
            if !rel.rel_type.ends_with("/worksheet") {
                // chartsheets and dialog sheets hold no cells
                debug!("Skipping non-worksheet sheet '{}'", sheet_ref.name);
                continue;
            }
            let part_name = resolve_target(&base_dir, &rel.target);
            let bytes = package.require_part(&part_name)?;
            let cells = xml::parse_worksheet(bytes, &part_name, &shared_strings)?
                .into_iter()
                .map(|cell| ((cell.row, cell.column), cell.value))
                .collect();
            sheets.push(Worksheet {
                name: sheet_ref.name,
                part_name,
                rel_id: sheet_ref.rel_id,
                sheet_id: sheet_ref.sheet_id,
                origin: None,
                cells,
                edits: BTreeMap::new(),
            });
        }

        debug!("Opened workbook with {} worksheet(s)", sheets.len());
        Ok(Self {
            package,
            workbook_part,
            shared_strings,
            sheets,
        })
    }

    pub fn sheets(&self) -> &[Worksheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    /// Underlying package, including edits not yet flushed
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Current text of a cell, if it holds a string
    pub fn cell_text(&self, address: &CellAddress) -> Option<&str> {
        self.sheet(&address.sheet)?
            .cell(address.column, address.row)?
            .as_text()
    }

    /// Set a cell's value to `text`.
    ///
    /// Returns `false` when the sheet or cell does not exist in the document,
    /// or when the cell holds a formula.
    pub fn set_text(&mut self, address: &CellAddress, text: &str) -> bool {
        let Some(sheet) = self.sheets.iter_mut().find(|s| s.name == address.sheet) else {
            return false;
        };
        let key = (address.row, address.column);
        match sheet.cells.get_mut(&key) {
            Some(CellValue::Formula) | None => false,
            Some(value) => {
                *value = CellValue::Text(text.to_string());
                sheet.edits.insert(key, text.to_string());
                true
            }
        }
    }

    /// Write pending edits of every sheet into the in-memory package
    pub fn flush_edits(&mut self) -> Result<(), DocumentError> {
        for index in 0..self.sheets.len() {
            self.flush_sheet(index)?;
        }
        Ok(())
    }

    fn flush_sheet(&mut self, index: usize) -> Result<(), DocumentError> {
        let sheet = &mut self.sheets[index];
        if sheet.edits.is_empty() {
            return Ok(());
        }
        let original = self.package.require_part(&sheet.part_name)?;
        let patched = xml::patch_worksheet(original, &sheet.part_name, &sheet.edits)?;
        debug!("Patched {} cell(s) in {}", sheet.edits.len(), sheet.part_name);
        sheet.edits.clear();
        let part_name = sheet.part_name.clone();
        self.package.set_part(&part_name, patched);
        Ok(())
    }

    /// Append a copy of sheet `source` named `requested_name` (made unique and
    /// cut to the name length limit). Returns the name actually used.
    ///
    /// The copy keeps cells, styles, merges and sizing. Drawings, tables,
    /// comments and other relationship-bound content stay with the source.
    pub fn duplicate_sheet(&mut self, source: &str, requested_name: &str) -> Result<String, DocumentError> {
        let index = self
            .sheets
            .iter()
            .position(|s| s.name == source)
            .ok_or_else(|| DocumentError::UnknownSheet(source.to_string()))?;
        self.flush_sheet(index)?;

        let name = self.unique_sheet_name(requested_name);
        let source_sheet = self.sheets[index].clone();
        let source_xml = self.package.require_part(&source_sheet.part_name)?;
        let copy_xml = xml::strip_for_copy(source_xml, &source_sheet.part_name)?;

        let part_name = self.next_worksheet_part(&source_sheet.part_name);
        let rels_part = rels_part_for(&self.workbook_part);
        let relationships = match self.package.part(&rels_part) {
            Some(bytes) => xml::parse_relationships(bytes, &rels_part)?,
            None => Vec::new(),
        };
        let rel_id = next_relationship_id(&relationships);
        let rel_type = relationships
            .iter()
            .find(|r| r.id == source_sheet.rel_id)
            .map(|r| r.rel_type.clone())
            .ok_or_else(|| DocumentError::Malformed(format!("no relationship for sheet '{}'", source)))?;
        let sheet_id = self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0) + 1;

        self.append_workbook_sheet(&name, sheet_id, &rel_id)?;
        self.append_relationship(&rels_part, &rel_id, &rel_type, &part_name)?;
        self.append_content_override(&source_sheet.part_name, &part_name)?;
        self.package.set_part(&part_name, copy_xml);

        debug!("Copied sheet '{}' to '{}' ({})", source, name, part_name);
        self.sheets.push(Worksheet {
            name: name.clone(),
            part_name,
            rel_id,
            sheet_id,
            origin: Some(source.to_string()),
            cells: source_sheet.cells,
            edits: BTreeMap::new(),
        });
        Ok(name)
    }

    /// Flush pending edits and write the package to `path`
    pub fn save(&mut self, path: &Path) -> Result<(), DocumentError> {
        self.flush_edits()?;
        self.package.write_to(path)
    }

    fn unique_sheet_name(&self, requested: &str) -> String {
        let taken: HashSet<String> = self.sheets.iter().map(|s| s.name.to_lowercase()).collect();
        let cleaned: String = requested
            .chars()
            .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { '_' } else { c })
            .collect();
        let base: String = cleaned.chars().take(MAX_SHEET_NAME_CHARS).collect();
        if !taken.contains(&base.to_lowercase()) {
            return base;
        }
        let mut counter = 2;
        loop {
            let suffix = format!(" ({})", counter);
            let keep = MAX_SHEET_NAME_CHARS.saturating_sub(suffix.chars().count());
            let candidate: String = cleaned.chars().take(keep).chain(suffix.chars()).collect();
            if !taken.contains(&candidate.to_lowercase()) {
                return candidate;
            }
            counter += 1;
        }
    }

    fn next_worksheet_part(&self, source_part: &str) -> String {
        let dir = parent_dir(source_part);
        let mut n = self.sheets.len() + 1;
        loop {
            let candidate = format!("{}sheet{}.xml", dir, n);
            if !self.package.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn append_workbook_sheet(&mut self, name: &str, sheet_id: u32, rel_id: &str) -> Result<(), DocumentError> {
        let part = self.workbook_part.clone();
        let bytes = self.package.require_part(&part)?;
        let (prefix, id_attr) = xml::sheet_element_style(bytes, &part)?
            .unwrap_or_else(|| (Vec::new(), b"r:id".to_vec()));
        let (offset, _) = xml::closing_tag_offset(bytes, &part, b"sheets")?
            .ok_or_else(|| DocumentError::Malformed(format!("{} has no sheets list", part)))?;

        let mut element = Vec::new();
        element.push(b'<');
        element.extend_from_slice(&prefix);
        element.extend_from_slice(
            format!(
                "sheet name=\"{}\" sheetId=\"{}\" ",
                quick_xml::escape::escape(name),
                sheet_id
            )
            .as_bytes(),
        );
        element.extend_from_slice(&id_attr);
        element.extend_from_slice(format!("=\"{}\"/>", rel_id).as_bytes());

        let updated = insert_at(bytes, offset, &element);
        self.package.set_part(&part, updated);
        Ok(())
    }

    fn append_relationship(
        &mut self,
        rels_part: &str,
        rel_id: &str,
        rel_type: &str,
        part_name: &str,
    ) -> Result<(), DocumentError> {
        let bytes = self.package.require_part(rels_part)?;
        let (offset, prefix) = xml::closing_tag_offset(bytes, rels_part, b"Relationships")?
            .ok_or_else(|| DocumentError::Malformed(format!("{} has no root", rels_part)))?;
        let target = relative_target(&parent_dir(&self.workbook_part), part_name);
        let mut element = Vec::new();
        element.push(b'<');
        element.extend_from_slice(&prefix);
        element.extend_from_slice(
            format!(
                "Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"/>",
                rel_id,
                quick_xml::escape::escape(rel_type),
                quick_xml::escape::escape(target.as_str())
            )
            .as_bytes(),
        );
        let updated = insert_at(bytes, offset, &element);
        self.package.set_part(rels_part, updated);
        Ok(())
    }

    fn append_content_override(&mut self, source_part: &str, part_name: &str) -> Result<(), DocumentError> {
        let bytes = self.package.require_part(CONTENT_TYPES)?;
        let overrides = xml::parse_content_overrides(bytes, CONTENT_TYPES)?;
        let content_type = overrides
            .get(&format!("/{}", source_part))
            .cloned()
            .unwrap_or_else(|| WORKSHEET_CONTENT_TYPE.to_string());
        let (offset, prefix) = xml::closing_tag_offset(bytes, CONTENT_TYPES, b"Types")?
            .ok_or_else(|| DocumentError::Malformed("content types part has no root".to_string()))?;
        let mut element = Vec::new();
        element.push(b'<');
        element.extend_from_slice(&prefix);
        element.extend_from_slice(
            format!(
                "Override PartName=\"/{}\" ContentType=\"{}\"/>",
                quick_xml::escape::escape(part_name),
                quick_xml::escape::escape(content_type.as_str())
            )
            .as_bytes(),
        );
        let updated = insert_at(bytes, offset, &element);
        self.package.set_part(CONTENT_TYPES, updated);
        Ok(())
    }

    /// Shared strings as read from the package; edits never modify this table
    pub fn shared_strings(&self) -> &[String] {
        &self.shared_strings
    }
}

fn insert_at(source: &[u8], offset: usize, bytes: &[u8]) -> Vec<u8> {
    xml::apply_splices(
        source,
        vec![xml::Splice {
            start: offset,
            end: offset,
            bytes: bytes.to_vec(),
        }],
    )
}

fn locate_workbook_part(package: &Package) -> Result<String, DocumentError> {
    let Some(bytes) = package.part(ROOT_RELS) else {
        return Ok(DEFAULT_WORKBOOK_PART.to_string());
    };
    let relationships = xml::parse_relationships(bytes, ROOT_RELS)?;
    Ok(relationships
        .iter()
        .find(|r| r.rel_type.ends_with("/officeDocument"))
        .map(|r| resolve_target("", &r.target))
        .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string()))
}

fn next_relationship_id(relationships: &[Relationship]) -> String {
    let taken: HashSet<&str> = relationships.iter().map(|r| r.id.as_str()).collect();
    let mut n = relationships.len() + 1;
    loop {
        let candidate = format!("rId{}", n);
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

/// `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`
fn rels_part_for(part: &str) -> String {
    let dir = parent_dir(part);
    let file = &part[dir.len()..];
    format!("{}_rels/{}.rels", dir, file)
}

/// Directory of a part name including the trailing slash, or empty
fn parent_dir(part: &str) -> String {
    match part.rfind('/') {
        Some(idx) => part[..=idx].to_string(),
        None => String::new(),
    }
}

/// Resolve a relationship target against the directory of its source part
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    let joined = if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        format!("{}{}", base_dir, target)
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn relative_target(base_dir: &str, part_name: &str) -> String {
    match part_name.strip_prefix(base_dir) {
        Some(relative) if !base_dir.is_empty() => relative.to_string(),
        _ => format!("/{}", part_name),
    }
}
