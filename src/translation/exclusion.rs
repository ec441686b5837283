/*!
 * Cell exclusion rules.
 *
 * Users exclude cells by address (`B2`, `Sheet1!B2`), rectangular range
 * (`A1:C5`, `A:C`, `2:4`, optionally sheet-qualified), sheet name, or a
 * case-insensitive substring of the cell text.
 */

use log::warn;

use crate::document::{letters_to_column, parse_cell_reference};
use crate::document::address::{MAX_COLUMN, MAX_ROW, unquote_sheet_name};

/// Rectangular block of cells, bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub min_col: u32,
    pub min_row: u32,
    pub max_col: u32,
    pub max_row: u32,
}

impl CellRange {
    pub fn contains(&self, column: u32, row: u32) -> bool {
        (self.min_col..=self.max_col).contains(&column) && (self.min_row..=self.max_row).contains(&row)
    }

    /// Parse `A1:C5`, `A:C`, `2:4` or a single `B2`
    fn parse(text: &str) -> Option<Self> {
        let (start, end) = text.split_once(':').unwrap_or((text, text));
        let start = start.trim().replace('$', "");
        let end = end.trim().replace('$', "");

        if let (Some((c1, r1)), Some((c2, r2))) = (parse_cell_reference(&start), parse_cell_reference(&end)) {
            return Some(Self::ordered(c1, r1, c2, r2));
        }
        // whole columns and rows need the colon form
        if !text.contains(':') {
            return None;
        }
        if let (Some(c1), Some(c2)) = (letters_to_column(&start), letters_to_column(&end)) {
            return Some(Self::ordered(c1, 1, c2, MAX_ROW));
        }
        if let (Ok(r1), Ok(r2)) = (start.parse::<u32>(), end.parse::<u32>()) {
            if r1 == 0 || r2 == 0 {
                return None;
            }
            return Some(Self::ordered(1, r1, MAX_COLUMN, r2));
        }
        None
    }

    fn ordered(c1: u32, r1: u32, c2: u32, r2: u32) -> Self {
        Self {
            min_col: c1.min(c2),
            min_row: r1.min(r2),
            max_col: c1.max(c2),
            max_row: r1.max(r2),
        }
    }
}

/// One exclusion rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionRule {
    /// Cell block; an unqualified rule applies to every sheet
    Cells { sheet: Option<String>, range: CellRange },
    /// Whole sheet by name
    Sheet(String),
    /// Lowercased substring of the cell text
    Pattern(String),
}

impl ExclusionRule {
    /// Parse an address or range entry, with or without a sheet qualifier
    pub fn parse_address(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        let (sheet, reference) = match entry.rsplit_once('!') {
            Some((sheet, reference)) => {
                let sheet = unquote_sheet_name(sheet.trim());
                if sheet.is_empty() {
                    return None;
                }
                (Some(sheet), reference)
            }
            None => (None, entry),
        };
        CellRange::parse(reference).map(|range| Self::Cells { sheet, range })
    }
}

/// Split a comma or newline separated list, dropping blanks
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split([',', '\n', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rules grouped by kind, evaluated sheet, then cells, then patterns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionRules {
    sheets: Vec<String>,
    cells: Vec<(Option<String>, CellRange)>,
    patterns: Vec<String>,
}

impl ExclusionRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build rules from the three user lists. Unparseable addresses are logged and skipped.
    pub fn from_lists<S: AsRef<str>>(addresses: &[S], sheets: &[S], patterns: &[S]) -> Self {
        let mut rules = Self::new();
        for entry in addresses {
            match ExclusionRule::parse_address(entry.as_ref()) {
                Some(rule) => rules.push(rule),
                None => warn!("Ignoring invalid exclusion address '{}'", entry.as_ref()),
            }
        }
        for sheet in sheets {
            let sheet = sheet.as_ref().trim();
            if !sheet.is_empty() {
                rules.push(ExclusionRule::Sheet(sheet.to_string()));
            }
        }
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if !pattern.is_empty() {
                rules.push(ExclusionRule::Pattern(pattern.to_lowercase()));
            }
        }
        rules
    }

    pub fn push(&mut self, rule: ExclusionRule) {
        match rule {
            ExclusionRule::Cells { sheet, range } => self.cells.push((sheet, range)),
            ExclusionRule::Sheet(name) => self.sheets.push(name),
            ExclusionRule::Pattern(p) => self.patterns.push(p.to_lowercase()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty() && self.cells.is_empty() && self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sheets.len() + self.cells.len() + self.patterns.len()
    }

    /// Whether a whole sheet is excluded
    pub fn excludes_sheet(&self, sheet: &str) -> bool {
        self.sheets.iter().any(|s| s == sheet)
    }

    /// Whether the cell at (`column`, `row`) of `sheet` holding `text` is excluded
    pub fn matches(&self, sheet: &str, column: u32, row: u32, text: &str) -> bool {
        if self.excludes_sheet(sheet) {
            return true;
        }
        let by_address = self.cells.iter().any(|(rule_sheet, range)| {
            rule_sheet.as_deref().map_or(true, |s| s == sheet) && range.contains(column, row)
        });
        if by_address {
            return true;
        }
        if self.patterns.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.patterns.iter().any(|p| lowered.contains(p.as_str()))
    }
}
