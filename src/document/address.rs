/*!
 * Cell addressing.
 *
 * `CellAddress` is the key that ties extracted text, externally produced
 * translations and reinjection targets together. Its canonical text form is
 * `Sheet!A1`.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DocumentError;

/// Largest column index a worksheet can hold (XFD)
pub const MAX_COLUMN: u32 = 16_384;

/// Largest row index a worksheet can hold
pub const MAX_ROW: u32 = 1_048_576;

/// A sheet-qualified cell coordinate, 1-based
///
/// Ordering is sheet name first, then row-major.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub sheet: String,
    pub row: u32,
    pub column: u32,
}

impl CellAddress {
    pub fn new(sheet: impl Into<String>, column: u32, row: u32) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            column,
        }
    }

    /// The unqualified reference, e.g. `B12`
    pub fn reference(&self) -> String {
        format!("{}{}", column_to_letters(self.column), self.row)
    }

    /// `Sheet!A1`, or `'My Sheet'!A1` when the sheet name holds anything
    /// besides letters, digits, `_` and `.`
    ///
    /// Embedded quotes are doubled, so the result always parses back to the
    /// same address.
    pub fn quoted(&self) -> String {
        let reference = self.reference();
        if self.sheet.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            format!("{}!{}", self.sheet, reference)
        } else {
            format!("'{}'!{}", self.sheet.replace('\'', "''"), reference)
        }
    }

    /// Parse `Sheet!A1`, `'My Sheet'!$B$2` and similar
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let trimmed = text.trim();
        let (sheet, reference) = trimmed
            .rsplit_once('!')
            .ok_or_else(|| DocumentError::InvalidAddress(text.to_string()))?;
        let sheet = unquote_sheet_name(sheet.trim());
        if sheet.is_empty() {
            return Err(DocumentError::InvalidAddress(text.to_string()));
        }
        let (column, row) = parse_cell_reference(reference.trim())
            .ok_or_else(|| DocumentError::InvalidAddress(text.to_string()))?;
        Ok(Self::new(sheet, column, row))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}{}", self.sheet, column_to_letters(self.column), self.row)
    }
}

impl FromStr for CellAddress {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Strip surrounding single quotes and unescape doubled quotes
pub fn unquote_sheet_name(name: &str) -> String {
    if name.len() >= 2 && name.starts_with('\'') && name.ends_with('\'') {
        name[1..name.len() - 1].replace("''", "'")
    } else {
        name.to_string()
    }
}

/// 1 -> A, 27 -> AA, 16384 -> XFD
pub fn column_to_letters(mut column: u32) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Inverse of [`column_to_letters`]; case-insensitive, at most three letters
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut column: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        column = column * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    (column <= MAX_COLUMN).then_some(column)
}

/// Parse an unqualified reference such as `A1`, `$c$12` or `xfd1048576`
/// into `(column, row)`
pub fn parse_cell_reference(reference: &str) -> Option<(u32, u32)> {
    let cleaned: String = reference.chars().filter(|c| *c != '$').collect();
    let split = cleaned.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cleaned.split_at(split);
    let column = letters_to_column(letters)?;
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 || row > MAX_ROW {
        return None;
    }
    Some((column, row))
}
