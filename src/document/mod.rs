/*!
 * Spreadsheet document layer.
 *
 * Opens Office Open XML workbooks (`.xlsx`), exposes their sheets and cell
 * values, and writes edited copies. Edits are applied as byte-span patches
 * on the affected worksheet parts only; every other part of the package is
 * written back as it was read.
 *
 * - `address`: sheet-qualified cell coordinates
 * - `package`: the zip container
 * - `xml`: part parsing and patching
 * - `workbook`: the editable workbook model
 */

pub mod address;
pub mod package;
pub mod workbook;
pub mod xml;

pub use address::{CellAddress, column_to_letters, letters_to_column, parse_cell_reference};
pub use package::Package;
pub use workbook::{Workbook, Worksheet};
pub use xml::CellValue;
