use log::debug;

use crate::document::{CellAddress, Workbook, Worksheet};
use crate::translation::exclusion::ExclusionRules;

/// Iterates the populated text cells of a workbook, honouring exclusions
///
/// The walker is script-agnostic: every non-blank string cell that survives
/// the exclusion rules is visited, in sheet order and then row-major order.
#[derive(Debug, Clone, Default)]
pub struct CellWalker {
    rules: ExclusionRules,
}

impl CellWalker {
    pub fn new(rules: ExclusionRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ExclusionRules {
        &self.rules
    }

    /// Visitable cells of one sheet, or `None` when the whole sheet is excluded.
    ///
    /// Copied sheets are matched against rules by the name of their source sheet.
    pub fn sheet_cells(&self, sheet: &Worksheet) -> Option<Vec<(CellAddress, String)>> {
        let rule_name = sheet.rule_name();
        if self.rules.excludes_sheet(rule_name) {
            debug!("Sheet '{}' excluded", sheet.name());
            return None;
        }
        let cells = sheet
            .text_cells()
            .filter(|(_, text)| !text.trim().is_empty())
            .filter(|(address, text)| !self.rules.matches(rule_name, address.column, address.row, text))
            .map(|(address, text)| (address, text.to_string()))
            .collect();
        Some(cells)
    }

    /// Call `visit` for every translatable cell of `workbook`
    pub fn for_each_translatable_cell<F>(&self, workbook: &Workbook, mut visit: F)
    where
        F: FnMut(&CellAddress, &str),
    {
        for sheet in workbook.sheets() {
            for (address, text) in self.sheet_cells(sheet).unwrap_or_default() {
                visit(&address, &text);
            }
        }
    }
}

/// Call `visit` for every cell of `workbook` not excluded by `rules`
pub fn for_each_translatable_cell<F>(workbook: &Workbook, rules: &ExclusionRules, visit: F)
where
    F: FnMut(&CellAddress, &str),
{
    CellWalker::new(rules.clone()).for_each_translatable_cell(workbook, visit);
}
