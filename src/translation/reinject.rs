use log::debug;
use std::collections::BTreeMap;

use crate::document::{CellAddress, Workbook};

/// Counts reported by [`apply_translations`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReinjectionReport {
    /// Cells whose value was replaced
    pub applied: usize,
    /// Addresses with no writable cell (missing sheet or cell, formula)
    pub ignored: usize,
}

/// Write every mapped translation into its cell.
///
/// Cells are written as inline strings with their style kept; nothing else in
/// the workbook changes. Addresses without a matching cell are skipped silently.
pub fn apply_translations(workbook: &mut Workbook, translations: &BTreeMap<CellAddress, String>) -> ReinjectionReport {
    let mut report = ReinjectionReport::default();
    for (address, text) in translations {
        if workbook.set_text(address, text) {
            report.applied += 1;
        } else {
            report.ignored += 1;
        }
    }
    debug!("Reinjected {} cell(s), ignored {}", report.applied, report.ignored);
    report
}
