/*!
 * Cell translation for spreadsheet documents.
 *
 * This module contains everything between an opened workbook and its
 * translated copy. It is split into several submodules:
 *
 * - `dictionary`: the bidirectional term table
 * - `resolver`: dictionary-first resolution with a backend cascade
 * - `exclusion`: user supplied rules for cells to leave alone
 * - `walker`: iteration over translatable cells
 * - `reinject`: writing translations back by address
 */

use serde::{Deserialize, Serialize};

use crate::document::CellAddress;

// Re-export main types for easier usage
pub use self::dictionary::{DictionaryMatch, TermTable, TranslationDictionary};
pub use self::exclusion::{ExclusionRule, ExclusionRules};
pub use self::reinject::{ReinjectionReport, apply_translations};
pub use self::resolver::{Resolution, ResolutionMethod, TranslationOutcome, TranslationResolver};
pub use self::walker::{CellWalker, for_each_translatable_cell};

// Submodules
pub mod dictionary;
pub mod exclusion;
pub mod reinject;
pub mod resolver;
pub mod walker;

/// One translated cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub address: CellAddress,
    pub original_text: String,
    pub translated_text: String,
}

impl TranslationEntry {
    pub fn new(address: CellAddress, original_text: impl Into<String>, translated_text: impl Into<String>) -> Self {
        Self {
            address,
            original_text: original_text.into(),
            translated_text: translated_text.into(),
        }
    }
}
