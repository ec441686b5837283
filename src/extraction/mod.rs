/*!
 * Out-of-process translation round trip.
 *
 * Extraction serializes the cells that need translation into an
 * address-tagged payload and archives the workbook under a token.
 * Reconciliation parses the reply that comes back and maps it onto the
 * archived copy by address.
 *
 * - `payload`: cell selection and the instruction text
 * - `archive`: token-keyed workbook copies with checksums
 * - `reconcile`: the two-pass reply parser
 */

pub mod archive;
pub mod payload;
pub mod reconcile;

pub use archive::{ArchiveManifest, ExtractionArchive};
pub use payload::{ExtractedCell, ExtractionPayload};
pub use reconcile::{ReconcilePass, ReconciliationOutcome, reconcile};
