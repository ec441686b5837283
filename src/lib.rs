/*!
 * # sheet-translator
 *
 * A Rust library for translating the text cells of .xlsx workbooks between
 * Korean and Chinese.
 *
 * ## Features
 *
 * - Dictionary-first translation with a cascade of machine translation backends:
 *   - Google Translate (public endpoint)
 *   - LibreTranslate mirrors
 *   - HuggingFace inference models
 *   - Ollama (local LLM)
 * - Latin-only cells (codes, part numbers) are preserved
 * - Exclusion of cells, ranges, sheets and text patterns
 * - In-place translation or translation into copied sheets
 * - Every part of the document other than edited cells is kept byte for byte
 * - Out-of-process round trip: extract an address-tagged payload, reconcile the reply
 * - Asynchronous jobs with monotonic progress and retention of results
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: OOXML package, worksheet XML and cell addressing
 * - `translation`: Dictionary, resolver cascade, exclusions and cell walking
 * - `extraction`: Payload extraction, archiving and reply reconciliation
 * - `jobs`: Job registry, progress reporting and the job service
 * - `providers`: Client implementations for the translation backends
 * - `file_utils`: File system operations
 * - `app_controller`: Command line controller with progress bars
 * - `language_utils`: Script detection and translation direction
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod document;
pub mod errors;
pub mod extraction;
pub mod file_utils;
pub mod jobs;
pub mod language_utils;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use document::{CellAddress, Workbook};
pub use errors::{AppError, DocumentError, JobError, ProviderError};
pub use jobs::{JobService, JobSnapshot, JobStatus, TranslationRequest};
pub use language_utils::Direction;
pub use translation::{TranslationDictionary, TranslationResolver};
