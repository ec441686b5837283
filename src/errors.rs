/*!
 * Error types for the sheet-translator application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to a translation backend
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The call did not finish within its time budget
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(0)
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors raised while reading, editing or writing a spreadsheet package
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip container could not be read or written
    #[error("Package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A package part is not well-formed XML
    #[error("XML error in {part}: {message}")]
    Xml {
        /// Part name inside the package
        part: String,
        /// Parser message
        message: String,
    },

    /// A part the workbook requires is absent
    #[error("Missing package part: {0}")]
    MissingPart(String),

    /// A cell reference could not be parsed
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// A sheet name does not exist in the workbook
    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),

    /// Any other structural problem
    #[error("Malformed workbook: {0}")]
    Malformed(String),
}

impl DocumentError {
    /// Build an XML error tagged with the part it came from
    pub fn xml(part: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Xml {
            part: part.into(),
            message: error.to_string(),
        }
    }
}

/// Errors reported by the job registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// No job with that id is tracked
    #[error("Job not found: {0}")]
    NotFound(String),

    /// A transition out of a terminal state, or out of order
    #[error("Invalid job transition for {id}: {from} -> {to}")]
    InvalidTransition {
        /// Job id
        id: String,
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// The job has not produced a result yet
    #[error("Job {0} is not completed yet")]
    NotReady(String),

    /// The job ended in failure
    #[error("Job {id} failed: {message}")]
    Failed {
        /// Job id
        id: String,
        /// Failure message
        message: String,
    },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a backend
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the document layer
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Error from job handling
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
