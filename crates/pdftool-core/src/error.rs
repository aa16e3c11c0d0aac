use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfToolError {
    #[error("Failed to parse PDF: {0}")]
    CorruptDocument(String),

    #[error("Invalid page range: {0}")]
    InvalidPageRange(#[from] RangeError),

    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),

    #[error("Failed to decode image: {0}")]
    InvalidImage(String),

    #[error("{operation} needs at least {required} input(s), got {given}")]
    EmptyInputSet {
        operation: &'static str,
        required: usize,
        given: usize,
    },

    #[error("Watermark text must not be empty")]
    EmptyWatermark,

    #[error("Failed to write PDF: {0}")]
    SerializationFailure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a page selection was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("start page must be at least 1, got {start}")]
    StartBelowOne { start: u32 },

    #[error("end page {end} exceeds document length of {total} pages")]
    EndBeyondDocument { end: u32, total: u32 },

    #[error("start page {start} is after end page {end}")]
    StartAfterEnd { start: u32, end: u32 },

    #[error("document has no pages to select")]
    EmptyDocument,

    #[error("{selector} selects no pages in a {total}-page document")]
    NothingSelected { selector: &'static str, total: u32 },

    #[error("{0}")]
    Syntax(String),
}

impl PdfToolError {
    pub(crate) fn empty_input(operation: &'static str, required: usize, given: usize) -> Self {
        PdfToolError::EmptyInputSet {
            operation,
            required,
            given,
        }
    }
}

impl From<lopdf::Error> for PdfToolError {
    fn from(err: lopdf::Error) -> Self {
        PdfToolError::CorruptDocument(err.to_string())
    }
}
