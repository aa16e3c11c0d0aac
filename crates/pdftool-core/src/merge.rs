//! Byte-level merge
//!
//! Loads every input (in parallel when allowed), merges the page sequences
//! and writes the result.

use rayon::prelude::*;

use crate::compose;
use crate::config::ComposeOptions;
use crate::document::Document;
use crate::error::PdfToolError;
use crate::serialize::serialize_with;

/// Merge PDFs with default options and no progress reporting
pub fn merge_documents(documents: &[Vec<u8>]) -> Result<Vec<u8>, PdfToolError> {
    merge_documents_with(documents, &ComposeOptions::default(), crate::progress::ignore)
}

pub fn merge_documents_with<F: FnMut(u8)>(
    documents: &[Vec<u8>],
    options: &ComposeOptions,
    on_progress: F,
) -> Result<Vec<u8>, PdfToolError> {
    if documents.len() < 2 {
        return Err(PdfToolError::empty_input("merge", 2, documents.len()));
    }

    let loaded = load_all(documents, options.parallel)?;
    let merged = compose::merge(&loaded, on_progress)?;
    serialize_with(&merged, options)
}

/// Load each buffer; the first failure in input order is reported
pub(crate) fn load_all(buffers: &[Vec<u8>], parallel: bool) -> Result<Vec<Document>, PdfToolError> {
    let label = |i: usize, err: PdfToolError| match err {
        PdfToolError::CorruptDocument(msg) => {
            PdfToolError::CorruptDocument(format!("document {}: {}", i + 1, msg))
        }
        other => other,
    };

    if parallel {
        let results: Vec<Result<Document, PdfToolError>> =
            buffers.par_iter().map(|bytes| Document::load(bytes)).collect();
        results
            .into_iter()
            .enumerate()
            .map(|(i, result)| result.map_err(|e| label(i, e)))
            .collect()
    } else {
        buffers
            .iter()
            .enumerate()
            .map(|(i, bytes)| Document::load(bytes).map_err(|e| label(i, e)))
            .collect()
    }
}
