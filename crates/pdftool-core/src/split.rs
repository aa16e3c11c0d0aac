//! Byte-level split and page extraction

use crate::compose;
use crate::config::ComposeOptions;
use crate::document::Document;
use crate::error::PdfToolError;
use crate::page_range::{PageRange, Selection};
use crate::serialize::serialize_with;

/// Split a PDF into one output per `(start, end)` range (1-based, inclusive)
pub fn split_document(bytes: &[u8], ranges: &[(u32, u32)]) -> Result<Vec<Vec<u8>>, PdfToolError> {
    split_document_with(bytes, ranges, &ComposeOptions::default(), crate::progress::ignore)
}

pub fn split_document_with<F: FnMut(u8)>(
    bytes: &[u8],
    ranges: &[(u32, u32)],
    options: &ComposeOptions,
    on_progress: F,
) -> Result<Vec<Vec<u8>>, PdfToolError> {
    if ranges.is_empty() {
        return Err(PdfToolError::empty_input("split", 1, 0));
    }

    let doc = Document::load(bytes)?;
    let ranges: Vec<PageRange> = ranges.iter().copied().map(PageRange::from).collect();
    compose::split(&doc, &ranges, on_progress)?
        .iter()
        .map(|part| serialize_with(part, options))
        .collect()
}

/// Split by resolved selections, e.g. the contents of a selection list
pub fn split_selections(bytes: &[u8], selections: &[Selection]) -> Result<Vec<Vec<u8>>, PdfToolError> {
    split_selections_with(bytes, selections, &ComposeOptions::default(), crate::progress::ignore)
}

pub fn split_selections_with<F: FnMut(u8)>(
    bytes: &[u8],
    selections: &[Selection],
    options: &ComposeOptions,
    on_progress: F,
) -> Result<Vec<Vec<u8>>, PdfToolError> {
    if selections.is_empty() {
        return Err(PdfToolError::empty_input("split", 1, 0));
    }

    let doc = Document::load(bytes)?;
    compose::split_selections(&doc, selections, on_progress)?
        .iter()
        .map(|part| serialize_with(part, options))
        .collect()
}

/// Extract the given 1-based pages, in the order given, into one PDF
pub fn extract_pages(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, PdfToolError> {
    if pages.is_empty() {
        return Err(PdfToolError::empty_input("extract", 1, 0));
    }

    let doc = Document::load(bytes)?;
    let total = doc.page_count() as u32;
    let mut indices = Vec::with_capacity(pages.len());
    for &page in pages {
        PageRange::new(page, page, total)?;
        indices.push((page - 1) as usize);
    }

    let mut output = Document::new();
    for page in doc.copy_pages(&indices)? {
        output.append_page(page);
    }
    serialize_with(&output, &ComposeOptions::default())
}
