//! Document composition engine
//!
//! Loads PDFs into an in-memory page model, merges, splits and converts
//! page sequences, draws overlays, and writes valid PDFs back out.
//!
//! Two layers are available:
//! - [`compose`] works on loaded [`Document`]s and never touches bytes
//! - `merge_documents`, `split_document`, `images_to_pdf`, `watermark_pdf`:
//!   load, compose and serialize in one call

pub mod annotate;
pub mod command;
pub mod compose;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod fonts;
pub mod image;
pub mod merge;
pub mod page_range;
pub mod progress;
pub mod selection;
pub mod serialize;
pub mod split;
pub mod watermark;

pub use annotate::{apply_annotation, Annotation, Color, Point};
pub use command::{process_command, PdfCommand, ProcessMetrics, ProcessResult};
pub use compose::PageAnnotation;
pub use config::ComposeOptions;
pub use convert::{images_to_pdf, images_to_pdf_with};
pub use document::{Document, DocumentInfo, Metadata, Page, PageOrientation};
pub use error::{PdfToolError, RangeError};
pub use image::{ImageInput, ImageKind};
pub use merge::{merge_documents, merge_documents_with};
pub use page_range::{parse_ranges, PageRange, QuickSelect, Selection};
pub use progress::Progress;
pub use selection::{SelectionId, SelectionList};
pub use serialize::{serialize, serialize_with};
pub use split::{
    extract_pages, split_document, split_document_with, split_selections, split_selections_with,
};
pub use watermark::{annotate_pdf, watermark_pdf};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, PdfToolError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| PdfToolError::CorruptDocument(e.to_string()))?;
    Ok(doc.get_pages().len() as u32)
}

/// Page count and metadata, with display defaults for missing fields
pub fn get_pdf_info(bytes: &[u8]) -> Result<DocumentInfo, PdfToolError> {
    Ok(Document::load(bytes)?.info())
}
