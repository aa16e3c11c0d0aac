//! Byte-level watermarking and annotation

use crate::compose::{self, PageAnnotation};
use crate::config::ComposeOptions;
use crate::document::Document;
use crate::error::PdfToolError;
use crate::serialize::serialize_with;

/// Stamp `text` diagonally across every page
pub fn watermark_pdf(bytes: &[u8], text: &str) -> Result<Vec<u8>, PdfToolError> {
    let doc = Document::load(bytes)?;
    let marked = compose::watermark(&doc, text)?;
    serialize_with(&marked, &ComposeOptions::default())
}

/// Draw each annotation onto its target page
pub fn annotate_pdf(bytes: &[u8], annotations: &[PageAnnotation]) -> Result<Vec<u8>, PdfToolError> {
    let doc = Document::load(bytes)?;
    let annotated = compose::annotate_document(&doc, annotations)?;
    serialize_with(&annotated, &ComposeOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{Annotation, Color, Point};
    use crate::document::tests::{create_test_pdf, page_text};

    #[test]
    fn test_watermark_pdf_marks_every_page() {
        let out = watermark_pdf(&create_test_pdf(3, "WM"), "DRAFT").unwrap();
        let doc = Document::load(&out).unwrap();
        assert_eq!(doc.page_count(), 3);
        for (i, page) in doc.pages().iter().enumerate() {
            let text = page_text(page);
            assert!(text.contains("(DRAFT) Tj"));
            assert!(text.contains(&format!("WM-Page-{}", i + 1)));
        }
    }

    #[test]
    fn test_watermark_pdf_errors() {
        let result = watermark_pdf(b"not even a pdf", "");
        assert!(matches!(result, Err(PdfToolError::CorruptDocument(_))));

        let result = watermark_pdf(&create_test_pdf(1, "WM"), "");
        assert!(matches!(result, Err(PdfToolError::EmptyWatermark)));
    }

    #[test]
    fn test_annotate_pdf_text() {
        let annotations = vec![PageAnnotation {
            page: 1,
            at: Point::new(72.0, 72.0),
            annotation: Annotation::Text {
                text: "Approved".into(),
                font_size: 14.0,
                color: Color::GREEN,
                font: Some("serif".into()),
            },
        }];
        let out = annotate_pdf(&create_test_pdf(1, "Ann"), &annotations).unwrap();
        let doc = Document::load(&out).unwrap();
        let page = &doc.pages()[0];
        assert!(page_text(page).contains("(Approved) Tj"));

        let fonts = page.resources().get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert_eq!(fonts.len(), 2);
    }
}
