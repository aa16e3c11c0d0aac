//! Page-level composition: merge, split, image conversion, overlays
//!
//! Every operation builds fresh output documents from copies of its inputs.
//! Inputs are never modified, and range checks run before any page is
//! copied so a rejected request produces no output at all.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotate::{apply_annotation, check_watermark_text, watermark_page, Annotation, Point};
use crate::config::ComposeOptions;
use crate::document::{Document, Page};
use crate::error::PdfToolError;
use crate::image::{self, ImageInput};
use crate::page_range::{PageRange, Selection};
use crate::progress::Progress;

/// Concatenate the pages of every input document, in input order
///
/// The output starts with unset metadata; nothing is inherited from the
/// inputs.
pub fn merge<F: FnMut(u8)>(documents: &[Document], on_progress: F) -> Result<Document, PdfToolError> {
    if documents.len() < 2 {
        return Err(PdfToolError::empty_input("merge", 2, documents.len()));
    }

    let mut progress = Progress::new(documents.len(), on_progress);
    progress.start();

    let mut output = Document::new();
    for source in documents {
        let indices: Vec<usize> = (0..source.page_count()).collect();
        for page in source.copy_pages(&indices)? {
            output.append_page(page);
        }
        progress.advance();
    }
    progress.finish();

    info!(
        inputs = documents.len(),
        pages = output.page_count(),
        "merged documents"
    );
    Ok(output)
}

/// One output document per range, in range order
pub fn split<F: FnMut(u8)>(
    document: &Document,
    ranges: &[PageRange],
    on_progress: F,
) -> Result<Vec<Document>, PdfToolError> {
    let selections: Vec<Selection> = ranges.iter().copied().map(Selection::from).collect();
    split_selections(document, &selections, on_progress)
}

/// Split by resolved selections; odd/even selections extract alternate pages
pub fn split_selections<F: FnMut(u8)>(
    document: &Document,
    selections: &[Selection],
    on_progress: F,
) -> Result<Vec<Document>, PdfToolError> {
    if selections.is_empty() {
        return Err(PdfToolError::empty_input("split", 1, 0));
    }

    let total = document.page_count() as u32;
    for selection in selections {
        selection.validate(total)?;
    }

    let mut progress = Progress::new(selections.len(), on_progress);
    progress.start();

    let mut outputs = Vec::with_capacity(selections.len());
    for selection in selections {
        let indices: Vec<usize> = selection
            .pages()
            .into_iter()
            .map(|page| (page - 1) as usize)
            .collect();

        let mut part = Document::new();
        for page in document.copy_pages(&indices)? {
            part.append_page(page);
        }
        debug!(label = selection.label(), pages = part.page_count(), "extracted selection");
        outputs.push(part);
        progress.advance();
    }
    progress.finish();

    info!(source_pages = total, outputs = outputs.len(), "split document");
    Ok(outputs)
}

/// One page per image, each sized to the image's pixel dimensions
///
/// The first failing image, in input order, aborts the whole conversion.
pub fn images_to_pdf<F: FnMut(u8)>(
    images: &[ImageInput],
    options: &ComposeOptions,
    on_progress: F,
) -> Result<Document, PdfToolError> {
    if images.is_empty() {
        return Err(PdfToolError::empty_input("images_to_pdf", 1, 0));
    }

    let mut progress = Progress::new(images.len(), on_progress);
    progress.start();

    let mut output = Document::new();
    if options.parallel {
        let pages: Vec<Result<Page, PdfToolError>> = images
            .par_iter()
            .map(|input| image::embed(&input.data, &input.mime_type))
            .collect();
        for page in pages {
            output.append_page(page?);
            progress.advance();
        }
    } else {
        for input in images {
            output.append_page(image::embed(&input.data, &input.mime_type)?);
            progress.advance();
        }
    }
    progress.finish();

    info!(images = images.len(), parallel = options.parallel, "converted images");
    Ok(output)
}

/// Copy of `document` with `text` stamped diagonally on every page
pub fn watermark(document: &Document, text: &str) -> Result<Document, PdfToolError> {
    check_watermark_text(text)?;

    let mut output = document.clone();
    for page in output.pages_mut() {
        watermark_page(page, text)?;
    }

    info!(pages = output.page_count(), "watermarked document");
    Ok(output)
}

/// An annotation placed on one page (1-based) at one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageAnnotation {
    pub page: u32,
    pub at: Point,
    pub annotation: Annotation,
}

/// Copy of `document` with each annotation drawn on its target page
pub fn annotate_document(
    document: &Document,
    annotations: &[PageAnnotation],
) -> Result<Document, PdfToolError> {
    let total = document.page_count() as u32;
    for placed in annotations {
        PageRange::new(placed.page, placed.page, total)?;
    }

    let mut output = document.clone();
    let pages = output.pages_mut();
    for placed in annotations {
        let page = &mut pages[(placed.page - 1) as usize];
        apply_annotation(page, &placed.annotation, placed.at)?;
    }

    debug!(annotations = annotations.len(), "annotated document");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::Color;
    use crate::document::tests::{create_test_pdf, page_text};
    use crate::error::RangeError;
    use crate::image::tests::{create_test_jpeg, create_test_png};
    use crate::page_range::QuickSelect;
    use crate::progress;
    use pretty_assertions::assert_eq;

    fn load(pages: u32, prefix: &str) -> Document {
        Document::load(&create_test_pdf(pages, prefix)).unwrap()
    }

    fn texts(doc: &Document) -> Vec<String> {
        doc.pages().iter().map(page_text).collect()
    }

    #[test]
    fn test_merge_requires_two_documents() {
        let result = merge(&[load(2, "Only")], progress::ignore);
        assert!(matches!(
            result,
            Err(PdfToolError::EmptyInputSet {
                required: 2,
                given: 1,
                ..
            })
        ));
        assert!(merge(&[], progress::ignore).is_err());
    }

    #[test]
    fn test_merge_concatenates_in_order() {
        let docs = [load(2, "DocA"), load(3, "DocB")];
        let merged = merge(&docs, progress::ignore).unwrap();

        let expected = ["DocA-Page-1", "DocA-Page-2", "DocB-Page-1", "DocB-Page-2", "DocB-Page-3"];
        assert_eq!(merged.page_count(), 5);
        for (text, marker) in texts(&merged).iter().zip(expected) {
            assert!(text.contains(marker), "{} missing from {}", marker, text);
        }
    }

    #[test]
    fn test_merge_output_has_unset_metadata() {
        let mut first = load(1, "Titled");
        first.set_title("Original");
        let merged = merge(&[first, load(1, "Other")], progress::ignore).unwrap();
        assert!(merged.metadata().is_empty());
        assert_eq!(merged.info().title, "Untitled");
    }

    #[test]
    fn test_merge_reports_progress_to_100() {
        let docs = [load(1, "A"), load(1, "B"), load(1, "C"), load(1, "D")];
        let mut seen = Vec::new();
        merge(&docs, |p| seen.push(p)).unwrap();
        assert_eq!(seen, vec![0, 25, 50, 75, 100]);
    }

    #[test]
    fn test_split_one_document_per_range() {
        let doc = load(6, "Src");
        let ranges = [PageRange { start: 4, end: 6 }, PageRange { start: 1, end: 2 }];
        let parts = split(&doc, &ranges, progress::ignore).unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].page_count(), 3);
        assert!(texts(&parts[0])[0].contains("Src-Page-4"));
        assert_eq!(parts[1].page_count(), 2);
        assert!(texts(&parts[1])[1].contains("Src-Page-2"));
        assert_eq!(doc.page_count(), 6);
    }

    #[test]
    fn test_split_allows_overlapping_ranges() {
        let doc = load(4, "Lap");
        let ranges = [PageRange { start: 1, end: 3 }, PageRange { start: 2, end: 4 }];
        let parts = split(&doc, &ranges, progress::ignore).unwrap();
        assert_eq!(parts.iter().map(Document::page_count).sum::<usize>(), 6);
    }

    #[test]
    fn test_split_validates_before_copying() {
        let doc = load(3, "Bad");
        let ranges = [PageRange { start: 1, end: 2 }, PageRange { start: 2, end: 9 }];
        let mut seen = Vec::new();
        let result = split(&doc, &ranges, |p| seen.push(p));

        assert!(matches!(
            result,
            Err(PdfToolError::InvalidPageRange(RangeError::EndBeyondDocument { end: 9, total: 3 }))
        ));
        assert!(seen.is_empty());
    }

    #[test]
    fn test_split_requires_a_range() {
        let result = split(&load(2, "None"), &[], progress::ignore);
        assert!(matches!(result, Err(PdfToolError::EmptyInputSet { .. })));
    }

    #[test]
    fn test_split_odd_and_even_selections() {
        let doc = load(6, "Alt");
        let odd = QuickSelect::Odd.resolve(6).unwrap();
        let even = QuickSelect::Even.resolve(6).unwrap();
        let parts = split_selections(&doc, &[odd, even], progress::ignore).unwrap();

        let odd_texts = texts(&parts[0]);
        assert_eq!(odd_texts.len(), 3);
        for (text, n) in odd_texts.iter().zip([1, 3, 5]) {
            assert!(text.contains(&format!("Alt-Page-{}", n)));
        }
        let even_texts = texts(&parts[1]);
        for (text, n) in even_texts.iter().zip([2, 4, 6]) {
            assert!(text.contains(&format!("Alt-Page-{}", n)));
        }
    }

    #[test]
    fn test_images_to_pdf_keeps_order_and_size() {
        let images = vec![
            ImageInput::new(create_test_png(30, 20, true), "image/png"),
            ImageInput::new(create_test_jpeg(640, 480), "image/jpeg"),
            ImageInput::new(create_test_png(5, 50, false), "image/png"),
        ];
        for options in [ComposeOptions::default(), ComposeOptions::plain()] {
            let doc = images_to_pdf(&images, &options, progress::ignore).unwrap();
            let sizes: Vec<_> = doc.pages().iter().map(|p| (p.width(), p.height())).collect();
            assert_eq!(sizes, vec![(30.0, 20.0), (640.0, 480.0), (5.0, 50.0)]);
        }
    }

    #[test]
    fn test_images_to_pdf_aborts_on_unsupported_type() {
        let images = vec![
            ImageInput::new(create_test_png(2, 2, true), "image/png"),
            ImageInput::new(b"GIF89a".to_vec(), "image/gif"),
        ];
        let result = images_to_pdf(&images, &ComposeOptions::default(), progress::ignore);
        assert!(matches!(result, Err(PdfToolError::UnsupportedImageType(_))));
    }

    #[test]
    fn test_images_to_pdf_requires_an_image() {
        let result = images_to_pdf(&[], &ComposeOptions::default(), progress::ignore);
        assert!(matches!(
            result,
            Err(PdfToolError::EmptyInputSet { required: 1, given: 0, .. })
        ));
    }

    #[test]
    fn test_watermark_every_page_of_a_copy() {
        let doc = load(3, "Mark");
        let marked = watermark(&doc, "CONFIDENTIAL").unwrap();

        assert_eq!(marked.page_count(), 3);
        for (i, text) in texts(&marked).iter().enumerate() {
            assert!(text.contains("(CONFIDENTIAL) Tj"));
            assert!(text.contains(&format!("Mark-Page-{}", i + 1)));
        }
        for text in texts(&doc) {
            assert!(!text.contains("CONFIDENTIAL"));
        }
    }

    #[test]
    fn test_watermark_rejects_blank_text() {
        let doc = load(1, "Blank");
        assert!(matches!(watermark(&doc, "   "), Err(PdfToolError::EmptyWatermark)));
    }

    #[test]
    fn test_annotate_targets_one_page() {
        let doc = load(2, "Note");
        let annotations = [PageAnnotation {
            page: 2,
            at: Point::new(10.0, 10.0),
            annotation: Annotation::Rectangle {
                width: 50.0,
                height: 20.0,
                stroke_width: 2.0,
                color: Color::RED,
            },
        }];
        let annotated = annotate_document(&doc, &annotations).unwrap();
        let texts = texts(&annotated);
        assert!(!texts[0].contains(" re"));
        assert!(texts[1].contains(" re"));
    }

    #[test]
    fn test_annotate_rejects_missing_page() {
        let doc = load(2, "Note");
        let annotations = [PageAnnotation {
            page: 3,
            at: Point::new(0.0, 0.0),
            annotation: Annotation::Circle {
                radius: 5.0,
                stroke_width: 1.0,
                color: Color::BLUE,
            },
        }];
        assert!(matches!(
            annotate_document(&doc, &annotations),
            Err(PdfToolError::InvalidPageRange(_))
        ));
    }
}
