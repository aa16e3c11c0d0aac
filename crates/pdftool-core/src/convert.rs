//! Byte-level image to PDF conversion

use crate::compose;
use crate::config::ComposeOptions;
use crate::error::PdfToolError;
use crate::image::ImageInput;
use crate::serialize::serialize_with;

/// One page per image, sized to the image, in input order
pub fn images_to_pdf(images: &[ImageInput]) -> Result<Vec<u8>, PdfToolError> {
    images_to_pdf_with(images, &ComposeOptions::default(), crate::progress::ignore)
}

pub fn images_to_pdf_with<F: FnMut(u8)>(
    images: &[ImageInput],
    options: &ComposeOptions,
    on_progress: F,
) -> Result<Vec<u8>, PdfToolError> {
    let doc = compose::images_to_pdf(images, options, on_progress)?;
    serialize_with(&doc, options)
}
