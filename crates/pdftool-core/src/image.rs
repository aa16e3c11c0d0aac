//! Raster image to page conversion
//!
//! JPEG data is embedded untouched behind a DCTDecode filter; only the frame
//! header is read for the size and colour model. PNG data is decoded to 8-bit
//! samples and re-encoded with Flate, with any alpha channel split into a
//! soft mask.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Object, Stream};
use serde::{Deserialize, Serialize};

use crate::document::{Page, ResourceArena};
use crate::error::PdfToolError;

/// Name the image is drawn under in the page's XObject resources
const IMAGE_RESOURCE: &str = "Im1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    /// Classify a declared MIME type; parameters after ';' are ignored
    pub fn from_mime(mime_type: &str) -> Result<Self, PdfToolError> {
        let essence = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/png" | "image/x-png" => Ok(ImageKind::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Ok(ImageKind::Jpeg),
            _ => Err(PdfToolError::UnsupportedImageType(mime_type.to_string())),
        }
    }
}

/// An image buffer with the MIME type its sender declared
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInput {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl ImageInput {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }
}

/// Decoded image ready to become an XObject
struct ImageXObject {
    width: u32,
    height: u32,
    image: Stream,
    soft_mask: Option<Stream>,
}

/// Build a page exactly the size of the image, with the image filling it
pub fn embed(bytes: &[u8], mime_type: &str) -> Result<Page, PdfToolError> {
    let xobject = match ImageKind::from_mime(mime_type)? {
        ImageKind::Jpeg => jpeg_xobject(bytes)?,
        ImageKind::Png => png_xobject(bytes)?,
    };
    Ok(image_page(xobject))
}

fn image_page(xobject: ImageXObject) -> Page {
    let ImageXObject {
        width,
        height,
        mut image,
        soft_mask,
    } = xobject;

    // Arena-local ids; the serializer renumbers them
    let image_id = (1, 0);
    let mut objects = BTreeMap::new();
    if let Some(mask) = soft_mask {
        let mask_id = (2, 0);
        image.dict.set("SMask", Object::Reference(mask_id));
        objects.insert(mask_id, Object::Stream(mask));
    }
    objects.insert(image_id, Object::Stream(image));

    let (w, h) = (width as f32, height as f32);
    let mut page = Page::with_arena(w, h, Arc::new(ResourceArena::new(objects)));
    page.resources.set(
        "XObject",
        dictionary! { IMAGE_RESOURCE => Object::Reference(image_id) },
    );
    page.content = format!("q\n{} 0 0 {} 0 0 cm\n/{} Do\nQ\n", width, height, IMAGE_RESOURCE)
        .into_bytes();
    page
}

fn image_dict(width: u32, height: u32, color_space: &str, bits: u8) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => bits as i64,
    }
}

/// Frame header of a baseline or progressive JPEG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegFrame {
    width: u32,
    height: u32,
    components: u8,
    precision: u8,
}

fn jpeg_frame(data: &[u8]) -> Result<JpegFrame, PdfToolError> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(PdfToolError::InvalidImage("missing JPEG SOI marker".into()));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return Err(PdfToolError::InvalidImage(format!(
                "expected JPEG marker at offset {}",
                pos
            )));
        }
        let marker = data[pos + 1];
        pos += 2;

        match marker {
            // Fill bytes before a marker
            0xFF => {
                pos -= 1;
                continue;
            }
            // Standalone markers carry no length
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => break,
            _ => {}
        }

        if pos + 2 > data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        if length < 2 {
            break;
        }

        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            if pos + 8 > data.len() {
                break;
            }
            let precision = data[pos + 2];
            let height = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as u32;
            let width = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let components = data[pos + 7];
            if width == 0 || height == 0 {
                return Err(PdfToolError::InvalidImage("JPEG has zero dimension".into()));
            }
            return Ok(JpegFrame {
                width,
                height,
                components,
                precision,
            });
        }

        pos += length;
    }

    Err(PdfToolError::InvalidImage("JPEG frame header not found".into()))
}

fn jpeg_xobject(data: &[u8]) -> Result<ImageXObject, PdfToolError> {
    let frame = jpeg_frame(data)?;
    let color_space = match frame.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(PdfToolError::InvalidImage(format!(
                "unsupported JPEG component count {}",
                n
            )))
        }
    };

    let mut dict = image_dict(frame.width, frame.height, color_space, frame.precision.min(8));
    dict.set("Filter", "DCTDecode");
    if frame.components == 4 {
        // Adobe CMYK JPEGs are stored inverted
        dict.set(
            "Decode",
            Object::Array([1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer).to_vec()),
        );
    }

    Ok(ImageXObject {
        width: frame.width,
        height: frame.height,
        image: Stream::new(dict, data.to_vec()).with_compression(false),
        soft_mask: None,
    })
}

fn png_xobject(data: &[u8]) -> Result<ImageXObject, PdfToolError> {
    let mut decoder = png::Decoder::new(data);
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .map_err(|e| PdfToolError::InvalidImage(e.to_string()))?;

    let mut buffer = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut buffer)
        .map_err(|e| PdfToolError::InvalidImage(e.to_string()))?;
    let pixels = &buffer[..frame.buffer_size()];
    let (width, height) = (frame.width, frame.height);

    let (color_space, channels, has_alpha) = match frame.color_type {
        png::ColorType::Grayscale => ("DeviceGray", 1, false),
        png::ColorType::GrayscaleAlpha => ("DeviceGray", 1, true),
        png::ColorType::Rgb => ("DeviceRGB", 3, false),
        png::ColorType::Rgba => ("DeviceRGB", 3, true),
        png::ColorType::Indexed => {
            return Err(PdfToolError::InvalidImage(
                "indexed PNG was not expanded".into(),
            ))
        }
    };

    let (color, alpha) = if has_alpha {
        let stride = channels + 1;
        let mut color = Vec::with_capacity(pixels.len() / stride * channels);
        let mut alpha = Vec::with_capacity(pixels.len() / stride);
        for pixel in pixels.chunks_exact(stride) {
            color.extend_from_slice(&pixel[..channels]);
            alpha.push(pixel[channels]);
        }
        // Fully opaque images need no mask
        let alpha = if alpha.iter().all(|&a| a == u8::MAX) {
            None
        } else {
            Some(alpha)
        };
        (color, alpha)
    } else {
        (pixels.to_vec(), None)
    };

    let image = flate_stream(image_dict(width, height, color_space, 8), &color)?;
    let soft_mask = alpha
        .map(|alpha| flate_stream(image_dict(width, height, "DeviceGray", 8), &alpha))
        .transpose()?;

    Ok(ImageXObject {
        width,
        height,
        image,
        soft_mask,
    })
}

fn flate_stream(mut dict: Dictionary, samples: &[u8]) -> Result<Stream, PdfToolError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(samples)
        .map_err(|e| PdfToolError::InvalidImage(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| PdfToolError::InvalidImage(e.to_string()))?;

    dict.set("Filter", "FlateDecode");
    Ok(Stream::new(dict, compressed).with_compression(false))
}
