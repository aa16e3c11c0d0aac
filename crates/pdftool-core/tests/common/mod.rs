//! Fixture builders shared by the integration tests

#![allow(dead_code)]

use lopdf::{dictionary, Object, Stream};
use pdftool_core::{Document, Page};

/// Build a PDF with N pages whose content shows "{prefix}-Page-{n}"
pub fn create_test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for n in 1..=num_pages {
        let content = format!("BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET", prefix, n);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => num_pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        let data = vec![200u8; (width * height * 3) as usize];
        writer.write_image_data(&data).unwrap();
    }
    out
}

/// SOI, a baseline frame header and EOI; enough for the embedder
pub fn create_test_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08];
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[0x03, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

pub fn page_text(page: &Page) -> String {
    String::from_utf8_lossy(page.content()).into_owned()
}

/// Text of every page, loaded back from serialized bytes
pub fn texts(bytes: &[u8]) -> Vec<String> {
    Document::load(bytes)
        .unwrap()
        .pages()
        .iter()
        .map(page_text)
        .collect()
}
