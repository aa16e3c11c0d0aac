//! Write a [`Document`] back out as PDF bytes
//!
//! Each page's arena is imported lazily: only objects reachable from the
//! page's resources and carried attributes are copied, and each arena object
//! is written once no matter how many pages reference it. References that
//! point outside the arena become `null`.

use std::collections::BTreeMap;
use std::sync::Arc;

use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream};
use tracing::debug;

use crate::config::ComposeOptions;
use crate::document::{encode_text_string, Document, Metadata, Page, ResourceArena};
use crate::error::PdfToolError;

/// Serialize with default options
pub fn serialize(document: &Document) -> Result<Vec<u8>, PdfToolError> {
    serialize_with(document, &ComposeOptions::default())
}

pub fn serialize_with(
    document: &Document,
    options: &ComposeOptions,
) -> Result<Vec<u8>, PdfToolError> {
    let mut out = lopdf::Document::with_version("1.7");
    let pages_id = out.new_object_id();

    let mut imports: Vec<ArenaImport<'_>> = Vec::new();
    let mut kids = Vec::with_capacity(document.page_count());

    for page in document.pages() {
        let slot = match imports
            .iter()
            .position(|import| Arc::ptr_eq(import.arena, page.arena()))
        {
            Some(slot) => slot,
            None => {
                imports.push(ArenaImport::new(page.arena()));
                imports.len() - 1
            }
        };
        let page_id = write_page(&mut out, &mut imports[slot], page, pages_id);
        kids.push(Object::Reference(page_id));
    }

    out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );

    let catalog_id = out.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    out.trailer.set("Root", catalog_id);

    let info = info_dictionary(document.metadata(), options.producer.as_deref());
    if !info.is_empty() {
        let info_id = out.add_object(info);
        out.trailer.set("Info", info_id);
    }

    if options.compress {
        out.compress();
    }

    let mut buffer = Vec::new();
    out.save_to(&mut buffer)
        .map_err(|e| PdfToolError::SerializationFailure(e.to_string()))?;

    debug!(
        pages = document.page_count(),
        arenas = imports.len(),
        bytes = buffer.len(),
        "serialized document"
    );
    Ok(buffer)
}

/// Arena ids already written to the output, and their new ids
struct ArenaImport<'a> {
    arena: &'a Arc<ResourceArena>,
    ids: BTreeMap<ObjectId, ObjectId>,
}

impl<'a> ArenaImport<'a> {
    fn new(arena: &'a Arc<ResourceArena>) -> Self {
        Self {
            arena,
            ids: BTreeMap::new(),
        }
    }

    /// Copy everything `root` reaches into `out`, then return `root` remapped
    fn import(&mut self, out: &mut lopdf::Document, root: &Object) -> Object {
        let mut pending = Vec::new();
        collect_refs(root, &mut pending);

        let mut fresh = Vec::new();
        while let Some(id) = pending.pop() {
            if self.ids.contains_key(&id) {
                continue;
            }
            if let Some(object) = self.arena.get(id) {
                self.ids.insert(id, out.new_object_id());
                collect_refs(object, &mut pending);
                fresh.push(id);
            }
        }

        for id in fresh {
            if let (Some(object), Some(&new_id)) = (self.arena.get(id), self.ids.get(&id)) {
                out.objects.insert(new_id, remap_object_refs(object.clone(), &self.ids));
            }
        }

        remap_object_refs(root.clone(), &self.ids)
    }
}

fn write_page(
    out: &mut lopdf::Document,
    import: &mut ArenaImport<'_>,
    page: &Page,
    parent: ObjectId,
) -> ObjectId {
    let content_id = out.add_object(Stream::new(Dictionary::new(), page.content().to_vec()));

    let mut dict = dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "MediaBox" => page.media_box().iter().map(|&v| number(v)).collect::<Vec<_>>(),
        "Contents" => content_id,
    };

    let resources = import.import(out, &Object::Dictionary(page.resources().clone()));
    dict.set("Resources", resources);

    if page.rotation() != 0 {
        dict.set("Rotate", page.rotation());
    }

    for (key, value) in page.extra.iter() {
        let value = import.import(out, value);
        dict.set(key.clone(), value);
    }

    out.add_object(dict)
}

/// Collect every reference inside `obj`, without following them
fn collect_refs(obj: &Object, refs: &mut Vec<ObjectId>) {
    match obj {
        Object::Reference(id) => refs.push(*id),
        Object::Array(arr) => arr.iter().for_each(|o| collect_refs(o, refs)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, v)| collect_refs(v, refs)),
        Object::Stream(stream) => stream.dict.iter().for_each(|(_, v)| collect_refs(v, refs)),
        _ => {}
    }
}

/// Recursively rewrite references through `ids`; unknown ids become `null`
fn remap_object_refs(obj: Object, ids: &BTreeMap<ObjectId, ObjectId>) -> Object {
    match obj {
        Object::Reference(id) => ids
            .get(&id)
            .map(|&new_id| Object::Reference(new_id))
            .unwrap_or(Object::Null),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, ids))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), ids);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(std::mem::replace(value, Object::Null), ids);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

fn number(value: f32) -> Object {
    if value.fract() == 0.0 && value.abs() < i32::MAX as f32 {
        Object::Integer(value as i64)
    } else {
        Object::Real(value)
    }
}

/// The configured producer replaces whatever the document carried
fn info_dictionary(metadata: &Metadata, producer: Option<&str>) -> Dictionary {
    let mut info = Dictionary::new();
    let fields = [
        ("Title", metadata.title.as_deref()),
        ("Author", metadata.author.as_deref()),
        ("Subject", metadata.subject.as_deref()),
        ("Creator", metadata.creator.as_deref()),
        ("Producer", producer.or(metadata.producer.as_deref())),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            info.set(key, encode_text_string(value));
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{create_test_pdf, page_text};
    use pretty_assertions::assert_eq;

    fn count_fonts(bytes: &[u8]) -> usize {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        doc.objects
            .values()
            .filter_map(|obj| obj.as_dict().ok())
            .filter(|dict| matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name == b"Font"))
            .count()
    }

    #[test]
    fn test_roundtrip_keeps_pages_and_content() {
        let doc = Document::load(&create_test_pdf(3, "Round")).unwrap();
        let bytes = serialize(&doc).unwrap();
        let reloaded = Document::load(&bytes).unwrap();

        assert_eq!(reloaded.page_count(), 3);
        for (i, page) in reloaded.pages().iter().enumerate() {
            assert!(page_text(page).contains(&format!("Round-Page-{}", i + 1)));
            assert_eq!(page.media_box(), [0.0, 0.0, 612.0, 792.0]);
        }
    }

    #[test]
    fn test_shared_resources_written_once() {
        let doc = Document::load(&create_test_pdf(4, "Shared")).unwrap();
        let bytes = serialize_with(&doc, &ComposeOptions::plain()).unwrap();
        assert_eq!(count_fonts(&bytes), 1);
    }

    #[test]
    fn test_pages_from_two_sources_keep_their_own_resources() {
        let a = Document::load(&create_test_pdf(1, "A")).unwrap();
        let b = Document::load(&create_test_pdf(1, "B")).unwrap();
        let mut doc = Document::new();
        doc.append_page(a.pages()[0].clone());
        doc.append_page(b.pages()[0].clone());

        let bytes = serialize(&doc).unwrap();
        assert_eq!(count_fonts(&bytes), 2);
    }

    #[test]
    fn test_serialization_leaves_document_reusable() {
        let doc = Document::load(&create_test_pdf(2, "Again")).unwrap();
        let first = Document::load(&serialize(&doc).unwrap()).unwrap();
        let second = Document::load(&serialize(&doc).unwrap()).unwrap();
        assert_eq!(first.page_count(), second.page_count());
        for (a, b) in first.pages().iter().zip(second.pages()) {
            assert_eq!(page_text(a), page_text(b));
        }
    }

    #[test]
    fn test_dangling_reference_becomes_null() {
        let mut ids = BTreeMap::new();
        ids.insert((1, 0), (7, 0));
        let obj = Object::Array(vec![Object::Reference((1, 0)), Object::Reference((2, 0))]);
        assert_eq!(
            remap_object_refs(obj, &ids),
            Object::Array(vec![Object::Reference((7, 0)), Object::Null])
        );
    }

    #[test]
    fn test_metadata_and_producer_written() {
        let mut doc = Document::new();
        doc.append_page(Page::blank(100.0, 100.0));
        doc.set_title("Combined");

        let reloaded = Document::load(&serialize(&doc).unwrap()).unwrap();
        assert_eq!(reloaded.metadata().title.as_deref(), Some("Combined"));
        assert_eq!(reloaded.metadata().producer.as_deref(), Some("pdftool"));
        assert_eq!(reloaded.info().author, "Unknown");
    }

    #[test]
    fn test_no_info_without_metadata_or_producer() {
        let mut doc = Document::new();
        doc.append_page(Page::blank(100.0, 100.0));
        let options = ComposeOptions {
            producer: None,
            ..ComposeOptions::default()
        };
        let bytes = serialize_with(&doc, &options).unwrap();
        let raw = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(raw.trailer.get(b"Info").is_err());
    }

    #[test]
    fn test_rotation_written() {
        let mut page = Page::blank(200.0, 100.0);
        page.rotation = 90;
        let mut doc = Document::new();
        doc.append_page(page);

        let reloaded = Document::load(&serialize(&doc).unwrap()).unwrap();
        assert_eq!(reloaded.pages()[0].rotation(), 90);
    }
}
