//! In-memory document model
//!
//! A loaded PDF is flattened into an ordered list of [`Page`]s. Everything a
//! page draws with (fonts, images, form XObjects, annotation dictionaries)
//! lives in a [`ResourceArena`] that the page shares by `Arc`. Arenas are
//! never modified after construction, so copying a page into another
//! document is a clone of the page plus a reference count bump: the source
//! document cannot be affected.
//!
//! Page tree nodes are not stored in the arena. Any reference from a
//! resource back into the page tree (a link destination, an annotation's
//! `/P` entry) is replaced with `null` so pages never carry cycles.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lopdf::{Dictionary, Object, ObjectId};
use serde::Serialize;
use tracing::debug;

use crate::error::PdfToolError;

/// US Letter, used when a page has no usable MediaBox
pub const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page attributes copied as-is (references resolved against the arena)
const CARRIED_PAGE_KEYS: &[&[u8]] = &[
    b"Annots",
    b"CropBox",
    b"BleedBox",
    b"TrimBox",
    b"ArtBox",
    b"Group",
    b"UserUnit",
];

/// Attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: &[&[u8]] = &[b"MediaBox", b"Resources", b"Rotate", b"CropBox"];

/// Immutable store of indirect objects referenced from page data
#[derive(Debug, Default)]
pub struct ResourceArena {
    objects: BTreeMap<ObjectId, Object>,
}

impl ResourceArena {
    pub(crate) fn new(objects: BTreeMap<ObjectId, Object>) -> Self {
        Self { objects }
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Follow a reference into the arena; direct objects are returned as-is
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.objects.get(id),
            other => Some(other),
        }
    }
}

/// Page orientation after applying `/Rotate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageOrientation {
    Portrait,
    Landscape,
    Square,
}

/// A single page: geometry, drawing instructions and the resources they name
#[derive(Debug, Clone)]
pub struct Page {
    pub(crate) media_box: [f32; 4],
    pub(crate) rotation: i64,
    pub(crate) content: Vec<u8>,
    pub(crate) resources: Dictionary,
    pub(crate) extra: Dictionary,
    pub(crate) arena: Arc<ResourceArena>,
    /// Original content already wrapped in `q ... Q`
    pub(crate) isolated: bool,
}

impl Page {
    /// Blank page of the given size with an empty arena
    pub fn blank(width: f32, height: f32) -> Self {
        Self::with_arena(width, height, Arc::new(ResourceArena::default()))
    }

    pub(crate) fn with_arena(width: f32, height: f32, arena: Arc<ResourceArena>) -> Self {
        Self {
            media_box: [0.0, 0.0, width, height],
            rotation: 0,
            content: Vec::new(),
            resources: Dictionary::new(),
            extra: Dictionary::new(),
            arena,
            isolated: false,
        }
    }

    pub fn width(&self) -> f32 {
        self.media_box[2] - self.media_box[0]
    }

    pub fn height(&self) -> f32 {
        self.media_box[3] - self.media_box[1]
    }

    pub fn media_box(&self) -> [f32; 4] {
        self.media_box
    }

    /// Centre of the media box in default user space
    pub fn midpoint(&self) -> (f32, f32) {
        (
            (self.media_box[0] + self.media_box[2]) / 2.0,
            (self.media_box[1] + self.media_box[3]) / 2.0,
        )
    }

    /// Rotation in degrees, normalised to 0, 90, 180 or 270
    pub fn rotation(&self) -> i64 {
        self.rotation.rem_euclid(360)
    }

    pub fn orientation(&self) -> PageOrientation {
        let (mut width, mut height) = (self.width(), self.height());
        if matches!(self.rotation(), 90 | 270) {
            std::mem::swap(&mut width, &mut height);
        }
        if (width - height).abs() < 1.0 {
            PageOrientation::Square
        } else if width > height {
            PageOrientation::Landscape
        } else {
            PageOrientation::Portrait
        }
    }

    /// Decoded content stream
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn resources(&self) -> &Dictionary {
        &self.resources
    }

    pub fn arena(&self) -> &Arc<ResourceArena> {
        &self.arena
    }
}

/// Raw document information; `None` means the field was never set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.subject.is_none()
            && self.creator.is_none()
            && self.producer.is_none()
    }
}

/// Summary shown to users, with display defaults for missing fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub creator: String,
}

/// An ordered sequence of pages plus metadata
#[derive(Debug, Clone, Default)]
pub struct Document {
    pages: Vec<Page>,
    metadata: Metadata,
}

impl Document {
    /// Empty document with no pages and unset metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse PDF bytes into a document
    pub fn load(bytes: &[u8]) -> Result<Self, PdfToolError> {
        let source = lopdf::Document::load_mem(bytes)
            .map_err(|e| PdfToolError::CorruptDocument(e.to_string()))?;

        if source.is_encrypted() {
            return Err(PdfToolError::CorruptDocument(
                "encrypted documents are not supported".into(),
            ));
        }

        let page_ids = source.get_pages();
        let tree_nodes = page_tree_nodes(&source);

        let mut objects = BTreeMap::new();
        for (id, object) in source.objects.iter() {
            if !tree_nodes.contains(id) && !is_file_structure(object) {
                objects.insert(*id, detach(object.clone(), &tree_nodes));
            }
        }
        let arena = Arc::new(ResourceArena::new(objects));

        let mut pages = Vec::with_capacity(page_ids.len());
        for (number, page_id) in page_ids {
            let page = read_page(&source, page_id, &tree_nodes, &arena).map_err(|e| {
                PdfToolError::CorruptDocument(format!("page {}: {}", number, e))
            })?;
            pages.push(page);
        }

        let metadata = read_metadata(&source);
        debug!(
            pages = pages.len(),
            resources = arena.len(),
            "loaded document"
        );

        Ok(Self { pages, metadata })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub(crate) fn pages_mut(&mut self) -> &mut [Page] {
        &mut self.pages
    }

    /// Copy pages by 0-based index, in the order given
    pub fn copy_pages(&self, indices: &[usize]) -> Result<Vec<Page>, PdfToolError> {
        indices
            .iter()
            .map(|&index| {
                self.pages.get(index).cloned().ok_or_else(|| {
                    PdfToolError::CorruptDocument(format!(
                        "page index {} out of bounds (document has {} pages)",
                        index,
                        self.pages.len()
                    ))
                })
            })
            .collect()
    }

    pub fn append_page(&mut self, page: Page) {
        self.pages.push(page);
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.metadata.title = Some(title.into());
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.metadata.author = Some(author.into());
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.metadata.subject = Some(subject.into());
    }

    pub fn set_creator(&mut self, creator: impl Into<String>) {
        self.metadata.creator = Some(creator.into());
    }

    pub fn info(&self) -> DocumentInfo {
        let meta = &self.metadata;
        DocumentInfo {
            page_count: self.pages.len(),
            title: non_empty(&meta.title).unwrap_or("Untitled").to_string(),
            author: non_empty(&meta.author).unwrap_or("Unknown").to_string(),
            subject: non_empty(&meta.subject).unwrap_or("").to_string(),
            creator: non_empty(&meta.creator).unwrap_or("Unknown").to_string(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Ids of the catalog and every Pages/Page node
fn page_tree_nodes(doc: &lopdf::Document) -> BTreeSet<ObjectId> {
    let mut nodes: BTreeSet<ObjectId> = doc.get_pages().values().copied().collect();
    for (id, object) in doc.objects.iter() {
        if let Ok(dict) = object.as_dict() {
            if let Ok(Object::Name(kind)) = dict.get(b"Type") {
                if kind == b"Pages" || kind == b"Page" || kind == b"Catalog" {
                    nodes.insert(*id);
                }
            }
        }
    }
    nodes
}

/// Cross-reference and object streams belong to the file, not to any page
fn is_file_structure(object: &Object) -> bool {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return false,
    };
    matches!(dict.get(b"Type"), Ok(Object::Name(kind)) if kind == b"XRef" || kind == b"ObjStm")
}

/// Replace references into the page tree with `null`
fn detach(obj: Object, tree_nodes: &BTreeSet<ObjectId>) -> Object {
    match obj {
        Object::Reference(id) if tree_nodes.contains(&id) => Object::Null,
        Object::Array(arr) => Object::Array(arr.into_iter().map(|o| detach(o, tree_nodes)).collect()),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = detach(std::mem::replace(value, Object::Null), tree_nodes);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = detach(std::mem::replace(value, Object::Null), tree_nodes);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Look an attribute up on the page, then on each ancestor
fn inherited<'a>(
    doc: &'a lopdf::Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut seen = BTreeSet::new();
    while let Some(id) = current {
        if !seen.insert(id) {
            break;
        }
        let dict = doc.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn deref<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

fn parse_box(doc: &lopdf::Document, obj: &Object) -> Option<[f32; 4]> {
    let arr = deref(doc, obj)?.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut values = [0.0f32; 4];
    for (slot, item) in values.iter_mut().zip(arr) {
        *slot = number(deref(doc, item)?)?;
    }
    // Normalise so that (x1, y1) is the lower-left corner
    let [x1, y1, x2, y2] = values;
    let normalised = [x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2)];
    if normalised[2] - normalised[0] <= 0.0 || normalised[3] - normalised[1] <= 0.0 {
        return None;
    }
    Some(normalised)
}

fn read_page(
    doc: &lopdf::Document,
    page_id: ObjectId,
    tree_nodes: &BTreeSet<ObjectId>,
    arena: &Arc<ResourceArena>,
) -> Result<Page, PdfToolError> {
    let page_dict = doc.get_object(page_id).and_then(Object::as_dict)?;

    let media_box = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| parse_box(doc, obj))
        .unwrap_or(DEFAULT_MEDIA_BOX);

    let rotation = inherited(doc, page_id, b"Rotate")
        .and_then(|obj| deref(doc, obj))
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0);

    let resources = match inherited(doc, page_id, b"Resources").and_then(|obj| deref(doc, obj)) {
        Some(Object::Dictionary(dict)) => match detach(Object::Dictionary(dict.clone()), tree_nodes) {
            Object::Dictionary(dict) => dict,
            _ => Dictionary::new(),
        },
        _ => Dictionary::new(),
    };

    // Pages without a Contents entry are blank, not broken
    let content = if page_dict.has(b"Contents") {
        doc.get_page_content(page_id)?
    } else {
        Vec::new()
    };

    let mut extra = Dictionary::new();
    for key in CARRIED_PAGE_KEYS {
        let value = if INHERITABLE_KEYS.contains(key) {
            inherited(doc, page_id, key)
        } else {
            page_dict.get(key).ok()
        };
        if let Some(value) = value {
            extra.set(key.to_vec(), detach(value.clone(), tree_nodes));
        }
    }

    Ok(Page {
        media_box,
        rotation,
        content,
        resources,
        extra,
        arena: Arc::clone(arena),
        isolated: false,
    })
}

fn read_metadata(doc: &lopdf::Document) -> Metadata {
    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| deref(doc, obj))
        .and_then(|obj| obj.as_dict().ok());

    let Some(info) = info else {
        return Metadata::default();
    };

    let field = |key: &[u8]| -> Option<String> {
        let obj = deref(doc, info.get(key).ok()?)?;
        match obj {
            Object::String(bytes, _) => Some(decode_text_string(bytes)),
            _ => None,
        }
    };

    Metadata {
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
        creator: field(b"Creator"),
        producer: field(b"Producer"),
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, or PDFDocEncoding)
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| pdf_doc_char(b)).collect()
}

/// PDFDocEncoding 0x80..=0xA0; 0x9F is undefined
const PDF_DOC_HIGH: [char; 33] = [
    '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}', '\u{2044}',
    '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}', '\u{201D}', '\u{2018}',
    '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}', '\u{0141}', '\u{0152}', '\u{0160}',
    '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}', '\u{0153}', '\u{0161}', '\u{017E}', '\u{FFFD}',
    '\u{20AC}',
];

/// PDFDocEncoding 0x18..=0x1F: spacing accents
const PDF_DOC_ACCENTS: [char; 8] = [
    '\u{02D8}', '\u{02C7}', '\u{02C6}', '\u{02D9}', '\u{02DD}', '\u{02DB}', '\u{02DA}', '\u{02DC}',
];

/// Everything outside the two tables matches Latin-1
fn pdf_doc_char(byte: u8) -> char {
    match byte {
        0x18..=0x1F => PDF_DOC_ACCENTS[(byte - 0x18) as usize],
        0x80..=0xA0 => PDF_DOC_HIGH[(byte - 0x80) as usize],
        other => other as char,
    }
}

/// Encode a text string for the Info dictionary
pub(crate) fn encode_text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::String(text.as_bytes().to_vec(), lopdf::StringFormat::Literal)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, lopdf::StringFormat::Hexadecimal)
    }
}
