//! Small helpers over `lopdf` shared by the stamper, the unlocker and the
//! merge emitter.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::PdfError;

/// Guards against cyclic `/Parent` chains in damaged files.
const MAX_TREE_DEPTH: usize = 32;

/// Page attributes that may be inherited from ancestor `/Pages` nodes.
pub const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

pub fn load(path: &Path) -> Result<Document, PdfError> {
    Document::load(path).map_err(|e| PdfError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Opens the PDF at `path` and counts its pages. Zero pages is an error.
pub fn page_count(path: &Path) -> Result<(u32, Document), PdfError> {
    let doc = load(path)?;
    let count = count_pages(path, &doc)?;
    Ok((count, doc))
}

pub fn count_pages(path: &Path, doc: &Document) -> Result<u32, PdfError> {
    match doc.get_pages().len() as u32 {
        0 => Err(PdfError::NoPages(path.to_path_buf())),
        count => Ok(count),
    }
}

/// True when `load` could not open the file with an empty user password.
/// lopdf leaves `/Encrypt` in the trailer and loads no objects in that case.
pub fn requires_password(doc: &Document) -> bool {
    doc.trailer.has(b"Encrypt")
}

/// Counts the pages of a file whose user password is unknown.
///
/// Only strings and streams are encrypted, so the page tree is readable once
/// the trailer stops announcing encryption. Each `/Encrypt` key is renamed in
/// place to a name of the same length, which keeps every xref offset valid.
/// Page trees stored inside object streams stay unreadable and fail here.
pub fn structural_page_count(path: &Path) -> Result<u32, PdfError> {
    let mut bytes = std::fs::read(path).map_err(|e| PdfError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    mask_encrypt_keys(&mut bytes);

    let doc = Document::load_mem(&bytes).map_err(|e| PdfError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    count_pages(path, &doc)
}

fn mask_encrypt_keys(bytes: &mut [u8]) {
    const KEY: &[u8] = b"/Encrypt";
    let mut at = 0;
    while at + KEY.len() <= bytes.len() {
        let followed_by_name_char = bytes
            .get(at + KEY.len())
            .is_some_and(|b| b.is_ascii_alphanumeric());
        if &bytes[at..at + KEY.len()] == KEY && !followed_by_name_char {
            bytes[at + 1] = b'X';
            at += KEY.len();
        } else {
            at += 1;
        }
    }
}

pub fn to_bytes(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfError::Save(e.to_string()))?;
    Ok(buffer)
}

/// Follows an indirect reference one level; direct objects are returned as-is.
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Looks `key` up on the page, then on each ancestor `/Pages` node.
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current: &Dictionary = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// The visible page rectangle in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl PageBox {
    pub const LETTER: PageBox = PageBox {
        left: 0.0,
        bottom: 0.0,
        right: 612.0,
        top: 792.0,
    };

    pub fn from_object(doc: &Document, object: &Object) -> Option<Self> {
        let values: Vec<f32> = object
            .as_array()
            .ok()?
            .iter()
            .filter_map(|v| resolve(doc, v).and_then(number))
            .collect();
        if values.len() != 4 {
            return None;
        }

        let page_box = PageBox {
            left: values[0].min(values[2]),
            bottom: values[1].min(values[3]),
            right: values[0].max(values[2]),
            top: values[1].max(values[3]),
        };
        (page_box.width() > 0.0 && page_box.height() > 0.0).then_some(page_box)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    pub fn to_object(&self) -> Object {
        Object::Array(vec![
            self.left.into(),
            self.bottom.into(),
            self.right.into(),
            self.top.into(),
        ])
    }
}

/// The page's MediaBox, inherited if needed, defaulting to US Letter.
pub fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    inherited_attribute(doc, page_id, b"MediaBox")
        .and_then(|object| PageBox::from_object(doc, object))
        .unwrap_or(PageBox::LETTER)
}

/// Reads a string entry (e.g. `CreationDate`) from the document `/Info`
/// dictionary.
pub fn info_string(doc: &Document, key: &[u8]) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let info = resolve(doc, info)?.as_dict().ok()?;
    match resolve(doc, info.get(key).ok()?)? {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}
