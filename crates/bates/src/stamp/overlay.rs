//! Ways of putting the stamp on top of an existing page.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::layout::{StampGeometry, FONT_SIZE};
use super::{StampMethod, StampResources, FONT_RESOURCE, FORM_RESOURCE, GSTATE_RESOURCE};
use crate::config::StampStyle;
use crate::error::StampError;
use crate::pdf::{self, PageBox};
use crate::render::{fill_rgb, rect, show_text, stroke_rgb};

/// Everything a strategy needs to draw one label on one page.
pub struct Overlay<'a> {
    /// Encoded content stream that draws the label, self-contained in `q … Q`.
    pub content: Vec<u8>,
    pub resources: &'a StampResources,
    pub page_box: PageBox,
}

/// One technique for compositing the label over a page.
///
/// Implementations must leave the document untouched when they return `Err`,
/// so the next strategy starts from the original page.
pub trait OverlayStrategy: Send + Sync {
    fn method(&self) -> StampMethod;
    fn apply(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        overlay: &Overlay<'_>,
    ) -> Result<(), StampError>;
}

pub fn stamp_operations(geometry: &StampGeometry, style: &StampStyle, label: &str) -> Vec<Operation> {
    let (r, g, b) = style.color.rgb();
    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new("gs", vec![Object::Name(GSTATE_RESOURCE.as_bytes().to_vec())]),
        fill_rgb(r, g, b),
        stroke_rgb(r, g, b),
    ];

    if let Some(frame) = geometry.frame {
        operations.push(Operation::new("w", vec![frame.line_width.into()]));
        operations.push(rect(frame.x, frame.y, frame.width, frame.height));
        operations.push(Operation::new("S", vec![]));
    }

    operations.extend(show_text(
        FONT_RESOURCE,
        FONT_SIZE,
        geometry.text_x,
        geometry.text_y,
        label,
    ));
    operations.push(Operation::new("Q", vec![]));
    operations
}

pub fn encode(operations: Vec<Operation>) -> Result<Vec<u8>, StampError> {
    Content { operations }
        .encode()
        .map_err(|e| StampError::Encode(e.to_string()))
}

/// Appends the stamp to the page's own content array and adds the stamp
/// resources to a page-local copy of its resource dictionary.
pub struct ContentMerge;

impl OverlayStrategy for ContentMerge {
    fn method(&self) -> StampMethod {
        StampMethod::ContentMerge
    }

    fn apply(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        overlay: &Overlay<'_>,
    ) -> Result<(), StampError> {
        let existing = content_references(doc, page_id)?;

        let mut resources = page_resources(doc, page_id)?;
        let mut fonts = sub_dictionary(doc, &resources, b"Font")?;
        fonts.set(FONT_RESOURCE, overlay.resources.font);
        let mut states = sub_dictionary(doc, &resources, b"ExtGState")?;
        states.set(GSTATE_RESOURCE, overlay.resources.graphics_state);
        resources.set("Font", fonts);
        resources.set("ExtGState", states);

        let mut trailing = b"Q\n".to_vec();
        trailing.extend_from_slice(&overlay.content);

        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let close_id = doc.add_object(Stream::new(Dictionary::new(), trailing));

        let mut contents: Vec<Object> = Vec::with_capacity(existing.len() + 2);
        contents.push(open_id.into());
        contents.extend(existing);
        contents.push(close_id.into());

        let page = page_dictionary_mut(doc, page_id)?;
        page.set("Contents", Object::Array(contents));
        page.set("Resources", resources);
        Ok(())
    }
}

/// Captures the page as a Form XObject and draws it plus the stamp on a
/// fresh content stream. Used when the page structure cannot be merged.
pub struct FormRedraw;

impl OverlayStrategy for FormRedraw {
    fn method(&self) -> StampMethod {
        StampMethod::FormRedraw
    }

    fn apply(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        overlay: &Overlay<'_>,
    ) -> Result<(), StampError> {
        doc.get_dictionary(page_id)
            .map_err(|_| StampError::MissingPage)?;

        let original = doc
            .get_page_content(page_id)
            .map_err(|e| StampError::Contents(e.to_string()))?;
        // Best effort: a form without usable resources still keeps its paths.
        let form_resources = page_resources(doc, page_id).unwrap_or_else(|_| Dictionary::new());
        let bbox = overlay.page_box.to_object();

        let form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => bbox.clone(),
                "Resources" => form_resources,
            },
            original,
        );

        let mut content = encode(vec![
            Operation::new("q", vec![]),
            Operation::new("Do", vec![Object::Name(FORM_RESOURCE.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ])?;
        content.extend_from_slice(&overlay.content);

        let form_id = doc.add_object(form);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let resources = dictionary! {
            "XObject" => dictionary! { FORM_RESOURCE => form_id },
            "Font" => dictionary! { FONT_RESOURCE => overlay.resources.font },
            "ExtGState" => dictionary! { GSTATE_RESOURCE => overlay.resources.graphics_state },
        };

        let page = page_dictionary_mut(doc, page_id)?;
        page.set("Contents", content_id);
        page.set("Resources", resources);
        page.set("MediaBox", bbox);
        Ok(())
    }
}

fn page_dictionary_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, StampError> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| StampError::MissingPage)
}

/// The page's content stream references, checked to all be streams.
fn content_references(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, StampError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|_| StampError::MissingPage)?;

    let references: Vec<ObjectId> = match page.get(b"Contents") {
        Err(_) => Vec::new(),
        Ok(Object::Reference(id)) => vec![*id],
        Ok(Object::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_reference().map_err(|_| {
                    StampError::Contents("content array holds a direct object".to_string())
                })
            })
            .collect::<Result<_, _>>()?,
        Ok(_) => {
            return Err(StampError::Contents(
                "contents entry is neither a stream nor an array".to_string(),
            ))
        }
    };

    for id in &references {
        doc.get_object(*id)
            .and_then(Object::as_stream)
            .map_err(|_| {
                StampError::Contents(format!("object {} {} is not a content stream", id.0, id.1))
            })?;
    }

    Ok(references.into_iter().map(Object::Reference).collect())
}

/// A page-local copy of the (possibly inherited or indirect) resources.
fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary, StampError> {
    match pdf::inherited_attribute(doc, page_id, b"Resources") {
        None => Ok(Dictionary::new()),
        Some(object) => object
            .as_dict()
            .cloned()
            .map_err(|_| StampError::Resources("resources entry is not a dictionary".to_string())),
    }
}

fn sub_dictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Result<Dictionary, StampError> {
    match resources.get(key) {
        Err(_) => Ok(Dictionary::new()),
        Ok(object) => pdf::resolve(doc, object)
            .and_then(|resolved| resolved.as_dict().ok())
            .cloned()
            .ok_or_else(|| {
                StampError::Resources(format!(
                    "/{} is not a dictionary",
                    String::from_utf8_lossy(key)
                ))
            }),
    }
}
