//! Builders for the PDFs produced by the converters: paginated text,
//! paginated tables and single-image pages.

pub mod image;
pub mod metrics;
pub mod table;
pub mod text;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

use crate::error::ConvertError;

/// US Letter, portrait.
pub const LETTER: (f32, f32) = (612.0, 792.0);

/// A4, landscape.
pub const A4_LANDSCAPE: (f32, f32) = (842.0, 595.0);

/// Encodes text for a WinAnsi-encoded base-14 font. Characters outside
/// Latin-1 are replaced with `?`.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => b'\'',
            '\u{201C}' | '\u{201D}' => b'"',
            '\u{2013}' | '\u{2014}' => b'-',
            c if (c as u32) < 0x100 && !c.is_control() => c as u8,
            _ => b'?',
        })
        .collect()
}

pub fn pdf_string(text: &str) -> Object {
    Object::String(win_ansi(text), StringFormat::Literal)
}

pub fn type1_font(base_font: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => Object::Name(base_font.as_bytes().to_vec()),
        "Encoding" => "WinAnsiEncoding",
    }
}

pub(crate) fn show_text(font: &str, size: f32, x: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![pdf_string(text)]),
        Operation::new("ET", vec![]),
    ]
}

pub(crate) fn fill_rgb(r: f32, g: f32, b: f32) -> Operation {
    Operation::new("rg", vec![r.into(), g.into(), b.into()])
}

pub(crate) fn stroke_rgb(r: f32, g: f32, b: f32) -> Operation {
    Operation::new("RG", vec![r.into(), g.into(), b.into()])
}

pub(crate) fn rect(x: f32, y: f32, width: f32, height: f32) -> Operation {
    Operation::new("re", vec![x.into(), y.into(), width.into(), height.into()])
}

/// Assembles a document whose pages share one resource dictionary.
pub(crate) fn assemble(
    pages: Vec<Content>,
    size: (f32, f32),
    resources: Dictionary,
) -> Result<Vec<u8>, ConvertError> {
    if pages.is_empty() {
        return Err(ConvertError::Render("document has no pages".to_string()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let resources_id = doc.add_object(resources);

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for content in pages {
        let encoded = content
            .encode()
            .map_err(|e| ConvertError::Render(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), size.0.into(), size.1.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ConvertError::Render(e.to_string()))?;
    Ok(buffer)
}
