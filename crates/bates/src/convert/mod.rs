pub mod email;
pub mod external;
pub mod generic;
pub mod spreadsheet;

use std::path::Path;
use std::time::Duration;

use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;

use crate::error::ConvertError;
use crate::walker::ConversionRoute;

pub use external::OfficeConverter;

/// Turns one non-PDF source into PDF bytes.
pub trait Converter: Send + Sync {
    fn route(&self) -> ConversionRoute;
    fn convert(&self, path: &Path) -> Result<Vec<u8>, ConvertError>;
}

/// One converter per route, chosen once the walker has classified a file.
pub struct ConverterRegistry {
    converters: Vec<Box<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new(office_command: &str, timeout: Duration) -> Self {
        let office = OfficeConverter::new(office_command, timeout);
        Self::with_converters(vec![
            Box::new(spreadsheet::SpreadsheetConverter::new(office.clone())),
            Box::new(email::EmailConverter::new()),
            Box::new(generic::GenericConverter::new(office)),
        ])
    }

    pub fn with_converters(converters: Vec<Box<dyn Converter>>) -> Self {
        Self { converters }
    }

    pub fn convert(&self, route: ConversionRoute, path: &Path) -> Result<Vec<u8>, ConvertError> {
        let _span = tracing::info_span!("convert", route = ?route).entered();

        let converter = self
            .converters
            .iter()
            .find(|c| c.route() == route)
            .ok_or_else(|| ConvertError::UnsupportedFormat(format!("{:?}", route)))?;

        converter.convert(path)
    }
}

pub(crate) fn read_source(path: &Path) -> Result<Vec<u8>, ConvertError> {
    std::fs::read(path).map_err(|e| ConvertError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Text for an entity or character reference reported between text events.
pub(crate) fn entity_text(reference: &BytesRef<'_>) -> String {
    if let Ok(Some(c)) = reference.resolve_char_ref() {
        return c.to_string();
    }
    reference
        .decode()
        .ok()
        .and_then(|name| resolve_xml_entity(&name))
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}
