use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{entity_text, extension, read_source, Converter, OfficeConverter};
use crate::error::ConvertError;
use crate::render::image::render_image_pdf;
use crate::render::text::render_text_pdf;
use crate::walker::ConversionRoute;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp"];

/// Office documents, images and plain text.
pub struct GenericConverter {
    office: OfficeConverter,
}

impl GenericConverter {
    pub fn new(office: OfficeConverter) -> Self {
        Self { office }
    }
}

impl Converter for GenericConverter {
    fn route(&self) -> ConversionRoute {
        ConversionRoute::Generic
    }

    fn convert(&self, path: &Path) -> Result<Vec<u8>, ConvertError> {
        let _span = tracing::info_span!("converter.generic").entered();

        let ext = extension(path);
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return render_image_pdf(&read_source(path)?);
        }

        match ext.as_str() {
            "txt" => {
                let data = read_source(path)?;
                render_text_pdf(&String::from_utf8_lossy(&data))
            }
            "docx" => {
                let file = std::fs::File::open(path).map_err(|e| ConvertError::ReadDocument {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                let mut archive = zip::ZipArchive::new(file)
                    .map_err(|e| ConvertError::Docx(format!("Failed to open DOCX: {}", e)))?;
                let text = extract_docx_text(&mut archive)?;
                render_text_pdf(&text)
            }
            _ => self.office.convert(path),
        }
    }
}

fn extract_docx_text<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, ConvertError> {
    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| ConvertError::Docx(format!("Failed to find document.xml: {}", e)))?;

    let mut xml_content = String::new();
    document_xml
        .read_to_string(&mut xml_content)
        .map_err(|e| ConvertError::Docx(format!("Failed to read document.xml: {}", e)))?;

    parse_docx_xml(&xml_content)
}

fn parse_docx_xml(xml: &str) -> Result<String, ConvertError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut text = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text_element = true,
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" => text.push('\n'),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_element {
                    text.push_str(&e.decode().unwrap_or_default());
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text_element {
                    text.push_str(&entity_text(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ConvertError::Docx(format!("XML parsing error: {}", e)));
            }
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use std::time::Duration;
    use zip::write::SimpleFileOptions;

    fn converter() -> GenericConverter {
        GenericConverter::new(OfficeConverter::new(
            "definitely-not-a-real-office",
            Duration::from_secs(1),
        ))
    }

    #[test]
    fn test_parse_docx_paragraphs() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>First</w:t></w:r><w:r><w:t xml:space="preserve"> paragraph</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t><w:tab/><w:t>tabbed</w:t></w:r></w:p></w:body></w:document>"#;
        let text = parse_docx_xml(xml).unwrap();
        assert_eq!(text, "First paragraph\nSecond\ttabbed\n");
    }

    #[test]
    fn test_convert_docx() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(br#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>Exhibit text</w:t></w:r></w:p></w:body></w:document>"#)
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("exhibit.docx");
        std::fs::write(&path, bytes).unwrap();

        let pdf = converter().convert(&path).unwrap();
        assert!(lopdf::Document::load_mem(&pdf).is_ok());
    }

    #[test]
    fn test_corrupt_image_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        assert!(matches!(converter().convert(&path), Err(ConvertError::Image(_))));
    }

    #[test]
    fn test_unknown_office_format_uses_external_command() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("memo.rtf");
        std::fs::write(&path, b"{\\rtf1 memo}").unwrap();

        let result = converter().convert(&path);
        assert!(matches!(result, Err(ConvertError::External { .. })));
    }
}
