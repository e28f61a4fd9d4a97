use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{entity_text, extension, read_source, Converter, OfficeConverter};
use crate::error::ConvertError;
use crate::render::table::{render_table_pdf, Sheet};
use crate::walker::ConversionRoute;

pub struct SpreadsheetConverter {
    office: OfficeConverter,
}

impl SpreadsheetConverter {
    pub fn new(office: OfficeConverter) -> Self {
        Self { office }
    }
}

impl Converter for SpreadsheetConverter {
    fn route(&self) -> ConversionRoute {
        ConversionRoute::Spreadsheet
    }

    fn convert(&self, path: &Path) -> Result<Vec<u8>, ConvertError> {
        let _span = tracing::info_span!("converter.spreadsheet").entered();

        match extension(path).as_str() {
            "csv" => {
                let sheet = read_csv(&read_source(path)?)?;
                render_table_pdf(&[sheet], false)
            }
            "xlsx" | "xlsm" => {
                let file = std::fs::File::open(path).map_err(|e| ConvertError::ReadDocument {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                let mut archive = zip::ZipArchive::new(file).map_err(|e| {
                    ConvertError::Spreadsheet(format!("Failed to open workbook: {}", e))
                })?;
                let sheets = read_workbook(&mut archive)?;
                render_table_pdf(&sheets, true)
            }
            _ => self.office.convert(path),
        }
    }
}

/// Reads CSV rows; invalid UTF-8 is replaced rather than rejected.
pub fn read_csv(data: &[u8]) -> Result<Sheet, ConvertError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| ConvertError::Spreadsheet(e.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect(),
        );
    }

    Ok(Sheet::new("CSV", rows))
}

/// Reads every worksheet of an Office Open XML workbook in workbook order.
pub fn read_workbook<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<Vec<Sheet>, ConvertError> {
    let workbook = read_entry(archive, "xl/workbook.xml")?
        .ok_or_else(|| ConvertError::Spreadsheet("workbook.xml missing".to_string()))?;
    let relationships = read_entry(archive, "xl/_rels/workbook.xml.rels")?.unwrap_or_default();
    let shared_strings = match read_entry(archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let targets = parse_relationships(&relationships)?;
    let mut sheets = Vec::new();

    for (name, relationship_id) in parse_sheet_list(&workbook)? {
        let target = match targets.get(&relationship_id) {
            Some(target) => target,
            None => continue,
        };
        let entry = if let Some(absolute) = target.strip_prefix('/') {
            absolute.to_string()
        } else {
            format!("xl/{}", target)
        };

        if let Some(xml) = read_entry(archive, &entry)? {
            let rows = parse_sheet(&xml, &shared_strings)?;
            sheets.push(Sheet::new(name, rows));
        }
    }

    Ok(sheets)
}

fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ConvertError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ConvertError::Spreadsheet(format!("Failed to read {}: {}", name, e))),
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ConvertError::Spreadsheet(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(content))
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn xml_error(e: quick_xml::Error) -> ConvertError {
    ConvertError::Spreadsheet(format!("XML parsing error: {}", e))
}

fn parse_sheet_list(xml: &str) -> Result<Vec<(String, String)>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut sheets = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"sheet" => {
                if let (Some(name), Some(id)) = (attribute(e, b"name"), attribute(e, b"id")) {
                    sheets.push((name, id));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }
    Ok(sheets)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut targets = HashMap::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attribute(e, b"Id"), attribute(e, b"Target")) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }
    Ok(targets)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"t" => in_text = in_item,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(std::mem::take(&mut current));
                    in_item = false;
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    current.push_str(&e.decode().unwrap_or_default());
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if in_text {
                    current.push_str(&entity_text(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Shared,
    Inline,
    Other,
}

fn parse_sheet(xml: &str, shared_strings: &[String]) -> Result<Vec<Vec<String>>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut in_row = false;
    let mut cell_column = 0usize;
    let mut cell_kind = CellKind::Other;
    let mut cell_value = String::new();
    let mut capture = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"row" => {
                    in_row = true;
                    current_row.clear();
                }
                b"c" if in_row => {
                    cell_column = match attribute(e, b"r") {
                        Some(reference) => column_index(&reference)?.unwrap_or(current_row.len()),
                        None => current_row.len(),
                    };
                    cell_kind = match attribute(e, b"t").as_deref() {
                        Some("s") => CellKind::Shared,
                        Some("inlineStr") => CellKind::Inline,
                        _ => CellKind::Other,
                    };
                    cell_value.clear();
                }
                b"v" => capture = true,
                b"t" if cell_kind == CellKind::Inline => capture = true,
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" if in_row => {
                    let value = match cell_kind {
                        CellKind::Shared => cell_value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i).cloned())
                            .unwrap_or_default(),
                        _ => std::mem::take(&mut cell_value),
                    };
                    if current_row.len() <= cell_column {
                        current_row.resize(cell_column + 1, String::new());
                    }
                    current_row[cell_column] = value;
                    cell_value.clear();
                }
                b"row" => {
                    rows.push(std::mem::take(&mut current_row));
                    in_row = false;
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if capture {
                    cell_value.push_str(&e.decode().unwrap_or_default());
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if capture {
                    cell_value.push_str(&entity_text(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
    }
    Ok(rows)
}

/// Widest sheet SpreadsheetML allows (column XFD).
const MAX_COLUMNS: usize = 16_384;

/// `"C7"` -> 2, `"AA1"` -> 26. References past column XFD are rejected.
fn column_index(reference: &str) -> Result<Option<usize>, ConvertError> {
    let mut number = 0usize;
    for c in reference.chars().take_while(|c| c.is_ascii_alphabetic()) {
        let digit = usize::from(c.to_ascii_uppercase() as u8 - b'A') + 1;
        number = number
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .filter(|n| *n <= MAX_COLUMNS)
            .ok_or_else(|| {
                ConvertError::Spreadsheet(format!("cell reference '{}' is out of range", reference))
            })?;
    }
    Ok(number.checked_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    const SHEET: &str = r#"<?xml version="1.0"?><worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row><row r="2"><c r="A2" t="s"><v>2</v></c><c r="C2"><v>1250.5</v></c></row><row r="3"><c r="A3" t="inlineStr"><is><t>Inline</t></is></c></row></sheetData></worksheet>"#;

    fn workbook_bytes() -> Vec<u8> {
        workbook_with_sheet(SHEET)
    }

    fn workbook_with_sheet(sheet_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let entries = [
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Ledger" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
            ),
            (
                "xl/sharedStrings.xml",
                r#"<?xml version="1.0"?><sst><si><t>Payee</t></si><si><t>Amount</t></si><si><r><t>Acme </t></r><r><t>Corp</t></r></si></sst>"#,
            ),
            ("xl/worksheets/sheet1.xml", sheet_xml),
        ];
        for (name, content) in entries {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_csv_rows() {
        let sheet = read_csv(b"a,b,c\n1,2\n\"quoted, value\",x,y\n").unwrap();
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[1], vec!["1", "2"]);
        assert_eq!(sheet.rows[2][0], "quoted, value");
    }

    #[test]
    fn test_read_csv_tolerates_bad_utf8() {
        let sheet = read_csv(b"name\ncaf\xe9\n").unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert!(sheet.rows[1][0].starts_with("caf"));
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("C7").unwrap(), Some(2));
        assert_eq!(column_index("AA10").unwrap(), Some(26));
        assert_eq!(column_index("XFD1").unwrap(), Some(16_383));
        assert_eq!(column_index("12").unwrap(), None);
    }

    #[test]
    fn test_column_index_rejects_references_past_xfd() {
        assert!(matches!(column_index("XFE1"), Err(ConvertError::Spreadsheet(_))));
        assert!(matches!(
            column_index("ZZZZZZZZZZZZZZZZ1"),
            Err(ConvertError::Spreadsheet(_))
        ));
    }

    #[test]
    fn test_oversized_cell_reference_fails_conversion() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("wide.xlsx");
        let sheet = r#"<?xml version="1.0"?><worksheet><sheetData><row r="1"><c r="ZZZZZZZZZZZZZZZZ1" t="inlineStr"><is><t>x</t></is></c></row></sheetData></worksheet>"#;
        std::fs::write(&path, workbook_with_sheet(sheet)).unwrap();

        let converter = SpreadsheetConverter::new(OfficeConverter::new(
            "definitely-not-a-real-office",
            std::time::Duration::from_secs(1),
        ));
        assert!(matches!(
            converter.convert(&path),
            Err(ConvertError::Spreadsheet(_))
        ));
    }

    #[test]
    fn test_read_workbook() {
        let mut archive = zip::ZipArchive::new(Cursor::new(workbook_bytes())).unwrap();
        let sheets = read_workbook(&mut archive).unwrap();

        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].name, "Ledger");
        assert_eq!(sheets[0].rows[0], vec!["Payee", "Amount"]);
        assert_eq!(sheets[0].rows[1], vec!["Acme Corp", "", "1250.5"]);
        assert_eq!(sheets[0].rows[2], vec!["Inline"]);
    }

    #[test]
    fn test_convert_xlsx_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("book.xlsx");
        std::fs::write(&path, workbook_bytes()).unwrap();

        let converter = SpreadsheetConverter::new(OfficeConverter::new(
            "definitely-not-a-real-office",
            std::time::Duration::from_secs(1),
        ));
        let bytes = converter.convert(&path).unwrap();
        assert!(lopdf::Document::load_mem(&bytes).is_ok());
    }

    #[test]
    fn test_legacy_format_without_office_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("old.xls");
        std::fs::write(&path, b"not really xls").unwrap();

        let converter = SpreadsheetConverter::new(OfficeConverter::new(
            "definitely-not-a-real-office",
            std::time::Duration::from_secs(1),
        ));
        assert!(matches!(
            converter.convert(&path),
            Err(ConvertError::External { .. })
        ));
    }
}
