//! `bates_report.xlsx`: one row per ledger record.

use std::io::{Cursor, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::ReportError;
use crate::ledger::FileRecord;

pub const REPORT_FILE_NAME: &str = "bates_report.xlsx";
pub const SHEET_NAME: &str = "Bates Report";
pub const HEADERS: [&str; 5] = [
    "Bates Number",
    "Original Filename",
    "Page Count",
    "Creation Date",
    "Processing Date",
];

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// Style 1 is the bold header font.
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/></cellXfs></styleSheet>"#;

enum Cell {
    Text(String),
    Number(u64),
}

impl Cell {
    fn display_len(&self) -> usize {
        match self {
            Cell::Text(text) => text.chars().count(),
            Cell::Number(n) => n.to_string().len(),
        }
    }
}

fn row_cells(record: &FileRecord) -> Vec<Cell> {
    vec![
        Cell::Text(record.label.clone()),
        Cell::Text(record.original_name.clone()),
        Cell::Number(u64::from(record.page_count)),
        Cell::Text(record.source_date.format("%Y-%m-%d").to_string()),
        Cell::Text(record.processing_date.format("%Y-%m-%d").to_string()),
    ]
}

/// Spreadsheet column letters: 0 → A, 25 → Z, 26 → AA.
pub fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Writes the report for `records` to `path`. An empty ledger still yields a
/// sheet with the header row.
pub fn write_report(records: &[FileRecord], path: &Path) -> Result<(), ReportError> {
    let _span = tracing::info_span!("report", rows = records.len()).entered();

    let bytes = build_workbook(records)?;
    std::fs::write(path, bytes).map_err(|e| ReportError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    tracing::info!(rows = records.len(), "Wrote Bates report");
    Ok(())
}

pub fn build_workbook(records: &[FileRecord]) -> Result<Vec<u8>, ReportError> {
    let header: Vec<Cell> = HEADERS.iter().map(|h| Cell::Text(h.to_string())).collect();
    let rows: Vec<Vec<Cell>> = records.iter().map(row_cells).collect();

    let sheet = sheet_xml(&header, &rows)?;
    let workbook = workbook_xml()?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let parts: [(&str, &[u8]); 6] = [
        ("[Content_Types].xml", CONTENT_TYPES.as_bytes()),
        ("_rels/.rels", ROOT_RELS.as_bytes()),
        ("xl/workbook.xml", &workbook),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.as_bytes()),
        ("xl/styles.xml", STYLES.as_bytes()),
        ("xl/worksheets/sheet1.xml", &sheet),
    ];
    for (name, content) in parts {
        zip.start_file(name, options)
            .map_err(|e| ReportError::Archive(e.to_string()))?;
        zip.write_all(content)
            .map_err(|e| ReportError::Archive(e.to_string()))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| ReportError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

fn xml_error(e: impl std::fmt::Display) -> ReportError {
    ReportError::Xml(e.to_string())
}

fn new_writer() -> Result<Writer<Cursor<Vec<u8>>>, ReportError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(xml_error)?;
    Ok(writer)
}

fn workbook_xml() -> Result<Vec<u8>, ReportError> {
    let mut writer = new_writer()?;
    writer
        .write_event(Event::Start(BytesStart::new("workbook").with_attributes([
            ("xmlns", MAIN_NS),
            (
                "xmlns:r",
                "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
            ),
        ])))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("sheets")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Empty(BytesStart::new("sheet").with_attributes([
            ("name", SHEET_NAME),
            ("sheetId", "1"),
            ("r:id", "rId1"),
        ])))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("sheets")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("workbook")))
        .map_err(xml_error)?;
    Ok(writer.into_inner().into_inner())
}

fn sheet_xml(header: &[Cell], rows: &[Vec<Cell>]) -> Result<Vec<u8>, ReportError> {
    let mut widths: Vec<usize> = header.iter().map(Cell::display_len).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.display_len());
        }
    }

    let mut writer = new_writer()?;
    writer
        .write_event(Event::Start(
            BytesStart::new("worksheet").with_attributes([("xmlns", MAIN_NS)]),
        ))
        .map_err(xml_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("cols")))
        .map_err(xml_error)?;
    for (i, width) in widths.iter().enumerate() {
        let index = (i + 1).to_string();
        let width = (width + 2).to_string();
        writer
            .write_event(Event::Empty(BytesStart::new("col").with_attributes([
                ("min", index.as_str()),
                ("max", index.as_str()),
                ("width", width.as_str()),
                ("customWidth", "1"),
            ])))
            .map_err(xml_error)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("cols")))
        .map_err(xml_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("sheetData")))
        .map_err(xml_error)?;
    write_row(&mut writer, 1, header, true)?;
    for (i, row) in rows.iter().enumerate() {
        write_row(&mut writer, i + 2, row, false)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("sheetData")))
        .map_err(xml_error)?;

    writer
        .write_event(Event::End(BytesEnd::new("worksheet")))
        .map_err(xml_error)?;
    Ok(writer.into_inner().into_inner())
}

fn write_row(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    number: usize,
    cells: &[Cell],
    bold: bool,
) -> Result<(), ReportError> {
    let row_ref = number.to_string();
    writer
        .write_event(Event::Start(
            BytesStart::new("row").with_attributes([("r", row_ref.as_str())]),
        ))
        .map_err(xml_error)?;

    for (i, cell) in cells.iter().enumerate() {
        let reference = format!("{}{}", column_name(i), number);
        let mut element = BytesStart::new("c");
        element.push_attribute(("r", reference.as_str()));
        if bold {
            element.push_attribute(("s", "1"));
        }

        match cell {
            Cell::Text(text) => {
                element.push_attribute(("t", "inlineStr"));
                writer.write_event(Event::Start(element)).map_err(xml_error)?;
                writer
                    .write_event(Event::Start(BytesStart::new("is")))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::Start(BytesStart::new("t")))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::End(BytesEnd::new("t")))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::End(BytesEnd::new("is")))
                    .map_err(xml_error)?;
            }
            Cell::Number(value) => {
                writer.write_event(Event::Start(element)).map_err(xml_error)?;
                writer
                    .write_event(Event::Start(BytesStart::new("v")))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::Text(BytesText::new(&value.to_string())))
                    .map_err(xml_error)?;
                writer
                    .write_event(Event::End(BytesEnd::new("v")))
                    .map_err(xml_error)?;
            }
        }

        writer
            .write_event(Event::End(BytesEnd::new("c")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("row")))
        .map_err(xml_error)?;
    Ok(())
}
