//! Paginated table layout for spreadsheet data.

use lopdf::content::{Content, Operation};
use lopdf::dictionary;

use super::metrics::Font;
use super::{assemble, fill_rgb, rect, show_text, stroke_rgb, type1_font, A4_LANDSCAPE};
use crate::error::ConvertError;

const MARGIN: f32 = 18.0;
const FONT_SIZE: f32 = 7.0;
const TITLE_SIZE: f32 = 10.0;
const LINE_HEIGHT: f32 = 8.5;
const CELL_PADDING: f32 = 3.0;
const ROWS_PER_PAGE: usize = 30;
const MAX_CELL_LINES: usize = 3;
const MIN_COLUMN_WIDTH: f32 = 28.8;
const MAX_COLUMN_WIDTH: f32 = 108.0;

const HEADER_FILL: (f32, f32, f32) = (0.310, 0.506, 0.741);
const STRIPE_FILL: (f32, f32, f32) = (0.949, 0.949, 0.949);
const GRID: (f32, f32, f32) = (0.6, 0.6, 0.6);

/// One worksheet: the first row is the header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows
            .iter()
            .all(|row| row.iter().all(|cell| cell.trim().is_empty()))
    }
}

struct PreparedRow {
    cells: Vec<Vec<String>>,
    height: f32,
}

/// Renders every non-empty sheet onto landscape A4 pages, repeating the
/// header row on each page. Sheet titles are drawn when `show_titles` is set.
pub fn render_table_pdf(sheets: &[Sheet], show_titles: bool) -> Result<Vec<u8>, ConvertError> {
    let mut pages = Vec::new();

    for sheet in sheets.iter().filter(|s| !s.is_empty()) {
        pages.extend(render_sheet(sheet, show_titles));
    }

    if pages.is_empty() {
        return Err(ConvertError::Spreadsheet("no sheet contains data".to_string()));
    }

    let resources = dictionary! {
        "Font" => dictionary! {
            "F1" => type1_font(Font::Helvetica.base_name()),
            "F2" => type1_font(Font::HelveticaBold.base_name()),
        },
    };
    assemble(pages, A4_LANDSCAPE, resources)
}

fn render_sheet(sheet: &Sheet, show_titles: bool) -> Vec<Content> {
    let column_count = sheet.rows.iter().map(Vec::len).max().unwrap_or(0);
    let cells: Vec<Vec<String>> = sheet
        .rows
        .iter()
        .enumerate()
        .map(|(row_index, row)| {
            (0..column_count)
                .map(|col| {
                    let raw = row.get(col).map(String::as_str).unwrap_or("");
                    if row_index == 0 {
                        raw.trim().to_string()
                    } else {
                        format_cell(raw)
                    }
                })
                .collect()
        })
        .collect();

    let (page_width, page_height) = A4_LANDSCAPE;
    let widths = column_widths(&cells, page_width - 2.0 * MARGIN);

    let prepared: Vec<PreparedRow> = cells
        .iter()
        .enumerate()
        .map(|(row_index, row)| {
            let font = if row_index == 0 { Font::HelveticaBold } else { Font::Helvetica };
            let wrapped: Vec<Vec<String>> = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| wrap_cell(cell, font, width - 2.0 * CELL_PADDING))
                .collect();
            let lines = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);
            PreparedRow {
                cells: wrapped,
                height: lines as f32 * LINE_HEIGHT + 2.0 * CELL_PADDING,
            }
        })
        .collect();

    let (header, body) = match prepared.split_first() {
        Some(split) => split,
        None => return Vec::new(),
    };

    let top = page_height - MARGIN;
    let title_space = if show_titles { TITLE_SIZE + 6.0 } else { 0.0 };

    let mut pages = Vec::new();
    let mut index = 0;
    loop {
        let mut operations = Vec::new();
        let mut y = top;

        if show_titles {
            operations.extend(show_text("F2", TITLE_SIZE, MARGIN, y - TITLE_SIZE, &sheet.name));
            y -= title_space;
        }

        draw_row(&mut operations, header, &widths, y, RowStyle::Header);
        y -= header.height;

        let mut rows_on_page = 0;
        while index < body.len() && rows_on_page < ROWS_PER_PAGE {
            let row = &body[index];
            if rows_on_page > 0 && y - row.height < MARGIN {
                break;
            }
            let style = if index % 2 == 1 { RowStyle::Striped } else { RowStyle::Plain };
            draw_row(&mut operations, row, &widths, y, style);
            y -= row.height;
            rows_on_page += 1;
            index += 1;
        }

        pages.push(Content { operations });
        if index >= body.len() {
            break;
        }
    }

    pages
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RowStyle {
    Header,
    Striped,
    Plain,
}

fn draw_row(operations: &mut Vec<Operation>, row: &PreparedRow, widths: &[f32], top: f32, style: RowStyle) {
    let bottom = top - row.height;
    let total_width: f32 = widths.iter().sum();

    operations.push(Operation::new("q", vec![]));
    let fill = match style {
        RowStyle::Header => Some(HEADER_FILL),
        RowStyle::Striped => Some(STRIPE_FILL),
        RowStyle::Plain => None,
    };
    if let Some((r, g, b)) = fill {
        operations.push(fill_rgb(r, g, b));
        operations.push(rect(MARGIN, bottom, total_width, row.height));
        operations.push(Operation::new("f", vec![]));
    }

    operations.push(stroke_rgb(GRID.0, GRID.1, GRID.2));
    operations.push(Operation::new("w", vec![0.25_f32.into()]));
    let mut x = MARGIN;
    for width in widths {
        operations.push(rect(x, bottom, *width, row.height));
        x += width;
    }
    operations.push(Operation::new("S", vec![]));

    let (font, color) = match style {
        RowStyle::Header => ("F2", (1.0, 1.0, 1.0)),
        _ => ("F1", (0.0, 0.0, 0.0)),
    };
    operations.push(fill_rgb(color.0, color.1, color.2));

    let mut x = MARGIN;
    for (lines, width) in row.cells.iter().zip(widths) {
        let mut baseline = top - CELL_PADDING - FONT_SIZE;
        for line in lines {
            if !line.is_empty() {
                operations.extend(show_text(font, FONT_SIZE, x + CELL_PADDING, baseline, line));
            }
            baseline -= LINE_HEIGHT;
        }
        x += width;
    }
    operations.push(Operation::new("Q", vec![]));
}

/// Natural width per column, clamped, then scaled down to fit `available`.
fn column_widths(cells: &[Vec<String>], available: f32) -> Vec<f32> {
    let column_count = cells.first().map(Vec::len).unwrap_or(0);
    let mut widths: Vec<f32> = (0..column_count)
        .map(|col| {
            let natural = cells
                .iter()
                .enumerate()
                .map(|(row_index, row)| {
                    let font = if row_index == 0 { Font::HelveticaBold } else { Font::Helvetica };
                    font.text_width(&row[col], FONT_SIZE)
                })
                .fold(0.0_f32, f32::max);
            (natural + 2.0 * CELL_PADDING).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect();

    let total: f32 = widths.iter().sum();
    if total > available && total > 0.0 {
        let scale = available / total;
        for width in &mut widths {
            *width *= scale;
        }
    }
    widths
}

/// Wraps a cell into at most three lines that fit `width`; overflow is
/// marked with an ellipsis.
fn wrap_cell(text: &str, font: Font, width: f32) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        let c = if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c };
        current.push(c);
        if font.text_width(&current, FONT_SIZE) > width && current.chars().count() > 1 {
            current.pop();
            let carry = match current.rfind(' ') {
                Some(pos) if pos > 0 => {
                    let rest = current[pos + 1..].to_string();
                    current.truncate(pos);
                    rest
                }
                _ => String::new(),
            };
            lines.push(std::mem::take(&mut current));
            current = carry;
            if c != ' ' || !current.is_empty() {
                current.push(c);
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }

    if lines.len() > MAX_CELL_LINES {
        lines.truncate(MAX_CELL_LINES);
        if let Some(last) = lines.last_mut() {
            while !last.is_empty() && font.text_width(&format!("{}...", last), FONT_SIZE) > width {
                last.pop();
            }
            last.push_str("...");
        }
    }
    lines
}

/// Numeric cells get thousands separators and two decimals.
pub fn format_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return trimmed.to_string();
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => format_number(value),
        _ => trimmed.to_string(),
    }
}

pub fn format_number(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer, fraction) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    format!("{}{}.{}", sign, grouped, fraction)
}
