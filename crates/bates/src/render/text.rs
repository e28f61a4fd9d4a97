use lopdf::content::Content;
use lopdf::dictionary;

use super::{assemble, show_text, type1_font, LETTER};
use crate::error::ConvertError;

const FONT_SIZE: f32 = 9.0;
const LINE_HEIGHT: f32 = 11.0;
const MARGIN: f32 = 36.0;
/// Courier at 9pt fits 100 columns between the margins.
pub const WRAP_COLUMNS: usize = 100;

/// Renders plain text as a paginated Courier document on US Letter pages.
pub fn render_text_pdf(text: &str) -> Result<Vec<u8>, ConvertError> {
    let lines: Vec<String> = text
        .lines()
        .flat_map(|line| wrap_line(&line.replace('\t', "    "), WRAP_COLUMNS))
        .collect();

    let height = LETTER.1;
    let lines_per_page = ((height - 2.0 * MARGIN) / LINE_HEIGHT).floor().max(1.0) as usize;

    let mut pages = Vec::new();
    let chunks: Vec<&[String]> = if lines.is_empty() {
        let blank: &[String] = &[];
        vec![blank]
    } else {
        lines.chunks(lines_per_page).collect()
    };

    for chunk in chunks {
        let mut operations = Vec::new();
        let mut y = height - MARGIN - FONT_SIZE;
        for line in chunk {
            if !line.is_empty() {
                operations.extend(show_text("F1", FONT_SIZE, MARGIN, y, line));
            }
            y -= LINE_HEIGHT;
        }
        pages.push(Content { operations });
    }

    let resources = dictionary! {
        "Font" => dictionary! { "F1" => type1_font("Courier") },
    };
    assemble(pages, LETTER, resources)
}

/// Splits one logical line into rows of at most `width` characters,
/// breaking at spaces where possible.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let line = line.trim_end();
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }

    let mut rows = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in line.split(' ') {
        let word_len = word.chars().count();
        let needed = if current_len == 0 { word_len } else { current_len + 1 + word_len };

        if needed <= width {
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(word);
            current_len += word_len;
            continue;
        }

        if current_len > 0 {
            rows.push(std::mem::take(&mut current));
        }

        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > width {
            let rest = chars.split_off(width);
            rows.push(chars.into_iter().collect());
            chars = rest;
        }
        current = chars.into_iter().collect();
        current_len = current.chars().count();
    }

    if current_len > 0 {
        rows.push(current);
    }
    rows
}
