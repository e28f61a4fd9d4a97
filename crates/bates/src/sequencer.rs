//! Bates number issuance.
//!
//! The sequencer is the only place that knows the next free number. Every
//! file reserves one contiguous block sized to its page count, and the
//! counter only ever moves forward.

use serde::Serialize;

/// Renders numbers as `prefix + zero-padded digits`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelFormat {
    prefix: String,
    width: usize,
}

impl LabelFormat {
    pub fn new(prefix: impl Into<String>, width: usize) -> Self {
        Self {
            prefix: prefix.into(),
            width: width.max(1),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn label(&self, number: u64) -> String {
        format!("{}{}", self.prefix, zero_pad(number, self.width))
    }
}

/// Pads `number` with leading zeros to `width` digits. Numbers wider than
/// `width` are never truncated; the string simply grows.
pub fn zero_pad(number: u64, width: usize) -> String {
    format!("{:0width$}", number, width = width)
}

/// A contiguous block of numbers issued to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    first: u64,
    page_count: u32,
    format: LabelFormat,
}

impl Reservation {
    pub fn first_number(&self) -> u64 {
        self.first
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Last number in the block. Equals `first_number` for an empty block.
    pub fn last_number(&self) -> u64 {
        self.first + u64::from(self.page_count.saturating_sub(1))
    }

    pub fn starting_label(&self) -> String {
        self.format.label(self.first)
    }

    pub fn last_label(&self) -> String {
        self.format.label(self.last_number())
    }

    /// Label for page `index` (0-based) of the file, or `None` past the block.
    pub fn label_for(&self, index: u32) -> Option<String> {
        (index < self.page_count).then(|| self.format.label(self.first + u64::from(index)))
    }

    pub fn labels(&self) -> impl Iterator<Item = String> + '_ {
        (0..self.page_count).map(move |i| self.format.label(self.first + u64::from(i)))
    }
}

#[derive(Debug, Clone)]
pub struct BatesSequencer {
    format: LabelFormat,
    start: u64,
    current_number: u64,
}

impl BatesSequencer {
    pub fn new(format: LabelFormat, start: u64) -> Self {
        Self {
            format,
            start,
            current_number: start,
        }
    }

    pub fn format(&self) -> &LabelFormat {
        &self.format
    }

    pub fn current_number(&self) -> u64 {
        self.current_number
    }

    /// Numbers handed out so far, including blocks whose files later failed.
    pub fn issued(&self) -> u64 {
        self.current_number - self.start
    }

    /// Issues the block for a file with `page_count` pages and advances the
    /// counter by exactly that amount.
    pub fn reserve(&mut self, page_count: u32) -> Reservation {
        let reservation = Reservation {
            first: self.current_number,
            page_count,
            format: self.format.clone(),
        };
        self.current_number += u64::from(page_count);
        reservation
    }
}
