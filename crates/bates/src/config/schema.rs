use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for one production run.
///
/// Built by a presentation shell and handed to [`crate::Production`], which
/// keeps it behind an `Arc` for the rest of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionJob {
    pub input: PathBuf,
    pub output_root: PathBuf,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_zero_pad")]
    pub zero_pad: usize,
    #[serde(default = "default_start")]
    pub start: u64,
    #[serde(default)]
    pub style: StampStyle,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_converter_timeout")]
    pub converter_timeout_secs: u64,
    #[serde(default = "default_office_command")]
    pub office_command: String,
    #[serde(default = "default_true")]
    pub build_report: bool,
    #[serde(default = "default_true")]
    pub build_merge: bool,
}

fn default_zero_pad() -> usize {
    5
}

fn default_start() -> u64 {
    1
}

fn default_workers() -> usize {
    1
}

fn default_converter_timeout() -> u64 {
    120
}

fn default_office_command() -> String {
    "soffice".to_string()
}

fn default_true() -> bool {
    true
}

impl ProductionJob {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output_root: Q) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output_root: output_root.as_ref().to_path_buf(),
            prefix: String::new(),
            zero_pad: default_zero_pad(),
            start: default_start(),
            style: StampStyle::default(),
            workers: default_workers(),
            converter_timeout_secs: default_converter_timeout(),
            office_command: default_office_command(),
            build_report: true,
            build_merge: true,
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = normalize_prefix(prefix);
        self
    }

    pub fn is_single_file(&self) -> bool {
        self.input.is_file()
    }

    pub fn converter_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.converter_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input.exists() {
            return Err(validation(format!(
                "input path '{}' does not exist",
                self.input.display()
            )));
        }
        if self.zero_pad == 0 {
            return Err(validation("zero_pad must be at least 1"));
        }
        if self.start == 0 {
            return Err(validation("start must be at least 1"));
        }
        if self.workers == 0 {
            return Err(validation("workers must be at least 1"));
        }
        if self.prefix.contains(['/', '\\']) {
            return Err(validation("prefix must not contain path separators"));
        }
        self.style.validate()
    }
}

/// Trailing underscores are dropped; the label separator is added when names are built.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim().trim_end_matches('_').to_string()
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampStyle {
    #[serde(default)]
    pub position: StampPosition,
    #[serde(default)]
    pub color: StampColor,
    /// Percent, 0 to 100.
    #[serde(default = "default_opacity")]
    pub opacity: u8,
    /// Bounding box line width in points; 0 disables the box.
    #[serde(default)]
    pub box_width: f32,
    #[serde(default)]
    pub x_offset: i32,
    #[serde(default)]
    pub y_offset: i32,
}

fn default_opacity() -> u8 {
    100
}

impl Default for StampStyle {
    fn default() -> Self {
        Self {
            position: StampPosition::default(),
            color: StampColor::default(),
            opacity: default_opacity(),
            box_width: 0.0,
            x_offset: 0,
            y_offset: 0,
        }
    }
}

impl StampStyle {
    pub fn alpha(&self) -> f32 {
        f32::from(self.opacity.min(100)) / 100.0
    }

    pub fn draws_box(&self) -> bool {
        self.box_width > 0.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.opacity > 100 {
            return Err(validation(format!(
                "opacity must be between 0 and 100, got {}",
                self.opacity
            )));
        }
        if !self.box_width.is_finite() || self.box_width < 0.0 {
            return Err(validation(format!(
                "box width must be a non-negative number, got {}",
                self.box_width
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAnchor {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAnchor {
    Left,
    Center,
    Right,
}

/// One cell of the 3x3 placement grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StampPosition {
    pub vertical: VerticalAnchor,
    pub horizontal: HorizontalAnchor,
}

const POSITION_NAMES: &str = "top-left, top-center, top-right, middle-left, middle-center, \
                              middle-right, bottom-left, bottom-center, bottom-right";

impl StampPosition {
    pub const fn new(vertical: VerticalAnchor, horizontal: HorizontalAnchor) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }
}

impl Default for StampPosition {
    fn default() -> Self {
        Self::new(VerticalAnchor::Bottom, HorizontalAnchor::Right)
    }
}

impl fmt::Display for StampPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vertical = match self.vertical {
            VerticalAnchor::Top => "top",
            VerticalAnchor::Middle => "middle",
            VerticalAnchor::Bottom => "bottom",
        };
        let horizontal = match self.horizontal {
            HorizontalAnchor::Left => "left",
            HorizontalAnchor::Center => "center",
            HorizontalAnchor::Right => "right",
        };
        write!(f, "{}-{}", vertical, horizontal)
    }
}

impl FromStr for StampPosition {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidValue {
            field: "position",
            value: s.to_string(),
            expected: POSITION_NAMES,
        };

        let normalized = s.trim().to_lowercase().replace([' ', '_'], "-");
        let (vertical, horizontal) = normalized.split_once('-').ok_or_else(invalid)?;

        let vertical = match vertical {
            "top" => VerticalAnchor::Top,
            "middle" => VerticalAnchor::Middle,
            "bottom" => VerticalAnchor::Bottom,
            _ => return Err(invalid()),
        };
        let horizontal = match horizontal {
            "left" => HorizontalAnchor::Left,
            "center" => HorizontalAnchor::Center,
            "right" => HorizontalAnchor::Right,
            _ => return Err(invalid()),
        };

        Ok(Self::new(vertical, horizontal))
    }
}

impl Serialize for StampPosition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StampPosition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StampColor {
    #[default]
    Black,
    Red,
    Blue,
    Green,
    Gray,
}

impl StampColor {
    pub fn rgb(self) -> (f32, f32, f32) {
        match self {
            StampColor::Black => (0.0, 0.0, 0.0),
            StampColor::Red => (1.0, 0.0, 0.0),
            StampColor::Blue => (0.0, 0.0, 1.0),
            StampColor::Green => (0.0, 0.5, 0.0),
            StampColor::Gray => (0.5, 0.5, 0.5),
        }
    }
}

impl fmt::Display for StampColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StampColor::Black => "black",
            StampColor::Red => "red",
            StampColor::Blue => "blue",
            StampColor::Green => "green",
            StampColor::Gray => "gray",
        };
        f.write_str(name)
    }
}

impl FromStr for StampColor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "black" => Ok(StampColor::Black),
            "red" => Ok(StampColor::Red),
            "blue" => Ok(StampColor::Blue),
            "green" => Ok(StampColor::Green),
            "gray" | "grey" => Ok(StampColor::Gray),
            _ => Err(ConfigError::InvalidValue {
                field: "color",
                value: s.to_string(),
                expected: "black, red, blue, green, gray",
            }),
        }
    }
}
