use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatesError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Walk error: {0}")]
    Walk(#[from] WalkError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid value '{value}' for {field}: expected one of {expected}")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Failed to parse email: {0}")]
    Email(String),

    #[error("Failed to process image: {0}")]
    Image(String),

    #[error("Failed to process DOCX: {0}")]
    Docx(String),

    #[error("Failed to render PDF: {0}")]
    Render(String),

    #[error("External command '{program}' failed: {message}")]
    External { program: String, message: String },

    #[error("External command '{program}' timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("Converter panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to open PDF '{path}': {message}")]
    Open { path: PathBuf, message: String },

    #[error("PDF '{0}' has no pages")]
    NoPages(PathBuf),

    #[error("PDF '{path}' could not be unlocked: {attempts}")]
    Locked { path: PathBuf, attempts: String },

    #[error("Failed to serialize PDF: {0}")]
    Save(String),
}

/// Raised by a single overlay strategy; the compositor never lets it escape.
#[derive(Error, Debug)]
pub enum StampError {
    #[error("Page object is missing or is not a dictionary")]
    MissingPage,

    #[error("Unsupported page contents: {0}")]
    Contents(String),

    #[error("Unsupported page resources: {0}")]
    Resources(String),

    #[error("Failed to encode stamp content: {0}")]
    Encode(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy file from '{from}' to '{to}': {source}")]
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build report archive: {0}")]
    Archive(String),

    #[error("Failed to encode report XML: {0}")]
    Xml(String),
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Directory scan failed for '{path}': {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to assemble merged PDF: {0}")]
    Assemble(String),

    #[error("Failed to write merged PDF '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum WalkError {
    #[error("Input path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Directory scan failed for '{path}': {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, BatesError>;
