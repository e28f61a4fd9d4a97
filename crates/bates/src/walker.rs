use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::WalkError;

/// Name fragments and extensions that mark system, temp, lock, log and
/// database artifacts.
const IGNORED_PATTERNS: &[&str] = &[
    ".DS_Store",
    ".Thumbs.db",
    "~$",
    ".tmp",
    ".temp",
    ".bak",
    ".swp",
    ".swo",
    ".log",
    ".ini",
    ".db",
    ".sqlite",
    ".sqlite3",
    ".db-shm",
    ".db-wal",
];

const SPREADSHEET_EXTENSIONS: &[&str] = &["csv", "xls", "xlsx", "xlsm", "xlsb", "ods", "numbers"];
const EMAIL_EXTENSIONS: &[&str] = &["eml"];
const GENERIC_EXTENSIONS: &[&str] = &[
    "docx", "doc", "odt", "rtf", "txt", "png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff", "webp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionRoute {
    Spreadsheet,
    Email,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileClass {
    NativePdf,
    Convertible(ConversionRoute),
    Unsupported,
}

impl FileClass {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => FileClass::NativePdf,
            ext if SPREADSHEET_EXTENSIONS.contains(&ext) => {
                FileClass::Convertible(ConversionRoute::Spreadsheet)
            }
            ext if EMAIL_EXTENSIONS.contains(&ext) => FileClass::Convertible(ConversionRoute::Email),
            ext if GENERIC_EXTENSIONS.contains(&ext) => {
                FileClass::Convertible(ConversionRoute::Generic)
            }
            _ => FileClass::Unsupported,
        }
    }

    pub fn route(self) -> Option<ConversionRoute> {
        match self {
            FileClass::Convertible(route) => Some(route),
            _ => None,
        }
    }
}

/// Returns true for system/temp artifacts that never belong in a production.
pub fn is_ignored(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return true,
    };
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()));

    IGNORED_PATTERNS.iter().any(|pattern| {
        name.contains(pattern) || extension.as_deref() == Some(pattern.to_lowercase().as_str())
    })
}

/// A file found under the input root.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Path relative to the input root; for single-file runs, just the file name.
    pub relative: PathBuf,
    pub class: FileClass,
}

impl DiscoveredFile {
    pub fn new(path: PathBuf, relative: PathBuf) -> Self {
        let class = FileClass::from_path(&path);
        Self {
            path,
            relative,
            class,
        }
    }

    /// Single-file runs place output directly in the run directory.
    pub fn single(path: &Path) -> Self {
        let relative = path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("document"));
        Self::new(path.to_path_buf(), relative)
    }

    pub fn file_name(&self) -> String {
        self.relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn stem(&self) -> String {
        self.relative
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn relative_parent(&self) -> &Path {
        self.relative.parent().unwrap_or_else(|| Path::new(""))
    }
}

pub struct FileWalker {
    input_directory: PathBuf,
    excluded: Option<PathBuf>,
}

impl FileWalker {
    pub fn new<P: AsRef<Path>>(input_directory: P) -> Self {
        Self {
            input_directory: input_directory.as_ref().to_path_buf(),
            excluded: None,
        }
    }

    /// Skips `path` and everything below it, e.g. an output root nested inside
    /// the input root.
    pub fn excluding<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.excluded = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn input_directory(&self) -> &Path {
        &self.input_directory
    }

    /// Lists every non-ignored file under the root, ordered by relative path
    /// so identical trees always number identically.
    pub fn enumerate(&self) -> Result<Vec<DiscoveredFile>, WalkError> {
        if !self.input_directory.exists() {
            return Err(WalkError::NotFound(self.input_directory.clone()));
        }

        let root = canonical(&self.input_directory);
        let excluded = self.excluded.as_deref().map(canonical);

        let mut files = Vec::new();

        let walker = WalkDir::new(&root).min_depth(1).into_iter().filter_entry(|entry| {
            excluded
                .as_deref()
                .map(|skip| !entry.path().starts_with(skip))
                .unwrap_or(true)
        });

        for entry in walker {
            let entry = entry.map_err(|e| WalkError::Scan {
                path: root.clone(),
                source: e,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if is_ignored(path) {
                debug!("Ignoring artifact: {}", path.display());
                continue;
            }

            let relative = match path.strip_prefix(&root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => {
                    warn!("Skipping file outside input root: {}", path.display());
                    continue;
                }
            };

            files.push(DiscoveredFile::new(path.to_path_buf(), relative));
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));

        info!(
            "Found {} files in {}",
            files.len(),
            self.input_directory.display()
        );
        Ok(files)
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
