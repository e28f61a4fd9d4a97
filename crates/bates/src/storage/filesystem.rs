use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::StorageError;
use crate::sanitize;

/// Name of the quarantine area inside a run directory.
pub const ISSUES_DIR_NAME: &str = "_FILES WITH ISSUES";

/// Move a file from `src` to `dst`. Uses `rename` first (atomic on the same
/// filesystem) and falls back to copy + delete for cross-device moves.
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// `{stem}_ISSUE_{reason}{.ext}` with spaces in the reason turned into underscores.
pub fn issue_file_name(stem: &str, reason: &str, extension: Option<&str>) -> String {
    let reason = sanitize::file_component(reason);
    match extension {
        Some(ext) if !ext.is_empty() => format!("{}_ISSUE_{}.{}", stem, reason, ext),
        _ => format!("{}_ISSUE_{}", stem, reason),
    }
}

/// File-system side of a run: the mirrored output tree and the issues area.
pub struct ProductionStorage {
    run_directory: PathBuf,
    issues_directory: PathBuf,
}

impl ProductionStorage {
    pub fn new<P: AsRef<Path>>(run_directory: P) -> Self {
        let run_directory = run_directory.as_ref().to_path_buf();
        let issues_directory = run_directory.join(ISSUES_DIR_NAME);
        Self {
            run_directory,
            issues_directory,
        }
    }

    pub fn run_directory(&self) -> &Path {
        &self.run_directory
    }

    pub fn issues_directory(&self) -> &Path {
        &self.issues_directory
    }

    /// Output directory mirroring the source's relative parent, created on demand.
    pub fn target_directory(&self, relative_parent: &Path) -> Result<PathBuf, StorageError> {
        let dir_path = self.run_directory.join(relative_parent);
        self.ensure_directory(&dir_path)?;
        Ok(dir_path)
    }

    /// Writes `content` under a fresh name in `dir_path`, adding `_2`, `_3`, …
    /// when the name is taken.
    pub fn stage(
        &self,
        dir_path: &Path,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let (base, ext) = split_extension(filename);

        for counter in 1..=1000 {
            let try_filename = if counter == 1 {
                filename.to_string()
            } else {
                match ext {
                    Some(ext) => format!("{}_{}{}", base, counter, ext),
                    None => format!("{}_{}", base, counter),
                }
            };

            let try_path = dir_path.join(&try_filename);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&try_path)
            {
                Ok(mut file) => {
                    file.write_all(content)
                        .map_err(|e| StorageError::WriteFile {
                            path: try_path.clone(),
                            source: e,
                        })?;
                    return Ok(try_path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: try_path,
                        source: e,
                    });
                }
            }
        }

        Err(StorageError::FileExists(dir_path.join(filename)))
    }

    /// Writes `content` to `path` through a sibling temp file and a rename,
    /// so readers never see a half-written PDF.
    pub fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<(), StorageError> {
        let dir_path = path.parent().unwrap_or(&self.run_directory);
        self.ensure_directory(dir_path)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let temp_path = dir_path.join(format!(".{}.partial", name));

        std::fs::write(&temp_path, content).map_err(|e| StorageError::WriteFile {
            path: temp_path.clone(),
            source: e,
        })?;

        if path.exists() {
            std::fs::remove_file(path).map_err(|e| StorageError::WriteFile {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        move_file(&temp_path, path).inspect_err(|_| {
            let _ = std::fs::remove_file(&temp_path);
        })
    }

    pub fn copy_file(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        if let Some(parent) = to.parent() {
            self.ensure_directory(parent)?;
        }
        std::fs::copy(from, to).map_err(|e| StorageError::CopyFile {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Diverts a failed file into the issues area.
    ///
    /// When the run already produced an artifact for the file it is moved;
    /// otherwise the source is copied. The source itself is never touched.
    pub fn quarantine(
        &self,
        artifact: Option<&Path>,
        source: &Path,
        reason: &str,
    ) -> Result<PathBuf, StorageError> {
        self.ensure_directory(&self.issues_directory)?;

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let extension = artifact
            .unwrap_or(source)
            .extension()
            .and_then(|e| e.to_str());

        let filename = issue_file_name(stem, reason, extension);
        let destination = self.resolve_conflict(&self.issues_directory, &filename)?;

        match artifact {
            Some(artifact) if artifact.exists() => move_file(artifact, &destination)?,
            _ => {
                std::fs::copy(source, &destination).map_err(|e| StorageError::CopyFile {
                    from: source.to_path_buf(),
                    to: destination.clone(),
                    source: e,
                })?;
            }
        }

        Ok(destination)
    }

    /// Best-effort cleanup of an intermediate file.
    pub fn discard(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %sanitize::redact_path(path), error = %e, "Failed to remove intermediate file");
            }
        }
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Finds a free name in `directory`, appending `_2`, `_3`, … as needed.
    fn resolve_conflict(&self, directory: &Path, filename: &str) -> Result<PathBuf, StorageError> {
        let path = directory.join(filename);
        if std::fs::symlink_metadata(&path).is_err() {
            return Ok(path);
        }

        let (base, ext) = split_extension(filename);
        for counter in 2..=1000 {
            let new_filename = match ext {
                Some(ext) => format!("{}_{}{}", base, counter, ext),
                None => format!("{}_{}", base, counter),
            };

            let new_path = directory.join(&new_filename);
            if std::fs::symlink_metadata(&new_path).is_err() {
                return Ok(new_path);
            }
        }

        Err(StorageError::FileExists(path))
    }
}

fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
        _ => (filename, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_dirs() -> (TempDir, PathBuf, ProductionStorage) {
        let temp_dir = TempDir::new().unwrap();
        let source_dir = temp_dir.path().join("input");
        let run_dir = temp_dir.path().join("run");
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::create_dir_all(&run_dir).unwrap();
        let storage = ProductionStorage::new(&run_dir);
        (temp_dir, source_dir, storage)
    }

    #[test]
    fn test_issue_file_name() {
        assert_eq!(
            issue_file_name("contract", "failed to apply stamp", Some("pdf")),
            "contract_ISSUE_failed_to_apply_stamp.pdf"
        );
        assert_eq!(issue_file_name("notes", "io failure", None), "notes_ISSUE_io_failure");
    }

    #[test]
    fn test_stage_conflict_resolution() {
        let (_temp, _source_dir, storage) = setup_dirs();
        let dir = storage.target_directory(Path::new("sub")).unwrap();

        let first = storage.stage(&dir, "exhibit.pdf", b"one").unwrap();
        let second = storage.stage(&dir, "exhibit.pdf", b"two").unwrap();
        let third = storage.stage(&dir, "exhibit.pdf", b"three").unwrap();

        assert!(first.ends_with("sub/exhibit.pdf"));
        assert!(second.ends_with("sub/exhibit_2.pdf"));
        assert!(third.ends_with("sub/exhibit_3.pdf"));
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn test_write_atomic_replaces_and_cleans_up() {
        let (_temp, _source_dir, storage) = setup_dirs();
        let target = storage.run_directory().join("nested/A0001_doc.pdf");

        storage.write_atomic(&target, b"first").unwrap();
        storage.write_atomic(&target, b"second").unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty(), "temp file left behind");
    }

    #[test]
    fn test_quarantine_moves_artifact() {
        let (_temp, source_dir, storage) = setup_dirs();
        let source = source_dir.join("letter.docx");
        std::fs::write(&source, b"docx").unwrap();
        let artifact = storage.run_directory().join("letter.pdf");
        std::fs::write(&artifact, b"pdf").unwrap();

        let stored = storage
            .quarantine(Some(&artifact), &source, "failed to apply stamp")
            .unwrap();

        assert!(!artifact.exists(), "artifact should be moved");
        assert!(source.exists(), "source must stay in place");
        assert_eq!(
            stored,
            storage
                .issues_directory()
                .join("letter_ISSUE_failed_to_apply_stamp.pdf")
        );
        assert_eq!(std::fs::read(&stored).unwrap(), b"pdf");
    }

    #[test]
    fn test_quarantine_copies_source_without_artifact() {
        let (_temp, source_dir, storage) = setup_dirs();
        let source = source_dir.join("photo.png");
        std::fs::write(&source, b"png").unwrap();

        let first = storage.quarantine(None, &source, "conversion failed").unwrap();
        let second = storage.quarantine(None, &source, "conversion failed").unwrap();

        assert!(source.exists());
        assert!(first.ends_with("photo_ISSUE_conversion_failed.png"));
        assert!(second.ends_with("photo_ISSUE_conversion_failed_2.png"));
    }

    #[test]
    fn test_issues_directory_created_lazily() {
        let (_temp, _source_dir, storage) = setup_dirs();
        assert!(!storage.issues_directory().exists());
        storage.target_directory(Path::new("a/b")).unwrap();
        assert!(!storage.issues_directory().exists());
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.pdf"), ("a", Some(".pdf")));
        assert_eq!(split_extension("noext"), ("noext", None));
        assert_eq!(split_extension(".hidden"), (".hidden", None));
    }
}
