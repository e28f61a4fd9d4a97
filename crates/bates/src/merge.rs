//! Concatenation of the stamped production into one PDF.

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, ObjectId};
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::MergeError;
use crate::pdf;
use crate::sanitize::redact_path;

#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub path: PathBuf,
    pub files: usize,
    pub pages: u32,
    /// Candidates that could not be loaded or had no pages.
    pub skipped: Vec<PathBuf>,
}

pub fn merged_file_name(prefix: &str) -> String {
    if prefix.is_empty() {
        "combined.pdf".to_string()
    } else {
        format!("{}_combined.pdf", prefix)
    }
}

/// Stamped PDFs under `run_directory`, ordered by the number in their label.
///
/// Only names of the form `{prefix}{digits}_…pdf` qualify. `excluded` paths
/// (the issues area, the merge output) are never visited.
pub fn discover(
    run_directory: &Path,
    prefix: &str,
    excluded: &[&Path],
) -> Result<Vec<(u64, PathBuf)>, MergeError> {
    let pattern = format!(r"^{}(\d+)_", regex::escape(prefix));
    let label = Regex::new(&pattern).map_err(|e| MergeError::Assemble(e.to_string()))?;

    let mut candidates = Vec::new();
    let walker = WalkDir::new(run_directory)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !excluded.iter().any(|ex| entry.path() == *ex));

    for entry in walker {
        let entry = entry.map_err(|e| MergeError::Scan {
            path: run_directory.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        let number = label
            .captures(&name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok());
        if let Some(number) = number {
            candidates.push((number, path.to_path_buf()));
        }
    }

    candidates.sort();
    Ok(candidates)
}

/// Builds `output` from every stamped PDF in the run directory. Returns
/// `Ok(None)` when there was nothing valid to merge.
pub fn build_merged_pdf(
    run_directory: &Path,
    prefix: &str,
    issues_directory: &Path,
    output: &Path,
) -> Result<Option<MergeSummary>, MergeError> {
    let _span = tracing::info_span!("merge").entered();

    let candidates = discover(run_directory, prefix, &[issues_directory, output])?;

    let mut documents = Vec::new();
    let mut skipped = Vec::new();
    for (_, path) in candidates {
        match pdf::load(&path) {
            Ok(doc) if !doc.get_pages().is_empty() => documents.push(doc),
            Ok(_) => {
                warn!(file = %redact_path(&path), "Skipping PDF without pages");
                skipped.push(path);
            }
            Err(e) => {
                warn!(file = %redact_path(&path), error = %e, "Skipping unreadable PDF");
                skipped.push(path);
            }
        }
    }

    if documents.is_empty() {
        info!("No valid stamped PDFs, skipping merge");
        return Ok(None);
    }

    let files = documents.len();
    let mut merged = concatenate(documents)?;
    let pages = merged.get_pages().len() as u32;

    let bytes = pdf::to_bytes(&mut merged).map_err(|e| MergeError::Assemble(e.to_string()))?;
    std::fs::write(output, bytes).map_err(|e| MergeError::WriteFile {
        path: output.to_path_buf(),
        source: e,
    })?;

    info!(files, pages, "Wrote merged production PDF");
    Ok(Some(MergeSummary {
        path: output.to_path_buf(),
        files,
        pages,
        skipped,
    }))
}

/// Copies attributes a page inherits from its ancestors onto the page itself,
/// since the ancestors are dropped when the page moves to a new tree.
fn flatten_inherited(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for page_id in page_ids {
        let mut inherited = Vec::new();
        for key in pdf::INHERITABLE {
            let present = doc
                .get_dictionary(page_id)
                .map(|page| page.has(key))
                .unwrap_or(true);
            if present {
                continue;
            }
            if let Some(value) = pdf::inherited_attribute(doc, page_id, key) {
                inherited.push((key, value.clone()));
            }
        }

        if let Ok(page) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            for (key, value) in inherited {
                page.set(key, value);
            }
        }
    }
}

fn is_structural(object: &Object) -> bool {
    let kind = object
        .as_dict()
        .and_then(|dict| dict.get(b"Type"))
        .and_then(Object::as_name);
    matches!(kind, Ok(b"Catalog" | b"Pages" | b"Outlines" | b"Outline"))
}

fn concatenate(documents: Vec<Document>) -> Result<Document, MergeError> {
    let mut merged = Document::with_version("1.5");
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut next_id = 1;

    for mut doc in documents {
        flatten_inherited(&mut doc);
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        page_ids.extend(doc.get_pages().into_values());
        for (id, object) in doc.objects {
            if !is_structural(&object) {
                merged.objects.insert(id, object);
            }
        }
    }

    merged.max_id = next_id - 1;
    let pages_id = merged.new_object_id();

    for page_id in &page_ids {
        let page = merged
            .get_object_mut(*page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| MergeError::Assemble(format!("page {:?} lost: {}", page_id, e)))?;
        page.set("Parent", pages_id);
    }

    let count = page_ids.len() as i64;
    let kids: Vec<Object> = page_ids.into_iter().map(Object::Reference).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    Ok(merged)
}
