use super::{MergeBackend, MergeReport};
use crate::error::{Error, SkipReason, SkippedFile};
use crate::preset::CompressionParams;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Merge adapter built on `lopdf`. Concatenates the page trees of all
/// readable inputs into one document and compresses streams unless the
/// preset asks for the original bytes. Unreadable inputs become skip
/// entries with a classified reason; the call only fails when no input
/// contributed any page.
pub struct LopdfMergeBackend;

impl LopdfMergeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LopdfMergeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeBackend for LopdfMergeBackend {
    fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        params: &CompressionParams,
    ) -> Result<MergeReport, Error> {
        let mut skipped = Vec::new();
        let mut loaded = Vec::new();

        for input in inputs {
            if !input.exists() {
                log_skip(input, &SkipReason::NotFound);
                skipped.push(SkippedFile {
                    path: input.clone(),
                    reason: SkipReason::NotFound,
                });
                continue;
            }
            match Document::load(input) {
                Ok(doc) if doc.is_encrypted() => {
                    log_skip(input, &SkipReason::PasswordProtected);
                    skipped.push(SkippedFile {
                        path: input.clone(),
                        reason: SkipReason::PasswordProtected,
                    });
                }
                Ok(doc) => loaded.push(doc),
                Err(err) => {
                    let reason = classify_load_error(&err);
                    log_skip(input, &reason);
                    skipped.push(SkippedFile {
                        path: input.clone(),
                        reason,
                    });
                }
            }
        }

        if loaded.is_empty() {
            return Err(Error::MergeBackend(
                "no mergeable documents in this folder".to_string(),
            ));
        }

        let merged_files = loaded.len();
        let mut document = combine(loaded)?;
        if params.jpeg_quality.is_some() {
            document.compress();
        }
        document
            .save(output)
            .map_err(|err| Error::MergeBackend(err.to_string()))?;
        let output_bytes = fs::metadata(output)?.len();

        Ok(MergeReport {
            merged_files,
            skipped,
            output_bytes,
        })
    }
}

fn log_skip(path: &Path, reason: &SkipReason) {
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    warn!(
        "Skipping {} ({} bytes): {} ({})",
        path.display(),
        size,
        reason,
        reason.hint()
    );
}

fn classify_load_error(err: &lopdf::Error) -> SkipReason {
    let text = err.to_string().to_lowercase();
    if text.contains("password") || text.contains("encrypt") {
        SkipReason::PasswordProtected
    } else if text.contains("xref") || text.contains("eof") || text.contains("trailer") {
        SkipReason::DamagedFile
    } else {
        SkipReason::CorruptStructure
    }
}

fn object_type(object: &Object) -> Option<&[u8]> {
    object.as_dict().ok()?.get(b"Type").ok()?.as_name().ok()
}

/// Build a single document from the loaded inputs: renumber every object
/// into one id space, collect all pages under one page tree and keep a
/// single catalog. Outlines are dropped; the dated archive does not carry
/// per-source bookmarks.
fn combine(documents: Vec<Document>) -> Result<Document, Error> {
    let mut max_id = 1;
    let mut documents_pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut documents_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut document = Document::with_version("1.5");

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;
        for (_, object_id) in doc.get_pages() {
            if let Ok(object) = doc.get_object(object_id) {
                documents_pages.insert(object_id, object.to_owned());
            }
        }
        documents_objects.extend(doc.objects);
    }

    let mut catalog_object: Option<(ObjectId, Object)> = None;
    let mut pages_object: Option<(ObjectId, Object)> = None;

    for (object_id, object) in documents_objects.iter() {
        match object_type(object) {
            Some(b"Catalog") => {
                let id = catalog_object
                    .as_ref()
                    .map(|(id, _)| *id)
                    .unwrap_or(*object_id);
                catalog_object = Some((id, object.clone()));
            }
            Some(b"Pages") => {
                if let Ok(dictionary) = object.as_dict() {
                    let mut dictionary = dictionary.clone();
                    if let Some((_, ref existing)) = pages_object {
                        if let Ok(old_dictionary) = existing.as_dict() {
                            dictionary.extend(old_dictionary);
                        }
                    }
                    let id = pages_object
                        .as_ref()
                        .map(|(id, _)| *id)
                        .unwrap_or(*object_id);
                    pages_object = Some((id, Object::Dictionary(dictionary)));
                }
            }
            Some(b"Page") | Some(b"Outlines") | Some(b"Outline") => {}
            _ => {
                document.objects.insert(*object_id, object.clone());
            }
        }
    }

    let Some((pages_id, pages_root)) = pages_object else {
        return Err(Error::MergeBackend(
            "no page tree found in input documents".to_string(),
        ));
    };
    let Some((catalog_id, catalog_root)) = catalog_object else {
        return Err(Error::MergeBackend(
            "no catalog found in input documents".to_string(),
        ));
    };

    for (object_id, object) in documents_pages.iter() {
        if let Ok(dictionary) = object.as_dict() {
            let mut dictionary = dictionary.clone();
            dictionary.set("Parent", pages_id);
            document
                .objects
                .insert(*object_id, Object::Dictionary(dictionary));
        }
    }

    if let Ok(dictionary) = pages_root.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Count", documents_pages.len() as u32);
        dictionary.set(
            "Kids",
            documents_pages
                .keys()
                .map(|id| Object::Reference(*id))
                .collect::<Vec<_>>(),
        );
        document
            .objects
            .insert(pages_id, Object::Dictionary(dictionary));
    }

    if let Ok(dictionary) = catalog_root.as_dict() {
        let mut dictionary = dictionary.clone();
        dictionary.set("Pages", pages_id);
        dictionary.remove(b"Outlines");
        document
            .objects
            .insert(catalog_id, Object::Dictionary(dictionary));
    }

    document.trailer.set("Root", catalog_id);
    document.max_id = document.objects.len() as u32;
    document.renumber_objects();

    Ok(document)
}
