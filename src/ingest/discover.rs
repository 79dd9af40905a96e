//! Local document discovery.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions (lower-case, without the dot) eligible for upload.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "txt", "md", "html"];

/// Key prefix every uploaded document lands under.
pub const DOCUMENT_PREFIX: &str = "documents/";

/// A local file paired with its destination object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    /// Path on disk.
    pub path: PathBuf,
    /// Object key, `documents/<relative path>` with `/` separators.
    pub key: String,
}

/// Recursively collect uploadable documents under `root`, in file-name order.
///
/// Unreadable directory entries are logged and skipped.
pub fn discover_documents(root: &Path) -> Vec<DocumentFile> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "Skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && has_allowed_extension(entry.path()))
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            Some(DocumentFile {
                key: object_key(relative),
                path: entry.into_path(),
            })
        })
        .collect()
}

fn has_allowed_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn object_key(relative: &Path) -> String {
    let parts: Vec<String> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    format!("{DOCUMENT_PREFIX}{}", parts.join("/"))
}
