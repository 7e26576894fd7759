//! Target sets: one remote repository, one branch, and the files it must hold.
//!
//! A [`Target`] is fully materialized before any remote call is made. File
//! paths are unique and relative with `/` separators; order is stable and is
//! the order uploads are attempted in.

use std::collections::HashSet;
use std::path::{Component, Path};

use treeforge_core::types::RepoName;

use crate::error::{io_err, SyncError};

/// Directory names never uploaded from a local tree.
const SKIPPED_DIRS: &[&str] = &[".git"];

// ---------------------------------------------------------------------------
// FileEntry
// ---------------------------------------------------------------------------

/// One file to be present on the remote branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Relative path inside the repository, `/`-separated.
    pub path: String,
    pub content: Vec<u8>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        FileEntry {
            path: path.into(),
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Desired state of one remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub repository: RepoName,
    pub branch: String,
    /// Used only if the repository has to be created.
    pub description: String,
    pub files: Vec<FileEntry>,
}

impl Target {
    /// Build a target, rejecting duplicate file paths.
    pub fn new(
        repository: impl Into<RepoName>,
        branch: impl Into<String>,
        files: Vec<FileEntry>,
    ) -> Result<Self, SyncError> {
        let repository = repository.into();
        let mut seen = HashSet::new();
        for entry in &files {
            if !seen.insert(entry.path.as_str()) {
                return Err(SyncError::DuplicatePath {
                    repository: repository.0.clone(),
                    path: entry.path.clone(),
                });
            }
        }
        Ok(Target {
            repository,
            branch: branch.into(),
            description: String::new(),
            files,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    /// Append a file, keeping paths unique.
    pub fn push_file(&mut self, entry: FileEntry) -> Result<(), SyncError> {
        if self.has_file(&entry.path) {
            return Err(SyncError::DuplicatePath {
                repository: self.repository.0.clone(),
                path: entry.path,
            });
        }
        self.files.push(entry);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Local tree collection
// ---------------------------------------------------------------------------

/// Read every regular file under `root` as a [`FileEntry`].
///
/// Paths are relative to `root` and sorted, so repeated runs attempt uploads
/// in the same order. `.git` directories are skipped. A missing `root` yields
/// an empty set.
pub fn collect_files(root: &Path) -> Result<Vec<FileEntry>, SyncError> {
    if !root.exists() {
        tracing::debug!("local tree {} does not exist", root.display());
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    walk(root, root, &mut files)?;
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<FileEntry>) -> Result<(), SyncError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| io_err(&path, e))?;

        if file_type.is_dir() {
            let skipped = entry
                .file_name()
                .to_str()
                .is_some_and(|name| SKIPPED_DIRS.contains(&name));
            if !skipped {
                walk(root, &path, out)?;
            }
            continue;
        }

        // Symlinks are followed only when they resolve to a regular file.
        let is_file = file_type.is_file()
            || (file_type.is_symlink() && std::fs::metadata(&path).is_ok_and(|m| m.is_file()));
        if !is_file {
            continue;
        }

        let rel = path.strip_prefix(root).unwrap_or(&path);
        let content = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
        out.push(FileEntry::new(relative_key(rel)?, content));
    }
    Ok(())
}

fn relative_key(rel: &Path) -> Result<String, SyncError> {
    let mut parts = Vec::new();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            let part = part
                .to_str()
                .ok_or_else(|| SyncError::NonUtf8Path(rel.to_path_buf()))?;
            parts.push(part);
        }
    }
    Ok(parts.join("/"))
}
