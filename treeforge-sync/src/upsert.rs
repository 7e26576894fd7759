//! File upsert: create, update, or skip one file on a branch.
//!
//! ## Protocol
//!
//! 1. `ProbeFirst` fetches the file's handle. Matching blob id → `Unchanged`,
//!    zero writes.
//! 2. Put the content, carrying the handle when there is one.
//! 3. On a version conflict, re-probe once and retry once. A second conflict
//!    means someone else is writing the same file: `ConcurrentModification`.
//!
//! `Optimistic` skips step 1. It is used for repositories created in this
//! run, where every file is expected to be absent and a probe would only
//! cost a call.

use thiserror::Error;

use crate::error::HostError;
use crate::hash::blob_id;
use crate::host::{HostingClient, RemoteFileHandle};
use crate::target::FileEntry;

/// How the first attempt at a file is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Put without a handle; probe only after a conflict.
    Optimistic,
    /// Probe before writing.
    ProbeFirst,
}

/// Result of a successful upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Created,
    Updated,
    /// Remote content already matched; nothing was written.
    Unchanged,
}

impl FileOutcome {
    pub fn wrote(&self) -> bool {
        !matches!(self, FileOutcome::Unchanged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpsertError {
    /// The file kept changing under us.
    #[error("concurrent modification of {path}")]
    ConcurrentModification { path: String },

    /// The repository or branch disappeared mid-run.
    #[error("missing repository or branch: {0}")]
    MissingParent(String),

    #[error(transparent)]
    Host(HostError),
}

/// Make `entry` present with its exact content on `branch`.
pub fn upsert_file<C: HostingClient + ?Sized>(
    client: &C,
    repository: &str,
    branch: &str,
    entry: &FileEntry,
    mode: UpsertMode,
) -> Result<FileOutcome, UpsertError> {
    let desired = blob_id(&entry.content);

    let mut handle = match mode {
        UpsertMode::Optimistic => None,
        UpsertMode::ProbeFirst => match probe(client, repository, branch, &entry.path)? {
            Some(h) if h.content_hash == desired => {
                tracing::debug!("{repository}: unchanged {}", entry.path);
                return Ok(FileOutcome::Unchanged);
            }
            other => other,
        },
    };

    let mut reprobed = false;
    loop {
        match client.put_file(repository, &entry.path, &entry.content, branch, handle.as_ref()) {
            Ok(()) => {
                let outcome = if handle.is_some() {
                    FileOutcome::Updated
                } else {
                    FileOutcome::Created
                };
                tracing::info!("{repository}: {outcome:?} {}", entry.path);
                return Ok(outcome);
            }
            Err(HostError::VersionConflict(reason)) if !reprobed => {
                reprobed = true;
                tracing::debug!("{repository}: conflict on {} ({reason}); re-probing", entry.path);
                match probe(client, repository, branch, &entry.path)? {
                    Some(h) if h.content_hash == desired => return Ok(FileOutcome::Unchanged),
                    fresh => handle = fresh,
                }
            }
            Err(HostError::VersionConflict(_)) => {
                return Err(UpsertError::ConcurrentModification {
                    path: entry.path.clone(),
                });
            }
            Err(HostError::NotFound(what)) => return Err(UpsertError::MissingParent(what)),
            Err(err) => return Err(UpsertError::Host(err)),
        }
    }
}

fn probe<C: HostingClient + ?Sized>(
    client: &C,
    repository: &str,
    branch: &str,
    path: &str,
) -> Result<Option<RemoteFileHandle>, UpsertError> {
    match client.get_file_handle(repository, path, branch) {
        Ok(handle) => Ok(Some(handle)),
        Err(HostError::NotFound(_)) => Ok(None),
        Err(err) => Err(UpsertError::Host(err)),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::memory::{MemoryHost, Op};

    fn host() -> MemoryHost {
        let host = MemoryHost::new("o");
        host.add_repository("r", &["16"]);
        host
    }

    #[test]
    fn optimistic_create_is_one_call() {
        let host = host();
        let entry = FileEntry::new("a.mk", "A");
        let outcome = upsert_file(&host, "r", "16", &entry, UpsertMode::Optimistic).expect("ok");
        assert_eq!(outcome, FileOutcome::Created);
        assert_eq!(host.calls().len(), 1);
    }

    #[test]
    fn probe_first_skips_identical_content() {
        let host = host();
        host.seed_file("r", "16", "a.mk", b"A");
        let entry = FileEntry::new("a.mk", "A");
        let outcome = upsert_file(&host, "r", "16", &entry, UpsertMode::ProbeFirst).expect("ok");
        assert_eq!(outcome, FileOutcome::Unchanged);
        assert_eq!(host.count(Op::GetFileHandle), 1);
        assert_eq!(host.write_count(), 0);
    }

    #[test]
    fn probe_first_updates_differing_content() {
        let host = host();
        host.seed_file("r", "16", "a.mk", b"old");
        let entry = FileEntry::new("a.mk", "new");
        let outcome = upsert_file(&host, "r", "16", &entry, UpsertMode::ProbeFirst).expect("ok");
        assert_eq!(outcome, FileOutcome::Updated);
        assert_eq!(host.calls().len(), 2);
        assert_eq!(host.file("r", "16", "a.mk").as_deref(), Some(&b"new"[..]));
    }

    #[rstest]
    #[case::same_content(b"A".as_slice(), FileOutcome::Unchanged, 0)]
    #[case::other_content(b"B".as_slice(), FileOutcome::Updated, 1)]
    fn optimistic_conflict_reprobes(
        #[case] remote: &[u8],
        #[case] expected: FileOutcome,
        #[case] extra_writes: usize,
    ) {
        let host = host();
        host.seed_file("r", "16", "a.mk", remote);
        let entry = FileEntry::new("a.mk", "A");
        let outcome = upsert_file(&host, "r", "16", &entry, UpsertMode::Optimistic).expect("ok");
        assert_eq!(outcome, expected);
        assert_eq!(host.count(Op::GetFileHandle), 1);
        assert_eq!(host.count(Op::PutFile), 1 + extra_writes);
    }

    #[test]
    fn second_conflict_is_concurrent_modification() {
        let host = host();
        host.conflict_on_put("a.mk", 2);
        let entry = FileEntry::new("a.mk", "A");
        let err = upsert_file(&host, "r", "16", &entry, UpsertMode::Optimistic).unwrap_err();
        assert_eq!(
            err,
            UpsertError::ConcurrentModification {
                path: "a.mk".to_string()
            }
        );
        assert_eq!(host.count(Op::PutFile), 2);
    }

    #[test]
    fn missing_branch_is_missing_parent() {
        let host = host();
        let entry = FileEntry::new("a.mk", "A");
        let err = upsert_file(&host, "r", "gone", &entry, UpsertMode::Optimistic).unwrap_err();
        assert!(matches!(err, UpsertError::MissingParent(_)));
    }
}
