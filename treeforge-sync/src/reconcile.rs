//! Per-target reconciliation.
//!
//! ```text
//! RepoCheck ──► BranchCheck ──► FileUpsertLoop ──► Done
//!     │              │                 │
//!     └──────────────┴──── Failed ◄────┘ (missing parent)
//! ```
//!
//! Failures before the file loop abandon the target. Inside the loop a file
//! failure is recorded and the loop moves on; only a vanished repository or
//! branch stops it.
//!
//! Under [`BranchPolicy::RepositoryDefault`] the BranchCheck step asks the
//! host for the repository's default branch instead of cutting the declared
//! one, and the files land there.

use crate::branch::{ensure_branch, BranchError, BranchOutcome};
use crate::cancel::CancellationToken;
use crate::error::HostError;
use crate::host::{HostingClient, Visibility};
use crate::report::{
    FileFailure, FileTally, ReconciliationOutcome, TargetFailure, TargetReport,
};
use crate::target::Target;
use crate::upsert::{upsert_file, UpsertError, UpsertMode};

/// Which branch a target's files are written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchPolicy {
    /// The target's own branch, cut from a base branch when missing.
    #[default]
    Declared,
    /// The branch the repository reports as its default. Nothing is cut.
    RepositoryDefault,
}

impl BranchPolicy {
    pub fn from_default_branch(use_default: bool) -> Self {
        if use_default {
            BranchPolicy::RepositoryDefault
        } else {
            BranchPolicy::Declared
        }
    }
}

/// Settings shared by every target of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Candidates for the branch a missing target branch is cut from.
    pub base_branches: Vec<String>,
    pub visibility: Visibility,
    pub branch_policy: BranchPolicy,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            base_branches: vec!["main".to_string(), "master".to_string()],
            visibility: Visibility::Public,
            branch_policy: BranchPolicy::Declared,
        }
    }
}

/// Drive one target to its terminal outcome.
pub fn reconcile_target<C: HostingClient + ?Sized>(
    client: &C,
    target: &Target,
    options: &ReconcileOptions,
    cancel: &CancellationToken,
) -> TargetReport {
    let repository = target.repository.0.as_str();
    let mut report = TargetReport {
        repository: repository.to_string(),
        branch: target.branch.clone(),
        url: Some(client.web_url(repository)),
        repository_created: false,
        files: FileTally::default(),
        outcome: ReconciliationOutcome::AlreadyPresent,
    };

    // RepoCheck
    match ensure_repository(client, target, options.visibility) {
        Ok(Some(url)) => {
            report.repository_created = true;
            report.url = Some(url);
        }
        Ok(None) => {}
        Err(failure) => return finish(report, ReconciliationOutcome::Failed(failure)),
    }

    // BranchCheck
    let branch_existed = match options.branch_policy {
        BranchPolicy::Declared => {
            match ensure_branch(client, repository, &target.branch, &options.base_branches) {
                Ok(BranchOutcome::AlreadyExists) => true,
                Ok(BranchOutcome::Created { .. }) => false,
                Err(BranchError::NoBaseBranch { candidates }) => {
                    return finish(
                        report,
                        ReconciliationOutcome::Failed(TargetFailure::NoBaseBranch(candidates)),
                    );
                }
                Err(BranchError::Host(err)) => {
                    return finish(
                        report,
                        ReconciliationOutcome::Failed(TargetFailure::Branch(err.to_string())),
                    );
                }
            }
        }
        BranchPolicy::RepositoryDefault => match client.default_branch(repository) {
            Ok(branch) => {
                tracing::debug!("{repository}: using default branch {branch}");
                report.branch = branch;
                true
            }
            Err(err) => {
                return finish(
                    report,
                    ReconciliationOutcome::Failed(TargetFailure::Branch(err.to_string())),
                );
            }
        },
    };
    let branch = report.branch.clone();

    // FileUpsertLoop
    let mode = if report.repository_created {
        UpsertMode::Optimistic
    } else {
        UpsertMode::ProbeFirst
    };
    let mut failures = Vec::new();
    for (index, entry) in target.files.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::warn!(
                "{repository}: cancelled with {} file(s) remaining",
                target.files.len() - index
            );
            failures.extend(
                target.files[index..]
                    .iter()
                    .map(|rest| FileFailure::cancelled(&rest.path)),
            );
            break;
        }
        match upsert_file(client, repository, &branch, entry, mode) {
            Ok(outcome) => report.files.record(outcome),
            Err(UpsertError::MissingParent(what)) => {
                return finish(
                    report,
                    ReconciliationOutcome::Failed(TargetFailure::MissingParent(what)),
                );
            }
            Err(err) => {
                tracing::warn!("{repository}: {} failed: {err}", entry.path);
                failures.push(FileFailure::from_upsert(&entry.path, &err));
            }
        }
    }

    // Done
    let outcome = if !failures.is_empty() {
        ReconciliationOutcome::PartialFailure(failures)
    } else if !report.repository_created && branch_existed && report.files.written() == 0 {
        ReconciliationOutcome::AlreadyPresent
    } else {
        ReconciliationOutcome::Created
    };
    finish(report, outcome)
}

/// `Ok(Some(url))` when the repository was created by this call.
fn ensure_repository<C: HostingClient + ?Sized>(
    client: &C,
    target: &Target,
    visibility: Visibility,
) -> Result<Option<String>, TargetFailure> {
    let name = target.repository.0.as_str();
    match client.repository_exists(name) {
        Ok(true) => {
            tracing::debug!("{name}: repository exists");
            return Ok(None);
        }
        Ok(false) => {}
        Err(err) => return Err(TargetFailure::Repository(err.to_string())),
    }
    match client.create_repository(name, &target.description, visibility) {
        Ok(created) => {
            tracing::info!("{name}: created repository");
            Ok(Some(created.html_url))
        }
        Err(HostError::AlreadyExists(_)) => {
            tracing::debug!("{name}: repository appeared concurrently");
            Ok(None)
        }
        Err(err) => Err(TargetFailure::Repository(err.to_string())),
    }
}

fn finish(mut report: TargetReport, outcome: ReconciliationOutcome) -> TargetReport {
    match &outcome {
        ReconciliationOutcome::Failed(failure) => {
            tracing::error!("{}: failed: {failure}", report.repository);
        }
        ReconciliationOutcome::PartialFailure(failures) => {
            tracing::warn!(
                "{}: {} file(s) failed, {} written",
                report.repository,
                failures.len(),
                report.files.written()
            );
        }
        _ => {
            tracing::info!(
                "{}: {:?} ({} created, {} updated, {} unchanged)",
                report.repository,
                outcome,
                report.files.created,
                report.files.updated,
                report.files.unchanged
            );
        }
    }
    report.outcome = outcome;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{RemoteFileHandle, RemoteRef, RepoRef};
    use crate::memory::{MemoryHost, Op};
    use crate::report::FileFailureKind;
    use crate::target::FileEntry;

    fn target(files: &[(&str, &str)]) -> Target {
        let files = files.iter().map(|(p, c)| FileEntry::new(*p, *c)).collect();
        Target::new("dt", "16", files)
            .expect("target")
            .with_description("test tree")
    }

    fn run(host: &MemoryHost, t: &Target) -> TargetReport {
        reconcile_target(host, t, &ReconcileOptions::default(), &CancellationToken::new())
    }

    /// Claims every repository is absent, as if another writer created it
    /// between our check and our create.
    struct Racing<'a>(&'a MemoryHost);

    impl HostingClient for Racing<'_> {
        fn repository_exists(&self, _name: &str) -> Result<bool, HostError> {
            Ok(false)
        }
        fn default_branch(&self, repository: &str) -> Result<String, HostError> {
            self.0.default_branch(repository)
        }
        fn create_repository(
            &self,
            name: &str,
            description: &str,
            visibility: Visibility,
        ) -> Result<RepoRef, HostError> {
            self.0.create_repository(name, description, visibility)
        }
        fn get_branch_ref(&self, repository: &str, branch: &str) -> Result<RemoteRef, HostError> {
            self.0.get_branch_ref(repository, branch)
        }
        fn create_branch_ref(&self, repository: &str, branch: &str, sha: &str) -> Result<(), HostError> {
            self.0.create_branch_ref(repository, branch, sha)
        }
        fn get_file_handle(
            &self,
            repository: &str,
            path: &str,
            branch: &str,
        ) -> Result<RemoteFileHandle, HostError> {
            self.0.get_file_handle(repository, path, branch)
        }
        fn put_file(
            &self,
            repository: &str,
            path: &str,
            content: &[u8],
            branch: &str,
            prior: Option<&RemoteFileHandle>,
        ) -> Result<(), HostError> {
            self.0.put_file(repository, path, content, branch, prior)
        }
        fn web_url(&self, repository: &str) -> String {
            self.0.web_url(repository)
        }
    }

    #[test]
    fn fresh_repository_is_created() {
        let host = MemoryHost::new("o");
        let report = run(&host, &target(&[("a", "1"), ("b", "2")]));
        assert_eq!(report.outcome, ReconciliationOutcome::Created);
        assert!(report.repository_created);
        assert_eq!(report.files.created, 2);
        assert_eq!(host.count(Op::GetFileHandle), 0);
        assert_eq!(host.file("dt", "16", "b").as_deref(), Some(&b"2"[..]));
    }

    #[test]
    fn second_run_is_already_present_without_content_writes() {
        let host = MemoryHost::new("o");
        let t = target(&[("a", "1"), ("b", "2")]);
        run(&host, &t);
        host.clear_calls();

        let report = run(&host, &t);
        assert_eq!(report.outcome, ReconciliationOutcome::AlreadyPresent);
        assert_eq!(report.files.unchanged, 2);
        assert_eq!(host.count(Op::PutFile), 0);
        assert_eq!(host.count(Op::CreateRepository), 0);
    }

    #[test]
    fn missing_base_fails_target() {
        let host = MemoryHost::new("o").with_init_branch(None);
        let report = run(&host, &target(&[("a", "1")]));
        assert_eq!(
            report.outcome,
            ReconciliationOutcome::Failed(TargetFailure::NoBaseBranch(vec![
                "main".to_string(),
                "master".to_string()
            ]))
        );
        assert_eq!(host.count(Op::PutFile), 0);
    }

    #[test]
    fn repository_check_failure_fails_target() {
        let host = MemoryHost::new("o");
        host.fail_next(Op::RepositoryExists, HostError::permanent("401 bad credentials"));
        let report = run(&host, &target(&[("a", "1")]));
        assert!(matches!(
            report.outcome,
            ReconciliationOutcome::Failed(TargetFailure::Repository(_))
        ));
        assert_eq!(host.calls().len(), 1);
    }

    #[test]
    fn create_race_continues_as_existing_repository() {
        let host = MemoryHost::new("o");
        host.add_repository("dt", &["main"]);
        let t = target(&[("a", "1")]);
        let report = reconcile_target(
            &Racing(&host),
            &t,
            &ReconcileOptions::default(),
            &CancellationToken::new(),
        );
        assert_eq!(report.outcome, ReconciliationOutcome::Created);
        assert!(!report.repository_created);
        // pre-existing repository: files are probed before writing
        assert_eq!(host.count(Op::GetFileHandle), 1);
    }

    #[test]
    fn default_branch_policy_writes_to_reported_branch() {
        let host = MemoryHost::new("o");
        host.add_repository("dt", &["lineage-23.0", "main"]);
        let options = ReconcileOptions {
            branch_policy: BranchPolicy::RepositoryDefault,
            ..ReconcileOptions::default()
        };
        let report = reconcile_target(
            &host,
            &target(&[("a", "1")]),
            &options,
            &CancellationToken::new(),
        );
        assert_eq!(report.outcome, ReconciliationOutcome::Created);
        assert_eq!(report.branch, "lineage-23.0");
        assert_eq!(host.file("dt", "lineage-23.0", "a").as_deref(), Some(&b"1"[..]));
        assert!(!host.has_branch("dt", "16"));
        assert_eq!(host.count(Op::GetBranchRef), 0);
        assert_eq!(host.count(Op::CreateBranchRef), 0);
    }

    #[test]
    fn default_branch_lookup_failure_fails_target() {
        let host = MemoryHost::new("o");
        host.add_repository("dt", &["main"]);
        host.fail_next(Op::DefaultBranch, HostError::permanent("HTTP 403"));
        let options = ReconcileOptions {
            branch_policy: BranchPolicy::RepositoryDefault,
            ..ReconcileOptions::default()
        };
        let report = reconcile_target(
            &host,
            &target(&[("a", "1")]),
            &options,
            &CancellationToken::new(),
        );
        assert!(matches!(
            report.outcome,
            ReconciliationOutcome::Failed(TargetFailure::Branch(_))
        ));
        assert_eq!(host.count(Op::PutFile), 0);
    }

    #[test]
    fn cancel_marks_remaining_files() {
        let host = MemoryHost::new("o");
        host.add_repository("dt", &["main", "16"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = reconcile_target(
            &host,
            &target(&[("a", "1"), ("b", "2")]),
            &ReconcileOptions::default(),
            &cancel,
        );
        match report.outcome {
            ReconciliationOutcome::PartialFailure(failures) => {
                assert_eq!(failures.len(), 2);
                assert!(failures.iter().all(|f| f.kind == FileFailureKind::Cancelled));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(host.count(Op::PutFile), 0);
    }
}
