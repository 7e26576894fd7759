//! Batch orchestration: reconcile targets one after another.
//!
//! Targets run sequentially, in input order, through a single
//! [`PacedClient`], so pacing applies across the whole batch. A target's
//! failure never stops the batch; the report always has one entry per input.

use std::collections::HashSet;

use treeforge_core::HostConfig;

use crate::cancel::CancellationToken;
use crate::host::{HostingClient, Visibility};
use crate::pacing::PacedClient;
use crate::reconcile::{reconcile_target, BranchPolicy, ReconcileOptions};
use crate::report::{BatchReport, TargetFailure, TargetReport};
use crate::target::Target;

pub struct BatchOrchestrator<C> {
    client: PacedClient<C>,
    options: ReconcileOptions,
}

impl<C: HostingClient> BatchOrchestrator<C> {
    /// Wrap `client` with the pacing, retry, branch and visibility settings
    /// from `config`.
    pub fn new(client: C, config: &HostConfig) -> Self {
        let options = ReconcileOptions {
            base_branches: config.base_branches.clone(),
            visibility: Visibility::from_private(config.private),
            branch_policy: BranchPolicy::from_default_branch(config.use_default_branch),
        };
        Self::with_parts(PacedClient::from_config(client, config), options)
    }

    pub fn with_parts(client: PacedClient<C>, options: ReconcileOptions) -> Self {
        BatchOrchestrator { client, options }
    }

    pub fn client(&self) -> &PacedClient<C> {
        &self.client
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Reconcile every target and collect their outcomes in input order.
    ///
    /// A repository named twice is reconciled once; later entries report
    /// [`TargetFailure::DuplicateTarget`]. After `cancel` fires, targets not
    /// yet started report [`TargetFailure::Cancelled`].
    pub fn run(&self, targets: &[Target], cancel: &CancellationToken) -> BatchReport {
        tracing::info!("reconciling {} target(s)", targets.len());
        let mut seen = HashSet::new();
        let mut report = BatchReport::default();

        for target in targets {
            let entry = if cancel.is_cancelled() {
                TargetReport::failed(target, TargetFailure::Cancelled)
            } else if !seen.insert(target.repository.clone()) {
                tracing::warn!("{}: duplicate target skipped", target.repository);
                TargetReport::failed(target, TargetFailure::DuplicateTarget)
            } else {
                reconcile_target(&self.client, target, &self.options, cancel)
            };
            report.targets.push(entry);
        }

        tracing::info!("{}", report.summary());
        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::HostError;
    use crate::host::{RemoteFileHandle, RemoteRef, RepoRef};
    use crate::memory::{MemoryHost, Op};
    use crate::pacing::RetryPolicy;
    use crate::report::{FileFailureKind, ReconciliationOutcome};
    use crate::target::FileEntry;

    fn orchestrator(host: MemoryHost) -> BatchOrchestrator<MemoryHost> {
        BatchOrchestrator::with_parts(
            PacedClient::new(host, Duration::ZERO, RetryPolicy::none()),
            ReconcileOptions::default(),
        )
    }

    fn target(name: &str) -> Target {
        Target::new(name, "16", vec![FileEntry::new("a", name)]).expect("target")
    }

    #[test]
    fn duplicate_repository_is_reported_not_reconciled() {
        let orch = orchestrator(MemoryHost::new("o"));
        let report = orch.run(
            &[target("a"), target("b"), target("a")],
            &CancellationToken::new(),
        );
        assert_eq!(report.targets.len(), 3);
        assert_eq!(
            report.targets[2].outcome,
            ReconciliationOutcome::Failed(TargetFailure::DuplicateTarget)
        );
        assert_eq!(orch.client().inner().count(Op::CreateRepository), 2);
    }

    #[test]
    fn cancelled_batch_starts_nothing() {
        let orch = orchestrator(MemoryHost::new("o"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = orch.run(&[target("a"), target("b")], &cancel);
        assert!(report
            .targets
            .iter()
            .all(|t| t.outcome == ReconciliationOutcome::Failed(TargetFailure::Cancelled)));
        assert!(orch.client().inner().calls().is_empty());
    }

    /// Stops the batch as soon as the first file lands.
    struct CancelOnFirstPut {
        host: MemoryHost,
        cancel: CancellationToken,
    }

    impl HostingClient for CancelOnFirstPut {
        fn repository_exists(&self, name: &str) -> Result<bool, HostError> {
            self.host.repository_exists(name)
        }
        fn default_branch(&self, repository: &str) -> Result<String, HostError> {
            self.host.default_branch(repository)
        }
        fn create_repository(
            &self,
            name: &str,
            description: &str,
            visibility: Visibility,
        ) -> Result<RepoRef, HostError> {
            self.host.create_repository(name, description, visibility)
        }
        fn get_branch_ref(&self, repository: &str, branch: &str) -> Result<RemoteRef, HostError> {
            self.host.get_branch_ref(repository, branch)
        }
        fn create_branch_ref(&self, repository: &str, branch: &str, sha: &str) -> Result<(), HostError> {
            self.host.create_branch_ref(repository, branch, sha)
        }
        fn get_file_handle(
            &self,
            repository: &str,
            path: &str,
            branch: &str,
        ) -> Result<RemoteFileHandle, HostError> {
            self.host.get_file_handle(repository, path, branch)
        }
        fn put_file(
            &self,
            repository: &str,
            path: &str,
            content: &[u8],
            branch: &str,
            prior: Option<&RemoteFileHandle>,
        ) -> Result<(), HostError> {
            let result = self.host.put_file(repository, path, content, branch, prior);
            self.cancel.cancel();
            result
        }
        fn web_url(&self, repository: &str) -> String {
            self.host.web_url(repository)
        }
    }

    #[test]
    fn cancel_mid_batch_keeps_earlier_outcomes() {
        let cancel = CancellationToken::new();
        let client = CancelOnFirstPut {
            host: MemoryHost::new("o"),
            cancel: cancel.clone(),
        };
        let orch = BatchOrchestrator::with_parts(
            PacedClient::new(client, Duration::ZERO, RetryPolicy::none()),
            ReconcileOptions::default(),
        );
        let first = Target::new(
            "a",
            "16",
            vec![FileEntry::new("one", "1"), FileEntry::new("two", "2")],
        )
        .expect("target");

        let report = orch.run(&[first, target("b"), target("c")], &cancel);

        assert_eq!(report.targets.len(), 3);
        match &report.targets[0].outcome {
            ReconciliationOutcome::PartialFailure(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].path, "two");
                assert_eq!(failures[0].kind, FileFailureKind::Cancelled);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(report.targets[0].files.created, 1);
        for later in &report.targets[1..] {
            assert_eq!(
                later.outcome,
                ReconciliationOutcome::Failed(TargetFailure::Cancelled)
            );
        }

        let host = &orch.client().inner().host;
        assert!(host.has_repository("a"));
        assert!(!host.has_repository("b"));
        assert!(host.calls().iter().all(|c| c.repository() == "a"));
        assert_eq!(report.summary(), "Processed 3 repositories: 0 successful, 3 errors");
    }

    #[test]
    fn config_supplies_branches_and_visibility() {
        let config = HostConfig {
            base_branches: vec!["trunk".to_string()],
            private: true,
            use_default_branch: true,
            ..HostConfig::default()
        };
        let orch = BatchOrchestrator::new(MemoryHost::new("o"), &config);
        assert_eq!(orch.options().base_branches, vec!["trunk".to_string()]);
        assert_eq!(orch.options().visibility, Visibility::Private);
        assert_eq!(orch.options().branch_policy, BranchPolicy::RepositoryDefault);
    }
}
