//! # treeforge-sync
//!
//! Idempotent reconciliation of declared repository targets against a remote
//! git-hosting account.
//!
//! Build [`Target`]s (usually through [`pipeline::build_targets`]), hand them
//! to a [`BatchOrchestrator`] wrapping any [`HostingClient`], and read the
//! resulting [`BatchReport`]. Running the same batch twice against unchanged
//! remote state writes nothing the second time.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use treeforge_core::HostConfig;
//! use treeforge_sync::{
//!     BatchOrchestrator, CachedCredentials, CancellationToken, EnvTokenSource, FileEntry,
//!     GitHubClient, Target,
//! };
//!
//! let config = HostConfig::default();
//! let creds = Arc::new(CachedCredentials::new(EnvTokenSource::new(&config.token_env)));
//! let client = GitHubClient::new(&config, creds).expect("valid api_url");
//! let orchestrator = BatchOrchestrator::new(client, &config);
//! if let Ok(target) = Target::new("dt-alpha", "16", vec![FileEntry::new("README.md", "x")]) {
//!     let report = orchestrator.run(&[target], &CancellationToken::new());
//!     println!("{}", report.summary());
//! }
//! ```

pub mod branch;
pub mod cancel;
pub mod credentials;
pub mod error;
pub mod github;
pub mod hash;
pub mod host;
pub mod memory;
pub mod orchestrator;
pub mod pacing;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod target;
pub mod upsert;

pub use branch::{ensure_branch, BranchError, BranchOutcome};
pub use cancel::CancellationToken;
pub use credentials::{CachedCredentials, CredentialProvider, EnvTokenSource, Token, TokenSource};
pub use error::{AuthError, HostError, SyncError};
pub use github::GitHubClient;
pub use host::{HostingClient, RemoteFileHandle, RemoteRef, RepoRef, Visibility};
pub use memory::MemoryHost;
pub use orchestrator::BatchOrchestrator;
pub use pacing::{PacedClient, RetryPolicy, Sleeper, ThreadSleeper};
pub use reconcile::{reconcile_target, BranchPolicy, ReconcileOptions};
pub use report::{
    BatchReport, DeviceSummary, FileFailure, FileFailureKind, FileTally, OutcomeCounts, ReconciliationOutcome,
    TargetFailure, TargetReport,
};
pub use target::{collect_files, FileEntry, Target};
pub use upsert::{upsert_file, FileOutcome, UpsertError, UpsertMode};
