//! Per-target outcomes and the batch report.

use std::fmt;

use serde::Serialize;

use crate::target::Target;
use crate::upsert::{FileOutcome, UpsertError};

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Why a single file failed while its target carried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFailureKind {
    ConcurrentModification,
    Transport,
    Rejected,
    /// The batch was cancelled before this file was attempted.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub kind: FileFailureKind,
    pub reason: String,
}

impl FileFailure {
    pub(crate) fn from_upsert(path: &str, err: &UpsertError) -> Self {
        let kind = match err {
            UpsertError::ConcurrentModification { .. } => FileFailureKind::ConcurrentModification,
            UpsertError::Host(crate::error::HostError::Transport { .. }) => {
                FileFailureKind::Transport
            }
            _ => FileFailureKind::Rejected,
        };
        FileFailure {
            path: path.to_string(),
            kind,
            reason: err.to_string(),
        }
    }

    pub(crate) fn cancelled(path: &str) -> Self {
        FileFailure {
            path: path.to_string(),
            kind: FileFailureKind::Cancelled,
            reason: "cancelled before upload".to_string(),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.reason)
    }
}

/// Why a whole target was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetFailure {
    /// The existence check or create failed.
    Repository(String),
    NoBaseBranch(Vec<String>),
    Branch(String),
    /// The repository or branch vanished during the file loop.
    MissingParent(String),
    Cancelled,
    /// An earlier target in the same batch names the same repository.
    DuplicateTarget,
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetFailure::Repository(reason) => write!(f, "repository: {reason}"),
            TargetFailure::NoBaseBranch(candidates) => {
                write!(f, "no base branch found (tried {})", candidates.join(", "))
            }
            TargetFailure::Branch(reason) => write!(f, "branch: {reason}"),
            TargetFailure::MissingParent(what) => write!(f, "disappeared during upload: {what}"),
            TargetFailure::Cancelled => write!(f, "cancelled"),
            TargetFailure::DuplicateTarget => write!(f, "duplicate target in batch"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Terminal classification of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Something was written and nothing failed.
    Created,
    /// Repository, branch, and every file were already in place.
    AlreadyPresent,
    PartialFailure(Vec<FileFailure>),
    Failed(TargetFailure),
}

impl ReconciliationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ReconciliationOutcome::Created | ReconciliationOutcome::AlreadyPresent
        )
    }
}

/// Per-file tallies for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileTally {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl FileTally {
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Created => self.created += 1,
            FileOutcome::Updated => self.updated += 1,
            FileOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn written(&self) -> usize {
        self.created + self.updated
    }
}

/// Everything known about one reconciled target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub repository: String,
    pub branch: String,
    pub url: Option<String>,
    pub repository_created: bool,
    pub files: FileTally,
    pub outcome: ReconciliationOutcome,
}

impl TargetReport {
    pub(crate) fn failed(target: &Target, failure: TargetFailure) -> Self {
        TargetReport {
            repository: target.repository.0.clone(),
            branch: target.branch.clone(),
            url: None,
            repository_created: false,
            files: FileTally::default(),
            outcome: ReconciliationOutcome::Failed(failure),
        }
    }

    fn entry(&self) -> ReportEntry {
        let (status, message, error) = match &self.outcome {
            ReconciliationOutcome::Created => {
                let message = if self.repository_created {
                    format!("Repository created, {} file(s) uploaded", self.files.written())
                } else {
                    format!(
                        "{} file(s) created, {} updated, {} unchanged",
                        self.files.created, self.files.updated, self.files.unchanged
                    )
                };
                ("created", Some(message), None)
            }
            ReconciliationOutcome::AlreadyPresent => (
                "exists",
                Some("Repository already up to date".to_string()),
                None,
            ),
            ReconciliationOutcome::PartialFailure(failures) => {
                let listed: Vec<String> = failures.iter().map(ToString::to_string).collect();
                let error = format!(
                    "{} file(s) failed: {}",
                    failures.len(),
                    listed.join("; ")
                );
                ("error", None, Some(error))
            }
            ReconciliationOutcome::Failed(failure) => ("error", None, Some(failure.to_string())),
        };
        ReportEntry {
            name: self.repository.clone(),
            status,
            url: self.url.clone(),
            message,
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch report
// ---------------------------------------------------------------------------

/// Counts of outcomes across a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub created: usize,
    pub already_present: usize,
    pub partial_failure: usize,
    pub failed: usize,
}

/// Outcomes in input order, one per target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub targets: Vec<TargetReport>,
    /// The device the batch was built from, when there is one.
    pub device: Option<DeviceSummary>,
}

/// Device identification echoed in the machine-readable report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub name: String,
    pub codename: String,
}

impl BatchReport {
    pub fn with_device(mut self, name: impl Into<String>, codename: impl Into<String>) -> Self {
        self.device = Some(DeviceSummary {
            name: name.into(),
            codename: codename.into(),
        });
        self
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for t in &self.targets {
            match t.outcome {
                ReconciliationOutcome::Created => counts.created += 1,
                ReconciliationOutcome::AlreadyPresent => counts.already_present += 1,
                ReconciliationOutcome::PartialFailure(_) => counts.partial_failure += 1,
                ReconciliationOutcome::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }

    pub fn successful(&self) -> usize {
        self.targets.iter().filter(|t| t.outcome.is_success()).count()
    }

    pub fn errors(&self) -> usize {
        self.targets.len() - self.successful()
    }

    /// True when no target failed, fully or partly.
    pub fn success(&self) -> bool {
        self.errors() == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Processed {} repositories: {} successful, {} errors",
            self.targets.len(),
            self.successful(),
            self.errors()
        )
    }

    /// The machine-readable report.
    pub fn to_json(&self) -> serde_json::Value {
        let doc = ReportDocument {
            success: self.success(),
            message: self.summary(),
            repositories: self.targets.iter().map(TargetReport::entry).collect(),
            device: self.device.clone(),
        };
        serde_json::to_value(doc).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Serialize)]
struct ReportDocument {
    success: bool,
    message: String,
    repositories: Vec<ReportEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<DeviceSummary>,
}

#[derive(Serialize)]
struct ReportEntry {
    name: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}
