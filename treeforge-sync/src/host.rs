//! The hosting-service seam.
//!
//! [`HostingClient`] is the only way reconcilers reach a remote. Every
//! backend classifies its own failures into [`HostError`] before returning,
//! so the reconcilers stay backend-agnostic and testable against
//! [`MemoryHost`](crate::memory::MemoryHost).

use crate::error::HostError;

/// Visibility requested when a repository is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn from_private(private: bool) -> Self {
        if private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Visibility::Private)
    }
}

/// A repository as returned by a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub name: String,
    pub html_url: String,
}

/// A branch head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    pub name: String,
    /// Commit id the branch points at.
    pub sha: String,
}

/// The version token of an existing remote file.
///
/// `content_hash` is the git blob id of the stored bytes, so it both guards
/// updates and lets callers skip writes whose content is already present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileHandle {
    pub path: String,
    pub content_hash: String,
}

/// Remote operations needed to reconcile a target.
///
/// Repository names are relative to the owner the client was built for.
pub trait HostingClient {
    fn repository_exists(&self, name: &str) -> Result<bool, HostError>;

    /// Name of the repository's default branch.
    ///
    /// Fails with [`HostError::NotFound`] if the repository does not exist.
    fn default_branch(&self, repository: &str) -> Result<String, HostError>;

    /// Fails with [`HostError::AlreadyExists`] if `name` is taken.
    fn create_repository(
        &self,
        name: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<RepoRef, HostError>;

    /// Fails with [`HostError::NotFound`] if the branch does not exist.
    fn get_branch_ref(&self, repository: &str, branch: &str) -> Result<RemoteRef, HostError>;

    /// Fails with [`HostError::AlreadyExists`] if the branch already exists.
    fn create_branch_ref(
        &self,
        repository: &str,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), HostError>;

    /// Fails with [`HostError::NotFound`] if the file is absent on `branch`.
    fn get_file_handle(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> Result<RemoteFileHandle, HostError>;

    /// Create (`prior == None`) or update a file.
    ///
    /// Fails with [`HostError::VersionConflict`] when creating a file that
    /// exists, or updating against a handle that is no longer current.
    fn put_file(
        &self,
        repository: &str,
        path: &str,
        content: &[u8],
        branch: &str,
        prior: Option<&RemoteFileHandle>,
    ) -> Result<(), HostError>;

    /// Browser URL of a repository. Computed locally, never a remote call.
    fn web_url(&self, repository: &str) -> String;
}

impl<C: HostingClient + ?Sized> HostingClient for &C {
    fn repository_exists(&self, name: &str) -> Result<bool, HostError> {
        (**self).repository_exists(name)
    }

    fn default_branch(&self, repository: &str) -> Result<String, HostError> {
        (**self).default_branch(repository)
    }

    fn create_repository(
        &self,
        name: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<RepoRef, HostError> {
        (**self).create_repository(name, description, visibility)
    }

    fn get_branch_ref(&self, repository: &str, branch: &str) -> Result<RemoteRef, HostError> {
        (**self).get_branch_ref(repository, branch)
    }

    fn create_branch_ref(
        &self,
        repository: &str,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), HostError> {
        (**self).create_branch_ref(repository, branch, from_sha)
    }

    fn get_file_handle(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> Result<RemoteFileHandle, HostError> {
        (**self).get_file_handle(repository, path, branch)
    }

    fn put_file(
        &self,
        repository: &str,
        path: &str,
        content: &[u8],
        branch: &str,
        prior: Option<&RemoteFileHandle>,
    ) -> Result<(), HostError> {
        (**self).put_file(repository, path, content, branch, prior)
    }

    fn web_url(&self, repository: &str) -> String {
        (**self).web_url(repository)
    }
}
