//! In-memory [`HostingClient`] used by tests and dry runs.
//!
//! Behaves like the GitHub backend at the level of the [`HostError`]
//! taxonomy: creates collide with `AlreadyExists`, content writes are guarded
//! by blob ids, and missing parents surface as `NotFound`. Every call is
//! recorded before any injected fault fires, so call counts include failed
//! attempts.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::error::HostError;
use crate::hash::blob_id;
use crate::host::{HostingClient, RemoteFileHandle, RemoteRef, RepoRef, Visibility};

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// The remote operations, for counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    RepositoryExists,
    DefaultBranch,
    CreateRepository,
    GetBranchRef,
    CreateBranchRef,
    GetFileHandle,
    PutFile,
}

impl Op {
    /// Whether the operation mutates remote state.
    pub fn is_write(&self) -> bool {
        matches!(self, Op::CreateRepository | Op::CreateBranchRef | Op::PutFile)
    }
}

/// One recorded call against the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RepositoryExists { repository: String },
    DefaultBranch { repository: String },
    CreateRepository { repository: String },
    GetBranchRef { repository: String, branch: String },
    CreateBranchRef { repository: String, branch: String },
    GetFileHandle { repository: String, path: String },
    PutFile { repository: String, path: String, update: bool },
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Call::RepositoryExists { .. } => Op::RepositoryExists,
            Call::DefaultBranch { .. } => Op::DefaultBranch,
            Call::CreateRepository { .. } => Op::CreateRepository,
            Call::GetBranchRef { .. } => Op::GetBranchRef,
            Call::CreateBranchRef { .. } => Op::CreateBranchRef,
            Call::GetFileHandle { .. } => Op::GetFileHandle,
            Call::PutFile { .. } => Op::PutFile,
        }
    }

    pub fn repository(&self) -> &str {
        match self {
            Call::RepositoryExists { repository }
            | Call::DefaultBranch { repository }
            | Call::CreateRepository { repository }
            | Call::GetBranchRef { repository, .. }
            | Call::CreateBranchRef { repository, .. }
            | Call::GetFileHandle { repository, .. }
            | Call::PutFile { repository, .. } => repository,
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Branch {
    head: String,
    files: BTreeMap<String, Vec<u8>>,
}

#[derive(Debug, Default)]
struct Repo {
    branches: BTreeMap<String, Branch>,
    default_branch: Option<String>,
}

impl Repo {
    /// The recorded default, else the first branch, else `main` as an empty
    /// repository reports it.
    fn default_branch(&self) -> String {
        self.default_branch
            .clone()
            .or_else(|| self.branches.keys().next().cloned())
            .unwrap_or_else(|| "main".to_string())
    }
}

#[derive(Debug, Default)]
struct State {
    repos: BTreeMap<String, Repo>,
    calls: Vec<Call>,
    faults: HashMap<Op, VecDeque<HostError>>,
    put_conflicts: HashMap<String, u32>,
    commits: u64,
}

impl State {
    fn next_commit(&mut self) -> String {
        self.commits += 1;
        format!("{:040x}", self.commits)
    }

    fn take_fault(&mut self, op: Op) -> Option<HostError> {
        self.faults.get_mut(&op).and_then(VecDeque::pop_front)
    }

    fn branch(&self, repository: &str, branch: &str) -> Result<&Branch, HostError> {
        self.repos
            .get(repository)
            .ok_or_else(|| HostError::NotFound(format!("repository {repository}")))?
            .branches
            .get(branch)
            .ok_or_else(|| HostError::NotFound(format!("branch {branch} in {repository}")))
    }
}

// ---------------------------------------------------------------------------
// MemoryHost
// ---------------------------------------------------------------------------

/// A hosting service held entirely in memory.
#[derive(Debug)]
pub struct MemoryHost {
    owner: String,
    /// Branch created with new repositories, mirroring `auto_init`.
    init_branch: Option<String>,
    state: Mutex<State>,
}

impl MemoryHost {
    pub fn new(owner: impl Into<String>) -> Self {
        MemoryHost {
            owner: owner.into(),
            init_branch: Some("main".to_string()),
            state: Mutex::new(State::default()),
        }
    }

    /// Change the branch new repositories start with; `None` creates them empty.
    pub fn with_init_branch(mut self, branch: Option<&str>) -> Self {
        self.init_branch = branch.map(str::to_string);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- seeding ------------------------------------------------------------

    /// Add a repository holding the given (empty) branches. The first one
    /// becomes the default branch.
    pub fn add_repository(&self, name: &str, branches: &[&str]) {
        let mut state = self.state();
        let mut repo = Repo {
            default_branch: branches.first().map(|b| b.to_string()),
            ..Repo::default()
        };
        for branch in branches {
            let head = state.next_commit();
            repo.branches.insert(
                branch.to_string(),
                Branch {
                    head,
                    files: BTreeMap::new(),
                },
            );
        }
        state.repos.insert(name.to_string(), repo);
    }

    /// Point the default branch of an existing repository elsewhere.
    pub fn set_default_branch(&self, repository: &str, branch: &str) {
        if let Some(repo) = self.state().repos.get_mut(repository) {
            repo.default_branch = Some(branch.to_string());
        }
    }

    /// Store a file directly, bypassing the call log.
    pub fn seed_file(&self, repository: &str, branch: &str, path: &str, content: &[u8]) {
        let mut state = self.state();
        let head = state.next_commit();
        let repo = state.repos.entry(repository.to_string()).or_default();
        let entry = repo
            .branches
            .entry(branch.to_string())
            .or_insert_with(|| Branch {
                head: String::new(),
                files: BTreeMap::new(),
            });
        entry.head = head;
        entry.files.insert(path.to_string(), content.to_vec());
    }

    // -- fault injection ----------------------------------------------------

    /// Fail the next call of `op` with `err`. Queued faults fire in order.
    pub fn fail_next(&self, op: Op, err: HostError) {
        self.state().faults.entry(op).or_default().push_back(err);
    }

    /// Reject the next `times` writes of `path` with a version conflict, as if
    /// another writer kept racing us.
    pub fn conflict_on_put(&self, path: &str, times: u32) {
        self.state().put_conflicts.insert(path.to_string(), times);
    }

    // -- inspection ---------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn count(&self, op: Op) -> usize {
        self.state().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn write_count(&self) -> usize {
        self.state().calls.iter().filter(|c| c.op().is_write()).count()
    }

    pub fn has_repository(&self, name: &str) -> bool {
        self.state().repos.contains_key(name)
    }

    pub fn has_branch(&self, repository: &str, branch: &str) -> bool {
        self.state().branch(repository, branch).is_ok()
    }

    pub fn file(&self, repository: &str, branch: &str, path: &str) -> Option<Vec<u8>> {
        self.state()
            .branch(repository, branch)
            .ok()
            .and_then(|b| b.files.get(path).cloned())
    }

    pub fn file_paths(&self, repository: &str, branch: &str) -> Vec<String> {
        self.state()
            .branch(repository, branch)
            .map(|b| b.files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl HostingClient for MemoryHost {
    fn repository_exists(&self, name: &str) -> Result<bool, HostError> {
        let mut state = self.state();
        state.calls.push(Call::RepositoryExists {
            repository: name.to_string(),
        });
        if let Some(err) = state.take_fault(Op::RepositoryExists) {
            return Err(err);
        }
        Ok(state.repos.contains_key(name))
    }

    fn default_branch(&self, repository: &str) -> Result<String, HostError> {
        let mut state = self.state();
        state.calls.push(Call::DefaultBranch {
            repository: repository.to_string(),
        });
        if let Some(err) = state.take_fault(Op::DefaultBranch) {
            return Err(err);
        }
        state
            .repos
            .get(repository)
            .map(Repo::default_branch)
            .ok_or_else(|| HostError::NotFound(format!("repository {repository}")))
    }

    fn create_repository(
        &self,
        name: &str,
        _description: &str,
        _visibility: Visibility,
    ) -> Result<RepoRef, HostError> {
        let mut state = self.state();
        state.calls.push(Call::CreateRepository {
            repository: name.to_string(),
        });
        if let Some(err) = state.take_fault(Op::CreateRepository) {
            return Err(err);
        }
        if state.repos.contains_key(name) {
            return Err(HostError::AlreadyExists(format!("repository {name}")));
        }
        let mut repo = Repo {
            default_branch: self.init_branch.clone(),
            ..Repo::default()
        };
        if let Some(branch) = &self.init_branch {
            let head = state.next_commit();
            repo.branches.insert(
                branch.clone(),
                Branch {
                    head,
                    files: BTreeMap::new(),
                },
            );
        }
        state.repos.insert(name.to_string(), repo);
        Ok(RepoRef {
            name: name.to_string(),
            html_url: self.web_url(name),
        })
    }

    fn get_branch_ref(&self, repository: &str, branch: &str) -> Result<RemoteRef, HostError> {
        let mut state = self.state();
        state.calls.push(Call::GetBranchRef {
            repository: repository.to_string(),
            branch: branch.to_string(),
        });
        if let Some(err) = state.take_fault(Op::GetBranchRef) {
            return Err(err);
        }
        let found = state.branch(repository, branch)?;
        Ok(RemoteRef {
            name: branch.to_string(),
            sha: found.head.clone(),
        })
    }

    fn create_branch_ref(
        &self,
        repository: &str,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), HostError> {
        let mut state = self.state();
        state.calls.push(Call::CreateBranchRef {
            repository: repository.to_string(),
            branch: branch.to_string(),
        });
        if let Some(err) = state.take_fault(Op::CreateBranchRef) {
            return Err(err);
        }
        let repo = state
            .repos
            .get_mut(repository)
            .ok_or_else(|| HostError::NotFound(format!("repository {repository}")))?;
        if repo.branches.contains_key(branch) {
            return Err(HostError::AlreadyExists(format!("branch {branch}")));
        }
        let files = repo
            .branches
            .values()
            .find(|b| b.head == from_sha)
            .map(|b| b.files.clone())
            .unwrap_or_default();
        repo.branches.insert(
            branch.to_string(),
            Branch {
                head: from_sha.to_string(),
                files,
            },
        );
        Ok(())
    }

    fn get_file_handle(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> Result<RemoteFileHandle, HostError> {
        let mut state = self.state();
        state.calls.push(Call::GetFileHandle {
            repository: repository.to_string(),
            path: path.to_string(),
        });
        if let Some(err) = state.take_fault(Op::GetFileHandle) {
            return Err(err);
        }
        let content = state
            .branch(repository, branch)?
            .files
            .get(path)
            .ok_or_else(|| HostError::NotFound(format!("{path} on {branch}")))?;
        Ok(RemoteFileHandle {
            path: path.to_string(),
            content_hash: blob_id(content),
        })
    }

    fn put_file(
        &self,
        repository: &str,
        path: &str,
        content: &[u8],
        branch: &str,
        prior: Option<&RemoteFileHandle>,
    ) -> Result<(), HostError> {
        let mut state = self.state();
        state.calls.push(Call::PutFile {
            repository: repository.to_string(),
            path: path.to_string(),
            update: prior.is_some(),
        });
        if let Some(err) = state.take_fault(Op::PutFile) {
            return Err(err);
        }
        if let Some(remaining) = state.put_conflicts.get_mut(path) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(HostError::VersionConflict(format!("{path} changed concurrently")));
            }
        }

        let current = state
            .branch(repository, branch)?
            .files
            .get(path)
            .map(|c| blob_id(c));
        match (current, prior) {
            (Some(_), None) => {
                return Err(HostError::VersionConflict(format!("{path} already exists")));
            }
            (None, Some(_)) => {
                return Err(HostError::VersionConflict(format!("{path} no longer exists")));
            }
            (Some(current), Some(handle)) if current != handle.content_hash => {
                return Err(HostError::VersionConflict(format!(
                    "{path} does not match {}",
                    handle.content_hash
                )));
            }
            _ => {}
        }

        let head = state.next_commit();
        let target = state
            .repos
            .get_mut(repository)
            .and_then(|r| r.branches.get_mut(branch))
            .ok_or_else(|| HostError::NotFound(format!("branch {branch} in {repository}")))?;
        target.head = head;
        target.files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    fn web_url(&self, repository: &str) -> String {
        format!("https://github.com/{}/{}", self.owner, repository)
    }
}
