//! Branch reconciliation: make sure the target branch exists.

use thiserror::Error;

use crate::error::HostError;
use crate::host::HostingClient;

/// What [`ensure_branch`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// The branch was created from `base` at `sha`.
    Created { base: String, sha: String },
    /// The branch was already there.
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BranchError {
    /// None of the base-branch candidates exist.
    #[error("no base branch found (tried {})", candidates.join(", "))]
    NoBaseBranch { candidates: Vec<String> },

    #[error(transparent)]
    Host(HostError),
}

/// Ensure `branch` exists in `repository`.
///
/// The first existing candidate in `bases` supplies the starting commit. A
/// branch that already exists is success; it is never reset.
pub fn ensure_branch<C: HostingClient + ?Sized>(
    client: &C,
    repository: &str,
    branch: &str,
    bases: &[String],
) -> Result<BranchOutcome, BranchError> {
    let mut found = None;
    for base in bases {
        match client.get_branch_ref(repository, base) {
            Ok(head) => {
                found = Some((base.clone(), head.sha));
                break;
            }
            Err(HostError::NotFound(_)) => {
                tracing::debug!("{repository}: base branch {base} not found");
            }
            Err(err) => return Err(BranchError::Host(err)),
        }
    }
    let Some((base, sha)) = found else {
        return Err(BranchError::NoBaseBranch {
            candidates: bases.to_vec(),
        });
    };

    match client.create_branch_ref(repository, branch, &sha) {
        Ok(()) => {
            tracing::info!("{repository}: created branch {branch} from {base}");
            Ok(BranchOutcome::Created { base, sha })
        }
        Err(HostError::AlreadyExists(_)) => {
            tracing::debug!("{repository}: branch {branch} already exists");
            Ok(BranchOutcome::AlreadyExists)
        }
        Err(err) => Err(BranchError::Host(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryHost, Op};

    fn bases() -> Vec<String> {
        vec!["main".to_string(), "master".to_string()]
    }

    #[test]
    fn creates_from_first_existing_base() {
        let host = MemoryHost::new("o");
        host.add_repository("r", &["master"]);
        let outcome = ensure_branch(&host, "r", "16", &bases()).expect("branch");
        assert!(matches!(outcome, BranchOutcome::Created { ref base, .. } if base == "master"));
        assert!(host.has_branch("r", "16"));
        assert_eq!(host.count(Op::GetBranchRef), 2);
    }

    #[test]
    fn existing_branch_is_success() {
        let host = MemoryHost::new("o");
        host.add_repository("r", &["main", "16"]);
        let outcome = ensure_branch(&host, "r", "16", &bases()).expect("branch");
        assert_eq!(outcome, BranchOutcome::AlreadyExists);
    }

    #[test]
    fn no_base_lists_candidates() {
        let host = MemoryHost::new("o");
        host.add_repository("r", &["develop"]);
        let err = ensure_branch(&host, "r", "16", &bases()).unwrap_err();
        assert_eq!(err, BranchError::NoBaseBranch { candidates: bases() });
        assert_eq!(host.count(Op::CreateBranchRef), 0);
    }

    #[test]
    fn transport_error_is_not_treated_as_missing() {
        let host = MemoryHost::new("o");
        host.add_repository("r", &["master"]);
        host.fail_next(Op::GetBranchRef, HostError::permanent("500"));
        let err = ensure_branch(&host, "r", "16", &bases()).unwrap_err();
        assert!(matches!(err, BranchError::Host(HostError::Transport { .. })));
    }
}
