//! GitHub / GitHub Enterprise backend over the REST v3 API.
//!
//! Status codes are turned into [`HostError`] here and nowhere else:
//!
//! | response                         | error                               |
//! |----------------------------------|-------------------------------------|
//! | 404, 409 on a read (empty repo)  | `NotFound`                          |
//! | 422 "already exists" on a create | `AlreadyExists`                     |
//! | 409 / 422 on a content put       | `VersionConflict`                   |
//! | 429, 5xx, 403 rate limit, socket | `Transport { retryable: true }`     |
//! | anything else                    | `Transport { retryable: false }`    |

use std::sync::{Arc, Mutex};

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use url::Url;

use treeforge_core::HostConfig;

use crate::credentials::CredentialProvider;
use crate::error::HostError;
use crate::host::{HostingClient, RemoteFileHandle, RemoteRef, RepoRef, Visibility};

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Which family of call produced a response, for status classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Read,
    Create,
    ContentWrite,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GitHubClient {
    agent: ureq::Agent,
    api_url: Url,
    owner: String,
    auto_init: bool,
    credentials: Arc<dyn CredentialProvider>,
    /// Login behind the token, looked up on the first repository create.
    login: Mutex<Option<String>>,
}

impl GitHubClient {
    /// Fails when `config.api_url` is not an absolute http(s) URL.
    pub fn new(
        config: &HostConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, HostError> {
        let api_url = Url::parse(config.api_url.trim_end_matches('/'))
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| HostError::permanent(format!("invalid api_url '{}'", config.api_url)))?;
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout())
            .user_agent(concat!("treeforge/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(GitHubClient {
            agent,
            api_url,
            owner: config.owner.clone(),
            auto_init: config.auto_init,
            credentials,
            login: Mutex::new(None),
        })
    }

    fn request(&self, method: &str, url: &Url) -> Result<ureq::Request, HostError> {
        let token = self.credentials.token()?;
        Ok(self
            .agent
            .request_url(method, url)
            .set("Authorization", &token.bearer())
            .set("Accept", ACCEPT)
            .set("X-GitHub-Api-Version", API_VERSION))
    }

    /// API root plus `segments`, each percent-encoded on its own.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `/repos/{owner}/{repository}/{tail...}`; `/` inside `tail` entries
    /// separates segments.
    fn repo_url(&self, repository: &str, tail: &[&str]) -> Url {
        let head = ["repos", self.owner.as_str(), repository];
        self.endpoint(
            head.into_iter()
                .chain(tail.iter().copied().flat_map(|part| part.split('/'))),
        )
    }

    fn contents_url(&self, repository: &str, path: &str) -> Url {
        self.repo_url(repository, &["contents", path])
    }

    fn login(&self) -> Result<String, HostError> {
        let mut cached = self.login.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(login) = cached.as_ref() {
            return Ok(login.clone());
        }
        let what = "authenticated user";
        let resp = self
            .request("GET", &self.endpoint(["user"]))?
            .call()
            .map_err(|e| classify(e, CallKind::Read, what))?;
        let user: UserResponse = resp
            .into_json()
            .map_err(|e| HostError::permanent(format!("{what}: unreadable response: {e}")))?;
        tracing::debug!("token belongs to {}", user.login);
        *cached = Some(user.login.clone());
        Ok(user.login)
    }
}

/// Endpoint that creates a repository for `owner` when the token belongs to
/// `login`: the user's own account, or the organisation named `owner`.
fn create_repo_segments<'a>(owner: &'a str, login: &str) -> Vec<&'a str> {
    if owner.eq_ignore_ascii_case(login) {
        vec!["user", "repos"]
    } else {
        vec!["orgs", owner, "repos"]
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CreateRepoBody<'a> {
    name: &'a str,
    description: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Deserialize)]
struct RepoResponse {
    name: String,
    html_url: String,
}

#[derive(Deserialize)]
struct RepoDetails {
    default_branch: String,
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Serialize)]
struct CreateRefBody<'a> {
    #[serde(rename = "ref")]
    reference: String,
    sha: &'a str,
}

#[derive(Deserialize)]
struct ContentResponse {
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct PutContentBody<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Error body. Validation failures put the useful text in `errors`.
#[derive(Deserialize)]
struct ApiMessage {
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ApiErrorDetail {
    Text(String),
    Field {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        code: Option<String>,
    },
}

impl ApiMessage {
    fn nested(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().filter_map(|e| match e {
            ApiErrorDetail::Text(text) => Some(text.as_str()),
            ApiErrorDetail::Field { message, .. } => message.as_deref(),
        })
    }

    fn already_exists(&self) -> bool {
        let coded = self.errors.iter().any(|e| {
            matches!(e, ApiErrorDetail::Field { code: Some(code), .. } if code == "already_exists")
        });
        coded
            || std::iter::once(self.message.as_str())
                .chain(self.nested())
                .any(|text| text.to_lowercase().contains("already exists"))
    }

    fn describe(&self) -> String {
        let nested: Vec<&str> = self.nested().collect();
        if nested.is_empty() {
            self.message.clone()
        } else {
            format!("{} ({})", self.message, nested.join("; "))
        }
    }
}

// ---------------------------------------------------------------------------
// HostingClient
// ---------------------------------------------------------------------------

impl HostingClient for GitHubClient {
    fn repository_exists(&self, name: &str) -> Result<bool, HostError> {
        let what = format!("repository {}/{name}", self.owner);
        match self.request("GET", &self.repo_url(name, &[]))?.call() {
            Ok(_) => Ok(true),
            Err(err) => match classify(err, CallKind::Read, &what) {
                HostError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    fn default_branch(&self, repository: &str) -> Result<String, HostError> {
        let what = format!("repository {}/{repository}", self.owner);
        let resp = self
            .request("GET", &self.repo_url(repository, &[]))?
            .call()
            .map_err(|e| classify(e, CallKind::Read, &what))?;
        let repo: RepoDetails = resp
            .into_json()
            .map_err(|e| HostError::permanent(format!("{what}: unreadable response: {e}")))?;
        Ok(repo.default_branch)
    }

    fn create_repository(
        &self,
        name: &str,
        description: &str,
        visibility: Visibility,
    ) -> Result<RepoRef, HostError> {
        let what = format!("repository {}/{name}", self.owner);
        let body = CreateRepoBody {
            name,
            description,
            private: visibility.is_private(),
            auto_init: self.auto_init,
        };
        let login = self.login()?;
        let url = self.endpoint(create_repo_segments(&self.owner, &login));
        let resp = self
            .request("POST", &url)?
            .send_json(&body)
            .map_err(|e| classify(e, CallKind::Create, &what))?;
        let repo: RepoResponse = resp
            .into_json()
            .map_err(|e| HostError::permanent(format!("{what}: unreadable response: {e}")))?;
        Ok(RepoRef {
            name: repo.name,
            html_url: repo.html_url,
        })
    }

    fn get_branch_ref(&self, repository: &str, branch: &str) -> Result<RemoteRef, HostError> {
        let what = format!("branch {branch} in {repository}");
        let url = self.repo_url(repository, &["git/ref/heads", branch]);
        let resp = self
            .request("GET", &url)?
            .call()
            .map_err(|e| classify(e, CallKind::Read, &what))?;
        let head: RefResponse = resp
            .into_json()
            .map_err(|e| HostError::permanent(format!("{what}: unreadable response: {e}")))?;
        Ok(RemoteRef {
            name: branch.to_string(),
            sha: head.object.sha,
        })
    }

    fn create_branch_ref(
        &self,
        repository: &str,
        branch: &str,
        from_sha: &str,
    ) -> Result<(), HostError> {
        let what = format!("branch {branch} in {repository}");
        let body = CreateRefBody {
            reference: format!("refs/heads/{branch}"),
            sha: from_sha,
        };
        let url = self.repo_url(repository, &["git/refs"]);
        self.request("POST", &url)?
            .send_json(&body)
            .map_err(|e| classify(e, CallKind::Create, &what))?;
        Ok(())
    }

    fn get_file_handle(
        &self,
        repository: &str,
        path: &str,
        branch: &str,
    ) -> Result<RemoteFileHandle, HostError> {
        let what = format!("{path} on {repository}@{branch}");
        let resp = self
            .request("GET", &self.contents_url(repository, path))?
            .query("ref", branch)
            .call()
            .map_err(|e| classify(e, CallKind::Read, &what))?;
        // A directory at `path` comes back as a JSON array.
        let body: serde_json::Value = resp
            .into_json()
            .map_err(|e| HostError::permanent(format!("{what}: unreadable response: {e}")))?;
        let content: ContentResponse = serde_json::from_value(body)
            .map_err(|_| HostError::permanent(format!("{what}: not a file")))?;
        if content.kind != "file" {
            return Err(HostError::permanent(format!("{what}: is a {}", content.kind)));
        }
        Ok(RemoteFileHandle {
            path: content.path,
            content_hash: content.sha,
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
        let what = format!("{path} on {repository}@{branch}");
        let verb = if prior.is_some() { "Update" } else { "Add" };
        let body = PutContentBody {
            message: format!("{verb} {path}"),
            content: base64::engine::general_purpose::STANDARD.encode(content),
            branch,
            sha: prior.map(|h| h.content_hash.as_str()),
        };
        self.request("PUT", &self.contents_url(repository, path))?
            .send_json(&body)
            .map_err(|e| classify(e, CallKind::ContentWrite, &what))?;
        Ok(())
    }

    fn web_url(&self, repository: &str) -> String {
        let root = web_root(self.api_url.as_str().trim_end_matches('/'));
        format!("{root}/{}/{repository}", self.owner)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn classify(err: ureq::Error, kind: CallKind, what: &str) -> HostError {
    match err {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            classify_status(code, &body, kind, what)
        }
        ureq::Error::Transport(transport) => HostError::transient(format!("{what}: {transport}")),
    }
}

fn classify_status(code: u16, body: &str, kind: CallKind, what: &str) -> HostError {
    let (message, already_exists) = match serde_json::from_str::<ApiMessage>(body) {
        Ok(parsed) => (parsed.describe(), parsed.already_exists()),
        Err(_) => {
            let text = body.trim().to_string();
            let exists = text.to_lowercase().contains("already exists");
            (text, exists)
        }
    };
    let lowered = message.to_lowercase();
    let detail = format!("{what}: HTTP {code}: {message}");

    match (code, kind) {
        (404, _) | (409, CallKind::Read) => HostError::NotFound(what.to_string()),
        (422, CallKind::Create) if already_exists => HostError::AlreadyExists(what.to_string()),
        (409 | 422, CallKind::ContentWrite) => HostError::VersionConflict(detail),
        (429, _) | (500..=599, _) => HostError::transient(detail),
        (403, _) if lowered.contains("rate limit") => HostError::transient(detail),
        _ => HostError::permanent(detail),
    }
}

/// Browser root for an API root: `api.github.com` → `github.com`, and
/// `https://host/api/v3` → `https://host` for Enterprise.
fn web_root(api_url: &str) -> String {
    if api_url == "https://api.github.com" {
        return "https://github.com".to_string();
    }
    api_url.trim_end_matches("/api/v3").to_string()
}
