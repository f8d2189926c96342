//! Repository acquisition.
//!
//! A [`RepoRef`] names either a remote git URL or a local directory. Fetchers
//! turn it into a [`Checkout`]: a local tree that lives as long as the value
//! (temporary clones are removed on drop).

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

/// Failure to produce a local tree for a repository.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("repository not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Retrying cannot help with these.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FetchError::NotFound(_) | FetchError::Auth(_))
    }
}

/// Where a repository comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoRef {
    Remote(String),
    Local(PathBuf),
}

const REMOTE_SCHEMES: &[&str] = &["https://", "http://", "ssh://", "git://"];

impl RepoRef {
    /// Parse a user-supplied reference.
    ///
    /// `https://`, `http://`, `ssh://`, `git://`, and scp-style `git@host:path`
    /// are remote; `file://` and scheme-less strings are local paths. Any other
    /// scheme is rejected.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("repository reference is empty".to_string());
        }
        let lower = raw.to_ascii_lowercase();
        if REMOTE_SCHEMES.iter().any(|s| lower.starts_with(s)) || lower.starts_with("git@") {
            return Ok(RepoRef::Remote(raw.to_string()));
        }
        if let Some(path) = raw.strip_prefix("file://") {
            return Ok(RepoRef::Local(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = raw.split_once("://") {
            return Err(format!("unsupported repository scheme '{scheme}'"));
        }
        Ok(RepoRef::Local(PathBuf::from(raw)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, RepoRef::Remote(_))
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoRef::Remote(url) => f.write_str(url),
            RepoRef::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A fetched tree.
#[derive(Debug)]
pub struct Checkout {
    root: PathBuf,
    temp: Option<TempDir>,
}

impl Checkout {
    /// A tree owned by the checkout and deleted with it.
    pub fn temporary(dir: TempDir, root: PathBuf) -> Self {
        Self { root, temp: Some(dir) }
    }

    /// A tree that exists independently (a local directory).
    pub fn borrowed(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), temp: None }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, repo: &RepoRef) -> Result<Checkout, FetchError>;
}

/// Shallow `git clone` into a temporary directory.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    pub git: PathBuf,
    pub timeout: Option<Duration>,
}

impl GitFetcher {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { git: resolve_git_path(), timeout }
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new(None)
    }
}

/// `GAUGE_GIT` when set, else `git` from `PATH`.
fn resolve_git_path() -> PathBuf {
    std::env::var_os("GAUGE_GIT").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("git"))
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(&self, repo: &RepoRef) -> Result<Checkout, FetchError> {
        let source = repo.to_string();
        let dir = tempfile::Builder::new().prefix("gauge-checkout-").tempdir()?;
        let target = dir.path().join("repo");

        let mut cmd = tokio::process::Command::new(&self.git);
        cmd.arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--quiet")
            .arg(&source)
            .arg(&target)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(source = %source, git = %self.git.display(), "cloning repository");
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output()).await.map_err(|_| {
                FetchError::Network(format!("git clone timed out after {}s", limit.as_secs()))
            })??,
            None => cmd.output().await?,
        };

        if !output.status.success() {
            return Err(classify_git_failure(&String::from_utf8_lossy(&output.stderr)));
        }
        info!(source = %source, "repository cloned");
        Ok(Checkout::temporary(dir, target))
    }
}

/// Map `git clone` stderr onto a fetch error kind.
pub fn classify_git_failure(stderr: &str) -> FetchError {
    let message = stderr.trim();
    let lower = message.to_ascii_lowercase();
    let message =
        if message.is_empty() { "git clone failed".to_string() } else { message.to_string() };

    if lower.contains("authentication failed")
        || lower.contains("could not read username")
        || lower.contains("permission denied")
        || lower.contains("403")
    {
        FetchError::Auth(message)
    } else if lower.contains("not found")
        || lower.contains("does not exist")
        || lower.contains("does not appear to be a git repository")
    {
        FetchError::NotFound(message)
    } else {
        FetchError::Network(message)
    }
}

/// Serves local directories in place.
#[derive(Debug, Clone, Default)]
pub struct LocalFetcher;

#[async_trait]
impl SourceFetcher for LocalFetcher {
    async fn fetch(&self, repo: &RepoRef) -> Result<Checkout, FetchError> {
        match repo {
            RepoRef::Local(path) if path.is_dir() => Ok(Checkout::borrowed(path.clone())),
            RepoRef::Local(path) => Err(FetchError::NotFound(path.display().to_string())),
            RepoRef::Remote(url) => {
                Err(FetchError::NotFound(format!("{url} is not a local directory")))
            }
        }
    }
}

/// Sends remote refs to one fetcher and local refs to another.
#[derive(Clone)]
pub struct RoutingFetcher {
    remote: Arc<dyn SourceFetcher>,
    local: Arc<dyn SourceFetcher>,
}

impl RoutingFetcher {
    pub fn new(remote: Arc<dyn SourceFetcher>, local: Arc<dyn SourceFetcher>) -> Self {
        Self { remote, local }
    }

    /// `git` for remote refs and in-place access for local ones.
    pub fn standard(fetch_timeout: Option<Duration>) -> Self {
        Self::new(Arc::new(GitFetcher::new(fetch_timeout)), Arc::new(LocalFetcher))
    }
}

#[async_trait]
impl SourceFetcher for RoutingFetcher {
    async fn fetch(&self, repo: &RepoRef) -> Result<Checkout, FetchError> {
        if repo.is_remote() {
            self.remote.fetch(repo).await
        } else {
            self.local.fetch(repo).await
        }
    }
}
