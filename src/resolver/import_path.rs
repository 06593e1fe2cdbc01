//! Import path → repository root resolution
//!
//! Go-style import paths (`golang.org/x/tools/go/packages`) name a package, not a
//! repository. [`GoImportResolver`] finds the repository root the way the `go` tool
//! does: a few well-known hosts are mapped statically, everything else is asked over
//! HTTPS with `?go-get=1` and answers with a `go-import` meta tag:
//!
//! ```html
//! <meta name="go-import" content="golang.org/x/tools git https://go.googlesource.com/tools">
//! ```

use crate::constants::IMPORT_PATH_LOOKUP_TIMEOUT;
use crate::core::TrackerError;
use anyhow::{Context, Result};
use regex::Regex;
use std::future::Future;
use std::sync::LazyLock;

/// Where the repository holding an import path lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRoot {
    /// Version control system, e.g. `git`, `hg`, `bzr`
    pub vcs: String,
    /// Remote URL of the repository
    pub repo: String,
    /// Import path prefix that corresponds to the repository root
    pub root: String,
}

impl RepoRoot {
    fn git(root: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            vcs: "git".to_string(),
            repo: repo.into(),
            root: root.into(),
        }
    }
}

/// Maps an import path to its repository root.
///
/// Implementations may block on the network; the returned future must be `Send` so
/// resolution can run on any worker.
pub trait ImportPathResolver: Send + Sync {
    /// Resolves `import_path` to the root of the repository containing it.
    fn resolve(&self, import_path: &str) -> impl Future<Output = Result<RepoRoot>> + Send;
}

const ELEM: &str = r"[A-Za-z0-9_.\-]+";

static GITHUB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(github\.com/{ELEM}/{ELEM})(?:/.*)?$")).expect("static regex is valid")
});

static BITBUCKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(bitbucket\.org/{ELEM}/{ELEM})(?:/.*)?$"))
        .expect("static regex is valid")
});

static LAUNCHPAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(launchpad\.net/(?:~{ELEM}/(?:{ELEM}|\+junk)/{ELEM}|{ELEM}))(?:/.*)?$"))
        .expect("static regex is valid")
});

static GOLANG_X_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^golang\.org/x/({ELEM})(?:/.*)?$")).expect("static regex is valid")
});

static VCS_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9.\-]+\.[A-Za-z]{2,}(?::[0-9]+)?(?:/[A-Za-z0-9_.\-~]+)*?\.git)(?:/.*)?$")
        .expect("static regex is valid")
});

static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("static regex is valid"));

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([a-z][a-z0-9_\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("static regex is valid")
});

/// Repository roots that can be derived from the import path alone.
#[must_use]
pub fn static_repo_root(import_path: &str) -> Option<RepoRoot> {
    let path = import_path.trim_end_matches('/');

    if let Some(caps) = GITHUB_RE.captures(path) {
        let root = caps[1].trim_end_matches(".git").to_string();
        return Some(RepoRoot::git(root.clone(), format!("https://{root}")));
    }
    if let Some(caps) = BITBUCKET_RE.captures(path) {
        return Some(RepoRoot::git(&caps[1], format!("https://{}", &caps[1])));
    }
    if let Some(caps) = LAUNCHPAD_RE.captures(path) {
        return Some(RepoRoot {
            vcs: "bzr".to_string(),
            repo: format!("https://{}", &caps[1]),
            root: caps[1].to_string(),
        });
    }
    if let Some(caps) = GOLANG_X_RE.captures(path) {
        return Some(RepoRoot::git(
            format!("golang.org/x/{}", &caps[1]),
            format!("https://go.googlesource.com/{}", &caps[1]),
        ));
    }
    if let Some(caps) = VCS_SUFFIX_RE.captures(path) {
        return Some(RepoRoot::git(&caps[1], format!("https://{}", &caps[1])));
    }
    None
}

/// Picks the `go-import` meta tag of `html` that covers `import_path`.
///
/// A tag covers the path when its prefix equals it or is a `/`-delimited prefix of
/// it. Attribute order and quoting style do not matter.
#[must_use]
pub fn parse_go_import_meta(html: &str, import_path: &str) -> Option<RepoRoot> {
    META_TAG_RE.find_iter(html).find_map(|tag| {
        let mut name = None;
        let mut content = None;
        for attr in ATTR_RE.captures_iter(tag.as_str()) {
            let value = attr.get(2).or_else(|| attr.get(3)).map(|m| m.as_str());
            match attr[1].to_ascii_lowercase().as_str() {
                "name" => name = value,
                "content" => content = value,
                _ => {}
            }
        }
        if name != Some("go-import") {
            return None;
        }

        let fields: Vec<&str> = content?.split_whitespace().collect();
        let [prefix, vcs, repo] = fields.as_slice() else {
            return None;
        };
        let covers = import_path == *prefix
            || import_path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'));
        covers.then(|| RepoRoot {
            vcs: (*vcs).to_string(),
            repo: (*repo).to_string(),
            root: (*prefix).to_string(),
        })
    })
}

/// Resolver following the `go get` discovery protocol.
#[derive(Debug, Clone)]
pub struct GoImportResolver {
    client: reqwest::Client,
}

impl Default for GoImportResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl GoImportResolver {
    /// Creates a resolver with its own HTTP client.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(IMPORT_PATH_LOOKUP_TIMEOUT)
            .user_agent(concat!("repotracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self::with_client(client)
    }

    /// Creates a resolver sharing an existing HTTP client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
        }
    }

    async fn fetch_meta(&self, import_path: &str) -> Result<RepoRoot> {
        let url = format!("https://{import_path}?go-get=1");
        tracing::debug!("Fetching {}", url);

        let response = self.client.get(&url).send().await.with_context(|| format!("GET {url}"))?;
        if !response.status().is_success() {
            anyhow::bail!("GET {url}: HTTP {}", response.status());
        }
        let body = response.text().await.with_context(|| format!("Failed to read {url}"))?;

        parse_go_import_meta(&body, import_path)
            .with_context(|| format!("no go-import meta tag for {import_path} at {url}"))
    }
}

impl ImportPathResolver for GoImportResolver {
    async fn resolve(&self, import_path: &str) -> Result<RepoRoot> {
        if let Some(root) = static_repo_root(import_path) {
            return Ok(root);
        }
        self.fetch_meta(import_path).await.map_err(|e| {
            TrackerError::ResolutionFailed {
                name: import_path.to_string(),
                reason: format!("{e:#}"),
            }
            .into()
        })
    }
}
