//! Archive URL → repository extraction
//!
//! HTTP archive dependencies only carry download URLs. For the common code hosts the
//! URL shape gives away the repository and the revision the archive was cut from:
//!
//! | host | path |
//! |---|---|
//! | `github.com` | `/<owner>/<repo>/archive/[refs/(tags\|heads)/]<rev>.<ext>`, `/<owner>/<repo>/releases/download/<rev>/<file>` |
//! | `codeload.github.com` | `/<owner>/<repo>/<kind>/<rev>` |
//! | `gitlab.com` | `/<owner>/<repo>/-/archive/<rev>/<file>` |
//! | `bitbucket.org` | `/<owner>/<repo>/get/<rev>.<ext>` |
//!
//! Hosts are looked up by exact hostname in an [`ArchiveExtractorRegistry`]; more can
//! be added with [`ArchiveExtractorRegistry::register`].

use crate::core::TrackerError;
use crate::models::RepoCoordinate;
use anyhow::Result;
use regex::Regex;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::LazyLock;

static GITHUB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^/([^/]+)/([^/]+)/(?:archive/(?:refs/(?:tags|heads)/)?([^/]+?)\.(?:tar\.gz|tar\.bz2|tar\.xz|tgz|zip)|releases/download/([^/]+)/[^/]+)$",
    )
    .expect("static regex is valid")
});

static CODELOAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([^/]+)/([^/]+)/[^/]+/(?:refs/(?:tags|heads)/)?(.+)$")
        .expect("static regex is valid")
});

static GITLAB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([^/]+)/([^/]+)/-/archive/([^/]+)/[^/]+$").expect("static regex is valid")
});

static BITBUCKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([^/]+)/([^/]+)/get/([^/]+?)\.(?:tar\.gz|tar\.bz2|zip)$")
        .expect("static regex is valid")
});

/// Repository identity pulled out of an archive URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Repository owner (user, organisation or group)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Revision the archive was cut from
    pub revision: String,
}

/// Pure function recognising the archive URLs of one host.
pub type Extractor = fn(&Url) -> Option<Extracted>;

fn captures_to_extracted(re: &Regex, path: &str) -> Option<Extracted> {
    let caps = re.captures(path)?;
    // The last participating group is the revision; github has two alternatives.
    let revision = (3..caps.len()).rev().find_map(|i| caps.get(i))?;
    Some(Extracted {
        owner: caps[1].to_string(),
        repo: caps[2].to_string(),
        revision: revision.as_str().to_string(),
    })
}

/// `github.com` archive and release asset URLs.
pub fn extract_github(url: &Url) -> Option<Extracted> {
    captures_to_extracted(&GITHUB_RE, url.path())
}

/// `codeload.github.com` URLs, the target of github archive redirects.
pub fn extract_codeload(url: &Url) -> Option<Extracted> {
    captures_to_extracted(&CODELOAD_RE, url.path())
}

/// `gitlab.com` archive URLs.
pub fn extract_gitlab(url: &Url) -> Option<Extracted> {
    captures_to_extracted(&GITLAB_RE, url.path())
}

/// `bitbucket.org` archive URLs.
pub fn extract_bitbucket(url: &Url) -> Option<Extracted> {
    captures_to_extracted(&BITBUCKET_RE, url.path())
}

#[derive(Clone)]
struct HostEntry {
    remote_base: String,
    extract: Extractor,
}

/// Hostname-keyed table of archive URL extractors.
///
/// # Examples
///
/// ```rust
/// use repotracker::resolver::archive::ArchiveExtractorRegistry;
///
/// let registry = ArchiveExtractorRegistry::default();
/// let coordinate = registry
///     .resolve("widget", &["https://github.com/acme/widget/archive/v1.2.3.tar.gz".to_string()])
///     .unwrap();
/// assert_eq!(coordinate.url, "https://github.com/acme/widget");
/// assert_eq!(coordinate.revision, "v1.2.3");
/// ```
#[derive(Clone)]
pub struct ArchiveExtractorRegistry {
    hosts: HashMap<String, HostEntry>,
}

impl Default for ArchiveExtractorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("github.com", "https://github.com", extract_github);
        registry.register("codeload.github.com", "https://github.com", extract_codeload);
        registry.register("gitlab.com", "https://gitlab.com", extract_gitlab);
        registry.register("bitbucket.org", "https://bitbucket.org", extract_bitbucket);
        registry
    }
}

impl ArchiveExtractorRegistry {
    /// A registry with no hosts.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            hosts: HashMap::new(),
        }
    }

    /// Registers `extract` for `host`. The canonical remote of a match is
    /// `<remote_base>/<owner>/<repo>`. Replaces an existing registration.
    pub fn register(&mut self, host: impl Into<String>, remote_base: impl Into<String>, extract: Extractor) {
        self.hosts.insert(
            host.into(),
            HostEntry {
                remote_base: remote_base.into().trim_end_matches('/').to_string(),
                extract,
            },
        );
    }

    /// Whether `host` has an extractor.
    #[must_use]
    pub fn is_registered(&self, host: &str) -> bool {
        self.hosts.contains_key(host)
    }

    /// Tries one URL; `Ok(None)` when the host is unknown or the path does not match.
    fn extract(&self, raw: &str) -> Result<Option<RepoCoordinate>, String> {
        let url = Url::parse(raw).map_err(|e| e.to_string())?;
        let host = url.host_str().unwrap_or_default();
        let Some(entry) = self.hosts.get(host) else {
            return Err(format!("Unprocessable hostname in {raw:?}"));
        };
        Ok((entry.extract)(&url).map(|found| {
            RepoCoordinate::new(
                format!("{}/{}/{}", entry.remote_base, found.owner, found.repo),
                found.revision,
            )
        }))
    }

    /// Resolves the first recognisable URL of an archive dependency.
    ///
    /// URLs are tried in order; unparsable ones, unknown hosts and paths that do not
    /// match are logged and skipped.
    ///
    /// # Errors
    ///
    /// [`TrackerError::NoRecognizedUrl`] if no URL matches.
    pub fn resolve(&self, name: &str, urls: &[String]) -> Result<RepoCoordinate> {
        for raw in urls {
            match self.extract(raw) {
                Ok(Some(coordinate)) => return Ok(coordinate),
                Ok(None) => {
                    tracing::warn!("{}: Failed to extract repository from {:?}, continue", name, raw);
                }
                Err(reason) => {
                    tracing::warn!("{}: {}, continue", name, reason);
                }
            }
        }
        Err(TrackerError::NoRecognizedUrl {
            name: name.to_string(),
        }
        .into())
    }
}
