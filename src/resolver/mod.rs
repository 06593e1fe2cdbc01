//! Dependency record → canonical repository coordinate
//!
//! Build manifests declare third-party code in several shapes. [`RuleResolver`] maps
//! every [`DependencyRecord`] onto one [`RepoCoordinate`] so the rest of the pipeline
//! only ever deals with a remote URL and a revision:
//!
//! - **Package**: the import path is resolved to its repository root by an
//!   [`ImportPathResolver`] ([`import_path`]). Only git roots are accepted.
//! - **Archive**: the download URLs are matched against the host table of an
//!   [`ArchiveExtractorRegistry`] ([`archive`]).
//! - **Direct**: remote and revision are used as declared.

pub mod archive;
pub mod import_path;

pub use archive::{ArchiveExtractorRegistry, Extracted, Extractor};
pub use import_path::{GoImportResolver, ImportPathResolver, RepoRoot};

use crate::core::TrackerError;
use crate::models::{DependencyRecord, RepoCoordinate};
use anyhow::Result;

/// Turns dependency records into repository coordinates.
#[derive(Clone)]
pub struct RuleResolver<R> {
    archives: ArchiveExtractorRegistry,
    import_paths: R,
}

impl<R: ImportPathResolver> RuleResolver<R> {
    /// Creates a resolver with the built-in archive hosts.
    pub fn new(import_paths: R) -> Self {
        Self {
            archives: ArchiveExtractorRegistry::default(),
            import_paths,
        }
    }

    /// Replaces the archive host table.
    #[must_use]
    pub fn with_archive_registry(mut self, archives: ArchiveExtractorRegistry) -> Self {
        self.archives = archives;
        self
    }

    /// Resolves `record` to the repository it comes from.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::UnsupportedHost`] when an import path lives in a non-git VCS
    /// - [`TrackerError::ResolutionFailed`] when an import path has no discoverable root
    /// - [`TrackerError::NoRecognizedUrl`] when no archive URL is recognised
    pub async fn resolve(&self, record: &DependencyRecord) -> Result<RepoCoordinate> {
        match record {
            DependencyRecord::Package {
                name,
                import_path,
                revision,
            } => {
                let root = self.import_paths.resolve(import_path).await.map_err(|e| {
                    let typed = matches!(
                        e.downcast_ref::<TrackerError>(),
                        Some(
                            TrackerError::ResolutionFailed { .. }
                                | TrackerError::UnsupportedHost { .. }
                        )
                    );
                    if typed {
                        e
                    } else {
                        TrackerError::ResolutionFailed {
                            name: name.clone(),
                            reason: format!("{e:#}"),
                        }
                        .into()
                    }
                })?;
                if root.vcs != "git" {
                    return Err(TrackerError::UnsupportedHost {
                        import_path: import_path.clone(),
                        vcs: root.vcs,
                    }
                    .into());
                }
                tracing::debug!("{}: {} is served from {}", name, import_path, root.repo);
                Ok(RepoCoordinate::new(root.repo, revision.clone()))
            }
            DependencyRecord::Archive {
                name,
                urls,
            } => self.archives.resolve(name, urls),
            DependencyRecord::Direct {
                remote,
                revision,
                ..
            } => Ok(RepoCoordinate::new(remote.clone(), revision.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Import path table standing in for the network.
    #[derive(Default)]
    struct TableResolver {
        roots: HashMap<String, RepoRoot>,
    }

    impl TableResolver {
        fn with(mut self, path: &str, vcs: &str, repo: &str) -> Self {
            self.roots.insert(
                path.to_string(),
                RepoRoot {
                    vcs: vcs.to_string(),
                    repo: repo.to_string(),
                    root: path.to_string(),
                },
            );
            self
        }
    }

    impl ImportPathResolver for TableResolver {
        async fn resolve(&self, import_path: &str) -> Result<RepoRoot> {
            self.roots
                .get(import_path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unrecognized import path {import_path:?}"))
        }
    }

    fn resolver() -> RuleResolver<TableResolver> {
        RuleResolver::new(
            TableResolver::default()
                .with("go.uber.org/zap", "git", "https://github.com/uber-go/zap")
                .with("example.org/hgpkg", "hg", "https://example.org/hgpkg"),
        )
    }

    #[tokio::test]
    async fn test_resolve_package() {
        let record = DependencyRecord::Package {
            name: "org_uber_go_zap".to_string(),
            import_path: "go.uber.org/zap".to_string(),
            revision: "v1.10.0".to_string(),
        };
        let coordinate = resolver().resolve(&record).await.unwrap();
        assert_eq!(coordinate, RepoCoordinate::new("https://github.com/uber-go/zap", "v1.10.0"));
    }

    #[tokio::test]
    async fn test_resolve_package_other_vcs() {
        let record = DependencyRecord::Package {
            name: "org_example_hgpkg".to_string(),
            import_path: "example.org/hgpkg".to_string(),
            revision: String::new(),
        };
        let err = resolver().resolve(&record).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::UnsupportedHost { vcs, .. }) if vcs == "hg"
        ));
    }

    #[tokio::test]
    async fn test_resolve_package_unknown() {
        let record = DependencyRecord::Package {
            name: "com_example_missing".to_string(),
            import_path: "example.com/missing".to_string(),
            revision: String::new(),
        };
        let err = resolver().resolve(&record).await.unwrap_err();
        match err.downcast_ref::<TrackerError>() {
            Some(TrackerError::ResolutionFailed {
                name,
                reason,
            }) => {
                assert_eq!(name, "com_example_missing");
                assert!(reason.contains("example.com/missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_archive() {
        let record = DependencyRecord::Archive {
            name: "com_github_acme_widget".to_string(),
            urls: vec![
                "https://mirror.bazel.build/github.com/acme/widget/archive/v1.2.3.tar.gz".to_string(),
                "https://github.com/acme/widget/archive/v1.2.3.tar.gz".to_string(),
            ],
        };
        let coordinate = resolver().resolve(&record).await.unwrap();
        assert_eq!(coordinate, RepoCoordinate::new("https://github.com/acme/widget", "v1.2.3"));
    }

    #[tokio::test]
    async fn test_resolve_direct_passthrough() {
        let record = DependencyRecord::Direct {
            name: "io_bazel_rules_go".to_string(),
            remote: "https://github.com/bazelbuild/rules_go.git".to_string(),
            revision: "abc123".to_string(),
        };
        let coordinate = resolver().resolve(&record).await.unwrap();
        assert_eq!(
            coordinate,
            RepoCoordinate::new("https://github.com/bazelbuild/rules_go.git", "abc123")
        );
    }

    #[tokio::test]
    async fn test_custom_archive_registry() {
        let record = DependencyRecord::Archive {
            name: "widget".to_string(),
            urls: vec!["https://github.com/acme/widget/archive/v1.tar.gz".to_string()],
        };
        let resolver = resolver().with_archive_registry(ArchiveExtractorRegistry::empty());
        let err = resolver.resolve(&record).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::NoRecognizedUrl { .. })
        ));
    }
}
