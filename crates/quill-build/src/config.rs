use std::path::{Path, PathBuf};

use crate::error::ManifestError;
use crate::manifest::{parse_manifest, Dependency};

pub const MANIFEST_FILE: &str = "quill.pkg";
pub const SOURCE_EXTENSION: &str = "quill";

/// Where modules are looked up, in search order: the project, the bundled
/// standard library, then each extracted dependency.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub root: PathBuf,
    pub std_root: Option<PathBuf>,
    pub deps_root: PathBuf,
    pub dependencies: Vec<Dependency>,
}

impl Config {
    /// A project without a manifest: no dependencies, `deps` under the root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            deps_root: root.join("deps"),
            root,
            std_root: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_std_root(mut self, std_root: impl Into<PathBuf>) -> Self {
        self.std_root = Some(std_root.into());
        self
    }

    /// Read `quill.pkg` from `root` if there is one.
    pub async fn load(root: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let mut config = Self::new(root);
        let path = config.root.join(MANIFEST_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(source) => {
                let manifest = parse_manifest(&source, &path)?;
                tracing::debug!(
                    name = %manifest.name,
                    version = %manifest.version,
                    dependencies = manifest.dependencies.len(),
                    "loaded manifest"
                );
                config.dependencies = manifest.dependencies;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(ManifestError::Io { path, source }),
        }
        Ok(config)
    }

    /// Source roots in lookup order.
    pub fn source_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.root.join("src")];
        if let Some(std_root) = &self.std_root {
            roots.push(std_root.join("src"));
        }
        for dependency in &self.dependencies {
            roots.push(dependency_root(&self.deps_root, dependency).join("src"));
        }
        roots
    }
}

fn dependency_root(deps_root: &Path, dependency: &Dependency) -> PathBuf {
    deps_root
        .join(&dependency.owner)
        .join(&dependency.repository)
        .join(&dependency.tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_are_searched_in_order() {
        let mut config = Config::new("/work/app").with_std_root("/opt/quill/std");
        config.dependencies.push(Dependency {
            owner: "acme".into(),
            repository: "text".into(),
            tag: "v2".into(),
        });
        assert_eq!(
            config.source_roots(),
            vec![
                PathBuf::from("/work/app/src"),
                PathBuf::from("/opt/quill/std/src"),
                PathBuf::from("/work/app/deps/acme/text/v2/src"),
            ]
        );
    }

    #[tokio::test]
    async fn missing_manifest_means_no_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert!(config.dependencies.is_empty());
        assert_eq!(config.root, dir.path());
    }

    #[tokio::test]
    async fn manifest_dependencies_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"(package (name "app") (version "0.1.0") (deps (dep "acme" "text" "v2")))"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.dependencies.len(), 1);
        assert_eq!(config.dependencies[0].repository, "text");
    }

    #[tokio::test]
    async fn broken_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "(package").unwrap();
        let err = Config::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)), "error: {}", err);
    }
}
