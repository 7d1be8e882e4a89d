use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use crate::types::Target;
use crate::utils::ImportCostError;

/// Where a module specifier landed on disk, plus the package version that
/// keys its cache identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    pub entry_path: PathBuf,
    pub version: String,
}

/// Locates a module's entry file and package metadata for a target platform.
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    async fn resolve(
        &self,
        target: Target,
        name: &str,
        from_dir: &Path,
    ) -> Result<ResolvedModule, ImportCostError>;
}

/// The slice of package.json this resolver cares about
#[derive(Debug, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    browser: Option<serde_json::Value>,
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    main: Option<String>,
}

/// node_modules walker with a per-session memo of successful resolutions.
///
/// Walks ancestor directories of the importing file looking for
/// `node_modules/<package>/package.json`, then picks the entry file by the
/// target's preferred manifest fields. This is deliberately the common-case
/// subset of Node resolution; packages it cannot locate are skipped by the
/// caller, never fatal.
pub struct NodeResolver {
    memo: Mutex<HashMap<(Target, String), ResolvedModule>>,
}

impl NodeResolver {
    pub fn new() -> Self {
        Self {
            memo: Mutex::new(HashMap::new()),
        }
    }

    async fn resolve_uncached(
        &self,
        target: Target,
        name: &str,
        from_dir: &Path,
    ) -> Result<ResolvedModule, ImportCostError> {
        let (package, subpath) = split_specifier(name);

        let mut package_dir = None;
        for ancestor in from_dir.ancestors() {
            let candidate = ancestor.join("node_modules").join(&package);
            if tokio::fs::metadata(candidate.join("package.json")).await.is_ok() {
                package_dir = Some(candidate);
                break;
            }
        }
        let package_dir = package_dir.ok_or_else(|| ImportCostError::Resolution {
            name: name.to_string(),
            reason: "not found in any node_modules directory".to_string(),
        })?;

        let manifest_bytes = tokio::fs::read(package_dir.join("package.json")).await?;
        let manifest: PackageManifest = serde_json::from_slice(&manifest_bytes)?;
        let version = manifest.version.clone().unwrap_or_else(|| "0.0.0".to_string());

        let entry_relative = match &subpath {
            Some(sub) => sub.clone(),
            None => entry_field(target, &manifest).to_string(),
        };
        let entry_path = existing_entry(&package_dir, &entry_relative)
            .await
            .ok_or_else(|| ImportCostError::Resolution {
                name: name.to_string(),
                reason: format!("entry '{entry_relative}' does not exist"),
            })?;

        debug!("resolved {} -> {}", name, entry_path.display());
        Ok(ResolvedModule {
            entry_path,
            version,
        })
    }
}

#[async_trait]
impl ModuleResolver for NodeResolver {
    async fn resolve(
        &self,
        target: Target,
        name: &str,
        from_dir: &Path,
    ) -> Result<ResolvedModule, ImportCostError> {
        if let Some(hit) = self.memo.lock().get(&(target, name.to_string())) {
            return Ok(hit.clone());
        }

        let resolved = self.resolve_uncached(target, name, from_dir).await?;
        self.memo
            .lock()
            .insert((target, name.to_string()), resolved.clone());
        Ok(resolved)
    }
}

impl Default for NodeResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits `@scope/pkg/sub/path` into the package root and the subpath.
fn split_specifier(name: &str) -> (String, Option<String>) {
    let segments: Vec<&str> = name.split('/').collect();
    let root_len = if name.starts_with('@') { 2 } else { 1 };
    if segments.len() <= root_len {
        (name.to_string(), None)
    } else {
        (
            segments[..root_len].join("/"),
            Some(segments[root_len..].join("/")),
        )
    }
}

/// Manifest field preference per target; `browser` may be a string or a
/// replacement map, only the string form names an entry file.
fn entry_field<'m>(target: Target, manifest: &'m PackageManifest) -> &'m str {
    let browser_entry = manifest.browser.as_ref().and_then(|value| value.as_str());
    let candidates: [Option<&str>; 3] = match target {
        Target::Browser => [
            browser_entry,
            manifest.module.as_deref(),
            manifest.main.as_deref(),
        ],
        Target::Node => [manifest.module.as_deref(), manifest.main.as_deref(), None],
    };
    candidates
        .into_iter()
        .flatten()
        .next()
        .unwrap_or("index.js")
}

/// Tries the entry as written, then with a `.js` extension, then as a
/// directory index.
async fn existing_entry(package_dir: &Path, relative: &str) -> Option<PathBuf> {
    let base = package_dir.join(relative);
    let with_extension = PathBuf::from(format!("{}.js", base.display()));
    let as_index = base.join("index.js");
    for candidate in [base, with_extension, as_index] {
        if tokio::fs::metadata(&candidate)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
        {
            return Some(candidate);
        }
    }
    None
}
