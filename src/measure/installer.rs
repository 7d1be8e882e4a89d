use std::path::PathBuf;

use tokio::process::Command;
use tracing::info;

use crate::constants::ESBUILD_PACKAGE_JSON;
use crate::utils::{ImportCostError, MemoOnce};

fn binary_name() -> &'static str {
    if cfg!(windows) {
        "esbuild.cmd"
    } else {
        "esbuild"
    }
}

/// Locates the esbuild binary, provisioning it on first use when allowed.
///
/// The outcome, success or failure, is memoized so a missing tool is not
/// re-probed on every import; `forget` clears it so the next call retries
/// after the user fixes their environment or asks for a reinstall.
pub struct EsbuildInstaller {
    explicit_path: Option<PathBuf>,
    tool_dir: PathBuf,
    auto_install: bool,
    located: MemoOnce<Result<PathBuf, String>>,
}

impl EsbuildInstaller {
    pub fn new(tool_dir: PathBuf, explicit_path: Option<PathBuf>, auto_install: bool) -> Self {
        Self {
            explicit_path,
            tool_dir,
            auto_install,
            located: MemoOnce::new(),
        }
    }

    /// Path to a usable esbuild binary.
    pub async fn ensure(&self) -> Result<PathBuf, ImportCostError> {
        self.located
            .get_or_init(|| self.locate_or_install())
            .await
            .map_err(ImportCostError::ToolMissing)
    }

    /// Drop the memoized outcome so the next `ensure` starts over.
    pub async fn forget(&self) {
        self.located.forget().await;
    }

    async fn locate_or_install(&self) -> Result<PathBuf, String> {
        if let Some(path) = &self.explicit_path {
            return if tokio::fs::metadata(path).await.is_ok() {
                Ok(path.clone())
            } else {
                Err(format!(
                    "configured esbuild path {} does not exist",
                    path.display()
                ))
            };
        }

        if let Ok(path) = which::which("esbuild") {
            return Ok(path);
        }

        let local = self.local_binary();
        if tokio::fs::metadata(&local).await.is_ok() {
            return Ok(local);
        }

        if !self.auto_install {
            return Err(
                "esbuild not found on PATH; install it or enable bundler auto-install".to_string(),
            );
        }

        self.install().await?;
        if tokio::fs::metadata(&local).await.is_ok() {
            Ok(local)
        } else {
            Err("npm install finished but produced no esbuild binary".to_string())
        }
    }

    fn local_binary(&self) -> PathBuf {
        self.tool_dir
            .join("node_modules")
            .join(".bin")
            .join(binary_name())
    }

    async fn install(&self) -> Result<(), String> {
        info!("installing esbuild into {}", self.tool_dir.display());
        tokio::fs::create_dir_all(&self.tool_dir)
            .await
            .map_err(|err| err.to_string())?;
        tokio::fs::write(self.tool_dir.join("package.json"), ESBUILD_PACKAGE_JSON)
            .await
            .map_err(|err| err.to_string())?;

        let output = Command::new("npm")
            .arg("install")
            .current_dir(&self.tool_dir)
            .output()
            .await
            .map_err(|err| format!("failed to run npm: {err}"))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!("npm install failed: {}", stderr.trim()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explicit_path_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("esbuild");
        std::fs::write(&binary, "#!/bin/sh\n").unwrap();

        let installer = EsbuildInstaller::new(dir.path().to_path_buf(), Some(binary.clone()), false);
        assert_eq!(installer.ensure().await.unwrap(), binary);
    }

    #[tokio::test]
    async fn missing_explicit_path_is_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("no-such-esbuild");

        let installer = EsbuildInstaller::new(dir.path().to_path_buf(), Some(binary), false);
        assert!(matches!(
            installer.ensure().await,
            Err(ImportCostError::ToolMissing(_))
        ));
    }

    #[tokio::test]
    async fn failure_is_memoized_until_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("esbuild");

        let installer =
            EsbuildInstaller::new(dir.path().to_path_buf(), Some(binary.clone()), false);
        assert!(installer.ensure().await.is_err());

        // The binary appears, but the failed probe is still memoized
        std::fs::write(&binary, "#!/bin/sh\n").unwrap();
        assert!(installer.ensure().await.is_err());

        installer.forget().await;
        assert_eq!(installer.ensure().await.unwrap(), binary);
    }
}
