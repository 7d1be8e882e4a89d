use std::io::Write as _;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::installer::EsbuildInstaller;
use crate::types::{ImportDescriptor, ImportMembers, Target};
use crate::utils::ImportCostError;

/// Raw and gzip-compressed byte counts for one bundled import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleSize {
    pub original: u32,
    pub compressed: u32,
}

/// Measures the transfer size of one import from a given directory.
#[async_trait]
pub trait SizeMeasurer: Send + Sync {
    async fn measure(
        &self,
        dir: &Path,
        import: &ImportDescriptor,
        target: Target,
    ) -> Result<ModuleSize, ImportCostError>;
}

/// Bundles a synthetic entry module with esbuild and counts the minified
/// output bytes, raw and gzipped.
pub struct EsbuildMeasurer {
    installer: EsbuildInstaller,
}

impl EsbuildMeasurer {
    pub fn new(installer: EsbuildInstaller) -> Self {
        Self { installer }
    }

    pub fn installer(&self) -> &EsbuildInstaller {
        &self.installer
    }
}

#[async_trait]
impl SizeMeasurer for EsbuildMeasurer {
    async fn measure(
        &self,
        dir: &Path,
        import: &ImportDescriptor,
        target: Target,
    ) -> Result<ModuleSize, ImportCostError> {
        let binary = self.installer.ensure().await?;
        let entry = entry_module(import)?;

        let mut child = Command::new(&binary)
            .arg("--bundle")
            .arg("--minify")
            .arg(platform_flag(target))
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                ImportCostError::ToolMissing(format!(
                    "failed to spawn {}: {err}",
                    binary.display()
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(entry.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ImportCostError::Measurement {
                name: import.name.clone(),
                reason: stderr.trim().to_string(),
            });
        }

        let original = output.stdout.len() as u32;
        let compressed = gzip_len(&output.stdout)? as u32;
        debug!(
            "measured {}: {} bytes ({} gzipped)",
            import.name, original, compressed
        );
        Ok(ModuleSize {
            original,
            compressed,
        })
    }
}

/// The one-line module esbuild bundles: the measured import reconstructed
/// with the same member shape it had in source.
fn entry_module(import: &ImportDescriptor) -> Result<String, ImportCostError> {
    let clause = match &import.members {
        ImportMembers::AllNamespace => "import * as foo".to_string(),
        ImportMembers::DefaultOnly => "import foo".to_string(),
        ImportMembers::NamedList(names) => format!("import {{ {} }}", names.join(", ")),
    };
    Ok(format!(
        "{} from {}",
        clause,
        serde_json::to_string(&import.name)?
    ))
}

fn platform_flag(target: Target) -> &'static str {
    match target {
        Target::Node => "--platform=node",
        Target::Browser => "--platform=browser",
    }
}

fn gzip_len(bytes: &[u8]) -> Result<usize, ImportCostError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?.len())
}
