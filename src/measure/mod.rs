mod esbuild;
mod installer;

pub use esbuild::{EsbuildMeasurer, ModuleSize, SizeMeasurer};
pub use installer::EsbuildInstaller;
