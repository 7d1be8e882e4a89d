use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::types::Target;

#[derive(Parser, Debug)]
#[command(name = "importcost")]
#[command(version)]
#[command(
    about = "Annotates JavaScript and TypeScript imports with their bundled transfer size",
    long_about = None
)]
pub struct Cli {
    /// Source files to annotate
    #[arg(required_unless_present = "command")]
    pub files: Vec<PathBuf>,

    /// Path to a configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Measure for this platform instead of the configured one
    #[arg(long, value_enum)]
    pub target: Option<TargetArg>,

    /// Never run `npm install` to provision esbuild
    #[arg(long)]
    pub no_install: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// (Re-)provision the esbuild bundler
    InstallBundler,
    /// Show where the size cache lives and how many entries it holds
    CacheInfo,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TargetArg {
    /// Resolve and bundle for a server runtime
    Node,
    /// Resolve and bundle for the browser
    Browser,
}

impl From<TargetArg> for Target {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Node => Target::Node,
            TargetArg::Browser => Target::Browser,
        }
    }
}
