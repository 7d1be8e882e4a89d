use anyhow::Result;

use super::args::Commands;
use crate::session::Session;

/// Handle CLI subcommands. Returns true when the invocation is complete.
pub async fn handle_command(command: &Commands, session: &Session) -> Result<bool> {
    match command {
        Commands::InstallBundler => {
            session.reinstall_bundler().await?;
            println!("esbuild is ready");
            Ok(true)
        }
        Commands::CacheInfo => {
            println!("cache file: {}", session.config().cache_file()?.display());
            println!("entries:    {}", session.cache().len());
            Ok(true)
        }
    }
}
