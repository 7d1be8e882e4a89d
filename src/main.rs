use anyhow::Result;
use clap::Parser;

use importcost::{
    app::{load_config, load_config_from},
    cli::{handle_command, AnnotateRunner, Cli},
    session::Session,
    utils::init_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(target) = cli.target {
        config.target = target.into();
    }
    if cli.no_install {
        config.bundler.auto_install = false;
    }

    let session = Session::new(config).await?;

    if let Some(command) = &cli.command {
        if handle_command(command, &session).await? {
            return Ok(());
        }
    }

    let runner = AnnotateRunner::new(session);
    let annotated = runner.run(&cli.files).await?;
    if annotated == 0 {
        // Nothing measurable: wrong file types, unresolvable imports, or a
        // missing bundler. Details were logged along the way.
        std::process::exit(1);
    }
    Ok(())
}
