use anyhow::Result;
use clap::Parser;

use kproxy_cache::{cli::Cli, logging, run, settings::Settings};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;
    logging::init_logger(settings.log)?;
    run(settings, cli.command)
}
