//! Compare two pretrained reconstruction models over a test directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use hsi_tools::{config, viz};

#[derive(Parser)]
#[command(
    name = "visualize",
    about = "Run two reconstruction models over a test set and render comparison figures"
)]
struct Cli {
    /// JSON config overriding the default experiment layout.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    viz::run(&cfg)
}
