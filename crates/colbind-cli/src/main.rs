mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "colbind")]
#[command(about = "Decode insert batches into columnar blocks", long_about = None)]
struct Args {
    /// TOML file with reader options and table schemas.
    #[arg(long, default_value = "config.example.toml")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log the configured tables and the blocks they produce.
    Describe,
    /// Run envelope files through a batch reader.
    Load {
        files: Vec<PathBuf>,
        /// Print every decoded row.
        #[arg(long, default_value_t = false)]
        print_rows: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::new();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::from_path(&args.config)?;
    match args.command {
        Command::Describe => commands::describe(&config)?,
        Command::Load { files, print_rows } => commands::load(&config, &files, print_rows).await?,
    }
    Ok(())
}
