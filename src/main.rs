use anyhow::Result;
use clap::Parser;
use modkeeper::commands::{self, Command};
use modkeeper::config::Config;
use std::path::PathBuf;

/// modkeeper - mod manager for modded applications
///
/// Imports mod archives, installs them together with their dependencies and
/// removes libraries nothing needs any more.
///
/// Examples:
///   modkeeper --app com.example.game import hats.qmod
///   modkeeper --app com.example.game install hats
#[derive(Parser, Debug)]
#[command(author, version = env!("MODKEEPER_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Application whose mods are managed
    #[arg(long = "app", short = 'a', env = "MODKEEPER_APP", global = true)]
    pub app: Option<String>,

    /// Local directory backing the device filesystem
    #[arg(
        long = "device-root",
        env = "MODKEEPER_DEVICE_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub device_root: Option<PathBuf>,

    /// More output (-v for info, -vv for debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List loaded mods and libraries
    List,

    /// Show details of a mod
    Show(IdArgs),

    /// Import a mod archive without installing it
    Import(ImportArgs),

    /// Install a mod and its dependencies
    Install(IdArgs),

    /// Uninstall a mod, keeping it loaded
    Uninstall(UninstallArgs),

    /// Uninstall and delete a mod
    Delete(IdArgs),
}

#[derive(clap::Args, Debug)]
pub struct IdArgs {
    /// Mod ID
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Path of the mod archive
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct UninstallArgs {
    /// Mod ID
    pub id: String,

    /// Remove the files even if the mod is not marked as installed
    #[arg(long)]
    pub force: bool,
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::List => Command::List,
            Commands::Show(args) => Command::Show { id: args.id },
            Commands::Import(args) => Command::Import {
                archive: args.archive,
            },
            Commands::Install(args) => Command::Install { id: args.id },
            Commands::Uninstall(args) => Command::Uninstall {
                id: args.id,
                force: args.force,
            },
            Commands::Delete(args) => Command::Delete { id: args.id },
        }
    }
}

fn default_log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_log_filter(cli.verbose)),
    )
    .init();

    let app = cli
        .app
        .ok_or_else(|| anyhow::anyhow!("No application selected. Pass --app or set MODKEEPER_APP."))?;
    let config = Config::new(app, cli.device_root)?;
    commands::run(cli.command.into(), config).await
}
