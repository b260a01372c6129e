use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};

use crate::{command, logger};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "dockbox")]
#[command(about = "Inspect and clean up the images behind your dockboxes")]
struct Cli {
    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the ancestry tree of dockbox images
    Tree {
        /// Include every local image, not just dockboxes
        #[arg(short, long)]
        all: bool,
    },

    /// Remove a dockbox and, with confirmation, the images it was built from
    #[command(visible_alias = "rm")]
    Clean {
        /// Dockbox name (or image reference with --image)
        name: String,

        /// Treat the name as an image reference instead of a dockbox name
        #[arg(long)]
        image: bool,
    },

    /// List dockboxes and whether they are running
    #[command(visible_alias = "ls")]
    List {
        /// Only list dockboxes of projects found under these paths
        paths: Vec<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// --- Public Entry Point ---
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose)?;
    tracing::info!(args = ?std::env::args().collect::<Vec<_>>(), "dockbox start");

    match cli.command {
        Commands::Tree { all } => command::tree::run(all),
        Commands::Clean { name, image } => command::clean::run(&name, image),
        Commands::List { paths } => command::list::run(&paths),
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
