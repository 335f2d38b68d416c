use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;

use node_archive::ui::{pack, status, unpack};

/// Snapshot and restore a node_modules dependency tree.
#[derive(Debug, Parser)]
#[command(name = "node-archive", version, about)]
struct Cli {
    /// Increase logging verbosity. Pass multiple times for more.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Snapshot a dependency tree into a database file.
    Pack(pack::PackArgs),
    /// Restore a dependency tree from a database file.
    Unpack(unpack::UnpackArgs),
    /// Compare a database file against the dependency tree it describes.
    Status(status::StatusArgs),
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(level_for(cli.verbose))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config = match node_archive::config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Pack(args) => pack::run(args, &config).map(|()| true),
        Command::Unpack(args) => unpack::run(args, &config).map(|()| true),
        Command::Status(args) => status::run(args),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
