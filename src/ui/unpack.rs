use camino::Utf8PathBuf;
use clap::Args;
use console::Term;

use crate::config::Configuration;
use crate::{ProgressFn, UnpackOptions, UnpackSummary};

use super::{nice_size, print_progress_line};

#[derive(Debug, Args)]
pub struct UnpackArgs {
    /// Snapshot database to restore from.
    #[clap(short, long, default_value = "node_modules.db")]
    input: Utf8PathBuf,

    /// Directory to restore into.
    #[clap(short, long, default_value = "node_modules")]
    output: Utf8PathBuf,

    /// Overwrite an existing output directory.
    #[clap(short, long)]
    force: bool,
}

pub fn run(args: UnpackArgs, config: &Configuration) -> anyhow::Result<()> {
    let options = UnpackOptions {
        database: args.input,
        output: args.output,
        force: args.force,
        cache_threshold_bytes: config.cache_threshold_bytes,
    };

    let term = Term::stderr();
    let mut cb: Box<ProgressFn<'_>> = Box::new(|current, total, message| {
        print_progress_line(&term, current, total, message);
    });

    let summary = crate::unpack(&options, Some(&mut *cb))?;
    eprintln!();
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &UnpackSummary) {
    println!(
        "restored {} files ({})",
        summary.total_files,
        nice_size(summary.total_size),
    );
}
