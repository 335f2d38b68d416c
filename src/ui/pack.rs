use camino::Utf8PathBuf;
use clap::Args;
use console::Term;

use crate::config::Configuration;
use crate::{PackOptions, PackSummary, ProgressFn};

use super::{nice_size, print_progress_line};

#[derive(Debug, Args)]
pub struct PackArgs {
    /// Dependency tree to snapshot.
    #[clap(short, long, default_value = "node_modules")]
    source: Utf8PathBuf,

    /// Where to write the snapshot database.
    #[clap(short, long, default_value = "node_modules.db")]
    output: Utf8PathBuf,

    /// Gzip level, 1 (fastest) through 9 (smallest). Defaults to the
    /// configured level, or 6 if unconfigured.
    #[clap(short = 'c', long = "compression")]
    compression_level: Option<u32>,

    /// Record a hash of the sibling package-lock.json, if one exists.
    #[clap(long)]
    include_lockfile: bool,
}

pub fn run(args: PackArgs, config: &Configuration) -> anyhow::Result<()> {
    let options = PackOptions {
        source: args.source,
        output: args.output,
        compression_level: args.compression_level.unwrap_or(config.compression_level),
        include_lockfile: args.include_lockfile,
    };

    let term = Term::stderr();
    let mut cb: Box<ProgressFn<'_>> = Box::new(|current, total, message| {
        print_progress_line(&term, current, total, message);
    });

    let summary = crate::pack(&options, Some(&mut *cb))?;
    eprintln!();
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &PackSummary) {
    println!(
        "packed {} packages, {} files ({} -> {}, {} deduplicated)",
        summary.packages,
        summary.total_files,
        nice_size(summary.original_size),
        nice_size(summary.compressed_size),
        summary.deduplicated,
    );
}
