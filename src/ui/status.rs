use camino::Utf8PathBuf;
use clap::Args;

use crate::{StatusOptions, StatusReport};

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Snapshot database to compare against.
    #[clap(long = "db", default_value = "node_modules.db")]
    database: Utf8PathBuf,

    /// Dependency tree to compare. Defaults to the source recorded at pack time.
    #[clap(short = 'n', long = "tree", default_value = "node_modules")]
    tree: Utf8PathBuf,
}

/// Returns whether the tree is clean, so the caller can pick an exit code.
pub fn run(args: StatusArgs) -> anyhow::Result<bool> {
    let options = StatusOptions {
        database: args.database,
        tree: args.tree,
    };

    let report = crate::status(&options)?;
    print_report(&report);
    Ok(report.only_in_db.is_empty() && report.modified.is_empty())
}

fn print_report(report: &StatusReport) {
    for path in &report.only_in_db {
        println!("  deleted:  {path}");
    }
    for path in &report.modified {
        println!("  modified: {path}");
    }
    if report.only_in_db.is_empty() && report.modified.is_empty() {
        println!("{} files unchanged, tree matches snapshot", report.unchanged);
    } else {
        println!(
            "{} files unchanged, {} modified, {} deleted",
            report.unchanged,
            report.modified.len(),
            report.only_in_db.len(),
        );
    }
}
