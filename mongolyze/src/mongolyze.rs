/// `mongolyze` -- Analyze MongoDB server log files
///
/// Reads server logs (2.4 through 4.0, mongod and mongos, gzipped or not)
/// and reports aggregated statistics about the query traffic in them: one
/// row per (namespace, operation, query shape) with count, min, max, 95th
/// percentile, and total duration.
///
/// Quirks
///
/// Query shapes keep the order of `$or`/`$and` arms, so two logically
/// equivalent disjunctions written in different orders aggregate
/// separately.  This matches the tool this one replaces.
///
/// A file's version line ("db version v3.6.3") is trusted when present;
/// otherwise the version is guessed from whichever line parsers matched,
/// which on ambiguous grammars may name an adjacent release.
mod format;
mod query;
mod source;
mod summary;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::process;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print aggregated statistics about query shapes
    Query(QueryCmdArgs),

    /// Print information about the program
    Version,
}

#[derive(Args, Debug)]
pub struct QueryCmdArgs {
    /// Log files to analyze, read in order
    #[arg(required = true)]
    pub files: Vec<String>,

    /// Sort by namespace, operation, pattern, count, min, max, 95%, and/or
    /// sum (comma separated for multiple)
    #[arg(long, short)]
    pub sort: Option<String>,

    /// Fold long pattern strings onto continuation lines
    #[arg(long, default_value_t = false)]
    pub wrap: bool,

    /// Select fields and format for the output [default: try --fmt=help]
    #[arg(long)]
    pub fmt: Option<String>,

    /// Print per-file statistics to stderr
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

fn main() {
    match mongolyze() {
        Ok(()) => {}
        Err(msg) => {
            eprintln!("ERROR: {}", msg);
            process::exit(1);
        }
    }
}

fn mongolyze() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("mongolyze version(0.1.0)");
            Ok(())
        }
        Commands::Query(ref args) => {
            if format::maybe_help(&args.fmt, query::fmt_help) {
                return Ok(());
            }
            query::run(args)
        }
    }
}
