//! hostfacts - collect host facts and print them as one JSON document.
//!
//! The collection core takes no tuning flags; the CLI surface only decides
//! how the result is printed and whether the optional overlay tools run.
//! stdout carries the fact document, stderr carries logs.

use clap::Parser;
use hf_core::collect::Aggregator;
use hf_core::logging::init_logging;

/// Collect facts about this host and print them as JSON.
#[derive(Parser)]
#[command(name = "hostfacts")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pretty-print the fact document.
    #[arg(long)]
    pretty: bool,

    /// Skip the facter/ohai overlay tools.
    #[arg(long)]
    no_overlays: bool,

    /// Increase verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode).
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        eprintln!("hostfacts: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> hf_common::Result<()> {
    let mut aggregator = Aggregator::for_current_platform();
    if cli.no_overlays {
        aggregator = aggregator.without_overlays();
    }

    let namespace = aggregator.collect()?;

    let document = if cli.pretty {
        serde_json::to_string_pretty(&namespace)?
    } else {
        serde_json::to_string(&namespace)?
    };
    println!("{}", document);

    Ok(())
}
