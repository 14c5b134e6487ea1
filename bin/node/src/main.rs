//! The `ethscribe` indexing node.

#![warn(unused_crate_dependencies)]

use clap::Parser;

mod cli;
mod flags;
mod telemetry;

fn main() {
    if let Err(err) = cli::Cli::parse().run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
