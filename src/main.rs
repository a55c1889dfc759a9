// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

mod classifier;
mod cmd;
mod deployer;
mod input;
mod json_schema;
mod parser;
mod progress;
mod rewriter;

use clap::Parser;
use cmd::Cli;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = cmd::run(cli) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
