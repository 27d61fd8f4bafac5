//! Main entry point for the pipecompare CLI

use clap::Parser;
use pipecompare::cli::Cli;
use pipecompare::commands::execute;

fn main() {
    let cli = Cli::parse();

    // Initialize logging at the level the flags ask for
    env_logger::Builder::from_default_env()
        .filter_level(cli.log_level())
        .init();

    match execute(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
