//! cachecopy - Cache-Validated Concurrent Directory Copier
//!
//! Entry point for the cachecopy CLI.

use clap::Parser;

use cachecopy::cli::Cli;
use cachecopy::error::ExitCode;

fn main() {
    let cli = Cli::parse();

    match cachecopy::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
    }
}
