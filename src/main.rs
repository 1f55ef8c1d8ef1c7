//! Avatar Sheet - command-line tool for building the team avatar sprite sheet

use std::process::ExitCode;

use avatar_sheet::cli;

fn main() -> ExitCode {
    cli::run()
}
