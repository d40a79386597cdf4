//! texscale - Command-line tool for upscaling pixel-art texture packs

use std::process::ExitCode;

use texscale::cli;

fn main() -> ExitCode {
    cli::run()
}
