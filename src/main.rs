use clap::Parser;
use minuteman::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
