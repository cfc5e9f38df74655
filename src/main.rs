use clap::Parser;
use rebalancer::cli::{run, Cli};
use rebalancer::logging;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    run(cli)
}
