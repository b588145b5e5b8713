// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! `sign-inference` command line.

use clap::Parser;

use sign_inference::cli::args::{Cli, Commands};
use sign_inference::cli::classify::run_classify;
use sign_inference::cli::logging::set_verbose;
use sign_inference::cli::normalize::run_normalize;

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Classify(args) => {
            set_verbose(args.verbose);
            run_classify(args);
        }
        Commands::Normalize(args) => {
            set_verbose(args.verbose);
            run_normalize(args);
        }
    }
}
