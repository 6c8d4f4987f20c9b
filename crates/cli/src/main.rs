//! `roster` command-line front end.
//!
//! Runs the registry pipeline outside of a build script: check a marker
//! directory, emit artifacts into a directory of choice, or dump an artifact
//! that was already generated.

use std::io;
use std::process::ExitCode;

use clap::Parser;

mod cli;

use cli::Cli;

fn main() -> ExitCode {
	let cli = Cli::parse();

	setup_tracing(cli.verbose);

	let stdout = io::stdout();
	match cli::run(cli, &mut stdout.lock()) {
		Ok(0) => ExitCode::SUCCESS,
		Ok(_) => ExitCode::FAILURE,
		Err(error) => {
			eprintln!("error: {error:#}");
			ExitCode::from(2)
		}
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_env("ROSTER_LOG")
		.or_else(|_| EnvFilter::try_from_default_env())
		.unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("roster_spec=debug,roster_cli=debug,info")
			} else {
				EnvFilter::new("warn")
			}
		});

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(false)
		.init();
}
