//! Command-line argument parsing and command dispatch.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roster_spec::compile::{BuildCtx, BuildReport, Pipeline, PipelineConfig, Program};
use roster_spec::{RegistryArtifact, Severity};

/// Build-time plugin registry generator.
#[derive(Parser, Debug)]
#[command(name = "roster", version, about = "Validate marker documents and generate plugin registries")]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,

	/// Verbose logging
	#[arg(short, long, global = true)]
	pub verbose: bool,
}

/// Shared pipeline options.
#[derive(clap::Args, Debug, Clone)]
pub struct PipelineArgs {
	/// Directory holding the `.kdl` marker documents
	#[arg(value_name = "DIR")]
	pub dir: PathBuf,

	/// Module whose reference closure is compiled
	#[arg(short, long, value_name = "MODULE")]
	pub root: String,

	/// Severity of a collection without options ("warning" or "error")
	#[arg(long, value_name = "SEVERITY", value_parser = parse_severity)]
	pub empty_collection: Option<Severity>,

	/// Scan modules one at a time
	#[arg(long)]
	pub sequential: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Run the pipeline and print diagnostics without writing anything
	Check(PipelineArgs),
	/// Run the pipeline and write one artifact per unblocked collection
	Emit {
		#[command(flatten)]
		pipeline: PipelineArgs,

		/// Output directory for the artifacts
		#[arg(short, long, value_name = "DIR")]
		out: PathBuf,
	},
	/// Print the entries of a generated artifact
	Dump {
		/// Artifact file
		#[arg(value_name = "FILE")]
		artifact: PathBuf,
	},
}

fn parse_severity(s: &str) -> Result<Severity, String> {
	Severity::parse(s).ok_or_else(|| format!("expected \"warning\" or \"error\", got '{s}'"))
}

/// Runs `cli`, writing human-readable output to `out`.
///
/// Returns the number of error diagnostics the pipeline reported.
pub fn run(cli: Cli, out: &mut dyn Write) -> Result<usize> {
	match cli.command {
		Command::Check(args) => {
			let report = build(&args)?;
			print_report(&report, out)?;
			Ok(report.error_count())
		}
		Command::Emit { pipeline, out: dir } => {
			let report = build(&pipeline)?;
			fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
			BuildCtx::from_dirs(&pipeline.dir, &dir)
				.write_report(&report)
				.with_context(|| format!("writing artifacts to {}", dir.display()))?;
			print_report(&report, out)?;
			for registry in &report.registries {
				writeln!(out, "wrote {}", dir.join(registry.file_name()).display())?;
			}
			Ok(report.error_count())
		}
		Command::Dump { artifact } => {
			dump(&artifact, out)?;
			Ok(0)
		}
	}
}

fn config_for(args: &PipelineArgs) -> Result<PipelineConfig> {
	let mut config = PipelineConfig::load(&args.dir)
		.and_then(PipelineConfig::with_env)
		.with_context(|| format!("loading pipeline configuration from {}", args.dir.display()))?;
	if let Some(severity) = args.empty_collection {
		config.empty_collection = severity;
	}
	if args.sequential {
		config.parallel = false;
	}
	Ok(config)
}

fn build(args: &PipelineArgs) -> Result<BuildReport> {
	let config = config_for(args)?;
	let program = Program::load_dir(&args.dir)
		.with_context(|| format!("reading marker documents from {}", args.dir.display()))?;
	tracing::debug!(dir = %args.dir.display(), modules = program.modules().count(), "loaded markers");
	Pipeline::new(config)
		.run(&program, &args.root)
		.with_context(|| format!("compiling root module '{}'", args.root))
}

fn print_report(report: &BuildReport, out: &mut dyn Write) -> Result<()> {
	for diagnostic in &report.diagnostics {
		writeln!(out, "{diagnostic}")?;
	}
	for registry in &report.registries {
		writeln!(
			out,
			"registry {}: {} entries ({}, {})",
			registry.collection,
			registry.entries.len(),
			registry.mode,
			registry.storage.as_str()
		)?;
	}
	for collection in &report.blocked {
		writeln!(out, "blocked {collection}")?;
	}
	writeln!(
		out,
		"{} error(s), {} warning(s)",
		report.error_count(),
		report.warning_count()
	)?;
	Ok(())
}

fn dump(path: &Path, out: &mut dyn Write) -> Result<()> {
	let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
	let artifact = RegistryArtifact::decode(&bytes).with_context(|| format!("decoding {}", path.display()))?;

	writeln!(
		out,
		"{} : {} ({}, {}, case {})",
		artifact.collection,
		artifact.capability,
		artifact.mode,
		artifact.storage.as_str(),
		artifact.case.as_str()
	)?;
	for entry in &artifact.entries {
		write!(out, "{:>6}  {}  {}  [{}]", entry.id, entry.name, entry.hook, entry.module)?;
		for (def, value) in artifact.keys.iter().zip(&entry.keys) {
			if let Some(value) = value {
				write!(out, "  {}={value}", def.name)?;
			}
		}
		writeln!(out)?;
	}
	Ok(())
}
