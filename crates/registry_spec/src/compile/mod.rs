//! Build-time registry pipeline.
//!
//! Gated behind the `compile` feature. [`Pipeline::run`] takes a loaded
//! [`Program`] and a root module and produces one [`RegistryArtifact`] per
//! healthy collection plus every diagnostic found along the way. Build
//! scripts normally go through [`BuildCtx`], which also handles cargo
//! integration and writes the artifact blobs.

mod config;
mod ctx;
mod error;
mod markers;
mod program;
mod resolve;
mod scan;
mod synth;
mod validate;

pub use config::{CONFIG_FILE, ENV_EMPTY_COLLECTION, ENV_PARALLEL, PipelineConfig};
pub use ctx::BuildCtx;
pub use error::{CompileError, Result};
pub use markers::MarkerError;
pub use program::{Closure, MARKER_EXTENSION, ModuleSource, Program};
pub use resolve::{Collision, KeyKind, Party, ResolvedEntry};
pub use scan::{ScanOutput, scan};

use rustc_hash::FxHashMap;

use crate::artifact::RegistryArtifact;
use crate::diagnostic::{self, Diagnostic, IssueKind, Severity};
use crate::model::TypeSymbol;

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
	pub root: String,
	/// One artifact per collection that was not blocked, sorted by name.
	pub registries: Vec<RegistryArtifact>,
	/// All diagnostics in canonical order.
	pub diagnostics: Vec<Diagnostic>,
	/// Collections withheld because of blocking errors, sorted by name.
	pub blocked: Vec<String>,
}

impl BuildReport {
	pub fn has_errors(&self) -> bool {
		self.diagnostics.iter().any(Diagnostic::is_error)
	}

	pub fn error_count(&self) -> usize {
		self.diagnostics.iter().filter(|d| d.is_error()).count()
	}

	pub fn warning_count(&self) -> usize {
		self.diagnostics.len() - self.error_count()
	}

	pub fn registry(&self, collection: &str) -> Option<&RegistryArtifact> {
		self.registries.iter().find(|r| r.collection == collection)
	}

	/// Diagnostics attached to `collection`.
	pub fn diagnostics_for<'a>(&'a self, collection: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
		self.diagnostics
			.iter()
			.filter(move |d| d.collection.as_deref() == Some(collection))
	}
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
	config: PipelineConfig,
}

impl Pipeline {
	pub fn new(config: PipelineConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &PipelineConfig {
		&self.config
	}

	/// Runs scan, validation, identity resolution and synthesis for the
	/// reference closure of `root`.
	///
	/// Only an unknown root fails the run; every problem in the declarations
	/// themselves is reported through [`BuildReport::diagnostics`].
	pub fn run(&self, program: &Program, root: &str) -> Result<BuildReport> {
		let mut diagnostics = program.issues().to_vec();

		let scanned = scan(program, root, self.config.parallel)?;
		diagnostics.extend(scanned.issues.iter().cloned());

		let validation = validate::validate(&scanned, &self.config);
		diagnostics.extend(validation.diagnostics);

		let mut types: FxHashMap<&str, Vec<&TypeSymbol>> = FxHashMap::default();
		for ty in &scanned.types {
			types.entry(ty.name.as_str()).or_default().push(ty);
		}
		let type_of = |name: &str| match types.get(name).map(Vec::as_slice) {
			Some([one]) => Some(*one),
			_ => None,
		};

		let mut registries = Vec::new();
		let mut blocked = Vec::new();
		for plan in validation.plans {
			let def = &plan.definition;
			let empty = plan.options.is_empty();
			let resolution = resolve::resolve(def, plan.options);
			let collided = !resolution.collisions.is_empty();
			diagnostics.extend(resolution.collisions.iter().map(Collision::to_diagnostic));

			if empty {
				diagnostics.push(
					Diagnostic::new(
						self.config.empty_collection,
						IssueKind::EmptyCollection,
						def.module.clone(),
						format!("collection '{}' has no options in the closure of '{root}'", def.name),
					)
					.in_collection(def.name.clone())
					.at(def.location.clone()),
				);
			}

			if plan.blocked || collided || (empty && self.config.empty_collection == Severity::Error) {
				tracing::warn!(collection = %def.name, "registry withheld due to errors");
				blocked.push(def.name.clone());
				continue;
			}
			registries.push(synth::synthesize(def, &resolution.entries, type_of));
		}

		diagnostic::sort(&mut diagnostics);
		let report = BuildReport {
			root: root.to_string(),
			registries,
			diagnostics,
			blocked,
		};
		tracing::debug!(
			root,
			registries = report.registries.len(),
			errors = report.error_count(),
			warnings = report.warning_count(),
			"pipeline finished"
		);
		Ok(report)
	}
}
