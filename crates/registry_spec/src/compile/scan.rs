//! Marker scanner.
//!
//! Walks the reference closure of the root module and extracts every marker.
//! Modules are independent, so each one is scanned on its own worker; the
//! per-module results are merged in module-name order before anything else
//! looks at them.
//!
//! # Invariants
//!
//! - Only modules in the root's reference closure are scanned.
//!   - Tested by: `tests::unreferenced_modules_are_invisible`
//! - A malformed marker drops that declaration only.
//!   - Tested by: `tests::malformed_marker_is_isolated`
//! - Output does not depend on worker scheduling.
//!   - Tested by: `tests::parallel_and_sequential_scans_agree`

use kdl::KdlNode;
use rayon::prelude::*;

use super::error::Result;
use super::markers::{self, MarkerError};
use super::program::{ModuleSource, Program};
use crate::diagnostic::{Diagnostic, IssueKind};
use crate::model::{CapabilityDecl, CollectionDefinition, OptionDeclaration, TypeSymbol};

/// Everything the scanner found in the closure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutput {
	/// Names of the scanned modules, sorted.
	pub modules: Vec<String>,
	pub capabilities: Vec<CapabilityDecl>,
	pub types: Vec<TypeSymbol>,
	pub collections: Vec<CollectionDefinition>,
	pub options: Vec<OptionDeclaration>,
	pub issues: Vec<Diagnostic>,
}

impl ScanOutput {
	fn merge(&mut self, other: ScanOutput) {
		self.modules.extend(other.modules);
		self.capabilities.extend(other.capabilities);
		self.types.extend(other.types);
		self.collections.extend(other.collections);
		self.options.extend(other.options);
		self.issues.extend(other.issues);
	}
}

/// Scans the reference closure of `root`.
pub fn scan(program: &Program, root: &str, parallel: bool) -> Result<ScanOutput> {
	let closure = program.closure(root)?;

	let per_module: Vec<ScanOutput> = if parallel {
		closure.modules.par_iter().map(|m| scan_module(m)).collect()
	} else {
		closure.modules.iter().map(|m| scan_module(m)).collect()
	};

	let mut out = ScanOutput {
		issues: closure.issues,
		..ScanOutput::default()
	};
	for module in per_module {
		out.merge(module);
	}
	Ok(out)
}

/// Extracts the markers of one module.
pub(crate) fn scan_module(module: &ModuleSource) -> ScanOutput {
	let mut out = ScanOutput {
		modules: vec![module.name.clone()],
		..ScanOutput::default()
	};

	for node in module.document.nodes() {
		let kind = node.name().value();
		let result = match kind {
			"module" => continue,
			"capability" => markers::read_capability(node, &module.name, &module.lines).map(|c| out.capabilities.push(c)),
			"type" => markers::read_type(node, &module.name, &module.lines).map(|t| out.types.push(t)),
			"collection" => {
				markers::read_collection(node, &module.name, &module.lines).map(|c| out.collections.push(c))
			}
			"option" => markers::read_option(node, &module.name, &module.lines).map(|o| out.options.push(o)),
			other => {
				out.issues.push(
					Diagnostic::warning(
						IssueKind::ScanIssue,
						module.name.clone(),
						format!("unknown marker '{other}' ignored"),
					)
					.at(module.lines.node_location(node)),
				);
				continue;
			}
		};

		if let Err(error) = result {
			out.issues.push(scan_issue(module, node, &error));
		}
	}

	tracing::debug!(
		module = %module.name,
		collections = out.collections.len(),
		options = out.options.len(),
		issues = out.issues.len(),
		"scanned module"
	);
	out
}

fn scan_issue(module: &ModuleSource, node: &KdlNode, error: &MarkerError) -> Diagnostic {
	let declaration = node
		.entries()
		.iter()
		.find(|e| e.name().is_none())
		.and_then(|e| e.value().as_string())
		.map(String::from);
	let mut diag = Diagnostic::error(IssueKind::ScanIssue, module.name.clone(), format!("{error}; declaration skipped"))
		.at(module.lines.node_location(node));
	if let Some(name) = declaration {
		diag = diag.for_declaration(name);
	}
	if node.name().value() == "option"
		&& let Some(collection) = node
			.entries()
			.iter()
			.find(|e| e.name().is_some_and(|n| n.value() == "collection"))
			.and_then(|e| e.value().as_string())
	{
		diag = diag.in_collection(collection);
	}
	diag
}
