//! Program symbol graph: one KDL marker document per module plus the module
//! reference edges used to compute the reference closure.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use kdl::{KdlDocument, KdlNode};
use walkdir::WalkDir;

use super::config::CONFIG_FILE;
use super::error::{CompileError, Result};
use crate::diagnostic::{Diagnostic, IssueKind};
use crate::model::SourceLocation;

/// Extension of marker documents.
pub const MARKER_EXTENSION: &str = "kdl";

/// Maps byte offsets in a source text to 1-based line/column positions.
#[derive(Debug, Clone)]
pub(crate) struct LineIndex {
	file: String,
	text: String,
	starts: Vec<usize>,
}

impl LineIndex {
	pub(crate) fn new(file: String, text: &str) -> Self {
		let mut starts = vec![0];
		starts.extend(text.match_indices('\n').map(|(idx, _)| idx + 1));
		Self {
			file,
			text: text.to_string(),
			starts,
		}
	}

	pub(crate) fn location(&self, offset: usize) -> SourceLocation {
		let offset = offset.min(self.text.len());
		let line = self.starts.partition_point(|&start| start <= offset);
		let start = self.starts[line - 1];
		let column = self
			.text
			.get(start..offset)
			.map_or(offset - start, |s| s.chars().count());
		SourceLocation::new(self.file.clone(), line as u32, column as u32 + 1)
	}

	pub(crate) fn node_location(&self, node: &KdlNode) -> SourceLocation {
		self.location(node.span().offset())
	}

	pub(crate) fn file(&self) -> &str {
		&self.file
	}
}

/// A parsed marker document for one module.
#[derive(Debug, Clone)]
pub struct ModuleSource {
	pub name: String,
	pub path: PathBuf,
	pub references: Vec<String>,
	pub location: SourceLocation,
	pub(crate) document: KdlDocument,
	pub(crate) lines: LineIndex,
}

/// The whole program as seen by the scanner.
#[derive(Debug, Default)]
pub struct Program {
	modules: BTreeMap<String, ModuleSource>,
	files: Vec<PathBuf>,
	issues: Vec<Diagnostic>,
}

/// Modules reachable from a root, sorted by name.
pub struct Closure<'a> {
	pub modules: Vec<&'a ModuleSource>,
	pub issues: Vec<Diagnostic>,
}

impl Program {
	pub fn new() -> Self {
		Self::default()
	}

	/// Loads every `*.kdl` marker file under `dir` (except the pipeline
	/// configuration file), in path order.
	pub fn load_dir(dir: &Path) -> Result<Self> {
		let mut paths = Vec::new();
		for entry in WalkDir::new(dir) {
			let entry = entry?;
			let path = entry.path();
			if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != MARKER_EXTENSION) {
				continue;
			}
			if path.file_name().is_some_and(|name| name == CONFIG_FILE) {
				continue;
			}
			paths.push(entry.into_path());
		}
		paths.sort();

		let mut program = Self::new();
		for path in paths {
			let text = fs::read_to_string(&path).map_err(|error| CompileError::Io {
				path: path.clone(),
				error,
			})?;
			let display = display_path(dir, &path);
			program.add_source(path, display, &text);
		}
		Ok(program)
	}

	/// Builds a program from in-memory `(file name, text)` pairs.
	pub fn from_sources<'a>(sources: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
		let mut program = Self::new();
		for (file, text) in sources {
			program.add_source(file, file, text);
		}
		program
	}

	/// Adds one marker document. `display` is the path used in diagnostics.
	pub fn add_source(&mut self, path: impl Into<PathBuf>, display: impl Into<String>, text: &str) {
		let path = path.into();
		let display = display.into();
		let stem = path
			.file_stem()
			.map(|s| s.to_string_lossy().into_owned())
			.unwrap_or_else(|| display.clone());
		self.files.push(path.clone());

		let lines = LineIndex::new(display.clone(), text);
		let document: KdlDocument = match text.parse() {
			Ok(doc) => doc,
			Err(e) => {
				self.issues.push(
					Diagnostic::error(IssueKind::ScanIssue, stem, format!("failed to parse marker document: {e}"))
						.at(SourceLocation::new(display, 1, 1)),
				);
				return;
			}
		};

		let (name, references, location) = read_module_header(&document, &lines, &stem, &mut self.issues);

		if let Some(existing) = self.modules.get(&name) {
			self.issues.push(
				Diagnostic::error(
					IssueKind::ScanIssue,
					name.clone(),
					format!("module '{name}' is already declared; this document is skipped"),
				)
				.at(location)
				.with_related([existing.location.clone()]),
			);
			return;
		}

		let file = &display;
		tracing::trace!(module = %name, file = %file, "loaded marker document");
		self.modules.insert(
			name.clone(),
			ModuleSource {
				name,
				path,
				references,
				location,
				document,
				lines,
			},
		);
	}

	pub fn module(&self, name: &str) -> Option<&ModuleSource> {
		self.modules.get(name)
	}

	pub fn modules(&self) -> impl Iterator<Item = &ModuleSource> {
		self.modules.values()
	}

	/// Every file that was read, including ones that failed to parse.
	pub fn files(&self) -> &[PathBuf] {
		&self.files
	}

	/// Problems found while loading documents.
	pub fn issues(&self) -> &[Diagnostic] {
		&self.issues
	}

	/// Computes the transitive reference closure of `root`.
	///
	/// Modules outside the closure are invisible to the scanner even when they
	/// live in the same directory. References to unknown modules are reported
	/// and otherwise ignored; cycles are fine.
	pub fn closure(&self, root: &str) -> Result<Closure<'_>> {
		if !self.modules.contains_key(root) {
			return Err(CompileError::UnknownRoot(root.to_string()));
		}

		let mut seen = BTreeSet::new();
		let mut queue = VecDeque::from([root]);
		let mut issues = Vec::new();
		seen.insert(root);

		while let Some(name) = queue.pop_front() {
			let module = &self.modules[name];
			for reference in &module.references {
				match self.modules.get_key_value(reference.as_str()) {
					Some((key, _)) => {
						if seen.insert(key.as_str()) {
							queue.push_back(key.as_str());
						}
					}
					None => issues.push(
						Diagnostic::error(
							IssueKind::ScanIssue,
							module.name.clone(),
							format!("module '{}' references unknown module '{reference}'", module.name),
						)
						.at(module.location.clone()),
					),
				}
			}
		}

		Ok(Closure {
			modules: seen.into_iter().map(|name| &self.modules[name]).collect(),
			issues,
		})
	}
}

fn read_module_header(
	document: &KdlDocument,
	lines: &LineIndex,
	stem: &str,
	issues: &mut Vec<Diagnostic>,
) -> (String, Vec<String>, SourceLocation) {
	let mut headers = document.nodes().iter().filter(|n| n.name().value() == "module");
	let Some(header) = headers.next() else {
		return (stem.to_string(), Vec::new(), SourceLocation::new(lines.file(), 1, 1));
	};
	for extra in headers {
		issues.push(
			Diagnostic::warning(IssueKind::ScanIssue, stem, "additional module node ignored")
				.at(lines.node_location(extra)),
		);
	}

	let location = lines.node_location(header);
	let name = match header.get(0).and_then(|v| v.as_string()) {
		Some(name) if !name.is_empty() => name.to_string(),
		_ => {
			issues.push(
				Diagnostic::error(
					IssueKind::ScanIssue,
					stem,
					format!("module node is missing its name; using file name '{stem}'"),
				)
				.at(location.clone()),
			);
			stem.to_string()
		}
	};

	let mut references = Vec::new();
	for child in header.children().map(|c| c.nodes()).unwrap_or_default() {
		if child.name().value() != "references" {
			issues.push(
				Diagnostic::warning(
					IssueKind::ScanIssue,
					name.clone(),
					format!("unknown module child '{}' ignored", child.name().value()),
				)
				.at(lines.node_location(child)),
			);
			continue;
		}
		for entry in child.entries().iter().filter(|e| e.name().is_none()) {
			match entry.value().as_string() {
				Some(reference) => references.push(reference.to_string()),
				None => issues.push(
					Diagnostic::error(IssueKind::ScanIssue, name.clone(), "module references must be strings")
						.at(lines.node_location(child)),
				),
			}
		}
	}

	(name, references, location)
}

/// Path of `path` relative to `root` with `/` separators, so diagnostics are
/// identical across machines and checkouts.
fn display_path(root: &Path, path: &Path) -> String {
	let rel = path.strip_prefix(root).unwrap_or(path);
	rel.components()
		.map(|c| c.as_os_str().to_string_lossy())
		.collect::<Vec<_>>()
		.join("/")
}
