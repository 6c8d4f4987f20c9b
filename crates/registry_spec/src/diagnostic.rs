//! Build diagnostics.
//!
//! Every problem the pipeline finds is reported as a [`Diagnostic`]; nothing in
//! the pipeline panics or aborts on bad input. Whether a diagnostic blocks
//! synthesis of its collection is decided by [`Diagnostic::blocks_collection`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Warning,
	Error,
}

impl Severity {
	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"warning" | "warn" => Some(Self::Warning),
			"error" => Some(Self::Error),
			_ => None,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Warning => "warning",
			Self::Error => "error",
		}
	}
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IssueKind {
	/// Malformed marker; only the offending declaration is skipped.
	ScanIssue,
	/// Implementation fails the capability or construction contract.
	ConstraintViolation,
	/// Duplicate id, name or unique secondary-key value within a collection.
	IdentityCollision,
	/// A collection received no options.
	EmptyCollection,
}

impl IssueKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ScanIssue => "scan",
			Self::ConstraintViolation => "constraint",
			Self::IdentityCollision => "collision",
			Self::EmptyCollection => "empty",
		}
	}
}

impl fmt::Display for IssueKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
	pub severity: Severity,
	pub kind: IssueKind,
	pub message: String,
	/// Collection the issue belongs to, when known.
	pub collection: Option<String>,
	/// Offending declaration (option or marker name), when known.
	pub declaration: Option<String>,
	pub module: String,
	pub location: Option<SourceLocation>,
	/// Other declarations taking part in the same issue.
	pub related: Vec<SourceLocation>,
}

impl Diagnostic {
	pub fn new(severity: Severity, kind: IssueKind, module: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			severity,
			kind,
			message: message.into(),
			collection: None,
			declaration: None,
			module: module.into(),
			location: None,
			related: Vec::new(),
		}
	}

	pub fn error(kind: IssueKind, module: impl Into<String>, message: impl Into<String>) -> Self {
		Self::new(Severity::Error, kind, module, message)
	}

	pub fn warning(kind: IssueKind, module: impl Into<String>, message: impl Into<String>) -> Self {
		Self::new(Severity::Warning, kind, module, message)
	}

	pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
		self.collection = Some(collection.into());
		self
	}

	pub fn for_declaration(mut self, declaration: impl Into<String>) -> Self {
		self.declaration = Some(declaration.into());
		self
	}

	pub fn at(mut self, location: SourceLocation) -> Self {
		self.location = Some(location);
		self
	}

	pub fn with_related(mut self, related: impl IntoIterator<Item = SourceLocation>) -> Self {
		self.related.extend(related);
		self
	}

	pub fn is_error(&self) -> bool {
		self.severity == Severity::Error
	}

	/// Scan issues only drop their own declaration; every other error stops the
	/// collection it belongs to from being synthesized.
	pub fn blocks_collection(&self) -> bool {
		self.is_error() && self.kind != IssueKind::ScanIssue
	}

	/// Ordering key for byte-stable reports.
	pub fn sort_key(&self) -> (&str, Option<&SourceLocation>, IssueKind, &str) {
		(&self.module, self.location.as_ref(), self.kind, &self.message)
	}
}

impl fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.location {
			Some(loc) => write!(f, "{loc}: ")?,
			None => write!(f, "<{}>: ", self.module)?,
		}
		write!(f, "{}[{}]: {}", self.severity, self.kind, self.message)?;
		for loc in &self.related {
			write!(f, "\n  note: also declared at {loc}")?;
		}
		Ok(())
	}
}

/// Sorts diagnostics into their canonical report order.
pub fn sort(diagnostics: &mut [Diagnostic]) {
	diagnostics.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
