//! Declaration model shared by the build pipeline and the runtime registry.
//!
//! Everything here is plain data: markers are read into these types by the
//! scanner and the validated subset is copied into [`crate::artifact`].

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How entries of a collection are materialized at run time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationMode {
	/// One long-lived instance per entry, built when the registry is loaded.
	#[default]
	Singleton,
	/// A construction reference per entry; every call yields a fresh instance.
	Factory,
}

impl GenerationMode {
	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"singleton" => Some(Self::Singleton),
			"factory" => Some(Self::Factory),
			_ => None,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Singleton => "singleton",
			Self::Factory => "factory",
		}
	}

	/// Human-readable name of the construction hook this mode requires.
	pub const fn hook(self) -> &'static str {
		match self {
			Self::Singleton => "no-argument constructor",
			Self::Factory => "factory hook",
		}
	}
}

impl fmt::Display for GenerationMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Backing layout of the id index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageMode {
	/// Hash map keyed by id.
	#[default]
	Dictionary,
	/// Dense slot table indexed by id; ids must be small and non-negative.
	Array,
}

impl StorageMode {
	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"dictionary" => Some(Self::Dictionary),
			"array" => Some(Self::Array),
			_ => None,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Dictionary => "dictionary",
			Self::Array => "array",
		}
	}
}

/// Comparison policy for names and secondary-key values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CasePolicy {
	Sensitive,
	#[default]
	Insensitive,
}

impl CasePolicy {
	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"sensitive" => Some(Self::Sensitive),
			"insensitive" => Some(Self::Insensitive),
			_ => None,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Sensitive => "sensitive",
			Self::Insensitive => "insensitive",
		}
	}

	/// Folds `s` into its lookup form under this policy.
	pub fn fold<'a>(self, s: &'a str) -> Cow<'a, str> {
		match self {
			Self::Sensitive => Cow::Borrowed(s),
			Self::Insensitive if s.chars().all(|c| c.to_lowercase().eq([c])) => Cow::Borrowed(s),
			Self::Insensitive => Cow::Owned(s.to_lowercase()),
		}
	}
}

/// Position of a marker in its source file (1-based line and column).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
	pub file: String,
	pub line: u32,
	pub column: u32,
}

impl SourceLocation {
	pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
		Self {
			file: file.into(),
			line,
			column,
		}
	}
}

impl fmt::Display for SourceLocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}:{}", self.file, self.line, self.column)
	}
}

/// Error from [`CapabilityRef::parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid capability reference '{input}': {reason}")]
pub struct CapabilityParseError {
	pub input: String,
	pub reason: &'static str,
}

/// A capability name with optional generic arguments, e.g. `Sink<Event>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityRef {
	pub name: String,
	pub args: Vec<String>,
}

impl CapabilityRef {
	pub fn plain(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			args: Vec::new(),
		}
	}

	/// Parses `Name` or `Name<A, B<C>>`. Nested arguments are kept verbatim
	/// (whitespace removed) and compared as opaque strings.
	pub fn parse(input: &str) -> Result<Self, CapabilityParseError> {
		let err = |reason| CapabilityParseError {
			input: input.to_string(),
			reason,
		};
		let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();

		let Some(open) = compact.find('<') else {
			if compact.is_empty() {
				return Err(err("empty name"));
			}
			if compact.contains('>') || compact.contains(',') {
				return Err(err("unbalanced generic arguments"));
			}
			return Ok(Self::plain(compact));
		};

		let name = &compact[..open];
		if name.is_empty() {
			return Err(err("empty name"));
		}
		if !compact.ends_with('>') {
			return Err(err("unbalanced generic arguments"));
		}

		let inner = &compact[open + 1..compact.len() - 1];
		let mut args = Vec::new();
		let mut depth = 0usize;
		let mut start = 0usize;
		for (idx, ch) in inner.char_indices() {
			match ch {
				'<' => depth += 1,
				'>' => depth = depth.checked_sub(1).ok_or_else(|| err("unbalanced generic arguments"))?,
				',' if depth == 0 => {
					args.push(&inner[start..idx]);
					start = idx + 1;
				}
				_ => {}
			}
		}
		if depth != 0 {
			return Err(err("unbalanced generic arguments"));
		}
		args.push(&inner[start..]);

		if args.iter().any(|a| a.is_empty()) {
			return Err(err("empty generic argument"));
		}

		Ok(Self {
			name: name.to_string(),
			args: args.into_iter().map(String::from).collect(),
		})
	}
}

impl fmt::Display for CapabilityRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.name)?;
		if !self.args.is_empty() {
			write!(f, "<{}>", self.args.join(", "))?;
		}
		Ok(())
	}
}

/// A capability contract declared by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDecl {
	pub name: String,
	/// Capabilities implied by this one.
	pub extends: Vec<CapabilityRef>,
	pub module: String,
	pub location: SourceLocation,
}

/// An implementation type visible to the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSymbol {
	pub name: String,
	pub implements: Vec<CapabilityRef>,
	/// Whether the type has a no-argument constructor.
	pub constructor: bool,
	/// Declared factory hook, if any.
	pub factory: Option<String>,
	/// Unbound type parameters of the implementation itself.
	pub generics: Vec<String>,
	pub module: String,
	pub location: SourceLocation,
}

/// A declared secondary lookup key of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecondaryKeyDef {
	pub name: String,
	pub unique: bool,
	pub required: bool,
	pub case: CasePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDefinition {
	pub name: String,
	pub capability: CapabilityRef,
	/// Type parameters the collection leaves open in its capability.
	pub generics: Vec<String>,
	pub mode: GenerationMode,
	pub storage: StorageMode,
	pub case: CasePolicy,
	pub keys: Vec<SecondaryKeyDef>,
	/// Service-flavored collections support `register_all` at run time.
	pub service: bool,
	pub module: String,
	pub location: SourceLocation,
}

impl CollectionDefinition {
	pub fn key(&self, name: &str) -> Option<&SecondaryKeyDef> {
		self.keys.iter().find(|k| k.name == name)
	}

	pub fn key_index(&self, name: &str) -> Option<usize> {
		self.keys.iter().position(|k| k.name == name)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDeclaration {
	pub collection: String,
	pub id: i64,
	pub name: String,
	/// Implementation type reference.
	pub implementation: String,
	pub description: Option<String>,
	/// Generation mode the option expects, when it states one.
	pub mode: Option<GenerationMode>,
	/// Secondary-key values in declaration order.
	pub keys: Vec<(String, String)>,
	pub module: String,
	pub location: SourceLocation,
}

impl OptionDeclaration {
	pub fn key_value(&self, key: &str) -> Option<&str> {
		self.keys
			.iter()
			.find(|(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	/// Total order used wherever output must not depend on discovery order:
	/// declaring module, then option name, then implementation type, id and
	/// location.
	pub fn sort_key(&self) -> (&str, &str, &str, i64, &SourceLocation) {
		(
			&self.module,
			&self.name,
			&self.implementation,
			self.id,
			&self.location,
		)
	}
}
