//! KDL marker readers.
//!
//! Each reader turns one node into a model value or a [`MarkerError`]; the
//! scanner wraps errors into per-declaration scan issues.

use kdl::{KdlNode, KdlValue};
use thiserror::Error;

use super::program::LineIndex;
use crate::model::{
	CapabilityDecl, CapabilityParseError, CapabilityRef, CasePolicy, CollectionDefinition, GenerationMode,
	OptionDeclaration, SecondaryKeyDef, StorageMode, TypeSymbol,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
	#[error("{what} is missing its name argument")]
	MissingName { what: &'static str },

	#[error("{what} '{name}' is missing required property '{key}'")]
	MissingProperty {
		what: &'static str,
		name: String,
		key: &'static str,
	},

	#[error("{what} '{name}': '{key}' must be {expected}")]
	WrongType {
		what: &'static str,
		name: String,
		key: String,
		expected: &'static str,
	},

	#[error("{what} '{name}': unknown {key} '{value}' (expected {expected})")]
	UnknownValue {
		what: &'static str,
		name: String,
		key: &'static str,
		value: String,
		expected: &'static str,
	},

	#[error("{what} '{name}': unexpected child node '{child}'")]
	UnexpectedChild {
		what: &'static str,
		name: String,
		child: String,
	},

	#[error("{what} '{name}': secondary key '{key}' given more than once")]
	DuplicateKey {
		what: &'static str,
		name: String,
		key: String,
	},

	#[error("{what} '{name}': {source}")]
	Capability {
		what: &'static str,
		name: String,
		#[source]
		source: CapabilityParseError,
	},
}

/// Typed accessors over one marker node.
struct NodeReader<'a> {
	node: &'a KdlNode,
	what: &'static str,
	name: String,
}

impl<'a> NodeReader<'a> {
	fn new(node: &'a KdlNode, what: &'static str) -> Result<Self, MarkerError> {
		let name = node
			.entries()
			.iter()
			.find(|e| e.name().is_none())
			.and_then(|e| e.value().as_string())
			.filter(|s| !s.is_empty())
			.ok_or(MarkerError::MissingName { what })?;
		Ok(Self {
			node,
			what,
			name: name.to_string(),
		})
	}

	fn wrong_type(&self, key: &str, expected: &'static str) -> MarkerError {
		MarkerError::WrongType {
			what: self.what,
			name: self.name.clone(),
			key: key.to_string(),
			expected,
		}
	}

	fn prop(&self, key: &str) -> Option<&'a KdlValue> {
		self.node
			.entries()
			.iter()
			.find(|e| e.name().is_some_and(|n| n.value() == key))
			.map(|e| e.value())
	}

	fn string(&self, key: &'static str) -> Result<Option<String>, MarkerError> {
		match self.prop(key) {
			None => Ok(None),
			Some(v) => v
				.as_string()
				.map(|s| Some(s.to_string()))
				.ok_or_else(|| self.wrong_type(key, "a string")),
		}
	}

	fn required_string(&self, key: &'static str) -> Result<String, MarkerError> {
		self.string(key)?.ok_or_else(|| MarkerError::MissingProperty {
			what: self.what,
			name: self.name.clone(),
			key,
		})
	}

	fn required_int(&self, key: &'static str) -> Result<i64, MarkerError> {
		let value = self.prop(key).ok_or_else(|| MarkerError::MissingProperty {
			what: self.what,
			name: self.name.clone(),
			key,
		})?;
		value
			.as_integer()
			.and_then(|v| i64::try_from(v).ok())
			.ok_or_else(|| self.wrong_type(key, "a 64-bit integer"))
	}

	fn bool(&self, key: &'static str, default: bool) -> Result<bool, MarkerError> {
		match self.prop(key) {
			None => Ok(default),
			Some(v) => v.as_bool().ok_or_else(|| self.wrong_type(key, "#true or #false")),
		}
	}

	fn keyword<T>(
		&self,
		key: &'static str,
		expected: &'static str,
		parse: impl Fn(&str) -> Option<T>,
	) -> Result<Option<T>, MarkerError> {
		let Some(raw) = self.string(key)? else {
			return Ok(None);
		};
		parse(&raw).map(Some).ok_or_else(|| MarkerError::UnknownValue {
			what: self.what,
			name: self.name.clone(),
			key,
			value: raw,
			expected,
		})
	}

	fn capability(&self, raw: &str) -> Result<CapabilityRef, MarkerError> {
		CapabilityRef::parse(raw).map_err(|source| MarkerError::Capability {
			what: self.what,
			name: self.name.clone(),
			source,
		})
	}

	fn children(&self) -> &'a [KdlNode] {
		self.node.children().map(|c| c.nodes()).unwrap_or_default()
	}

	fn unexpected(&self, child: &KdlNode) -> MarkerError {
		MarkerError::UnexpectedChild {
			what: self.what,
			name: self.name.clone(),
			child: child.name().value().to_string(),
		}
	}

	/// Positional string arguments of a child node.
	fn child_strings(&self, child: &KdlNode) -> Result<Vec<String>, MarkerError> {
		child
			.entries()
			.iter()
			.filter(|e| e.name().is_none())
			.map(|e| {
				e.value()
					.as_string()
					.map(String::from)
					.ok_or_else(|| self.wrong_type(child.name().value(), "a list of strings"))
			})
			.collect()
	}
}

pub(crate) fn read_capability(node: &KdlNode, module: &str, lines: &LineIndex) -> Result<CapabilityDecl, MarkerError> {
	let reader = NodeReader::new(node, "capability")?;
	let mut extends = Vec::new();
	if let Some(raw) = reader.string("extends")? {
		extends.push(reader.capability(&raw)?);
	}
	for child in reader.children() {
		match child.name().value() {
			"extends" => {
				for raw in reader.child_strings(child)? {
					extends.push(reader.capability(&raw)?);
				}
			}
			_ => return Err(reader.unexpected(child)),
		}
	}
	Ok(CapabilityDecl {
		name: reader.name,
		extends,
		module: module.to_string(),
		location: lines.node_location(node),
	})
}

pub(crate) fn read_type(node: &KdlNode, module: &str, lines: &LineIndex) -> Result<TypeSymbol, MarkerError> {
	let reader = NodeReader::new(node, "type")?;
	let mut implements = Vec::new();
	let mut constructor = reader.bool("constructor", false)?;
	let mut factory = reader.string("factory")?;
	let mut generics = Vec::new();

	for child in reader.children() {
		match child.name().value() {
			"implements" => {
				for raw in reader.child_strings(child)? {
					implements.push(reader.capability(&raw)?);
				}
			}
			"constructor" => {
				constructor = match child.get(0) {
					None => true,
					Some(v) => v.as_bool().ok_or_else(|| reader.wrong_type("constructor", "#true or #false"))?,
				};
			}
			"factory" => {
				let hook = reader.child_strings(child)?.into_iter().next();
				factory = Some(hook.ok_or_else(|| reader.wrong_type("factory", "a hook name"))?);
			}
			"generics" => generics.extend(reader.child_strings(child)?),
			_ => return Err(reader.unexpected(child)),
		}
	}

	Ok(TypeSymbol {
		name: reader.name,
		implements,
		constructor,
		factory,
		generics,
		module: module.to_string(),
		location: lines.node_location(node),
	})
}

pub(crate) fn read_collection(
	node: &KdlNode,
	module: &str,
	lines: &LineIndex,
) -> Result<CollectionDefinition, MarkerError> {
	let reader = NodeReader::new(node, "collection")?;
	let capability = reader.capability(&reader.required_string("capability")?)?;
	let mode = reader
		.keyword("mode", "\"singleton\" or \"factory\"", GenerationMode::parse)?
		.unwrap_or_default();
	let storage = reader
		.keyword("storage", "\"dictionary\" or \"array\"", StorageMode::parse)?
		.unwrap_or_default();
	let case = reader
		.keyword("case", "\"sensitive\" or \"insensitive\"", CasePolicy::parse)?
		.unwrap_or_default();
	let service = reader.bool("service", false)?;

	let mut generics = Vec::new();
	let mut keys: Vec<SecondaryKeyDef> = Vec::new();
	for child in reader.children() {
		match child.name().value() {
			"generics" => generics.extend(reader.child_strings(child)?),
			"key" => {
				let key = read_key_def(child)?;
				if keys.iter().any(|k| k.name == key.name) {
					return Err(MarkerError::DuplicateKey {
						what: reader.what,
						name: reader.name.clone(),
						key: key.name,
					});
				}
				keys.push(key);
			}
			_ => return Err(reader.unexpected(child)),
		}
	}

	Ok(CollectionDefinition {
		name: reader.name,
		capability,
		generics,
		mode,
		storage,
		case,
		keys,
		service,
		module: module.to_string(),
		location: lines.node_location(node),
	})
}

fn read_key_def(node: &KdlNode) -> Result<SecondaryKeyDef, MarkerError> {
	let reader = NodeReader::new(node, "key")?;
	Ok(SecondaryKeyDef {
		unique: reader.bool("unique", false)?,
		required: reader.bool("required", false)?,
		case: reader
			.keyword("case", "\"sensitive\" or \"insensitive\"", CasePolicy::parse)?
			.unwrap_or(CasePolicy::Sensitive),
		name: reader.name,
	})
}

pub(crate) fn read_option(node: &KdlNode, module: &str, lines: &LineIndex) -> Result<OptionDeclaration, MarkerError> {
	let reader = NodeReader::new(node, "option")?;
	let collection = reader.required_string("collection")?;
	let id = reader.required_int("id")?;
	let implementation = reader.required_string("type")?;
	let description = reader.string("description")?;
	let mode = reader.keyword("mode", "\"singleton\" or \"factory\"", GenerationMode::parse)?;

	let mut keys: Vec<(String, String)> = Vec::new();
	for child in reader.children() {
		match child.name().value() {
			"key" => {
				let mut args = reader.child_strings(child)?.into_iter();
				let (Some(key), Some(value), None) = (args.next(), args.next(), args.next()) else {
					return Err(reader.wrong_type("key", "a key name followed by one value"));
				};
				if keys.iter().any(|(k, _)| *k == key) {
					return Err(MarkerError::DuplicateKey {
						what: reader.what,
						name: reader.name.clone(),
						key,
					});
				}
				keys.push((key, value));
			}
			_ => return Err(reader.unexpected(child)),
		}
	}

	Ok(OptionDeclaration {
		collection,
		id,
		name: reader.name,
		implementation,
		description,
		mode,
		keys,
		module: module.to_string(),
		location: lines.node_location(node),
	})
}
