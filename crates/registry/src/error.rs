use std::fmt;

use roster_spec::ArtifactError;
use thiserror::Error;

use crate::bindings::HookKind;

/// The key a failed lookup used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
	Id(i64),
	Name(String),
	Secondary { key: String, value: String },
	/// The secondary key itself is not declared by the collection.
	UnknownKey(String),
}

impl fmt::Display for LookupKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Id(id) => write!(f, "id {id}"),
			Self::Name(name) => write!(f, "name '{name}'"),
			Self::Secondary { key, value } => write!(f, "{key} '{value}'"),
			Self::UnknownKey(key) => write!(f, "undeclared secondary key '{key}'"),
		}
	}
}

/// A lookup for an undeclared id, name or key value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("registry '{registry}' has no entry for {key}")]
pub struct LookupMiss {
	pub registry: String,
	pub key: LookupKey,
}

#[derive(Debug, Error)]
pub enum LoadError {
	#[error(transparent)]
	Artifact(#[from] ArtifactError),

	#[error("registry '{registry}' is corrupt: {reason}")]
	Corrupt { registry: String, reason: String },

	#[error("registry '{registry}': entry '{entry}' needs a binding for '{hook}'")]
	MissingBinding {
		registry: String,
		entry: String,
		hook: String,
	},

	#[error("registry '{registry}': entry '{entry}' expects a {expected} for '{hook}' but the binding is a {found}")]
	HookMismatch {
		registry: String,
		entry: String,
		hook: String,
		expected: HookKind,
		found: HookKind,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
	#[error("registry '{0}' is not a service registry")]
	NotServiceRegistry(String),
}
