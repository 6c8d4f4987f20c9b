use std::fmt;
use std::ops::Deref;

use crate::bindings::Construct;

pub(crate) enum Provider<C: ?Sized> {
	Singleton(Box<C>),
	Factory(Construct<C>),
}

/// One materialized registry entry.
pub struct Entry<C: ?Sized> {
	pub(crate) id: i64,
	pub(crate) name: String,
	pub(crate) implementation: String,
	pub(crate) description: Option<String>,
	pub(crate) module: String,
	pub(crate) keys: Vec<(String, String)>,
	pub(crate) provider: Provider<C>,
}

impl<C: ?Sized> Entry<C> {
	pub fn id(&self) -> i64 {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Implementation type name as declared in the markers.
	pub fn implementation(&self) -> &str {
		&self.implementation
	}

	pub fn description(&self) -> Option<&str> {
		self.description.as_deref()
	}

	/// Module that declared the option.
	pub fn module(&self) -> &str {
		&self.module
	}

	/// Value of secondary key `key`, if this entry sets it.
	pub fn key(&self, key: &str) -> Option<&str> {
		self.keys.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	pub fn is_singleton(&self) -> bool {
		matches!(self.provider, Provider::Singleton(_))
	}

	/// The shared instance of a singleton entry, or a fresh one from a factory
	/// entry.
	pub fn instance(&self) -> Instance<'_, C> {
		match &self.provider {
			Provider::Singleton(instance) => Instance::Shared(&**instance),
			Provider::Factory(construct) => Instance::Owned(construct()),
		}
	}

	/// The shared instance; `None` for factory entries.
	pub fn singleton(&self) -> Option<&C> {
		match &self.provider {
			Provider::Singleton(instance) => Some(&**instance),
			Provider::Factory(_) => None,
		}
	}

	/// A fresh instance; `None` for singleton entries.
	pub fn create(&self) -> Option<Box<C>> {
		match &self.provider {
			Provider::Singleton(_) => None,
			Provider::Factory(construct) => Some(construct()),
		}
	}
}

impl<C: ?Sized> PartialEq for Entry<C> {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
			&& self.name == other.name
			&& self.implementation == other.implementation
			&& self.module == other.module
	}
}

impl<C: ?Sized> Eq for Entry<C> {}

impl<C: ?Sized> fmt::Debug for Entry<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Entry")
			.field("id", &self.id)
			.field("name", &self.name)
			.field("implementation", &self.implementation)
			.field("module", &self.module)
			.field("singleton", &self.is_singleton())
			.finish_non_exhaustive()
	}
}

/// An instance handed out by [`Entry::instance`].
pub enum Instance<'a, C: ?Sized> {
	Shared(&'a C),
	Owned(Box<C>),
}

impl<C: ?Sized> Deref for Instance<'_, C> {
	type Target = C;

	fn deref(&self) -> &C {
		match self {
			Self::Shared(instance) => *instance,
			Self::Owned(instance) => &**instance,
		}
	}
}
