use std::fmt;

use roster_spec::GenerationMode;
use rustc_hash::FxHashMap;

/// Builds one boxed implementation of the capability `C`.
pub type Construct<C> = fn() -> Box<C>;

/// How a binding is expected to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookKind {
	/// Called once at load time; the registry keeps the instance.
	Constructor,
	/// Called on every request.
	Factory,
}

impl HookKind {
	pub const fn for_mode(mode: GenerationMode) -> Self {
		match mode {
			GenerationMode::Singleton => Self::Constructor,
			GenerationMode::Factory => Self::Factory,
		}
	}
}

impl fmt::Display for HookKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Constructor => "constructor",
			Self::Factory => "factory",
		})
	}
}

pub struct Binding<C: ?Sized> {
	pub kind: HookKind,
	pub construct: Construct<C>,
}

impl<C: ?Sized> Clone for Binding<C> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<C: ?Sized> Copy for Binding<C> {}

/// Maps the hook names recorded in an artifact to Rust constructors.
///
/// Singleton entries are looked up by implementation type name, factory
/// entries by their declared factory hook.
pub struct Bindings<C: ?Sized> {
	hooks: FxHashMap<String, Binding<C>>,
}

impl<C: ?Sized> Default for Bindings<C> {
	fn default() -> Self {
		Self {
			hooks: FxHashMap::default(),
		}
	}
}

impl<C: ?Sized> Bindings<C> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds the no-argument constructor of implementation `ty`.
	pub fn constructor(mut self, ty: impl Into<String>, construct: Construct<C>) -> Self {
		self.hooks.insert(
			ty.into(),
			Binding {
				kind: HookKind::Constructor,
				construct,
			},
		);
		self
	}

	/// Binds the factory hook `hook`.
	pub fn factory(mut self, hook: impl Into<String>, construct: Construct<C>) -> Self {
		self.hooks.insert(
			hook.into(),
			Binding {
				kind: HookKind::Factory,
				construct,
			},
		);
		self
	}

	pub fn get(&self, hook: &str) -> Option<Binding<C>> {
		self.hooks.get(hook).copied()
	}

	pub fn len(&self) -> usize {
		self.hooks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.hooks.is_empty()
	}
}

impl<C: ?Sized> fmt::Debug for Bindings<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut hooks: Vec<_> = self.hooks.iter().map(|(name, b)| (name.as_str(), b.kind)).collect();
		hooks.sort_unstable();
		f.debug_struct("Bindings").field("hooks", &hooks).finish()
	}
}
