//! Immutable registry with O(1) keyed lookup.
//!
//! # Invariants
//!
//! - Entries are stored in ascending id order and [`Registry::all`] yields
//!   each one exactly once.
//!   - Enforced in: [`Registry::from_artifact`] (rejects unordered or duplicate ids).
//!   - Tested by: `tests::all_is_ascending_and_restartable`
//! - Name lookups honor the collection's case policy.
//!   - Tested by: `tests::name_lookup_follows_case_policy`
//! - Loading either binds every entry or fails.
//!   - Tested by: `tests::missing_binding_fails_the_whole_load`

use std::slice;

use roster_spec::artifact::MAX_ARRAY_ID;
use roster_spec::{CasePolicy, GenerationMode, RegistryArtifact, SecondaryKeyDef, StorageMode};
use rustc_hash::FxHashMap;

use crate::bindings::{Bindings, HookKind};
use crate::entry::{Entry, Provider};
use crate::error::{LoadError, LookupKey, LookupMiss};

enum IdIndex {
	Map(FxHashMap<i64, usize>),
	/// Slot `id` holds the entry index for that id.
	Slots(Vec<Option<usize>>),
}

impl IdIndex {
	fn get(&self, id: i64) -> Option<usize> {
		match self {
			Self::Map(map) => map.get(&id).copied(),
			Self::Slots(slots) => usize::try_from(id).ok().and_then(|i| slots.get(i).copied().flatten()),
		}
	}
}

struct KeyIndex {
	def: SecondaryKeyDef,
	/// Folded value -> entry indices in ascending id order.
	values: FxHashMap<String, Vec<usize>>,
}

/// A generated registry for the capability `C` (usually `dyn Trait`).
pub struct Registry<C: ?Sized> {
	label: String,
	capability: String,
	mode: GenerationMode,
	storage: StorageMode,
	case: CasePolicy,
	service: bool,
	entries: Vec<Entry<C>>,
	ids: IdIndex,
	names: FxHashMap<String, usize>,
	keys: Vec<KeyIndex>,
}

impl<C: ?Sized> Registry<C> {
	/// Decodes an artifact blob and binds it.
	pub fn load(blob: &[u8], bindings: &Bindings<C>) -> Result<Self, LoadError> {
		Self::from_artifact(RegistryArtifact::decode(blob)?, bindings)
	}

	/// Binds every entry of `artifact` and builds the lookup indices.
	///
	/// Singleton constructors run here, once per entry.
	pub fn from_artifact(artifact: RegistryArtifact, bindings: &Bindings<C>) -> Result<Self, LoadError> {
		let label = artifact.collection;
		let corrupt = |reason: String| LoadError::Corrupt {
			registry: label.clone(),
			reason,
		};

		if artifact.entries.windows(2).any(|w| w[0].id >= w[1].id) {
			return Err(corrupt("entry ids are not strictly ascending".into()));
		}
		if let Some(entry) = artifact.entries.iter().find(|e| e.keys.len() != artifact.keys.len()) {
			return Err(corrupt(format!("entry '{}' has misaligned secondary keys", entry.name)));
		}

		let expected = HookKind::for_mode(artifact.mode);
		let mut bound = Vec::with_capacity(artifact.entries.len());
		for entry in &artifact.entries {
			let binding = bindings.get(&entry.hook).ok_or_else(|| LoadError::MissingBinding {
				registry: label.clone(),
				entry: entry.name.clone(),
				hook: entry.hook.clone(),
			})?;
			if binding.kind != expected {
				return Err(LoadError::HookMismatch {
					registry: label.clone(),
					entry: entry.name.clone(),
					hook: entry.hook.clone(),
					expected,
					found: binding.kind,
				});
			}
			bound.push(binding.construct);
		}

		let ids = match artifact.storage {
			StorageMode::Dictionary => {
				IdIndex::Map(artifact.entries.iter().enumerate().map(|(idx, e)| (e.id, idx)).collect())
			}
			StorageMode::Array => {
				let span = match artifact.entries.last() {
					None => 0,
					Some(last) if last.id > MAX_ARRAY_ID => {
						return Err(corrupt(format!(
							"id {} exceeds the array registry limit of {MAX_ARRAY_ID}",
							last.id
						)));
					}
					Some(last) => usize::try_from(last.id)
						.ok()
						.and_then(|max| max.checked_add(1))
						.ok_or_else(|| corrupt(format!("id {} cannot index an array registry", last.id)))?,
				};
				if let Some(first) = artifact.entries.first()
					&& first.id < 0
				{
					return Err(corrupt(format!("id {} cannot index an array registry", first.id)));
				}
				let mut slots = vec![None; span];
				for (idx, entry) in artifact.entries.iter().enumerate() {
					slots[entry.id as usize] = Some(idx);
				}
				IdIndex::Slots(slots)
			}
		};

		let mut names = FxHashMap::default();
		for (idx, entry) in artifact.entries.iter().enumerate() {
			if names.insert(artifact.case.fold(&entry.name).into_owned(), idx).is_some() {
				return Err(corrupt(format!("name '{}' appears more than once", entry.name)));
			}
		}

		let mut keys: Vec<KeyIndex> = artifact
			.keys
			.iter()
			.map(|def| KeyIndex {
				def: def.clone(),
				values: FxHashMap::default(),
			})
			.collect();
		for (idx, entry) in artifact.entries.iter().enumerate() {
			for (index, value) in keys.iter_mut().zip(&entry.keys) {
				if let Some(value) = value {
					index
						.values
						.entry(index.def.case.fold(value).into_owned())
						.or_default()
						.push(idx);
				}
			}
		}
		if let Some(index) = keys.iter().find(|k| k.def.unique && k.values.values().any(|v| v.len() > 1)) {
			return Err(corrupt(format!("unique key '{}' has repeated values", index.def.name)));
		}

		let key_names: Vec<String> = artifact.keys.iter().map(|k| k.name.clone()).collect();
		let entries: Vec<Entry<C>> = artifact
			.entries
			.into_iter()
			.zip(bound)
			.map(|(entry, construct)| Entry {
				id: entry.id,
				name: entry.name,
				implementation: entry.implementation,
				description: entry.description,
				module: entry.module,
				keys: key_names
					.iter()
					.zip(entry.keys)
					.filter_map(|(key, value)| Some((key.clone(), value?)))
					.collect(),
				provider: match artifact.mode {
					GenerationMode::Singleton => Provider::Singleton(construct()),
					GenerationMode::Factory => Provider::Factory(construct),
				},
			})
			.collect();

		tracing::debug!(
			registry = %label,
			mode = %artifact.mode,
			entries = entries.len(),
			"loaded registry"
		);

		Ok(Self {
			label,
			capability: artifact.capability,
			mode: artifact.mode,
			storage: artifact.storage,
			case: artifact.case,
			service: artifact.service,
			entries,
			ids,
			names,
			keys,
		})
	}

	/// Collection name.
	pub fn label(&self) -> &str {
		&self.label
	}

	/// Base capability as declared, e.g. `Exporter<Event>`.
	pub fn capability(&self) -> &str {
		&self.capability
	}

	pub fn mode(&self) -> GenerationMode {
		self.mode
	}

	pub fn storage(&self) -> StorageMode {
		self.storage
	}

	pub fn case_policy(&self) -> CasePolicy {
		self.case
	}

	pub fn is_service(&self) -> bool {
		self.service
	}

	fn miss(&self, key: LookupKey) -> LookupMiss {
		LookupMiss {
			registry: self.label.clone(),
			key,
		}
	}

	pub fn try_get_by_id(&self, id: i64) -> Option<&Entry<C>> {
		self.ids.get(id).map(|idx| &self.entries[idx])
	}

	pub fn get_by_id(&self, id: i64) -> Result<&Entry<C>, LookupMiss> {
		self.try_get_by_id(id).ok_or_else(|| self.miss(LookupKey::Id(id)))
	}

	pub fn try_get_by_name(&self, name: &str) -> Option<&Entry<C>> {
		self.names
			.get(&*self.case.fold(name))
			.map(|&idx| &self.entries[idx])
	}

	pub fn get_by_name(&self, name: &str) -> Result<&Entry<C>, LookupMiss> {
		self.try_get_by_name(name)
			.ok_or_else(|| self.miss(LookupKey::Name(name.to_string())))
	}

	/// Every entry in ascending id order.
	pub fn all(&self) -> slice::Iter<'_, Entry<C>> {
		self.entries.iter()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Names of the declared secondary keys.
	pub fn key_names(&self) -> impl Iterator<Item = &str> + '_ {
		self.keys.iter().map(|k| k.def.name.as_str())
	}

	/// Lookup view over secondary key `key`.
	pub fn key(&self, key: &str) -> Result<KeyLookup<'_, C>, LookupMiss> {
		self.keys
			.iter()
			.find(|k| k.def.name == key)
			.map(|index| KeyLookup { registry: self, index })
			.ok_or_else(|| self.miss(LookupKey::UnknownKey(key.to_string())))
	}

	pub fn get_by_key(&self, key: &str, value: &str) -> Result<&Entry<C>, LookupMiss> {
		self.key(key)?.get(value)
	}

	pub fn try_get_by_key(&self, key: &str, value: &str) -> Option<&Entry<C>> {
		self.key(key).ok()?.try_get(value)
	}
}

impl<'a, C: ?Sized> IntoIterator for &'a Registry<C> {
	type Item = &'a Entry<C>;
	type IntoIter = slice::Iter<'a, Entry<C>>;

	fn into_iter(self) -> Self::IntoIter {
		self.all()
	}
}

impl<C: ?Sized> std::fmt::Debug for Registry<C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Registry")
			.field("label", &self.label)
			.field("mode", &self.mode)
			.field("storage", &self.storage)
			.field("entries", &self.entries)
			.finish_non_exhaustive()
	}
}

/// Lookups through one declared secondary key.
pub struct KeyLookup<'a, C: ?Sized> {
	registry: &'a Registry<C>,
	index: &'a KeyIndex,
}

impl<'a, C: ?Sized> KeyLookup<'a, C> {
	pub fn name(&self) -> &'a str {
		&self.index.def.name
	}

	pub fn is_unique(&self) -> bool {
		self.index.def.unique
	}

	fn indices(&self, value: &str) -> &'a [usize] {
		self.index
			.values
			.get(&*self.index.def.case.fold(value))
			.map(Vec::as_slice)
			.unwrap_or_default()
	}

	/// The lowest-id entry with `value`.
	pub fn try_get(&self, value: &str) -> Option<&'a Entry<C>> {
		let registry = self.registry;
		self.indices(value).first().map(|&idx| &registry.entries[idx])
	}

	pub fn get(&self, value: &str) -> Result<&'a Entry<C>, LookupMiss> {
		self.try_get(value).ok_or_else(|| {
			self.registry.miss(LookupKey::Secondary {
				key: self.index.def.name.clone(),
				value: value.to_string(),
			})
		})
	}

	/// Every entry with `value`, in ascending id order.
	pub fn get_all(&self, value: &str) -> impl Iterator<Item = &'a Entry<C>> + 'a {
		let registry = self.registry;
		self.indices(value).iter().map(move |&idx| &registry.entries[idx])
	}
}
