//! Registry synthesizer.
//!
//! Turns a validated, collision-free collection into its [`RegistryArtifact`].
//! The artifact carries no timestamps, paths or hash-ordered data, so equal
//! inputs encode to equal bytes.

use super::resolve::ResolvedEntry;
use crate::artifact::{ArtifactEntry, RegistryArtifact};
use crate::model::{CollectionDefinition, GenerationMode, TypeSymbol};

/// Builds the artifact for `def`. `entries` must already be in ascending id
/// order; `type_of` looks up implementation types by name.
pub(crate) fn synthesize<'a>(
	def: &CollectionDefinition,
	entries: &[ResolvedEntry],
	type_of: impl Fn(&str) -> Option<&'a TypeSymbol>,
) -> RegistryArtifact {
	let entries: Vec<ArtifactEntry> = entries
		.iter()
		.map(|entry| {
			let hook = match def.mode {
				GenerationMode::Singleton => entry.implementation.clone(),
				GenerationMode::Factory => type_of(&entry.implementation)
					.and_then(|ty| ty.factory.clone())
					.unwrap_or_else(|| entry.implementation.clone()),
			};
			ArtifactEntry {
				id: entry.id,
				name: entry.name.clone(),
				implementation: entry.implementation.clone(),
				hook,
				description: entry.description.clone(),
				module: entry.module.clone(),
				keys: def
					.keys
					.iter()
					.map(|key| entry.key_value(&key.name).map(String::from))
					.collect(),
			}
		})
		.collect();

	tracing::info!(
		collection = %def.name,
		mode = %def.mode,
		storage = def.storage.as_str(),
		entries = entries.len(),
		"synthesized registry"
	);

	RegistryArtifact {
		collection: def.name.clone(),
		capability: def.capability.to_string(),
		mode: def.mode,
		storage: def.storage,
		case: def.case,
		service: def.service,
		keys: def.keys.clone(),
		entries,
	}
}
