//! Identity resolver.
//!
//! Ids and names are author-supplied and must stay stable across builds, so
//! this stage only *detects* collisions; it never renumbers or picks a winner.
//!
//! # Invariants
//!
//! - No two resolved entries share an id.
//!   - Tested by: `tests::shared_id_is_a_collision`
//! - No two resolved entries share a name under the collection's case policy.
//!   - Tested by: `tests::case_only_name_difference_collides_when_insensitive`
//! - Values of `unique` secondary keys are unique under the key's case policy.
//!   - Tested by: `tests::unique_secondary_key_collides`
//! - Reports are identical for any input order.
//!   - Enforced in: [`resolve`] (sort by [`OptionDeclaration::sort_key`] first).
//!   - Tested by: `tests::collision_report_ignores_input_order`

use std::collections::BTreeMap;
use std::fmt;

use crate::diagnostic::{Diagnostic, IssueKind};
use crate::model::{CollectionDefinition, OptionDeclaration, SourceLocation};

/// The kind of lookup key two declarations fought over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
	Id,
	Name,
	SecondaryKey(String),
}

impl fmt::Display for KeyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Id => write!(f, "id"),
			Self::Name => write!(f, "name"),
			Self::SecondaryKey(key) => write!(f, "secondary key '{key}'"),
		}
	}
}

/// One declaration taking part in a collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
	pub module: String,
	pub option: String,
	pub location: SourceLocation,
}

impl Party {
	fn of(option: &OptionDeclaration) -> Self {
		Self {
			module: option.module.clone(),
			option: option.name.clone(),
			location: option.location.clone(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
	pub collection: String,
	pub kind: KeyKind,
	/// The conflicting key as written by the first party.
	pub key: String,
	/// Participants in canonical order.
	pub parties: Vec<Party>,
}

impl Collision {
	pub fn to_diagnostic(&self) -> Diagnostic {
		let first = &self.parties[0];
		let who = self
			.parties
			.iter()
			.map(|p| format!("'{}' (module {})", p.option, p.module))
			.collect::<Vec<_>>()
			.join(", ");
		Diagnostic::error(
			IssueKind::IdentityCollision,
			first.module.clone(),
			format!(
				"{} {} is declared by {} options in collection '{}': {who}",
				self.kind,
				quote_key(&self.kind, &self.key),
				self.parties.len(),
				self.collection
			),
		)
		.in_collection(self.collection.clone())
		.for_declaration(first.option.clone())
		.at(first.location.clone())
		.with_related(self.parties[1..].iter().map(|p| p.location.clone()))
	}
}

fn quote_key(kind: &KeyKind, key: &str) -> String {
	match kind {
		KeyKind::Id => key.to_string(),
		_ => format!("'{key}'"),
	}
}

/// An option proven free of collisions and constraint violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry(pub OptionDeclaration);

impl std::ops::Deref for ResolvedEntry {
	type Target = OptionDeclaration;

	fn deref(&self) -> &OptionDeclaration {
		&self.0
	}
}

#[derive(Debug, Default)]
pub(crate) struct Resolution {
	/// Entries in ascending id order; empty when any collision was found.
	pub entries: Vec<ResolvedEntry>,
	pub collisions: Vec<Collision>,
}

/// Detects collisions among the options of one collection.
pub(crate) fn resolve(def: &CollectionDefinition, mut options: Vec<OptionDeclaration>) -> Resolution {
	options.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

	let mut collisions = Vec::new();

	let mut by_id: BTreeMap<i64, Vec<&OptionDeclaration>> = BTreeMap::new();
	let mut by_name: BTreeMap<String, Vec<&OptionDeclaration>> = BTreeMap::new();
	for option in &options {
		by_id.entry(option.id).or_default().push(option);
		by_name
			.entry(def.case.fold(&option.name).into_owned())
			.or_default()
			.push(option);
	}
	collect(def, KeyKind::Id, by_id.into_values(), |o| o.id.to_string(), &mut collisions);
	collect(def, KeyKind::Name, by_name.into_values(), |o| o.name.clone(), &mut collisions);

	for key in def.keys.iter().filter(|k| k.unique) {
		let mut by_value: BTreeMap<String, Vec<&OptionDeclaration>> = BTreeMap::new();
		for option in &options {
			if let Some(value) = option.key_value(&key.name) {
				by_value.entry(key.case.fold(value).into_owned()).or_default().push(option);
			}
		}
		collect(
			def,
			KeyKind::SecondaryKey(key.name.clone()),
			by_value.into_values(),
			|o| o.key_value(&key.name).unwrap_or_default().to_string(),
			&mut collisions,
		);
	}

	if !collisions.is_empty() {
		return Resolution {
			entries: Vec::new(),
			collisions,
		};
	}

	options.sort_by_key(|o| o.id);
	Resolution {
		entries: options.into_iter().map(ResolvedEntry).collect(),
		collisions,
	}
}

fn collect<'a>(
	def: &CollectionDefinition,
	kind: KeyKind,
	groups: impl Iterator<Item = Vec<&'a OptionDeclaration>>,
	key_of: impl Fn(&OptionDeclaration) -> String,
	out: &mut Vec<Collision>,
) {
	for group in groups.filter(|g| g.len() > 1) {
		out.push(Collision {
			collection: def.name.clone(),
			kind: kind.clone(),
			key: key_of(group[0]),
			parties: group.into_iter().map(Party::of).collect(),
		});
	}
}

#[cfg(test)]
mod tests;
