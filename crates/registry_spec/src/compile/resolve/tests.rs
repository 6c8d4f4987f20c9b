use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::diagnostic::Severity;
use crate::model::{CapabilityRef, CasePolicy, GenerationMode, SecondaryKeyDef, StorageMode};

fn collection(case: CasePolicy) -> CollectionDefinition {
	CollectionDefinition {
		name: "Priority".into(),
		capability: CapabilityRef::plain("PriorityLevel"),
		generics: Vec::new(),
		mode: GenerationMode::Singleton,
		storage: StorageMode::Dictionary,
		case,
		keys: vec![
			SecondaryKeyDef {
				name: "code".into(),
				unique: true,
				required: false,
				case: CasePolicy::Insensitive,
			},
			SecondaryKeyDef {
				name: "group".into(),
				unique: false,
				required: false,
				case: CasePolicy::Sensitive,
			},
		],
		service: false,
		module: "core".into(),
		location: SourceLocation::new("core.kdl", 1, 1),
	}
}

fn option(module: &str, id: i64, name: &str, line: u32) -> OptionDeclaration {
	OptionDeclaration {
		collection: "Priority".into(),
		id,
		name: name.into(),
		implementation: format!("{name}Priority"),
		description: None,
		mode: None,
		keys: Vec::new(),
		module: module.into(),
		location: SourceLocation::new(format!("{module}.kdl"), line, 1),
	}
}

fn keyed(mut option: OptionDeclaration, key: &str, value: &str) -> OptionDeclaration {
	option.keys.push((key.into(), value.into()));
	option
}

#[test]
fn distinct_options_resolve_in_id_order() {
	let resolution = resolve(
		&collection(CasePolicy::Insensitive),
		vec![option("core", 7, "Low", 3), option("core", -2, "Idle", 4), option("app", 1, "High", 2)],
	);
	assert!(resolution.collisions.is_empty());
	let ids: Vec<_> = resolution.entries.iter().map(|e| e.id).collect();
	assert_eq!(ids, [-2, 1, 7]);
}

#[test]
fn shared_id_is_a_collision() {
	let resolution = resolve(
		&collection(CasePolicy::Insensitive),
		vec![option("b", 5, "Beta", 2), option("a", 5, "Alpha", 9)],
	);

	assert!(resolution.entries.is_empty());
	assert_eq!(
		resolution.collisions,
		vec![Collision {
			collection: "Priority".into(),
			kind: KeyKind::Id,
			key: "5".into(),
			parties: vec![
				Party {
					module: "a".into(),
					option: "Alpha".into(),
					location: SourceLocation::new("a.kdl", 9, 1),
				},
				Party {
					module: "b".into(),
					option: "Beta".into(),
					location: SourceLocation::new("b.kdl", 2, 1),
				},
			],
		}]
	);

	let diag = resolution.collisions[0].to_diagnostic();
	assert_eq!(diag.severity, Severity::Error);
	assert_eq!(diag.kind, IssueKind::IdentityCollision);
	assert_eq!(diag.module, "a");
	assert_eq!(diag.declaration.as_deref(), Some("Alpha"));
	assert_eq!(diag.related, vec![SourceLocation::new("b.kdl", 2, 1)]);
	assert_eq!(
		diag.message,
		"id 5 is declared by 2 options in collection 'Priority': 'Alpha' (module a), 'Beta' (module b)"
	);
}

#[test]
fn case_only_name_difference_collides_when_insensitive() {
	let options = vec![option("core", 1, "High", 1), option("core", 2, "high", 2)];

	let insensitive = resolve(&collection(CasePolicy::Insensitive), options.clone());
	assert_eq!(insensitive.collisions.len(), 1);
	assert_eq!(insensitive.collisions[0].kind, KeyKind::Name);

	let sensitive = resolve(&collection(CasePolicy::Sensitive), options);
	assert!(sensitive.collisions.is_empty());
	assert_eq!(sensitive.entries.len(), 2);
}

#[test]
fn titlecase_only_name_difference_collides_when_insensitive() {
	let options = vec![option("core", 1, "\u{01C5}ab", 1), option("core", 2, "\u{01C6}ab", 2)];

	let insensitive = resolve(&collection(CasePolicy::Insensitive), options.clone());
	assert_eq!(insensitive.collisions.len(), 1);
	assert_eq!(insensitive.collisions[0].kind, KeyKind::Name);
	assert!(insensitive.entries.is_empty());

	let sensitive = resolve(&collection(CasePolicy::Sensitive), options);
	assert!(sensitive.collisions.is_empty());
}

#[test]
fn unique_secondary_key_collides() {
	let resolution = resolve(
		&collection(CasePolicy::Insensitive),
		vec![
			keyed(option("core", 1, "High", 1), "code", "H"),
			keyed(option("core", 2, "Higher", 2), "code", "h"),
			keyed(option("core", 3, "Low", 3), "group", "g"),
			keyed(option("core", 4, "Lower", 4), "group", "g"),
		],
	);
	assert_eq!(resolution.collisions.len(), 1);
	assert_eq!(resolution.collisions[0].kind, KeyKind::SecondaryKey("code".into()));
	assert_eq!(resolution.collisions[0].key, "H");
}

#[test]
fn one_declaration_can_take_part_in_several_collisions() {
	let resolution = resolve(
		&collection(CasePolicy::Insensitive),
		vec![option("core", 1, "High", 1), option("core", 1, "HIGH", 2)],
	);
	let kinds: Vec<_> = resolution.collisions.iter().map(|c| c.kind.clone()).collect();
	assert_eq!(kinds, [KeyKind::Id, KeyKind::Name]);
}

#[test]
fn collision_report_ignores_input_order() {
	let forward = vec![
		option("a", 5, "Alpha", 1),
		option("b", 5, "Beta", 1),
		option("c", 5, "Gamma", 1),
	];
	let mut backward = forward.clone();
	backward.reverse();

	let def = collection(CasePolicy::Insensitive);
	assert_eq!(resolve(&def, forward).collisions, resolve(&def, backward).collisions);
}

proptest! {
	#[test]
	fn resolution_is_order_independent(
		ids in proptest::collection::vec(0i64..8, 1..8),
		seed in any::<u64>(),
	) {
		let options: Vec<_> = ids
			.iter()
			.enumerate()
			.map(|(idx, id)| option(&format!("m{}", idx % 3), *id, &format!("Opt{idx}"), idx as u32 + 1))
			.collect();
		let mut shuffled = options.clone();
		let len = shuffled.len();
		shuffled.rotate_left((seed as usize) % len);
		shuffled.reverse();

		let def = collection(CasePolicy::Insensitive);
		let a = resolve(&def, options);
		let b = resolve(&def, shuffled);
		prop_assert_eq!(&a.collisions, &b.collisions);
		prop_assert_eq!(&a.entries, &b.entries);

		let mut unique = ids.clone();
		unique.sort_unstable();
		unique.dedup();
		prop_assert_eq!(a.collisions.is_empty(), unique.len() == ids.len());
	}
}
