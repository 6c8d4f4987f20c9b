//! Constraint validator.
//!
//! Checks every option against the structural contract of its collection:
//!
//! - the implementation provides the base capability, directly or through a
//!   capability that (transitively) `extends` it;
//! - the implementation exposes the hook the generation mode needs;
//! - generic arguments are compatible with the collection's capability;
//! - secondary keys, storage bounds and mode declarations line up.
//!
//! Errors mark the owning collection as blocked. Nothing here removes options:
//! the resolver still sees every scanned option so collisions are reported in
//! the same run.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use super::config::PipelineConfig;
use super::scan::ScanOutput;
use crate::diagnostic::{Diagnostic, IssueKind, Severity};
use crate::model::{
	CapabilityDecl, CapabilityRef, CollectionDefinition, GenerationMode, OptionDeclaration, StorageMode, TypeSymbol,
};

/// Validation result for one collection.
#[derive(Debug, Clone)]
pub(crate) struct CollectionPlan {
	pub definition: CollectionDefinition,
	pub options: Vec<OptionDeclaration>,
	pub blocked: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Validation {
	/// Plans sorted by collection name.
	pub plans: Vec<CollectionPlan>,
	pub diagnostics: Vec<Diagnostic>,
}

enum Lookup<'a, T> {
	Found(&'a T),
	Ambiguous,
	Missing,
}

/// Name tables for capabilities and implementation types in the closure.
struct Symbols<'a> {
	capabilities: FxHashMap<&'a str, Vec<&'a CapabilityDecl>>,
	types: FxHashMap<&'a str, Vec<&'a TypeSymbol>>,
}

impl<'a> Symbols<'a> {
	fn new(scan: &'a ScanOutput) -> Self {
		let mut capabilities: FxHashMap<&str, Vec<&CapabilityDecl>> = FxHashMap::default();
		for cap in &scan.capabilities {
			capabilities.entry(cap.name.as_str()).or_default().push(cap);
		}
		let mut types: FxHashMap<&str, Vec<&TypeSymbol>> = FxHashMap::default();
		for ty in &scan.types {
			types.entry(ty.name.as_str()).or_default().push(ty);
		}
		Self { capabilities, types }
	}

	fn capability(&self, name: &str) -> Lookup<'a, CapabilityDecl> {
		lookup(self.capabilities.get(name))
	}

	fn type_symbol(&self, name: &str) -> Lookup<'a, TypeSymbol> {
		lookup(self.types.get(name))
	}

	/// Reports capability and type names declared more than once.
	fn duplicate_diagnostics(&self) -> Vec<Diagnostic> {
		let mut out = Vec::new();
		for decls in self.capabilities.values().filter(|d| d.len() > 1) {
			let first = decls[0];
			out.push(
				Diagnostic::error(
					IssueKind::ScanIssue,
					first.module.clone(),
					format!(
						"capability '{}' is declared {} times; references to it are ambiguous",
						first.name,
						decls.len()
					),
				)
				.for_declaration(first.name.clone())
				.at(first.location.clone())
				.with_related(decls[1..].iter().map(|d| d.location.clone())),
			);
		}
		for decls in self.types.values().filter(|d| d.len() > 1) {
			let first = decls[0];
			out.push(
				Diagnostic::error(
					IssueKind::ScanIssue,
					first.module.clone(),
					format!(
						"type '{}' is declared {} times; references to it are ambiguous",
						first.name,
						decls.len()
					),
				)
				.for_declaration(first.name.clone())
				.at(first.location.clone())
				.with_related(decls[1..].iter().map(|d| d.location.clone())),
			);
		}
		out
	}

	/// Every capability `ty` provides: its direct implementations plus the
	/// transitive `extends` closure of each.
	fn provided(&self, ty: &'a TypeSymbol) -> Vec<&'a CapabilityRef> {
		let mut out = Vec::new();
		let mut seen: FxHashSet<String> = FxHashSet::default();
		let mut queue: VecDeque<&CapabilityRef> = ty.implements.iter().collect();

		while let Some(cap) = queue.pop_front() {
			if !seen.insert(cap.to_string()) {
				continue;
			}
			out.push(cap);
			if let Lookup::Found(decl) = self.capability(&cap.name) {
				queue.extend(decl.extends.iter());
			}
		}
		out
	}

	fn satisfies(&self, ty: &'a TypeSymbol, required: &CapabilityRef, open: &[String]) -> Result<(), String> {
		let candidates: Vec<_> = self
			.provided(ty)
			.into_iter()
			.filter(|c| c.name == required.name)
			.collect();

		let Some(first) = candidates.first() else {
			return Err(format!(
				"implementation '{}' does not provide capability '{required}'",
				ty.name
			));
		};

		let mut reason = None;
		for candidate in &candidates {
			match generic_compat(candidate, required, open) {
				Ok(()) => return Ok(()),
				Err(e) => {
					reason.get_or_insert(e);
				}
			}
		}
		Err(format!(
			"implementation '{}' provides '{first}' which is incompatible with '{required}': {}",
			ty.name,
			reason.unwrap_or_default()
		))
	}
}

fn lookup<'a, T>(decls: Option<&Vec<&'a T>>) -> Lookup<'a, T> {
	match decls.map(Vec::as_slice) {
		Some([one]) => Lookup::Found(*one),
		Some([]) | None => Lookup::Missing,
		Some(_) => Lookup::Ambiguous,
	}
}

/// Checks generic arguments of a provided capability against the required
/// one. Arguments naming one of the collection's open type parameters accept
/// anything; concrete arguments must match exactly.
fn generic_compat(provided: &CapabilityRef, required: &CapabilityRef, open: &[String]) -> Result<(), String> {
	if provided.args.len() != required.args.len() {
		return Err(format!(
			"expected {} generic argument(s), found {}",
			required.args.len(),
			provided.args.len()
		));
	}
	for (idx, (have, want)) in provided.args.iter().zip(&required.args).enumerate() {
		if open.contains(want) || have == want {
			continue;
		}
		return Err(format!("generic argument {} is '{have}', expected '{want}'", idx + 1));
	}
	Ok(())
}

pub(crate) fn validate(scan: &ScanOutput, config: &PipelineConfig) -> Validation {
	let symbols = Symbols::new(scan);
	let mut diagnostics = symbols.duplicate_diagnostics();

	let mut by_name: FxHashMap<&str, Vec<&CollectionDefinition>> = FxHashMap::default();
	for def in &scan.collections {
		by_name.entry(def.name.as_str()).or_default().push(def);
	}

	let mut plans: FxHashMap<&str, CollectionPlan> = FxHashMap::default();
	for (name, defs) in &by_name {
		if let [def] = defs.as_slice() {
			let issues = check_collection(def, &symbols);
			let blocked = issues.iter().any(Diagnostic::blocks_collection);
			diagnostics.extend(issues);
			plans.insert(
				*name,
				CollectionPlan {
					definition: (*def).clone(),
					options: Vec::new(),
					blocked,
				},
			);
			continue;
		}

		let mut sorted = defs.clone();
		sorted.sort_by(|a, b| (&a.module, &a.location).cmp(&(&b.module, &b.location)));
		let first = sorted[0];
		diagnostics.push(
			Diagnostic::error(
				IssueKind::IdentityCollision,
				first.module.clone(),
				format!(
					"collection '{name}' is declared {} times (modules: {})",
					sorted.len(),
					sorted.iter().map(|d| d.module.as_str()).collect::<Vec<_>>().join(", ")
				),
			)
			.in_collection(*name)
			.at(first.location.clone())
			.with_related(sorted[1..].iter().map(|d| d.location.clone())),
		);
	}

	for option in &scan.options {
		let Some(plan) = plans.get_mut(option.collection.as_str()) else {
			if !by_name.contains_key(option.collection.as_str()) {
				diagnostics.push(
					Diagnostic::error(
						IssueKind::ConstraintViolation,
						option.module.clone(),
						format!(
							"option '{}' targets collection '{}' which is not declared in the reference closure",
							option.name, option.collection
						),
					)
					.in_collection(option.collection.clone())
					.for_declaration(option.name.clone())
					.at(option.location.clone()),
				);
			}
			continue;
		};

		let issues = check_option(&plan.definition, option, &symbols, config);
		plan.blocked |= issues.iter().any(Diagnostic::blocks_collection);
		diagnostics.extend(issues);
		plan.options.push(option.clone());
	}

	let mut plans: Vec<CollectionPlan> = plans.into_values().collect();
	plans.sort_by(|a, b| a.definition.name.cmp(&b.definition.name));
	Validation { plans, diagnostics }
}

fn check_collection(def: &CollectionDefinition, symbols: &Symbols<'_>) -> Vec<Diagnostic> {
	let mut out = Vec::new();
	let error = |message: String| {
		Diagnostic::error(IssueKind::ConstraintViolation, def.module.clone(), message)
			.in_collection(def.name.clone())
			.for_declaration(def.name.clone())
			.at(def.location.clone())
	};

	match symbols.capability(&def.capability.name) {
		Lookup::Found(_) => {}
		Lookup::Missing => out.push(error(format!(
			"collection '{}' requires capability '{}' which is not declared in the reference closure",
			def.name, def.capability.name
		))),
		Lookup::Ambiguous => out.push(error(format!(
			"collection '{}' requires capability '{}' which is declared more than once",
			def.name, def.capability.name
		))),
	}

	let mut seen = FxHashSet::default();
	for param in &def.generics {
		if !seen.insert(param.as_str()) {
			out.push(error(format!(
				"collection '{}' declares type parameter '{param}' more than once",
				def.name
			)));
		} else if !def.capability.args.contains(param) {
			out.push(
				Diagnostic::warning(
					IssueKind::ConstraintViolation,
					def.module.clone(),
					format!(
						"type parameter '{param}' of collection '{}' is not used by capability '{}'",
						def.name, def.capability
					),
				)
				.in_collection(def.name.clone())
				.at(def.location.clone()),
			);
		}
	}

	out
}

fn check_option(
	def: &CollectionDefinition,
	option: &OptionDeclaration,
	symbols: &Symbols<'_>,
	config: &PipelineConfig,
) -> Vec<Diagnostic> {
	let mut out = Vec::new();
	let issue = |severity: Severity, message: String| {
		Diagnostic::new(severity, IssueKind::ConstraintViolation, option.module.clone(), message)
			.in_collection(def.name.clone())
			.for_declaration(option.name.clone())
			.at(option.location.clone())
	};

	if let Some(mode) = option.mode
		&& mode != def.mode
	{
		out.push(issue(
			Severity::Error,
			format!(
				"option '{}' declares generation mode '{mode}' but collection '{}' is '{}'; modes cannot be mixed",
				option.name, def.name, def.mode
			),
		));
	}

	match symbols.type_symbol(&option.implementation) {
		Lookup::Missing => out.push(issue(
			Severity::Error,
			format!(
				"option '{}' uses implementation '{}' which is not declared in the reference closure",
				option.name, option.implementation
			),
		)),
		Lookup::Ambiguous => out.push(issue(
			Severity::Error,
			format!(
				"option '{}' uses implementation '{}' which is declared more than once",
				option.name, option.implementation
			),
		)),
		Lookup::Found(ty) => {
			if let Err(reason) = symbols.satisfies(ty, &def.capability, &def.generics) {
				out.push(issue(Severity::Error, reason));
			}

			let has_hook = match def.mode {
				GenerationMode::Singleton => ty.constructor,
				GenerationMode::Factory => ty.factory.is_some(),
			};
			if !has_hook {
				out.push(issue(
					Severity::Error,
					format!(
						"implementation '{}' has no {} required by {} collection '{}'",
						ty.name,
						def.mode.hook(),
						def.mode,
						def.name
					),
				));
			}

			if !ty.generics.is_empty() {
				out.push(issue(
					Severity::Error,
					format!(
						"implementation '{}' has unbound type parameter(s) <{}> and cannot be constructed",
						ty.name,
						ty.generics.join(", ")
					),
				));
			}
		}
	}

	for (key, _) in &option.keys {
		if def.key(key).is_none() {
			out.push(issue(
				Severity::Error,
				format!(
					"option '{}' sets secondary key '{key}' which collection '{}' does not declare",
					option.name, def.name
				),
			));
		}
	}
	for key in def.keys.iter().filter(|k| k.required) {
		if option.key_value(&key.name).is_none() {
			out.push(issue(
				Severity::Error,
				format!(
					"option '{}' is missing required secondary key '{}'",
					option.name, key.name
				),
			));
		}
	}

	if def.storage == StorageMode::Array && !(0..=config.array_max_span).contains(&option.id) {
		out.push(issue(
			Severity::Error,
			format!(
				"id {} of option '{}' is outside 0..={} required by array storage",
				option.id, option.name, config.array_max_span
			),
		));
	}

	if option.description.is_none() && config.warn_missing_description {
		out.push(issue(
			Severity::Warning,
			format!("option '{}' has no description", option.name),
		));
	}

	out
}

#[cfg(test)]
mod tests;
