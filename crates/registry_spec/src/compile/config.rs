//! Pipeline configuration.
//!
//! Read from the `pipeline` node of a `roster.kdl` file placed next to the
//! marker documents:
//!
//! ```kdl
//! pipeline {
//!     empty-collection "error"
//!     array-max-span 1024
//!     warn-missing-description #false
//!     parallel #true
//!     fail-on-error #true
//! }
//! ```
//!
//! Build scripts may override `empty-collection` and `parallel` through the
//! `ROSTER_EMPTY_COLLECTION` and `ROSTER_PARALLEL` environment variables.

use std::fs;
use std::path::Path;

use kdl::{KdlDocument, KdlValue};
use serde::{Deserialize, Serialize};

use super::error::{CompileError, Result};
use crate::artifact::MAX_ARRAY_ID;
use crate::diagnostic::Severity;

/// Name of the configuration document inside a marker directory.
pub const CONFIG_FILE: &str = "roster.kdl";

pub const ENV_EMPTY_COLLECTION: &str = "ROSTER_EMPTY_COLLECTION";
pub const ENV_PARALLEL: &str = "ROSTER_PARALLEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PipelineConfig {
	/// Severity of a collection that received no options.
	pub empty_collection: Severity,
	/// Largest id allowed in an `array` collection.
	pub array_max_span: i64,
	/// Report options without a description.
	pub warn_missing_description: bool,
	/// Scan modules on the rayon pool.
	pub parallel: bool,
	/// Make the build helper fail when any error diagnostic is produced.
	pub fail_on_error: bool,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			empty_collection: Severity::Warning,
			array_max_span: 4096,
			warn_missing_description: true,
			parallel: true,
			fail_on_error: true,
		}
	}
}

impl PipelineConfig {
	/// Parses the `pipeline` node of a configuration document. Missing keys
	/// keep their defaults.
	pub fn parse(input: &str) -> Result<Self> {
		let doc: KdlDocument = input.parse()?;
		let mut config = Self::default();
		let Some(node) = doc.get("pipeline") else {
			return Ok(config);
		};

		for child in node.children().map(|c| c.nodes()).unwrap_or_default() {
			let key = child.name().value();
			let value = child
				.get(0)
				.ok_or_else(|| CompileError::Config(format!("'{key}' needs a value")))?;
			match key {
				"empty-collection" => config.empty_collection = severity_value(key, value)?,
				"array-max-span" => {
					config.array_max_span = value
						.as_integer()
						.and_then(|v| i64::try_from(v).ok())
						.filter(|v| (0..=MAX_ARRAY_ID).contains(v))
						.ok_or_else(|| {
							CompileError::Config(format!("'{key}' must be an integer in 0..={MAX_ARRAY_ID}"))
						})?;
				}
				"warn-missing-description" => config.warn_missing_description = bool_value(key, value)?,
				"parallel" => config.parallel = bool_value(key, value)?,
				"fail-on-error" => config.fail_on_error = bool_value(key, value)?,
				other => return Err(CompileError::Config(format!("unknown pipeline setting '{other}'"))),
			}
		}
		Ok(config)
	}

	/// Loads `roster.kdl` from `dir`, or defaults when the file is absent.
	pub fn load(dir: &Path) -> Result<Self> {
		let path = dir.join(CONFIG_FILE);
		if !path.is_file() {
			return Ok(Self::default());
		}
		let text = fs::read_to_string(&path).map_err(|error| CompileError::Io { path, error })?;
		Self::parse(&text)
	}

	/// Applies overrides from the process environment.
	pub fn with_env(self) -> Result<Self> {
		self.with_overrides(|var| std::env::var(var).ok())
	}

	/// Applies overrides from `lookup`, which maps variable names to values.
	pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		if let Some(raw) = lookup(ENV_EMPTY_COLLECTION) {
			self.empty_collection = Severity::parse(raw.trim())
				.ok_or_else(|| CompileError::Config(format!("{ENV_EMPTY_COLLECTION}: unknown severity '{raw}'")))?;
		}
		if let Some(raw) = lookup(ENV_PARALLEL) {
			self.parallel = match raw.trim() {
				"1" | "true" | "yes" => true,
				"0" | "false" | "no" => false,
				_ => return Err(CompileError::Config(format!("{ENV_PARALLEL}: expected a boolean, got '{raw}'"))),
			};
		}
		Ok(self)
	}
}

fn severity_value(key: &str, value: &KdlValue) -> Result<Severity> {
	value
		.as_string()
		.and_then(Severity::parse)
		.ok_or_else(|| CompileError::Config(format!("'{key}' must be \"warning\" or \"error\"")))
}

fn bool_value(key: &str, value: &KdlValue) -> Result<bool> {
	value
		.as_bool()
		.ok_or_else(|| CompileError::Config(format!("'{key}' must be #true or #false")))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn missing_pipeline_node_yields_defaults() {
		assert_eq!(PipelineConfig::parse("").unwrap(), PipelineConfig::default());
	}

	#[test]
	fn parses_every_setting() {
		let config = PipelineConfig::parse(
			r#"
			pipeline {
				empty-collection "error"
				array-max-span 64
				warn-missing-description #false
				parallel #false
				fail-on-error #false
			}
			"#,
		)
		.unwrap();
		assert_eq!(
			config,
			PipelineConfig {
				empty_collection: Severity::Error,
				array_max_span: 64,
				warn_missing_description: false,
				parallel: false,
				fail_on_error: false,
			}
		);
	}

	#[test]
	fn rejects_unknown_settings_and_bad_values() {
		assert!(PipelineConfig::parse("pipeline { colour \"red\" }").is_err());
		assert!(PipelineConfig::parse("pipeline { empty-collection \"fatal\" }").is_err());
		assert!(PipelineConfig::parse("pipeline { array-max-span -3 }").is_err());
		assert!(PipelineConfig::parse("pipeline { array-max-span 1048577 }").is_err());
		assert!(PipelineConfig::parse("pipeline { array-max-span 1048576 }").is_ok());
		assert!(PipelineConfig::parse("pipeline { parallel \"yes\" }").is_err());
	}

	#[test]
	fn overrides_take_precedence() {
		let config = PipelineConfig::default()
			.with_overrides(|var| match var {
				ENV_EMPTY_COLLECTION => Some("error".into()),
				ENV_PARALLEL => Some("0".into()),
				_ => None,
			})
			.unwrap();
		assert_eq!(config.empty_collection, Severity::Error);
		assert!(!config.parallel);

		let bad = PipelineConfig::default().with_overrides(|var| (var == ENV_PARALLEL).then(|| "maybe".into()));
		assert!(bad.is_err());
	}
}
