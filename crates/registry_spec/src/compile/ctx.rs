use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::config::PipelineConfig;
use super::error::{CompileError, Result};
use super::program::Program;
use super::{BuildReport, Pipeline};
use crate::artifact;

/// Cargo build-script front end for the pipeline.
///
/// ```no_run
/// // build.rs
/// fn main() -> Result<(), roster_spec::compile::CompileError> {
///     roster_spec::compile::BuildCtx::new()?.compile("markers", "app")?;
///     Ok(())
/// }
/// ```
pub struct BuildCtx {
	pub manifest_dir: PathBuf,
	pub out_dir: PathBuf,
}

impl BuildCtx {
	/// Reads `CARGO_MANIFEST_DIR` and `OUT_DIR` from the environment.
	pub fn new() -> Result<Self> {
		let manifest_dir = std::env::var_os("CARGO_MANIFEST_DIR").ok_or(CompileError::Env {
			var: "CARGO_MANIFEST_DIR",
		})?;
		let out_dir = std::env::var_os("OUT_DIR").ok_or(CompileError::Env { var: "OUT_DIR" })?;
		Ok(Self::from_dirs(manifest_dir, out_dir))
	}

	pub fn from_dirs(manifest_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
		Self {
			manifest_dir: manifest_dir.into(),
			out_dir: out_dir.into(),
		}
	}

	pub fn asset(&self, rel: &str) -> PathBuf {
		self.manifest_dir.join(rel)
	}

	pub fn rerun_if_changed(&self, path: &Path) {
		println!("cargo:rerun-if-changed={}", path.display());
	}

	/// Generates registries for `root` from the marker documents under
	/// `markers_rel` (relative to the manifest directory).
	///
	/// Diagnostics are forwarded as cargo warnings. Artifacts of healthy
	/// collections are always written; the call fails afterwards when errors
	/// were reported and `fail-on-error` is enabled.
	pub fn compile(&self, markers_rel: &str, root: &str) -> Result<BuildReport> {
		let dir = self.asset(markers_rel);
		self.rerun_if_changed(&dir);
		println!("cargo:rerun-if-env-changed={}", super::ENV_EMPTY_COLLECTION);
		println!("cargo:rerun-if-env-changed={}", super::ENV_PARALLEL);

		let program = Program::load_dir(&dir)?;
		for file in program.files() {
			self.rerun_if_changed(file);
		}
		let config_path = dir.join(super::CONFIG_FILE);
		if config_path.is_file() {
			self.rerun_if_changed(&config_path);
		}

		let config = PipelineConfig::load(&dir)?.with_env()?;
		let fail_on_error = config.fail_on_error;
		let report = Pipeline::new(config).run(&program, root)?;

		for diagnostic in &report.diagnostics {
			for line in diagnostic.to_string().lines() {
				println!("cargo:warning={line}");
			}
		}

		self.write_report(&report)?;

		if fail_on_error && report.has_errors() {
			return Err(CompileError::Failed {
				errors: report.error_count(),
			});
		}
		Ok(report)
	}

	/// Writes one blob per registry in `report` into `OUT_DIR` and removes
	/// any blob left over for a collection the report blocked.
	pub fn write_report(&self, report: &BuildReport) -> Result<()> {
		for registry in &report.registries {
			self.write_blob(&registry.file_name(), &registry.encode()?)?;
		}
		for collection in &report.blocked {
			self.remove_blob(&artifact::file_name(collection))?;
		}
		Ok(())
	}

	/// Deletes `filename` from `OUT_DIR`; a missing file is not an error.
	pub fn remove_blob(&self, filename: &str) -> Result<()> {
		let path = self.out_dir.join(filename);
		match fs::remove_file(&path) {
			Ok(()) => {
				tracing::debug!(path = %path.display(), "removed stale artifact");
				Ok(())
			}
			Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(error) => Err(CompileError::Io { path, error }),
		}
	}

	pub fn write_blob(&self, filename: &str, data: &[u8]) -> Result<()> {
		let path = self.out_dir.join(filename);
		let io = |error| CompileError::Io {
			path: path.clone(),
			error,
		};
		let mut file = fs::File::create(&path).map_err(io)?;
		file.write_all(data).map_err(io)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::artifact::RegistryArtifact;

	const CORE: &str = r#"
module "core"
capability "PriorityLevel"
collection "Priority" capability="PriorityLevel"
type "HighPriority" constructor=#true {
	implements "PriorityLevel"
}
option "High" collection="Priority" id=1 type="HighPriority" description="urgent"
"#;

	#[test]
	fn compile_writes_artifacts_into_out_dir() {
		let manifest = tempfile::tempdir().unwrap();
		let out = tempfile::tempdir().unwrap();
		fs::create_dir(manifest.path().join("markers")).unwrap();
		fs::write(manifest.path().join("markers/core.kdl"), CORE).unwrap();

		let ctx = BuildCtx::from_dirs(manifest.path(), out.path());
		let report = ctx.compile("markers", "core").unwrap();
		assert!(!report.has_errors(), "{:#?}", report.diagnostics);

		let blob = fs::read(out.path().join("Priority.roster")).unwrap();
		let artifact = RegistryArtifact::decode(&blob).unwrap();
		assert_eq!(artifact.entries.len(), 1);
		assert_eq!(artifact.entries[0].name, "High");
	}

	#[test]
	fn compile_fails_on_errors_after_writing_healthy_registries() {
		let manifest = tempfile::tempdir().unwrap();
		let out = tempfile::tempdir().unwrap();
		let markers = manifest.path().join("markers");
		fs::create_dir(&markers).unwrap();
		fs::write(
			markers.join("broken.kdl"),
			"module \"broken\"\ncollection \"Orphans\" capability=\"Missing\"\n",
		)
		.unwrap();
		fs::write(
			markers.join("core.kdl"),
			CORE.replace("module \"core\"", "module \"core\" {\n\treferences \"broken\"\n}"),
		)
		.unwrap();

		let ctx = BuildCtx::from_dirs(manifest.path(), out.path());
		let err = ctx.compile("markers", "core").unwrap_err();
		assert!(matches!(err, CompileError::Failed { errors } if errors >= 1), "{err}");
		assert!(out.path().join("Priority.roster").is_file());
		assert!(!out.path().join("Orphans.roster").exists());
	}

	#[test]
	fn fail_on_error_can_be_disabled() {
		let manifest = tempfile::tempdir().unwrap();
		let out = tempfile::tempdir().unwrap();
		let markers = manifest.path().join("markers");
		fs::create_dir(&markers).unwrap();
		fs::write(markers.join("core.kdl"), "module \"core\"\ncollection \"Orphans\" capability=\"Missing\"\n").unwrap();
		fs::write(markers.join("roster.kdl"), "pipeline {\n\tfail-on-error #false\n}\n").unwrap();

		let ctx = BuildCtx::from_dirs(manifest.path(), out.path());
		let report = ctx.compile("markers", "core").unwrap();
		assert!(report.has_errors());
		assert_eq!(report.blocked, vec!["Orphans".to_string()]);
	}

	#[test]
	fn blocked_collection_loses_its_previous_artifact() {
		let manifest = tempfile::tempdir().unwrap();
		let out = tempfile::tempdir().unwrap();
		let markers = manifest.path().join("markers");
		fs::create_dir(&markers).unwrap();
		fs::write(markers.join("core.kdl"), CORE).unwrap();
		fs::write(markers.join("roster.kdl"), "pipeline {\n\tfail-on-error #false\n}\n").unwrap();

		let ctx = BuildCtx::from_dirs(manifest.path(), out.path());
		ctx.compile("markers", "core").unwrap();
		let stale = out.path().join("Priority.roster");
		assert!(stale.is_file());

		let clashing = format!(
			"{CORE}type \"OtherPriority\" constructor=#true {{\n\timplements \"PriorityLevel\"\n}}\noption \"Other\" collection=\"Priority\" id=1 type=\"OtherPriority\" description=\"clash\"\n"
		);
		fs::write(markers.join("core.kdl"), clashing).unwrap();
		let report = ctx.compile("markers", "core").unwrap();
		assert_eq!(report.blocked, vec!["Priority".to_string()]);
		assert!(!stale.exists());
	}

	#[test]
	fn removing_a_missing_blob_is_fine() {
		let manifest = tempfile::tempdir().unwrap();
		let out = tempfile::tempdir().unwrap();
		let ctx = BuildCtx::from_dirs(manifest.path(), out.path());
		ctx.remove_blob("Nothing.roster").unwrap();
	}

	#[test]
	fn missing_marker_dir_is_an_error() {
		let manifest = tempfile::tempdir().unwrap();
		let out = tempfile::tempdir().unwrap();
		let ctx = BuildCtx::from_dirs(manifest.path(), out.path());
		assert!(ctx.compile("nope", "core").is_err());
	}
}
