use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::ArtifactError;

/// Failures that stop the pipeline itself, as opposed to problems in the
/// scanned declarations (those are [`crate::Diagnostic`]s).
#[derive(Debug, Error)]
pub enum CompileError {
	#[error("I/O error on {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	#[error("failed to walk marker directory: {0}")]
	Walk(#[from] walkdir::Error),

	#[error("environment variable {var} is not set")]
	Env { var: &'static str },

	#[error("root module '{0}' is not part of the program")]
	UnknownRoot(String),

	#[error("KDL parse error in configuration: {0}")]
	Kdl(#[from] kdl::KdlError),

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("failed to encode artifact: {0}")]
	Artifact(#[from] ArtifactError),

	#[error("registry generation reported {errors} error(s)")]
	Failed { errors: usize },
}

pub type Result<T> = std::result::Result<T, CompileError>;
