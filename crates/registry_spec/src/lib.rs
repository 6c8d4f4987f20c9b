//! Declaration model and artifact format for roster registries.
//!
//! The default `compile` feature adds the build-time pipeline that turns KDL
//! marker documents into registry artifacts:
//!
//! ```text
//! scan ──▶ validate ──▶ resolve ──▶ synthesize
//!  │          │            │            │
//!  markers    contracts    collisions   artifact blobs
//! ```
//!
//! Runtime crates depend on this crate with `default-features = false` and only
//! use [`model`] and [`artifact`].

pub mod artifact;
#[cfg(feature = "compile")]
pub mod compile;
pub mod diagnostic;
pub mod model;

pub use artifact::{ArtifactEntry, ArtifactError, RegistryArtifact};
pub use diagnostic::{Diagnostic, IssueKind, Severity};
pub use model::{
	CapabilityDecl, CapabilityRef, CasePolicy, CollectionDefinition, GenerationMode,
	OptionDeclaration, SecondaryKeyDef, SourceLocation, StorageMode, TypeSymbol,
};
