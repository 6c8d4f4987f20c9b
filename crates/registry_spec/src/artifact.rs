//! Generated registry artifact and its blob encoding.
//!
//! A blob is `MAGIC ++ SCHEMA_VERSION (le u32) ++ postcard(RegistryArtifact)`.
//! Entries are stored in ascending id order and every field is
//! order-deterministic, so identical input always encodes to identical bytes.

use std::mem::size_of;

use serde::{Deserialize, Serialize};

use crate::model::{CasePolicy, GenerationMode, SecondaryKeyDef, StorageMode};

/// Magic bytes identifying a roster registry blob.
pub const MAGIC: &[u8; 8] = b"ROSTRREG";

/// Schema version for blob format compatibility.
pub const SCHEMA_VERSION: u32 = 1;

/// Total header size in bytes (magic + version).
pub const HEADER_SIZE: usize = MAGIC.len() + size_of::<u32>();

/// Largest id an `array` registry may hold. Loaders reject anything above it.
pub const MAX_ARRAY_ID: i64 = 1 << 20;

/// File extension of artifacts written by the build helpers.
pub const EXTENSION: &str = "roster";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
	#[error("blob is {len} bytes, shorter than the blob header")]
	Truncated { len: usize },
	#[error("blob does not start with the roster magic")]
	BadMagic,
	#[error("blob schema version {found} is not supported")]
	Version { found: u32 },
	#[error("malformed registry payload: {0}")]
	Payload(#[from] postcard::Error),
}

/// One synthesized entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
	pub id: i64,
	pub name: String,
	pub implementation: String,
	/// Construction hook name: the implementation itself for singletons, the
	/// factory hook for factories.
	pub hook: String,
	pub description: Option<String>,
	pub module: String,
	/// Secondary-key values, aligned with [`RegistryArtifact::keys`].
	pub keys: Vec<Option<String>>,
}

/// The immutable, generated registry for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryArtifact {
	pub collection: String,
	pub capability: String,
	pub mode: GenerationMode,
	pub storage: StorageMode,
	pub case: CasePolicy,
	pub service: bool,
	pub keys: Vec<SecondaryKeyDef>,
	/// Entries in ascending id order.
	pub entries: Vec<ArtifactEntry>,
}

impl RegistryArtifact {
	/// File name the build helpers use for this collection's blob.
	pub fn file_name(&self) -> String {
		file_name(&self.collection)
	}

	pub fn encode(&self) -> Result<Vec<u8>, ArtifactError> {
		let payload = postcard::to_stdvec(self)?;
		let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
		out.extend_from_slice(MAGIC);
		out.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
		out.extend_from_slice(&payload);
		Ok(out)
	}

	pub fn decode(data: &[u8]) -> Result<Self, ArtifactError> {
		let payload = validate_blob(data)?;
		Ok(postcard::from_bytes(payload)?)
	}
}

pub fn file_name(collection: &str) -> String {
	format!("{collection}.{EXTENSION}")
}

/// Validates the blob header and returns the payload slice.
pub fn validate_blob(data: &[u8]) -> Result<&[u8], ArtifactError> {
	if data.len() < HEADER_SIZE {
		return Err(ArtifactError::Truncated { len: data.len() });
	}
	if &data[..MAGIC.len()] != MAGIC {
		return Err(ArtifactError::BadMagic);
	}
	let mut version = [0u8; 4];
	version.copy_from_slice(&data[MAGIC.len()..HEADER_SIZE]);
	let found = u32::from_le_bytes(version);
	if found != SCHEMA_VERSION {
		return Err(ArtifactError::Version { found });
	}
	Ok(&data[HEADER_SIZE..])
}
