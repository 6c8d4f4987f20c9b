//! Runtime registries generated from roster markers.
//!
//! A build script runs the `roster-spec` pipeline and writes one artifact per
//! collection into `OUT_DIR`. At run time the artifact is embedded with
//! [`include_registry!`] and materialized with [`Registry::load`], which binds
//! every entry to a constructor or factory from a [`Bindings`] table:
//!
//! ```ignore
//! static PRIORITIES: LazyLock<Registry<dyn PriorityLevel>> = LazyLock::new(|| {
//!     let bindings = Bindings::new()
//!         .constructor("HighPriority", || Box::new(HighPriority))
//!         .constructor("LowPriority", || Box::new(LowPriority));
//!     Registry::load(roster::include_registry!("Priority"), &bindings).expect("registry binds")
//! });
//!
//! let high = PRIORITIES.get_by_name("high")?;
//! ```
//!
//! Registries are immutable once loaded; there is no runtime registration.

mod bindings;
mod entry;
mod error;
mod macros;
mod registry;
mod service;

pub use bindings::{Binding, Bindings, Construct, HookKind};
pub use entry::{Entry, Instance};
pub use error::{LoadError, LookupKey, LookupMiss, ServiceError};
pub use registry::{KeyLookup, Registry};
pub use roster_spec::{CasePolicy, GenerationMode, RegistryArtifact, StorageMode};
pub use service::{Container, ServiceDescriptor, ServiceLifetime, ServiceRegistration};
