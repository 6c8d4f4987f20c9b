//! Service-flavored registries.
//!
//! A collection declared with `service=#true` can hand all of its entries to
//! an external dependency-injection container. Each implementation decides
//! what it registers through [`ServiceRegistration`]; the registry only
//! drives the loop.

use crate::error::ServiceError;
use crate::registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
	Singleton,
	Transient,
}

/// One service registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
	/// Service (contract) name.
	pub service: String,
	/// Implementation type name.
	pub implementation: String,
	pub lifetime: ServiceLifetime,
}

impl ServiceDescriptor {
	pub fn new(service: impl Into<String>, implementation: impl Into<String>, lifetime: ServiceLifetime) -> Self {
		Self {
			service: service.into(),
			implementation: implementation.into(),
			lifetime,
		}
	}
}

/// Target of [`Registry::register_all`].
pub trait Container {
	fn add_service(&mut self, descriptor: ServiceDescriptor);
}

impl Container for Vec<ServiceDescriptor> {
	fn add_service(&mut self, descriptor: ServiceDescriptor) {
		self.push(descriptor);
	}
}

/// Implemented by every member of a service collection.
pub trait ServiceRegistration {
	fn register(&self, container: &mut dyn Container);
}

impl<C: ?Sized + ServiceRegistration> Registry<C> {
	/// Lets every entry register itself with `container`, in ascending id
	/// order. Factory entries register through a fresh instance.
	///
	/// Returns the number of entries visited.
	pub fn register_all(&self, container: &mut dyn Container) -> Result<usize, ServiceError> {
		if !self.is_service() {
			return Err(ServiceError::NotServiceRegistry(self.label().to_string()));
		}
		for entry in self.all() {
			entry.instance().register(container);
		}
		tracing::debug!(registry = self.label(), entries = self.len(), "registered services");
		Ok(self.len())
	}
}
