//! Priority levels and event exporters contributed by several marker modules
//! and wired together by the registries the build script generates.
//!
//! `markers/app.kdl` is the root: it pulls in `extras` (which adds a
//! `Critical` level on top of `core`) and `export`. The `experimental` module
//! is never referenced, so its options stay out of every registry.

use std::sync::LazyLock;

use roster::{Bindings, Container, LoadError, Registry, ServiceDescriptor, ServiceLifetime, ServiceRegistration};

pub trait Describe {
	fn describe(&self) -> &'static str;
}

/// Scheduling weight of a work item.
pub trait PriorityLevel: Describe + Send + Sync {
	/// Higher runs sooner.
	fn weight(&self) -> u8;
}

macro_rules! level {
	($ty:ident, $weight:literal, $text:literal) => {
		pub struct $ty;

		impl Describe for $ty {
			fn describe(&self) -> &'static str {
				$text
			}
		}

		impl PriorityLevel for $ty {
			fn weight(&self) -> u8 {
				$weight
			}
		}
	};
}

level!(CriticalPriority, 200, "critical");
level!(HighPriority, 100, "high");
level!(MediumPriority, 50, "medium");
level!(LowPriority, 10, "low");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
	pub name: String,
	pub level: String,
}

impl Event {
	pub fn new(name: impl Into<String>, level: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			level: level.into(),
		}
	}
}

/// Serializes events into one output format. Instances are single-use.
pub trait Exporter<E>: ServiceRegistration + Send + Sync {
	fn push(&mut self, event: &E);
	fn finish(self: Box<Self>) -> String;
}

#[derive(Default)]
pub struct JsonExporter {
	out: String,
}

impl Exporter<Event> for JsonExporter {
	fn push(&mut self, event: &Event) {
		self.out
			.push_str(&format!("{{\"name\":\"{}\",\"level\":\"{}\"}}\n", event.name, event.level));
	}

	fn finish(self: Box<Self>) -> String {
		self.out
	}
}

impl ServiceRegistration for JsonExporter {
	fn register(&self, container: &mut dyn Container) {
		container.add_service(ServiceDescriptor::new("Exporter", "JsonExporter", ServiceLifetime::Transient));
	}
}

pub struct CsvExporter {
	out: String,
}

impl Default for CsvExporter {
	fn default() -> Self {
		Self {
			out: "name,level\n".to_string(),
		}
	}
}

impl Exporter<Event> for CsvExporter {
	fn push(&mut self, event: &Event) {
		self.out.push_str(&format!("{},{}\n", event.name, event.level));
	}

	fn finish(self: Box<Self>) -> String {
		self.out
	}
}

impl ServiceRegistration for CsvExporter {
	fn register(&self, container: &mut dyn Container) {
		container.add_service(ServiceDescriptor::new("Exporter", "CsvExporter", ServiceLifetime::Transient));
	}
}

static PRIORITIES: LazyLock<Result<Registry<dyn PriorityLevel>, LoadError>> = LazyLock::new(|| {
	let bindings = Bindings::<dyn PriorityLevel>::new()
		.constructor("CriticalPriority", || Box::new(CriticalPriority))
		.constructor("HighPriority", || Box::new(HighPriority))
		.constructor("MediumPriority", || Box::new(MediumPriority))
		.constructor("LowPriority", || Box::new(LowPriority));
	Registry::load(roster::include_registry!("Priority"), &bindings)
});

static EXPORTERS: LazyLock<Result<Registry<dyn Exporter<Event>>, LoadError>> = LazyLock::new(|| {
	let bindings = Bindings::<dyn Exporter<Event>>::new()
		.factory("json_exporter", || Box::<JsonExporter>::default())
		.factory("csv_exporter", || Box::<CsvExporter>::default());
	Registry::load(roster::include_registry!("Exporters"), &bindings)
});

/// The `Priority` registry, loaded on first use.
pub fn priorities() -> Result<&'static Registry<dyn PriorityLevel>, &'static LoadError> {
	PRIORITIES.as_ref()
}

/// The `Exporters` registry, loaded on first use.
pub fn exporters() -> Result<&'static Registry<dyn Exporter<Event>>, &'static LoadError> {
	EXPORTERS.as_ref()
}

/// Runs `events` through the exporter registered for file `extension`.
pub fn export(extension: &str, events: &[Event]) -> Option<String> {
	let entry = exporters().ok()?.try_get_by_key("extension", extension)?;
	let mut exporter = entry.create()?;
	for event in events {
		exporter.push(event);
	}
	Some(exporter.finish())
}
