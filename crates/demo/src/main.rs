use std::process::ExitCode;

use roster::{Registry, ServiceDescriptor};
use roster_demo::{Event, PriorityLevel};

fn main() -> ExitCode {
	let (priorities, exporters) = match (roster_demo::priorities(), roster_demo::exporters()) {
		(Ok(p), Ok(e)) => (p, e),
		(Err(error), _) | (_, Err(error)) => {
			eprintln!("error: {error}");
			return ExitCode::FAILURE;
		}
	};

	print_levels(priorities);

	let events = [Event::new("disk full", "C"), Event::new("backup done", "L")];
	for entry in exporters {
		let Some(extension) = entry.key("extension") else {
			continue;
		};
		if let Some(text) = roster_demo::export(extension, &events) {
			println!("--- {} (.{extension})\n{text}", entry.name());
		}
	}

	let mut services: Vec<ServiceDescriptor> = Vec::new();
	match exporters.register_all(&mut services) {
		Ok(count) => println!("registered {count} exporter service(s)"),
		Err(error) => {
			eprintln!("error: {error}");
			return ExitCode::FAILURE;
		}
	}
	ExitCode::SUCCESS
}

fn print_levels(priorities: &Registry<dyn PriorityLevel>) {
	for entry in priorities {
		let level = entry.instance();
		println!(
			"{:>2} {:<8} weight {:>3}  {}",
			entry.id(),
			entry.name(),
			level.weight(),
			entry.description().unwrap_or_default()
		);
	}
}
