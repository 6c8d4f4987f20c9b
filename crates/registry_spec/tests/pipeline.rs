use pretty_assertions::assert_eq;
use roster_spec::compile::{Pipeline, PipelineConfig, Program};
use roster_spec::{GenerationMode, IssueKind, Severity, StorageMode};

const CORE: &str = r#"
module "core"

capability "Describe"
capability "PriorityLevel" extends="Describe"

collection "Priority" capability="PriorityLevel" {
	key "code" unique=#true
}

type "HighPriority" constructor=#true {
	implements "PriorityLevel"
}
type "LowPriority" constructor=#true {
	implements "PriorityLevel"
}

option "High" collection="Priority" id=1 type="HighPriority" description="Handle first" {
	key "code" "H"
}
option "Low" collection="Priority" id=9 type="LowPriority" description="Handle last" {
	key "code" "L"
}
"#;

const PLUGINS: &str = r#"
module "plugins" {
	references "core"
}

type "UrgentPriority" constructor=#true {
	implements "PriorityLevel"
}

option "Urgent" collection="Priority" id=0 type="UrgentPriority" description="Drop everything"
"#;

const APP: &str = r#"
module "app" {
	references "plugins"
}
"#;

fn run(sources: &[(&str, &str)], root: &str) -> roster_spec::compile::BuildReport {
	Pipeline::new(PipelineConfig::default())
		.run(&Program::from_sources(sources.iter().copied()), root)
		.unwrap()
}

#[test]
fn registry_covers_the_reference_closure() {
	let report = run(&[("app.kdl", APP), ("core.kdl", CORE), ("plugins.kdl", PLUGINS)], "app");
	assert!(report.diagnostics.is_empty(), "{:#?}", report.diagnostics);

	let registry = report.registry("Priority").unwrap();
	let names: Vec<_> = registry.entries.iter().map(|e| e.name.as_str()).collect();
	assert_eq!(names, ["Urgent", "High", "Low"]);
	assert_eq!(registry.entries[0].module, "plugins");
	assert_eq!(registry.entries[1].keys, vec![Some("H".to_string())]);
	assert_eq!(registry.capability, "PriorityLevel");
}

#[test]
fn building_core_alone_ignores_plugins() {
	let report = run(&[("app.kdl", APP), ("core.kdl", CORE), ("plugins.kdl", PLUGINS)], "core");
	let registry = report.registry("Priority").unwrap();
	assert_eq!(registry.entries.len(), 2);
}

#[test]
fn identity_collision_across_modules_withholds_the_registry() {
	let a = r#"
module "a" {
	references "core"
}
type "AlphaPriority" constructor=#true {
	implements "PriorityLevel"
}
option "Alpha" collection="Priority" id=5 type="AlphaPriority" description="a"
"#;
	let b = r#"
module "b" {
	references "core"
}
type "BetaPriority" constructor=#true {
	implements "PriorityLevel"
}
option "Beta" collection="Priority" id=5 type="BetaPriority" description="b"
"#;
	let root = "module \"root\" {\n\treferences \"a\" \"b\"\n}\n";
	let report = run(&[("core.kdl", CORE), ("a.kdl", a), ("b.kdl", b), ("root.kdl", root)], "root");

	assert!(report.registry("Priority").is_none());
	assert_eq!(report.blocked, ["Priority"]);
	let collisions: Vec<_> = report
		.diagnostics
		.iter()
		.filter(|d| d.kind == IssueKind::IdentityCollision)
		.collect();
	assert_eq!(collisions.len(), 1);
	assert!(collisions[0].message.contains("module a"));
	assert!(collisions[0].message.contains("module b"));
	assert!(collisions[0].message.starts_with("id 5"));
}

#[test]
fn scan_issue_drops_only_the_bad_declaration() {
	let broken = r#"
module "app" {
	references "core"
}
option "Nameless" collection="Priority" type="HighPriority"
"#;
	let report = run(&[("app.kdl", broken), ("core.kdl", CORE)], "app");

	assert_eq!(report.error_count(), 1);
	assert_eq!(report.diagnostics[0].kind, IssueKind::ScanIssue);
	assert_eq!(report.registry("Priority").unwrap().entries.len(), 2);
	assert!(report.blocked.is_empty());
}

#[test]
fn empty_collection_severity_is_configurable() {
	let text = r#"
module "core"
capability "Describe"
collection "Nothing" capability="Describe"
"#;
	let program = Program::from_sources([("core.kdl", text)]);

	let lenient = Pipeline::new(PipelineConfig::default()).run(&program, "core").unwrap();
	assert!(!lenient.has_errors());
	assert_eq!(lenient.diagnostics[0].kind, IssueKind::EmptyCollection);
	assert_eq!(lenient.diagnostics[0].severity, Severity::Warning);
	assert!(lenient.registry("Nothing").unwrap().entries.is_empty());

	let strict = Pipeline::new(PipelineConfig {
		empty_collection: Severity::Error,
		..PipelineConfig::default()
	})
	.run(&program, "core")
	.unwrap();
	assert!(strict.has_errors());
	assert!(strict.registry("Nothing").is_none());
	assert_eq!(strict.blocked, ["Nothing"]);
}

#[test]
fn factory_collections_record_hooks() {
	let text = r#"
module "core"
capability "Exporter"
collection "Exporters" capability="Exporter<Event>" mode="factory" storage="array" service=#true
type "JsonExporter" factory="json_exporter" {
	implements "Exporter<Event>"
}
option "Json" collection="Exporters" id=2 type="JsonExporter" description="JSON lines"
"#;
	let report = run(&[("core.kdl", text)], "core");
	assert!(report.diagnostics.is_empty(), "{:#?}", report.diagnostics);

	let registry = report.registry("Exporters").unwrap();
	assert_eq!(registry.mode, GenerationMode::Factory);
	assert_eq!(registry.storage, StorageMode::Array);
	assert!(registry.service);
	assert_eq!(registry.entries[0].hook, "json_exporter");
}

#[test]
fn unrelated_collections_are_unaffected_by_a_blocked_one() {
	let text = format!(
		"{CORE}\ncollection \"Broken\" capability=\"Missing\"\noption \"X\" collection=\"Broken\" id=1 type=\"HighPriority\" description=\"x\"\n"
	);
	let report = run(&[("core.kdl", text.as_str())], "core");
	assert_eq!(report.blocked, ["Broken"]);
	assert_eq!(report.registry("Priority").unwrap().entries.len(), 2);
}

#[test]
fn unknown_root_fails_the_run() {
	let result = Pipeline::default().run(&Program::from_sources([("core.kdl", CORE)]), "ghost");
	assert!(result.is_err());
}

#[test]
fn output_is_byte_identical_across_runs_and_discovery_orders() {
	let forward = run(&[("app.kdl", APP), ("core.kdl", CORE), ("plugins.kdl", PLUGINS)], "app");
	let backward = run(&[("plugins.kdl", PLUGINS), ("core.kdl", CORE), ("app.kdl", APP)], "app");
	assert_eq!(forward, backward);

	let bytes = |report: &roster_spec::compile::BuildReport| -> Vec<Vec<u8>> {
		report.registries.iter().map(|r| r.encode().unwrap()).collect()
	};
	assert_eq!(bytes(&forward), bytes(&backward));
	assert_eq!(bytes(&forward), bytes(&run(&[("app.kdl", APP), ("core.kdl", CORE), ("plugins.kdl", PLUGINS)], "app")));
}

#[test]
fn sequential_and_parallel_pipelines_agree() {
	let program = Program::from_sources([("app.kdl", APP), ("core.kdl", CORE), ("plugins.kdl", PLUGINS)]);
	let parallel = Pipeline::new(PipelineConfig::default()).run(&program, "app").unwrap();
	let sequential = Pipeline::new(PipelineConfig {
		parallel: false,
		..PipelineConfig::default()
	})
	.run(&program, "app")
	.unwrap();
	assert_eq!(parallel, sequential);
}
