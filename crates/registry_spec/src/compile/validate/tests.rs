use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;
use crate::compile::program::Program;
use crate::compile::scan::scan;

const PRELUDE: &str = r#"
module "core"
capability "Describe"
capability "PriorityLevel" extends="Describe"
type "HighPriority" constructor=#true {
	implements "PriorityLevel"
}
"#;

fn check_with(body: &str, config: &PipelineConfig) -> Validation {
	let text = format!("{PRELUDE}{body}");
	let program = Program::from_sources([("core.kdl", text.as_str())]);
	let scanned = scan(&program, "core", false).unwrap();
	assert!(
		scanned.issues.iter().all(|d| !d.is_error()),
		"unexpected scan issues: {:#?}",
		scanned.issues
	);
	validate(&scanned, config)
}

fn check(body: &str) -> Validation {
	check_with(
		body,
		&PipelineConfig {
			warn_missing_description: false,
			..PipelineConfig::default()
		},
	)
}

fn plan<'a>(v: &'a Validation, name: &str) -> &'a CollectionPlan {
	v.plans.iter().find(|p| p.definition.name == name).unwrap()
}

fn errors(v: &Validation) -> Vec<&str> {
	v.diagnostics
		.iter()
		.filter(|d| d.is_error())
		.map(|d| d.message.as_str())
		.collect()
}

#[test]
fn capability_is_satisfied_through_extends() {
	let v = check(
		r#"
collection "Described" capability="Describe"
option "High" collection="Described" id=1 type="HighPriority"
"#,
	);
	assert_eq!(errors(&v), Vec::<&str>::new());
	let plan = plan(&v, "Described");
	assert!(!plan.blocked);
	assert_eq!(plan.options.len(), 1);
}

#[test]
fn missing_capability_blocks_the_collection() {
	let v = check(
		r#"
collection "Exporters" capability="Exporter"
option "High" collection="Exporters" id=1 type="HighPriority"
"#,
	);
	assert!(plan(&v, "Exporters").blocked);
	let errors = errors(&v);
	assert!(errors.iter().any(|m| m.contains("capability 'Exporter'")), "{errors:?}");
	assert!(errors.iter().any(|m| m.contains("does not provide")), "{errors:?}");
}

#[test]
fn unrelated_implementation_is_a_violation() {
	let v = check(
		r#"
capability "Other"
type "Plain" constructor=#true {
	implements "Other"
}
collection "Priority" capability="PriorityLevel"
option "Plain" collection="Priority" id=1 type="Plain"
"#,
	);
	let plan = plan(&v, "Priority");
	assert!(plan.blocked);
	assert_eq!(plan.options.len(), 1);
	let violation = v.diagnostics.iter().find(|d| d.is_error()).unwrap();
	assert_eq!(violation.kind, IssueKind::ConstraintViolation);
	assert_eq!(violation.declaration.as_deref(), Some("Plain"));
	assert_eq!(violation.collection.as_deref(), Some("Priority"));
}

#[rstest]
#[case::singleton_needs_constructor("singleton", "constructor=#false", true)]
#[case::singleton_with_constructor("singleton", "constructor=#true", false)]
#[case::factory_needs_hook("factory", "constructor=#true", true)]
#[case::factory_with_hook("factory", "factory=\"make_worker\"", false)]
fn construction_hook_follows_the_mode(#[case] mode: &str, #[case] hook: &str, #[case] blocked: bool) {
	let v = check(&format!(
		r#"
type "Worker" {hook} {{
	implements "Describe"
}}
collection "Workers" capability="Describe" mode="{mode}"
option "W" collection="Workers" id=1 type="Worker"
"#
	));
	assert_eq!(plan(&v, "Workers").blocked, blocked, "{:#?}", v.diagnostics);
}

#[rstest]
#[case::open_parameter("Exporter<T>", "generics \"T\"", "Exporter<Event>", false)]
#[case::exact_argument("Exporter<Event>", "", "Exporter<Event>", false)]
#[case::wrong_argument("Exporter<Event>", "", "Exporter<Metric>", true)]
#[case::argument_count("Exporter<Event>", "", "Exporter", true)]
#[case::nested_argument("Exporter<Vec<u8>>", "", "Exporter<Vec<u8>>", false)]
fn generic_arguments_must_be_compatible(
	#[case] required: &str,
	#[case] generics: &str,
	#[case] provided: &str,
	#[case] blocked: bool,
) {
	let v = check(&format!(
		r#"
capability "Exporter"
type "Json" constructor=#true {{
	implements "{provided}"
}}
collection "Exporters" capability="{required}" {{
	{generics}
}}
option "Json" collection="Exporters" id=1 type="Json"
"#
	));
	assert_eq!(plan(&v, "Exporters").blocked, blocked, "{:#?}", v.diagnostics);
}

#[test]
fn generic_implementation_cannot_be_constructed() {
	let v = check(
		r#"
type "Boxed" constructor=#true {
	implements "Describe"
	generics "T"
}
collection "Described" capability="Describe"
option "Boxed" collection="Described" id=1 type="Boxed"
"#,
	);
	assert!(plan(&v, "Described").blocked);
	assert!(errors(&v)[0].contains("unbound type parameter"));
}

#[test]
fn unused_collection_parameter_is_a_warning() {
	let v = check(
		r#"
collection "Described" capability="Describe" {
	generics "T"
}
option "High" collection="Described" id=1 type="HighPriority"
"#,
	);
	assert!(!plan(&v, "Described").blocked);
	assert_eq!(v.diagnostics.len(), 1);
	assert_eq!(v.diagnostics[0].severity, Severity::Warning);
}

#[test]
fn modes_cannot_be_mixed() {
	let v = check(
		r#"
collection "Priority" capability="PriorityLevel"
option "High" collection="Priority" id=1 type="HighPriority" mode="factory"
"#,
	);
	assert!(plan(&v, "Priority").blocked);
	assert!(errors(&v).iter().any(|m| m.contains("cannot be mixed")));
}

#[test]
fn secondary_keys_are_checked() {
	let v = check(
		r#"
collection "Priority" capability="PriorityLevel" {
	key "code" required=#true
}
option "High" collection="Priority" id=1 type="HighPriority" {
	key "colour" "red"
}
"#,
	);
	assert!(plan(&v, "Priority").blocked);
	let errors = errors(&v);
	assert_eq!(errors.len(), 2, "{errors:?}");
	assert!(errors.iter().any(|m| m.contains("'colour'")));
	assert!(errors.iter().any(|m| m.contains("required secondary key 'code'")));
}

#[rstest]
#[case(0, false)]
#[case(4096, false)]
#[case(-1, true)]
#[case(4097, true)]
fn array_storage_bounds_ids(#[case] id: i64, #[case] blocked: bool) {
	let v = check(&format!(
		r#"
collection "Priority" capability="PriorityLevel" storage="array"
option "High" collection="Priority" id={id} type="HighPriority"
"#
	));
	assert_eq!(plan(&v, "Priority").blocked, blocked);
}

#[test]
fn missing_description_warning_is_configurable() {
	let body = r#"
collection "Priority" capability="PriorityLevel"
option "High" collection="Priority" id=1 type="HighPriority"
"#;
	let v = check_with(body, &PipelineConfig::default());
	assert_eq!(v.diagnostics.len(), 1);
	assert_eq!(v.diagnostics[0].severity, Severity::Warning);
	assert!(!plan(&v, "Priority").blocked);

	assert!(check(body).diagnostics.is_empty());
}

#[test]
fn option_for_unknown_collection_is_reported() {
	let v = check("option \"High\" collection=\"Nowhere\" id=1 type=\"HighPriority\"\n");
	assert!(v.plans.is_empty());
	assert_eq!(v.diagnostics.len(), 1);
	assert_eq!(v.diagnostics[0].kind, IssueKind::ConstraintViolation);
	assert_eq!(v.diagnostics[0].collection.as_deref(), Some("Nowhere"));
}

#[test]
fn duplicate_collection_is_an_identity_collision() {
	let v = check(
		r#"
collection "Priority" capability="PriorityLevel"
collection "Priority" capability="Describe"
option "High" collection="Priority" id=1 type="HighPriority"
"#,
	);
	assert!(v.plans.is_empty());
	assert_eq!(v.diagnostics.len(), 1);
	assert_eq!(v.diagnostics[0].kind, IssueKind::IdentityCollision);
	assert_eq!(v.diagnostics[0].related.len(), 1);
}

#[test]
fn ambiguous_type_is_reported_once_and_blocks_its_users() {
	let program = Program::from_sources([
		(
			"core.kdl",
			r#"
module "core" {
	references "extra"
}
capability "Describe"
type "Thing" constructor=#true {
	implements "Describe"
}
collection "Things" capability="Describe"
option "Thing" collection="Things" id=1 type="Thing" description="d"
"#,
		),
		(
			"extra.kdl",
			r#"
module "extra"
type "Thing" constructor=#true {
	implements "Describe"
}
"#,
		),
	]);
	let scanned = scan(&program, "core", false).unwrap();
	let v = validate(&scanned, &PipelineConfig::default());

	assert!(plan(&v, "Things").blocked);
	let scan_issues: Vec<_> = v.diagnostics.iter().filter(|d| d.kind == IssueKind::ScanIssue).collect();
	assert_eq!(scan_issues.len(), 1);
	assert_eq!(scan_issues[0].module, "core");
	assert!(scan_issues[0].message.contains("declared 2 times"));
}

#[test]
fn plans_are_sorted_by_collection_name() {
	let v = check(
		r#"
collection "Zeta" capability="Describe"
collection "Alpha" capability="Describe"
collection "Mid" capability="Describe"
"#,
	);
	let names: Vec<_> = v.plans.iter().map(|p| p.definition.name.as_str()).collect();
	assert_eq!(names, ["Alpha", "Mid", "Zeta"]);
}
