//! Integration tests for the built-in schemas behind the registry and the
//! dispatch pipeline.
//!
//! Every sample must be claimed by exactly one scanner and deobfuscated by
//! automatic dispatch; selection strings resolve through the alias table.

mod support;

use pydeobf_core::{
    DeobfuscationFailure, Deobfuscator, FailureKind, Pipeline, PipelineError, RegistryError,
    SchemaRegistry, Selection,
};
use pydeobf_schemas::default_registry;
use regex::Regex;
use rstest::{fixture, rstest};

const HOOK: &str = "https://discord.com/api/webhooks/1234/integration-hook";

#[fixture]
fn registry() -> SchemaRegistry {
    default_registry().expect("built-in schemas register")
}

fn sample(schema: &str) -> String {
    match schema {
        "hyperion" => support::hyperion(support::HYPERION_SECOND_LAYER),
        "blankobf" => support::blankobf("print('blank')"),
        "fct" => support::fct("print('fct')"),
        "lzmaspam" => support::lzmaspam(HOOK),
        "vare" => support::vare("print('vare')"),
        "pyobfuscate" => support::pyobfuscate_lambda(),
        "pyobfuscate_dict" => support::pyobfuscate_dict(),
        other => panic!("no sample for {other}"),
    }
}

// ---------------------------------------------------------------------------
// Scanning and dispatch
// ---------------------------------------------------------------------------

#[rstest]
fn built_in_schemas_register_in_dispatch_order(registry: SchemaRegistry) {
    let labels: Vec<String> = registry.entries().iter().map(ToString::to_string).collect();
    assert_eq!(
        labels,
        [
            "hyperion v1",
            "blankobf v2",
            "fct v1",
            "lzmaspam v1",
            "vare v1",
            "pyobfuscate v1"
        ]
    );
}

#[rstest]
#[case::hyperion("hyperion")]
#[case::blankobf("blankobf")]
#[case::fct("fct")]
#[case::lzmaspam("lzmaspam")]
#[case::vare("vare")]
#[case::pyobfuscate("pyobfuscate")]
#[case::pyobfuscate_dict("pyobfuscate_dict")]
fn each_sample_is_claimed_by_one_scanner(registry: SchemaRegistry, #[case] sample_name: &str) {
    let claimed: Vec<&str> = registry
        .scan_all(&sample(sample_name))
        .into_iter()
        .map(|entry| entry.name())
        .collect();
    let schema = sample_name.trim_end_matches("_dict");
    assert_eq!(claimed, [schema]);
}

#[rstest]
fn plain_python_is_claimed_by_no_scanner(registry: SchemaRegistry) {
    assert!(registry.scan_all("print('hello')\n").is_empty());
    assert_eq!(
        Pipeline::new(&registry).run("print('hello')\n"),
        Err(PipelineError::NoCandidates)
    );
}

#[rstest]
fn hyperion_sample_is_unwound_by_automatic_dispatch(registry: SchemaRegistry) {
    let result = Pipeline::new(&registry)
        .run(&sample("hyperion"))
        .expect("hyperion succeeds");
    assert_eq!(result.schema, "hyperion v1");
    assert!(result.attempts.is_empty());
    let zeros = Regex::new(r"np\.zeros\(10\s?\*\*\s?14\)").expect("regex");
    let print = Regex::new(r"print\(\w+\)").expect("regex");
    assert!(zeros.is_match(&result.output), "{}", result.output);
    assert!(print.is_match(&result.output), "{}", result.output);
}

#[rstest]
#[case::blankobf("blankobf", "print('blank')")]
#[case::fct("fct", "print('fct')")]
#[case::lzmaspam("lzmaspam", HOOK)]
#[case::vare("vare", "print('vare')")]
#[case::pyobfuscate("pyobfuscate", "print('lambda')")]
#[case::pyobfuscate_dict("pyobfuscate_dict", "print('dict')")]
fn samples_are_deobfuscated_by_automatic_dispatch(
    registry: SchemaRegistry,
    #[case] sample_name: &str,
    #[case] expected: &str,
) {
    let schema = sample_name.trim_end_matches("_dict");
    let result = Pipeline::new(&registry)
        .run(&sample(sample_name))
        .expect("dispatch succeeds");
    assert!(result.schema.starts_with(schema), "{}", result.schema);
    assert!(result.output.contains(expected), "{}", result.output);
}

#[rstest]
fn forced_schemas_report_their_failures(registry: SchemaRegistry) {
    let outcome = Pipeline::new(&registry)
        .with_selection(Selection::Explicit("lzmaspam, fct".to_owned()))
        .skip_scan(true)
        .run(&sample("vare"));
    let Err(PipelineError::AllFailed(aggregate)) = &outcome else {
        panic!("expected every forced schema to fail, got {outcome:?}");
    };
    let attempted: Vec<&str> = aggregate
        .attempts
        .iter()
        .map(|attempt| attempt.schema.as_str())
        .collect();
    assert_eq!(attempted, ["lzmaspam v1", "fct v1"]);
    assert!(
        aggregate
            .attempts
            .iter()
            .all(|attempt| attempt.failure.kind() != FailureKind::IterationLimitExceeded)
    );
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[rstest]
#[case::vore("vore", "vare")]
#[case::hyperd("hyperd", "hyperion")]
#[case::spaced("Blank OBF", "blankobf")]
fn aliases_resolve_to_the_same_entry(
    registry: SchemaRegistry,
    #[case] alias: &str,
    #[case] name: &str,
) {
    let via_alias = registry.resolve(alias).expect("alias resolves");
    let direct = registry.resolve(name).expect("name resolves");
    assert_eq!(via_alias.len(), 1);
    assert!(
        via_alias
            .iter()
            .zip(&direct)
            .all(|(left, right)| std::ptr::eq(*left, *right))
    );
}

#[rstest]
fn versioned_tokens_select_one_entry(registry: SchemaRegistry) {
    let selected = registry.resolve("blankobf_v2, vore_1").expect("resolves");
    let labels: Vec<String> = selected.iter().map(ToString::to_string).collect();
    assert_eq!(labels, ["blankobf v2", "vare v1"]);
}

#[rstest]
fn unknown_schema_aborts_the_run(registry: SchemaRegistry) {
    assert_eq!(
        registry.resolve("not_a_real_schema").map(|entries| entries.len()),
        Err(RegistryError::UnknownSchema {
            name: "not_a_real_schema".to_owned()
        })
    );
    let outcome = Pipeline::new(&registry)
        .with_selection("not_a_real_schema".parse().expect("infallible"))
        .run(&sample("hyperion"));
    assert!(matches!(
        outcome,
        Err(PipelineError::Registry(RegistryError::UnknownSchema { .. }))
    ));
}

/// Claims every input and never succeeds.
struct Impostor;

impl Deobfuscator for Impostor {
    type Output = ();

    fn scan(&self, _source: &str) -> bool {
        true
    }

    fn deobfuscate(&self, _source: &str) -> Result<(), DeobfuscationFailure> {
        Err(DeobfuscationFailure::payload("impostor"))
    }

    fn format(&self, _output: ()) -> String {
        String::new()
    }
}

#[rstest]
fn duplicate_registration_keeps_the_first_entry(mut registry: SchemaRegistry) {
    assert_eq!(
        registry.register("Hyperd", 1, Impostor),
        Err(RegistryError::DuplicateVersion {
            name: "hyperion".to_owned(),
            version: 1
        })
    );
    assert_eq!(
        pydeobf_schemas::register_all(&mut registry),
        Err(RegistryError::DuplicateVersion {
            name: "hyperion".to_owned(),
            version: 1
        })
    );
    assert_eq!(registry.len(), 6);
    let entry = registry.get("hyperion", 1).expect("still registered");
    assert!(!entry.scan("print('hello')"));
    assert!(entry.scan(&sample("hyperion")));
}
