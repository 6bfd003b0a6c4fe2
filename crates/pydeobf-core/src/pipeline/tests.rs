//! Unit tests for the dispatch pipeline.

use rstest::{fixture, rstest};

use super::*;
use crate::failure::FailureKind;
use crate::registry::Deobfuscator;

/// Accepts sources containing `marker`; fails unless `works` is set.
struct Stub {
    marker: &'static str,
    works: bool,
}

impl Deobfuscator for Stub {
    type Output = &'static str;

    fn scan(&self, source: &str) -> bool {
        source.contains(self.marker)
    }

    fn deobfuscate(&self, _source: &str) -> Result<Self::Output, DeobfuscationFailure> {
        if self.works {
            Ok(self.marker)
        } else {
            Err(DeobfuscationFailure::payload(format!("{} payload is corrupt", self.marker))
                .with_diagnostic("payload", b"\x00\x01".to_vec()))
        }
    }

    fn format(&self, output: Self::Output) -> String {
        format!("decoded by {output}")
    }
}

#[fixture]
fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    for (name, marker, works) in [("alpha", "A", false), ("beta", "B", true), ("gamma", "C", false)] {
        registry
            .register(name, 1, Stub { marker, works })
            .expect("register");
    }
    registry
}

#[rstest]
#[case("auto", Selection::Auto)]
#[case("Auto", Selection::Auto)]
#[case("beta", Selection::Explicit("beta".to_owned()))]
fn selections_parse(#[case] option: &str, #[case] expected: Selection) {
    assert_eq!(option.parse::<Selection>(), Ok(expected));
}

#[rstest]
fn first_success_stops_the_run(registry: SchemaRegistry) {
    let result = Pipeline::new(&registry).run("A B C").expect("beta succeeds");
    assert_eq!(result.schema, "beta v1");
    assert_eq!(result.output, "decoded by B");
    let failed: Vec<&str> = result.attempts.iter().map(|a| a.schema.as_str()).collect();
    assert_eq!(failed, ["alpha v1"]);
}

#[rstest]
fn scanning_filters_candidates(registry: SchemaRegistry) {
    let pipeline = Pipeline::new(&registry);
    let names: Vec<String> = pipeline
        .candidates("C then A")
        .expect("resolves")
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(names, ["alpha v1", "gamma v1"]);
}

#[rstest]
fn all_failures_are_aggregated(registry: SchemaRegistry) {
    let err = Pipeline::new(&registry).run("A C").expect_err("both fail");
    let PipelineError::AllFailed(aggregate) = err else {
        panic!("expected an aggregate failure, got {err:?}");
    };
    assert_eq!(aggregate.attempts.len(), 2);
    assert!(aggregate.to_string().contains("alpha v1, gamma v1"));
    for attempt in &aggregate.attempts {
        assert_eq!(attempt.failure.kind(), FailureKind::Payload);
        assert!(attempt.failure.diagnostic("payload").is_some());
    }
}

#[rstest]
fn skip_scan_tries_every_selected_schema(registry: SchemaRegistry) {
    let result = Pipeline::new(&registry)
        .with_selection(Selection::Explicit("gamma,beta".to_owned()))
        .skip_scan(true)
        .run("no markers here")
        .expect("beta succeeds without scanning");
    assert_eq!(result.schema, "beta v1");
    assert_eq!(result.attempts.len(), 1);
}

#[rstest]
fn nothing_scanned_means_no_candidates(registry: SchemaRegistry) {
    assert_eq!(
        Pipeline::new(&registry).run("plain code"),
        Err(PipelineError::NoCandidates)
    );
}

#[rstest]
fn bad_selection_aborts_before_running(registry: SchemaRegistry) {
    let err = Pipeline::new(&registry)
        .with_selection(Selection::Explicit("not_a_real_schema".to_owned()))
        .run("A B C")
        .expect_err("unknown schema");
    assert_eq!(
        err,
        PipelineError::Registry(RegistryError::unknown_schema("not_a_real_schema"))
    );
}
