//! Unit tests for the layer driver.

use num_bigint::BigInt;
use pydeobf_syntax::ast::{Constant, Expr, Stmt};
use pydeobf_syntax::parse_module;
use rstest::{fixture, rstest};

use super::*;

fn counter(module: &Module) -> Option<&BigInt> {
    match module.body.as_slice() {
        [Stmt::Assign { targets, value }] if targets.as_slice() == [Expr::name("x")] => {
            match value {
                Expr::Constant(Constant::Int(count)) => Some(count),
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_counter(module: &Module) -> bool {
    counter(module).is_some()
}

fn increment(module: &Module) -> Result<Option<Module>, DeobfuscationFailure> {
    let Some(count) = counter(module) else {
        return Ok(None);
    };
    Ok(Some(parse_module(&format!("x = {}", count + 1u8))?))
}

fn nothing(_: &Module) -> Result<Option<Module>, DeobfuscationFailure> {
    Ok(None)
}

fn broken(_: &Module) -> Result<Option<Module>, DeobfuscationFailure> {
    Err(DeobfuscationFailure::payload("bad padding"))
}

const COUNTER: [LayerShape; 1] = [LayerShape {
    name: "counter",
    matches: is_counter,
    peel: increment,
}];

#[fixture]
fn start() -> Module {
    parse_module("x = 0").expect("valid")
}

fn reaches(target: u32) -> impl Fn(&Module, &[&'static str]) -> bool {
    move |module: &Module, _: &[&'static str]| counter(module) == Some(&BigInt::from(target))
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(5)]
fn stops_after_exactly_n_steps(start: Module, #[case] n: u32) {
    let driver = LayerDriver::new("counter", &COUNTER, 30);
    let peeled = driver.run(start, reaches(n)).expect("terminates");
    assert_eq!(peeled.steps(), usize::try_from(n).expect("small"));
    assert_eq!(counter(&peeled.module), Some(&BigInt::from(n)));
}

#[rstest]
fn cap_below_n_returns_the_kth_tree(start: Module) {
    let driver = LayerDriver::new("counter", &COUNTER, 3);
    let failure = driver.run(start, reaches(5)).expect_err("capped");
    assert_eq!(failure.failure.kind(), FailureKind::IterationLimitExceeded);
    assert_eq!(failure.steps, 3);
    assert_eq!(counter(&failure.partial), Some(&BigInt::from(3)));
}

#[rstest]
fn terminal_on_the_last_allowed_step_succeeds(start: Module) {
    let driver = LayerDriver::new("counter", &COUNTER, 4);
    let peeled = driver.run(start, reaches(4)).expect("terminates");
    assert_eq!(peeled.trail, ["counter"; 4]);
}

#[test]
fn unmatched_tree_is_unrecognized() {
    let driver = LayerDriver::new("counter", &COUNTER, 10);
    let module = parse_module("print(1)").expect("valid");
    let failure = driver.run(module.clone(), |_, _| false).expect_err("no shape");
    assert_eq!(failure.failure.kind(), FailureKind::UnrecognizedLayer);
    assert_eq!(failure.partial, module);
    assert_eq!(failure.steps, 0);
}

#[rstest]
fn empty_peel_is_layer_not_located(start: Module) {
    let shapes = [LayerShape {
        name: "empty",
        matches: is_counter,
        peel: nothing,
    }];
    let failure = LayerDriver::new("counter", &shapes, 10)
        .run(start, |_, _| false)
        .expect_err("nothing peeled");
    assert_eq!(failure.failure.kind(), FailureKind::LayerNotLocated);
}

#[rstest]
fn first_matching_shape_wins(start: Module) {
    let shapes = [
        LayerShape {
            name: "first",
            matches: is_counter,
            peel: increment,
        },
        LayerShape {
            name: "second",
            matches: is_counter,
            peel: broken,
        },
    ];
    let peeled = LayerDriver::new("counter", &shapes, 10)
        .run(start, |_, trail| trail.len() == 2)
        .expect("terminates");
    assert_eq!(peeled.trail, ["first", "first"]);
}

#[rstest]
fn peel_failures_keep_the_partial_tree(start: Module) {
    let shapes = [LayerShape {
        name: "broken",
        matches: is_counter,
        peel: broken,
    }];
    let failure = LayerDriver::new("counter", &shapes, 10)
        .run(start.clone(), |_, _| false)
        .expect_err("peel fails");
    assert_eq!(failure.partial, start);
    let converted = DeobfuscationFailure::from(failure);
    assert_eq!(converted.kind(), FailureKind::Payload);
    assert_eq!(
        converted.diagnostic("partial").map(ToString::to_string).as_deref(),
        Some("x = 0")
    );
    assert_eq!(
        converted.diagnostic("layer").map(ToString::to_string).as_deref(),
        Some("broken")
    );
}
