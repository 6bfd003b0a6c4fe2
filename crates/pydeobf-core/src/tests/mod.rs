//! Crate-level integration and BDD tests.

use pydeobf_syntax::ast::Module;
use pydeobf_syntax::{parse_module, unparse};

use crate::driver::{LayerDriver, LayerShape};
use crate::failure::{DeobfuscationFailure, FailureKind};
use crate::transform::{MockCleanup, SymbolicTransformer};


/// One symbolic pass; `None` when the pass changes nothing.
fn fold_pass(module: &Module) -> Result<Option<Module>, DeobfuscationFailure> {
    let mut transformer = SymbolicTransformer::new();
    let folded = transformer.transform(module.clone());
    let (namespace, _) = transformer.into_parts();
    let cleaned = MockCleanup::new(&namespace).clean(folded);
    Ok((cleaned != *module).then_some(cleaned))
}

fn has_exec(module: &Module) -> bool {
    unparse(module).contains("exec(")
}

const EXEC_LAYER: [LayerShape; 1] = [LayerShape {
    name: "exec",
    matches: has_exec,
    peel: fold_pass,
}];

#[test]
fn driver_and_transformer_unwind_nested_exec() {
    let module = parse_module(
        "globals()['p'] = 'print(42)'\nexec(eval(\"globals()['p']\"))",
    )
    .expect("valid");
    let peeled = LayerDriver::new("nested", &EXEC_LAYER, 5)
        .run(module, |tree, _| !has_exec(tree))
        .expect("unwinds");
    assert_eq!(unparse(&peeled.module), "print(42)");
    assert_eq!(peeled.steps(), 1);
}

#[test]
fn stuck_layers_are_not_located() {
    let module = parse_module("exec(payload)").expect("valid");
    let failure = LayerDriver::new("nested", &EXEC_LAYER, 5)
        .run(module, |tree, _| !has_exec(tree))
        .expect_err("payload is unknown");
    assert_eq!(failure.failure.kind(), FailureKind::LayerNotLocated);
    assert_eq!(unparse(&failure.partial), "exec(payload)");
}
