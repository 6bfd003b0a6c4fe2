//! Unit tests for the symbolic transformer and cleanup pass.

use pydeobf_syntax::{parse_module, unparse, unparse_expr};
use rstest::rstest;

use super::*;
use crate::mock::{Method, ModuleKind, ScopeKind};

fn transform(source: &str) -> (String, Vec<FoldIssue>) {
    let module = parse_module(source).expect("valid source");
    let mut transformer = SymbolicTransformer::new();
    let folded = transformer.transform(module);
    let (namespace, issues) = transformer.into_parts();
    let cleaned = MockCleanup::new(&namespace).clean(folded);
    (unparse(&cleaned), issues)
}

fn folded(source: &str) -> String {
    transform(source).0
}

fn mock(value: impl Into<PyValue>) -> MockValue {
    MockValue::from_value(value.into()).expect("mockable")
}

// ---------------------------------------------------------------------------
// Constant folding
// ---------------------------------------------------------------------------

#[rstest]
#[case::addition("x = 3 + 4", "x = 7")]
#[case::subtraction_chain("x = 10 - 3 - 2", "x = 5")]
#[case::bool_promotes("x = True + 1", "x = 2")]
#[case::negation("x = -(2 + 3)", "x = -5")]
#[case::str_slice("y = 'ab'[0:1]", "y = 'a'")]
#[case::str_index("y = 'abc'[-1]", "y = 'c'")]
#[case::list_index("y = ['p', 'q'][1]", "y = 'q'")]
#[case::stepped_slice("y = 'abcdef'[::2]", "y = 'ace'")]
#[case::or_short_circuits("x = 0 or 5", "x = 5")]
#[case::and_short_circuits("x = 1 and 0", "x = 0")]
#[case::and_returns_last("x = True and 2", "x = 2")]
#[case::eval_of_literal("x = eval('1 + 2')", "x = 3")]
#[case::str_join("x = ''.join(['a', 'b'])", "x = 'ab'")]
#[case::conversion_result_is_embedded("x = str(12) + ''", "x = '12' + ''")]
#[case::list_literal_index("x = [1, 2 + 3][1]", "x = 5")]
fn folds_statically_known_expressions(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(folded(source), expected);
}

#[rstest]
#[case::power("np.zeros(10 ** 14)")]
#[case::multiplication("x = 6 * 7")]
#[case::unknown_name("x = y + 1")]
#[case::comparison("x = 1 < 2")]
fn leaves_operations_outside_the_model(#[case] source: &str) {
    assert_eq!(folded(source), source);
}

// ---------------------------------------------------------------------------
// Unfoldable nodes
// ---------------------------------------------------------------------------

#[test]
fn callee_without_behaviour_is_passed_through() {
    let (output, issues) = transform("x = exec('1')");
    assert_eq!(output, "x = exec('1')");
    assert_eq!(
        issues.first().map(|issue| &issue.error),
        Some(&MockError::not_callable("exec"))
    );
}

#[test]
fn missing_scope_key_is_reported() {
    let (output, issues) = transform("x = globals()['missing']");
    assert_eq!(output, "x = globals()['missing']");
    assert!(matches!(
        issues.as_slice(),
        [FoldIssue {
            error: MockError::KeyNotFound { .. },
            ..
        }]
    ));
}

#[test]
fn evaluation_errors_leave_the_node() {
    let (output, issues) = transform("x = 'ab'[5]");
    assert_eq!(output, "x = 'ab'[5]");
    assert!(matches!(
        issues.first().map(|issue| &issue.error),
        Some(MockError::Evaluation(_))
    ));
}

// ---------------------------------------------------------------------------
// exec, eval and scope writes
// ---------------------------------------------------------------------------

#[test]
fn exec_of_known_source_is_spliced() {
    assert_eq!(folded(r"exec('a = 1\nb = 2')"), "a = 1\nb = 2");
}

#[test]
fn exec_through_getattr_is_spliced() {
    let source = "getattr(__import__('builtins'), 'exec')('print(1)')";
    assert_eq!(folded(source), "print(1)");
}

#[test]
fn exec_of_compiled_bytes_is_spliced() {
    let source = "exec(compile(b'print(2)', '<string>', 'exec'))";
    assert_eq!(folded(source), "print(2)");
}

#[test]
fn scope_writes_are_recorded_and_read_back() {
    let source = "globals()['_k'] = 'print(1)'\nexec(globals()['_k'])";
    assert_eq!(folded(source), "print(1)");
}

#[test]
fn namespace_getter_lambdas_fold() {
    let source = "(lambda _: globals())(0)['k'] = 5\ny = (lambda: vars())()['k']";
    assert_eq!(folded(source), "y = 5");
}

#[test]
fn nested_exec_stops_at_the_nesting_limit() {
    let source = "globals()['s'] = \"exec(globals()['s'])\"\nexec(globals()['s'])";
    let (output, issues) = transform(source);
    assert_eq!(output, "exec(\"exec(globals()['s'])\")");
    assert!(issues.iter().any(|issue| matches!(
        &issue.error,
        MockError::InvalidArguments { name, .. } if name == "exec"
    )));
}

#[test]
fn invalid_exec_source_is_kept() {
    let (output, issues) = transform("exec('def (')");
    assert_eq!(output, "exec('def (')");
    assert_eq!(issues.len(), 1);
}

#[test]
fn folding_descends_into_function_bodies() {
    let source = "def f():\n    return 'a' + ''[0:0]";
    assert_eq!(folded(source), "def f():\n    return 'a' + ''");
}

// ---------------------------------------------------------------------------
// Cleanup
// ---------------------------------------------------------------------------

#[test]
fn cleanup_substitutes_every_local_binding() {
    let mut namespace = Namespace::new();
    namespace.insert("key", mock("v"));
    namespace.insert("scope", MockValue::scope(ScopeKind::Globals));
    namespace.insert("run", MockValue::builtin(Builtin::Exec));
    let module = parse_module("def f():\n    return key, scope, run, exec").expect("valid");
    let cleaned = MockCleanup::new(&namespace).clean(module);
    assert_eq!(
        unparse(&cleaned),
        "def f():\n    return ('v', globals(), exec, exec)"
    );
}

#[rstest]
#[case::builtin(
    "def f():\n    return k('x')\nglobals()['k'] = getattr(__import__('builtins'), 'str')",
    "def f():\n    return str('x')"
)]
#[case::namespace_getter(
    "def f():\n    return g()['a']\nglobals()['g'] = lambda _: globals()",
    "def f():\n    return (lambda *_: globals())()['a']"
)]
#[case::module(
    "class C:\n    m = b.hexlify\nglobals()['b'] = __import__('binascii')",
    "class C:\n    m = __import__('binascii').hexlify"
)]
fn earlier_uses_of_symbolic_bindings_stay_defined(#[case] source: &str, #[case] expected: &str) {
    assert_eq!(folded(source), expected);
}

#[rstest]
#[case("globals()['a'] = 'x = 1'\nexec(globals()['a'])\nprint(a)")]
#[case("def f():\n    return k\nglobals()['k'] = 3")]
#[case("x = eval('[1, 2]')[0] + 1")]
fn cleanup_is_idempotent(#[case] source: &str) {
    let module = parse_module(source).expect("valid");
    let mut transformer = SymbolicTransformer::new();
    let folded = transformer.transform(module);
    let namespace = transformer.namespace().clone();
    let once = MockCleanup::new(&namespace).clean(folded);
    let twice = MockCleanup::new(&namespace).clean(once.clone());
    assert_eq!(once, twice);
}

#[test]
fn later_bindings_reach_earlier_uses() {
    assert_eq!(
        folded("def f():\n    return k\nglobals()['k'] = 3"),
        "def f():\n    return 3"
    );
}

#[rstest]
#[case(MockValue::code("x"), "compile('x', '<string>', 'exec')")]
#[case(MockValue::module(ModuleKind::Binascii), "__import__('binascii')")]
#[case(MockValue::scope(ScopeKind::Locals), "locals()")]
#[case(MockValue::namespace_getter(ScopeKind::Globals), "lambda *_: globals()")]
#[case(MockValue::builtin(Builtin::Exec), "exec")]
#[case(MockValue::builtin(Builtin::Getattr), "getattr")]
#[case(MockValue::unknown("thing"), "thing")]
#[case(mock(PyValue::List(vec![PyValue::from(1), PyValue::from("a")])), "[1, 'a']")]
fn mocks_revert_to_syntax(#[case] value: MockValue, #[case] expected: &str) {
    assert_eq!(unparse_expr(&revert(&value)), expected);
}

#[test]
fn bound_methods_revert_to_attributes() {
    let join = mock(",").get_attr(Method::Join.name()).expect("join");
    assert_eq!(unparse_expr(&revert(&join)), "','.join");
}
