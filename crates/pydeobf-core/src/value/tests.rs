//! Unit tests for concrete value semantics.

use rstest::rstest;

use super::*;

fn int(value: i64) -> PyValue {
    PyValue::from(value)
}

fn big(value: i64) -> BigInt {
    BigInt::from(value)
}

// ---------------------------------------------------------------------------
// Binary operators
// ---------------------------------------------------------------------------

#[rstest]
#[case(int(3), BinaryOp::Add, int(4), int(7))]
#[case(int(3), BinaryOp::Sub, int(10), int(-7))]
#[case(int(-7), BinaryOp::FloorDiv, int(2), int(-4))]
#[case(int(-7), BinaryOp::Mod, int(2), int(1))]
#[case(int(7), BinaryOp::Div, int(2), PyValue::Float(3.5))]
#[case(int(10), BinaryOp::Pow, int(14), PyValue::Int(big(100_000_000_000_000)))]
#[case(int(2), BinaryOp::Pow, int(-1), PyValue::Float(0.5))]
#[case(int(1), BinaryOp::LShift, int(10), int(1024))]
#[case(int(-5), BinaryOp::RShift, int(1), int(-3))]
#[case(int(172), BinaryOp::BitXor, int(255), int(83))]
#[case(PyValue::Bool(true), BinaryOp::Add, PyValue::Bool(true), int(2))]
#[case(PyValue::Bool(true), BinaryOp::BitXor, PyValue::Bool(true), PyValue::Bool(false))]
#[case(PyValue::Float(-7.0), BinaryOp::Mod, int(2), PyValue::Float(1.0))]
#[case(PyValue::from("ab"), BinaryOp::Add, PyValue::from("cd"), PyValue::from("abcd"))]
#[case(PyValue::from("ab"), BinaryOp::Mult, int(3), PyValue::from("ababab"))]
#[case(int(2), BinaryOp::Mult, PyValue::from(b"x".to_vec()), PyValue::from(b"xx".to_vec()))]
#[case(PyValue::List(vec![int(1)]), BinaryOp::Add, PyValue::List(vec![int(2)]), PyValue::List(vec![int(1), int(2)]))]
#[case(
    PyValue::List(vec![int(1), int(2)]),
    BinaryOp::Mult,
    int(2),
    PyValue::List(vec![int(1), int(2), int(1), int(2)])
)]
#[case(PyValue::List(vec![int(1)]), BinaryOp::Mult, int(-1), PyValue::List(vec![]))]
fn binary_follows_python(
    #[case] lhs: PyValue,
    #[case] op: BinaryOp,
    #[case] rhs: PyValue,
    #[case] expected: PyValue,
) {
    assert_eq!(lhs.binary(op, &rhs).expect("fold"), expected);
}

#[rstest]
#[case(int(1), BinaryOp::FloorDiv, int(0))]
#[case(int(1), BinaryOp::Div, int(0))]
#[case(PyValue::Float(1.0), BinaryOp::Mod, PyValue::Float(0.0))]
fn division_by_zero_is_reported(#[case] lhs: PyValue, #[case] op: BinaryOp, #[case] rhs: PyValue) {
    assert_eq!(lhs.binary(op, &rhs), Err(EvalError::ZeroDivision));
}

#[rstest]
#[case(int(10), BinaryOp::Pow, int(1_000_000))]
#[case(int(1), BinaryOp::LShift, int(1 << 40))]
#[case(PyValue::from("x"), BinaryOp::Mult, int(1 << 40))]
fn oversized_results_are_refused(#[case] lhs: PyValue, #[case] op: BinaryOp, #[case] rhs: PyValue) {
    assert!(matches!(
        lhs.binary(op, &rhs),
        Err(EvalError::TooLarge { .. })
    ));
}

#[rstest]
#[case(PyValue::from("a"), BinaryOp::Add, int(1))]
#[case(PyValue::from(b"a".to_vec()), BinaryOp::Add, PyValue::from("a"))]
#[case(PyValue::None, BinaryOp::Sub, int(1))]
#[case(PyValue::Float(1.0), BinaryOp::BitOr, int(1))]
fn mismatched_operands_are_unsupported(
    #[case] lhs: PyValue,
    #[case] op: BinaryOp,
    #[case] rhs: PyValue,
) {
    assert!(matches!(
        lhs.binary(op, &rhs),
        Err(EvalError::UnsupportedOperands { .. })
    ));
}

// ---------------------------------------------------------------------------
// Unary operators and comparisons
// ---------------------------------------------------------------------------

#[rstest]
#[case(UnaryOp::USub, int(5), int(-5))]
#[case(UnaryOp::Invert, int(0), int(-1))]
#[case(UnaryOp::UAdd, PyValue::Bool(true), int(1))]
#[case(UnaryOp::Not, PyValue::from(""), PyValue::Bool(true))]
#[case(UnaryOp::USub, PyValue::Float(2.5), PyValue::Float(-2.5))]
fn unary_follows_python(#[case] op: UnaryOp, #[case] operand: PyValue, #[case] expected: PyValue) {
    assert_eq!(operand.unary(op).expect("fold"), expected);
}

#[test]
fn unary_minus_on_str_is_unsupported() {
    assert!(PyValue::from("a").unary(UnaryOp::USub).is_err());
}

#[rstest]
#[case(int(1), CmpOp::Eq, PyValue::Bool(true), true)]
#[case(int(1), CmpOp::Lt, PyValue::Float(1.5), true)]
#[case(PyValue::from("b"), CmpOp::Gt, PyValue::from("a"), true)]
#[case(PyValue::from("a"), CmpOp::Eq, int(1), false)]
#[case(PyValue::from("a"), CmpOp::NotEq, int(1), true)]
fn comparisons_follow_python(
    #[case] lhs: PyValue,
    #[case] op: CmpOp,
    #[case] rhs: PyValue,
    #[case] expected: bool,
) {
    assert_eq!(lhs.compare(op, &rhs).expect("compare"), expected);
}

#[test]
fn ordering_unrelated_types_fails() {
    assert!(PyValue::from("a").compare(CmpOp::Lt, &int(1)).is_err());
}

// ---------------------------------------------------------------------------
// Indexing and slicing
// ---------------------------------------------------------------------------

#[rstest]
#[case(PyValue::from("hello"), int(1), PyValue::from("e"))]
#[case(PyValue::from("hello"), int(-1), PyValue::from("o"))]
#[case(PyValue::from("héllo"), int(1), PyValue::from("é"))]
#[case(PyValue::from(b"AB".to_vec()), int(0), int(65))]
#[case(PyValue::List(vec![int(4), int(5)]), PyValue::Bool(true), int(5))]
fn index_reads_one_element(#[case] seq: PyValue, #[case] at: PyValue, #[case] expected: PyValue) {
    assert_eq!(seq.index(&at).expect("index"), expected);
}

#[rstest]
#[case(int(5))]
#[case(int(-6))]
fn index_past_the_end_fails(#[case] at: PyValue) {
    assert_eq!(
        PyValue::from("hello").index(&at),
        Err(EvalError::IndexOutOfRange { kind: "str" })
    );
}

#[rstest]
#[case(Some(0), Some(1), None, "h")]
#[case(None, None, Some(-1), "olleh")]
#[case(Some(-3), None, None, "llo")]
#[case(Some(1), Some(100), Some(2), "el")]
#[case(Some(10), None, None, "")]
#[case(None, Some(-10), None, "")]
#[case(Some(-1), Some(-10), Some(-2), "olh")]
fn slice_matches_python(
    #[case] lower: Option<i64>,
    #[case] upper: Option<i64>,
    #[case] step: Option<i64>,
    #[case] expected: &str,
) {
    let (lower, upper, step) = (lower.map(big), upper.map(big), step.map(big));
    let sliced = PyValue::from("hello")
        .slice(lower.as_ref(), upper.as_ref(), step.as_ref())
        .expect("slice");
    assert_eq!(sliced, PyValue::from(expected));
}

#[test]
fn zero_step_is_rejected() {
    let err = PyValue::from("ab")
        .slice(None, None, Some(&big(0)))
        .expect_err("zero step");
    assert_eq!(err, EvalError::value("slice step cannot be zero"));
}

#[test]
fn slicing_bytes_keeps_bytes() {
    let sliced = PyValue::from(b"abcdef".to_vec())
        .slice(None, None, Some(&big(-2)))
        .expect("slice");
    assert_eq!(sliced, PyValue::from(b"fdb".to_vec()));
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

#[rstest]
#[case(PyValue::from("it's"), "\"it's\"", "it's")]
#[case(PyValue::from(b"\x00a".to_vec()), "b'\\x00a'", "b'\\x00a'")]
#[case(PyValue::List(vec![int(1), PyValue::from("a")]), "[1, 'a']", "[1, 'a']")]
#[case(PyValue::Float(1e16), "1e+16", "1e+16")]
#[case(PyValue::None, "None", "None")]
fn repr_and_str_match_python(#[case] value: PyValue, #[case] repr: &str, #[case] text: &str) {
    assert_eq!(value.py_repr(), repr);
    assert_eq!(value.py_str(), text);
}

#[test]
fn literal_expressions_convert_both_ways() {
    let expr = Expr::List(vec![
        Expr::int(1),
        Expr::UnaryOp {
            op: UnaryOp::USub,
            operand: Box::new(Expr::int(2)),
        },
        Expr::str("x"),
    ]);
    let value = PyValue::from_expr(&expr).expect("literal");
    assert_eq!(
        value,
        PyValue::List(vec![int(1), int(-2), PyValue::from("x")])
    );
    assert_eq!(
        value.to_expr(),
        Expr::List(vec![Expr::int(1), Expr::int(-2), Expr::str("x")])
    );
}

#[test]
fn names_are_not_literals() {
    assert_eq!(PyValue::from_expr(&Expr::name("x")), None);
}

#[rstest]
#[case(PyValue::None, false)]
#[case(int(0), false)]
#[case(PyValue::Float(0.1), true)]
#[case(PyValue::List(Vec::new()), false)]
#[case(PyValue::from(b"\x00".to_vec()), true)]
fn truthiness_matches_python(#[case] value: PyValue, #[case] expected: bool) {
    assert_eq!(value.truthy(), expected);
}
