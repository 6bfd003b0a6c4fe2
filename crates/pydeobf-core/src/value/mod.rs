//! Concrete Python values and the subset of their semantics folding needs.
//!
//! [`PyValue`] is the payload a mock carries once it is known. Operators follow
//! CPython: integers are arbitrary precision, `/` always yields a float, floor
//! division and modulo round towards negative infinity, and sequences index by
//! code point with `slice.indices` clamping. Operations whose result would be
//! unreasonably large are refused with [`EvalError::TooLarge`] so a hostile
//! sample cannot make the folder allocate gigabytes.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use pydeobf_syntax::ast::{BinaryOp, CmpOp, Constant, Expr, UnaryOp};
use pydeobf_syntax::{repr_bytes, repr_float, repr_str};
use thiserror::Error;

/// Largest sequence a fold may produce, in elements.
pub const MAX_SEQUENCE_LEN: usize = 1 << 24;

/// Largest integer a fold may produce, in bits.
pub const MAX_INT_BITS: u64 = 1 << 16;

/// Errors raised while evaluating an operation on concrete values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EvalError {
    /// The operator is not defined for the operand types.
    #[error("unsupported operand type(s) for {op}: '{left}' and '{right}'")]
    UnsupportedOperands {
        /// Operator symbol.
        op: &'static str,
        /// Python type name of the left operand.
        left: &'static str,
        /// Python type name of the right operand.
        right: &'static str,
    },

    /// The unary operator is not defined for the operand type.
    #[error("bad operand type for unary {op}: '{operand}'")]
    UnsupportedOperand {
        /// Operator symbol.
        op: &'static str,
        /// Python type name of the operand.
        operand: &'static str,
    },

    /// Division or modulo by zero.
    #[error("division by zero")]
    ZeroDivision,

    /// An index fell outside the sequence.
    #[error("{kind} index out of range")]
    IndexOutOfRange {
        /// Python type name of the indexed sequence.
        kind: &'static str,
    },

    /// The result would exceed the folding size bounds.
    #[error("result of {op} is too large to fold")]
    TooLarge {
        /// Operator symbol.
        op: &'static str,
    },

    /// The operands have the right types but an invalid value.
    #[error("{message}")]
    Value {
        /// Description of the rejected value.
        message: String,
    },
}

impl EvalError {
    /// Creates a value error.
    #[must_use]
    pub fn value(message: impl Into<String>) -> Self {
        Self::Value {
            message: message.into(),
        }
    }
}

/// A concrete Python value.
#[derive(Debug, Clone, PartialEq)]
pub enum PyValue {
    /// `None`.
    None,
    /// `True` or `False`.
    Bool(bool),
    /// An arbitrary precision integer.
    Int(BigInt),
    /// A double precision float.
    Float(f64),
    /// A text string.
    Str(String),
    /// A byte string.
    Bytes(Vec<u8>),
    /// A list of values.
    List(Vec<PyValue>),
}

impl From<bool> for PyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PyValue {
    fn from(value: i32) -> Self {
        Self::Int(BigInt::from(value))
    }
}

impl From<i64> for PyValue {
    fn from(value: i64) -> Self {
        Self::Int(BigInt::from(value))
    }
}

impl From<BigInt> for PyValue {
    fn from(value: BigInt) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PyValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for PyValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for PyValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Numeric view of an operand after `bool` to `int` promotion.
enum Number {
    Int(BigInt),
    Float(f64),
}

impl PyValue {
    /// Returns the Python type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
        }
    }

    /// Converts a literal node, if it has a concrete value.
    #[must_use]
    pub fn from_constant(constant: &Constant) -> Option<Self> {
        match constant {
            Constant::None => Some(Self::None),
            Constant::Bool(value) => Some(Self::Bool(*value)),
            Constant::Int(value) => Some(Self::Int(value.clone())),
            Constant::Float(value) => Some(Self::Float(*value)),
            Constant::Str(value) => Some(Self::Str(value.clone())),
            Constant::Bytes(value) => Some(Self::Bytes(value.clone())),
            Constant::Ellipsis => None,
        }
    }

    /// Converts a literal expression, including lists and tuples of literals
    /// and negated numbers.
    #[must_use]
    pub fn from_expr(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Constant(constant) => Self::from_constant(constant),
            Expr::List(items) | Expr::Tuple(items) => items
                .iter()
                .map(Self::from_expr)
                .collect::<Option<Vec<_>>>()
                .map(Self::List),
            Expr::UnaryOp { op, operand } => Self::from_expr(operand)?.unary(*op).ok(),
            _ => None,
        }
    }

    /// Renders the value as a literal expression.
    #[must_use]
    pub fn to_expr(&self) -> Expr {
        match self {
            Self::None => Expr::Constant(Constant::None),
            Self::Bool(value) => Expr::Constant(Constant::Bool(*value)),
            Self::Int(value) => Expr::Constant(Constant::Int(value.clone())),
            Self::Float(value) => Expr::Constant(Constant::Float(*value)),
            Self::Str(value) => Expr::str(value.clone()),
            Self::Bytes(value) => Expr::bytes(value.clone()),
            Self::List(items) => Expr::List(items.iter().map(Self::to_expr).collect()),
        }
    }

    /// Returns the integer value, promoting `bool`.
    #[must_use]
    pub fn as_int(&self) -> Option<BigInt> {
        match self {
            Self::Bool(value) => Some(BigInt::from(u8::from(*value))),
            Self::Int(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the text of a `str` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the contents of a `bytes` value.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// Python truthiness.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(value) => *value,
            Self::Int(value) => !value.is_zero(),
            Self::Float(value) => *value != 0.0,
            Self::Str(value) => !value.is_empty(),
            Self::Bytes(value) => !value.is_empty(),
            Self::List(items) => !items.is_empty(),
        }
    }

    /// Python `repr()`.
    #[must_use]
    pub fn py_repr(&self) -> String {
        match self {
            Self::None => "None".to_owned(),
            Self::Bool(true) => "True".to_owned(),
            Self::Bool(false) => "False".to_owned(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => repr_float(*value),
            Self::Str(value) => repr_str(value),
            Self::Bytes(value) => repr_bytes(value),
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(Self::py_repr).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }

    /// Python `str()`.
    #[must_use]
    pub fn py_str(&self) -> String {
        match self {
            Self::Str(value) => value.clone(),
            other => other.py_repr(),
        }
    }

    fn number(&self) -> Option<Number> {
        match self {
            Self::Float(value) => Some(Number::Float(*value)),
            other => other.as_int().map(Number::Int),
        }
    }

    /// Applies a unary operator.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnsupportedOperand`] when the operator is not
    /// defined for the operand type.
    #[expect(clippy::float_arithmetic, reason = "float negation follows Python")]
    pub fn unary(&self, op: UnaryOp) -> Result<Self, EvalError> {
        let unsupported = || EvalError::UnsupportedOperand {
            op: op.symbol(),
            operand: self.type_name(),
        };
        match (op, self.number()) {
            (UnaryOp::Not, _) => Ok(Self::Bool(!self.truthy())),
            (UnaryOp::UAdd, Some(Number::Int(value))) => Ok(Self::Int(value)),
            (UnaryOp::USub, Some(Number::Int(value))) => Ok(Self::Int(-value)),
            (UnaryOp::Invert, Some(Number::Int(value))) => Ok(Self::Int(!value)),
            (UnaryOp::UAdd, Some(Number::Float(value))) => Ok(Self::Float(value)),
            (UnaryOp::USub, Some(Number::Float(value))) => Ok(Self::Float(-value)),
            _ => Err(unsupported()),
        }
    }

    /// Applies a binary operator.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] when the operator is not defined for the
    /// operand types, on division by zero, or when the result would exceed the
    /// folding size bounds.
    pub fn binary(&self, op: BinaryOp, rhs: &Self) -> Result<Self, EvalError> {
        let unsupported = || EvalError::UnsupportedOperands {
            op: op.symbol(),
            left: self.type_name(),
            right: rhs.type_name(),
        };
        match (op, self, rhs) {
            (BinaryOp::Add, Self::Str(a), Self::Str(b)) => {
                check_len(a.len().saturating_add(b.len()), op)?;
                Ok(Self::Str(format!("{a}{b}")))
            }
            (BinaryOp::Add, Self::Bytes(a), Self::Bytes(b)) => {
                check_len(a.len().saturating_add(b.len()), op)?;
                Ok(Self::Bytes([a.as_slice(), b.as_slice()].concat()))
            }
            (BinaryOp::Add, Self::List(a), Self::List(b)) => {
                check_len(a.len().saturating_add(b.len()), op)?;
                Ok(Self::List([a.as_slice(), b.as_slice()].concat()))
            }
            (BinaryOp::Mult, Self::Str(_) | Self::Bytes(_) | Self::List(_), count) => {
                self.repeat(count, op).ok_or_else(unsupported)?
            }
            (BinaryOp::Mult, count, Self::Str(_) | Self::Bytes(_) | Self::List(_)) => {
                rhs.repeat(count, op).ok_or_else(unsupported)?
            }
            (BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor, Self::Bool(a), Self::Bool(b)) => {
                Ok(Self::Bool(match op {
                    BinaryOp::BitAnd => a & b,
                    BinaryOp::BitOr => a | b,
                    _ => a ^ b,
                }))
            }
            _ => match (self.number(), rhs.number()) {
                (Some(Number::Int(a)), Some(Number::Int(b))) => int_binary(op, &a, &b),
                (Some(a), Some(b)) => {
                    float_binary(op, a.to_f64(op.symbol())?, b.to_f64(op.symbol())?)
                        .ok_or_else(unsupported)?
                }
                _ => Err(unsupported()),
            },
        }
    }

    /// Sequence repetition; `None` when `count` is not an integer or `self`
    /// is not a sequence.
    fn repeat(&self, count: &Self, op: BinaryOp) -> Option<Result<Self, EvalError>> {
        let requested = count.as_int()?;
        let times = if requested.is_negative() {
            0
        } else {
            requested.to_usize().unwrap_or(usize::MAX)
        };
        let len = match self {
            Self::Str(value) => value.len(),
            Self::Bytes(value) => value.len(),
            Self::List(items) => items.len(),
            _ => return None,
        };
        if let Err(err) = check_len(len.saturating_mul(times), op) {
            return Some(Err(err));
        }
        Some(Ok(match self {
            Self::Str(value) => Self::Str(value.repeat(times)),
            Self::Bytes(value) => Self::Bytes(value.repeat(times)),
            Self::List(items) => {
                Self::List(std::iter::repeat_n(items.iter().cloned(), times).flatten().collect())
            }
            _ => return None,
        }))
    }

    /// Evaluates a single comparison.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnsupportedOperands`] for ordering comparisons
    /// between unrelated types and for identity or membership tests.
    pub fn compare(&self, op: CmpOp, rhs: &Self) -> Result<bool, EvalError> {
        let unsupported = || EvalError::UnsupportedOperands {
            op: op.symbol(),
            left: self.type_name(),
            right: rhs.type_name(),
        };
        let ordering = match (self.number(), rhs.number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Some(a.cmp(&b)),
            (Some(a), Some(b)) => a
                .to_f64(op.symbol())?
                .partial_cmp(&b.to_f64(op.symbol())?),
            _ => match (self, rhs) {
                (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
                (Self::Bytes(a), Self::Bytes(b)) => Some(a.cmp(b)),
                _ => None,
            },
        };
        match op {
            CmpOp::Eq => Ok(ordering.map_or_else(|| self == rhs, |o| o.is_eq())),
            CmpOp::NotEq => Ok(ordering.map_or_else(|| self != rhs, |o| o.is_ne())),
            CmpOp::Lt => ordering.map(|o| o.is_lt()).ok_or_else(unsupported),
            CmpOp::LtE => ordering.map(|o| o.is_le()).ok_or_else(unsupported),
            CmpOp::Gt => ordering.map(|o| o.is_gt()).ok_or_else(unsupported),
            CmpOp::GtE => ordering.map(|o| o.is_ge()).ok_or_else(unsupported),
            CmpOp::Is | CmpOp::IsNot | CmpOp::In | CmpOp::NotIn => Err(unsupported()),
        }
    }

    /// `self[index]` for `str`, `bytes` and `list`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::IndexOutOfRange`] for indices past either end and
    /// [`EvalError::UnsupportedOperands`] when either side has the wrong type.
    pub fn index(&self, index: &Self) -> Result<Self, EvalError> {
        let unsupported = || EvalError::UnsupportedOperands {
            op: "[]",
            left: self.type_name(),
            right: index.type_name(),
        };
        let position = index.as_int().ok_or_else(unsupported)?;
        let out_of_range = || EvalError::IndexOutOfRange {
            kind: self.type_name(),
        };
        match self {
            Self::Str(value) => {
                let chars: Vec<char> = value.chars().collect();
                let at = normalise_index(&position, chars.len()).ok_or_else(out_of_range)?;
                chars
                    .get(at)
                    .map(|c| Self::Str(c.to_string()))
                    .ok_or_else(out_of_range)
            }
            Self::Bytes(value) => {
                let at = normalise_index(&position, value.len()).ok_or_else(out_of_range)?;
                value
                    .get(at)
                    .map(|b| Self::Int(BigInt::from(*b)))
                    .ok_or_else(out_of_range)
            }
            Self::List(items) => {
                let at = normalise_index(&position, items.len()).ok_or_else(out_of_range)?;
                items.get(at).cloned().ok_or_else(out_of_range)
            }
            _ => Err(unsupported()),
        }
    }

    /// `self[lower:upper:step]` for `str`, `bytes` and `list`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Value`] for a zero step and
    /// [`EvalError::UnsupportedOperands`] when `self` is not a sequence.
    pub fn slice(
        &self,
        lower: Option<&BigInt>,
        upper: Option<&BigInt>,
        step: Option<&BigInt>,
    ) -> Result<Self, EvalError> {
        match self {
            Self::Str(value) => {
                let chars: Vec<char> = value.chars().collect();
                let picked = slice_indices(chars.len(), lower, upper, step)?;
                Ok(Self::Str(
                    picked.into_iter().filter_map(|i| chars.get(i)).collect(),
                ))
            }
            Self::Bytes(value) => {
                let picked = slice_indices(value.len(), lower, upper, step)?;
                Ok(Self::Bytes(
                    picked
                        .into_iter()
                        .filter_map(|i| value.get(i).copied())
                        .collect(),
                ))
            }
            Self::List(items) => {
                let picked = slice_indices(items.len(), lower, upper, step)?;
                Ok(Self::List(
                    picked
                        .into_iter()
                        .filter_map(|i| items.get(i).cloned())
                        .collect(),
                ))
            }
            _ => Err(EvalError::UnsupportedOperands {
                op: "[:]",
                left: self.type_name(),
                right: "slice",
            }),
        }
    }
}

impl Number {
    /// Converts to `f64`, refusing integers too large for a float.
    fn to_f64(&self, op: &'static str) -> Result<f64, EvalError> {
        match self {
            Self::Float(value) => Ok(*value),
            Self::Int(value) => value
                .to_f64()
                .filter(|f| f.is_finite())
                .ok_or(EvalError::TooLarge { op }),
        }
    }
}

fn check_len(len: usize, op: BinaryOp) -> Result<(), EvalError> {
    if len > MAX_SEQUENCE_LEN {
        Err(EvalError::TooLarge { op: op.symbol() })
    } else {
        Ok(())
    }
}

fn check_int(value: BigInt, op: BinaryOp) -> Result<PyValue, EvalError> {
    if value.bits() > MAX_INT_BITS {
        Err(EvalError::TooLarge { op: op.symbol() })
    } else {
        Ok(PyValue::Int(value))
    }
}

fn int_binary(op: BinaryOp, a: &BigInt, b: &BigInt) -> Result<PyValue, EvalError> {
    match op {
        BinaryOp::Add => check_int(a + b, op),
        BinaryOp::Sub => check_int(a - b, op),
        BinaryOp::Mult => {
            if a.bits().saturating_add(b.bits()) > MAX_INT_BITS {
                return Err(EvalError::TooLarge { op: op.symbol() });
            }
            Ok(PyValue::Int(a * b))
        }
        BinaryOp::FloorDiv | BinaryOp::Mod if b.is_zero() => Err(EvalError::ZeroDivision),
        BinaryOp::FloorDiv => Ok(PyValue::Int(a.div_floor(b))),
        BinaryOp::Mod => Ok(PyValue::Int(a.mod_floor(b))),
        BinaryOp::Div => {
            if b.is_zero() {
                return Err(EvalError::ZeroDivision);
            }
            let lhs = Number::Int(a.clone()).to_f64(op.symbol())?;
            let rhs = Number::Int(b.clone()).to_f64(op.symbol())?;
            float_binary(op, lhs, rhs).unwrap_or(Err(EvalError::ZeroDivision))
        }
        BinaryOp::Pow => {
            if b.is_negative() {
                let base = Number::Int(a.clone()).to_f64(op.symbol())?;
                let exp = Number::Int(b.clone()).to_f64(op.symbol())?;
                return float_binary(op, base, exp).unwrap_or(Err(EvalError::ZeroDivision));
            }
            let exp = b
                .to_u32()
                .filter(|exp| a.bits().saturating_mul(u64::from(*exp)) <= MAX_INT_BITS)
                .ok_or(EvalError::TooLarge { op: op.symbol() })?;
            Ok(PyValue::Int(num_traits::pow::Pow::pow(a, exp)))
        }
        BinaryOp::LShift | BinaryOp::RShift => {
            if b.is_negative() {
                return Err(EvalError::value("negative shift count"));
            }
            let shift = b.to_u64().unwrap_or(u64::MAX);
            if op == BinaryOp::RShift {
                if shift >= a.bits() {
                    let floor = if a.is_negative() { -1 } else { 0 };
                    return Ok(PyValue::Int(BigInt::from(floor)));
                }
                let places = usize::try_from(shift).map_err(|_| EvalError::TooLarge { op: op.symbol() })?;
                return Ok(PyValue::Int(a >> places));
            }
            if a.bits().saturating_add(shift) > MAX_INT_BITS {
                return Err(EvalError::TooLarge { op: op.symbol() });
            }
            let places = usize::try_from(shift).map_err(|_| EvalError::TooLarge { op: op.symbol() })?;
            Ok(PyValue::Int(a << places))
        }
        BinaryOp::BitAnd => Ok(PyValue::Int(a & b)),
        BinaryOp::BitOr => Ok(PyValue::Int(a | b)),
        BinaryOp::BitXor => Ok(PyValue::Int(a ^ b)),
        BinaryOp::MatMult => Err(EvalError::UnsupportedOperands {
            op: op.symbol(),
            left: "int",
            right: "int",
        }),
    }
}

/// Float arithmetic; `None` for operators floats do not support.
#[expect(
    clippy::float_arithmetic,
    reason = "folding reproduces Python float arithmetic"
)]
fn float_binary(op: BinaryOp, a: f64, b: f64) -> Option<Result<PyValue, EvalError>> {
    let zero_check = || {
        if b == 0.0 {
            Err(EvalError::ZeroDivision)
        } else {
            Ok(())
        }
    };
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mult => a * b,
        BinaryOp::Div => {
            if let Err(err) = zero_check() {
                return Some(Err(err));
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if let Err(err) = zero_check() {
                return Some(Err(err));
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if let Err(err) = zero_check() {
                return Some(Err(err));
            }
            let rem = a % b;
            if rem != 0.0 && (rem < 0.0) != (b < 0.0) {
                rem + b
            } else {
                rem
            }
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Some(Err(EvalError::ZeroDivision));
            }
            a.powf(b)
        }
        _ => return None,
    };
    Some(Ok(PyValue::Float(value)))
}

/// Resolves a possibly negative index against `len`.
fn normalise_index(index: &BigInt, len: usize) -> Option<usize> {
    let len_big = BigInt::from(len);
    let resolved = if index.is_negative() {
        index + &len_big
    } else {
        index.clone()
    };
    if resolved.is_negative() || resolved >= len_big {
        None
    } else {
        resolved.to_usize()
    }
}

fn saturate(value: &BigInt) -> i64 {
    value.to_i64().unwrap_or(if value.is_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Positions selected by `[lower:upper:step]` on a sequence of `len` items.
fn slice_indices(
    len: usize,
    lower: Option<&BigInt>,
    upper: Option<&BigInt>,
    step_by: Option<&BigInt>,
) -> Result<Vec<usize>, EvalError> {
    let step = step_by.map_or(1, saturate);
    if step == 0 {
        return Err(EvalError::value("slice step cannot be zero"));
    }
    let length = i64::try_from(len).unwrap_or(i64::MAX);
    let (low, high) = if step < 0 {
        (-1, length - 1)
    } else {
        (0, length)
    };
    let clamp = |bound: Option<&BigInt>, default: i64| {
        bound.map_or(default, |bound| {
            let mut value = saturate(bound);
            if value < 0 {
                value = value.saturating_add(length);
                value.max(low)
            } else {
                value.min(high)
            }
        })
    };
    let start = clamp(lower, if step < 0 { high } else { low });
    let stop = clamp(upper, if step < 0 { low } else { high });

    let mut picked = Vec::new();
    let mut position = start;
    while (step > 0 && position < stop) || (step < 0 && position > stop) {
        if let Ok(at) = usize::try_from(position) {
            picked.push(at);
        }
        position = match position.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(picked)
}

#[cfg(test)]
mod tests;
