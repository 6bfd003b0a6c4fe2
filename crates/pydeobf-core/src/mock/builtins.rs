//! Behaviour of the builtin functions, modules and methods the model knows.

use std::collections::HashMap;

use data_encoding::HEXLOWER_PERMISSIVE;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use pydeobf_syntax::ast::UnaryOp;

use super::{MockTag, MockValue};
use crate::error::MockError;
use crate::value::{EvalError, PyValue};

/// Builtin functions available to obfuscated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `globals()`
    Globals,
    /// `locals()`
    Locals,
    /// `vars()`
    Vars,
    /// `getattr(obj, name)`
    Getattr,
    /// `dir(obj)`
    Dir,
    /// `__import__(name)`
    Import,
    /// `float(x)`
    Float,
    /// `str(x)`
    Str,
    /// `bool(x)`
    Bool,
    /// `compile(source, filename, mode)`
    Compile,
    /// `exec(code)`; handled structurally, never invoked.
    Exec,
    /// `eval(code)`; handled structurally, never invoked.
    Eval,
    /// `binascii.unhexlify(data)`
    Unhexlify,
}

/// Builtins bound in the base namespace, in lookup table order.
const BASE_BUILTINS: [Builtin; 12] = [
    Builtin::Globals,
    Builtin::Getattr,
    Builtin::Dir,
    Builtin::Vars,
    Builtin::Locals,
    Builtin::Import,
    Builtin::Float,
    Builtin::Str,
    Builtin::Compile,
    Builtin::Bool,
    Builtin::Exec,
    Builtin::Eval,
];

impl Builtin {
    /// Python name of the function.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Globals => "globals",
            Self::Locals => "locals",
            Self::Vars => "vars",
            Self::Getattr => "getattr",
            Self::Dir => "dir",
            Self::Import => "__import__",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::Compile => "compile",
            Self::Exec => "exec",
            Self::Eval => "eval",
            Self::Unhexlify => "unhexlify",
        }
    }

    /// Whether calls can be evaluated.
    #[must_use]
    pub const fn has_behaviour(self) -> bool {
        !matches!(self, Self::Exec | Self::Eval)
    }

    /// Whether cleanup may render this builtin as a bare name without
    /// reporting it.
    #[must_use]
    pub const fn is_well_known(self) -> bool {
        matches!(
            self,
            Self::Str | Self::Eval | Self::Exec | Self::Import | Self::Unhexlify
        )
    }

    pub(super) fn call(
        self,
        args: &[MockValue],
        kwargs: &[(String, MockValue)],
    ) -> Result<Option<MockValue>, MockError> {
        let name = self.name();
        let invalid = |message: &str| MockError::invalid_arguments(name, message);
        match self {
            Self::Globals | Self::Locals | Self::Vars => {
                if !args.is_empty() || !kwargs.is_empty() {
                    return Err(invalid("arguments are not supported"));
                }
                let scope = match self {
                    Self::Globals => ScopeKind::Globals,
                    Self::Locals => ScopeKind::Locals,
                    _ => ScopeKind::Vars,
                };
                Ok(Some(MockValue::scope(scope)))
            }
            Self::Getattr => match (args, kwargs) {
                ([object, name], []) => {
                    let attr = name.as_str().ok_or_else(|| invalid("attribute name must be a str"))?;
                    object.get_attr(attr).map(Some)
                }
                _ => Err(invalid("expected exactly two positional arguments")),
            },
            Self::Dir => match (args, kwargs) {
                ([object], []) => {
                    let mut members = object.members();
                    members.sort_unstable();
                    let listing = members.into_iter().map(PyValue::from).collect();
                    MockValue::from_value(PyValue::List(listing)).map(Some)
                }
                _ => Err(invalid("expected exactly one argument")),
            },
            Self::Import => {
                let module = args
                    .first()
                    .and_then(MockValue::as_str)
                    .ok_or_else(|| invalid("module name must be a str"))?;
                Ok(ModuleKind::from_name(module).map(MockValue::module))
            }
            Self::Float => {
                let value = match single_value(args, kwargs, name)? {
                    None => 0.0,
                    Some(PyValue::Float(value)) => *value,
                    Some(PyValue::Str(text)) => parse_float(text)?,
                    Some(other) => int_to_float(other, name)?,
                };
                MockValue::from_value(PyValue::Float(value)).map(Some)
            }
            Self::Str => {
                let text = single_value(args, kwargs, name)?.map_or_else(String::new, PyValue::py_str);
                MockValue::from_value(PyValue::Str(text)).map(Some)
            }
            Self::Bool => {
                let truth = single_value(args, kwargs, name)?.is_some_and(PyValue::truthy);
                MockValue::from_value(PyValue::Bool(truth)).map(Some)
            }
            Self::Compile => {
                let source = match args.first().and_then(MockValue::value) {
                    Some(PyValue::Str(text)) => text.clone(),
                    Some(PyValue::Bytes(bytes)) => String::from_utf8(bytes.clone())
                        .map_err(|_| invalid("source bytes are not UTF-8"))?,
                    _ => return Err(invalid("source must be str or bytes")),
                };
                Ok(Some(MockValue::code(source)))
            }
            Self::Unhexlify => {
                let data = match (args, kwargs) {
                    ([data], []) => match data.value() {
                        Some(PyValue::Str(text)) if text.is_ascii() => text.as_bytes().to_vec(),
                        Some(PyValue::Bytes(bytes)) => bytes.clone(),
                        _ => return Err(invalid("argument must be bytes or an ASCII str")),
                    },
                    _ => return Err(invalid("expected exactly one argument")),
                };
                let decoded = HEXLOWER_PERMISSIVE
                    .decode(&data)
                    .map_err(|err| EvalError::value(format!("Non-hexadecimal digit found: {err}")))?;
                MockValue::from_value(PyValue::Bytes(decoded)).map(Some)
            }
            Self::Exec | Self::Eval => Err(MockError::not_callable(name)),
        }
    }
}

/// Returns the optional single positional argument of a conversion builtin.
fn single_value<'a>(
    args: &'a [MockValue],
    kwargs: &[(String, MockValue)],
    name: &str,
) -> Result<Option<&'a PyValue>, MockError> {
    if !kwargs.is_empty() {
        return Err(MockError::invalid_arguments(name, "keyword arguments are not supported"));
    }
    match args {
        [] => Ok(None),
        [arg] => arg
            .value()
            .map(Some)
            .ok_or_else(|| MockError::invalid_arguments(name, format!("cannot convert {arg}"))),
        _ => Err(MockError::invalid_arguments(name, "expected at most one argument")),
    }
}

fn parse_float(text: &str) -> Result<f64, MockError> {
    text.trim()
        .replace('_', "")
        .parse::<f64>()
        .map_err(|_| EvalError::value(format!("could not convert string to float: {text:?}")).into())
}

fn int_to_float(value: &PyValue, name: &str) -> Result<f64, MockError> {
    let int = value.as_int().ok_or_else(|| {
        MockError::invalid_arguments(name, format!("cannot convert {}", value.type_name()))
    })?;
    int.to_f64()
        .filter(|float| float.is_finite())
        .ok_or_else(|| EvalError::TooLarge { op: "float" }.into())
}

/// Importable modules the model knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// `builtins`
    Builtins,
    /// `binascii`
    Binascii,
}

impl ModuleKind {
    /// Python module name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Builtins => "builtins",
            Self::Binascii => "binascii",
        }
    }

    /// Looks a module up by import name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "builtins" => Some(Self::Builtins),
            "binascii" => Some(Self::Binascii),
            _ => None,
        }
    }

    pub(super) fn members(self) -> Vec<&'static str> {
        match self {
            Self::Builtins => BASE_BUILTINS
                .iter()
                .map(|builtin| builtin.name())
                .chain(["True", "False"])
                .collect(),
            Self::Binascii => vec![Builtin::Unhexlify.name()],
        }
    }

    pub(super) fn member(self, attr: &str) -> Option<MockValue> {
        match self {
            Self::Builtins => base_table().remove(attr),
            Self::Binascii => (attr == Builtin::Unhexlify.name())
                .then(|| MockValue::builtin(Builtin::Unhexlify)),
        }
    }
}

/// The three ways obfuscated code reaches the module dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// `globals()`
    Globals,
    /// `locals()`
    Locals,
    /// `vars()`
    Vars,
}

impl ScopeKind {
    /// Name of the function producing this scope.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Globals => "globals",
            Self::Locals => "locals",
            Self::Vars => "vars",
        }
    }
}

/// Methods exposed by value mocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `str.join`
    Join,
    /// `list.index`
    Index,
    /// `list.__getitem__`
    GetItem,
    /// `int.__neg__`
    Neg,
    /// `int.__pos__`
    Pos,
    /// `bytes.decode`
    Decode,
}

impl Method {
    /// Python method name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Index => "index",
            Self::GetItem => "__getitem__",
            Self::Neg => "__neg__",
            Self::Pos => "__pos__",
            Self::Decode => "decode",
        }
    }

    /// Capability table of a value tag.
    #[must_use]
    pub const fn for_tag(tag: MockTag) -> &'static [Self] {
        match tag {
            MockTag::Str => &[Self::Join],
            MockTag::List => &[Self::GetItem, Self::Index],
            MockTag::Int | MockTag::Bool => &[Self::Neg, Self::Pos],
            MockTag::Bytes => &[Self::Decode],
            _ => &[],
        }
    }

    pub(super) fn call(
        self,
        receiver: &PyValue,
        args: &[MockValue],
        kwargs: &[(String, MockValue)],
    ) -> Result<MockValue, MockError> {
        let name = format!("{}.{}", receiver.type_name(), self.name());
        let invalid = |message: &str| MockError::invalid_arguments(&name, message);
        let result = match (self, receiver) {
            (Self::Join, PyValue::Str(separator)) => {
                let Some(PyValue::List(items)) = args.first().and_then(MockValue::value) else {
                    return Err(invalid("expected a list of str"));
                };
                let parts = items
                    .iter()
                    .map(|item| item.as_str().ok_or_else(|| invalid("sequence item is not a str")))
                    .collect::<Result<Vec<_>, _>>()?;
                PyValue::Str(parts.join(separator.as_str()))
            }
            (Self::Index, PyValue::List(items)) => {
                let needle = args
                    .first()
                    .and_then(MockValue::value)
                    .ok_or_else(|| invalid("expected one value"))?;
                let position = items
                    .iter()
                    .position(|item| item == needle)
                    .ok_or_else(|| EvalError::value(format!("{} is not in list", needle.py_repr())))?;
                PyValue::Int(BigInt::from(position))
            }
            (Self::GetItem, sequence) => {
                let index = args
                    .first()
                    .and_then(MockValue::value)
                    .ok_or_else(|| invalid("expected one index"))?;
                sequence.index(index)?
            }
            (Self::Neg, number) => number.unary(UnaryOp::USub)?,
            (Self::Pos, number) => number.unary(UnaryOp::UAdd)?,
            (Self::Decode, PyValue::Bytes(bytes)) => {
                let encoding = args
                    .first()
                    .or_else(|| {
                        kwargs
                            .iter()
                            .find(|(key, _)| key == "encoding")
                            .map(|(_, value)| value)
                    })
                    .and_then(MockValue::as_str)
                    .unwrap_or("utf-8")
                    .to_ascii_lowercase()
                    .replace('_', "-");
                if !matches!(encoding.as_str(), "utf-8" | "utf8" | "ascii") {
                    return Err(invalid("only UTF-8 decoding is supported"));
                }
                PyValue::Str(String::from_utf8(bytes.clone()).map_err(|err| {
                    EvalError::value(format!("'utf-8' codec can't decode bytes: {err}"))
                })?)
            }
            _ => return Err(invalid("method does not apply to this receiver")),
        };
        MockValue::from_value(result)
    }
}

/// Builds the base table of builtin mocks, keyed by Python name.
#[must_use]
pub fn base_table() -> HashMap<&'static str, MockValue> {
    let mut table: HashMap<&'static str, MockValue> = BASE_BUILTINS
        .iter()
        .map(|builtin| (builtin.name(), MockValue::builtin(*builtin)))
        .collect();
    for (name, truth) in [("True", true), ("False", false)] {
        let mut mock = MockValue::from_value(PyValue::Bool(truth))
            .unwrap_or_else(|_| MockValue::unknown(name));
        mock.name = name.to_owned();
        table.insert(name, mock);
    }
    table
}
