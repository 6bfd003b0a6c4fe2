//! Owned abstract syntax tree for the Python subset the deobfuscators rewrite.
//!
//! The shapes mirror Python's own `ast` module closely enough that fold rules
//! read like the patterns they match. Anything outside the modelled subset is
//! carried as a `Raw` node holding its dedented source text, so lowering and
//! unparsing round-trip every program the parser accepts.

use num_bigint::BigInt;

/// A parsed Python module.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    /// Top-level statements in source order.
    pub body: Vec<Stmt>,
}

impl Module {
    /// Creates a module from a list of statements.
    #[must_use]
    pub const fn new(body: Vec<Stmt>) -> Self {
        Self { body }
    }
}

/// A Python statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// An expression evaluated for its side effects.
    Expr(Expr),
    /// `a = b = value`.
    Assign {
        /// Assignment targets, left to right.
        targets: Vec<Expr>,
        /// The assigned value.
        value: Expr,
    },
    /// `target op= value`.
    AugAssign {
        /// The assignment target.
        target: Expr,
        /// The in-place operator.
        op: BinaryOp,
        /// The right-hand side.
        value: Expr,
    },
    /// `return` with an optional value.
    Return(Option<Expr>),
    /// `del a, b`.
    Delete(Vec<Expr>),
    /// `raise exc from cause`.
    Raise {
        /// The raised exception, absent for a bare re-raise.
        exc: Option<Expr>,
        /// The explicit cause.
        cause: Option<Expr>,
    },
    /// `assert test, msg`.
    Assert {
        /// The asserted condition.
        test: Expr,
        /// The optional failure message.
        msg: Option<Expr>,
    },
    /// `pass`.
    Pass,
    /// `break`.
    Break,
    /// `continue`.
    Continue,
    /// `global a, b`.
    Global(Vec<String>),
    /// `nonlocal a, b`.
    Nonlocal(Vec<String>),
    /// `import a.b as c, d`.
    Import(Vec<Alias>),
    /// `from ..module import a as b`.
    ImportFrom {
        /// Module path, absent for `from . import x`.
        module: Option<String>,
        /// Number of leading dots.
        level: usize,
        /// Imported names; a single `*` alias for wildcard imports.
        names: Vec<Alias>,
    },
    /// `if` statement; `elif` chains nest in `orelse`.
    If {
        /// The condition.
        test: Expr,
        /// Statements run when the condition holds.
        body: Vec<Stmt>,
        /// The `else` branch.
        orelse: Vec<Stmt>,
    },
    /// `while` loop.
    While {
        /// The loop condition.
        test: Expr,
        /// The loop body.
        body: Vec<Stmt>,
        /// The `else` branch.
        orelse: Vec<Stmt>,
    },
    /// `for` loop.
    For {
        /// The loop target.
        target: Expr,
        /// The iterated expression.
        iter: Expr,
        /// The loop body.
        body: Vec<Stmt>,
        /// The `else` branch.
        orelse: Vec<Stmt>,
        /// Whether this is `async for`.
        is_async: bool,
    },
    /// `try` statement.
    Try {
        /// The guarded body.
        body: Vec<Stmt>,
        /// Exception handlers in order.
        handlers: Vec<ExceptHandler>,
        /// The `else` branch.
        orelse: Vec<Stmt>,
        /// The `finally` branch.
        finalbody: Vec<Stmt>,
        /// Whether the handlers use `except*`.
        is_star: bool,
    },
    /// `with` statement; the items are kept as written.
    With {
        /// Source text of the `with` items.
        items: String,
        /// The block body.
        body: Vec<Stmt>,
        /// Whether this is `async with`.
        is_async: bool,
    },
    /// Function definition.
    FunctionDef(Box<FunctionDef>),
    /// Class definition.
    ClassDef(Box<ClassDef>),
    /// A statement outside the modelled subset, kept verbatim.
    Raw(String),
}

/// A `def` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Function name.
    pub name: String,
    /// Parameter list as written, including parentheses.
    pub params: String,
    /// Return annotation as written.
    pub returns: Option<String>,
    /// Function body.
    pub body: Vec<Stmt>,
    /// Decorator expressions, outermost first.
    pub decorators: Vec<Expr>,
    /// Whether this is `async def`.
    pub is_async: bool,
}

/// A `class` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    /// Class name.
    pub name: String,
    /// Positional base expressions.
    pub bases: Vec<Expr>,
    /// Keyword arguments such as `metaclass=...`.
    pub keywords: Vec<Keyword>,
    /// Class body.
    pub body: Vec<Stmt>,
    /// Decorator expressions, outermost first.
    pub decorators: Vec<Expr>,
}

/// An `except` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    /// The matched exception type, absent for a bare `except:`.
    pub type_: Option<Expr>,
    /// The bound name after `as`.
    pub name: Option<String>,
    /// The handler body.
    pub body: Vec<Stmt>,
}

/// A name in an import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    /// Dotted name being imported.
    pub name: String,
    /// Local binding introduced with `as`.
    pub asname: Option<String>,
}

/// A keyword argument in a call; `arg` is absent for `**mapping`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    /// The keyword name.
    pub arg: Option<String>,
    /// The argument value.
    pub value: Expr,
}

/// One `for ... in ... if ...` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    /// The loop target.
    pub target: Expr,
    /// The iterated expression.
    pub iter: Expr,
    /// Filter conditions.
    pub ifs: Vec<Expr>,
    /// Whether this is `async for`.
    pub is_async: bool,
}

/// A Python expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A bare identifier.
    Name(String),
    /// A literal constant.
    Constant(Constant),
    /// `value.attr`.
    Attribute {
        /// The object.
        value: Box<Expr>,
        /// The attribute name.
        attr: String,
    },
    /// `value[slice]`.
    Subscript {
        /// The subscripted object.
        value: Box<Expr>,
        /// The index, slice or tuple of both.
        slice: Box<Expr>,
    },
    /// `lower:upper:step`, only valid inside a subscript.
    Slice {
        /// Start bound.
        lower: Option<Box<Expr>>,
        /// Stop bound.
        upper: Option<Box<Expr>>,
        /// Step.
        step: Option<Box<Expr>>,
    },
    /// `func(*args, **keywords)`.
    Call {
        /// The callee.
        func: Box<Expr>,
        /// Positional arguments, including `Starred`.
        args: Vec<Expr>,
        /// Keyword arguments.
        keywords: Vec<Keyword>,
    },
    /// `left op right`.
    BinOp {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `op operand`.
    UnaryOp {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// `a and b and c`.
    BoolOp {
        /// Operator shared by all operands.
        op: BoolOp,
        /// Operands, at least two.
        values: Vec<Expr>,
    },
    /// `a < b <= c`.
    Compare {
        /// First operand.
        left: Box<Expr>,
        /// Operators between consecutive operands.
        ops: Vec<CmpOp>,
        /// Remaining operands.
        comparators: Vec<Expr>,
    },
    /// `body if test else orelse`.
    IfExp {
        /// Condition.
        test: Box<Expr>,
        /// Value when the condition holds.
        body: Box<Expr>,
        /// Value otherwise.
        orelse: Box<Expr>,
    },
    /// `lambda params: body`.
    Lambda {
        /// Parameter list as written, without the `lambda` keyword.
        params: String,
        /// The returned expression.
        body: Box<Expr>,
    },
    /// `target := value`.
    NamedExpr {
        /// Bound name.
        target: String,
        /// Assigned value.
        value: Box<Expr>,
    },
    /// `[a, b]`.
    List(Vec<Expr>),
    /// `(a, b)`.
    Tuple(Vec<Expr>),
    /// `{a, b}`.
    Set(Vec<Expr>),
    /// `{k: v, **m}`; a `None` key marks a `**` spread.
    Dict {
        /// Keys, `None` for spreads.
        keys: Vec<Option<Expr>>,
        /// Values, parallel to `keys`.
        values: Vec<Expr>,
    },
    /// `*value`.
    Starred(Box<Expr>),
    /// `[elt for ...]`.
    ListComp {
        /// Produced element.
        elt: Box<Expr>,
        /// Comprehension clauses.
        generators: Vec<Comprehension>,
    },
    /// `{elt for ...}`.
    SetComp {
        /// Produced element.
        elt: Box<Expr>,
        /// Comprehension clauses.
        generators: Vec<Comprehension>,
    },
    /// `(elt for ...)`.
    GeneratorExp {
        /// Produced element.
        elt: Box<Expr>,
        /// Comprehension clauses.
        generators: Vec<Comprehension>,
    },
    /// `{key: value for ...}`.
    DictComp {
        /// Produced key.
        key: Box<Expr>,
        /// Produced value.
        value: Box<Expr>,
        /// Comprehension clauses.
        generators: Vec<Comprehension>,
    },
    /// `await value`.
    Await(Box<Expr>),
    /// An expression outside the modelled subset, kept verbatim.
    Raw(String),
}

impl Expr {
    /// Builds a name expression.
    #[must_use]
    pub fn name(id: impl Into<String>) -> Self {
        Self::Name(id.into())
    }

    /// Builds a string constant.
    #[must_use]
    pub fn str(value: impl Into<String>) -> Self {
        Self::Constant(Constant::Str(value.into()))
    }

    /// Builds a bytes constant.
    #[must_use]
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::Constant(Constant::Bytes(value.into()))
    }

    /// Builds an integer constant.
    #[must_use]
    pub fn int(value: impl Into<BigInt>) -> Self {
        Self::Constant(Constant::Int(value.into()))
    }

    /// Builds `value.attr`.
    #[must_use]
    pub fn attribute(value: Self, attr: impl Into<String>) -> Self {
        Self::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
    }

    /// Builds a call with positional arguments only.
    #[must_use]
    pub fn call(func: Self, args: Vec<Self>) -> Self {
        Self::Call {
            func: Box::new(func),
            args,
            keywords: Vec::new(),
        }
    }

    /// Returns the constant held by this expression, if it is one.
    #[must_use]
    pub const fn as_constant(&self) -> Option<&Constant> {
        match self {
            Self::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    /// Returns the identifier when this expression is a bare name.
    #[must_use]
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(id) => Some(id),
            _ => None,
        }
    }

    /// Returns `true` when this is a call to the bare name `id`.
    #[must_use]
    pub fn is_call_to(&self, id: &str) -> bool {
        matches!(self, Self::Call { func, .. } if func.as_name() == Some(id))
    }
}

/// A literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// `None`.
    None,
    /// `True` or `False`.
    Bool(bool),
    /// An arbitrary-precision integer.
    Int(BigInt),
    /// A float.
    Float(f64),
    /// A text string.
    Str(String),
    /// A byte string.
    Bytes(Vec<u8>),
    /// `...`.
    Ellipsis,
}

impl Constant {
    /// Returns the string payload of a `Str` constant.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the byte payload of a `Bytes` constant.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mult,
    /// `@`
    MatMult,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `<<`
    LShift,
    /// `>>`
    RShift,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&`
    BitAnd,
    /// `//`
    FloorDiv,
}

impl BinaryOp {
    /// Returns the operator as written in source.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::MatMult => "@",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitAnd => "&",
            Self::FloorDiv => "//",
        }
    }

    /// Parses an operator token; augmented forms (`+=`) are accepted too.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol.strip_suffix('=').unwrap_or(symbol) {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mult,
            "@" => Self::MatMult,
            "/" => Self::Div,
            "%" => Self::Mod,
            "**" => Self::Pow,
            "<<" => Self::LShift,
            ">>" => Self::RShift,
            "|" => Self::BitOr,
            "^" => Self::BitXor,
            "&" => Self::BitAnd,
            "//" => Self::FloorDiv,
            _ => return None,
        };
        Some(op)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `~`
    Invert,
    /// `not`
    Not,
    /// `+`
    UAdd,
    /// `-`
    USub,
}

impl UnaryOp {
    /// Returns the operator as written in source.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Invert => "~",
            Self::Not => "not",
            Self::UAdd => "+",
            Self::USub => "-",
        }
    }
}

/// Short-circuiting boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

impl BoolOp {
    /// Returns the operator keyword.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtE,
    /// `>`
    Gt,
    /// `>=`
    GtE,
    /// `is`
    Is,
    /// `is not`
    IsNot,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

impl CmpOp {
    /// Returns the operator as written in source.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }

    /// Parses an operator, tolerating any whitespace inside `not in` and
    /// `is not`.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let words: Vec<&str> = symbol.split_whitespace().collect();
        let op = match words.as_slice() {
            ["=="] => Self::Eq,
            ["!="] | ["<>"] => Self::NotEq,
            ["<"] => Self::Lt,
            ["<="] => Self::LtE,
            [">"] => Self::Gt,
            [">="] => Self::GtE,
            ["is"] => Self::Is,
            ["is", "not"] => Self::IsNot,
            ["in"] => Self::In,
            ["not", "in"] => Self::NotIn,
            _ => return None,
        };
        Some(op)
    }
}
