//! Mock values: symbolic stand-ins for runtime objects.
//!
//! A [`MockValue`] pairs a tag with an optional concrete [`PyValue`] payload
//! and an optional [`Handle`] naming the runtime object it stands for. Members
//! are not free-form tables: each tag and handle exposes a fixed capability
//! set declared in [`MockValue::members`], and behaviour lives in
//! [`builtins`].

pub mod builtins;

use std::fmt;

use strum::Display;

use crate::error::MockError;
use crate::namespace::Namespace;
use crate::value::PyValue;

pub use self::builtins::{Builtin, Method, ModuleKind, ScopeKind};

/// Broad classification of a mock value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MockTag {
    /// A `str` payload.
    Str,
    /// An `int` payload.
    Int,
    /// A `bool` payload.
    Bool,
    /// A `float` payload.
    Float,
    /// A `bytes` payload.
    Bytes,
    /// A `list` payload.
    List,
    /// A code object; the payload is its source text.
    Code,
    /// A module or a scope dictionary.
    Namespace,
    /// A function or bound method.
    Callable,
    /// Anything the model cannot classify.
    Unknown,
}

/// The runtime object a symbolic mock stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    /// An importable module.
    Module(ModuleKind),
    /// The dictionary returned by `globals()`, `locals()` or `vars()`.
    Scope(ScopeKind),
    /// A builtin function.
    Builtin(Builtin),
    /// A method bound to the mock's payload.
    Method(Method),
    /// A function that ignores its arguments and returns a scope.
    NamespaceGetter(ScopeKind),
}

/// A symbolically known runtime value.
///
/// Equality compares tag and payload only: two mocks are interchangeable when
/// they carry the same concrete value, whatever they are called.
#[derive(Debug, Clone)]
pub struct MockValue {
    name: String,
    tag: MockTag,
    payload: Option<PyValue>,
    handle: Option<Handle>,
}

impl PartialEq for MockValue {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.payload == other.payload
    }
}

impl fmt::Display for MockValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(payload) => write!(f, "<{}: {}>", self.name, payload.py_repr()),
            None => write!(f, "<{}>", self.name),
        }
    }
}

impl MockValue {
    /// Wraps a concrete value.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::UnsupportedType`] for `None`, which has no mock
    /// form.
    pub fn from_value(value: PyValue) -> Result<Self, MockError> {
        let tag = match &value {
            PyValue::Str(_) => MockTag::Str,
            PyValue::Int(_) => MockTag::Int,
            PyValue::Bool(_) => MockTag::Bool,
            PyValue::Float(_) => MockTag::Float,
            PyValue::Bytes(_) => MockTag::Bytes,
            PyValue::List(_) => MockTag::List,
            PyValue::None => return Err(MockError::unsupported_type(value.type_name())),
        };
        Ok(Self {
            name: value.type_name().to_owned(),
            tag,
            payload: Some(value),
            handle: None,
        })
    }

    /// Creates a code object mock holding its source text.
    #[must_use]
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            name: "code".to_owned(),
            tag: MockTag::Code,
            payload: Some(PyValue::Str(source.into())),
            handle: None,
        }
    }

    /// Creates a mock for a builtin function.
    #[must_use]
    pub fn builtin(builtin: Builtin) -> Self {
        Self::symbolic(builtin.name(), MockTag::Callable, Handle::Builtin(builtin))
    }

    /// Creates a mock for an importable module.
    #[must_use]
    pub fn module(module: ModuleKind) -> Self {
        Self::symbolic(module.name(), MockTag::Namespace, Handle::Module(module))
    }

    /// Creates a mock for a scope dictionary.
    #[must_use]
    pub fn scope(scope: ScopeKind) -> Self {
        Self::symbolic(scope.name(), MockTag::Namespace, Handle::Scope(scope))
    }

    /// Creates a callable that returns a scope whatever its arguments.
    #[must_use]
    pub fn namespace_getter(scope: ScopeKind) -> Self {
        Self::symbolic(
            format!("fake_{}", scope.name()),
            MockTag::Callable,
            Handle::NamespaceGetter(scope),
        )
    }

    /// Creates an opaque mock the model cannot classify.
    #[must_use]
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: MockTag::Unknown,
            payload: None,
            handle: None,
        }
    }

    fn symbolic(name: impl Into<String>, tag: MockTag, handle: Handle) -> Self {
        Self {
            name: name.into(),
            tag,
            payload: None,
            handle: Some(handle),
        }
    }

    fn bound(receiver: &PyValue, method: Method) -> Self {
        Self {
            name: format!("{}.{}", receiver.type_name(), method.name()),
            tag: MockTag::Callable,
            payload: Some(receiver.clone()),
            handle: Some(Handle::Method(method)),
        }
    }

    /// Symbolic name used when the mock is rendered back as a reference.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Classification tag.
    #[must_use]
    pub const fn tag(&self) -> MockTag {
        self.tag
    }

    /// Concrete payload, when known.
    #[must_use]
    pub const fn payload(&self) -> Option<&PyValue> {
        self.payload.as_ref()
    }

    /// Runtime object this mock stands for, when symbolic.
    #[must_use]
    pub const fn handle(&self) -> Option<Handle> {
        self.handle
    }

    /// Returns the payload as a value-like literal: `None` for callables and
    /// namespaces, whose payload is not their own value.
    #[must_use]
    pub fn value(&self) -> Option<&PyValue> {
        match self.tag {
            MockTag::Callable | MockTag::Namespace | MockTag::Unknown => None,
            _ => self.payload.as_ref(),
        }
    }

    /// Returns the payload text of a `str` mock.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self.tag {
            MockTag::Str => self.payload.as_ref().and_then(PyValue::as_str),
            _ => None,
        }
    }

    /// Returns the source text of a `str` or code object mock.
    #[must_use]
    pub fn as_source(&self) -> Option<&str> {
        match self.tag {
            MockTag::Str | MockTag::Code => self.payload.as_ref().and_then(PyValue::as_str),
            _ => None,
        }
    }

    /// Returns the scope this mock denotes, if it is a scope dictionary.
    #[must_use]
    pub const fn as_scope(&self) -> Option<ScopeKind> {
        match self.handle {
            Some(Handle::Scope(scope)) => Some(scope),
            _ => None,
        }
    }

    /// Whether invoking the mock can do anything.
    #[must_use]
    pub const fn has_behaviour(&self) -> bool {
        match self.handle {
            Some(Handle::Builtin(builtin)) => builtin.has_behaviour(),
            Some(Handle::Method(_) | Handle::NamespaceGetter(_)) => true,
            Some(Handle::Module(_) | Handle::Scope(_)) | None => false,
        }
    }

    /// Names of the members reachable through attribute access, in
    /// declaration order.
    #[must_use]
    pub fn members(&self) -> Vec<&'static str> {
        match self.handle {
            Some(Handle::Module(module)) => module.members(),
            Some(_) => Vec::new(),
            None => Method::for_tag(self.tag)
                .iter()
                .map(|method| method.name())
                .collect(),
        }
    }

    /// Attribute access.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::AttrNotFound`] when `attr` is not one of
    /// [`MockValue::members`].
    pub fn get_attr(&self, attr: &str) -> Result<Self, MockError> {
        tracing::trace!(mock = %self.name, attr, "attribute lookup");
        let missing = || MockError::attr_not_found(&self.name, attr);
        match (self.handle, &self.payload) {
            (Some(Handle::Module(module)), _) => module.member(attr).ok_or_else(missing),
            (None, Some(receiver)) => Method::for_tag(self.tag)
                .iter()
                .find(|method| method.name() == attr)
                .map(|method| Self::bound(receiver, *method))
                .ok_or_else(missing),
            _ => Err(missing()),
        }
    }

    /// Item access with a string key.
    ///
    /// Scope dictionaries read through `namespace`; other mocks have no item
    /// table.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::KeyNotFound`] when the key is absent.
    pub fn get_item(&self, key: &str, namespace: &Namespace) -> Result<Self, MockError> {
        tracing::trace!(mock = %self.name, key, "item lookup");
        match self.handle {
            Some(Handle::Scope(_)) => namespace
                .get(key)
                .cloned()
                .ok_or_else(|| MockError::key_not_found(&self.name, key)),
            _ => Err(MockError::key_not_found(&self.name, key)),
        }
    }

    /// Invokes the mock's behaviour.
    ///
    /// `Ok(None)` means the behaviour ran but produced nothing foldable, as
    /// `__import__` does for modules the model does not know.
    ///
    /// # Errors
    ///
    /// Returns [`MockError::NotCallable`] when the mock has no behaviour, or
    /// the behaviour's own error.
    pub fn call(
        &self,
        args: &[Self],
        kwargs: &[(String, Self)],
    ) -> Result<Option<Self>, MockError> {
        tracing::debug!(
            mock = %self.name,
            args = args.len(),
            kwargs = kwargs.len(),
            "calling mock"
        );
        match self.handle {
            Some(Handle::Builtin(builtin)) if builtin.has_behaviour() => {
                builtin.call(args, kwargs)
            }
            Some(Handle::Method(method)) => match &self.payload {
                Some(receiver) => method.call(receiver, args, kwargs).map(Some),
                None => Err(MockError::not_callable(&self.name)),
            },
            Some(Handle::NamespaceGetter(scope)) => Ok(Some(Self::scope(scope))),
            _ => Err(MockError::not_callable(&self.name)),
        }
    }
}
