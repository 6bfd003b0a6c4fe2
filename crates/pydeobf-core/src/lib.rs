//! Symbolic deobfuscation core for obfuscated Python programs.
//!
//! The crate evaluates just enough of an untrusted program to undo its
//! obfuscation without running it. [`MockValue`]s stand in for runtime
//! objects, the [`SymbolicTransformer`] folds every subtree whose inputs are
//! known, and the [`LayerDriver`] repeats schema-specific peeling until a
//! terminal layer is reached. Schemas plug into a [`SchemaRegistry`] and the
//! [`Pipeline`] tries them in order, keeping each failure's diagnostics.
//!
//! # Example
//!
//! ```rust,ignore
//! use pydeobf_core::{Pipeline, SchemaRegistry, Selection};
//!
//! let mut registry = SchemaRegistry::new();
//! pydeobf_schemas::register_all(&mut registry)?;
//! let result = Pipeline::new(&registry)
//!     .with_selection(Selection::Auto)
//!     .run(&source)?;
//! println!("{}", result.output);
//! ```

pub mod driver;
pub mod error;
pub mod failure;
pub mod indicators;
pub mod mock;
pub mod namespace;
pub mod pipeline;
pub mod registry;
pub mod transform;
pub mod value;

#[cfg(test)]
mod tests;

pub use self::driver::{LayerDriver, LayerFailure, LayerShape, Peeled};
pub use self::error::{MockError, RegistryError};
pub use self::failure::{DeobfuscationFailure, DiagnosticValue, FailureKind};
pub use self::mock::{Handle, MockTag, MockValue};
pub use self::namespace::Namespace;
pub use self::pipeline::{
    AggregateFailure, Attempt, Deobfuscated, Pipeline, PipelineError, Selection,
};
pub use self::registry::{Deobfuscator, SchemaEntry, SchemaRegistry};
pub use self::transform::{FoldIssue, MockCleanup, Resolved, SymbolicTransformer, revert};
pub use self::value::{EvalError, PyValue};
