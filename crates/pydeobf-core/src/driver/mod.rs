//! Fixed-point loop over an obfuscator's nested layers.
//!
//! A schema describes its intermediate trees as an ordered list of
//! [`LayerShape`]s. [`LayerDriver::run`] repeatedly checks the terminal
//! predicate, picks the first shape whose recogniser accepts the current
//! tree, and replaces the tree with the layer it peels off. The loop holds no
//! state between runs and always hands back the last tree it reached.

use pydeobf_syntax::ast::Module;
use pydeobf_syntax::unparse;
use thiserror::Error;

use crate::failure::{DeobfuscationFailure, FailureKind};

/// Peels one layer off a tree; `Ok(None)` means the layer's payload could
/// not be located.
pub type PeelFn = fn(&Module) -> Result<Option<Module>, DeobfuscationFailure>;

/// Structural fingerprint of one intermediate stage.
#[derive(Debug, Clone, Copy)]
pub struct LayerShape {
    /// Name used in logs and in the step trail.
    pub name: &'static str,
    /// Recogniser over the top level of the tree.
    pub matches: fn(&Module) -> bool,
    /// Produces the next tree.
    pub peel: PeelFn,
}

/// A successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct Peeled {
    /// The terminal tree.
    pub module: Module,
    /// Shapes applied, in order.
    pub trail: Vec<&'static str>,
}

impl Peeled {
    /// Number of layers peeled.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.trail.len()
    }
}

/// A failed run, carrying the last tree reached.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{failure}")]
pub struct LayerFailure {
    /// What went wrong.
    pub failure: DeobfuscationFailure,
    /// The last tree reached before the failure.
    pub partial: Module,
    /// Layers peeled before the failure.
    pub steps: usize,
}

impl From<LayerFailure> for DeobfuscationFailure {
    fn from(error: LayerFailure) -> Self {
        error
            .failure
            .with_diagnostic("steps", error.steps.to_string())
            .with_diagnostic("partial", unparse(&error.partial))
    }
}

/// Runs a schema's layer shapes to a fixed point.
#[derive(Debug, Clone, Copy)]
pub struct LayerDriver<'a> {
    schema: &'static str,
    shapes: &'a [LayerShape],
    max_iterations: usize,
}

impl<'a> LayerDriver<'a> {
    /// Creates a driver trying `shapes` in priority order.
    #[must_use]
    pub const fn new(schema: &'static str, shapes: &'a [LayerShape], max_iterations: usize) -> Self {
        Self {
            schema,
            shapes,
            max_iterations,
        }
    }

    /// Peels layers until `is_terminal` accepts the tree.
    ///
    /// The predicate sees the current tree and the shapes applied so far, and
    /// is consulted before the iteration cap, so a tree that becomes terminal
    /// on the last allowed step still succeeds.
    ///
    /// # Errors
    ///
    /// Returns a [`LayerFailure`] of kind [`FailureKind::UnrecognizedLayer`]
    /// when no shape matches, [`FailureKind::LayerNotLocated`] when the
    /// matched shape yields nothing, [`FailureKind::IterationLimitExceeded`]
    /// after `max_iterations` steps, or the peel function's own failure.
    pub fn run<T>(&self, module: Module, is_terminal: T) -> Result<Peeled, LayerFailure>
    where
        T: Fn(&Module, &[&'static str]) -> bool,
    {
        let mut current = module;
        let mut trail: Vec<&'static str> = Vec::new();
        loop {
            if is_terminal(&current, &trail) {
                tracing::debug!(schema = self.schema, steps = trail.len(), "reached terminal layer");
                return Ok(Peeled {
                    module: current,
                    trail,
                });
            }
            if trail.len() >= self.max_iterations {
                let message = format!(
                    "{} did not finish within {} layers",
                    self.schema, self.max_iterations
                );
                return Err(self.fail(FailureKind::IterationLimitExceeded, message, current, &trail));
            }
            let Some(shape) = self.shapes.iter().find(|shape| (shape.matches)(&current)) else {
                let message = format!("no {} layer shape matches the current tree", self.schema);
                return Err(self.fail(FailureKind::UnrecognizedLayer, message, current, &trail));
            };
            tracing::debug!(
                schema = self.schema,
                layer = shape.name,
                step = trail.len() + 1,
                "peeling layer"
            );
            match (shape.peel)(&current) {
                Ok(Some(next)) => {
                    current = next;
                    trail.push(shape.name);
                }
                Ok(None) => {
                    let message = format!("could not locate the payload of layer '{}'", shape.name);
                    return Err(self.fail(FailureKind::LayerNotLocated, message, current, &trail));
                }
                Err(failure) => {
                    return Err(LayerFailure {
                        failure: failure.with_diagnostic("layer", shape.name),
                        partial: current,
                        steps: trail.len(),
                    });
                }
            }
        }
    }

    fn fail(
        &self,
        kind: FailureKind,
        message: String,
        partial: Module,
        trail: &[&'static str],
    ) -> LayerFailure {
        tracing::debug!(schema = self.schema, %kind, steps = trail.len(), "layer loop stopped");
        LayerFailure {
            failure: DeobfuscationFailure::new(kind, message)
                .with_diagnostic("trail", trail.join(" -> ")),
            partial,
            steps: trail.len(),
        }
    }
}

#[cfg(test)]
mod tests;
