//! Concrete deobfuscation schemas.
//!
//! Each module implements [`Deobfuscator`](pydeobf_core::Deobfuscator) for
//! one obfuscator family. [`register_all`] installs every schema into a
//! [`SchemaRegistry`] in the order automatic dispatch tries them.

pub mod blankobf;
pub mod codec;
pub mod fct;
pub mod hyperion;
pub mod lzmaspam;
pub mod marshal;
pub mod pyobfuscate;
pub mod vare;

mod pattern;

use pydeobf_core::{RegistryError, SchemaRegistry};

pub use self::blankobf::BlankObf;
pub use self::fct::Fct;
pub use self::hyperion::Hyperion;
pub use self::lzmaspam::LzmaSpam;
pub use self::pyobfuscate::Pyobfuscate;
pub use self::vare::Vare;

/// Registers the built-in schemas.
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateVersion`] when one of the schemas is
/// already present; entries registered before the clash are kept.
pub fn register_all(registry: &mut SchemaRegistry) -> Result<(), RegistryError> {
    registry.register(hyperion::NAME, 1, Hyperion)?;
    registry.register(blankobf::NAME, 2, BlankObf)?;
    registry.register(fct::NAME, 1, Fct)?;
    registry.register(lzmaspam::NAME, 1, LzmaSpam)?;
    registry.register(vare::NAME, 1, Vare)?;
    registry.register(pyobfuscate::NAME, 1, Pyobfuscate)?;
    Ok(())
}

/// A registry holding every built-in schema.
///
/// # Errors
///
/// Propagates [`register_all`] failures.
pub fn default_registry() -> Result<SchemaRegistry, RegistryError> {
    let mut registry = SchemaRegistry::new();
    register_all(&mut registry)?;
    Ok(registry)
}
