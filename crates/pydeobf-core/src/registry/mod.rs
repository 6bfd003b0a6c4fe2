//! Schema registry for deobfuscator lookup and selection.
//!
//! The [`SchemaRegistry`] stores one [`SchemaEntry`] per normalised name and
//! version, in registration order. Selection strings such as
//! `"hyperion, vare_1"` are resolved through [`SchemaRegistry::resolve`], and
//! [`SchemaRegistry::scan_all`] runs every scanner against a source text.
//! Duplicate registrations are rejected and leave the first entry in place.

use std::fmt;

use crate::error::RegistryError;
use crate::failure::DeobfuscationFailure;

/// Alternative spellings accepted for registered schema names.
const ALIASES: [(&str, &str); 2] = [("vore", "vare"), ("hyperd", "hyperion")];

/// Selection keyword that picks every registered schema.
pub const AUTO: &str = "auto";

/// One obfuscation schema: detector, deobfuscator and result formatter.
///
/// Implementations hold no per-call state; every call works on fresh values
/// so a registry can be shared by concurrent readers.
pub trait Deobfuscator: Send + Sync {
    /// Schema-specific result, handed unchanged to [`Deobfuscator::format`].
    type Output;

    /// Cheap structural check that the schema likely applies.
    fn scan(&self, source: &str) -> bool;

    /// Reverses the obfuscation.
    ///
    /// # Errors
    ///
    /// Returns a [`DeobfuscationFailure`] with diagnostics when the schema
    /// cannot proceed.
    fn deobfuscate(&self, source: &str) -> Result<Self::Output, DeobfuscationFailure>;

    /// Renders a result as the text shown to the user.
    fn format(&self, output: Self::Output) -> String;
}

/// Object-safe view of a [`Deobfuscator`] with its output type erased.
trait Schema: Send + Sync {
    fn scan(&self, source: &str) -> bool;
    fn run(&self, source: &str) -> Result<String, DeobfuscationFailure>;
}

impl<D: Deobfuscator> Schema for D {
    fn scan(&self, source: &str) -> bool {
        Deobfuscator::scan(self, source)
    }

    fn run(&self, source: &str) -> Result<String, DeobfuscationFailure> {
        self.deobfuscate(source).map(|output| self.format(output))
    }
}

/// A registered schema.
pub struct SchemaEntry {
    name: String,
    version: u32,
    schema: Box<dyn Schema>,
}

impl fmt::Debug for SchemaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaEntry")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SchemaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

impl SchemaEntry {
    /// Normalised schema name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Runs the schema's scanner.
    #[must_use]
    pub fn scan(&self, source: &str) -> bool {
        self.schema.scan(source)
    }

    /// Deobfuscates `source` and formats the result.
    ///
    /// # Errors
    ///
    /// Propagates the schema's [`DeobfuscationFailure`].
    pub fn run(&self, source: &str) -> Result<String, DeobfuscationFailure> {
        self.schema.run(source)
    }
}

/// Registry of available schemas.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: Vec<SchemaEntry>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercases a schema name, removes spaces and applies the alias table.
    #[must_use]
    pub fn normalize(name: &str) -> String {
        let plain: String = name
            .chars()
            .filter(|c| *c != ' ')
            .flat_map(char::to_lowercase)
            .collect();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == plain)
            .map_or(plain, |(_, target)| (*target).to_owned())
    }

    /// Registers a schema under its normalised name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateVersion`] if the name and version
    /// are already taken; the existing entry is kept.
    pub fn register<D>(&mut self, name: &str, version: u32, schema: D) -> Result<(), RegistryError>
    where
        D: Deobfuscator + 'static,
    {
        let normalized = Self::normalize(name);
        if self.get(&normalized, version).is_some() {
            return Err(RegistryError::DuplicateVersion {
                name: normalized,
                version,
            });
        }
        tracing::debug!(schema = %normalized, version, "registered schema");
        self.entries.push(SchemaEntry {
            name: normalized,
            version,
            schema: Box::new(schema),
        });
        Ok(())
    }

    /// Looks up an entry by name (normalised here) and version.
    #[must_use]
    pub fn get(&self, name: &str, version: u32) -> Option<&SchemaEntry> {
        let normalized = Self::normalize(name);
        self.entries
            .iter()
            .find(|entry| entry.name == normalized && entry.version == version)
    }

    /// Every entry, in registration order.
    #[must_use]
    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    /// Returns the number of registered schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no schemas are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a selection string into entries.
    ///
    /// The string is `auto` or a comma-separated list of `name` and
    /// `name_version` tokens (`name_v1` is also accepted). A bare name selects
    /// every version of the schema. Entries are returned in token order
    /// without repeats.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidSchemaOption`] for a malformed token,
    /// [`RegistryError::UnknownSchema`] for an unregistered name and
    /// [`RegistryError::UnknownVersion`] for a missing version. Nothing is
    /// returned unless every token resolves.
    pub fn resolve(&self, option: &str) -> Result<Vec<&SchemaEntry>, RegistryError> {
        if option.trim().eq_ignore_ascii_case(AUTO) {
            return Ok(self.entries.iter().collect());
        }
        let mut selected: Vec<&SchemaEntry> = Vec::new();
        for token in option.split(',') {
            let (name, version) = parse_token(token)?;
            let versions: Vec<&SchemaEntry> = self
                .entries
                .iter()
                .filter(|entry| entry.name == name)
                .collect();
            if versions.is_empty() {
                return Err(RegistryError::unknown_schema(name));
            }
            let matched: Vec<&SchemaEntry> = match version {
                Some(wanted) => {
                    let found: Vec<&SchemaEntry> = versions
                        .into_iter()
                        .filter(|entry| entry.version == wanted)
                        .collect();
                    if found.is_empty() {
                        return Err(RegistryError::UnknownVersion {
                            name,
                            version: wanted,
                        });
                    }
                    found
                }
                None => versions,
            };
            for entry in matched {
                if !selected.iter().any(|known| std::ptr::eq(*known, entry)) {
                    selected.push(entry);
                }
            }
        }
        Ok(selected)
    }

    /// Entries whose scanner accepts `source`, in registration order.
    #[must_use]
    pub fn scan_all(&self, source: &str) -> Vec<&SchemaEntry> {
        scan_entries(self.entries.iter(), source)
    }
}

/// Keeps the entries whose scanner accepts `source`, preserving order.
pub(crate) fn scan_entries<'a>(
    entries: impl IntoIterator<Item = &'a SchemaEntry>,
    source: &str,
) -> Vec<&'a SchemaEntry> {
    entries
        .into_iter()
        .filter(|entry| {
            let accepted = entry.scan(source);
            tracing::info!(schema = %entry, accepted, "scanned");
            accepted
        })
        .collect()
}

/// Splits a selection token into a normalised name and optional version.
fn parse_token(token: &str) -> Result<(String, Option<u32>), RegistryError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::invalid_option(token, "empty schema name"));
    }
    if let Some(bad) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' ')))
    {
        return Err(RegistryError::invalid_option(
            trimmed,
            format!("unexpected character '{bad}'"),
        ));
    }
    if let Some((name, suffix)) = trimmed.rsplit_once('_') {
        let digits = suffix.strip_prefix(['v', 'V']).unwrap_or(suffix);
        if suffix.is_empty() {
            return Err(RegistryError::invalid_option(trimmed, "missing version after '_'"));
        }
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if name.trim().is_empty() {
                return Err(RegistryError::invalid_option(trimmed, "missing schema name"));
            }
            let version = digits
                .parse::<u32>()
                .map_err(|_| RegistryError::invalid_option(trimmed, "version out of range"))?;
            return Ok((SchemaRegistry::normalize(name), Some(version)));
        }
    }
    Ok((SchemaRegistry::normalize(trimmed), None))
}
