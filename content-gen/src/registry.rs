//! Converter registry keyed by (source mime, destination mime).
//!
//! Registries are filled once at startup and only read afterwards, so they
//! are plain maps shared behind an `Arc`. Lookups are exact-pair matches; a
//! missing pair is the normal "unsupported" answer.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::converter::SharedConverter;
use crate::mime::MimeType;

/// Registry key: an ordered (source, destination) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversionKey {
    pub source: MimeType,
    pub dest: MimeType,
}

impl ConversionKey {
    /// Create a key.
    pub fn new(source: impl Into<MimeType>, dest: impl Into<MimeType>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }

    /// Whether source and destination are the same mime.
    pub fn is_self_map(&self) -> bool {
        self.source == self.dest
    }
}

impl fmt::Display for ConversionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.dest)
    }
}

/// Map of conversion pairs to converters.
#[derive(Default)]
pub struct ConverterRegistry {
    entries: HashMap<ConversionKey, SharedConverter>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a converter for a pair, returning the one it replaced.
    pub fn register(
        &mut self,
        source: MimeType,
        dest: MimeType,
        converter: SharedConverter,
    ) -> Option<SharedConverter> {
        let key = ConversionKey { source, dest };
        debug!("Registered {key}: {}", converter.describe());
        self.entries.insert(key, converter)
    }

    /// Converter for an exact pair.
    pub fn lookup(&self, source: &MimeType, dest: &MimeType) -> Option<SharedConverter> {
        self.entries
            .get(&ConversionKey {
                source: source.clone(),
                dest: dest.clone(),
            })
            .cloned()
    }

    /// Whether the pair is registered.
    pub fn supports(&self, source: &MimeType, dest: &MimeType) -> bool {
        self.lookup(source, dest).is_some()
    }

    /// Every destination registered for a source, sorted.
    pub fn destinations(&self, source: &MimeType) -> Vec<MimeType> {
        let mut dests: Vec<MimeType> = self
            .entries
            .keys()
            .filter(|key| &key.source == source)
            .map(|key| key.dest.clone())
            .collect();
        dests.sort();
        dests
    }

    /// Every registered pair, sorted.
    pub fn pairs(&self) -> Vec<ConversionKey> {
        let mut pairs: Vec<ConversionKey> = self.entries.keys().cloned().collect();
        pairs.sort();
        pairs
    }

    /// Number of registered pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two independent registries used by the generator.
#[derive(Default)]
pub struct ConverterSet {
    /// Bounded-size renditions.
    pub thumbnail: ConverterRegistry,

    /// Full-fidelity renditions.
    pub viewable: ConverterRegistry,
}

impl ConverterSet {
    /// Create a set with two empty registries.
    pub fn new() -> Self {
        Self::default()
    }
}
