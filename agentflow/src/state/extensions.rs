//! Typed side-channel values on [`PipelineState`](super::PipelineState).

use crate::errors::AgentflowError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// A named slot in [`Extensions`] holding values of type `T`.
pub struct ExtensionKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ExtensionKey<T> {
    /// Declares a key.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ExtensionKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ExtensionKey<T> {}

impl<T> fmt::Debug for ExtensionKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExtensionKey").field(&self.name).finish()
    }
}

/// Documented extension keys used by the built-in workflows.
pub mod keys {
    use super::ExtensionKey;

    /// Files the Q&A workflow decided the query is about.
    pub const TARGET_FILES: ExtensionKey<Vec<String>> = ExtensionKey::new("target_files");

    /// Number of speech chunks synthesized for the podcast.
    pub const TTS_SEGMENT_COUNT: ExtensionKey<usize> = ExtensionKey::new("tts_segment_count");

    /// Items recovered by the serial salvage phase in the last fan-out.
    pub const SALVAGED_ITEMS: ExtensionKey<usize> = ExtensionKey::new("salvaged_items");

    /// Items that stayed failed in the last best-effort fan-out.
    pub const FAILED_ITEMS: ExtensionKey<usize> = ExtensionKey::new("failed_items");
}

/// Map of typed values keyed by [`ExtensionKey`].
///
/// Values are stored as JSON so the whole state stays serializable; reads decode
/// against the key's declared type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Extensions {
    values: BTreeMap<String, serde_json::Value>,
}

impl Extensions {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under `key`, replacing any previous one.
    pub fn insert<T: Serialize>(
        &mut self,
        key: ExtensionKey<T>,
        value: &T,
    ) -> Result<(), AgentflowError> {
        let encoded = serde_json::to_value(value)?;
        self.values.insert(key.name().to_string(), encoded);
        Ok(())
    }

    /// Reads the value under `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the stored value does not decode as `T`.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: ExtensionKey<T>,
    ) -> Result<Option<T>, AgentflowError> {
        self.values
            .get(key.name())
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(Into::into)
    }

    /// Stores an already-encoded value.
    pub(crate) fn insert_raw(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.values.insert(name.into(), value);
    }

    /// Whether a value exists under `key`.
    #[must_use]
    pub fn contains<T>(&self, key: ExtensionKey<T>) -> bool {
        self.values.contains_key(key.name())
    }

    /// Removes the value under `key`.
    pub fn remove<T>(&mut self, key: ExtensionKey<T>) -> bool {
        self.values.remove(key.name()).is_some()
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
