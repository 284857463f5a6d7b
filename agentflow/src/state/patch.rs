//! Step return values and the merge rules the engine applies to them.

use super::extensions::ExtensionKey;
use super::pipeline_state::{FileAnalysis, FileContent, PipelineState};
use crate::errors::AgentflowError;
use crate::services::SearchHit;
use serde::Serialize;
use std::path::PathBuf;

/// One field assignment in a [`StatePatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum StateField {
    /// Sets `result_path`.
    ResultPath(Option<PathBuf>),
    /// Sets `file_contents`.
    FileContents(Vec<FileContent>),
    /// Sets `file_analyses`.
    FileAnalyses(Vec<FileAnalysis>),
    /// Sets `podcast_script`.
    PodcastScript(Option<String>),
    /// Sets `audio_path`.
    AudioPath(Option<PathBuf>),
    /// Sets `answer`.
    Answer(Option<String>),
    /// Sets `sources`.
    Sources(Vec<SearchHit>),
    /// Sets one extension value.
    Extension {
        /// Extension key name.
        key: String,
        /// Encoded value.
        value: serde_json::Value,
    },
}

impl StateField {
    /// Field name, for logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ResultPath(_) => "result_path",
            Self::FileContents(_) => "file_contents",
            Self::FileAnalyses(_) => "file_analyses",
            Self::PodcastScript(_) => "podcast_script",
            Self::AudioPath(_) => "audio_path",
            Self::Answer(_) => "answer",
            Self::Sources(_) => "sources",
            Self::Extension { key, .. } => key.as_str(),
        }
    }
}

/// Ordered list of field assignments. Fields not listed are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    fields: Vec<StateField>,
}

impl StatePatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an assignment.
    #[must_use]
    pub fn set(mut self, field: StateField) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends an extension assignment.
    pub fn with_extension<T: Serialize>(
        mut self,
        key: ExtensionKey<T>,
        value: &T,
    ) -> Result<Self, AgentflowError> {
        self.fields.push(StateField::Extension {
            key: key.name().to_string(),
            value: serde_json::to_value(value)?,
        });
        Ok(self)
    }

    /// The assignments, in application order.
    #[must_use]
    pub fn fields(&self) -> &[StateField] {
        &self.fields
    }

    /// Number of assignments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the patch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// What a step hands back to the engine.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum StepUpdate {
    /// Replace the whole state.
    Replace(PipelineState),
    /// Overwrite only the listed fields.
    Patch(StatePatch),
}

impl From<PipelineState> for StepUpdate {
    fn from(state: PipelineState) -> Self {
        Self::Replace(state)
    }
}

impl From<StatePatch> for StepUpdate {
    fn from(patch: StatePatch) -> Self {
        Self::Patch(patch)
    }
}

impl PipelineState {
    /// Overwrites the patched fields, in list order. Later assignments win.
    pub fn apply_patch(&mut self, patch: StatePatch) {
        for field in patch.fields {
            match field {
                StateField::ResultPath(v) => self.result_path = v,
                StateField::FileContents(v) => self.file_contents = v,
                StateField::FileAnalyses(v) => self.file_analyses = v,
                StateField::PodcastScript(v) => self.podcast_script = v,
                StateField::AudioPath(v) => self.audio_path = v,
                StateField::Answer(v) => self.answer = v,
                StateField::Sources(v) => self.sources = v,
                StateField::Extension { key, value } => self.extensions.insert_raw(key, value),
            }
        }
    }

    /// Resolves a step's update against this state.
    #[must_use]
    pub fn merge(mut self, update: StepUpdate) -> Self {
        match update {
            StepUpdate::Replace(state) => state,
            StepUpdate::Patch(patch) => {
                self.apply_patch(patch);
                self
            }
        }
    }
}
