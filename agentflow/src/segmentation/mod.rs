//! Pure text segmentation used before chunk-wise service calls.
//!
//! This module provides:
//! - Character-budget chunking of long text
//! - Speaker-attributed parsing of labeled dialogue scripts

mod dialogue;
mod text;

pub use dialogue::{segment_dialogue, DialogueSegment, SpeakerAliases};
pub use text::segment_text;
