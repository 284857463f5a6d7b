//! Speaker-attributed parsing of labeled dialogue scripts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// `<label>: <content>` with an ASCII or full-width colon and a label of at most 20 characters.
static SPEAKER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([^:：]{1,20})\s*[:：]\s*(.+)$").expect("valid speaker line pattern")
});

/// Case-insensitive mapping from script labels to canonical speaker tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerAliases {
    default_speaker: String,
    aliases: HashMap<String, String>,
}

impl SpeakerAliases {
    /// Creates an empty alias table whose parser starts on `default_speaker`.
    #[must_use]
    pub fn new(default_speaker: impl Into<String>) -> Self {
        Self {
            default_speaker: default_speaker.into(),
            aliases: HashMap::new(),
        }
    }

    /// Adds an alias.
    #[must_use]
    pub fn with_alias(mut self, label: &str, speaker: impl Into<String>) -> Self {
        self.aliases.insert(label.trim().to_lowercase(), speaker.into());
        self
    }

    /// Resolves a label to its canonical tag.
    #[must_use]
    pub fn resolve(&self, label: &str) -> Option<&str> {
        self.aliases.get(&label.trim().to_lowercase()).map(String::as_str)
    }

    /// Returns the initial speaker tag.
    #[must_use]
    pub fn default_speaker(&self) -> &str {
        &self.default_speaker
    }
}

/// One utterance attributed to a speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueSegment {
    /// Canonical speaker tag.
    pub speaker: String,
    /// The utterance text.
    pub text: String,
}

impl DialogueSegment {
    fn new(speaker: &str, text: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            text: text.to_string(),
        }
    }
}

/// Parses a labeled dialogue script into ordered speaker segments.
///
/// A labeled line always starts a new segment. A label that resolves switches the
/// current speaker first; an unknown label leaves the speaker unchanged but its
/// content is still kept. Unlabeled lines extend the previous segment when it
/// belongs to the current speaker, and start a new one otherwise.
#[must_use]
pub fn segment_dialogue(script: &str, aliases: &SpeakerAliases) -> Vec<DialogueSegment> {
    let mut current_speaker = aliases.default_speaker().to_string();
    let mut segments: Vec<DialogueSegment> = Vec::new();

    for raw_line in script.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = SPEAKER_LINE.captures(line) {
            let label = caps.get(1).map_or("", |m| m.as_str());
            let content = caps.get(2).map_or("", |m| m.as_str()).trim();
            if let Some(speaker) = aliases.resolve(label) {
                current_speaker = speaker.to_string();
            }
            if !content.is_empty() {
                segments.push(DialogueSegment::new(&current_speaker, content));
            }
            continue;
        }

        match segments.last_mut() {
            Some(last) if last.speaker == current_speaker => {
                last.text.push(' ');
                last.text.push_str(line);
            }
            _ => segments.push(DialogueSegment::new(&current_speaker, line)),
        }
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn aliases() -> SpeakerAliases {
        SpeakerAliases::new("A")
            .with_alias("a", "A")
            .with_alias("b", "B")
            .with_alias("Host", "A")
            .with_alias("Guest", "B")
            .with_alias("主持人", "A")
            .with_alias("嘉宾", "B")
    }

    fn seg(speaker: &str, text: &str) -> DialogueSegment {
        DialogueSegment::new(speaker, text)
    }

    #[test]
    fn test_continuation_joins_previous_segment() {
        let segments = segment_dialogue("A: hi\nmore\nB: hello", &aliases());
        assert_eq!(segments, vec![seg("A", "hi more"), seg("B", "hello")]);
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        let segments = segment_dialogue("HOST: welcome\nguest: thanks", &aliases());
        assert_eq!(segments, vec![seg("A", "welcome"), seg("B", "thanks")]);
    }

    #[test]
    fn test_full_width_colon() {
        let segments = segment_dialogue("主持人：大家好\n嘉宾： 你好", &aliases());
        assert_eq!(segments, vec![seg("A", "大家好"), seg("B", "你好")]);
    }

    #[test]
    fn test_unknown_label_kept_as_content_for_current_speaker() {
        let script = "B: first\nNarrator: a scene change\nstill going";
        let segments = segment_dialogue(script, &aliases());
        assert_eq!(
            segments,
            vec![
                seg("B", "first"),
                seg("B", "a scene change still going"),
            ]
        );
    }

    #[test]
    fn test_leading_unlabeled_lines_use_default_speaker() {
        let segments = segment_dialogue("\n  intro line  \n\nB: reply", &aliases());
        assert_eq!(segments, vec![seg("A", "intro line"), seg("B", "reply")]);
    }

    #[test]
    fn test_label_without_content_is_continuation_text() {
        // `.+` after the colon needs content, so a bare label is plain text.
        let segments = segment_dialogue("B: one\nA:\nB: two", &aliases());
        assert_eq!(
            segments,
            vec![seg("B", "one A:"), seg("B", "two")]
        );
    }

    #[test]
    fn test_long_label_is_not_a_label() {
        let line = format!("{}: words", "x".repeat(21));
        let segments = segment_dialogue(&line, &aliases());
        assert_eq!(segments, vec![seg("A", &line)]);
    }

    #[test]
    fn test_continuation_after_speaker_switch_starts_new_segment() {
        let segments = segment_dialogue("A: one\nB: two\nthree", &aliases());
        assert_eq!(segments, vec![seg("A", "one"), seg("B", "two three")]);
    }
}
