//! `kb_podcast`: parse files, write a script, synthesize it to one WAV file.

use super::{WorkflowDeps, KB_PODCAST};
use crate::errors::{AgentflowError, PipelineValidationError, ServiceError};
use crate::graph::{GraphBuilder, GraphEngine, Step, END, START};
use crate::segmentation::{segment_dialogue, segment_text, DialogueSegment, SpeakerAliases};
use crate::services::audio::{encode_wav, WavSpec};
use crate::services::{CompletionRequest, DocumentKind, SpeechRequest};
use crate::state::{
    keys, ContentOutcome, FileContent, PipelineState, PodcastMode, Request, StateField,
    StatePatch, StepUpdate,
};
use crate::utils::{truncate_chars, unix_timestamp};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Script used when no file could be parsed. No audio is produced for it.
pub const NO_CONTENT_SCRIPT: &str = "No content available for podcast generation.";

const SPEAKER_A: &str = "A";
const SPEAKER_B: &str = "B";

/// Builds the `kb_podcast` graph.
pub fn build_kb_podcast(deps: &WorkflowDeps) -> Result<GraphEngine, PipelineValidationError> {
    GraphBuilder::new(KB_PODCAST)
        .add_node(START, Arc::new(PrepareOutput { deps: deps.clone() }))?
        .add_node("parse_files", Arc::new(ParseFiles { deps: deps.clone() }))?
        .add_node("generate_script", Arc::new(GenerateScript { deps: deps.clone() }))?
        .add_node("generate_audio", Arc::new(GenerateAudio { deps: deps.clone() }))?
        .add_edge(START, "parse_files")
        .add_edge("parse_files", "generate_script")
        .add_edge("generate_script", "generate_audio")
        .add_edge("generate_audio", END)
        .with_entry_point(START)
        .build()
}

fn speaker_labels(request: &Request) -> (&'static str, &'static str) {
    if request.is_chinese() {
        ("主持人", "嘉宾")
    } else {
        ("Host", "Guest")
    }
}

fn speaker_aliases(request: &Request) -> SpeakerAliases {
    let (host, guest) = speaker_labels(request);
    SpeakerAliases::new(SPEAKER_A)
        .with_alias(host, SPEAKER_A)
        .with_alias(guest, SPEAKER_B)
        .with_alias("a", SPEAKER_A)
        .with_alias("b", SPEAKER_B)
        .with_alias("speaker a", SPEAKER_A)
        .with_alias("speaker b", SPEAKER_B)
        .with_alias("角色a", SPEAKER_A)
        .with_alias("角色b", SPEAKER_B)
        .with_alias("主播", SPEAKER_A)
        .with_alias("嘉宾", SPEAKER_B)
}

/// Splits a script into speech chunks no longer than `max_chars`.
pub(crate) fn speech_chunks(
    script: &str,
    request: &Request,
    max_chars: usize,
) -> Vec<DialogueSegment> {
    let utterances = match request.podcast_mode {
        PodcastMode::Dialog => segment_dialogue(script, &speaker_aliases(request)),
        PodcastMode::Monologue => vec![DialogueSegment {
            speaker: SPEAKER_A.to_string(),
            text: script.to_string(),
        }],
    };

    utterances
        .into_iter()
        .flat_map(|utterance| {
            segment_text(&utterance.text, max_chars)
                .into_iter()
                .filter(|chunk| !chunk.trim().is_empty())
                .map(move |text| DialogueSegment {
                    speaker: utterance.speaker.clone(),
                    text,
                })
        })
        .collect()
}

fn script_prompt(request: &Request, sources: &str) -> String {
    let mut prompt = String::from(
        "You are a knowledge podcast producer. Using the material below, write a \
         5-10 minute podcast script.\n\nRequirements:\n\
         1. Conversational and vivid, avoid written style\n\
         2. Clear structure: opening, core content, summary\n\
         3. Use analogies and examples\n\
         4. Address the listener directly now and then\n",
    );
    prompt.push_str(&format!("5. Write in language '{}'\n", request.language));
    if request.podcast_mode == PodcastMode::Dialog {
        let (host, guest) = speaker_labels(request);
        prompt.push_str(&format!(
            "6. Two speakers. Output one line per turn, strictly as:\n{host}: ...\n{guest}: ...\n"
        ));
    }
    prompt.push_str("\nMaterial:\n");
    prompt.push_str(sources);
    prompt.push_str("\nPodcast script:");
    prompt
}

/// Chooses the run directory and clears outputs from any earlier run.
#[derive(Debug)]
struct PrepareOutput {
    deps: WorkflowDeps,
}

#[async_trait]
impl Step for PrepareOutput {
    fn name(&self) -> &str {
        START
    }

    async fn run(&self, state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        let result_path = match &state.result_path {
            Some(path) => path.clone(),
            None => self
                .deps
                .config
                .output_root
                .join(&state.request.user)
                .join(format!("{}_podcast", unix_timestamp())),
        };
        tokio::fs::create_dir_all(&result_path).await?;

        Ok(StatePatch::new()
            .set(StateField::ResultPath(Some(result_path)))
            .set(StateField::FileContents(Vec::new()))
            .set(StateField::PodcastScript(None))
            .set(StateField::AudioPath(None))
            .into())
    }
}

/// Best-effort parse of every input file.
#[derive(Debug)]
struct ParseFiles {
    deps: WorkflowDeps,
}

#[async_trait]
impl Step for ParseFiles {
    fn name(&self) -> &str {
        "parse_files"
    }

    async fn run(&self, state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        let files = state.request.files.clone();
        if files.is_empty() {
            return Ok(StatePatch::new().set(StateField::FileContents(Vec::new())).into());
        }

        let limit = self.deps.config.podcast.content_char_limit;
        let parser = &self.deps.services.parser;
        let report = self
            .deps
            .runner("parse_files")?
            .run(files.clone(), |item| {
                let path = item.payload.clone();
                async move {
                    let doc = parser.parse(&path).await?;
                    Ok::<_, ServiceError>(truncate_chars(&doc.text, limit).to_string())
                }
            })
            .await;

        let salvaged = report.salvaged_count();
        let failed = report.failed_count();
        let contents: Vec<FileContent> = files
            .iter()
            .zip(report.into_results())
            .map(|(path, result)| FileContent {
                filename: file_name(path),
                kind: DocumentKind::from_path(path),
                outcome: match result {
                    Ok(text) => ContentOutcome::Parsed(text),
                    Err(failure) => ContentOutcome::Failed(failure.to_string()),
                },
            })
            .collect();

        tracing::info!(files = contents.len(), failed, salvaged, "Parsed podcast sources");
        Ok(StatePatch::new()
            .set(StateField::FileContents(contents))
            .with_extension(keys::FAILED_ITEMS, &failed)?
            .with_extension(keys::SALVAGED_ITEMS, &salvaged)?
            .into())
    }
}

/// Writes the script with the completion backend and saves it as `script.txt`.
#[derive(Debug)]
struct GenerateScript {
    deps: WorkflowDeps,
}

#[async_trait]
impl Step for GenerateScript {
    fn name(&self) -> &str {
        "generate_script"
    }

    async fn run(&self, state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        let result_path = state.require_result_path()?;

        let mut sources = String::new();
        for (filename, text) in state.parsed_texts() {
            sources.push_str(&format!("=== {filename} ===\n{text}\n\n"));
        }

        let script = if sources.is_empty() {
            NO_CONTENT_SCRIPT.to_string()
        } else {
            let reply = self
                .deps
                .complete(CompletionRequest {
                    prompt: script_prompt(&state.request, &sources),
                    model: state.request.model.clone(),
                    endpoint: state.request.endpoint.clone(),
                    temperature: self.deps.config.podcast.script_temperature,
                    attachment: None,
                })
                .await?;
            if reply.trim().is_empty() {
                return Err(ServiceError::failed("completion", "empty podcast script").into());
            }
            reply
        };

        tokio::fs::write(result_path.join("script.txt"), &script).await?;
        Ok(StatePatch::new()
            .set(StateField::PodcastScript(Some(script)))
            .into())
    }
}

/// Synthesizes every chunk and writes `podcast.wav`. Any lost chunk aborts the run.
#[derive(Debug)]
struct GenerateAudio {
    deps: WorkflowDeps,
}

#[async_trait]
impl Step for GenerateAudio {
    fn name(&self) -> &str {
        "generate_audio"
    }

    async fn run(&self, state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        let script = state.require_podcast_script()?;
        if state.parsed_texts().next().is_none() {
            tracing::info!("No parsed content, skipping audio");
            return Ok(StatePatch::new().set(StateField::AudioPath(None)).into());
        }
        let result_path = state.require_result_path()?;

        let podcast = &self.deps.config.podcast;
        let chunks = speech_chunks(script, &state.request, podcast.max_chars);
        if chunks.is_empty() {
            return Err(AgentflowError::Config(
                "podcast script produced no speech segments".into(),
            ));
        }
        let chunk_count = chunks.len();

        let speech = &self.deps.services.speech;
        let request = &state.request;
        let report = self
            .deps
            .runner("generate_audio")?
            .run(chunks, |item| {
                let voice = if item.payload.speaker == SPEAKER_B {
                    &request.voice_b
                } else {
                    &request.voice_a
                };
                let call = SpeechRequest {
                    text: item.payload.text.clone(),
                    voice: voice.clone(),
                    model: request.tts_model.clone(),
                    endpoint: request.endpoint.clone(),
                };
                async move { speech.synthesize(&call).await }
            })
            .await;

        let salvaged = report.salvaged_count();
        let pcm: Vec<u8> = report.into_values()?.concat();
        let audio_path: PathBuf = result_path.join("podcast.wav");
        let wav = encode_wav(&pcm, &WavSpec::mono16(podcast.sample_rate));
        tokio::fs::write(&audio_path, wav).await?;

        tracing::info!(
            path = %audio_path.display(),
            chunks = chunk_count,
            salvaged,
            bytes = pcm.len(),
            "Podcast audio written"
        );
        Ok(StatePatch::new()
            .set(StateField::AudioPath(Some(audio_path)))
            .with_extension(keys::TTS_SEGMENT_COUNT, &chunk_count)?
            .with_extension(keys::SALVAGED_ITEMS, &salvaged)?
            .into())
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentflowConfig;
    use crate::runner::RunnerConfig;
    use crate::services::audio::WAV_HEADER_LEN;
    use crate::testing::{stub_services, StubCompletion, StubParser, StubSearch, StubSpeech};
    use pretty_assertions::assert_eq;

    struct Fixture {
        engine: GraphEngine,
        completion: Arc<StubCompletion>,
        speech: Arc<StubSpeech>,
        _dir: tempfile::TempDir,
    }

    fn fixture(parser: StubParser, completion: StubCompletion, speech: StubSpeech) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentflowConfig::default()
            .with_output_root(dir.path())
            .with_runner(RunnerConfig::new().with_base_delay_ms(1));
        let completion = Arc::new(completion);
        let speech = Arc::new(speech);
        let deps = WorkflowDeps::new(
            stub_services(
                Arc::new(parser),
                completion.clone(),
                speech.clone(),
                Arc::new(StubSearch::default()),
            ),
            Arc::new(config),
        );
        Fixture {
            engine: build_kb_podcast(&deps).unwrap(),
            completion,
            speech,
            _dir: dir,
        }
    }

    #[test]
    fn test_graph_shape() {
        let f = fixture(StubParser::new(), StubCompletion::default(), StubSpeech::new());
        assert_eq!(
            f.engine.execution_order(),
            vec![START, "parse_files", "generate_script", "generate_audio", END]
        );
    }

    #[test]
    fn test_dialogue_chunks_map_aliases() {
        let request = Request::new().with_podcast_mode(PodcastMode::Dialog);
        let chunks = speech_chunks(
            "Host: Welcome.\nGuest: Thanks.\nnarrator: aside\nSpeaker B: More.",
            &request,
            1500,
        );
        let speakers: Vec<_> = chunks.iter().map(|c| c.speaker.as_str()).collect();
        assert_eq!(speakers, vec!["A", "B", "B", "B"]);
        assert_eq!(chunks[2].text, "aside");
    }

    #[test]
    fn test_chinese_labels() {
        let request = Request::new()
            .with_podcast_mode(PodcastMode::Dialog)
            .with_language("zh");
        let chunks = speech_chunks("主持人：大家好\n嘉宾：你好", &request, 1500);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].speaker, "A");
        assert_eq!(chunks[1].speaker, "B");
    }

    #[test]
    fn test_monologue_chunks_respect_limit() {
        let script = "One sentence here. ".repeat(40);
        let chunks = speech_chunks(&script, &Request::new(), 100);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 100 && c.speaker == "A"));
    }

    #[tokio::test]
    async fn test_dialog_podcast_end_to_end() {
        let f = fixture(
            StubParser::new().with_document("notes.md", "Rust ownership explained."),
            StubCompletion::new("Host: Hello there.\nGuest: Hi!"),
            StubSpeech::new().fail_text_times("Hi!", 1),
        );
        let request = Request::new()
            .with_files(["notes.md"])
            .with_podcast_mode(PodcastMode::Dialog);

        let state = f.engine.execute(PipelineState::new(request)).await.unwrap();

        let script_path = state.result_path.as_ref().unwrap().join("script.txt");
        assert_eq!(
            std::fs::read_to_string(script_path).unwrap(),
            "Host: Hello there.\nGuest: Hi!"
        );
        assert!(f.completion.prompts()[0].contains("Rust ownership explained."));
        assert!(f.completion.prompts()[0].contains("Guest: ..."));

        let wav = std::fs::read(state.audio_path.as_ref().unwrap()).unwrap();
        let expected: Vec<u8> = [("Kore", "Hello there."), ("Puck", "Hi!")]
            .iter()
            .flat_map(|(voice, text)| format!("<{voice}|{text}>").into_bytes())
            .collect();
        assert_eq!(&wav[WAV_HEADER_LEN..], &expected[..]);
        assert_eq!(state.extensions.get(keys::TTS_SEGMENT_COUNT).unwrap(), Some(2));
        assert_eq!(f.speech.call_count(), 3);
    }

    #[tokio::test]
    async fn test_no_content_skips_audio() {
        let f = fixture(
            StubParser::new().with_failure("broken.pdf", "encrypted"),
            StubCompletion::default(),
            StubSpeech::new(),
        );
        let request = Request::new().with_files(["broken.pdf"]);

        let state = f.engine.execute(PipelineState::new(request)).await.unwrap();

        assert_eq!(state.podcast_script.as_deref(), Some(NO_CONTENT_SCRIPT));
        assert_eq!(state.audio_path, None);
        assert!(matches!(state.file_contents[0].outcome, ContentOutcome::Failed(_)));
        assert_eq!(state.extensions.get(keys::FAILED_ITEMS).unwrap(), Some(1));
        assert!(f.completion.calls().is_empty());
        assert_eq!(f.speech.call_count(), 0);
    }

    #[tokio::test]
    async fn test_lost_chunk_aborts() {
        let f = fixture(
            StubParser::new().with_document("a.txt", "content"),
            StubCompletion::new("A short script. With a cursed sentence."),
            StubSpeech::new().always_fail_containing("cursed"),
        );
        let request = Request::new().with_files(["a.txt"]);

        let err = f
            .engine
            .execute(PipelineState::new(request))
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            AgentflowError::PipelineAborted { step, .. } if step == "generate_audio"
        ));
        assert!(matches!(err.root_cause(), AgentflowError::ItemFailed(f) if f.attempts == 5));
    }

    #[tokio::test]
    async fn test_script_failure_aborts() {
        let f = fixture(
            StubParser::new().with_document("a.txt", "content"),
            StubCompletion::new("unused").with_failure("podcast"),
            StubSpeech::new(),
        );
        let request = Request::new().with_files(["a.txt"]);

        let err = f
            .engine
            .execute(PipelineState::new(request))
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            AgentflowError::PipelineAborted { step, .. } if step == "generate_script"
        ));
    }
}
