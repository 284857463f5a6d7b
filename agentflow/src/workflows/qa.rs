//! `intelligent_qa`: analyze the relevant files in parallel, then answer the query.

use super::{WorkflowDeps, INTELLIGENT_QA};
use crate::errors::{AgentflowError, PipelineValidationError, ServiceError};
use crate::graph::{GraphBuilder, GraphEngine, Step, END, START};
use crate::services::{CompletionRequest, DocumentKind};
use crate::state::{
    keys, AnalysisOutcome, FileAnalysis, PipelineState, StateField, StatePatch, StepUpdate,
};
use crate::utils::truncate_chars;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Answer used when the completion backend returns nothing.
pub const EMPTY_ANSWER: &str = "Sorry, I couldn't generate an answer.";

const MEDIA_PLACEHOLDER: &str = "[Media content attached]";

/// Builds the `intelligent_qa` graph.
pub fn build_intelligent_qa(deps: &WorkflowDeps) -> Result<GraphEngine, PipelineValidationError> {
    GraphBuilder::new(INTELLIGENT_QA)
        .add_node(START, Arc::new(ResetAnalyses))?
        .add_node("parallel_parse", Arc::new(AnalyzeFiles { deps: deps.clone() }))?
        .add_node("chat", Arc::new(Chat { deps: deps.clone() }))?
        .add_edge(START, "parallel_parse")
        .add_edge("parallel_parse", "chat")
        .add_edge("chat", END)
        .with_entry_point(START)
        .build()
}

/// Picks the files a query names explicitly.
///
/// A file matches when the lowercased query contains its file name or stem, either
/// verbatim or with all whitespace removed from both sides. An empty query matches
/// nothing. Input order is preserved.
#[must_use]
pub fn infer_target_files(query: &str, files: &[PathBuf]) -> Vec<PathBuf> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    let compact_query = compact(&query);

    files
        .iter()
        .filter(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let stem = path
                .file_stem()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            [name, stem].iter().filter(|c| !c.trim().is_empty()).any(|candidate| {
                query.contains(candidate.as_str()) || compact_query.contains(&compact(candidate))
            })
        })
        .cloned()
        .collect()
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn analysis_prompt(query: &str, filename: &str, content: &str) -> String {
    format!(
        "Analyze the document below in light of the user's question. Extract the facts, \
         figures and passages that help answer it.\n\n\
         Question: {query}\n\nDocument: {filename}\n{content}\n\nAnalysis:"
    )
}

#[derive(Debug)]
struct ResetAnalyses;

#[async_trait]
impl Step for ResetAnalyses {
    fn name(&self) -> &str {
        START
    }

    async fn run(&self, _state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        Ok(StatePatch::new()
            .set(StateField::FileAnalyses(Vec::new()))
            .into())
    }
}

/// Parses and analyzes each target file. Failures are recorded per file.
#[derive(Debug)]
struct AnalyzeFiles {
    deps: WorkflowDeps,
}

#[async_trait]
impl Step for AnalyzeFiles {
    fn name(&self) -> &str {
        "parallel_parse"
    }

    async fn run(&self, state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        let request = &state.request;
        let targets = infer_target_files(&request.query, &request.files);
        let files = if targets.is_empty() {
            request.files.clone()
        } else {
            tracing::info!(targets = targets.len(), "Query names specific files");
            targets
        };
        let names: Vec<String> = files.iter().map(|p| display_name(p)).collect();

        let qa = &self.deps.config.qa;
        let parser = &self.deps.services.parser;
        let completion = &self.deps.services.completion;
        let report = self
            .deps
            .runner("parallel_parse")?
            .run(files.clone(), |item| {
                let path = item.payload.clone();
                async move {
                    let doc = parser.parse(&path).await?;
                    let (content, attachment) = match doc.kind {
                        DocumentKind::Media => (MEDIA_PLACEHOLDER.to_string(), Some(path.clone())),
                        _ => (truncate_chars(&doc.text, qa.content_char_limit).to_string(), None),
                    };
                    let call = CompletionRequest {
                        prompt: analysis_prompt(&request.query, &display_name(&path), &content),
                        model: request.model.clone(),
                        endpoint: request.endpoint.clone(),
                        temperature: qa.analysis_temperature,
                        attachment,
                    };
                    completion.complete(&call).await
                }
            })
            .await;

        let failed = report.failed_count();
        let analyses: Vec<FileAnalysis> = names
            .iter()
            .zip(report.into_results())
            .map(|(filename, result)| {
                let outcome = match result {
                    Ok(text) => {
                        tracing::debug!(
                            file = %filename,
                            preview = truncate_chars(&text, qa.preview_chars),
                            "File analyzed"
                        );
                        AnalysisOutcome::Completed(text)
                    }
                    Err(failure) => {
                        tracing::warn!(file = %filename, error = %failure, "File analysis failed");
                        AnalysisOutcome::Failed(failure.message)
                    }
                };
                FileAnalysis {
                    filename: filename.clone(),
                    outcome,
                }
            })
            .collect();

        Ok(StatePatch::new()
            .set(StateField::FileAnalyses(analyses))
            .with_extension(keys::TARGET_FILES, &names)?
            .with_extension(keys::FAILED_ITEMS, &failed)?
            .into())
    }
}

/// Answers the query from the history and the per-file analyses.
#[derive(Debug)]
struct Chat {
    deps: WorkflowDeps,
}

impl Chat {
    fn prompt(state: &PipelineState) -> String {
        let mut prompt = String::from(
            "You are a helpful assistant answering questions about the user's documents.\n",
        );
        if !state.request.history.is_empty() {
            prompt.push_str("\nConversation so far:\n");
            for message in &state.request.history {
                prompt.push_str(&format!("{}: {}\n", message.role, message.content));
            }
        }
        if !state.file_analyses.is_empty() {
            prompt.push_str("\nDocument analyses:\n");
            for analysis in &state.file_analyses {
                prompt.push_str(&format!(
                    "--- Analysis of {} ---\n{}\n\n",
                    analysis.filename,
                    analysis.outcome.render()
                ));
            }
        }
        prompt.push_str(&format!("\nQuestion: {}\nAnswer:", state.request.query));
        prompt
    }
}

#[async_trait]
impl Step for Chat {
    fn name(&self) -> &str {
        "chat"
    }

    async fn run(&self, state: &PipelineState) -> Result<StepUpdate, AgentflowError> {
        let reply = self
            .deps
            .complete(CompletionRequest {
                prompt: Self::prompt(state),
                model: state.request.model.clone(),
                endpoint: state.request.endpoint.clone(),
                temperature: self.deps.config.qa.answer_temperature,
                attachment: None,
            })
            .await
            .map_err(|err| match err {
                AgentflowError::Service(ServiceError::ModelUnavailable { service, model }) => {
                    AgentflowError::Config(format!(
                        "{service} model '{model}' is not served by the configured endpoint"
                    ))
                }
                other => other,
            })?;

        let answer = if reply.trim().is_empty() {
            EMPTY_ANSWER.to_string()
        } else {
            reply
        };
        Ok(StatePatch::new().set(StateField::Answer(Some(answer))).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentflowConfig;
    use crate::runner::RunnerConfig;
    use crate::state::{ChatMessage, Request};
    use crate::testing::{stub_services, StubCompletion, StubParser, StubSearch, StubSpeech};
    use pretty_assertions::assert_eq;

    fn engine(parser: StubParser, completion: Arc<StubCompletion>) -> GraphEngine {
        let config = AgentflowConfig::default()
            .with_runner(RunnerConfig::new().with_base_delay_ms(1));
        let deps = WorkflowDeps::new(
            stub_services(
                Arc::new(parser),
                completion,
                Arc::new(StubSpeech::new()),
                Arc::new(StubSearch::default()),
            ),
            Arc::new(config),
        );
        build_intelligent_qa(&deps).unwrap()
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_infer_matches_name_and_stem() {
        let files = paths(&["docs/Report.pdf", "notes.md", "budget 2024.xlsx"]);
        assert_eq!(
            infer_target_files("What does report.pdf say?", &files),
            paths(&["docs/Report.pdf"])
        );
        assert_eq!(
            infer_target_files("summarize NOTES please", &files),
            paths(&["notes.md"])
        );
        assert_eq!(
            infer_target_files("totals in budget2024?", &files),
            paths(&["budget 2024.xlsx"])
        );
    }

    #[test]
    fn test_infer_empty_or_unrelated_query() {
        let files = paths(&["alpha.txt", "beta.txt"]);
        assert!(infer_target_files("", &files).is_empty());
        assert!(infer_target_files("   ", &files).is_empty());
        assert!(infer_target_files("what is rust", &files).is_empty());
    }

    #[test]
    fn test_infer_short_stem_matches_as_substring() {
        // Stems match anywhere in the query, so "a" is found inside "what".
        let files = paths(&["a.txt", "zz.txt"]);
        assert_eq!(infer_target_files("what is rust", &files), paths(&["a.txt"]));
    }

    #[tokio::test]
    async fn test_named_file_narrows_analysis() {
        let completion = Arc::new(
            StubCompletion::new("final answer")
                .with_reply("Document: alpha.md", "alpha facts"),
        );
        let engine = engine(
            StubParser::new()
                .with_document("alpha.md", "alpha body")
                .with_document("beta.md", "beta body"),
            completion.clone(),
        );
        let request = Request::new()
            .with_files(["alpha.md", "beta.md"])
            .with_query("what is in alpha?");

        let state = engine.execute(PipelineState::new(request)).await.unwrap();

        assert_eq!(state.answer.as_deref(), Some("final answer"));
        assert_eq!(state.file_analyses.len(), 1);
        assert_eq!(state.file_analyses[0].filename, "alpha.md");
        assert_eq!(
            state.extensions.get(keys::TARGET_FILES).unwrap(),
            Some(vec!["alpha.md".to_string()])
        );
        let chat_prompt = completion.prompts().pop().unwrap();
        assert!(chat_prompt.contains("--- Analysis of alpha.md ---\nalpha facts"));
    }

    #[tokio::test]
    async fn test_failed_file_is_rendered_not_fatal() {
        let completion = Arc::new(
            StubCompletion::new("answer")
                .with_reply("Document: good.txt", "good analysis"),
        );
        let engine = engine(
            StubParser::new()
                .with_document("good.txt", "fine")
                .with_failure("bad.txt", "corrupt"),
            completion.clone(),
        );
        let request = Request::new()
            .with_files(["good.txt", "bad.txt"])
            .with_query("compare them")
            .with_history_message(ChatMessage::new("user", "hello"))
            .with_history_message(ChatMessage::new("assistant", "hi"));

        let state = engine.execute(PipelineState::new(request)).await.unwrap();

        assert_eq!(state.file_analyses.len(), 2);
        assert_eq!(
            state.file_analyses[0].outcome,
            AnalysisOutcome::Completed("good analysis".into())
        );
        assert!(state.file_analyses[1].outcome.is_failed());
        assert_eq!(state.extensions.get(keys::FAILED_ITEMS).unwrap(), Some(1));

        let chat_prompt = completion.prompts().pop().unwrap();
        assert!(chat_prompt.contains("user: hello\nassistant: hi\n"));
        assert!(chat_prompt.contains("--- Analysis of bad.txt ---\n[Analysis failed:"));
    }

    #[tokio::test]
    async fn test_media_is_attached() {
        let completion = Arc::new(StubCompletion::new("answer"));
        let engine = engine(
            StubParser::new().with_document("clip.mp4", ""),
            completion.clone(),
        );
        let request = Request::new().with_files(["clip.mp4"]).with_query("transcribe");

        engine.execute(PipelineState::new(request)).await.unwrap();

        let analysis = &completion.calls()[0];
        assert_eq!(analysis.attachment.as_deref(), Some(Path::new("clip.mp4")));
        assert!(analysis.prompt.contains(MEDIA_PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_empty_reply_gets_fallback_answer() {
        let engine = engine(StubParser::new(), Arc::new(StubCompletion::new("  ")));
        let request = Request::new().with_query("anything?");

        let state = engine.execute(PipelineState::new(request)).await.unwrap();

        assert!(state.file_analyses.is_empty());
        assert_eq!(state.answer.as_deref(), Some(EMPTY_ANSWER));
    }

    #[tokio::test]
    async fn test_unserved_model_becomes_config_error() {
        let completion =
            Arc::new(StubCompletion::new("unused").with_model_unavailable("Question:"));
        let engine = engine(StubParser::new(), completion.clone());
        let request = Request::new()
            .with_query("anything?")
            .with_model("gemini-missing");

        let err = engine.execute(PipelineState::new(request)).await.unwrap_err();

        match err.root_cause() {
            AgentflowError::Config(message) => {
                assert!(message.contains("gemini-missing"));
                assert!(message.contains("completion"));
            }
            other => panic!("expected a config error, got {other:?}"),
        }
        assert_eq!(completion.calls()[0].model, "gemini-missing");
    }
}
