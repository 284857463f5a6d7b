use super::gauge::ConcurrencyGauge;
use crate::errors::ServiceError;
use crate::services::{
    Completion, CompletionRequest, DocumentKind, ParsedDocument, Parser, Search, SearchHit,
    SpeechRequest, SpeechSynthesis,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

async fn random_pause(max: Option<Duration>) {
    if let Some(max) = max {
        let millis = {
            let upper = u64::try_from(max.as_millis()).unwrap_or(u64::MAX).max(1);
            rand::thread_rng().gen_range(0..=upper)
        };
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

/// Speech stub returning `<voice|text>` as bytes.
#[derive(Debug, Default)]
pub struct StubSpeech {
    failures: Mutex<HashMap<String, u32>>,
    permanent: Mutex<Vec<String>>,
    calls: Mutex<Vec<SpeechRequest>>,
    latency: Option<Duration>,
    gauge: Option<Arc<ConcurrencyGauge>>,
}

impl StubSpeech {
    /// Creates a stub that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The bytes returned for `request`.
    #[must_use]
    pub fn pcm_for(request: &SpeechRequest) -> Vec<u8> {
        format!("<{}|{}>", request.voice, request.text).into_bytes()
    }

    /// Fails the next `times` calls whose text equals `text`.
    #[must_use]
    pub fn fail_text_times(self, text: impl Into<String>, times: u32) -> Self {
        self.failures.lock().insert(text.into(), times);
        self
    }

    /// Fails every call whose text contains `needle`.
    #[must_use]
    pub fn always_fail_containing(self, needle: impl Into<String>) -> Self {
        self.permanent.lock().push(needle.into());
        self
    }

    /// Sleeps a random duration up to `max` before answering.
    #[must_use]
    pub fn with_random_latency(mut self, max: Duration) -> Self {
        self.latency = Some(max);
        self
    }

    /// Counts in-flight calls on `gauge`.
    #[must_use]
    pub fn with_gauge(mut self, gauge: Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    /// Requests received, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<SpeechRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SpeechSynthesis for StubSpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, ServiceError> {
        let _guard = self.gauge.as_ref().map(|p| p.enter());
        self.calls.lock().push(request.clone());
        random_pause(self.latency).await;

        if self.permanent.lock().iter().any(|n| request.text.contains(n.as_str())) {
            return Err(ServiceError::failed("speech", "scripted permanent failure"));
        }
        {
            let mut failures = self.failures.lock();
            if let Some(remaining) = failures.get_mut(&request.text) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ServiceError::failed("speech", "scripted transient failure"));
                }
            }
        }
        Ok(Self::pcm_for(request))
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail { remaining: Option<u32> },
    NoModel,
}

/// Completion stub answering by substring rules, in registration order.
#[derive(Debug)]
pub struct StubCompletion {
    default_reply: String,
    rules: Mutex<Vec<(String, Reply)>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl Default for StubCompletion {
    fn default() -> Self {
        Self::new("stub reply")
    }
}

impl StubCompletion {
    /// Creates a stub answering `default_reply` when no rule matches.
    #[must_use]
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            default_reply: default_reply.into(),
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers `reply` to prompts containing `needle`.
    #[must_use]
    pub fn with_reply(self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.lock().push((needle.into(), Reply::Text(reply.into())));
        self
    }

    /// Fails every prompt containing `needle`.
    #[must_use]
    pub fn with_failure(self, needle: impl Into<String>) -> Self {
        self.rules
            .lock()
            .push((needle.into(), Reply::Fail { remaining: None }));
        self
    }

    /// Rejects prompts containing `needle` as if the requested model were not served.
    #[must_use]
    pub fn with_model_unavailable(self, needle: impl Into<String>) -> Self {
        self.rules.lock().push((needle.into(), Reply::NoModel));
        self
    }

    /// Fails the next `times` prompts containing `needle`.
    #[must_use]
    pub fn with_transient_failure(self, needle: impl Into<String>, times: u32) -> Self {
        self.rules
            .lock()
            .push((needle.into(), Reply::Fail { remaining: Some(times) }));
        self
    }

    /// Requests received, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().clone()
    }

    /// Prompts received, in arrival order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.prompt.clone()).collect()
    }
}

#[async_trait]
impl Completion for StubCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ServiceError> {
        self.calls.lock().push(request.clone());

        let mut rules = self.rules.lock();
        for (needle, reply) in rules.iter_mut() {
            if !request.prompt.contains(needle.as_str()) {
                continue;
            }
            match reply {
                Reply::Text(text) => return Ok(text.clone()),
                Reply::NoModel => {
                    return Err(ServiceError::ModelUnavailable {
                        service: "completion".to_string(),
                        model: request.model.clone(),
                    });
                }
                Reply::Fail { remaining: None } => {
                    return Err(ServiceError::failed("completion", "scripted failure"));
                }
                Reply::Fail {
                    remaining: Some(remaining),
                } if *remaining > 0 => {
                    *remaining -= 1;
                    return Err(ServiceError::failed("completion", "scripted transient failure"));
                }
                Reply::Fail { .. } => {}
            }
        }
        Ok(self.default_reply.clone())
    }
}

/// Parser stub serving in-memory documents keyed by path.
#[derive(Debug, Default)]
pub struct StubParser {
    documents: HashMap<PathBuf, Result<String, String>>,
    calls: Mutex<Vec<PathBuf>>,
}

impl StubParser {
    /// Creates a parser with no documents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `text` for `path`.
    #[must_use]
    pub fn with_document(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.documents.insert(path.into(), Ok(text.into()));
        self
    }

    /// Fails every parse of `path`.
    #[must_use]
    pub fn with_failure(mut self, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        self.documents.insert(path.into(), Err(message.into()));
        self
    }

    /// Paths parsed, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Parser for StubParser {
    async fn parse(&self, path: &Path) -> Result<ParsedDocument, ServiceError> {
        self.calls.lock().push(path.to_path_buf());
        match self.documents.get(path) {
            Some(Ok(text)) => Ok(ParsedDocument {
                filename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                kind: DocumentKind::from_path(path),
                text: text.clone(),
            }),
            Some(Err(message)) => Err(ServiceError::failed("parser", message.clone())),
            None => Err(ServiceError::failed(
                "parser",
                format!("{} not found", path.display()),
            )),
        }
    }
}

/// Search stub returning a fixed hit list.
#[derive(Debug, Default)]
pub struct StubSearch {
    hits: Vec<SearchHit>,
    failing: bool,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StubSearch {
    /// Creates a stub returning `count` numbered hits.
    #[must_use]
    pub fn with_hits(count: usize) -> Self {
        let hits = (1..=count)
            .map(|i| SearchHit {
                title: format!("Result {i}"),
                link: format!("https://example.com/{i}"),
                snippet: format!("Snippet {i}"),
            })
            .collect();
        Self {
            hits,
            ..Self::default()
        }
    }

    /// Creates a stub whose every call fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// `(query, top_k)` pairs received.
    #[must_use]
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl Search for StubSearch {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, ServiceError> {
        self.queries.lock().push((query.to_string(), top_k));
        if self.failing {
            return Err(ServiceError::failed("search", "scripted failure"));
        }
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    fn speech(text: &str) -> SpeechRequest {
        SpeechRequest {
            text: text.into(),
            voice: "Kore".into(),
            model: String::new(),
            endpoint: String::new(),
        }
    }

    fn prompt(text: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: text.into(),
            model: String::new(),
            endpoint: String::new(),
            temperature: 0.0,
            attachment: None,
        }
    }

    #[tokio::test]
    async fn test_speech_transient_failure_then_success() {
        let stub = StubSpeech::new().fail_text_times("third", 1);

        assert_err!(stub.synthesize(&speech("third")).await);
        let bytes = assert_ok!(stub.synthesize(&speech("third")).await);
        assert_eq!(bytes, b"<Kore|third>".to_vec());
        assert_eq!(stub.call_count(), 2);
    }

    #[tokio::test]
    async fn test_completion_rules_in_order() {
        let stub = StubCompletion::new("default")
            .with_transient_failure("flaky", 1)
            .with_reply("flaky", "recovered")
            .with_failure("broken");

        assert_err!(stub.complete(&prompt("a flaky prompt")).await);
        assert_eq!(assert_ok!(stub.complete(&prompt("a flaky prompt")).await), "recovered");
        assert_err!(stub.complete(&prompt("broken")).await);
        assert_eq!(assert_ok!(stub.complete(&prompt("other")).await), "default");
        assert_eq!(stub.prompts().len(), 4);
    }

    #[tokio::test]
    async fn test_parser_and_search() {
        let parser = StubParser::new()
            .with_document("docs/a.md", "alpha")
            .with_failure("docs/b.pdf", "encrypted");

        let doc = assert_ok!(parser.parse(Path::new("docs/a.md")).await);
        assert_eq!(doc.filename, "a.md");
        assert_err!(parser.parse(Path::new("docs/b.pdf")).await);
        assert_err!(parser.parse(Path::new("docs/c.txt")).await);

        let search = StubSearch::with_hits(5);
        assert_eq!(assert_ok!(search.search("q", 3).await).len(), 3);
        assert_err!(StubSearch::failing().search("q", 3).await);
    }
}
