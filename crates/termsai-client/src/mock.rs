use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use termsai_core::error::{Result, TermsError};
use termsai_core::types::{
    AddConceptRequest, FeedbackRequest, GenerateRequest, GraphId, GraphPayload, SearchRequest,
};

use crate::backend::{GraphBackend, ResponseBody};

/// One step of a scripted streaming body.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Chunk(Bytes),
    Delay(Duration),
    /// Stall forever; only cancellation gets past this.
    Hang,
    /// Transport failure mid-stream.
    Fail(String),
}

/// A scripted response for one streaming call.
#[derive(Debug, Clone)]
pub enum Script {
    Stream(Vec<ScriptStep>),
    Buffered(String),
    /// The request itself fails.
    Error(String),
    /// The request never gets a response.
    Hang,
}

impl Script {
    /// Event stream of `data:` frames, one chunk each.
    pub fn events<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Script::Stream(
            frames
                .into_iter()
                .map(|f| ScriptStep::Chunk(Bytes::from(format!("data: {}\n\n", f.as_ref()))))
                .collect(),
        )
    }

    /// Event stream made of raw text chunks.
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Script::Stream(
            chunks
                .into_iter()
                .map(|c| ScriptStep::Chunk(Bytes::copy_from_slice(c.as_ref().as_bytes())))
                .collect(),
        )
    }
}

/// A request as observed by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CheckFilter(String),
    Generate(GenerateRequest),
    Feedback(FeedbackRequest),
    AddConcept(AddConceptRequest),
    Search(SearchRequest),
    DefaultGraph,
    GetGraph(GraphId),
}

/// A scripted backend for testing without a live service.
///
/// Streaming calls pop scripts in FIFO order regardless of endpoint.
pub struct MockBackend {
    scripts: Mutex<VecDeque<Script>>,
    filtered: Mutex<std::result::Result<bool, String>>,
    graph: Mutex<Option<std::result::Result<GraphPayload, String>>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl MockBackend {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::from(scripts)),
            filtered: Mutex::new(Ok(false)),
            graph: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, script: Script) {
        lock(&self.scripts).push_back(script);
    }

    /// Verdict returned by `check_filter`.
    pub fn set_filtered(&self, filtered: bool) {
        *lock(&self.filtered) = Ok(filtered);
    }

    /// Make `check_filter` fail with a network error.
    pub fn fail_filter(&self, message: impl Into<String>) {
        *lock(&self.filtered) = Err(message.into());
    }

    /// Payload returned by `default_graph` and `get_graph`.
    pub fn set_graph(&self, payload: GraphPayload) {
        *lock(&self.graph) = Some(Ok(payload));
    }

    /// Make `default_graph` and `get_graph` report a server error.
    pub fn fail_graph(&self, message: impl Into<String>) {
        *lock(&self.graph) = Some(Err(message.into()));
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.calls).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.scripts).len()
    }

    fn record(&self, call: BackendCall) {
        lock(&self.calls).push(call);
    }

    async fn respond(&self) -> Result<ResponseBody> {
        let script = lock(&self.scripts).pop_front().ok_or_else(|| {
            TermsError::Network("MockBackend: no more scripted responses".into())
        })?;

        match script {
            Script::Stream(steps) => Ok(ResponseBody::Stream(Box::pin(play(steps)))),
            Script::Buffered(text) => Ok(ResponseBody::Buffered(text)),
            Script::Error(message) => Err(TermsError::Network(message)),
            Script::Hang => {
                futures::future::pending::<()>().await;
                Err(TermsError::Network("unreachable".into()))
            }
        }
    }

    fn graph(&self) -> Result<GraphPayload> {
        match lock(&self.graph).clone() {
            Some(Ok(payload)) => Ok(payload),
            Some(Err(message)) => Err(TermsError::ServerReported(message)),
            None => Err(TermsError::InvalidResponse("MockBackend: no graph configured".into())),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn play(steps: Vec<ScriptStep>) -> impl futures::Stream<Item = Result<Bytes>> + Send {
    async_stream::stream! {
        for step in steps {
            match step {
                ScriptStep::Chunk(bytes) => {
                    yield Ok(bytes);
                }
                ScriptStep::Delay(duration) => tokio::time::sleep(duration).await,
                ScriptStep::Hang => futures::future::pending::<()>().await,
                ScriptStep::Fail(message) => {
                    yield Err(TermsError::Network(message));
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl GraphBackend for MockBackend {
    async fn check_filter(&self, topic: &str) -> Result<bool> {
        self.record(BackendCall::CheckFilter(topic.to_string()));
        lock(&self.filtered).clone().map_err(TermsError::Network)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<ResponseBody> {
        self.record(BackendCall::Generate(request.clone()));
        self.respond().await
    }

    async fn feedback(&self, request: &FeedbackRequest) -> Result<ResponseBody> {
        self.record(BackendCall::Feedback(request.clone()));
        self.respond().await
    }

    async fn add_concept(&self, request: &AddConceptRequest) -> Result<ResponseBody> {
        self.record(BackendCall::AddConcept(request.clone()));
        self.respond().await
    }

    async fn search_graph(&self, request: &SearchRequest) -> Result<ResponseBody> {
        self.record(BackendCall::Search(request.clone()));
        self.respond().await
    }

    async fn default_graph(&self) -> Result<GraphPayload> {
        self.record(BackendCall::DefaultGraph);
        self.graph()
    }

    async fn get_graph(&self, graph_id: &GraphId) -> Result<GraphPayload> {
        self.record(BackendCall::GetGraph(graph_id.clone()));
        self.graph()
    }
}
