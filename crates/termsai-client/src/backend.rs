use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use termsai_core::error::Result;
use termsai_core::types::{
    AddConceptRequest, FeedbackRequest, GenerateRequest, GraphId, GraphPayload, SearchRequest,
};

/// Raw response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A backend response, either still streaming or fully buffered.
pub enum ResponseBody {
    /// A chunked `text/event-stream` body read incrementally.
    Stream(ByteStream),
    /// Anything else, read to completion up front.
    Buffered(String),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("ResponseBody::Stream(..)"),
            Self::Buffered(text) => f.debug_tuple("ResponseBody::Buffered").field(text).finish(),
        }
    }
}

/// Decide whether a response should be consumed as an event stream.
///
/// A body counts as streaming when it is declared `text/event-stream` and is
/// either chunked or has no declared length. Reverse proxies that buffer the
/// response usually add a length, in which case it is read whole.
pub fn is_event_stream(content_type: Option<&str>, chunked: bool, has_length: bool) -> bool {
    let declared = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("text/event-stream"))
        .unwrap_or(false);
    declared && (chunked || !has_length)
}

/// The graph service endpoints.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// POST /check_filter: pre-flight moderation check.
    async fn check_filter(&self, topic: &str) -> Result<bool>;

    /// POST /generate_stream: fresh generation.
    async fn generate(&self, request: &GenerateRequest) -> Result<ResponseBody>;

    /// POST /feedback: like, or dislike-and-regenerate.
    async fn feedback(&self, request: &FeedbackRequest) -> Result<ResponseBody>;

    /// POST /add_concept to merge a new concept into an existing graph.
    async fn add_concept(&self, request: &AddConceptRequest) -> Result<ResponseBody>;

    /// POST /search_graph to look up a saved graph.
    async fn search_graph(&self, request: &SearchRequest) -> Result<ResponseBody>;

    /// GET /default_graph
    async fn default_graph(&self) -> Result<GraphPayload>;

    /// GET /get_graph?graph_id=
    async fn get_graph(&self, graph_id: &GraphId) -> Result<GraphPayload>;
}
