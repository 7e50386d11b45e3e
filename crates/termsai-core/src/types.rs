use std::collections::BTreeSet;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Graph data
// ---------------------------------------------------------------------------

/// Identifier of a stored graph.
///
/// The backend hands out integer ids but accepts either form, so the id keeps
/// whichever representation it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphId {
    Int(i64),
    Text(String),
}

impl GraphId {
    /// Parse user input, preferring the integer form the backend stores.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.parse::<i64>() {
            Ok(n) => GraphId::Int(n),
            Err(_) => GraphId::Text(trimmed.to_string()),
        }
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphId::Int(n) => write!(f, "{n}"),
            GraphId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for GraphId {
    fn from(s: &str) -> Self {
        GraphId::Text(s.to_string())
    }
}

impl From<i64> for GraphId {
    fn from(n: i64) -> Self {
        GraphId::Int(n)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeColor {
    pub background: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<NodeColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Nodes and edges handed to the renderer, plus whatever layout options the
/// backend attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkData {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NetworkData {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Ids of nodes sharing an edge with `id`, in either direction.
    pub fn neighbors(&self, id: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for edge in &self.edges {
            if edge.from == id {
                out.insert(edge.to.clone());
            }
            if edge.to == id {
                out.insert(edge.from.clone());
            }
        }
        out
    }
}

/// A finished graph as delivered by a `complete` event or a buffered body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    pub graph_id: GraphId,
    pub network_data: NetworkData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, alias = "conceptCount", skip_serializing_if = "Option::is_none")]
    pub concept_count: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Stream events
// ---------------------------------------------------------------------------

pub const STATUS_COMPLETE: &str = "complete";
pub const STATUS_ERROR: &str = "error";

/// One decoded frame of a generation stream.
///
/// Streaming endpoints always send `status`; buffered JSON bodies may omit it
/// and carry `error` or `data` alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<GraphPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamEvent {
    pub fn progress(progress: f64, message: impl Into<String>) -> Self {
        Self {
            status: Some("progress".into()),
            progress: Some(progress),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn complete(data: GraphPayload) -> Self {
        Self {
            status: Some(STATUS_COMPLETE.into()),
            progress: Some(100.0),
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Some(STATUS_ERROR.into()),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some(STATUS_ERROR) || self.error.is_some()
    }

    /// A completion needs a payload; a bare `data` body with no status counts.
    pub fn is_complete(&self) -> bool {
        self.data.is_some()
            && matches!(self.status.as_deref(), None | Some(STATUS_COMPLETE))
    }
}

/// Envelope of the plain JSON graph endpoints (`/default_graph`, `/get_graph`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphEnvelope {
    #[serde(default)]
    pub data: Option<GraphPayload>,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Number of concepts requested per generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptCount(u32);

impl ConceptCount {
    pub const MIN: u32 = 5;
    pub const MAX: u32 = 20;
    pub const DEFAULT: u32 = 10;

    /// Clamp into the accepted range.
    pub fn new(n: u32) -> Self {
        Self(n.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn increment(self) -> Self {
        Self::new(self.0.saturating_add(1))
    }

    pub fn decrement(self) -> Self {
        Self::new(self.0.saturating_sub(1))
    }
}

impl Default for ConceptCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterRequest {
    pub topic: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterVerdict {
    #[serde(default)]
    pub filtered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub topic: String,
    pub count: u32,
}

/// The add-concept request that produced the currently displayed graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentContext {
    pub topic: String,
    pub count: u32,
    pub new_concept: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_graph_id: Option<GraphId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddedConceptData {
    #[serde(flatten)]
    pub context: AugmentContext,
    pub regenerate: bool,
}

/// Augmentation fields merged into a regeneration request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AugmentReplay {
    #[serde(flatten)]
    pub context: AugmentContext,
    pub is_new_concept: bool,
    pub added_concept_data: AddedConceptData,
}

impl AugmentReplay {
    pub fn regenerate(context: AugmentContext) -> Self {
        Self {
            added_concept_data: AddedConceptData {
                context: context.clone(),
                regenerate: true,
            },
            context,
            is_new_concept: true,
        }
    }
}

/// Body of `POST /feedback`. With a replay attached, its context supplies
/// `topic` and `count` and each key is written once.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRequest {
    pub topic: String,
    pub count: u32,
    pub graph_id: Option<GraphId>,
    pub is_like: bool,
    pub augment: Option<AugmentReplay>,
}

impl Serialize for FeedbackRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (topic, count) = match &self.augment {
            Some(replay) => (&replay.context.topic, replay.context.count),
            None => (&self.topic, self.count),
        };
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("topic", topic)?;
        map.serialize_entry("count", &count)?;
        map.serialize_entry("graph_id", &self.graph_id)?;
        map.serialize_entry("is_like", &self.is_like)?;
        if let Some(replay) = &self.augment {
            map.serialize_entry("new_concept", &replay.context.new_concept)?;
            if let Some(base) = &replay.context.base_graph_id {
                map.serialize_entry("base_graph_id", base)?;
            }
            map.serialize_entry("is_new_concept", &replay.is_new_concept)?;
            map.serialize_entry("added_concept_data", &replay.added_concept_data)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddConceptRequest {
    pub graph_id: Option<GraphId>,
    pub new_concept: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub graph_id: GraphId,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// User-initiated action that opens a generation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Generate,
    Regenerate,
    Like,
    AddConcept,
    Search,
}

impl Operation {
    /// Add-concept responses are parsed strictly; everything else tolerates
    /// fragments.
    pub fn is_strict(&self) -> bool {
        matches!(self, Operation::AddConcept)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate => write!(f, "generate"),
            Self::Regenerate => write!(f, "regenerate"),
            Self::Like => write!(f, "like"),
            Self::AddConcept => write!(f, "add_concept"),
            Self::Search => write!(f, "search"),
        }
    }
}
