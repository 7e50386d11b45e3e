use std::collections::BTreeSet;
use std::sync::Mutex;

use termsai_core::types::{GraphId, NetworkData};

use crate::state::GenerationState;

/// Presentation surface driven by the controller.
///
/// Calls arrive from controller, reader and timer tasks alike, so every
/// method takes `&self`.
pub trait View: Send + Sync + 'static {
    /// Every state transition, in order.
    fn state_changed(&self, _state: GenerationState) {}

    fn set_info(&self, text: &str);
    fn set_progress(&self, percent: f64);
    fn show_progress(&self, visible: bool);

    fn render_graph(&self, data: &NetworkData);
    fn clear_graph(&self);
    /// `None` hides the graph id display.
    fn show_graph_id(&self, id: Option<&GraphId>);

    fn show_feedback(&self, visible: bool);
    fn set_like_enabled(&self, enabled: bool);
    fn show_search(&self, visible: bool);
    fn show_download(&self, visible: bool);

    fn set_generate_label(&self, label: &str);
    fn set_network_loading(&self, visible: bool);

    fn highlight(&self, _ids: &BTreeSet<String>) {}

    /// Modal notice.
    fn alert(&self, text: &str);
}

/// Everything a [`RecordingView`] saw.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    State(GenerationState),
    Info(String),
    Progress(f64),
    ProgressVisible(bool),
    Render(NetworkData),
    ClearGraph,
    GraphId(Option<GraphId>),
    Feedback(bool),
    LikeEnabled(bool),
    Search(bool),
    Download(bool),
    GenerateLabel(String),
    NetworkLoading(bool),
    Highlight(BTreeSet<String>),
    Alert(String),
}

/// A view that records every call, for tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn states(&self) -> Vec<GenerationState> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ViewEvent::State(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Info(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_info(&self) -> Option<String> {
        self.infos().pop()
    }

    pub fn renders(&self) -> Vec<NetworkData> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Render(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                ViewEvent::Alert(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, event: &ViewEvent) -> bool {
        self.lock().contains(event)
    }

    fn push(&self, event: ViewEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ViewEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl View for RecordingView {
    fn state_changed(&self, state: GenerationState) {
        self.push(ViewEvent::State(state));
    }

    fn set_info(&self, text: &str) {
        self.push(ViewEvent::Info(text.to_string()));
    }

    fn set_progress(&self, percent: f64) {
        self.push(ViewEvent::Progress(percent));
    }

    fn show_progress(&self, visible: bool) {
        self.push(ViewEvent::ProgressVisible(visible));
    }

    fn render_graph(&self, data: &NetworkData) {
        self.push(ViewEvent::Render(data.clone()));
    }

    fn clear_graph(&self) {
        self.push(ViewEvent::ClearGraph);
    }

    fn show_graph_id(&self, id: Option<&GraphId>) {
        self.push(ViewEvent::GraphId(id.cloned()));
    }

    fn show_feedback(&self, visible: bool) {
        self.push(ViewEvent::Feedback(visible));
    }

    fn set_like_enabled(&self, enabled: bool) {
        self.push(ViewEvent::LikeEnabled(enabled));
    }

    fn show_search(&self, visible: bool) {
        self.push(ViewEvent::Search(visible));
    }

    fn show_download(&self, visible: bool) {
        self.push(ViewEvent::Download(visible));
    }

    fn set_generate_label(&self, label: &str) {
        self.push(ViewEvent::GenerateLabel(label.to_string()));
    }

    fn set_network_loading(&self, visible: bool) {
        self.push(ViewEvent::NetworkLoading(visible));
    }

    fn highlight(&self, ids: &BTreeSet<String>) {
        self.push(ViewEvent::Highlight(ids.clone()));
    }

    fn alert(&self, text: &str) {
        self.push(ViewEvent::Alert(text.to_string()));
    }
}
