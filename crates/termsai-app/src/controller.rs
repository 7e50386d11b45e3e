//! Session orchestration.
//!
//! The controller owns all UI state and runs at most one network session at
//! a time. Every view mutation happens with the state lock held and after
//! checking that the calling session is still the current, live one, so a
//! cancelled or superseded session can never write over its successor.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use termsai_client::backend::GraphBackend;
use termsai_client::reader::interpretations;
use termsai_core::config::ClientConfig;
use termsai_core::error::{Result, TermsError};
use termsai_core::interpret::{Interpretation, ParseMode};
use termsai_core::text;
use termsai_core::types::{
    AddConceptRequest, AugmentContext, AugmentReplay, ConceptCount, FeedbackRequest,
    GenerateRequest, GraphId, GraphPayload, NetworkData, Operation, SearchRequest,
};

use crate::session::{Session, SessionId};
use crate::state::GenerationState;
use crate::ticker::LoadingTicker;
use crate::view::View;

/// Everything the UI remembers between sessions.
#[derive(Debug, Default)]
struct AppState {
    state: GenerationState,
    topic: String,
    count: ConceptCount,
    /// Topic and count of the last generation, for regenerate detection.
    last_generated: Option<(String, u32)>,
    graph_id: Option<GraphId>,
    network: Option<NetworkData>,
    /// Set while the displayed graph came from an add-concept merge.
    augment: Option<AugmentContext>,
    session: Option<Arc<Session>>,
    next_session_id: SessionId,
    ticker: LoadingTicker,
    reset: Option<JoinHandle<()>>,
    completed_session: Option<SessionId>,
}

impl AppState {
    fn is_current(&self, session: &Session) -> bool {
        self.session.as_ref().is_some_and(|s| s.id() == session.id()) && session.is_live()
    }
}

enum Request {
    Generate(GenerateRequest),
    Feedback(FeedbackRequest),
    AddConcept(AddConceptRequest),
    Search(SearchRequest),
}

enum AugmentUpdate {
    Keep,
    Clear,
    Set(AugmentContext),
}

/// How a session presents itself and what its completion changes.
struct Plan {
    op: Operation,
    starting: Option<&'static str>,
    requires_graph: bool,
    augment: AugmentUpdate,
    /// Adopt the topic and count carried by the payload.
    adopt_payload_topic: bool,
    /// Show `<prefix><reason>` on failure instead of the fixed message.
    failure_prefix: Option<&'static str>,
}

impl Plan {
    fn new(op: Operation) -> Self {
        Self {
            op,
            starting: None,
            requires_graph: true,
            augment: AugmentUpdate::Keep,
            adopt_payload_topic: false,
            failure_prefix: None,
        }
    }

    fn starting(mut self, text: &'static str) -> Self {
        self.starting = Some(text);
        self
    }

    fn augment(mut self, update: AugmentUpdate) -> Self {
        self.augment = update;
        self
    }

    fn graph_optional(mut self) -> Self {
        self.requires_graph = false;
        self
    }

    fn adopt_payload_topic(mut self) -> Self {
        self.adopt_payload_topic = true;
        self
    }

    fn failure_prefix(mut self, prefix: &'static str) -> Self {
        self.failure_prefix = Some(prefix);
        self
    }

    fn mode(&self) -> ParseMode {
        if self.op.is_strict() {
            ParseMode::Strict
        } else {
            ParseMode::Tolerant
        }
    }
}

struct Inner<B, V> {
    backend: B,
    view: Arc<V>,
    config: ClientConfig,
    app: Mutex<AppState>,
}

impl<B, V> Inner<B, V> {
    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.app.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<B, V: View> Inner<B, V> {
    fn transition(&self, app: &mut AppState, next: GenerationState) {
        if !app.state.can_transition_to(next) {
            warn!(from = %app.state, to = %next, "Unexpected state transition");
        }
        debug!(from = %app.state, to = %next, "State transition");
        app.state = next;
        self.view.state_changed(next);
    }

    /// Cancel the active session, if any, without touching the info text.
    /// The superseded session's `finish` is a no-op, so its controls are
    /// reset here.
    fn supersede(&self, app: &mut AppState) {
        if let Some(previous) = app.session.take() {
            previous.cancel();
            app.ticker.stop();
            info!(session = previous.id(), operation = %previous.operation(), "Session superseded");
            self.transition(app, GenerationState::Aborted);
            self.hide_progress();
            self.view.set_like_enabled(true);
            self.view.set_generate_label(text::GENERATE_LABEL);
            self.view.set_network_loading(false);
            self.transition(app, GenerationState::Idle);
        }
    }

    fn tear_down_graph(&self, app: &mut AppState) {
        app.network = None;
        app.graph_id = None;
        self.view.clear_graph();
        self.view.show_feedback(false);
        self.view.show_download(false);
        self.view.show_graph_id(None);
        self.view.show_search(true);
    }

    fn hide_progress(&self) {
        self.view.show_progress(false);
        self.view.set_progress(0.0);
    }
}

/// Drives sessions against a [`GraphBackend`] and reflects them on a [`View`].
pub struct Controller<B, V> {
    inner: Arc<Inner<B, V>>,
}

impl<B, V> Clone for Controller<B, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Human-readable cause of `err` for prefixed messages.
fn reason(err: &TermsError) -> String {
    match err {
        TermsError::ServerReported(message) => message.clone(),
        other => other.to_string(),
    }
}

impl<B, V> Controller<B, V>
where
    B: GraphBackend + 'static,
    V: View,
{
    pub fn new(backend: B, view: Arc<V>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                view,
                config,
                app: Mutex::new(AppState::default()),
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn view(&self) -> &Arc<V> {
        &self.inner.view
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // -- inputs ------------------------------------------------------------

    pub fn set_topic(&self, topic: impl Into<String>) {
        self.inner.lock().topic = topic.into();
    }

    pub fn topic(&self) -> String {
        self.inner.lock().topic.clone()
    }

    pub fn set_count(&self, count: u32) -> ConceptCount {
        let mut app = self.inner.lock();
        app.count = ConceptCount::new(count);
        app.count
    }

    pub fn increment_count(&self) -> ConceptCount {
        let mut app = self.inner.lock();
        app.count = app.count.increment();
        app.count
    }

    pub fn decrement_count(&self) -> ConceptCount {
        let mut app = self.inner.lock();
        app.count = app.count.decrement();
        app.count
    }

    pub fn count(&self) -> ConceptCount {
        self.inner.lock().count
    }

    // -- observed state ----------------------------------------------------

    pub fn state(&self) -> GenerationState {
        self.inner.lock().state
    }

    pub fn is_generating(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    pub fn graph_id(&self) -> Option<GraphId> {
        self.inner.lock().graph_id.clone()
    }

    pub fn network(&self) -> Option<NetworkData> {
        self.inner.lock().network.clone()
    }

    pub fn augment(&self) -> Option<AugmentContext> {
        self.inner.lock().augment.clone()
    }

    pub fn last_generated(&self) -> Option<(String, u32)> {
        self.inner.lock().last_generated.clone()
    }

    // -- operations --------------------------------------------------------

    /// The main button: abort while generating, otherwise generate or
    /// regenerate depending on whether the inputs changed.
    pub async fn click_generate(&self) -> GenerationState {
        let regenerate = {
            let mut app = self.inner.lock();
            if app.session.is_some() {
                drop(app);
                self.abort();
                return GenerationState::Aborted;
            }
            let topic = app.topic.trim().to_string();
            if topic.is_empty() {
                self.inner.view.alert(text::EMPTY_TOPIC);
                return GenerationState::Idle;
            }
            let pair = (topic, app.count.get());
            if app.last_generated.as_ref() == Some(&pair) {
                Some(app.augment.is_some())
            } else {
                app.augment = None;
                None
            }
        };

        match regenerate {
            Some(true) => self.regenerate().await,
            Some(false) | None => self.generate().await,
        }
    }

    /// Fresh generation from the current topic and count.
    pub async fn generate(&self) -> GenerationState {
        let (topic, count) = {
            let mut app = self.inner.lock();
            let topic = app.topic.trim().to_string();
            if topic.is_empty() {
                self.inner.view.alert(text::EMPTY_TOPIC);
                return GenerationState::Idle;
            }
            self.inner.supersede(&mut app);
            (topic, app.count.get())
        };

        if !self.passes_filter(&topic, false).await {
            return GenerationState::Filtered;
        }

        self.inner.lock().last_generated = Some((topic.clone(), count));
        let plan = Plan::new(Operation::Generate)
            .starting(text::STARTING_GENERATE)
            .augment(AugmentUpdate::Clear);
        self.run(plan, Request::Generate(GenerateRequest { topic, count }))
            .await
    }

    /// Dislike: regenerate the displayed graph, replaying the add-concept
    /// request when the graph came from one.
    pub async fn regenerate(&self) -> GenerationState {
        let (topic, count, graph_id, augment) = {
            let mut app = self.inner.lock();
            self.inner.supersede(&mut app);
            let (topic, count) = match (&app.augment, &app.last_generated) {
                (Some(ctx), _) => (ctx.topic.clone(), ctx.count),
                (None, Some((topic, count))) => (topic.clone(), *count),
                (None, None) => (String::new(), 0),
            };
            (topic, count, app.graph_id.clone(), app.augment.clone())
        };

        if topic.is_empty() || count == 0 {
            return self.reject_input(Operation::Regenerate);
        }

        {
            let _app = self.inner.lock();
            self.inner.view.set_info(text::STARTING_REGENERATE);
            self.inner.view.show_progress(true);
            self.inner.view.set_progress(0.0);
        }
        if !self.passes_filter(&topic, true).await {
            return GenerationState::Filtered;
        }

        let request = FeedbackRequest {
            topic,
            count,
            graph_id,
            is_like: false,
            augment: augment.map(AugmentReplay::regenerate),
        };
        let plan = Plan::new(Operation::Regenerate).starting(text::STARTING_REGENERATE);
        self.run(plan, Request::Feedback(request)).await
    }

    /// Like: positive feedback on the displayed graph. The like control stays
    /// disabled afterwards.
    pub async fn like(&self) -> GenerationState {
        let (topic, count, graph_id) = {
            let app = self.inner.lock();
            (app.topic.trim().to_string(), app.count.get(), app.graph_id.clone())
        };
        if topic.is_empty() {
            return self.reject_input(Operation::Like);
        }

        let request = FeedbackRequest {
            topic,
            count,
            graph_id,
            is_like: true,
            augment: None,
        };
        self.run(Plan::new(Operation::Like).graph_optional(), Request::Feedback(request))
            .await
    }

    /// Merge `new_concept` into the displayed graph.
    pub async fn add_concept(&self, new_concept: &str) -> GenerationState {
        let new_concept = new_concept.trim().to_string();
        if new_concept.is_empty() {
            self.inner.view.alert(text::EMPTY_CONCEPT);
            return GenerationState::Idle;
        }

        let (context, base_graph_id) = {
            let app = self.inner.lock();
            let context = AugmentContext {
                topic: app.topic.trim().to_string(),
                count: app.count.get(),
                new_concept: new_concept.clone(),
                base_graph_id: app.graph_id.clone(),
            };
            (context, app.graph_id.clone())
        };

        let plan = Plan::new(Operation::AddConcept)
            .starting(text::STARTING_ADD_CONCEPT)
            .augment(AugmentUpdate::Set(context));
        let request = AddConceptRequest {
            graph_id: base_graph_id,
            new_concept,
        };
        self.run(plan, Request::AddConcept(request)).await
    }

    /// Look up a saved graph by the id the user typed.
    pub async fn search_graph(&self, graph_id: &str) -> GenerationState {
        let Some(graph_id) = self.parse_graph_id(graph_id) else {
            return GenerationState::Idle;
        };
        let plan = Plan::new(Operation::Search)
            .starting(text::STARTING_SEARCH)
            .augment(AugmentUpdate::Clear)
            .adopt_payload_topic();
        self.run(plan, Request::Search(SearchRequest { graph_id }))
            .await
    }

    /// Startup load of a graph named on the command line.
    pub async fn load_graph_by_id(&self, graph_id: &str) -> GenerationState {
        let Some(graph_id) = self.parse_graph_id(graph_id) else {
            return GenerationState::Idle;
        };
        let plan = Plan::new(Operation::Search)
            .starting(text::LOADING_BY_ID)
            .augment(AugmentUpdate::Clear)
            .adopt_payload_topic()
            .failure_prefix(text::LOAD_BY_ID_FAILED);
        self.run(plan, Request::Search(SearchRequest { graph_id }))
            .await
    }

    /// Show the service's default graph. Returns whether it was rendered.
    pub async fn load_default_graph(&self) -> bool {
        let result = self.inner.backend.default_graph().await;
        let mut app = self.inner.lock();
        match result {
            Ok(payload) => {
                if app.session.is_some() {
                    debug!("Default graph arrived during a session, dropping it");
                    return false;
                }
                info!(graph_id = %payload.graph_id, nodes = payload.network_data.nodes.len(), "Default graph loaded");
                self.inner.view.render_graph(&payload.network_data);
                self.inner.view.show_graph_id(None);
                self.inner.view.show_feedback(false);
                self.inner.view.set_info(text::IDLE_HINT);
                app.graph_id = Some(payload.graph_id);
                app.network = Some(payload.network_data);
                true
            }
            Err(e) => {
                warn!(error = %e, "Default graph failed");
                self.inner
                    .view
                    .set_info(&format!("{}{}", text::DEFAULT_GRAPH_FAILED, reason(&e)));
                false
            }
        }
    }

    /// Fetch a stored graph for inspection without displaying it.
    pub async fn get_graph(&self, graph_id: &str) -> Result<GraphPayload> {
        let trimmed = graph_id.trim();
        if trimmed.is_empty() {
            return Err(TermsError::EmptyInput("graph_id".into()));
        }
        self.inner.backend.get_graph(&GraphId::parse(trimmed)).await
    }

    /// User cancellation. Returns `false` when nothing was running.
    pub fn abort(&self) -> bool {
        let mut app = self.inner.lock();
        let Some(session) = app.session.take() else {
            return false;
        };
        session.cancel();
        app.ticker.stop();
        info!(session = session.id(), operation = %session.operation(), "Session aborted by user");

        let view = &self.inner.view;
        view.set_info(if session.operation() == Operation::Search {
            text::SEARCH_ABORTED
        } else {
            text::ABORTED
        });
        self.inner.hide_progress();
        view.set_like_enabled(true);
        view.show_graph_id(None);
        self.inner.transition(&mut app, GenerationState::Aborted);
        view.set_generate_label(text::GENERATE_LABEL);
        view.set_network_loading(false);
        self.inner.transition(&mut app, GenerationState::Idle);
        true
    }

    /// Inspect a node, or clear the selection with `None`. Returns the ids
    /// to highlight.
    pub fn select_node(&self, node_id: Option<&str>) -> BTreeSet<String> {
        let app = self.inner.lock();
        let view = &self.inner.view;
        let selected = node_id.and_then(|id| {
            app.network
                .as_ref()
                .and_then(|net| net.node(id).map(|node| (node, net.neighbors(id))))
        });

        match selected {
            Some((node, neighbors)) => {
                let shown = node
                    .explanation
                    .as_deref()
                    .or(node.label.as_deref())
                    .unwrap_or(node.id.as_str());
                view.set_info(shown);
                view.highlight(&neighbors);
                neighbors
            }
            None => {
                if app.session.is_none() {
                    view.set_info(text::IDLE_HINT);
                }
                let none = BTreeSet::new();
                view.highlight(&none);
                none
            }
        }
    }

    // -- session machinery -------------------------------------------------

    fn parse_graph_id(&self, input: &str) -> Option<GraphId> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            self.inner.view.alert(text::EMPTY_GRAPH_ID);
            return None;
        }
        Some(GraphId::parse(trimmed))
    }

    fn reject_input(&self, op: Operation) -> GenerationState {
        let err = TermsError::EmptyInput("topic or count".into());
        warn!(operation = %op, error = %err, "Rejected input");
        let _app = self.inner.lock();
        self.inner.view.set_info(text::failure_message(op, &err));
        self.inner.hide_progress();
        GenerationState::Failed
    }

    /// Pre-flight moderation check. A failed check lets the request through.
    async fn passes_filter(&self, topic: &str, tear_down: bool) -> bool {
        match self.inner.backend.check_filter(topic).await {
            Ok(false) => true,
            Ok(true) => {
                info!(topic = %topic, "Topic rejected by filter");
                let mut app = self.inner.lock();
                self.inner.view.alert(text::FILTERED);
                if tear_down {
                    self.inner.tear_down_graph(&mut app);
                }
                self.inner.hide_progress();
                self.inner.view.set_info(text::FILTERED);
                false
            }
            Err(e) => {
                warn!(error = %e, "Filter check failed, continuing");
                true
            }
        }
    }

    async fn run(&self, plan: Plan, request: Request) -> GenerationState {
        let session = self.begin(&plan);
        let token = session.token().clone();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(TermsError::Aborted),
            result = self.exchange(&session, &plan, request) => result,
        };
        self.finish(&session, &plan, result)
    }

    fn begin(&self, plan: &Plan) -> Arc<Session> {
        let inner = &self.inner;
        let mut app = inner.lock();
        inner.supersede(&mut app);
        app.ticker.stop();
        if let Some(reset) = app.reset.take() {
            reset.abort();
        }
        app.completed_session = None;

        app.next_session_id += 1;
        let session = Arc::new(Session::new(app.next_session_id, plan.op));
        app.session = Some(Arc::clone(&session));
        inner.transition(&mut app, GenerationState::Generating(plan.op));

        let view = &inner.view;
        if plan.op == Operation::Like {
            view.set_like_enabled(false);
        } else {
            view.set_generate_label(text::GENERATING_LABEL);
            view.set_network_loading(true);
        }
        if let Some(starting) = plan.starting {
            view.set_info(starting);
            view.show_progress(true);
            view.set_progress(0.0);
        }
        info!(session = session.id(), operation = %plan.op, "Session started");
        session
    }

    async fn exchange(&self, session: &Arc<Session>, plan: &Plan, request: Request) -> Result<()> {
        let backend = &self.inner.backend;
        let body = match &request {
            Request::Generate(r) => backend.generate(r).await?,
            Request::Feedback(r) => backend.feedback(r).await?,
            Request::AddConcept(r) => backend.add_concept(r).await?,
            Request::Search(r) => backend.search_graph(r).await?,
        };

        let mut events = interpretations(body, plan.mode(), session.token().clone());
        while let Some(item) = events.next().await {
            match item? {
                Interpretation::Progress { progress, message } => {
                    self.on_progress(session, progress, message.as_deref());
                }
                Interpretation::Complete {
                    progress,
                    message,
                    payload,
                } => {
                    self.on_progress(session, progress, message.as_deref());
                    self.on_complete(session, plan, *payload);
                    return Ok(());
                }
                Interpretation::Skipped => {}
            }
        }

        if plan.requires_graph {
            Err(TermsError::InvalidResponse(text::NO_GRAPH_DATA.into()))
        } else {
            Ok(())
        }
    }

    fn on_progress(&self, session: &Arc<Session>, progress: Option<f64>, message: Option<&str>) {
        let mut app = self.inner.lock();
        if !app.is_current(session) {
            return;
        }
        if let Some(percent) = progress {
            self.inner.view.set_progress(percent);
        }
        let Some(message) = message.filter(|m| !m.is_empty()) else {
            return;
        };

        let weak: Weak<Inner<B, V>> = Arc::downgrade(&self.inner);
        let owner = Arc::clone(session);
        let write = move |frame: &str, generation: u64| {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let app = inner.lock();
            if !app.is_current(&owner) || app.ticker.generation() != generation {
                return false;
            }
            inner.view.set_info(frame);
            true
        };
        if app.ticker.update(message, self.inner.config.loading_tick, write) {
            self.inner.view.set_info(message);
        }
    }

    fn on_complete(&self, session: &Arc<Session>, plan: &Plan, payload: GraphPayload) {
        let mut app = self.inner.lock();
        if !app.is_current(session) {
            return;
        }
        app.ticker.stop();

        let view = &self.inner.view;
        view.render_graph(&payload.network_data);
        view.show_graph_id(Some(&payload.graph_id));
        view.show_feedback(true);
        view.set_like_enabled(plan.op != Operation::Like);
        view.show_search(true);
        view.show_download(true);

        match &plan.augment {
            AugmentUpdate::Keep => {}
            AugmentUpdate::Clear => app.augment = None,
            AugmentUpdate::Set(context) => app.augment = Some(context.clone()),
        }
        if plan.adopt_payload_topic {
            if let Some(topic) = payload.topic.as_ref() {
                app.topic = topic.clone();
                if let Some(count) = payload.concept_count {
                    app.count = ConceptCount::new(count);
                }
                app.last_generated = Some((topic.clone(), app.count.get()));
            }
        }

        info!(
            session = session.id(),
            graph_id = %payload.graph_id,
            nodes = payload.network_data.nodes.len(),
            edges = payload.network_data.edges.len(),
            "Graph received"
        );
        app.graph_id = Some(payload.graph_id);
        app.network = Some(payload.network_data);
    }

    fn finish(&self, session: &Arc<Session>, plan: &Plan, result: Result<()>) -> GenerationState {
        let inner = &self.inner;
        let mut app = inner.lock();
        let current = app.session.as_ref().is_some_and(|s| s.id() == session.id());
        if !current {
            // Aborted by the user or replaced by a newer session; either
            // already updated the view.
            debug!(session = session.id(), "Finished session was no longer current");
            return GenerationState::Aborted;
        }
        app.session = None;
        session.terminate();
        app.ticker.stop();

        let terminal = match &result {
            Ok(()) => GenerationState::Completed,
            Err(e) => GenerationState::from_error(e),
        };
        inner.transition(&mut app, terminal);

        let view = &inner.view;
        match result {
            Ok(()) => {
                info!(session = session.id(), operation = %plan.op, "Session completed");
                self.schedule_reset(&mut app, session.id());
            }
            Err(TermsError::ContentFiltered) => {
                info!(session = session.id(), operation = %plan.op, "Session filtered");
                inner.tear_down_graph(&mut app);
                inner.hide_progress();
                view.set_info(text::FILTERED);
            }
            Err(e) => {
                if e.is_abort() {
                    info!(session = session.id(), "Session aborted");
                    view.show_graph_id(None);
                } else {
                    warn!(session = session.id(), operation = %plan.op, error = %e, "Session failed");
                }
                inner.hide_progress();
                match plan.failure_prefix {
                    Some(prefix) if !e.is_abort() => {
                        view.set_info(&format!("{prefix}{}", reason(&e)));
                    }
                    _ => view.set_info(text::failure_message(plan.op, &e)),
                }
                if matches!(plan.op, Operation::Regenerate | Operation::Like) {
                    view.show_download(false);
                }
            }
        }

        if plan.op != Operation::Like {
            view.set_like_enabled(terminal != GenerationState::Filtered);
        }
        view.set_generate_label(text::GENERATE_LABEL);
        view.set_network_loading(false);
        inner.transition(&mut app, GenerationState::Idle);
        terminal
    }

    /// Clear progress shortly after a completion, unless another session has
    /// started in the meantime.
    fn schedule_reset(&self, app: &mut AppState, id: SessionId) {
        if let Some(previous) = app.reset.take() {
            previous.abort();
        }
        app.completed_session = Some(id);
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.config.reset_delay;
        app.reset = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let app = inner.lock();
            if app.session.is_none() && app.completed_session == Some(id) {
                inner.hide_progress();
                inner.view.set_info(text::IDLE_HINT);
            }
        }));
    }
}
