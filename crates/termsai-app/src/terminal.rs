use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Mutex;

use termsai_core::types::{GraphId, NetworkData};

use crate::state::GenerationState;
use crate::view::View;

/// Line-oriented view on stdout.
///
/// Only changes are printed; repeated toggles of the same control are
/// swallowed.
#[derive(Debug, Default)]
pub struct TerminalView {
    last_info: Mutex<Option<String>>,
    last_progress: Mutex<Option<u32>>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(&self) {
        print!("> ");
        let _ = std::io::stdout().flush();
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Summary lines for a rendered graph.
pub fn describe_graph(data: &NetworkData) -> Vec<String> {
    let mut lines = vec![format!(
        "graph: {} nodes, {} edges",
        data.nodes.len(),
        data.edges.len()
    )];
    for node in &data.nodes {
        lines.push(format!(
            "  [{}] {}",
            node.id,
            node.label.as_deref().unwrap_or(node.id.as_str())
        ));
    }
    for edge in &data.edges {
        match edge.label.as_deref() {
            Some(label) => lines.push(format!("  {} -[{}]-> {}", edge.from, label, edge.to)),
            None => lines.push(format!("  {} --> {}", edge.from, edge.to)),
        }
    }
    lines
}

impl View for TerminalView {
    fn state_changed(&self, state: GenerationState) {
        tracing::debug!(%state, "view state");
    }

    fn set_info(&self, text: &str) {
        let mut last = lock(&self.last_info);
        if last.as_deref() == Some(text) {
            return;
        }
        *last = Some(text.to_string());
        println!("{text}");
    }

    fn set_progress(&self, percent: f64) {
        let rounded = percent.clamp(0.0, 100.0).round() as u32;
        let mut last = lock(&self.last_progress);
        if *last == Some(rounded) {
            return;
        }
        *last = Some(rounded);
        if rounded > 0 {
            println!("[{rounded:>3}%]");
        }
    }

    fn show_progress(&self, visible: bool) {
        if !visible {
            *lock(&self.last_progress) = None;
        }
    }

    fn render_graph(&self, data: &NetworkData) {
        for line in describe_graph(data) {
            println!("{line}");
        }
    }

    fn clear_graph(&self) {
        println!("(graph cleared)");
    }

    fn show_graph_id(&self, id: Option<&GraphId>) {
        if let Some(id) = id {
            println!("图谱编号: {id}");
        }
    }

    fn show_feedback(&self, _visible: bool) {}

    fn set_like_enabled(&self, _enabled: bool) {}

    fn show_search(&self, _visible: bool) {}

    fn show_download(&self, _visible: bool) {}

    fn set_generate_label(&self, _label: &str) {}

    fn set_network_loading(&self, _visible: bool) {}

    fn highlight(&self, ids: &BTreeSet<String>) {
        if !ids.is_empty() {
            let joined: Vec<&str> = ids.iter().map(String::as_str).collect();
            println!("connected: {}", joined.join(", "));
        }
    }

    fn alert(&self, text: &str) {
        println!("!! {text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termsai_core::types::{Edge, Node};

    fn node(id: &str, label: Option<&str>) -> Node {
        Node {
            id: id.into(),
            label: label.map(Into::into),
            color: None,
            explanation: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn describe_lists_nodes_and_edges() {
        let data = NetworkData {
            nodes: vec![node("1", Some("刘备")), node("2", None)],
            edges: vec![Edge {
                from: "1".into(),
                to: "2".into(),
                label: Some("结义".into()),
                extra: Default::default(),
            }],
            extra: Default::default(),
        };
        let lines = describe_graph(&data);
        assert_eq!(lines[0], "graph: 2 nodes, 1 edges");
        assert_eq!(lines[1], "  [1] 刘备");
        assert_eq!(lines[2], "  [2] 2");
        assert_eq!(lines[3], "  1 -[结义]-> 2");
    }
}
