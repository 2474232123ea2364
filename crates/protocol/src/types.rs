use serde::{Deserialize, Serialize};

/// Directed edge between two screens of the navigation graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Snapshot of the app's navigation graph.
///
/// `screens` holds unique names in first-discovery order. `edges` is only
/// present when the caller supplies an explicit, non-linear graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigatorSnapshot {
    pub screens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<Edge>>,
}

impl NavigatorSnapshot {
    /// Creates a snapshot without explicit edges.
    pub fn new(screens: Vec<String>) -> Self {
        Self {
            screens,
            edges: None,
        }
    }

    /// Attaches explicit edges to the snapshot.
    pub fn with_edges(mut self, edges: Vec<Edge>) -> Self {
        self.edges = Some(edges);
        self
    }
}
