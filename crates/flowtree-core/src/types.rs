use serde::{Deserialize, Serialize};

/// Node identifier: a numeric string assigned in strictly increasing order.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn from_number(n: u64) -> Self {
        Self(n.to_string())
    }

    /// Numeric value of the id, if it parses as one.
    pub fn number(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Edge identifier, always `e<source>-<target>`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub fn between(source: &NodeId, target: &NodeId) -> Self {
        Self(format!("e{}-{}", source, target))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EdgeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Structural role of a node. Derived by the store, never set by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Branch,
    Leaf,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Root => write!(f, "root"),
            NodeKind::Branch => write!(f, "branch"),
            NodeKind::Leaf => write!(f, "leaf"),
        }
    }
}

/// Outcome category a node was derived from. Rendering hint only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Negative,
    Mixed,
}

/// A node as stored. Also reads the canvas format, where the label sits
/// under `data.label`, the role is `type: input|default|output` and the tone
/// is only visible in the border colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NodeRecord")]
pub struct Node {
    pub id: NodeId,
    pub position: Position,
    pub label: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
}

#[derive(Deserialize)]
struct NodeRecord {
    id: NodeId,
    position: Position,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    kind: Option<NodeKind>,
    #[serde(default)]
    tone: Option<Tone>,
    #[serde(default)]
    data: Option<CanvasData>,
    #[serde(default, rename = "type")]
    canvas_type: Option<String>,
    #[serde(default)]
    style: Option<CanvasStyle>,
}

#[derive(Deserialize)]
struct CanvasData {
    label: Option<String>,
}

#[derive(Deserialize)]
struct CanvasStyle {
    #[serde(default, rename = "borderColor")]
    border_color: Option<String>,
}

fn kind_from_canvas_type(canvas_type: &str) -> Option<NodeKind> {
    match canvas_type {
        "input" => Some(NodeKind::Root),
        "default" => Some(NodeKind::Branch),
        "output" => Some(NodeKind::Leaf),
        _ => None,
    }
}

fn tone_from_border(color: &str) -> Option<Tone> {
    match color.to_ascii_lowercase().as_str() {
        "#22c55e" => Some(Tone::Positive),
        "#ef4444" => Some(Tone::Negative),
        "#eab308" => Some(Tone::Mixed),
        _ => None,
    }
}

impl TryFrom<NodeRecord> for Node {
    type Error = String;

    fn try_from(record: NodeRecord) -> std::result::Result<Self, Self::Error> {
        let label = record
            .label
            .or_else(|| record.data.and_then(|d| d.label))
            .ok_or_else(|| format!("node {} has no label", record.id))?;
        let kind = match (record.kind, record.canvas_type.as_deref()) {
            (Some(kind), _) => kind,
            (None, Some(t)) => kind_from_canvas_type(t)
                .ok_or_else(|| format!("node {} has unknown type {:?}", record.id, t))?,
            (None, None) => return Err(format!("node {} has no kind", record.id)),
        };
        let tone = record.tone.or_else(|| {
            record
                .style
                .and_then(|s| s.border_color)
                .and_then(|c| tone_from_border(&c))
        });
        Ok(Node {
            id: record.id,
            position: record.position,
            label,
            kind,
            tone,
        })
    }
}

impl Node {
    /// Label shortened to `max_chars` for display. The stored label is never
    /// truncated.
    pub fn display_label(&self, max_chars: usize) -> String {
        if self.label.chars().count() <= max_chars {
            return self.label.clone();
        }
        let keep = max_chars.saturating_sub(3);
        let mut out: String = self.label.chars().take(keep).collect();
        out.push_str("...");
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, alias = "animated")]
    pub emphasized: bool,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, emphasized: bool) -> Self {
        Self {
            id: EdgeId::between(&source, &target),
            source,
            target,
            emphasized,
        }
    }
}

/// The full graph: unit of persistence and of hydration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    /// Direct children of `parent`, in creation order.
    pub fn children_of(&self, parent: &NodeId) -> Vec<&Node> {
        self.edges
            .iter()
            .filter(|e| &e.source == parent)
            .filter_map(|e| self.node(&e.target))
            .collect()
    }

    /// Nodes with no incoming edge.
    pub fn roots(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| !self.edges.iter().any(|e| e.target == n.id))
            .collect()
    }

    /// Highest numeric node id, 0 for an empty graph.
    pub fn max_numeric_id(&self) -> u64 {
        self.nodes
            .iter()
            .filter_map(|n| n.id.number())
            .max()
            .unwrap_or(0)
    }
}

/// Caller-supplied content for a node the store will create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDraft {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
}

impl NodeDraft {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tone: None,
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeStyle {
    pub emphasized: bool,
}

/// A node draft paired with the style of the edge that will attach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildDraft {
    pub node: NodeDraft,
    pub edge: EdgeStyle,
}

impl ChildDraft {
    pub fn new(label: impl Into<String>, emphasized: bool) -> Self {
        Self {
            node: NodeDraft::new(label),
            edge: EdgeStyle { emphasized },
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.node.tone = Some(tone);
        self
    }
}

/// Categorized outcome prediction. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeAnalysis {
    #[serde(default, rename = "analysis_summary")]
    pub summary: String,
    #[serde(default, rename = "positive_outcomes")]
    pub positive: Vec<String>,
    #[serde(default, rename = "negative_outcomes")]
    pub negative: Vec<String>,
    #[serde(default, rename = "neutral_mixed_outcomes")]
    pub mixed: Vec<String>,
    #[serde(default, rename = "key_considerations")]
    pub considerations: Vec<String>,
    #[serde(default, rename = "recommendations")]
    pub recommendation: String,
}

impl OutcomeAnalysis {
    /// True when none of the three outcome categories has an entry.
    pub fn has_no_outcomes(&self) -> bool {
        self.positive.is_empty() && self.negative.is_empty() && self.mixed.is_empty()
    }

    /// Child drafts in positive, negative, mixed order. Only positive
    /// outcomes get an emphasized edge.
    pub fn child_drafts(&self) -> Vec<ChildDraft> {
        let positive = self
            .positive
            .iter()
            .map(|o| ChildDraft::new(o.clone(), true).with_tone(Tone::Positive));
        let negative = self
            .negative
            .iter()
            .map(|o| ChildDraft::new(o.clone(), false).with_tone(Tone::Negative));
        let mixed = self
            .mixed
            .iter()
            .map(|o| ChildDraft::new(o.clone(), false).with_tone(Tone::Mixed));
        positive.chain(negative).chain(mixed).collect()
    }
}

/// Input to an outcome prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<String>,
}

impl OutcomeRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            decision: None,
        }
    }
}

/// Workflow phase. Each modal of a front-end is a projection of this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    AwaitingScenario { loading: bool },
    AwaitingAnswer { index: usize, loading: bool },
    Predicting,
    ShowingOutcome,
}

impl Phase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    /// Whether a gateway request is outstanding.
    pub fn is_loading(&self) -> bool {
        match self {
            Phase::AwaitingScenario { loading } | Phase::AwaitingAnswer { loading, .. } => *loading,
            Phase::Predicting => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::AwaitingScenario { .. } => write!(f, "awaiting scenario"),
            Phase::AwaitingAnswer { index, .. } => write!(f, "awaiting answer {}", index + 1),
            Phase::Predicting => write!(f, "predicting"),
            Phase::ShowingOutcome => write!(f, "showing outcome"),
        }
    }
}

/// Events published on the [`EventBus`](crate::event::EventBus).
#[derive(Debug, Clone)]
pub enum FlowEvent {
    /// The in-memory graph changed.
    SnapshotUpdated(GraphSnapshot),
    /// A queued save was written.
    Saved { nodes: usize, edges: usize },
    /// A queued save failed. The in-memory graph is unaffected.
    SaveFailed { error: String },
    /// The user selected an edge on the canvas.
    EdgeSelected(EdgeId),
    /// The workflow moved to a new phase.
    PhaseChanged(Phase),
}
