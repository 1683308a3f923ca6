use flowtree_core::config::LayoutConfig;
use flowtree_core::types::{Node, Position};

pub const DEFAULT_SPACING: f64 = 200.0;
pub const DEFAULT_ROW_GAP: f64 = 150.0;
pub const ROOT_ANCHOR: Position = Position { x: 400.0, y: 50.0 };

/// Places sibling rows under a parent. Holds only constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEngine {
    pub spacing: f64,
    pub row_gap: f64,
    pub root_anchor: Position,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_SPACING,
            row_gap: DEFAULT_ROW_GAP,
            root_anchor: ROOT_ANCHOR,
        }
    }
}

impl From<&LayoutConfig> for LayoutEngine {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            spacing: config.spacing,
            row_gap: config.row_gap,
            root_anchor: config.root_anchor(),
        }
    }
}

impl LayoutEngine {
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    /// Fixed position of the first node.
    pub fn root_position(&self) -> Position {
        self.root_anchor
    }

    /// Positions for the whole sibling row after adding `new_count` children.
    ///
    /// The result has one entry per existing child (same order) followed by
    /// one entry per new child. The row is evenly spaced and centered on
    /// `parent.x`. Existing children keep their `y`; new children sit
    /// `row_gap` below the parent.
    pub fn layout_children(
        &self,
        parent: &Node,
        existing_children: &[&Node],
        new_count: usize,
    ) -> Vec<Position> {
        let total = existing_children.len() + new_count;
        if total == 0 {
            return Vec::new();
        }

        let start_x = parent.position.x - (total - 1) as f64 * self.spacing / 2.0;
        let new_y = parent.position.y + self.row_gap;

        (0..total)
            .map(|i| {
                let x = start_x + i as f64 * self.spacing;
                let y = existing_children
                    .get(i)
                    .map(|child| child.position.y)
                    .unwrap_or(new_y);
                Position::new(x, y)
            })
            .collect()
    }
}

/// [`LayoutEngine::layout_children`] with the default row gap.
pub fn layout_children(
    parent: &Node,
    existing_children: &[&Node],
    new_count: usize,
    spacing: f64,
) -> Vec<Position> {
    LayoutEngine::default()
        .with_spacing(spacing)
        .layout_children(parent, existing_children, new_count)
}
