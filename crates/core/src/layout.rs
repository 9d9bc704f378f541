use serde::Serialize;
use taffy::prelude::*;
use taffy::TaffyTree;

/// Text alignment within a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Layout configuration for a single column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnLayout {
    pub width: f32,
    pub flex_grow: f32,
    pub flex_shrink: f32,
    pub min_width: Option<f32>,
    pub max_width: Option<f32>,
    pub align: Align,
}

/// Viewport dimensions and scroll state.
#[derive(Debug, Clone, Serialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub row_height: f32,
    pub header_height: f32,
    pub scroll_top: f32,
}

/// Computed layout for a single cell.
#[derive(Debug, Clone, Serialize)]
pub struct CellLayout {
    pub row: usize,
    pub col: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub content_align: Align,
}

/// Flexbox-based layout engine powered by Taffy.
pub struct LayoutEngine {
    pub(crate) tree: TaffyTree<()>,
}

impl LayoutEngine {
    /// Create a new `LayoutEngine` with an empty Taffy tree.
    pub fn new() -> Self {
        Self {
            tree: TaffyTree::new(),
        }
    }

    /// Build a Taffy style for a column child node.
    fn column_style(col: &ColumnLayout, height: f32) -> Style {
        Style {
            size: Size {
                width: if col.width > 0.0 {
                    Dimension::length(col.width)
                } else {
                    Dimension::auto()
                },
                height: Dimension::length(height),
            },
            flex_grow: col.flex_grow,
            flex_shrink: col.flex_shrink,
            min_size: Size {
                width: col.min_width.map_or(Dimension::auto(), Dimension::length),
                height: Dimension::auto(),
            },
            max_size: Size {
                width: col.max_width.map_or(Dimension::auto(), Dimension::length),
                height: Dimension::auto(),
            },
            ..Style::default()
        }
    }

    /// Compute x/width for each column using Taffy flexbox, returning (x, width) pairs.
    fn compute_column_positions(
        &mut self,
        columns: &[ColumnLayout],
        viewport_width: f32,
        row_height: f32,
    ) -> Vec<(f32, f32)> {
        let root = self
            .tree
            .new_leaf(Style {
                display: Display::Flex,
                flex_direction: FlexDirection::Row,
                size: Size {
                    width: Dimension::length(viewport_width),
                    height: Dimension::length(row_height),
                },
                ..Style::default()
            })
            .expect("failed to create root node");

        let children: Vec<_> = columns
            .iter()
            .map(|col| {
                self.tree
                    .new_leaf(Self::column_style(col, row_height))
                    .expect("failed to create child node")
            })
            .collect();

        self.tree
            .set_children(root, &children)
            .expect("failed to set children");

        self.tree
            .compute_layout(
                root,
                Size {
                    width: AvailableSpace::Definite(viewport_width),
                    height: AvailableSpace::Definite(row_height),
                },
            )
            .expect("failed to compute layout");

        let positions: Vec<(f32, f32)> = children
            .iter()
            .map(|&child| {
                let layout = self.tree.layout(child).expect("failed to get layout");
                (layout.location.x, layout.size.width)
            })
            .collect();

        self.tree.clear();

        positions
    }

    /// Compute header cell layouts for the given columns and viewport.
    pub fn compute_header_layout(
        &mut self,
        columns: &[ColumnLayout],
        viewport: &Viewport,
    ) -> Vec<CellLayout> {
        let positions =
            self.compute_column_positions(columns, viewport.width, viewport.header_height);

        positions
            .into_iter()
            .enumerate()
            .map(|(col_idx, (x, width))| CellLayout {
                row: 0,
                col: col_idx,
                x,
                y: 0.0,
                width,
                height: viewport.header_height,
                content_align: columns
                    .get(col_idx)
                    .map_or_else(Align::default, |c| c.align),
            })
            .collect()
    }

    /// Compute row cell layouts for visible rows.
    pub fn compute_rows_layout(
        &mut self,
        columns: &[ColumnLayout],
        viewport: &Viewport,
        visible_range: std::ops::Range<usize>,
    ) -> Vec<CellLayout> {
        if visible_range.is_empty() || columns.is_empty() {
            return Vec::new();
        }

        // Compute column positions once — all rows share the same x/width
        let positions = self.compute_column_positions(columns, viewport.width, viewport.row_height);

        let mut result =
            Vec::with_capacity((visible_range.end - visible_range.start) * columns.len());

        for row_idx in visible_range {
            // Position relative to the canvas viewport: absolute position minus scroll offset.
            let y = (row_idx as f32).mul_add(viewport.row_height, viewport.header_height)
                - viewport.scroll_top;
            for (col_idx, &(x, width)) in positions.iter().enumerate() {
                result.push(CellLayout {
                    row: row_idx,
                    col: col_idx,
                    x,
                    y,
                    width,
                    height: viewport.row_height,
                    content_align: columns
                        .get(col_idx)
                        .map_or_else(Align::default, |c| c.align),
                });
            }
        }

        result
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}
