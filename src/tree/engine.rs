//! TreeEngine - owned viewer state.
//!
//! The engine owns the validated topology, its metadata, and SoA (Structure of
//! Arrays) buffers for positions, angles, colors and render state, all indexed
//! by node slot. Every mutation (layout, collapse, recolor, selection) updates
//! per-node state and then rebuilds the derived vertex buffers in one place,
//! [`TreeEngine::rebuild_derived_buffers`].

use std::collections::HashMap;

use petgraph::stable_graph::NodeIndex;
use serde::Serialize;

use super::model::{ChildOrder, PhyloTree};
use super::newick::to_newick;
use super::node::NodeState;
use crate::collapse::{apply_visibility, build_triangles, triangle_buffer, CladeTriangle, CollapseState};
use crate::config::ViewConfig;
use crate::error::{ColorError, EngineError, TreeError, UploadError};
use crate::layout::{CladeGeometry, RadialLayout};
use crate::metadata::{parse_upload, AttributeKind, Metadata, UploadReport, Value};
use crate::picking::{self, ScreenProjection};
use crate::query::{self, Comparison, NodeLabel, Window};
use crate::render::arc::{arc_buffer, build_arcs};
use crate::render::buffer::{edge_buffer, marker_buffer};
use crate::render::color::apply_color_mode;
use crate::render::{CladeArc, ColorMode, Legend, LegendEntry, Rgb, FLOATS_PER_EDGE};
use crate::spatial::{NodePoint, SpatialIndex, TriangleIndex};

/// Snapshot of one node for tooltips and tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub id: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub length: f32,
    pub leafcount: u32,
    pub is_tip: bool,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub visible: bool,
    pub selected: bool,
    pub collapsed: bool,
    pub metadata: HashMap<String, Value>,
}

/// A collapsed clade under the cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriangleHit {
    pub clade_root: String,
    /// The clade's triangle in the highlight color, `3 x [x, y, r, g, b]`.
    pub vertices: Vec<f32>,
}

/// The tree viewer engine.
pub struct TreeEngine {
    config: ViewConfig,
    tree: PhyloTree,
    metadata: Metadata,

    /// X positions (SoA layout)
    pos_x: Vec<f32>,
    /// Y positions (SoA layout)
    pos_y: Vec<f32>,
    angles: Vec<f32>,
    clades: Vec<CladeGeometry>,
    colors: Vec<Rgb>,
    states: Vec<NodeState>,
    scale: f32,
    /// Last `(height, width)` passed to [`TreeEngine::layout`].
    viewport: Option<(f64, f64)>,

    collapse: CollapseState,
    collapse_roots: Vec<NodeIndex>,
    triangles: Vec<CladeTriangle>,
    hovered: Option<NodeIndex>,
    /// Rank whose clades are drawn as highlighted arcs.
    arc_rank: Option<String>,
    arcs: Vec<CladeArc>,
    arc_legend: Vec<LegendEntry>,
    /// Whether a subtree filter is active.
    filtered: bool,

    edge_buffer: Vec<f32>,
    triangle_buffer: Vec<f32>,
    arc_buffer: Vec<f32>,
    selection_buffer: Vec<f32>,
    marker_buffer: Vec<f32>,

    /// Visible node positions for tree-space picking.
    spatial: SpatialIndex,
    /// Whether positions or visibility changed since the last index rebuild.
    spatial_dirty: bool,
    triangle_index: TriangleIndex,
}

impl TreeEngine {
    /// Create an engine with every node at the origin. Call
    /// [`TreeEngine::layout`] before rendering.
    pub fn new(config: ViewConfig, tree: PhyloTree, metadata: Metadata) -> Self {
        let n = tree.node_bound();
        let mut engine = Self {
            colors: vec![config.default_color; n],
            config,
            tree,
            metadata,
            pos_x: vec![0.0; n],
            pos_y: vec![0.0; n],
            angles: vec![0.0; n],
            clades: vec![CladeGeometry::default(); n],
            states: vec![NodeState::new(); n],
            scale: 1.0,
            viewport: None,
            collapse: CollapseState::default(),
            collapse_roots: Vec::new(),
            triangles: Vec::new(),
            hovered: None,
            arc_rank: None,
            arcs: Vec::new(),
            arc_legend: Vec::new(),
            filtered: false,
            edge_buffer: Vec::new(),
            triangle_buffer: Vec::new(),
            arc_buffer: Vec::new(),
            selection_buffer: Vec::new(),
            marker_buffer: Vec::new(),
            spatial: SpatialIndex::new(),
            spatial_dirty: true,
            triangle_index: TriangleIndex::new(),
        };
        engine.rebuild_derived_buffers();
        engine
    }

    /// Build from the tree and (optional) metadata JSON payloads.
    pub fn from_json(
        config: ViewConfig,
        tree_json: &str,
        metadata_json: Option<&str>,
    ) -> Result<Self, EngineError> {
        let tree = PhyloTree::from_json(&config.root_id, tree_json)?;
        let metadata = match metadata_json {
            Some(json) => Metadata::from_json(&tree, json)?,
            None => Metadata::new(tree.node_bound()),
        };
        Ok(Self::new(config, tree, metadata))
    }

    fn slots(&self) -> impl Iterator<Item = NodeIndex> + use<> {
        (0..self.tree.node_bound()).map(NodeIndex::new)
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Lay the tree out for a `width` x `height` viewport and return the scale
    /// factor. Collapsed clades and selections survive a relayout.
    pub fn layout(&mut self, height: f64, width: f64) -> Result<f32, EngineError> {
        if !(height > 0.0 && width > 0.0 && height.is_finite() && width.is_finite()) {
            return Err(EngineError::InvalidViewport { height, width });
        }

        let result = RadialLayout::new(self.config.radial()).compute(&self.tree, height, width);
        self.pos_x = result.positions_x;
        self.pos_y = result.positions_y;
        self.angles = result.angles;
        self.clades = result.clades;
        self.scale = result.scale;
        self.viewport = Some((height, width));
        self.spatial_dirty = true;

        log::info!(
            "laid out {} nodes for {}x{} (scale {:.4})",
            self.tree.node_count(),
            width,
            height,
            self.scale
        );
        self.rebuild_derived_buffers();
        Ok(self.scale)
    }

    /// Re-sort children by clade size and lay out again for the last
    /// viewport, if any.
    pub fn order_children(&mut self, order: ChildOrder) -> Result<Option<f32>, EngineError> {
        self.tree.order_children(order);
        self.collapse_roots = self.collapse.roots(&self.tree, &self.metadata);
        match self.viewport {
            Some((height, width)) => self.layout(height, width).map(Some),
            None => {
                self.rebuild_derived_buffers();
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Collapse
    // =========================================================================

    /// Collapse every clade whose root has a value for `rank`, replacing any
    /// earlier collapse. Returns the new edge buffer.
    pub fn collapse(&mut self, rank: &str) -> &[f32] {
        self.collapse.set_rank(rank);
        self.refresh_collapse();
        log::debug!("collapsed {} clades at rank {}", self.triangles.len(), rank);
        &self.edge_buffer
    }

    /// Add a single clade to the collapsed set.
    pub fn collapse_clade(&mut self, id: &str) -> Result<&[f32], TreeError> {
        let root = self.tree.require(id)?;
        if self.collapse.add_clade(root) {
            self.refresh_collapse();
        }
        Ok(&self.edge_buffer)
    }

    /// Expand the clade whose triangle contains the tree-space point. Returns
    /// the id of the expanded clade root.
    pub fn uncollapse_clade_at(&mut self, x: f32, y: f32) -> Option<String> {
        let root = picking::triangle_at(
            &self.triangles,
            &self.triangle_index,
            f64::from(x),
            f64::from(y),
            self.config.triangle_tolerance,
        )?
        .root;
        self.collapse.remove_clade(root, &self.collapse_roots);
        self.refresh_collapse();
        Some(self.tree.name(root).to_string())
    }

    /// Expand everything. Returns the new edge buffer.
    pub fn uncollapse(&mut self) -> &[f32] {
        self.collapse.clear();
        self.refresh_collapse();
        &self.edge_buffer
    }

    /// Recompute visibility from the collapse state and rebuild buffers.
    fn refresh_collapse(&mut self) {
        self.collapse_roots = self.collapse.roots(&self.tree, &self.metadata);
        apply_visibility(&self.tree, &self.collapse_roots, &mut self.states);
        self.spatial_dirty = true;
        self.rebuild_derived_buffers();
    }

    // =========================================================================
    // Color
    // =========================================================================

    /// Recolor branches. Collapsed triangles pick up the new colors without a
    /// re-collapse. On error nothing changes.
    pub fn color_branches(&mut self, mode: &ColorMode) -> Result<Legend, ColorError> {
        let legend = apply_color_mode(
            mode,
            &self.tree,
            &self.metadata,
            &mut self.colors,
            self.config.default_color,
            &self.config.palette_attribute,
        )?;
        self.rebuild_derived_buffers();
        Ok(legend)
    }

    /// Draw a filled arc behind every outermost visible clade with a value
    /// for `rank`. The arcs follow later layouts, collapses and filters until
    /// cleared. Returns the group legend.
    pub fn highlight_clades(&mut self, rank: &str) -> Result<Legend, EngineError> {
        if self.metadata.kind(rank).is_none() {
            return Err(EngineError::UnknownAttribute(rank.to_string()));
        }
        self.arc_rank = Some(rank.to_string());
        self.rebuild_derived_buffers();
        log::debug!("highlighted {} clades at rank {}", self.arcs.len(), rank);
        Ok(Legend::Categorical {
            entries: self.arc_legend.clone(),
        })
    }

    /// Remove every highlighted clade arc.
    pub fn clear_clade_highlight(&mut self) {
        if self.arc_rank.take().is_some() {
            self.rebuild_derived_buffers();
        }
    }

    // =========================================================================
    // Buffers
    // =========================================================================

    /// Rebuild the edge, triangle, arc, selection and marker buffers (and the
    /// spatial indexes) from the current per-node state.
    pub fn rebuild_derived_buffers(&mut self) {
        let visible: Vec<NodeIndex> = self
            .slots()
            .filter(|n| self.states[n.index()].is_visible())
            .collect();

        self.edge_buffer = edge_buffer(
            &self.tree,
            &self.pos_x,
            &self.pos_y,
            visible.iter().map(|&n| (n, self.colors[n.index()])),
        );

        let selection_color = self.config.selection_color;
        self.selection_buffer = edge_buffer(
            &self.tree,
            &self.pos_x,
            &self.pos_y,
            visible
                .iter()
                .filter(|n| self.states[n.index()].is_selected())
                .map(|&n| (n, selection_color)),
        );

        let collapse_roots: Vec<NodeIndex> = self
            .collapse_roots
            .iter()
            .copied()
            .filter(|r| !self.states[r.index()].is_filtered_out())
            .collect();
        self.triangles = build_triangles(
            &collapse_roots,
            &self.pos_x,
            &self.pos_y,
            &self.clades,
            &self.colors,
        );
        self.triangle_buffer = triangle_buffer(&self.triangles);
        self.triangle_index.rebuild(&self.triangles);

        (self.arcs, self.arc_legend) = match &self.arc_rank {
            Some(rank) => build_arcs(
                &self.tree,
                &self.metadata,
                rank,
                &self.pos_x,
                &self.pos_y,
                &self.clades,
                &self.states,
            ),
            None => (Vec::new(), Vec::new()),
        };
        self.arc_buffer = arc_buffer(&self.arcs);

        self.rebuild_marker_buffer();

        if self.spatial_dirty {
            self.spatial.rebuild(
                visible
                    .iter()
                    .map(|&n| NodePoint::new(n, self.pos_x[n.index()], self.pos_y[n.index()])),
            );
            self.spatial_dirty = false;
        }
    }

    fn rebuild_marker_buffer(&mut self) {
        let highlight = self.config.highlight_color;
        let markers = self
            .slots()
            .filter(|n| self.states[n.index()].is_visible())
            .map(|n| {
                let state = self.states[n.index()];
                (n, if state.is_hovered() { highlight } else { self.colors[n.index()] })
            });
        self.marker_buffer = marker_buffer(&self.pos_x, &self.pos_y, markers);
    }

    /// Line buffer, `10 x f32` per visible node.
    pub fn edge_buffer(&self) -> &[f32] {
        &self.edge_buffer
    }

    /// Collapsed clades, `15 x f32` per triangle.
    pub fn triangle_buffer(&self) -> &[f32] {
        &self.triangle_buffer
    }

    /// Selected visible branches in the selection color.
    pub fn selection_buffer(&self) -> &[f32] {
        &self.selection_buffer
    }

    /// One `[x, y, r, g, b]` vertex per visible node, hovered node highlighted.
    pub fn marker_buffer(&self) -> &[f32] {
        &self.marker_buffer
    }

    /// Highlighted clades, `TRIANGLES_PER_ARC x 15 x f32` per arc.
    pub fn clade_arc_buffer(&self) -> &[f32] {
        &self.arc_buffer
    }

    /// Number of branches in the edge buffer.
    pub fn visible_count(&self) -> usize {
        self.edge_buffer.len() / FLOATS_PER_EDGE
    }

    /// Number of collapsed-clade triangles drawn.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of highlighted clade arcs drawn.
    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    // =========================================================================
    // Picking
    // =========================================================================

    /// Visible node under the cursor in canvas pixels, within the configured
    /// hover threshold.
    pub fn nearest_node_screen(
        &self,
        projection: &ScreenProjection,
        screen_x: f32,
        screen_y: f32,
    ) -> Option<&str> {
        let candidates = self
            .slots()
            .filter(|n| self.states[n.index()].is_visible())
            .map(|n| (n, self.pos_x[n.index()], self.pos_y[n.index()]));
        picking::nearest_node_screen(
            projection,
            screen_x,
            screen_y,
            self.config.hover_threshold_sq,
            candidates,
        )
        .map(|n| self.tree.name(n))
    }

    /// Visible node nearest a tree-space point, within `max_distance`.
    pub fn nearest_node(&self, x: f32, y: f32, max_distance: f32) -> Option<&str> {
        self.spatial
            .nearest_within(x, y, max_distance)
            .map(|n| self.tree.name(n))
    }

    /// Mark a single node as hovered (or none) and rebuild the marker buffer.
    pub fn set_hovered(&mut self, id: Option<&str>) -> Result<(), TreeError> {
        let next = id.map(|id| self.tree.require(id)).transpose()?;
        if next == self.hovered {
            return Ok(());
        }
        if let Some(previous) = self.hovered {
            self.states[previous.index()].set_hovered(false);
        }
        if let Some(node) = next {
            self.states[node.index()].set_hovered(true);
        }
        self.hovered = next;
        self.rebuild_marker_buffer();
        Ok(())
    }

    /// Id of the hovered node.
    pub fn hovered(&self) -> Option<&str> {
        self.hovered.map(|n| self.tree.name(n))
    }

    /// Collapsed clade containing the tree-space point; the earliest
    /// collapsed clade wins when triangles overlap.
    pub fn triangle_at(&self, x: f32, y: f32) -> Option<TriangleHit> {
        let triangle = picking::triangle_at(
            &self.triangles,
            &self.triangle_index,
            f64::from(x),
            f64::from(y),
            self.config.triangle_tolerance,
        )?;
        let mut vertices = Vec::with_capacity(crate::render::FLOATS_PER_TRIANGLE);
        triangle.write(&mut vertices, self.config.highlight_color);
        Some(TriangleHit {
            clade_root: self.tree.name(triangle.root).to_string(),
            vertices,
        })
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select the visible nodes inside a rectangle, replacing the previous
    /// selection. Returns the selection buffer.
    pub fn select_in_rect(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> &[f32] {
        let hits = self.spatial.in_rect(x1, y1, x2, y2);
        self.replace_selection(hits);
        &self.selection_buffer
    }

    /// Select every node whose value for `attribute` satisfies `comparison`.
    /// Returns the number of selected nodes.
    pub fn select_by_value(
        &mut self,
        attribute: &str,
        comparison: &Comparison,
    ) -> Result<usize, EngineError> {
        if self.metadata.kind(attribute).is_none() {
            return Err(EngineError::UnknownAttribute(attribute.to_string()));
        }
        let hits: Vec<NodeIndex> = self
            .tree
            .preorder()
            .iter()
            .copied()
            .filter(|&n| comparison.matches(self.metadata.get(n, attribute)))
            .collect();
        let count = hits.len();
        self.replace_selection(hits);
        Ok(count)
    }

    /// Deselect everything.
    pub fn clear_selection(&mut self) {
        self.replace_selection(Vec::new());
    }

    fn replace_selection(&mut self, nodes: Vec<NodeIndex>) {
        for state in &mut self.states {
            state.set_selected(false);
        }
        for node in nodes {
            self.states[node.index()].set_selected(true);
        }
        self.rebuild_derived_buffers();
    }

    /// Selected node ids in pre-order.
    pub fn selected_ids(&self) -> Vec<&str> {
        self.tree
            .preorder()
            .iter()
            .filter(|n| self.states[n.index()].is_selected())
            .map(|&n| self.tree.name(n))
            .collect()
    }

    // =========================================================================
    // Subtree filter
    // =========================================================================

    /// Show only the part of the tree whose nodes satisfy `comparison`: the
    /// matching nodes, their clades and their ancestors. Returns the number of
    /// nodes kept. Positions are unchanged so the view stays in place.
    pub fn filter_subtree(
        &mut self,
        attribute: &str,
        comparison: &Comparison,
    ) -> Result<usize, EngineError> {
        if self.metadata.kind(attribute).is_none() {
            return Err(EngineError::UnknownAttribute(attribute.to_string()));
        }
        let keep = query::subtree_filter(&self.tree, &self.metadata, attribute, comparison);
        let kept = keep.iter().filter(|&&k| k).count();
        if kept == 0 {
            return Err(EngineError::EmptyFilter(attribute.to_string()));
        }
        for (state, &keep) in self.states.iter_mut().zip(&keep) {
            state.set_filtered_out(!keep);
        }
        self.filtered = true;
        self.spatial_dirty = true;
        self.rebuild_derived_buffers();
        log::info!("subtree filter on {attribute} kept {kept} nodes");
        Ok(kept)
    }

    /// Drop the subtree filter and show the full tree again. Returns `false`
    /// when no filter was active.
    pub fn restore_tree(&mut self) -> bool {
        if !self.filtered {
            return false;
        }
        for state in &mut self.states {
            state.set_filtered_out(false);
        }
        self.filtered = false;
        self.spatial_dirty = true;
        self.rebuild_derived_buffers();
        true
    }

    /// Check if a subtree filter is active.
    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Clade labels for visible internal nodes inside `window`.
    pub fn labels_in_view(&self, window: &Window, attribute: &str, max: usize) -> Vec<NodeLabel> {
        query::labels_in_view(
            &self.tree,
            &self.metadata,
            &self.pos_x,
            &self.pos_y,
            &self.states,
            window,
            attribute,
            max,
        )
    }

    /// Labels for visible tips inside `window`, by id or by `attribute`.
    pub fn tip_labels_in_view(
        &self,
        window: &Window,
        attribute: Option<&str>,
        max: usize,
    ) -> Vec<NodeLabel> {
        query::tip_labels_in_view(
            &self.tree,
            &self.metadata,
            &self.pos_x,
            &self.pos_y,
            &self.states,
            window,
            attribute,
            max,
        )
    }

    /// Newick string for the subtree at `id`, without the trailing `;`.
    pub fn to_newick(&self, id: &str) -> Result<String, TreeError> {
        Ok(to_newick(&self.tree, self.tree.require(id)?))
    }

    /// Snapshot of one node for tooltips.
    pub fn node_info(&self, id: &str) -> Result<NodeInfo, TreeError> {
        let node = self.tree.require(id)?;
        let i = node.index();
        let state = self.states[i];
        Ok(NodeInfo {
            id: id.to_string(),
            parent: self.tree.parent(node).map(|p| self.tree.name(p).to_string()),
            children: self
                .tree
                .children(node)
                .iter()
                .map(|&c| self.tree.name(c).to_string())
                .collect(),
            length: self.tree.length(node),
            leafcount: self.tree.leafcount(node),
            is_tip: self.tree.is_tip(node),
            x: self.pos_x[i],
            y: self.pos_y[i],
            angle: self.angles[i],
            visible: state.is_visible(),
            selected: state.is_selected(),
            collapsed: state.is_collapse_root(),
            metadata: self.metadata.record(node).cloned().unwrap_or_default(),
        })
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Merge uploaded tab-delimited metadata. A malformed file is rejected
    /// whole and leaves the metadata untouched.
    pub fn upload_metadata(&mut self, text: &str) -> Result<UploadReport, UploadError> {
        let parsed = parse_upload(text, &self.tree)?;
        let report = self.metadata.apply_upload(parsed);
        if self.collapse.rank().is_some() {
            self.refresh_collapse();
        }
        Ok(report)
    }

    /// Attribute names of one kind, sorted.
    pub fn attribute_names(&self, kind: AttributeKind) -> Vec<&str> {
        self.metadata.attributes(kind)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The validated topology.
    pub fn tree(&self) -> &PhyloTree {
        &self.tree
    }

    /// Per-node metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Active configuration.
    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Scale factor of the last layout.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Position of a node in tree space.
    pub fn position(&self, id: &str) -> Option<(f32, f32)> {
        self.tree
            .index_of(id)
            .map(|n| (self.pos_x[n.index()], self.pos_y[n.index()]))
    }

    /// Ray angle of a node in radians.
    pub fn angle(&self, id: &str) -> Option<f32> {
        self.tree.index_of(id).map(|n| self.angles[n.index()])
    }

    /// Render state flags of a node.
    pub fn node_state(&self, id: &str) -> Option<NodeState> {
        self.tree.index_of(id).map(|n| self.states[n.index()])
    }

    /// Current branch color of a node.
    pub fn color(&self, id: &str) -> Option<Rgb> {
        self.tree.index_of(id).map(|n| self.colors[n.index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::color::{preset_color, CONTINUOUS_SCALE};
    use crate::render::{DEFAULT_COLOR, FLOATS_PER_TRIANGLE};
    use crate::test_support::{SAMPLE_METADATA_JSON, SAMPLE_TREE_JSON};
    use std::f32::consts::PI;

    fn engine() -> TreeEngine {
        let mut engine = TreeEngine::from_json(
            ViewConfig::default(),
            SAMPLE_TREE_JSON,
            Some(SAMPLE_METADATA_JSON),
        )
        .unwrap();
        engine.layout(600.0, 800.0).unwrap();
        engine
    }

    fn all_visible(engine: &TreeEngine) -> bool {
        ["N1", "N2", "A", "B", "C"]
            .iter()
            .all(|id| engine.node_state(id).unwrap().is_visible())
    }

    #[test]
    fn test_scenario_angles() {
        let engine = engine();
        let root = engine.angle("N1").unwrap();
        let close = |id: &str, expected: f32| (engine.angle(id).unwrap() - expected).abs() < 1e-4;

        assert!(close("N2", root - PI / 3.0));
        assert!(close("C", root + 2.0 * PI / 3.0));
        assert!(close("A", root - 2.0 * PI / 3.0));
        assert!(close("B", root));
        assert_eq!(engine.position("N1"), Some((0.0, 0.0)));
    }

    #[test]
    fn test_invalid_viewport() {
        let mut engine = engine();
        assert!(matches!(
            engine.layout(0.0, 100.0),
            Err(EngineError::InvalidViewport { .. })
        ));
        assert!(engine.scale() > 0.0);
    }

    #[test]
    fn test_initial_edge_buffer() {
        let engine = engine();
        assert_eq!(engine.edge_buffer().len(), 50);
        assert_eq!(engine.visible_count(), 5);
        assert!(engine.triangle_buffer().is_empty());
        assert_eq!(engine.marker_buffer().len(), 25);
    }

    #[test]
    fn test_collapse_genus() {
        let mut engine = engine();
        let edges = engine.collapse("genus").len();
        assert_eq!(edges, 30);
        assert_eq!(engine.triangle_buffer().len(), FLOATS_PER_TRIANGLE);
        assert!(engine.node_state("N2").unwrap().is_visible());
        assert!(engine.node_state("A").unwrap().is_hidden());
        assert_eq!(engine.edge_buffer().len(), FLOATS_PER_EDGE * engine.visible_count());
    }

    #[test]
    fn test_collapse_unknown_rank_is_noop() {
        let mut engine = engine();
        assert_eq!(engine.collapse("family").len(), 50);
        assert_eq!(engine.triangle_count(), 0);
    }

    #[test]
    fn test_triangle_hit() {
        let mut engine = engine();
        engine.collapse("genus");

        let (x, y) = engine.position("N2").unwrap();
        let hit = engine.triangle_at(x, y).unwrap();
        assert_eq!(hit.clade_root, "N2");
        assert_eq!(hit.vertices.len(), FLOATS_PER_TRIANGLE);
        assert_eq!(&hit.vertices[2..5], &engine.config().highlight_color);

        // Centroid of the triangle is inside as well.
        let t = engine.triangle_buffer();
        let cx = (t[0] + t[5] + t[10]) / 3.0;
        let cy = (t[1] + t[6] + t[11]) / 3.0;
        assert!(engine.triangle_at(cx, cy).is_some());

        assert!(engine.triangle_at(1.0e6, 1.0e6).is_none());
    }

    #[test]
    fn test_uncollapse_restores() {
        let mut engine = engine();
        let initial = engine.edge_buffer().len();

        engine.collapse("genus");
        engine.collapse("phylum");
        engine.collapse_clade("C").unwrap();
        assert_eq!(engine.uncollapse().len(), initial);
        assert!(all_visible(&engine));
        assert!(engine.triangle_buffer().is_empty());
    }

    #[test]
    fn test_manual_collapse_and_uncollapse_at() {
        let mut engine = engine();
        engine.collapse_clade("N2").unwrap();
        assert_eq!(engine.visible_count(), 3);

        let (x, y) = engine.position("N2").unwrap();
        assert_eq!(engine.uncollapse_clade_at(x, y).as_deref(), Some("N2"));
        assert!(all_visible(&engine));
        assert_eq!(engine.uncollapse_clade_at(x, y), None);

        assert!(matches!(
            engine.collapse_clade("nope"),
            Err(TreeError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_recolor_updates_triangles() {
        let mut engine = engine();
        engine.collapse("genus");
        let before = engine.triangle_buffer()[2..5].to_vec();
        assert_eq!(before, DEFAULT_COLOR.to_vec());

        engine.color_branches(&ColorMode::Preset).unwrap();
        let firmicutes = preset_color("Firmicutes").unwrap();
        assert_eq!(&engine.triangle_buffer()[2..5], &firmicutes);
        assert_eq!(engine.visible_count(), 3);
    }

    #[test]
    fn test_continuous_colors_and_error() {
        let mut engine = engine();
        engine
            .color_branches(&ColorMode::Attribute("abundance".into()))
            .unwrap();
        assert_eq!(engine.color("A"), Some(CONTINUOUS_SCALE[0]));
        assert_eq!(engine.color("B"), Some(CONTINUOUS_SCALE[4]));

        let before = engine.edge_buffer().to_vec();
        assert!(engine
            .color_branches(&ColorMode::Attribute("genus".into()))
            .is_err());
        assert_eq!(engine.edge_buffer(), before.as_slice());
    }

    #[test]
    fn test_nearest_node_and_hover() {
        let mut engine = engine();
        let (x, y) = engine.position("C").unwrap();
        assert_eq!(engine.nearest_node(x + 0.5, y, 2.0), Some("C"));

        engine.set_hovered(Some("C")).unwrap();
        assert_eq!(engine.hovered(), Some("C"));
        let highlight = engine.config().highlight_color;
        assert!(engine
            .marker_buffer()
            .chunks(5)
            .any(|v| v[0] == x && v[1] == y && v[2..5] == highlight));

        engine.set_hovered(None).unwrap();
        assert_eq!(engine.hovered(), None);
        assert!(engine.set_hovered(Some("ghost")).is_err());
    }

    #[test]
    fn test_nearest_node_screen_identity() {
        let engine = engine();
        let mut mvp = [0.0f32; 16];
        // Map tree space 1:1 onto a canvas centred on the root.
        let (w, h) = (800.0f32, 600.0f32);
        mvp[0] = 2.0 / w;
        mvp[5] = -2.0 / h;
        mvp[15] = 1.0;
        let projection = ScreenProjection::new(mvp, w, h);

        let (x, y) = engine.position("C").unwrap();
        let hit = engine.nearest_node_screen(&projection, w / 2.0 + x + 1.0, h / 2.0 + y);
        assert_eq!(hit, Some("C"));
    }

    #[test]
    fn test_select_in_rect_and_clear() {
        let mut engine = engine();
        let (x, y) = engine.position("C").unwrap();
        let buffer_len = engine.select_in_rect(x - 1.0, y - 1.0, x + 1.0, y + 1.0).len();
        assert_eq!(buffer_len, FLOATS_PER_EDGE);
        assert_eq!(engine.selected_ids(), vec!["C"]);

        engine.clear_selection();
        assert!(engine.selection_buffer().is_empty());
        assert!(engine.selected_ids().is_empty());
    }

    #[test]
    fn test_select_by_value() {
        let mut engine = engine();
        let count = engine
            .select_by_value("abundance", &Comparison::Greater(3.0))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(engine.selected_ids(), vec!["B", "C"]);
        assert_eq!(engine.selection_buffer().len(), 2 * FLOATS_PER_EDGE);

        assert!(matches!(
            engine.select_by_value("nope", &Comparison::Less(1.0)),
            Err(EngineError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn test_hidden_selection_not_drawn() {
        let mut engine = engine();
        engine
            .select_by_value("phylum", &Comparison::Equal(Value::Categorical("Firmicutes".into())))
            .unwrap();
        assert_eq!(engine.selection_buffer().len(), 3 * FLOATS_PER_EDGE);

        engine.collapse("genus");
        assert_eq!(engine.selection_buffer().len(), FLOATS_PER_EDGE);
    }

    #[test]
    fn test_upload_then_collapse() {
        let mut engine = engine();
        let report = engine
            .upload_metadata("id\tfamily\tdepth\nN2\tf__Beta\t3\nghost\tx\t1\n")
            .unwrap();
        assert_eq!(report.rows_applied, 1);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(engine.attribute_names(AttributeKind::Numeric), vec!["abundance", "depth"]);

        engine.collapse("family");
        assert_eq!(engine.triangle_count(), 1);
    }

    #[test]
    fn test_malformed_upload_leaves_metadata() {
        let mut engine = engine();
        let err = engine.upload_metadata("id\tfamily\nN2\tf__Beta\textra\n");
        assert!(matches!(err, Err(UploadError::ColumnMismatch { .. })));
        assert_eq!(engine.metadata().kind("family"), None);
    }

    #[test]
    fn test_order_children_relayouts() {
        let mut engine = engine();
        let scale = engine.order_children(ChildOrder::Increasing).unwrap();
        assert!(scale.is_some());
        assert_eq!(engine.tree().children(engine.tree().root()).len(), 2);
        let root = engine.angle("N1").unwrap();
        // C (one tip) now comes first and takes the lower angles.
        assert!((engine.angle("C").unwrap() - (root - 2.0 * PI / 3.0)).abs() < 1e-4);
        assert_eq!(engine.to_newick("N1").unwrap(), r#"("C":4,("A":1,"B":2):3)"#);
    }

    #[test]
    fn test_node_info() {
        let engine = engine();
        let info = engine.node_info("N2").unwrap();
        assert_eq!(info.parent.as_deref(), Some("N1"));
        assert_eq!(info.children, vec!["A", "B"]);
        assert_eq!(info.leafcount, 2);
        assert!(!info.is_tip);
        assert_eq!(info.metadata.get("genus"), Some(&Value::Categorical("g__Alpha".into())));
        assert!(engine.node_info("ghost").is_err());
    }

    #[test]
    fn test_labels_in_view() {
        let engine = engine();
        let window = Window::from_corners(-1.0e4, -1.0e4, 1.0e4, 1.0e4);
        let labels = engine.labels_in_view(&window, "genus", 10);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].id, "N2");
    }

    #[test]
    fn test_tip_labels_follow_collapse() {
        let mut engine = engine();
        let window = Window::from_corners(-1.0e4, -1.0e4, 1.0e4, 1.0e4);
        let ids: Vec<String> = engine
            .tip_labels_in_view(&window, None, 10)
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);

        engine.collapse("genus");
        let labels = engine.tip_labels_in_view(&window, Some("phylum"), 10);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "Proteobacteria");
    }

    #[test]
    fn test_highlight_clades() {
        let mut engine = engine();
        let legend = engine.highlight_clades("phylum").unwrap();
        match legend {
            Legend::Categorical { entries } => {
                let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
                assert_eq!(labels, vec!["Firmicutes", "Proteobacteria"]);
            }
            other => panic!("unexpected legend {other:?}"),
        }
        // N2 covers A and B, C gets its own arc.
        assert_eq!(engine.arc_count(), 2);
        assert_eq!(engine.clade_arc_buffer().len(), 2 * crate::render::FLOATS_PER_ARC);

        // The N2 arc starts at N2.
        let (x, y) = engine.position("N2").unwrap();
        assert_eq!(&engine.clade_arc_buffer()[..2], &[x, y]);

        engine.clear_clade_highlight();
        assert_eq!(engine.arc_count(), 0);
        assert!(engine.clade_arc_buffer().is_empty());

        assert_eq!(
            engine.highlight_clades("ghost"),
            Err(EngineError::UnknownAttribute("ghost".into()))
        );
    }

    #[test]
    fn test_filter_subtree_and_restore() {
        let mut engine = engine();
        let kept = engine
            .filter_subtree("abundance", &Comparison::Greater(5.0))
            .unwrap();
        assert_eq!(kept, 3);
        assert!(engine.is_filtered());
        assert_eq!(engine.visible_count(), 3);
        assert_eq!(engine.edge_buffer().len(), 3 * FLOATS_PER_EDGE);
        assert!(!engine.node_state("C").unwrap().is_visible());
        assert!(!engine.node_state("A").unwrap().is_visible());

        let selected = engine.select_in_rect(-1.0e4, -1.0e4, 1.0e4, 1.0e4).len();
        assert_eq!(selected, 3 * FLOATS_PER_EDGE);

        assert!(engine.restore_tree());
        assert!(!engine.restore_tree());
        assert!(all_visible(&engine));
        assert_eq!(engine.visible_count(), 5);
    }

    #[test]
    fn test_filter_subtree_rejects_empty_and_unknown() {
        let mut engine = engine();
        assert_eq!(
            engine.filter_subtree("abundance", &Comparison::Greater(100.0)),
            Err(EngineError::EmptyFilter("abundance".into()))
        );
        assert_eq!(
            engine.filter_subtree("ghost", &Comparison::Less(1.0)),
            Err(EngineError::UnknownAttribute("ghost".into()))
        );
        assert!(!engine.is_filtered());
        assert!(all_visible(&engine));
    }

    #[test]
    fn test_filter_combines_with_collapse_and_arcs() {
        let mut engine = engine();
        engine.highlight_clades("phylum").unwrap();
        engine
            .filter_subtree(
                "phylum",
                &Comparison::Equal(Value::Categorical("Proteobacteria".into())),
            )
            .unwrap();
        assert_eq!(engine.visible_count(), 2);
        assert_eq!(engine.arc_count(), 1);

        // N2 is outside the filter, so its clade draws no triangle.
        engine.collapse("genus");
        assert_eq!(engine.triangle_count(), 0);
        assert_eq!(engine.visible_count(), 2);

        engine.restore_tree();
        assert_eq!(engine.triangle_count(), 1);
        assert_eq!(engine.arc_count(), 2);
        // N1, N2 and C; A and B stay collapsed.
        assert_eq!(engine.visible_count(), 3);
    }
}
