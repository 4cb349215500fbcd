//! Phylo View - WASM Module
//!
//! This module lays out, collapses, colors and hit-tests large rooted
//! phylogenetic trees for a WebGL renderer. It is compiled to WebAssembly and
//! exposes a JavaScript-friendly API via wasm-bindgen.
//!
//! # Architecture
//!
//! - `tree`: Tree topology on petgraph's StableGraph, the owning `TreeEngine`,
//!   Newick export
//! - `layout`: Equal-angle radial layout with rotation search, clade geometry
//! - `collapse`: Rank and manual clade collapsing, triangle construction
//! - `render`: Vertex buffers, branch coloring and highlighted clade arcs
//! - `metadata`: Typed per-node attributes and tab-delimited upload
//! - `spatial`: R-tree spatial indexing for O(log n) hit testing
//! - `picking`: Screen-space hover and triangle hit tests
//! - `query`: Value filters, subtree filters and label placement

use js_sys::Float32Array;
use serde::Serialize;
use wasm_bindgen::prelude::*;

pub mod collapse;
pub mod config;
pub mod error;
pub mod layout;
pub mod metadata;
pub mod picking;
pub mod query;
pub mod render;
pub mod spatial;
pub mod tree;

#[cfg(test)]
mod test_support;

use config::ViewConfig;
use metadata::{AttributeKind, Metadata, MetadataPayload};
use picking::ScreenProjection;
use query::{Comparison, Window};
use render::ColorMode;
use tree::{ChildOrder, PhyloTree, RawNode, TreeEngine};

/// Initialize the WASM module: panic messages and `log` output go to the
/// browser console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&JsValue::from_str("phylo-view: logger already initialised"));
    }
}

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Serialize maps as plain objects rather than `Map`s.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(js_error)
}

fn config_from_js(config: JsValue) -> Result<ViewConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        Ok(ViewConfig::default())
    } else {
        serde_wasm_bindgen::from_value(config).map_err(js_error)
    }
}

/// Main entry point for the tree viewer.
///
/// This struct wraps the internal TreeEngine and provides the public API
/// exposed to JavaScript.
#[wasm_bindgen]
pub struct PhyloViewWasm {
    engine: TreeEngine,
}

#[wasm_bindgen]
impl PhyloViewWasm {
    /// Create a viewer from plain JS objects.
    ///
    /// # Arguments
    ///
    /// * `tree` - `{id: {parent, children, length, leafcount, isTip}}`
    /// * `metadata` - `{records: {id: {attr: value}}, ranges: {attr: [min, max]}}`
    ///   or `null`
    /// * `config` - partial `ViewConfig`, or `undefined` for defaults
    #[wasm_bindgen(constructor)]
    pub fn new(tree: JsValue, metadata: JsValue, config: JsValue) -> Result<PhyloViewWasm, JsValue> {
        let config = config_from_js(config)?;
        let nodes: std::collections::BTreeMap<String, RawNode> =
            serde_wasm_bindgen::from_value(tree).map_err(js_error)?;
        let tree = PhyloTree::from_raw(&config.root_id, &nodes).map_err(js_error)?;
        let metadata = if metadata.is_undefined() || metadata.is_null() {
            Metadata::new(tree.node_bound())
        } else {
            let payload: MetadataPayload =
                serde_wasm_bindgen::from_value(metadata).map_err(js_error)?;
            Metadata::from_payload(&tree, payload)
        };
        Ok(Self {
            engine: TreeEngine::new(config, tree, metadata),
        })
    }

    /// Create a viewer from the JSON bodies of the tree and metadata
    /// endpoints.
    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(
        tree_json: &str,
        metadata_json: Option<String>,
        config: JsValue,
    ) -> Result<PhyloViewWasm, JsValue> {
        let config = config_from_js(config)?;
        let engine = TreeEngine::from_json(config, tree_json, metadata_json.as_deref())
            .map_err(js_error)?;
        Ok(Self { engine })
    }

    /// Get the number of nodes in the tree.
    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> usize {
        self.engine.tree().node_count()
    }

    // =========================================================================
    // Layout
    // =========================================================================

    /// Lay the tree out for the viewport and return the scale factor.
    pub fn layout(&mut self, height: f64, width: f64) -> Result<f32, JsValue> {
        self.engine.layout(height, width).map_err(js_error)
    }

    pub fn scale(&self) -> f32 {
        self.engine.scale()
    }

    /// Sort children by clade size (`increasing` puts small clades first)
    /// and lay out again. Returns the new scale, or `undefined` if no layout
    /// has run yet.
    #[wasm_bindgen(js_name = orderChildren)]
    pub fn order_children(&mut self, increasing: bool) -> Result<Option<f32>, JsValue> {
        let order = if increasing {
            ChildOrder::Increasing
        } else {
            ChildOrder::Decreasing
        };
        self.engine.order_children(order).map_err(js_error)
    }

    /// Get a node's position as `[x, y]`.
    #[wasm_bindgen(js_name = getNodePosition)]
    pub fn get_node_position(&self, id: &str) -> Option<Vec<f32>> {
        self.engine.position(id).map(|(x, y)| vec![x, y])
    }

    // =========================================================================
    // Collapse
    // =========================================================================

    /// Collapse all clades at a taxonomic rank. Returns the edge buffer.
    pub fn collapse(&mut self, rank: &str) -> Float32Array {
        Float32Array::from(self.engine.collapse(rank))
    }

    /// Collapse one clade by its root id. Returns the edge buffer.
    #[wasm_bindgen(js_name = collapseClade)]
    pub fn collapse_clade(&mut self, id: &str) -> Result<Float32Array, JsValue> {
        self.engine
            .collapse_clade(id)
            .map(Float32Array::from)
            .map_err(js_error)
    }

    /// Expand the collapsed clade at a tree-space point. Returns its root id.
    #[wasm_bindgen(js_name = uncollapseCladeAt)]
    pub fn uncollapse_clade_at(&mut self, x: f32, y: f32) -> Option<String> {
        self.engine.uncollapse_clade_at(x, y)
    }

    /// Expand every clade. Returns the edge buffer.
    pub fn uncollapse(&mut self) -> Float32Array {
        Float32Array::from(self.engine.uncollapse())
    }

    // =========================================================================
    // Color
    // =========================================================================

    /// Recolor branches. `mode` is empty for default gray, `"preset"` for the
    /// taxonomic palette, or a numeric attribute name. Returns the legend.
    #[wasm_bindgen(js_name = colorBranches)]
    pub fn color_branches(&mut self, mode: &str) -> Result<JsValue, JsValue> {
        let legend = self
            .engine
            .color_branches(&ColorMode::parse(mode))
            .map_err(js_error)?;
        to_js(&legend)
    }

    /// Draw a filled arc behind each outermost clade with a value for `rank`.
    /// Returns the group legend.
    #[wasm_bindgen(js_name = highlightClades)]
    pub fn highlight_clades(&mut self, rank: &str) -> Result<JsValue, JsValue> {
        let legend = self.engine.highlight_clades(rank).map_err(js_error)?;
        to_js(&legend)
    }

    #[wasm_bindgen(js_name = clearCladeHighlight)]
    pub fn clear_clade_highlight(&mut self) {
        self.engine.clear_clade_highlight();
    }

    // =========================================================================
    // Buffers
    // =========================================================================

    /// Copy of the edge buffer, `[px, py, r, g, b, x, y, r, g, b]` per
    /// visible node.
    #[wasm_bindgen(js_name = edgeBuffer)]
    pub fn edge_buffer(&self) -> Float32Array {
        Float32Array::from(self.engine.edge_buffer())
    }

    /// Get a zero-copy view of the edge buffer.
    ///
    /// # Safety
    ///
    /// The returned view is invalidated if any Rust allocation occurs.
    /// Use immediately for GPU upload, do not store.
    #[wasm_bindgen(js_name = edgeBufferView)]
    pub fn edge_buffer_view(&self) -> Float32Array {
        unsafe { Float32Array::view(self.engine.edge_buffer()) }
    }

    /// Collapsed clades, `3 x [x, y, r, g, b]` per triangle.
    #[wasm_bindgen(js_name = triangleBuffer)]
    pub fn triangle_buffer(&self) -> Float32Array {
        Float32Array::from(self.engine.triangle_buffer())
    }

    /// Highlighted clade arcs, drawn before the branches.
    #[wasm_bindgen(js_name = cladeArcBuffer)]
    pub fn clade_arc_buffer(&self) -> Float32Array {
        Float32Array::from(self.engine.clade_arc_buffer())
    }

    #[wasm_bindgen(js_name = selectionBuffer)]
    pub fn selection_buffer(&self) -> Float32Array {
        Float32Array::from(self.engine.selection_buffer())
    }

    /// One `[x, y, r, g, b]` vertex per visible node.
    #[wasm_bindgen(js_name = markerBuffer)]
    pub fn marker_buffer(&self) -> Float32Array {
        Float32Array::from(self.engine.marker_buffer())
    }

    #[wasm_bindgen(js_name = visibleCount)]
    pub fn visible_count(&self) -> usize {
        self.engine.visible_count()
    }

    // =========================================================================
    // Picking
    // =========================================================================

    /// Node under the cursor, given the renderer's column-major MVP matrix
    /// and canvas size in pixels.
    #[wasm_bindgen(js_name = nearestNodeScreen)]
    pub fn nearest_node_screen(
        &self,
        mvp: &[f32],
        width: f32,
        height: f32,
        screen_x: f32,
        screen_y: f32,
    ) -> Result<Option<String>, JsValue> {
        let projection = ScreenProjection::from_slice(mvp, width, height)
            .ok_or_else(|| JsValue::from_str("mvp matrix must have 16 entries"))?;
        Ok(self
            .engine
            .nearest_node_screen(&projection, screen_x, screen_y)
            .map(str::to_string))
    }

    /// Nearest visible node to a tree-space point within `max_distance`.
    #[wasm_bindgen(js_name = nearestNode)]
    pub fn nearest_node(&self, x: f32, y: f32, max_distance: f32) -> Option<String> {
        self.engine
            .nearest_node(x, y, max_distance)
            .map(str::to_string)
    }

    /// Highlight a node in the marker buffer, or clear with `undefined`.
    #[wasm_bindgen(js_name = setHovered)]
    pub fn set_hovered(&mut self, id: Option<String>) -> Result<(), JsValue> {
        self.engine.set_hovered(id.as_deref()).map_err(js_error)
    }

    /// Collapsed clade at a tree-space point as
    /// `{cladeRoot, vertices}`, or `null`.
    #[wasm_bindgen(js_name = triangleAt)]
    pub fn triangle_at(&self, x: f32, y: f32) -> Result<JsValue, JsValue> {
        to_js(&self.engine.triangle_at(x, y))
    }

    // =========================================================================
    // Selection & Queries
    // =========================================================================

    /// Select visible nodes inside a rectangle. Returns the selection buffer.
    #[wasm_bindgen(js_name = selectInRect)]
    pub fn select_in_rect(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Float32Array {
        Float32Array::from(self.engine.select_in_rect(x1, y1, x2, y2))
    }

    /// Select nodes by attribute value. `comparison` is
    /// `{op: "greater" | "less" | "equal", value}`.
    #[wasm_bindgen(js_name = selectByValue)]
    pub fn select_by_value(&mut self, attribute: &str, comparison: JsValue) -> Result<usize, JsValue> {
        let comparison: Comparison = serde_wasm_bindgen::from_value(comparison).map_err(js_error)?;
        self.engine
            .select_by_value(attribute, &comparison)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = clearSelection)]
    pub fn clear_selection(&mut self) {
        self.engine.clear_selection();
    }

    #[wasm_bindgen(js_name = selectedIds)]
    pub fn selected_ids(&self) -> Vec<String> {
        self.engine
            .selected_ids()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Up to `max` clade labels `{id, x, y, text}` inside the window.
    #[wasm_bindgen(js_name = labelsInView)]
    pub fn labels_in_view(
        &self,
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
        attribute: &str,
        max: usize,
    ) -> Result<JsValue, JsValue> {
        let window = Window::from_corners(min_x, min_y, max_x, max_y);
        to_js(&self.engine.labels_in_view(&window, attribute, max))
    }

    /// Up to `max` tip labels inside the window. Without an attribute the
    /// label text is the tip id.
    #[wasm_bindgen(js_name = tipLabelsInView)]
    pub fn tip_labels_in_view(
        &self,
        min_x: f32,
        min_y: f32,
        max_x: f32,
        max_y: f32,
        attribute: Option<String>,
        max: usize,
    ) -> Result<JsValue, JsValue> {
        let window = Window::from_corners(min_x, min_y, max_x, max_y);
        to_js(&self.engine.tip_labels_in_view(&window, attribute.as_deref(), max))
    }

    // =========================================================================
    // Subtree filter
    // =========================================================================

    /// Show only the nodes matching `comparison`, their clades and their
    /// ancestors. Returns the number of nodes kept.
    #[wasm_bindgen(js_name = filterSubtree)]
    pub fn filter_subtree(&mut self, attribute: &str, comparison: JsValue) -> Result<usize, JsValue> {
        let comparison: Comparison = serde_wasm_bindgen::from_value(comparison).map_err(js_error)?;
        self.engine
            .filter_subtree(attribute, &comparison)
            .map_err(js_error)
    }

    /// Show the full tree again. Returns `false` if no filter was active.
    #[wasm_bindgen(js_name = restoreTree)]
    pub fn restore_tree(&mut self) -> bool {
        self.engine.restore_tree()
    }

    #[wasm_bindgen(js_name = nodeInfo)]
    pub fn node_info(&self, id: &str) -> Result<JsValue, JsValue> {
        let info = self.engine.node_info(id).map_err(js_error)?;
        to_js(&info)
    }

    /// Newick string for the subtree at `id`, without the trailing `;`.
    #[wasm_bindgen(js_name = toNewick)]
    pub fn to_newick(&self, id: &str) -> Result<String, JsValue> {
        self.engine.to_newick(id).map_err(js_error)
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Merge tab-delimited metadata. Returns `{attributes, rowsApplied,
    /// warnings}`; a malformed file throws and changes nothing.
    #[wasm_bindgen(js_name = uploadMetadata)]
    pub fn upload_metadata(&mut self, text: &str) -> Result<JsValue, JsValue> {
        let report = self.engine.upload_metadata(text).map_err(js_error)?;
        to_js(&report)
    }

    /// Attribute names for the drop-down menus.
    #[wasm_bindgen(js_name = attributeNames)]
    pub fn attribute_names(&self, numeric: bool) -> Vec<String> {
        let kind = if numeric {
            AttributeKind::Numeric
        } else {
            AttributeKind::Categorical
        };
        self.engine
            .attribute_names(kind)
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}
