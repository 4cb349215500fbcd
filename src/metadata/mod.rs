//! Per-node metadata.
//!
//! Each node carries a map from attribute name to a tagged [`Value`]. A side
//! registry records whether an attribute is numeric or categorical (used to
//! populate the color/collapse drop-downs) and caches `[min, max]` for numeric
//! attributes.

mod upload;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::tree::PhyloTree;

pub use upload::{parse_upload, Column, ParsedUpload, UploadReport, UploadWarning};

/// A metadata cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Numeric(f64),
    Categorical(String),
    Null,
}

impl Value {
    /// Interpret a text cell: empty is null, anything `f64` accepts is numeric.
    pub fn from_cell(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            Value::Null
        } else if let Ok(number) = cell.parse::<f64>() {
            Value::Numeric(number)
        } else {
            Value::Categorical(cell.to_string())
        }
    }

    /// Check if the value is missing.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The number held by a numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    /// The label held by a categorical value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Categorical(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(n) => write!(f, "{n}"),
            Value::Categorical(s) => f.write_str(s),
            Value::Null => Ok(()),
        }
    }
}

/// Whether an attribute holds numbers or labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Numeric,
    Categorical,
}

/// Metadata as delivered by the metadata endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataPayload {
    #[serde(default)]
    pub records: HashMap<String, HashMap<String, Value>>,
    #[serde(default)]
    pub ranges: HashMap<String, [f64; 2]>,
}

static NULL: Value = Value::Null;

/// Metadata records indexed by node slot.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    records: Vec<HashMap<String, Value>>,
    kinds: BTreeMap<String, AttributeKind>,
    ranges: HashMap<String, (f64, f64)>,
}

impl Metadata {
    /// Empty metadata for `node_bound` node slots.
    pub fn new(node_bound: usize) -> Self {
        Self {
            records: vec![HashMap::new(); node_bound],
            kinds: BTreeMap::new(),
            ranges: HashMap::new(),
        }
    }

    /// Build from the endpoint payload. Records for unknown ids are skipped
    /// with a warning; missing numeric ranges are computed from the values.
    pub fn from_payload(tree: &PhyloTree, payload: MetadataPayload) -> Self {
        let mut metadata = Self::new(tree.node_bound());
        let mut skipped = 0usize;

        for (id, attributes) in payload.records {
            let Some(node) = tree.index_of(&id) else {
                skipped += 1;
                continue;
            };
            metadata.records[node.index()].extend(attributes);
        }
        if skipped > 0 {
            log::warn!("skipped metadata for {skipped} ids not present in the tree");
        }

        #[derive(Default)]
        struct Seen {
            numeric: bool,
            categorical: bool,
            min: f64,
            max: f64,
        }
        let mut seen: HashMap<&str, Seen> = HashMap::new();
        for record in &metadata.records {
            for (name, value) in record {
                let entry = seen.entry(name.as_str()).or_insert_with(|| Seen {
                    min: f64::INFINITY,
                    max: f64::NEG_INFINITY,
                    ..Seen::default()
                });
                match value {
                    Value::Numeric(n) => {
                        entry.numeric = true;
                        entry.min = entry.min.min(*n);
                        entry.max = entry.max.max(*n);
                    }
                    Value::Categorical(_) => entry.categorical = true,
                    Value::Null => {}
                }
            }
        }

        let mut kinds = BTreeMap::new();
        let mut ranges = HashMap::new();
        for (name, seen) in seen {
            if seen.numeric && !seen.categorical {
                kinds.insert(name.to_string(), AttributeKind::Numeric);
                let range = payload
                    .ranges
                    .get(name)
                    .map(|&[min, max]| (min, max))
                    .unwrap_or((seen.min, seen.max));
                ranges.insert(name.to_string(), range);
            } else {
                kinds.insert(name.to_string(), AttributeKind::Categorical);
            }
        }
        metadata.kinds = kinds;
        metadata.ranges = ranges;

        log::info!("loaded {} metadata attributes", metadata.kinds.len());
        metadata
    }

    /// Build from a JSON payload `{"records": {...}, "ranges": {...}}`.
    pub fn from_json(tree: &PhyloTree, json: &str) -> Result<Self, EngineError> {
        let payload: MetadataPayload = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidMetadata(e.to_string()))?;
        Ok(Self::from_payload(tree, payload))
    }

    /// Value of `attribute` for `node`; `Null` when unset.
    pub fn get(&self, node: NodeIndex, attribute: &str) -> &Value {
        self.records
            .get(node.index())
            .and_then(|record| record.get(attribute))
            .unwrap_or(&NULL)
    }

    /// All attributes of `node`.
    pub fn record(&self, node: NodeIndex) -> Option<&HashMap<String, Value>> {
        self.records.get(node.index())
    }

    /// Kind of `attribute`; `None` when no node has it.
    pub fn kind(&self, attribute: &str) -> Option<AttributeKind> {
        self.kinds.get(attribute).copied()
    }

    /// Cached `(min, max)` of a numeric attribute.
    pub fn range(&self, attribute: &str) -> Option<(f64, f64)> {
        self.ranges.get(attribute).copied()
    }

    /// Attribute names of the given kind, sorted.
    pub fn attributes(&self, kind: AttributeKind) -> Vec<&str> {
        self.kinds
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Write one column of values and reconcile the attribute's kind and range.
    /// `Null` cells are ignored.
    pub(crate) fn merge_column(
        &mut self,
        attribute: &str,
        kind: AttributeKind,
        cells: impl IntoIterator<Item = (NodeIndex, Value)>,
    ) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for (node, value) in cells {
            if value.is_null() {
                continue;
            }
            if let Value::Numeric(n) = value {
                min = min.min(n);
                max = max.max(n);
            }
            if let Some(record) = self.records.get_mut(node.index()) {
                record.insert(attribute.to_string(), value);
            }
        }

        let merged = match (self.kinds.get(attribute), kind) {
            (Some(AttributeKind::Categorical), _) | (_, AttributeKind::Categorical) => {
                AttributeKind::Categorical
            }
            _ => AttributeKind::Numeric,
        };
        self.kinds.insert(attribute.to_string(), merged);

        if merged == AttributeKind::Numeric && min <= max {
            let range = match self.ranges.get(attribute) {
                Some(&(lo, hi)) => (lo.min(min), hi.max(max)),
                None => (min, max),
            };
            self.ranges.insert(attribute.to_string(), range);
        } else if merged == AttributeKind::Categorical {
            self.ranges.remove(attribute);
        }
    }
}
