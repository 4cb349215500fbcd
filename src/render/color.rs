//! Branch coloring: default gray, a curated taxonomic palette, or a
//! five-step continuous scale over a numeric attribute.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ColorError;
use crate::metadata::{AttributeKind, Metadata, Value};
use crate::tree::PhyloTree;

/// Linear RGB with channels in `[0, 1]`.
pub type Rgb = [f32; 3];

/// Branch color before any color mode is applied.
pub const DEFAULT_COLOR: Rgb = [0.7, 0.7, 0.7];

const fn rgb(hex: u32) -> Rgb {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// Yellow to red, lowest bucket first.
pub const CONTINUOUS_SCALE: [Rgb; 5] = [
    rgb(0xffffb2),
    rgb(0xfecc5c),
    rgb(0xfd8d3c),
    rgb(0xf03b20),
    rgb(0xbd0026),
];

/// Curated colors for common bacterial and archaeal phyla.
pub const PRESET_PALETTE: [(&str, Rgb); 22] = [
    ("Actinobacteria", rgb(0x1f77b4)),
    ("Bacteroidetes", rgb(0xff7f0e)),
    ("Chloroflexi", rgb(0x2ca02c)),
    ("Cyanobacteria", rgb(0xd62728)),
    ("Deinococcus-Thermus", rgb(0x9467bd)),
    ("Euryarchaeota", rgb(0x8c564b)),
    ("Firmicutes", rgb(0xe377c2)),
    ("Fusobacteria", rgb(0x7f7f7f)),
    ("Proteobacteria", rgb(0xbcbd22)),
    ("Spirochaetes", rgb(0x17becf)),
    ("Tenericutes", rgb(0xaec7e8)),
    ("Verrucomicrobia", rgb(0xffbb78)),
    ("Acidobacteria", rgb(0x98df8a)),
    ("Aquificae", rgb(0xff9896)),
    ("Chlamydiae", rgb(0xc5b0d5)),
    ("Chlorobi", rgb(0xc49c94)),
    ("Crenarchaeota", rgb(0xf7b6d2)),
    ("Planctomycetes", rgb(0xdbdb8d)),
    ("Thermotogae", rgb(0x9edae5)),
    ("Nitrospirae", rgb(0x393b79)),
    ("Synergistetes", rgb(0x637939)),
    ("Thaumarchaeota", rgb(0x8c6d31)),
];

/// How branches are colored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorMode {
    Default,
    Preset,
    Attribute(String),
}

impl ColorMode {
    /// Parse the drop-down value used by the viewer: empty or `default`,
    /// `preset`, or an attribute name.
    pub fn parse(mode: &str) -> Self {
        match mode.trim() {
            "" | "default" => ColorMode::Default,
            "preset" => ColorMode::Preset,
            attribute => ColorMode::Attribute(attribute.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

/// Legend describing the active color mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Legend {
    None,
    Categorical {
        entries: Vec<LegendEntry>,
    },
    Continuous {
        attribute: String,
        min: f64,
        max: f64,
        min_color: String,
        max_color: String,
    },
}

/// Six lowercase hex digits, two per channel.
pub fn to_hex(color: Rgb) -> String {
    let channel = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    format!(
        "{:02x}{:02x}{:02x}",
        channel(color[0]),
        channel(color[1]),
        channel(color[2])
    )
}

/// Palette color for a taxonomic group.
pub fn preset_color(group: &str) -> Option<Rgb> {
    PRESET_PALETTE
        .iter()
        .find(|(name, _)| *name == group)
        .map(|(_, color)| *color)
}

/// Index into [`CONTINUOUS_SCALE`] for `value` over `[min, max]`.
///
/// A value goes to the first bucket whose upper breakpoint is strictly greater
/// than it, so values on a breakpoint land in the higher bucket.
pub fn bucket_index(value: f64, min: f64, max: f64) -> usize {
    let buckets = CONTINUOUS_SCALE.len();
    if max <= min {
        return 0;
    }
    let span = max - min;
    (1..buckets)
        .find(|&k| min + (k as f64 * span) / buckets as f64 > value)
        .map_or(buckets - 1, |k| k - 1)
}

/// Recolor `colors` (indexed by node slot) in place.
///
/// Validation happens before any color is written, so an error leaves
/// `colors` untouched.
pub fn apply_color_mode(
    mode: &ColorMode,
    tree: &PhyloTree,
    metadata: &Metadata,
    colors: &mut [Rgb],
    default_color: Rgb,
    palette_attribute: &str,
) -> Result<Legend, ColorError> {
    match mode {
        ColorMode::Default => {
            colors.fill(default_color);
            Ok(Legend::None)
        }
        ColorMode::Preset => {
            let mut observed = BTreeMap::new();
            for &node in tree.preorder() {
                let color = match metadata.get(node, palette_attribute) {
                    Value::Categorical(group) => {
                        let color = preset_color(group).unwrap_or(default_color);
                        observed.insert(group.clone(), color);
                        color
                    }
                    _ => default_color,
                };
                colors[node.index()] = color;
            }
            let entries = observed
                .into_iter()
                .map(|(label, color)| LegendEntry {
                    label,
                    color: to_hex(color),
                })
                .collect();
            Ok(Legend::Categorical { entries })
        }
        ColorMode::Attribute(attribute) => {
            match metadata.kind(attribute) {
                None => return Err(ColorError::UnknownAttribute(attribute.clone())),
                Some(AttributeKind::Categorical) => {
                    return Err(ColorError::NotNumeric(attribute.clone()));
                }
                Some(AttributeKind::Numeric) => {}
            }
            let (min, max) = metadata
                .range(attribute)
                .ok_or_else(|| ColorError::MissingRange(attribute.clone()))?;

            for &node in tree.preorder() {
                if let Some(value) = metadata.get(node, attribute).as_f64() {
                    colors[node.index()] = CONTINUOUS_SCALE[bucket_index(value, min, max)];
                }
            }
            Ok(Legend::Continuous {
                attribute: attribute.clone(),
                min,
                max,
                min_color: to_hex(CONTINUOUS_SCALE[0]),
                max_color: to_hex(CONTINUOUS_SCALE[CONTINUOUS_SCALE.len() - 1]),
            })
        }
    }
}
