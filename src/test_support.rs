//! Shared fixtures for unit tests.

use crate::tree::PhyloTree;

/// `((A:1,B:2)N2:3,C:4)N1;` with internal node ids prefixed by `N`.
pub const SAMPLE_TREE_JSON: &str = r#"{
    "N1": {"parent": null, "children": ["N2", "C"], "length": 0, "leafcount": 3, "isTip": false},
    "N2": {"parent": "N1", "children": ["A", "B"], "length": 3, "leafcount": 2, "isTip": false},
    "A": {"parent": "N2", "children": [], "length": 1, "leafcount": 1, "isTip": true},
    "B": {"parent": "N2", "children": [], "length": 2, "leafcount": 1, "isTip": true},
    "C": {"parent": "N1", "children": [], "length": 4, "leafcount": 1, "isTip": true}
}"#;

/// Metadata for the sample tree: N2 is a genus-level clade root, tips carry
/// a numeric abundance and a phylum.
pub const SAMPLE_METADATA_JSON: &str = r#"{
    "records": {
        "N1": {"genus": null, "abundance": null, "phylum": null},
        "N2": {"genus": "g__Alpha", "abundance": null, "phylum": "Firmicutes"},
        "A": {"genus": null, "abundance": 0.0, "phylum": "Firmicutes"},
        "B": {"genus": null, "abundance": 10.0, "phylum": "Firmicutes"},
        "C": {"genus": null, "abundance": 4.0, "phylum": "Proteobacteria"}
    },
    "ranges": {"abundance": [0.0, 10.0]}
}"#;

/// The five-node sample tree, rooted at `N1`.
pub fn sample_tree() -> PhyloTree {
    PhyloTree::from_json("N1", SAMPLE_TREE_JSON).unwrap()
}
