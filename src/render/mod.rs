//! Render-side data: vertex buffers and branch colors.

pub mod arc;
pub mod buffer;
pub mod color;

pub use arc::{CladeArc, FLOATS_PER_ARC, TRIANGLES_PER_ARC};
pub use buffer::{FLOATS_PER_EDGE, FLOATS_PER_TRIANGLE, FLOATS_PER_VERTEX};
pub use color::{ColorMode, Legend, LegendEntry, Rgb, DEFAULT_COLOR};
