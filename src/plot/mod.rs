//! Box-and-strip figures: per-group box statistics, jittered points and
//! the bitmap renderer.

pub mod jitter;
pub mod render;
pub mod summary;

pub use render::render_png;
pub use summary::BoxSummary;
