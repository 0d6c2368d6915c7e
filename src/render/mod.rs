//! Text overlay rendering and frame compositing.

/// Premultiplied alpha blending.
pub mod composite;
/// Frame compositor and per-worker state.
pub mod compositor;
/// Rendered frame buffers.
pub mod frame;
/// Word measurement and rasterization.
pub(crate) mod text;
