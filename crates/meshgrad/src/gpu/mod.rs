//! wgpu side of the mesh renderer.
//!
//! - `context` owns instance/device/surface wiring and rebuilds the swapchain
//!   when the window resizes.
//! - `mesh` uploads a [`crate::tessellate::TessellatedMesh`] as UV and index
//!   buffers; they are immutable until the topology changes.
//! - `uniforms` mirrors the std140 `ControlGrid` block and rewrites it only in
//!   frames where a snapshot was applied.
//! - `pipeline` compiles the generated GLSL and builds the render pipeline.
//! - `state` holds the surface-independent draw logic and the redraw
//!   decision, wrapped for a window by [`MeshRenderer`].
//! - `probe` runs the GLSL evaluator in a compute pass for CPU/GPU parity checks.

mod context;
mod mesh;
mod pipeline;
pub mod probe;
mod state;
mod uniforms;

pub use probe::{ParityProbe, ProbeReport, PROBE_TOLERANCE};
pub use state::{FrameStatus, MeshRenderer, RenderError, RendererOptions, DEFAULT_SUBDIVISIONS};
