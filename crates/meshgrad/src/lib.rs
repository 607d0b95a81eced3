//! Animatable bicubic mesh gradients rendered with `wgpu`.
//!
//! A W×H grid of control points, each with a position and a color, is
//! interpolated with a Catmull-Rom spline into a smooth surface:
//!
//! ```text
//!   producer thread                                 render thread
//!   ───────────────                                 ─────────────
//!   AnimationState ──tick()──▶ snapshot() ──▶ Submitter::submit
//!                                                  │  (copy under short lock)
//!                                                  ▼
//!                            RenderSyncBridge::apply_pending ──▶ ControlGrid
//!                                                  │
//!   TopologyCache (W, H, S) ──▶ UV + index buffers ─┤
//!                                                  ▼
//!                              vertex shader: evaluate_patch(uv) ──▶ surface
//! ```
//!
//! [`patch::PatchEvaluator`] is the CPU reference evaluator; the vertex
//! shader carries an equivalent GLSL copy, checked by [`gpu::ParityProbe`].
//! Control positions use a top-left origin with `y` pointing down, and colors
//! are straight (non-premultiplied) alpha.

pub mod animation;
pub mod compile;
pub mod gpu;
pub mod noise;
pub mod patch;
pub mod runtime;
pub mod sync;
pub mod tessellate;
pub mod timeline;
pub mod types;
pub mod window;

pub use animation::{AnimationState, PointAnimation};
pub use compile::ShaderError;
pub use gpu::{
    FrameStatus, MeshRenderer, ParityProbe, ProbeReport, RenderError, RendererOptions,
};
pub use noise::SimplexNoise;
pub use patch::{PatchEvaluator, PatchSample, DEFAULT_TENSION};
pub use runtime::{FixedStepTimeSource, FramePacer, SystemTimeSource, TimeSample, TimeSource};
pub use sync::{FnNotifier, NoopNotifier, RedrawNotifier, RenderSyncBridge, Submitter, SyncStats};
pub use tessellate::{tessellate, TessellatedMesh, TopologyCache, TopologyKey};
pub use timeline::{Timing, TimingCurve};
pub use types::{ControlGrid, GpuPowerPreference, GridDims, MeshError};
pub use window::{ViewerConfig, WindowRuntime};
