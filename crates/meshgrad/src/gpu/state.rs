use std::time::{Duration, Instant};

use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::patch::DEFAULT_TENSION;
use crate::sync::RenderSyncBridge;
use crate::tessellate::{TopologyCache, TopologyKey};
use crate::types::{GpuPowerPreference, MeshError};

use super::context::GpuContext;
use super::mesh::MeshBuffers;
use super::pipeline::MeshPipeline;
use super::uniforms::GridUniforms;

pub const DEFAULT_SUBDIVISIONS: u32 = 48;

/// Knobs fixed for the lifetime of a [`MeshRenderer`], except subdivisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererOptions {
    pub subdivisions: u32,
    pub tension: f32,
    /// Straight-alpha RGBA the surface is cleared to before the mesh is drawn.
    pub clear_color: [f32; 4],
    pub power: GpuPowerPreference,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            subdivisions: DEFAULT_SUBDIVISIONS,
            tension: DEFAULT_TENSION,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            power: GpuPowerPreference::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// A frame was drawn and presented.
    Presented,
    /// Nothing changed since the last presented frame.
    Idle,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    Topology(#[from] MeshError),
}

/// Everything needed to draw the mesh into a color target of one format.
/// Owns the redraw decision; the caller only supplies a target view.
pub(crate) struct MeshScene {
    pipeline: MeshPipeline,
    topology: TopologyCache,
    key: TopologyKey,
    mesh: Option<MeshBuffers>,
    bridge: RenderSyncBridge,
    uniforms: GridUniforms,
    clear_color: wgpu::Color,
    uniforms_dirty: bool,
    needs_redraw: bool,
}

impl MeshScene {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        bridge: RenderSyncBridge,
        options: RendererOptions,
    ) -> Result<Self> {
        let dims = bridge.grid().dims();
        let key = TopologyKey::new(dims.width(), dims.height(), options.subdivisions);
        key.lattice_size()?;
        let pipeline = MeshPipeline::new(device, format, dims)?;

        let mut uniforms = GridUniforms::new(dims, options.tension);
        uniforms.fill(bridge.grid());

        let [r, g, b, a] = options.clear_color.map(f64::from);
        Ok(Self {
            pipeline,
            topology: TopologyCache::new(),
            key,
            mesh: None,
            bridge,
            uniforms,
            clear_color: wgpu::Color { r, g, b, a },
            uniforms_dirty: true,
            needs_redraw: true,
        })
    }

    pub fn bridge(&self) -> &RenderSyncBridge {
        &self.bridge
    }

    pub fn subdivisions(&self) -> u32 {
        self.key.subdivisions
    }

    pub fn invalidate(&mut self) {
        self.needs_redraw = true;
    }

    /// Validates and records the new density; the mesh is rebuilt on the next draw.
    pub fn set_subdivisions(&mut self, subdivisions: u32) -> Result<(), MeshError> {
        let dims = self.bridge.grid().dims();
        let key = TopologyKey::new(dims.width(), dims.height(), subdivisions);
        if key == self.key {
            return Ok(());
        }
        key.lattice_size()?;
        self.key = key;
        self.needs_redraw = true;
        debug!(subdivisions, "queued mesh topology change");
        Ok(())
    }

    /// Applies the newest snapshot, if any. Returns whether a frame is due.
    pub fn prepare(&mut self) -> bool {
        if self.bridge.apply_pending() {
            self.uniforms.fill(self.bridge.grid());
            self.uniforms_dirty = true;
            self.needs_redraw = true;
        }
        self.needs_redraw
    }

    /// Records and submits one frame into `view`.
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
    ) -> Result<(), MeshError> {
        self.sync_topology(device)?;
        if self.uniforms_dirty {
            self.uniforms.write(queue, &self.pipeline.uniform_buffer);
            self.uniforms_dirty = false;
        }
        let Some(mesh) = self.mesh.as_ref() else {
            return Ok(());
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("mesh encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("mesh pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.pipeline.pipeline);
            render_pass.set_bind_group(0, &self.pipeline.uniform_bind_group, &[]);
            render_pass.set_vertex_buffer(0, mesh.vertices.slice(..));
            render_pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        queue.submit(std::iter::once(encoder.finish()));
        self.needs_redraw = false;
        Ok(())
    }

    /// Uploads the mesh for the current key when it differs from the GPU copy.
    /// Meshes are cached per density, so toggling back and forth does not
    /// re-tessellate.
    fn sync_topology(&mut self, device: &wgpu::Device) -> Result<(), MeshError> {
        if self.mesh.as_ref().is_some_and(|mesh| mesh.key == self.key) {
            return Ok(());
        }
        let tessellated = self.topology.get_or_build(self.key)?;
        let mesh = MeshBuffers::upload(device, &tessellated);
        debug!(
            subdivisions = self.key.subdivisions,
            indices = mesh.index_count,
            "uploaded mesh topology"
        );
        self.mesh = Some(mesh);
        Ok(())
    }
}

/// Draws the bridge's control grid onto a window surface, on demand.
pub struct MeshRenderer {
    context: GpuContext,
    scene: MeshScene,
    frames_since_stats: u32,
    last_stats: Instant,
}

impl MeshRenderer {
    pub fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        bridge: RenderSyncBridge,
        options: RendererOptions,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let dims = bridge.grid().dims();
        TopologyKey::new(dims.width(), dims.height(), options.subdivisions).lattice_size()?;

        let context = GpuContext::new(target, initial_size, options.power)?;
        let scene = MeshScene::new(&context.device, context.surface_format, bridge, options)?;
        Ok(Self {
            context,
            scene,
            frames_since_stats: 0,
            last_stats: Instant::now(),
        })
    }

    pub fn bridge(&self) -> &RenderSyncBridge {
        self.scene.bridge()
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub fn subdivisions(&self) -> u32 {
        self.scene.subdivisions()
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
        self.scene.invalidate();
    }

    /// Forces the next frame to draw, e.g. after the window becomes visible.
    pub fn invalidate(&mut self) {
        self.scene.invalidate();
    }

    pub fn set_subdivisions(&mut self, subdivisions: u32) -> Result<(), MeshError> {
        self.scene.set_subdivisions(subdivisions)
    }

    /// Applies the newest snapshot, if any, and draws when something changed.
    pub fn render(&mut self) -> Result<FrameStatus, RenderError> {
        if !self.scene.prepare() {
            return Ok(FrameStatus::Idle);
        }

        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.scene
            .draw(&self.context.device, &self.context.queue, &view)?;
        frame.present();
        self.record_stats();
        Ok(FrameStatus::Presented)
    }

    /// Reconfigures the surface after `Lost`/`Outdated` and schedules a redraw.
    pub fn recover_surface(&mut self) {
        self.context.reconfigure();
        self.scene.invalidate();
    }

    fn record_stats(&mut self) {
        self.frames_since_stats += 1;
        let elapsed = self.last_stats.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let stats = self.scene.bridge().stats();
            debug!(
                frames = self.frames_since_stats,
                fps = (self.frames_since_stats as f32 / elapsed.as_secs_f32()).round(),
                submitted = stats.submitted,
                applied = stats.applied,
                "render stats"
            );
            self.frames_since_stats = 0;
            self.last_stats = Instant::now();
        }
    }
}
