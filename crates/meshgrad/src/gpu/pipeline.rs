use anyhow::{Context, Result};

use crate::compile::{compile_shader, MeshShader};
use crate::types::{GridDims, MeshError};

use super::mesh::vertex_layout;
use super::uniforms::GridUniforms;

/// Rejects grids whose uniform block exceeds the device binding limit.
pub(crate) fn check_uniform_limit(dims: GridDims, max_binding_size: u32) -> Result<(), MeshError> {
    let points = dims.point_count();
    if GridUniforms::byte_len(points) > u64::from(max_binding_size) {
        let max = (u64::from(max_binding_size).saturating_sub(super::uniforms::HEADER_SIZE) / 32)
            as usize;
        return Err(MeshError::GridTooLarge { points, max });
    }
    Ok(())
}

pub(crate) fn uniform_layout_entry(visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Render pipeline plus the grid uniform buffer it reads.
pub(crate) struct MeshPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_buffer: wgpu::Buffer,
    pub uniform_bind_group: wgpu::BindGroup,
}

impl MeshPipeline {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        dims: GridDims,
    ) -> Result<Self> {
        check_uniform_limit(dims, device.limits().max_uniform_buffer_binding_size)?;

        let points = dims.point_count();
        let vertex_module = compile_shader(device, MeshShader::Vertex { points })
            .context("failed to compile mesh vertex shader")?;
        let fragment_module = compile_shader(device, MeshShader::Fragment)
            .context("failed to compile mesh fragment shader")?;

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grid uniform layout"),
            entries: &[uniform_layout_entry(wgpu::ShaderStages::VERTEX)],
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grid uniform buffer"),
            size: GridUniforms::byte_len(points),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grid uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mesh pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[vertex_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        tracing::debug!(points, ?surface_format, "built mesh pipeline");

        Ok(Self {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
        })
    }
}
