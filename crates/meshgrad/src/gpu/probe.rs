//! Offscreen check that the GLSL evaluator agrees with [`PatchEvaluator`].
//!
//! The probe runs the shader's `evaluate_patch` in a compute pass over a set
//! of UVs, reads the results back, and diffs them against the CPU path.

use anyhow::{anyhow, Context, Result};
use wgpu::util::DeviceExt;

use crate::compile::{compile_shader, MeshShader};
use crate::patch::PatchEvaluator;
use crate::types::{ControlGrid, GpuPowerPreference};

use super::context::{read_buffer, request_headless_device};
use super::pipeline::{check_uniform_limit, uniform_layout_entry};
use super::uniforms::GridUniforms;

/// Largest acceptable per-channel difference between CPU and GPU samples.
pub const PROBE_TOLERANCE: f32 = 1e-4;

const WORKGROUP_SIZE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReport {
    pub samples: usize,
    pub max_position_error: f32,
    pub max_color_error: f32,
}

impl ProbeReport {
    pub fn within(&self, tolerance: f32) -> bool {
        self.max_position_error <= tolerance && self.max_color_error <= tolerance
    }
}

/// Evenly spaced probe UVs, including both edges, `steps + 1` per axis.
pub fn probe_coords(steps: u32) -> Vec<[f32; 2]> {
    let steps = steps.max(1);
    let mut coords = Vec::with_capacity(((steps + 1) * (steps + 1)) as usize);
    for y in 0..=steps {
        for x in 0..=steps {
            coords.push([x as f32 / steps as f32, y as f32 / steps as f32]);
        }
    }
    coords
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub struct ParityProbe {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl ParityProbe {
    pub fn new(power: GpuPowerPreference) -> Result<Self> {
        let (device, queue) = request_headless_device(power, true)?;
        Ok(Self { device, queue })
    }

    /// Evaluates `coords` on the GPU and compares against the CPU evaluator.
    pub fn run(&self, grid: &ControlGrid, tension: f32, coords: &[[f32; 2]]) -> Result<ProbeReport> {
        if coords.is_empty() {
            return Ok(ProbeReport {
                samples: 0,
                max_position_error: 0.0,
                max_color_error: 0.0,
            });
        }
        let dims = grid.dims();
        check_uniform_limit(dims, self.device.limits().max_uniform_buffer_binding_size)?;
        let count = u32::try_from(coords.len()).context("too many probe coordinates")?;

        let module = compile_shader(
            &self.device,
            MeshShader::Probe {
                points: dims.point_count(),
            },
        )
        .context("failed to compile probe shader")?;

        let mut uniforms = GridUniforms::new(dims, tension);
        uniforms.fill(grid);
        uniforms.set_probe_count(count);
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("probe uniforms"),
            contents: &uniforms.to_bytes(),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let padded: Vec<[f32; 4]> = coords.iter().map(|&[u, v]| [u, v, 0.0, 0.0]).collect();
        let coord_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("probe coords"),
            contents: bytemuck::cast_slice(&padded),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let output_size = u64::from(count) * 2 * std::mem::size_of::<[f32; 4]>() as u64;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("probe samples"),
            size: output_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("probe readback"),
            size: output_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("probe layout"),
                entries: &[
                    uniform_layout_entry(wgpu::ShaderStages::COMPUTE),
                    storage_entry(1, true),
                    storage_entry(2, false),
                ],
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("probe bind group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: coord_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: output_buffer.as_entire_binding(),
                },
            ],
        });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("probe pipeline layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("probe pipeline"),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(anyhow!("failed to build probe pipeline: {err}"));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("probe encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("probe pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(count.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&output_buffer, 0, &readback, 0, output_size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let gpu_values = self.read_back(&readback)?;

        let evaluator = PatchEvaluator::new(grid).with_tension(tension);
        let mut report = ProbeReport {
            samples: coords.len(),
            max_position_error: 0.0,
            max_color_error: 0.0,
        };
        for (&[u, v], gpu) in coords.iter().zip(gpu_values.chunks_exact(8)) {
            let cpu = evaluator.evaluate(u, v);
            for axis in 0..2 {
                let error = (cpu.position[axis] - gpu[axis]).abs();
                report.max_position_error = report.max_position_error.max(error);
            }
            for channel in 0..4 {
                let error = (cpu.color[channel] - gpu[4 + channel]).abs();
                report.max_color_error = report.max_color_error.max(error);
            }
        }
        tracing::debug!(
            samples = report.samples,
            position_error = report.max_position_error,
            color_error = report.max_color_error,
            "parity probe finished"
        );
        Ok(report)
    }

    fn read_back(&self, buffer: &wgpu::Buffer) -> Result<Vec<f32>> {
        let bytes = read_buffer(&self.device, buffer).context("failed to read probe results")?;
        Ok(bytes
            .chunks_exact(4)
            .map(|word| f32::from_ne_bytes([word[0], word[1], word[2], word[3]]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridDims;

    fn sample_grid() -> ControlGrid {
        let dims = GridDims::new(4, 3).unwrap();
        let points: Vec<[f32; 2]> = (0..dims.point_count())
            .map(|i| {
                let x = (i % 4) as f32 / 3.0;
                let y = (i / 4) as f32 / 2.0;
                let wobble = if i % 4 != 0 && i % 4 != 3 { 0.07 } else { 0.0 };
                [x + wobble, y - wobble * 0.5]
            })
            .collect();
        let colors: Vec<[f32; 4]> = (0..dims.point_count())
            .map(|i| {
                let t = i as f32 / 11.0;
                [t, 1.0 - t, (t * 3.0).fract(), 1.0]
            })
            .collect();
        ControlGrid::from_points(dims, &points, &colors).unwrap()
    }

    #[test]
    fn probe_coords_cover_both_edges() {
        let coords = probe_coords(4);
        assert_eq!(coords.len(), 25);
        assert_eq!(coords[0], [0.0, 0.0]);
        assert_eq!(coords[24], [1.0, 1.0]);
    }

    #[test]
    fn gpu_matches_cpu_evaluator() {
        let probe = match ParityProbe::new(GpuPowerPreference::Low) {
            Ok(probe) => probe,
            Err(err) => {
                eprintln!("skipping parity probe: {err:#}");
                return;
            }
        };
        let grid = sample_grid();
        let mut coords = probe_coords(24);
        coords.extend([[0.123, 0.987], [0.5, 0.5], [0.999, 0.001]]);
        let report = probe.run(&grid, 0.5, &coords).expect("probe run");
        assert_eq!(report.samples, coords.len());
        assert!(report.within(PROBE_TOLERANCE), "{report:?}");
    }
}
