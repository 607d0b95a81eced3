use bytemuck::{Pod, Zeroable};

use crate::types::{ControlGrid, GridDims};

/// Fixed prefix of the `ControlGrid` uniform block.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct GridUniformHeader {
    /// `(width, height, probe count, 0)`.
    pub dims: [i32; 4],
    /// `x` is the spline tension.
    pub params: [f32; 4],
}

unsafe impl Zeroable for GridUniformHeader {}
unsafe impl Pod for GridUniformHeader {}

pub(crate) const HEADER_SIZE: u64 = std::mem::size_of::<GridUniformHeader>() as u64;

/// Bytes of one std140 array element.
const ELEMENT_SIZE: u64 = 16;

/// CPU mirror of the uniform block; `data` holds `positions[N]` then `colors[N]`.
pub(crate) struct GridUniforms {
    header: GridUniformHeader,
    data: Vec<[f32; 4]>,
}

impl GridUniforms {
    pub fn new(dims: GridDims, tension: f32) -> Self {
        Self {
            header: GridUniformHeader {
                dims: [dims.width() as i32, dims.height() as i32, 0, 0],
                params: [tension, 0.0, 0.0, 0.0],
            },
            data: vec![[0.0; 4]; dims.point_count() * 2],
        }
    }

    /// Total block size for a grid of `points` control points.
    pub fn byte_len(points: usize) -> u64 {
        HEADER_SIZE + 2 * points as u64 * ELEMENT_SIZE
    }

    pub fn len_bytes(&self) -> u64 {
        HEADER_SIZE + self.data.len() as u64 * ELEMENT_SIZE
    }

    pub fn set_probe_count(&mut self, count: u32) {
        self.header.dims[2] = count as i32;
    }

    pub fn header(&self) -> &GridUniformHeader {
        &self.header
    }

    /// Refreshes the mirror from `grid` without reallocating.
    pub fn fill(&mut self, grid: &ControlGrid) {
        let points = grid.dims().point_count();
        debug_assert_eq!(self.data.len(), points * 2);
        let (positions, colors) = self.data.split_at_mut(points);
        for (slot, xy) in positions.iter_mut().zip(grid.positions().chunks_exact(2)) {
            *slot = [xy[0], xy[1], 0.0, 0.0];
        }
        for (slot, rgba) in colors.iter_mut().zip(grid.colors().chunks_exact(4)) {
            *slot = [rgba[0], rgba[1], rgba[2], rgba[3]];
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(&self.header));
        queue.write_buffer(buffer, HEADER_SIZE, bytemuck::cast_slice(&self.data));
    }

    /// Whole block as one contiguous byte vector, for buffer initialisation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len_bytes() as usize);
        bytes.extend_from_slice(bytemuck::bytes_of(&self.header));
        bytes.extend_from_slice(bytemuck::cast_slice(&self.data));
        bytes
    }
}
