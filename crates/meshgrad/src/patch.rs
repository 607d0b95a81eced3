//! Bicubic Catmull-Rom patch evaluation on the CPU.
//!
//! This is the reference implementation; the vertex shader in
//! [`crate::compile`] carries an independent GLSL copy of the same snap,
//! clamp, and basis rules, and [`crate::gpu::probe`] checks the two against
//! each other.

use crate::tessellate::TessellatedMesh;
use crate::types::{ControlGrid, GridDims};

pub const DEFAULT_TENSION: f32 = 0.5;

/// Scaled grid coordinates closer than this to an integer are snapped onto it,
/// so control points are reproduced exactly despite `u * (w - 1)` rounding.
pub const GRID_SNAP_EPSILON: f32 = 1e-5;

const CHANNELS: usize = 6;

/// Interpolated position (top-left origin) and straight-alpha color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchSample {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// One-dimensional Catmull-Rom segment between `p1` and `p2`.
pub fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32, tension: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    (-tension * p0 + (2.0 - tension) * p1 + (tension - 2.0) * p2 + tension * p3) * t3
        + (2.0 * tension * p0 + (tension - 3.0) * p1 + (3.0 - 2.0 * tension) * p2 - tension * p3)
            * t2
        + (-tension * p0 + tension * p2) * t
        + p1
}

/// Row-major index of `(x, y)` after clamping both into the grid.
pub fn neighbor_index(dims: GridDims, x: i64, y: i64) -> usize {
    let cx = x.clamp(0, dims.width() as i64 - 1) as u32;
    let cy = y.clamp(0, dims.height() as i64 - 1) as u32;
    dims.index(cx, cy)
}

/// Maps a top-left-origin position in `[0, 1]²` into clip space (y up).
pub fn to_clip_space(position: [f32; 2]) -> [f32; 2] {
    [position[0] * 2.0 - 1.0, 1.0 - position[1] * 2.0]
}

/// Splits a scaled coordinate into its cell and local fraction.
fn split_cell(scaled: f32) -> (i64, f32) {
    let nearest = scaled.round();
    let scaled = if (scaled - nearest).abs() <= GRID_SNAP_EPSILON {
        nearest
    } else {
        scaled
    };
    let cell = scaled.floor();
    (cell as i64, scaled - cell)
}

pub struct PatchEvaluator<'a> {
    grid: &'a ControlGrid,
    tension: f32,
}

impl<'a> PatchEvaluator<'a> {
    pub fn new(grid: &'a ControlGrid) -> Self {
        Self {
            grid,
            tension: DEFAULT_TENSION,
        }
    }

    pub fn with_tension(mut self, tension: f32) -> Self {
        self.tension = tension;
        self
    }

    pub fn tension(&self) -> f32 {
        self.tension
    }

    fn channels(&self, index: usize) -> [f32; CHANNELS] {
        let [x, y] = self.grid.position(index);
        let [r, g, b, a] = self.grid.color(index);
        [x, y, r, g, b, a]
    }

    fn blend(&self, samples: &[[f32; CHANNELS]; 4], t: f32) -> [f32; CHANNELS] {
        std::array::from_fn(|c| {
            catmull_rom(
                samples[0][c],
                samples[1][c],
                samples[2][c],
                samples[3][c],
                t,
                self.tension,
            )
        })
    }

    pub fn evaluate(&self, u: f32, v: f32) -> PatchSample {
        let dims = self.grid.dims();
        let (cx, lu) = split_cell(u * (dims.width() - 1) as f32);
        let (cy, lv) = split_cell(v * (dims.height() - 1) as f32);

        let rows: [[f32; CHANNELS]; 4] = std::array::from_fn(|i| {
            let row = cy - 1 + i as i64;
            let samples: [[f32; CHANNELS]; 4] = std::array::from_fn(|j| {
                self.channels(neighbor_index(dims, cx - 1 + j as i64, row))
            });
            self.blend(&samples, lu)
        });
        let [x, y, r, g, b, a] = self.blend(&rows, lv);

        PatchSample {
            position: [x, y],
            color: [r, g, b, a],
        }
    }

    /// Evaluates every vertex of `mesh`, in the mesh's row-major order.
    pub fn evaluate_mesh(&self, mesh: &TessellatedMesh) -> Vec<PatchSample> {
        mesh.uvs()
            .iter()
            .map(|&[u, v]| self.evaluate(u, v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tessellate::tessellate;

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
    const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
    const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
    const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

    fn corners() -> ControlGrid {
        let dims = GridDims::new(2, 2).unwrap();
        ControlGrid::from_points(
            dims,
            &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            &[RED, GREEN, BLUE, WHITE],
        )
        .unwrap()
    }

    /// Deterministic but irregular grid so pass-through is not trivially linear.
    fn scrambled(width: u32, height: u32) -> ControlGrid {
        let dims = GridDims::new(width, height).unwrap();
        let mut state = 0x2545_f491_u32 ^ (width * 131 + height);
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state % 10_000) as f32 / 10_000.0
        };
        let points: Vec<[f32; 2]> = (0..dims.point_count()).map(|_| [next(), next()]).collect();
        let colors: Vec<[f32; 4]> = (0..dims.point_count())
            .map(|_| [next(), next(), next(), next()])
            .collect();
        ControlGrid::from_points(dims, &points, &colors).unwrap()
    }

    #[test]
    fn basis_hits_endpoints() {
        for tension in [0.0, 0.5, 1.0] {
            assert_eq!(catmull_rom(3.0, -2.0, 7.0, 11.0, 0.0, tension), -2.0);
            assert!((catmull_rom(3.0, -2.0, 7.0, 11.0, 1.0, tension) - 7.0).abs() < 1e-5);
        }
    }

    #[test]
    fn basis_reproduces_straight_lines_at_default_tension() {
        for step in 0..=8 {
            let t = step as f32 / 8.0;
            let value = catmull_rom(0.0, 1.0, 2.0, 3.0, t, DEFAULT_TENSION);
            assert!((value - (1.0 + t)).abs() < 1e-6);
        }
    }

    #[test]
    fn passes_through_every_control_point() {
        for (w, h) in [(2, 2), (3, 2), (2, 5), (4, 4), (5, 7), (7, 3), (9, 9)] {
            let grid = scrambled(w, h);
            let dims = grid.dims();
            let eval = PatchEvaluator::new(&grid);
            for gy in 0..h {
                for gx in 0..w {
                    let u = gx as f32 / (w - 1) as f32;
                    let v = gy as f32 / (h - 1) as f32;
                    let sample = eval.evaluate(u, v);
                    let index = dims.index(gx, gy);
                    assert_eq!(sample.position, grid.position(index), "{w}x{h} at ({gx},{gy})");
                    assert_eq!(sample.color, grid.color(index), "{w}x{h} at ({gx},{gy})");
                }
            }
        }
    }

    #[test]
    fn neighbors_clamp_to_boundary() {
        let dims = GridDims::new(4, 3).unwrap();
        assert_eq!(neighbor_index(dims, -1, -1), 0);
        assert_eq!(neighbor_index(dims, 5, 0), 3);
        assert_eq!(neighbor_index(dims, 2, 9), dims.index(2, 2));
        assert_eq!(neighbor_index(dims, -3, 1), dims.index(0, 1));
        for x in -3..8 {
            for y in -3..7 {
                assert!(neighbor_index(dims, x, y) < dims.point_count());
            }
        }
    }

    #[test]
    fn two_by_two_end_to_end() {
        let grid = corners();
        let mesh = tessellate(2, 2, 4).unwrap();
        assert_eq!((mesh.columns(), mesh.rows()), (5, 5));
        assert_eq!(mesh.vertex_count(), 25);
        assert_eq!(mesh.index_count(), 96);

        let eval = PatchEvaluator::new(&grid);
        let origin = eval.evaluate(0.0, 0.0);
        assert_eq!(origin.position, [0.0, 0.0]);
        assert_eq!(origin.color, RED);

        // With every neighbour clamped the spline degenerates to a bilinear blend.
        let center = eval.evaluate(0.5, 0.5);
        assert_eq!(center.position, [0.5, 0.5]);
        assert_eq!(center.color, [0.5, 0.5, 0.5, 1.0]);

        let samples = eval.evaluate_mesh(&mesh);
        assert_eq!(samples.len(), 25);
        assert_eq!(samples[12], center);
        assert_eq!(samples[24].color, WHITE);
    }

    #[test]
    fn colors_overshoot_without_clamping() {
        let dims = GridDims::new(4, 2).unwrap();
        let black = [0.0, 0.0, 0.0, 1.0];
        let grid = ControlGrid::from_points(
            dims,
            &[
                [0.0, 0.0],
                [0.33, 0.0],
                [0.66, 0.0],
                [1.0, 0.0],
                [0.0, 1.0],
                [0.33, 1.0],
                [0.66, 1.0],
                [1.0, 1.0],
            ],
            &[black, WHITE, black, black, black, WHITE, black, black],
        )
        .unwrap();
        let eval = PatchEvaluator::new(&grid);
        let dip = eval.evaluate(5.0 / 6.0, 0.0);
        assert!(dip.color[0] < 0.0, "expected undershoot, got {:?}", dip.color);
    }

    #[test]
    fn higher_tension_changes_interior_only() {
        let grid = scrambled(4, 4);
        let loose = PatchEvaluator::new(&grid);
        let tight = PatchEvaluator::new(&grid).with_tension(0.0);
        assert_eq!(loose.evaluate(1.0 / 3.0, 2.0 / 3.0), tight.evaluate(1.0 / 3.0, 2.0 / 3.0));
        assert_ne!(loose.evaluate(0.4, 0.45), tight.evaluate(0.4, 0.45));
    }

    #[test]
    fn clip_space_flips_y() {
        assert_eq!(to_clip_space([0.0, 0.0]), [-1.0, 1.0]);
        assert_eq!(to_clip_space([1.0, 1.0]), [1.0, -1.0]);
        assert_eq!(to_clip_space([0.5, 0.5]), [0.0, 0.0]);
    }
}
