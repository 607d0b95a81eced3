/// Floats per control-point position (`x`, `y`).
pub const POSITION_COMPONENTS: usize = 2;
/// Floats per control-point color (`r`, `g`, `b`, `a`).
pub const COLOR_COMPONENTS: usize = 4;

/// Validation failures raised before any renderer or animation state changes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("grid must be at least 2x2, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("subdivision must be at least 1, got {0}")]
    InvalidSubdivision(u32),
    #[error("{what} array must hold {expected} floats, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("control point index {index} out of range for {len} points")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("tessellating a {width}x{height} grid at subdivision {subdivisions} overflows 32-bit indices")]
    TopologyTooLarge {
        width: u32,
        height: u32,
        subdivisions: u32,
    },
    #[error("grid has {points} control points but the device uniform limit allows {max}")]
    GridTooLarge { points: usize, max: usize },
}

/// Adapter selection hint forwarded to wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}

impl GpuPowerPreference {
    pub fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Validated control-grid dimensions (both axes at least 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridDims {
    width: u32,
    height: u32,
}

impl GridDims {
    pub fn new(width: u32, height: u32) -> Result<Self, MeshError> {
        if width < 2 || height < 2 {
            return Err(MeshError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn point_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn position_len(&self) -> usize {
        self.point_count() * POSITION_COMPONENTS
    }

    pub fn color_len(&self) -> usize {
        self.point_count() * COLOR_COMPONENTS
    }

    /// Row-major index of `(x, y)`; callers are expected to pass in-range values.
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Checks both flat arrays against this grid without touching any state.
    pub fn check_lengths(&self, positions: &[f32], colors: &[f32]) -> Result<(), MeshError> {
        if positions.len() != self.position_len() {
            return Err(MeshError::LengthMismatch {
                what: "positions",
                expected: self.position_len(),
                actual: positions.len(),
            });
        }
        if colors.len() != self.color_len() {
            return Err(MeshError::LengthMismatch {
                what: "colors",
                expected: self.color_len(),
                actual: colors.len(),
            });
        }
        Ok(())
    }
}

/// The authoritative W×H lattice of control positions and straight-alpha colors.
///
/// Positions use a top-left origin with `y` growing downward, matching how
/// most UI toolkits hand points to the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlGrid {
    dims: GridDims,
    positions: Vec<f32>,
    colors: Vec<f32>,
}

impl ControlGrid {
    pub fn new(dims: GridDims, positions: Vec<f32>, colors: Vec<f32>) -> Result<Self, MeshError> {
        dims.check_lengths(&positions, &colors)?;
        Ok(Self {
            dims,
            positions,
            colors,
        })
    }

    /// Builds a grid from per-point pairs and RGBA quads.
    pub fn from_points(
        dims: GridDims,
        points: &[[f32; 2]],
        colors: &[[f32; 4]],
    ) -> Result<Self, MeshError> {
        let positions: Vec<f32> = points.iter().flatten().copied().collect();
        let colors: Vec<f32> = colors.iter().flatten().copied().collect();
        Self::new(dims, positions, colors)
    }

    /// Evenly spaced lattice covering the unit square, every point opaque white.
    pub fn lattice(dims: GridDims) -> Self {
        let mut positions = Vec::with_capacity(dims.position_len());
        for y in 0..dims.height() {
            for x in 0..dims.width() {
                positions.push(x as f32 / (dims.width() - 1) as f32);
                positions.push(y as f32 / (dims.height() - 1) as f32);
            }
        }
        Self {
            dims,
            positions,
            colors: vec![1.0; dims.color_len()],
        }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    pub fn position(&self, index: usize) -> [f32; 2] {
        let base = index * POSITION_COMPONENTS;
        [self.positions[base], self.positions[base + 1]]
    }

    pub fn color(&self, index: usize) -> [f32; 4] {
        let base = index * COLOR_COMPONENTS;
        [
            self.colors[base],
            self.colors[base + 1],
            self.colors[base + 2],
            self.colors[base + 3],
        ]
    }

    pub(crate) fn buffers_mut(&mut self) -> (&mut Vec<f32>, &mut Vec<f32>) {
        (&mut self.positions, &mut self.colors)
    }
}
