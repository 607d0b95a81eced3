use std::borrow::Cow;

use anyhow::Result;
use wgpu::naga::ShaderStage;

/// Shader initialization failures. Any of these is fatal for the renderer
/// that hit it: the same source will fail the same way on every retry.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to parse {stage} shader: {message}")]
    Parse {
        stage: &'static str,
        message: String,
    },
    #[error("{stage} shader failed validation: {message}")]
    Validation {
        stage: &'static str,
        message: String,
    },
    #[error("device rejected {stage} shader: {message}")]
    Device {
        stage: &'static str,
        message: String,
    },
}

/// GLSL stages the mesh renderer builds, sized for a specific control grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshShader {
    Vertex { points: usize },
    Fragment,
    Probe { points: usize },
}

impl MeshShader {
    pub fn stage(self) -> ShaderStage {
        match self {
            MeshShader::Vertex { .. } => ShaderStage::Vertex,
            MeshShader::Fragment => ShaderStage::Fragment,
            MeshShader::Probe { .. } => ShaderStage::Compute,
        }
    }

    pub fn stage_name(self) -> &'static str {
        match self {
            MeshShader::Vertex { .. } => "vertex",
            MeshShader::Fragment => "fragment",
            MeshShader::Probe { .. } => "probe",
        }
    }

    pub fn source(self) -> String {
        match self {
            MeshShader::Vertex { points } => {
                format!("{}{PATCH_GLSL}{VERTEX_MAIN}", grid_header(points))
            }
            MeshShader::Fragment => FRAGMENT_GLSL.to_string(),
            MeshShader::Probe { points } => {
                format!(
                    "{}{PROBE_BINDINGS}{PATCH_GLSL}{PROBE_MAIN}",
                    grid_header(points)
                )
            }
        }
    }
}

/// Parses and validates the shader with naga so errors surface as
/// [`ShaderError`] before wgpu ever sees the module.
pub fn validate_shader(shader: MeshShader) -> Result<(), ShaderError> {
    use wgpu::naga::front::glsl::{Frontend, Options};
    use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};

    let source = shader.source();
    let module = Frontend::default()
        .parse(&Options::from(shader.stage()), &source)
        .map_err(|err| ShaderError::Parse {
            stage: shader.stage_name(),
            message: format!("{err:?}"),
        })?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| ShaderError::Validation {
            stage: shader.stage_name(),
            message: format!("{err:?}"),
        })?;
    Ok(())
}

/// Validates then compiles `shader`, catching device-side validation errors
/// through an error scope instead of the uncaptured-error panic handler.
pub(crate) fn compile_shader(device: &wgpu::Device, shader: MeshShader) -> Result<wgpu::ShaderModule> {
    validate_shader(shader)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(shader.stage_name()),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(shader.source()),
            stage: shader.stage(),
            defines: &[],
        },
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(ShaderError::Device {
            stage: shader.stage_name(),
            message: err.to_string(),
        }
        .into());
    }
    tracing::debug!(stage = shader.stage_name(), "compiled mesh shader");
    Ok(module)
}

/// Uniform block shared by every stage. The layout must match
/// [`crate::gpu::uniforms::GridUniforms`]: std140 pads each array element to a
/// vec4, so positions only use `.xy`.
fn grid_header(points: usize) -> String {
    format!(
        r"#version 450

layout(std140, set = 0, binding = 0) uniform ControlGrid {{
    ivec4 dims;
    vec4 params;
    vec4 positions[{points}];
    vec4 colors[{points}];
}} grid;
"
    )
}

/// GPU copy of the patch evaluator. Written separately from the Rust
/// reference on purpose; `gpu::probe` compares the two.
const PATCH_GLSL: &str = r"
const float GRID_SNAP_EPSILON = 1e-5;

float catmull_rom(float p0, float p1, float p2, float p3, float t, float tension) {
    float t2 = t * t;
    float t3 = t2 * t;
    float a = -tension * p0 + (2.0 - tension) * p1 + (tension - 2.0) * p2 + tension * p3;
    float b = 2.0 * tension * p0 + (tension - 3.0) * p1 + (3.0 - 2.0 * tension) * p2 - tension * p3;
    float c = -tension * p0 + tension * p2;
    return a * t3 + b * t2 + c * t + p1;
}

vec2 catmull_rom2(vec2 p0, vec2 p1, vec2 p2, vec2 p3, float t, float tension) {
    return vec2(
        catmull_rom(p0.x, p1.x, p2.x, p3.x, t, tension),
        catmull_rom(p0.y, p1.y, p2.y, p3.y, t, tension));
}

vec4 catmull_rom4(vec4 p0, vec4 p1, vec4 p2, vec4 p3, float t, float tension) {
    return vec4(
        catmull_rom(p0.x, p1.x, p2.x, p3.x, t, tension),
        catmull_rom(p0.y, p1.y, p2.y, p3.y, t, tension),
        catmull_rom(p0.z, p1.z, p2.z, p3.z, t, tension),
        catmull_rom(p0.w, p1.w, p2.w, p3.w, t, tension));
}

int control_index(int x, int y) {
    int cx = clamp(x, 0, grid.dims.x - 1);
    int cy = clamp(y, 0, grid.dims.y - 1);
    return cy * grid.dims.x + cx;
}

float snap_to_grid(float scaled) {
    float nearest = floor(scaled + 0.5);
    return abs(scaled - nearest) <= GRID_SNAP_EPSILON ? nearest : scaled;
}

void evaluate_patch(vec2 uv, out vec2 position, out vec4 color) {
    float tension = grid.params.x;
    float sx = snap_to_grid(uv.x * float(grid.dims.x - 1));
    float sy = snap_to_grid(uv.y * float(grid.dims.y - 1));
    int cx = int(floor(sx));
    int cy = int(floor(sy));
    float lu = sx - floor(sx);
    float lv = sy - floor(sy);

    vec2 row_pos[4];
    vec4 row_col[4];
    for (int i = 0; i < 4; i++) {
        int y = cy - 1 + i;
        int i0 = control_index(cx - 1, y);
        int i1 = control_index(cx, y);
        int i2 = control_index(cx + 1, y);
        int i3 = control_index(cx + 2, y);
        row_pos[i] = catmull_rom2(
            grid.positions[i0].xy, grid.positions[i1].xy,
            grid.positions[i2].xy, grid.positions[i3].xy, lu, tension);
        row_col[i] = catmull_rom4(
            grid.colors[i0], grid.colors[i1], grid.colors[i2], grid.colors[i3], lu, tension);
    }

    position = catmull_rom2(row_pos[0], row_pos[1], row_pos[2], row_pos[3], lv, tension);
    color = catmull_rom4(row_col[0], row_col[1], row_col[2], row_col[3], lv, tension);
}
";

const VERTEX_MAIN: &str = r"
layout(location = 0) in vec2 a_grid_uv;
layout(location = 0) out vec4 v_color;

void main() {
    vec2 position;
    vec4 color;
    evaluate_patch(a_grid_uv, position, color);
    v_color = color;
    // Control points use a top-left origin; clip space is y-up.
    gl_Position = vec4(position.x * 2.0 - 1.0, 1.0 - position.y * 2.0, 0.0, 1.0);
}
";

const FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec4 v_color;
layout(location = 0) out vec4 out_color;

void main() {
    out_color = v_color;
}
";

const PROBE_BINDINGS: &str = r"
layout(local_size_x = 64) in;

layout(std430, set = 0, binding = 1) readonly buffer ProbeCoords {
    vec4 coords[];
} probe;

layout(std430, set = 0, binding = 2) buffer ProbeSamples {
    vec4 values[];
} samples;
";

const PROBE_MAIN: &str = r"
void main() {
    uint index = gl_GlobalInvocationID.x;
    if (index >= uint(grid.dims.z)) {
        return;
    }
    vec2 position;
    vec4 color;
    evaluate_patch(probe.coords[index].xy, position, color);
    samples.values[index * 2u] = vec4(position, 0.0, 0.0);
    samples.values[index * 2u + 1u] = color;
}
";
