use anyhow::{bail, Context, Result};
use meshconfig::{MeshConfig, PowerSetting};
use meshgrad::gpu::probe::probe_coords;
use meshgrad::gpu::PROBE_TOLERANCE;
use meshgrad::{
    tessellate, AnimationState, ControlGrid, FramePacer, GpuPowerPreference, GridDims,
    ParityProbe, PatchEvaluator, RendererOptions, SystemTimeSource, TimeSource, ViewerConfig,
    WindowRuntime,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ProbeArgs, SampleArgs};
use crate::drivers::{build_driver, DriverSettings};
use crate::palette::{generate_mesh_colors, generate_mesh_points, rgb_hex, DEFAULT_PALETTE};
use crate::paths::AppPaths;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let mut config = load_config(&cli)?;
    cli.grid.apply(&mut config);
    cli.run.apply(&mut config);
    config
        .validate()
        .context("invalid configuration after applying command-line overrides")?;

    match cli.command {
        None | Some(Command::Run) => run_preview(&config),
        Some(Command::Sample(args)) => print_sample(&config, &args),
        Some(Command::Topology) => print_topology(&config),
        Some(Command::Probe(args)) => run_probe(&config, &args),
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Stdout carries JSON output for the inspection subcommands.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<MeshConfig> {
    if let Some(path) = cli.grid.config.as_ref() {
        let config = MeshConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded meshview config");
        return Ok(config);
    }

    let paths = AppPaths::discover()?;
    let path = paths.config_file();
    if path.is_file() {
        let config = MeshConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded meshview config");
        Ok(config)
    } else {
        tracing::debug!(path = %path.display(), "no config file found; using defaults");
        Ok(MeshConfig::default())
    }
}

fn resolve_seed(config: &MeshConfig) -> u64 {
    config.animation.seed.unwrap_or_else(rand::random)
}

fn power_preference(power: PowerSetting) -> GpuPowerPreference {
    match power {
        PowerSetting::Low => GpuPowerPreference::Low,
        PowerSetting::High => GpuPowerPreference::High,
    }
}

fn renderer_options(config: &MeshConfig) -> RendererOptions {
    RendererOptions {
        subdivisions: config.grid.subdivisions,
        tension: config.grid.tension,
        clear_color: config.surface.clear_color.rgba(),
        power: power_preference(config.surface.power),
    }
}

/// Starting grid and the base positions the drivers orbit around.
pub fn build_initial_grid(
    config: &MeshConfig,
    rng: &mut StdRng,
) -> Result<(ControlGrid, Vec<[f32; 2]>)> {
    let (width, height) = (config.grid.width, config.grid.height);
    let dims = GridDims::new(width, height)?;
    let points = generate_mesh_points(width, height, config.palette.point_randomness, rng)?;

    let configured: Vec<[f32; 4]> = config.palette.colors.iter().map(|c| c.rgba()).collect();
    let colors = if configured.len() == dims.point_count() {
        configured
    } else if !configured.is_empty() {
        generate_mesh_colors(&configured, width, height, config.palette.variance, rng)?
    } else if DEFAULT_PALETTE.len() == dims.point_count() {
        DEFAULT_PALETTE.iter().map(|&hex| rgb_hex(hex)).collect()
    } else {
        let ends = [rgb_hex(DEFAULT_PALETTE[0]), rgb_hex(DEFAULT_PALETTE[15])];
        generate_mesh_colors(&ends, width, height, config.palette.variance, rng)?
    };

    let grid = ControlGrid::from_points(dims, &points, &colors)?;
    Ok((grid, points))
}

fn run_preview(config: &MeshConfig) -> Result<()> {
    let seed = resolve_seed(config);
    let mut rng = StdRng::seed_from_u64(seed);
    let (grid, base) = build_initial_grid(config, &mut rng)?;
    let (width, height) = (config.grid.width, config.grid.height);

    let viewer = ViewerConfig {
        title: format!("meshview {width}x{height}"),
        size: (config.surface.size.width, config.surface.size.height),
        visible: true,
        renderer: renderer_options(config),
    };
    let (runtime, submitter) =
        WindowRuntime::spawn(viewer, grid.clone()).context("failed to open preview window")?;

    let settings = DriverSettings {
        kind: config.animation.driver,
        seed,
        speed: config.animation.speed,
        intensity: config.animation.intensity,
        period: config.animation.period,
        duration: config.animation.duration,
        easing: config.animation.easing,
    };
    let mut driver = build_driver(&settings, width, height, base);
    let mut state = AnimationState::new(&grid);
    let mut pacer = FramePacer::new(config.surface.fps);
    let mut clock = SystemTimeSource::new();
    tracing::info!(
        driver = driver.name(),
        seed,
        width,
        height,
        subdivisions = config.grid.subdivisions,
        interval_ms = pacer.interval().as_secs_f32() * 1000.0,
        "starting mesh preview"
    );

    while !runtime.is_closed() {
        let sample = clock.sample();
        driver.step(&mut state, &sample)?;
        state.tick(sample.instant);
        if state.has_changes() {
            let (positions, colors) = state.snapshot();
            submitter.submit(positions, colors)?;
        }
        pacer.wait();
    }

    let stats = submitter.stats();
    tracing::info!(
        submitted = stats.submitted,
        applied = stats.applied,
        "preview closed"
    );
    runtime.shutdown()
}

#[derive(Debug, Serialize)]
struct SampleOutput {
    u: f32,
    v: f32,
    tension: f32,
    position: [f32; 2],
    color: [f32; 4],
}

fn print_sample(config: &MeshConfig, args: &SampleArgs) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(resolve_seed(config));
    let (grid, _) = build_initial_grid(config, &mut rng)?;
    let sample = PatchEvaluator::new(&grid)
        .with_tension(config.grid.tension)
        .evaluate(args.u, args.v);
    let output = SampleOutput {
        u: args.u,
        v: args.v,
        tension: config.grid.tension,
        position: sample.position,
        color: sample.color,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct TopologyOutput {
    width: u32,
    height: u32,
    subdivisions: u32,
    columns: u32,
    rows: u32,
    vertices: usize,
    indices: usize,
    triangles: usize,
}

fn print_topology(config: &MeshConfig) -> Result<()> {
    let grid = &config.grid;
    let mesh = tessellate(grid.width, grid.height, grid.subdivisions)?;
    let output = TopologyOutput {
        width: grid.width,
        height: grid.height,
        subdivisions: grid.subdivisions,
        columns: mesh.columns(),
        rows: mesh.rows(),
        vertices: mesh.vertex_count(),
        indices: mesh.index_count(),
        triangles: mesh.index_count() / 3,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct ProbeOutput {
    samples: usize,
    max_position_error: f32,
    max_color_error: f32,
    tolerance: f32,
    passed: bool,
}

fn run_probe(config: &MeshConfig, args: &ProbeArgs) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(resolve_seed(config));
    let (grid, _) = build_initial_grid(config, &mut rng)?;
    let probe = ParityProbe::new(power_preference(config.surface.power))
        .context("failed to initialise GPU for the parity probe")?;
    let report = probe.run(&grid, config.grid.tension, &probe_coords(args.steps))?;
    let output = ProbeOutput {
        samples: report.samples,
        max_position_error: report.max_position_error,
        max_color_error: report.max_color_error,
        tolerance: PROBE_TOLERANCE,
        passed: report.within(PROBE_TOLERANCE),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    if !output.passed {
        bail!(
            "GPU evaluator diverges from CPU evaluator (position {:.2e}, color {:.2e})",
            report.max_position_error,
            report.max_color_error
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshconfig::HexColor;

    #[test]
    fn default_grid_uses_builtin_palette() {
        let config = MeshConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let (grid, base) = build_initial_grid(&config, &mut rng).unwrap();
        assert_eq!(base.len(), 16);
        assert_eq!(grid.color(0), rgb_hex(DEFAULT_PALETTE[0]));
        assert_eq!(grid.color(15), rgb_hex(DEFAULT_PALETTE[15]));
        assert_eq!(grid.position(5), [1.0 / 3.0, 1.0 / 3.0]);
    }

    #[test]
    fn other_sizes_fall_back_to_gradient() {
        let mut config = MeshConfig::default();
        config.grid.width = 3;
        config.grid.height = 2;
        config.palette.variance = 0.0;
        let mut rng = StdRng::seed_from_u64(1);
        let (grid, _) = build_initial_grid(&config, &mut rng).unwrap();
        assert_eq!(grid.color(0), rgb_hex(DEFAULT_PALETTE[0]));
        let last = rgb_hex(DEFAULT_PALETTE[15]);
        for (actual, expected) in grid.color(5).iter().zip(last) {
            assert!((actual - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn per_point_colors_are_used_verbatim() {
        let mut config = MeshConfig::default();
        config.grid.width = 2;
        config.grid.height = 2;
        config.palette.colors = vec![
            HexColor([1.0, 0.0, 0.0, 1.0]),
            HexColor([0.0, 1.0, 0.0, 1.0]),
            HexColor([0.0, 0.0, 1.0, 1.0]),
            HexColor([1.0, 1.0, 1.0, 0.5]),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let (grid, _) = build_initial_grid(&config, &mut rng).unwrap();
        assert_eq!(grid.color(3), [1.0, 1.0, 1.0, 0.5]);
    }
}
