use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use meshconfig::{parse_surface_size, DriverKind, MeshConfig, PowerSetting};

#[derive(Parser, Debug)]
#[command(
    name = "meshview",
    author,
    version,
    about = "Preview animated bicubic mesh gradients",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub grid: GridArgs,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Options shared by every subcommand; they override the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct GridArgs {
    /// Config file; defaults to `<config dir>/meshview/meshview.toml` when present.
    #[arg(long, value_name = "PATH", global = true, env = "MESHVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Control points per row.
    #[arg(long, value_name = "POINTS", global = true)]
    pub width: Option<u32>,

    /// Control points per column.
    #[arg(long, value_name = "POINTS", global = true)]
    pub height: Option<u32>,

    /// Tessellation steps per cell edge.
    #[arg(long, value_name = "STEPS", global = true)]
    pub subdivisions: Option<u32>,

    /// Catmull-Rom tension (0.5 is the classic spline).
    #[arg(long, value_name = "TENSION", global = true, allow_negative_numbers = true)]
    pub tension: Option<f32>,

    /// Seed for point jitter, palette variance, and animation drivers.
    #[arg(long, value_name = "SEED", global = true)]
    pub seed: Option<u64>,

    /// Random offset applied to interior points of the starting grid (0..=1).
    #[arg(long, value_name = "AMOUNT", global = true)]
    pub point_randomness: Option<f32>,

    /// Adapter preference: `low` or `high`.
    #[arg(long, value_name = "POWER", global = true, value_parser = parse_power)]
    pub power: Option<PowerSetting>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Override the window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Producer frame cap (0 falls back to 60).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Animation driver: `static`, `noise`, or `drift`.
    #[arg(long, value_name = "DRIVER", value_parser = parse_driver)]
    pub driver: Option<DriverKind>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Open the preview window and animate the mesh (the default).
    Run,
    /// Evaluate the starting grid at one UV on the CPU and print JSON.
    Sample(SampleArgs),
    /// Print vertex and index counts for the configured topology as JSON.
    Topology,
    /// Compare the GPU evaluator against the CPU evaluator without a window.
    Probe(ProbeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    #[arg(long, value_parser = parse_unit)]
    pub u: f32,
    #[arg(long, value_parser = parse_unit)]
    pub v: f32,
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Probe samples per axis, minus one.
    #[arg(long, value_name = "STEPS", default_value_t = 32)]
    pub steps: u32,
}

pub fn parse() -> Cli {
    Cli::parse()
}

impl GridArgs {
    pub fn apply(&self, config: &mut MeshConfig) {
        if let Some(width) = self.width {
            config.grid.width = width;
        }
        if let Some(height) = self.height {
            config.grid.height = height;
        }
        if let Some(subdivisions) = self.subdivisions {
            config.grid.subdivisions = subdivisions;
        }
        if let Some(tension) = self.tension {
            config.grid.tension = tension;
        }
        if let Some(seed) = self.seed {
            config.animation.seed = Some(seed);
        }
        if let Some(randomness) = self.point_randomness {
            config.palette.point_randomness = randomness;
        }
        if let Some(power) = self.power {
            config.surface.power = power;
        }
    }
}

impl RunArgs {
    pub fn apply(&self, config: &mut MeshConfig) {
        if let Some((width, height)) = self.size {
            config.surface.size = meshconfig::SurfaceSize { width, height };
        }
        if let Some(fps) = self.fps {
            config.surface.fps = Some(fps);
        }
        if let Some(driver) = self.driver {
            config.animation.driver = driver;
        }
    }
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    parse_surface_size(value)
}

pub fn parse_power(value: &str) -> Result<PowerSetting, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" => Ok(PowerSetting::Low),
        "high" | "high-performance" => Ok(PowerSetting::High),
        other => Err(format!("unknown power preference '{other}'; expected low or high")),
    }
}

pub fn parse_driver(value: &str) -> Result<DriverKind, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("driver must not be empty".to_string());
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "static" | "none" => Ok(DriverKind::Static),
        "noise" | "lava" => Ok(DriverKind::Noise),
        "drift" => Ok(DriverKind::Drift),
        other => Err(format!(
            "unknown driver '{other}'; expected static, noise, or drift"
        )),
    }
}

pub fn parse_unit(value: &str) -> Result<f32, String> {
    let parsed: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(format!("{parsed} is outside [0, 1]"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_driver_aliases() {
        assert_eq!(parse_driver("Noise").unwrap(), DriverKind::Noise);
        assert_eq!(parse_driver("none").unwrap(), DriverKind::Static);
        assert!(parse_driver("").is_err());
        assert!(parse_driver("spin").is_err());
    }

    #[test]
    fn parses_unit_interval() {
        assert_eq!(parse_unit("0.25").unwrap(), 0.25);
        assert!(parse_unit("1.5").is_err());
        assert!(parse_unit("abc").is_err());
    }

    #[test]
    fn flags_override_config_values() {
        let cli = Cli::try_parse_from([
            "meshview",
            "--width",
            "5",
            "--tension",
            "0.3",
            "--driver",
            "drift",
            "--size",
            "640x480",
        ])
        .unwrap();
        let mut config = MeshConfig::default();
        cli.grid.apply(&mut config);
        cli.run.apply(&mut config);
        assert_eq!(config.grid.width, 5);
        assert_eq!(config.grid.height, 4);
        assert_eq!(config.grid.tension, 0.3);
        assert_eq!(config.animation.driver, DriverKind::Drift);
        assert_eq!(config.surface.size.width, 640);
        assert!(cli.command.is_none());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli =
            Cli::try_parse_from(["meshview", "sample", "--u", "0.5", "--v", "0", "--seed", "3"])
                .unwrap();
        assert_eq!(cli.grid.seed, Some(3));
        match cli.command {
            Some(Command::Sample(args)) => {
                assert_eq!(args.u, 0.5);
                assert_eq!(args.v, 0.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
