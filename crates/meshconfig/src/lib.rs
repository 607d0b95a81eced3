use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Smallest non-zero frame cap accepted in `[surface]`.
pub const MIN_FPS: f32 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Straight-alpha RGBA color written as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(pub [f32; 4]);

impl HexColor {
    pub fn rgba(self) -> [f32; 4] {
        self.0
    }
}

impl TryFrom<String> for HexColor {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        parse_hex_color(&raw).map(HexColor)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        let [r, g, b, a] = color.0.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

pub fn parse_hex_color(raw: &str) -> Result<[f32; 4], String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !(digits.len() == 6 || digits.len() == 8) || !digits.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(format!(
            "invalid color '{raw}'; expected '#rrggbb' or '#rrggbbaa'"
        ));
    }
    let channel = |index: usize| -> Result<f32, String> {
        u8::from_str_radix(&digits[index * 2..index * 2 + 2], 16)
            .map(|value| value as f32 / 255.0)
            .map_err(|err| format!("invalid color '{raw}': {err}"))
    };
    let alpha = if digits.len() == 8 { channel(3)? } else { 1.0 };
    Ok([channel(0)?, channel(1)?, channel(2)?, alpha])
}

/// Window size written as `"WIDTHxHEIGHT"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl TryFrom<String> for SurfaceSize {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        parse_surface_size(&raw).map(|(width, height)| SurfaceSize { width, height })
    }
}

impl From<SurfaceSize> for String {
    fn from(size: SurfaceSize) -> Self {
        format!("{}x{}", size.width, size.height)
    }
}

pub fn parse_surface_size(raw: &str) -> Result<(u32, u32), String> {
    let (width, height) = raw
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{raw}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|err| format!("invalid width in '{raw}': {err}"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|err| format!("invalid height in '{raw}': {err}"))?;
    if width == 0 || height == 0 {
        return Err(format!("size '{raw}' must be non-zero in both dimensions"));
    }
    Ok((width, height))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Submit the initial grid once and leave it.
    Static,
    /// Simplex-noise wobble of interior points.
    #[default]
    Noise,
    /// Interior points periodically ease toward fresh random targets.
    Drift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EasingSetting {
    Linear,
    Smoothstep,
    EaseInOut,
    #[default]
    FastOutSlowIn,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GridSection {
    pub width: u32,
    pub height: u32,
    pub subdivisions: u32,
    pub tension: f32,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            width: 4,
            height: 4,
            subdivisions: 48,
            tension: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SurfaceSection {
    pub size: SurfaceSize,
    pub fps: Option<f32>,
    pub clear_color: HexColor,
    pub power: PowerSetting,
}

impl Default for SurfaceSection {
    fn default() -> Self {
        Self {
            size: SurfaceSize {
                width: 960,
                height: 640,
            },
            fps: None,
            clear_color: HexColor([0.0, 0.0, 0.0, 1.0]),
            power: PowerSetting::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PaletteSection {
    /// Empty means "use the built-in palette".
    pub colors: Vec<HexColor>,
    pub variance: f32,
    pub point_randomness: f32,
}

impl Default for PaletteSection {
    fn default() -> Self {
        Self {
            colors: Vec::new(),
            variance: 0.1,
            point_randomness: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnimationSection {
    pub driver: DriverKind,
    pub seed: Option<u64>,
    pub speed: f32,
    pub intensity: f32,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub period: Duration,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub duration: Duration,
    pub easing: EasingSetting,
}

impl Default for AnimationSection {
    fn default() -> Self {
        Self {
            driver: DriverKind::default(),
            seed: None,
            speed: 0.3,
            intensity: 0.2,
            period: Duration::from_secs(3),
            duration: Duration::from_secs(2),
            easing: EasingSetting::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MeshConfig {
    pub version: u32,
    #[serde(default)]
    pub grid: GridSection,
    #[serde(default)]
    pub surface: SurfaceSection,
    #[serde(default)]
    pub palette: PaletteSection,
    #[serde(default)]
    pub animation: AnimationSection,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            version: 1,
            grid: GridSection::default(),
            surface: SurfaceSection::default(),
            palette: PaletteSection::default(),
            animation: AnimationSection::default(),
        }
    }
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() || v.is_infinite() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl MeshConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: MeshConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn point_count(&self) -> usize {
        self.grid.width as usize * self.grid.height as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let grid = &self.grid;
        if grid.width < 2 || grid.height < 2 {
            return Err(ConfigError::Invalid(format!(
                "grid must be at least 2x2, got {}x{}",
                grid.width, grid.height
            )));
        }
        if grid.subdivisions < 1 {
            return Err(ConfigError::Invalid(
                "grid.subdivisions must be at least 1".into(),
            ));
        }
        if !grid.tension.is_finite() {
            return Err(ConfigError::Invalid("grid.tension must be finite".into()));
        }

        if let Some(fps) = self.surface.fps {
            if !fps.is_finite() || fps < 0.0 || (fps > 0.0 && fps < MIN_FPS) {
                return Err(ConfigError::Invalid(format!(
                    "surface.fps must be 0 (uncapped) or at least {MIN_FPS}, got {fps}"
                )));
            }
        }

        let palette = &self.palette;
        let colors = palette.colors.len();
        if colors > 2 && colors != self.point_count() {
            return Err(ConfigError::Invalid(format!(
                "palette.colors must hold 1-2 base colors or exactly {} per-point colors, got {colors}",
                self.point_count()
            )));
        }
        for (name, value) in [
            ("palette.variance", palette.variance),
            ("palette.point_randomness", palette.point_randomness),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let animation = &self.animation;
        for (name, value) in [
            ("animation.speed", animation.speed),
            ("animation.intensity", animation.intensity),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be >= 0")));
            }
        }
        if animation.driver == DriverKind::Drift && animation.period.is_zero() {
            return Err(ConfigError::Invalid(
                "animation.period must be greater than zero for the drift driver".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
version = 1

[grid]
width = 4
height = 3
subdivisions = 32
tension = 0.5

[surface]
size = "1280x720"
fps = 30
clear_color = "#101820"
power = "high"

[palette]
colors = ["#f36e21", "#2d1137cc"]
variance = 0.2
point_randomness = 0.1

[animation]
driver = "drift"
seed = 42
period = "4s"
duration = 1.5
easing = "ease-in-out"
"##;

    #[test]
    fn parses_sample_config() {
        let config = MeshConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.grid.width, 4);
        assert_eq!(config.grid.subdivisions, 32);
        assert_eq!(
            config.surface.size,
            SurfaceSize {
                width: 1280,
                height: 720
            }
        );
        assert_eq!(config.surface.fps, Some(30.0));
        assert_eq!(config.surface.power, PowerSetting::High);
        assert_eq!(config.palette.colors.len(), 2);
        assert!((config.palette.colors[1].rgba()[3] - 0.8).abs() < 1e-6);
        assert_eq!(config.animation.driver, DriverKind::Drift);
        assert_eq!(config.animation.seed, Some(42));
        assert_eq!(config.animation.period, Duration::from_secs(4));
        assert_eq!(config.animation.duration, Duration::from_millis(1500));
        assert_eq!(config.animation.easing, EasingSetting::EaseInOut);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = MeshConfig::from_toml_str("version = 1\n").unwrap();
        assert_eq!(config, MeshConfig::default());
        assert_eq!(config.grid.subdivisions, 48);
        assert_eq!(config.animation.driver, DriverKind::Noise);
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = MeshConfig::from_toml_str("version = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_degenerate_grid() {
        let err = MeshConfig::from_toml_str("version = 1\n[grid]\nwidth = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = MeshConfig::from_toml_str("version = 1\n[grid]\nsubdivisions = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_colors_and_sizes() {
        let err = MeshConfig::from_toml_str("version = 1\n[palette]\ncolors = [\"#12345\"]\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err =
            MeshConfig::from_toml_str("version = 1\n[surface]\nsize = \"wide\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn palette_must_match_grid_when_per_point() {
        let err = MeshConfig::from_toml_str(
            "version = 1\n[grid]\nwidth = 2\nheight = 2\n[palette]\ncolors = [\"#ff0000\", \"#00ff00\", \"#0000ff\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = MeshConfig::from_toml_str(
            "version = 1\n[grid]\nwidth = 2\nheight = 2\n[palette]\ncolors = [\"#ff0000\", \"#00ff00\", \"#0000ff\", \"#ffffff\"]\n",
        )
        .unwrap();
        assert_eq!(config.palette.colors[2].rgba(), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = MeshConfig::from_toml_str("version = 1\n[palette]\nvariance = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = MeshConfig::from_toml_str("version = 1\n[animation]\nspeed = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = MeshConfig::from_toml_str(
            "version = 1\n[animation]\ndriver = \"drift\"\nperiod = 0\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err =
            MeshConfig::from_toml_str("version = 1\n[animation]\nduration = -2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_vanishing_frame_caps() {
        let err = MeshConfig::from_toml_str("version = 1\n[surface]\nfps = 1e-30\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let config = MeshConfig::from_toml_str("version = 1\n[surface]\nfps = 0\n").unwrap();
        assert_eq!(config.surface.fps, Some(0.0));
    }

    #[test]
    fn hex_colors_round_trip_through_strings() {
        assert_eq!(parse_hex_color("#ff8000").unwrap(), [1.0, 128.0 / 255.0, 0.0, 1.0]);
        assert_eq!(String::from(HexColor([1.0, 0.0, 0.0, 1.0])), "#ff0000");
        assert_eq!(String::from(HexColor([0.0, 0.0, 0.0, 0.0])), "#00000000");
        assert!(parse_hex_color("ff00zz").is_err());
    }

    #[test]
    fn load_reports_missing_files() {
        let err = MeshConfig::load(Path::new("/nonexistent/meshview.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
