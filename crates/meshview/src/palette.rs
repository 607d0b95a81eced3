//! Procedural starting grids: jittered lattices and gradient palettes.

use anyhow::{bail, Result};
use rand::Rng;

/// Built-in 4x4 sunset palette used when the config names no colors.
pub const DEFAULT_PALETTE: [u32; 16] = [
    0xf36e21, 0xf0a92a, 0xe7d043, 0xe7e95d, 0xdff168, 0xb1e192, 0x7fd3a9, 0x5ec6b8, 0x4ab8c2,
    0x4099b9, 0x3b79a8, 0x395b93, 0x36447c, 0x332e66, 0x301e4e, 0x2d1137,
];

pub fn rgb_hex(value: u32) -> [f32; 4] {
    [
        ((value >> 16) & 0xff) as f32 / 255.0,
        ((value >> 8) & 0xff) as f32 / 255.0,
        (value & 0xff) as f32 / 255.0,
        1.0,
    ]
}

pub fn is_border(index: usize, width: u32, height: u32) -> bool {
    let col = index % width as usize;
    let row = index / width as usize;
    row == 0 || row == height as usize - 1 || col == 0 || col == width as usize - 1
}

/// Regular `width`x`height` lattice in `[0, 1]`, with interior points offset
/// by up to `randomness` on each axis. Border points stay on the edges.
pub fn generate_mesh_points<R: Rng>(
    width: u32,
    height: u32,
    randomness: f32,
    rng: &mut R,
) -> Result<Vec<[f32; 2]>> {
    if !(0.0..=1.0).contains(&randomness) {
        bail!("point randomness must be within [0, 1], got {randomness}");
    }
    if width < 2 || height < 2 {
        bail!("mesh must be at least 2x2, got {width}x{height}");
    }
    let count = width as usize * height as usize;
    let points = (0..count)
        .map(|i| {
            let x = (i % width as usize) as f32 / (width - 1) as f32;
            let y = (i / width as usize) as f32 / (height - 1) as f32;
            if is_border(i, width, height) || randomness == 0.0 {
                return [x, y];
            }
            let dx = rng.gen_range(-1.0f32..=1.0) * randomness;
            let dy = rng.gen_range(-1.0f32..=1.0) * randomness;
            [(x + dx).clamp(0.0, 1.0), (y + dy).clamp(0.0, 1.0)]
        })
        .collect();
    Ok(points)
}

/// One base color fills the mesh; two produce a top-to-bottom gradient.
/// `variance` jitters hue by up to ±10° and value by up to ±0.2, scaled.
pub fn generate_mesh_colors<R: Rng>(
    base: &[[f32; 4]],
    width: u32,
    height: u32,
    variance: f32,
    rng: &mut R,
) -> Result<Vec<[f32; 4]>> {
    if base.is_empty() || base.len() > 2 {
        bail!("expected 1 or 2 base colors, got {}", base.len());
    }
    if !(0.0..=1.0).contains(&variance) {
        bail!("color variance must be within [0, 1], got {variance}");
    }
    let count = width as usize * height as usize;
    if base.len() == 1 {
        return Ok(vec![base[0]; count]);
    }

    let (start, end) = (base[0], base[1]);
    let rows = height.saturating_sub(1).max(1) as f32;
    let colors = (0..count)
        .map(|i| {
            let t = (i / width as usize) as f32 / rows;
            let mut color = [0.0; 4];
            for channel in 0..4 {
                color[channel] = start[channel] + (end[channel] - start[channel]) * t;
            }
            if variance > 0.0 {
                jitter_color(color, variance, rng)
            } else {
                color
            }
        })
        .collect();
    Ok(colors)
}

fn jitter_color<R: Rng>(color: [f32; 4], variance: f32, rng: &mut R) -> [f32; 4] {
    let [h, s, v] = rgb_to_hsv([color[0], color[1], color[2]]);
    let hue_shift = rng.gen_range(-1.0f32..=1.0) * 10.0 * variance;
    let value_shift = rng.gen_range(-1.0f32..=1.0) * 0.2 * variance;
    let [r, g, b] = hsv_to_rgb([
        (h + hue_shift).rem_euclid(360.0),
        s,
        (v + value_shift).clamp(0.0, 1.0),
    ]);
    [r, g, b, color[3]]
}

/// Hue in degrees, saturation and value in `[0, 1]`.
pub fn rgb_to_hsv([r, g, b]: [f32; 3]) -> [f32; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let hue = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max <= f32::EPSILON { 0.0 } else { delta / max };
    [hue, saturation, max]
}

pub fn hsv_to_rgb([h, s, v]: [f32; 3]) -> [f32; 3] {
    let c = v * s;
    let sector = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    [r + m, g + m, b + m]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zero_randomness_yields_regular_lattice() {
        let mut rng = StdRng::seed_from_u64(1);
        let points = generate_mesh_points(3, 2, 0.0, &mut rng).unwrap();
        assert_eq!(
            points,
            vec![
                [0.0, 0.0],
                [0.5, 0.0],
                [1.0, 0.0],
                [0.0, 1.0],
                [0.5, 1.0],
                [1.0, 1.0]
            ]
        );
    }

    #[test]
    fn jitter_only_moves_interior_points() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = generate_mesh_points(4, 5, 0.3, &mut rng).unwrap();
        for (i, point) in points.iter().enumerate() {
            let x = (i % 4) as f32 / 3.0;
            let y = (i / 4) as f32 / 4.0;
            if is_border(i, 4, 5) {
                assert_eq!(*point, [x, y]);
            } else {
                assert!((point[0] - x).abs() <= 0.3 + 1e-6);
                assert!((point[1] - y).abs() <= 0.3 + 1e-6);
                assert!((0.0..=1.0).contains(&point[0]));
                assert!((0.0..=1.0).contains(&point[1]));
            }
        }
    }

    #[test]
    fn rejects_out_of_range_randomness() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_mesh_points(4, 4, 1.5, &mut rng).is_err());
    }

    #[test]
    fn single_color_fills_mesh() {
        let mut rng = StdRng::seed_from_u64(1);
        let red = [1.0, 0.0, 0.0, 1.0];
        let colors = generate_mesh_colors(&[red], 3, 3, 0.5, &mut rng).unwrap();
        assert_eq!(colors, vec![red; 9]);
    }

    #[test]
    fn two_colors_form_vertical_gradient() {
        let mut rng = StdRng::seed_from_u64(1);
        let top = [0.0, 0.0, 0.0, 1.0];
        let bottom = [1.0, 1.0, 1.0, 0.5];
        let colors = generate_mesh_colors(&[top, bottom], 2, 3, 0.0, &mut rng).unwrap();
        assert_eq!(colors[0], top);
        assert_eq!(colors[1], top);
        assert_eq!(colors[2], [0.5, 0.5, 0.5, 0.75]);
        assert_eq!(colors[5], bottom);
    }

    #[test]
    fn variance_keeps_colors_in_range_and_alpha_intact() {
        let mut rng = StdRng::seed_from_u64(3);
        let base = [[0.9, 0.2, 0.1, 0.8], [0.1, 0.3, 0.9, 0.8]];
        let colors = generate_mesh_colors(&base, 4, 4, 1.0, &mut rng).unwrap();
        for color in colors {
            assert!(color[..3].iter().all(|c| (-1e-5..=1.0 + 1e-5).contains(c)));
            assert!((color[3] - 0.8).abs() < 1e-6);
        }
    }

    #[test]
    fn hsv_conversion_round_trips_primaries() {
        for rgb in [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.25, 0.5, 0.75]] {
            let back = hsv_to_rgb(rgb_to_hsv(rgb));
            for channel in 0..3 {
                assert!((back[channel] - rgb[channel]).abs() < 1e-5, "{rgb:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn default_palette_decodes() {
        assert_eq!(rgb_hex(0xff8000), [1.0, 128.0 / 255.0, 0.0, 1.0]);
        assert_eq!(DEFAULT_PALETTE.len(), 16);
    }
}
