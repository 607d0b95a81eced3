use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const GRAD2: [[f32; 2]; 12] = [
    [1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [-1.0, -1.0],
    [1.0, 0.0],
    [-1.0, 0.0],
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [0.0, 1.0],
    [0.0, -1.0],
];

/// Skew factor `(sqrt(3) - 1) / 2`.
const F2: f32 = 0.366_025_4;
/// Unskew factor `(3 - sqrt(3)) / 6`.
const G2: f32 = 0.211_324_87;

/// 2D simplex noise over a seeded permutation table.
///
/// Each instance owns its table, so two drivers with the same seed produce
/// the same field and nothing is shared between them.
#[derive(Clone)]
pub struct SimplexNoise {
    perm: [u8; 512],
}

impl SimplexNoise {
    pub fn new(seed: u64) -> Self {
        let mut table: Vec<u8> = (0..=255).collect();
        table.shuffle(&mut StdRng::seed_from_u64(seed));
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { perm }
    }

    fn gradient(&self, i: usize, j: usize) -> [f32; 2] {
        let index = self.perm[i + self.perm[j] as usize] as usize % 12;
        GRAD2[index]
    }

    /// Noise at `(x, y)`, roughly in `[-1, 1]`.
    pub fn noise2(&self, x: f32, y: f32) -> f32 {
        let s = (x + y) * F2;
        let i = (x + s).floor();
        let j = (y + s).floor();
        let t = (i + j) * G2;
        let x0 = x - (i - t);
        let y0 = y - (j - t);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - i1 as f32 + G2;
        let y1 = y0 - j1 as f32 + G2;
        let x2 = x0 - 1.0 + 2.0 * G2;
        let y2 = y0 - 1.0 + 2.0 * G2;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;

        let corner = |gradient: [f32; 2], dx: f32, dy: f32| {
            let falloff = 0.5 - dx * dx - dy * dy;
            if falloff < 0.0 {
                0.0
            } else {
                let falloff = falloff * falloff;
                falloff * falloff * (gradient[0] * dx + gradient[1] * dy)
            }
        };

        let n0 = corner(self.gradient(ii, jj), x0, y0);
        let n1 = corner(self.gradient(ii + i1, jj + j1), x1, y1);
        let n2 = corner(self.gradient(ii + 1, jj + 1), x2, y2);

        70.0 * (n0 + n1 + n2)
    }
}

impl std::fmt::Debug for SimplexNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimplexNoise").finish_non_exhaustive()
    }
}
