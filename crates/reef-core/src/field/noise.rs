//! Gradient (Perlin) noise with a seeded permutation table.

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Clone, Debug)]
pub struct Perlin {
    perm: [u8; 512],
}

impl Perlin {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut base: Vec<u8> = (0..=255).collect();
        base.shuffle(rng);
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = base[i & 255];
        }
        Self { perm }
    }

    fn p(&self, i: usize) -> usize {
        self.perm[i & 511] as usize
    }

    /// Single-octave noise in roughly [-1, 1].
    pub fn noise(&self, x: f64, y: f64) -> f64 {
        let xf = x.floor();
        let yf = y.floor();
        let xi = (xf as i64 & 255) as usize;
        let yi = (yf as i64 & 255) as usize;
        let x = x - xf;
        let y = y - yf;
        let u = fade(x);
        let v = fade(y);

        let a = self.p(xi) + yi;
        let aa = self.p(a);
        let ab = self.p(a + 1);
        let b = self.p(xi + 1) + yi;
        let ba = self.p(b);
        let bb = self.p(b + 1);

        lerp(
            v,
            lerp(u, grad(self.p(aa), x, y), grad(self.p(ba), x - 1.0, y)),
            lerp(
                u,
                grad(self.p(ab), x, y - 1.0),
                grad(self.p(bb), x - 1.0, y - 1.0),
            ),
        )
    }

    /// Sum of `octaves` layers, doubling frequency and scaling amplitude by
    /// `persistence` each time, normalised by the total amplitude.
    pub fn octaves(&self, x: f64, y: f64, octaves: u32, persistence: f64, scale: f64) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = scale;
        let mut max_value = 0.0;
        for _ in 0..octaves {
            value += self.noise(x * frequency, y * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }
        if max_value > 0.0 {
            value / max_value
        } else {
            0.0
        }
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: usize, x: f64, y: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        0.0
    };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}

/// Cubic smoothstep on [0, 1].
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
