use std::f32::consts::PI;

use crate::graph::FilterKind;

/// Second-order section with RBJ cookbook coefficients, transposed direct form II.
///
/// Parameters are cached so coefficients are only recomputed when a value
/// actually changes.
#[derive(Clone, Debug)]
pub struct Biquad {
    kind: FilterKind,
    sample_rate: f32,
    params: Option<(f32, f32, f32)>,
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    pub fn new(kind: FilterKind, sample_rate: f32) -> Self {
        Self {
            kind,
            sample_rate,
            params: None,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn with_params(kind: FilterKind, sample_rate: f32, fc: f32, q: f32, gain_db: f32) -> Self {
        let mut biquad = Self::new(kind, sample_rate);
        biquad.set_params(fc, q, gain_db);
        biquad
    }

    pub const fn kind(&self) -> FilterKind {
        self.kind
    }

    #[inline]
    pub fn set_params(&mut self, fc: f32, q: f32, gain_db: f32) {
        let params = (fc, q, gain_db);
        if self.params == Some(params) {
            return;
        }
        self.params = Some(params);
        self.update_coefficients(fc, q, gain_db);
    }

    pub const fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.b0.mul_add(input, self.z1);
        self.z1 = self.b1.mul_add(input, self.a1.mul_add(-output, self.z2));
        self.z2 = self.b2.mul_add(input, -self.a2 * output);
        output
    }

    fn update_coefficients(&mut self, fc: f32, q: f32, gain_db: f32) {
        let w0 = 2.0 * PI * fc / self.sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a = 10f32.powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match self.kind {
            FilterKind::Lowpass => {
                let k = 1.0 - cos_w0;
                (k / 2.0, k, k / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterKind::Highpass => {
                let k = 1.0 + cos_w0;
                (k / 2.0, -k, k / 2.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            // Constant 0 dB peak gain.
            FilterKind::Bandpass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterKind::Notch => (
                1.0,
                -2.0 * cos_w0,
                1.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterKind::Peak => (
                alpha.mul_add(a, 1.0),
                -2.0 * cos_w0,
                (-alpha).mul_add(a, 1.0),
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterKind::Lowshelf => {
                let beta = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a - 1.0).mul_add(-cos_w0, a + 1.0) + beta),
                    2.0 * a * (a + 1.0).mul_add(-cos_w0, a - 1.0),
                    a * ((a - 1.0).mul_add(-cos_w0, a + 1.0) - beta),
                    (a - 1.0).mul_add(cos_w0, a + 1.0) + beta,
                    -2.0 * (a + 1.0).mul_add(cos_w0, a - 1.0),
                    (a - 1.0).mul_add(cos_w0, a + 1.0) - beta,
                )
            }
            FilterKind::Highshelf => {
                let beta = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a - 1.0).mul_add(cos_w0, a + 1.0) + beta),
                    -2.0 * a * (a + 1.0).mul_add(cos_w0, a - 1.0),
                    a * ((a - 1.0).mul_add(cos_w0, a + 1.0) - beta),
                    (a - 1.0).mul_add(-cos_w0, a + 1.0) + beta,
                    2.0 * (a + 1.0).mul_add(-cos_w0, a - 1.0),
                    (a - 1.0).mul_add(-cos_w0, a + 1.0) - beta,
                )
            }
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }
}
