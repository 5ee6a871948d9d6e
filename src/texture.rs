use glam::Vec2;
use image::{DynamicImage, GenericImageView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Linear,
    Srgb,
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub trait TextureFilter {
    fn triangle(&self, uv: Vec2, space: ColorSpace) -> [f32; 4];

    // falls back to a handful of triangle taps across the footprint ellipse's bounding box
    fn ewa(&self, uv: Vec2, duv_dx: Vec2, duv_dy: Vec2, space: ColorSpace) -> [f32; 4] {
        let major = duv_dx.length().max(duv_dy.length()).max(1e-6);
        let samples = (major * self.dimensions().0 as f32).clamp(1.0, 8.0) as u32;
        let mut accum = [0.0f32; 4];
        for i in 0..samples {
            let t = (i as f32 + 0.5) / samples as f32 - 0.5;
            let sample_uv = uv + duv_dx * t + duv_dy * t;
            let tap = self.triangle(sample_uv, space);
            for c in 0..4 {
                accum[c] += tap[c];
            }
        }
        for c in accum.iter_mut() {
            *c /= samples as f32;
        }
        accum
    }

    fn dimensions(&self) -> (u32, u32);
}

pub struct ImageTexture {
    image: DynamicImage,
}

impl ImageTexture {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }
}

impl TextureFilter for ImageTexture {
    fn triangle(&self, uv: Vec2, space: ColorSpace) -> [f32; 4] {
        let (w, h) = self.image.dimensions();
        if w == 0 || h == 0 {
            return [0.0, 0.0, 0.0, 1.0];
        }
        let u = uv.x.rem_euclid(1.0) * w as f32 - 0.5;
        let v = uv.y.rem_euclid(1.0) * h as f32 - 0.5;

        let x0 = u.floor();
        let y0 = v.floor();
        let fx = u - x0;
        let fy = v - y0;

        let wrap = |x: i64, limit: u32| -> u32 { x.rem_euclid(limit as i64) as u32 };
        let sample = |px: u32, py: u32| -> [f32; 4] {
            let p = self.image.get_pixel(px, py);
            [
                p[0] as f32 / 255.0,
                p[1] as f32 / 255.0,
                p[2] as f32 / 255.0,
                p[3] as f32 / 255.0,
            ]
        };

        let x0i = wrap(x0 as i64, w);
        let x1i = wrap(x0 as i64 + 1, w);
        let y0i = wrap(y0 as i64, h);
        let y1i = wrap(y0 as i64 + 1, h);

        let c00 = sample(x0i, y0i);
        let c10 = sample(x1i, y0i);
        let c01 = sample(x0i, y1i);
        let c11 = sample(x1i, y1i);

        let mut out = [0.0f32; 4];
        for c in 0..4 {
            let top = c00[c] * (1.0 - fx) + c10[c] * fx;
            let bottom = c01[c] * (1.0 - fx) + c11[c] * fx;
            let mut v = top * (1.0 - fy) + bottom * fy;
            if space == ColorSpace::Srgb && c < 3 {
                v = srgb_to_linear(v);
            }
            out[c] = v;
        }
        out
    }

    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
