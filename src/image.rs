use glam::Vec3;
use parking_lot::Mutex;

#[derive(Clone)]
pub struct PrivateImage {
    pub width: u32,
    pub height: u32,
    pixels: Vec<Vec3>,
}

impl PrivateImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec3::ZERO; (width * height) as usize],
        }
    }

    #[inline]
    pub fn add(&mut self, x: u32, y: u32, color: Vec3) {
        let idx = (y * self.width + x) as usize;
        self.pixels[idx] += color;
    }

    #[inline]
    pub fn add_index(&mut self, index: usize, color: Vec3) {
        self.pixels[index] += color;
    }

    pub fn clear(&mut self) {
        for p in self.pixels.iter_mut() {
            *p = Vec3::ZERO;
        }
    }

    pub fn pixels(&self) -> &[Vec3] {
        &self.pixels
    }
}

pub struct SharedImage {
    width: u32,
    height: u32,
    inner: Mutex<Vec<Vec3>>,
}

impl SharedImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            inner: Mutex::new(vec![Vec3::ZERO; (width * height) as usize]),
        }
    }

    pub fn merge(&self, private: &PrivateImage) {
        let mut shared = self.inner.lock();
        for (dst, src) in shared.iter_mut().zip(private.pixels().iter()) {
            *dst += *src;
        }
    }

    pub fn normalize(&self, divisor: f32) -> Vec<Vec3> {
        let shared = self.inner.lock();
        let inv = 1.0 / divisor.max(1.0);
        shared.iter().map(|&c| c * inv).collect()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

pub fn to_srgb_image(width: u32, height: u32, pixels: &[Vec3]) -> image::RgbImage {
    let mut img = image::RgbImage::new(width, height);
    for (i, px) in pixels.iter().enumerate() {
        let x = (i as u32) % width;
        let y = (i as u32) / width;
        let to_u8 = |c: f32| (c.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0).round() as u8;
        img.put_pixel(x, y, image::Rgb([to_u8(px.x), to_u8(px.y), to_u8(px.z)]));
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_commutative_sum_of_private_images() {
        let shared = SharedImage::new(2, 2);
        let mut a = PrivateImage::new(2, 2);
        let mut b = PrivateImage::new(2, 2);
        a.add(0, 0, Vec3::ONE);
        b.add(0, 0, Vec3::splat(2.0));
        shared.merge(&a);
        shared.merge(&b);
        let result = shared.normalize(1.0);
        assert_eq!(result[0], Vec3::splat(3.0));
    }

    #[test]
    fn normalize_divides_exactly_once() {
        let shared = SharedImage::new(1, 1);
        let mut a = PrivateImage::new(1, 1);
        a.add(0, 0, Vec3::splat(10.0));
        shared.merge(&a);
        let result = shared.normalize(5.0);
        assert_eq!(result[0], Vec3::splat(2.0));
    }
}
