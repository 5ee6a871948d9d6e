use glam::{Vec2, Vec3};

use crate::rng::Rng;
use crate::scene::BoundingSphere;
use crate::texture::{ColorSpace, ImageTexture, TextureFilter};

#[derive(Debug, Clone, Copy)]
pub struct EmitIblLightSample {
    pub position: Vec3,
    pub direction: Vec3,
    pub radiance: Vec3,
    pub direction_pdf_a: f32,
    pub emission_pdf_w: f32,
    pub cos_theta_light: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct DirectIblLightSample {
    pub direction: Vec3,
    pub distance: f32,
    pub radiance: Vec3,
    pub direction_pdf_a: f32,
    pub emission_pdf_w: f32,
    pub cos_theta_light: f32,
}

pub trait Ibl: Send + Sync {
    fn radiance(&self, direction: Vec3) -> Vec3;

    // samples a full emission event for a light subpath's first vertex
    fn emit_sample(&self, rng: &mut Rng, bounds: BoundingSphere) -> EmitIblLightSample {
        let direction = -uniform_sample_sphere(rng.gen_r2());
        let (disk_x, disk_y) = create_cartesian(direction);
        let r = rng.gen_r2();
        let (offset_x, offset_y) = concentric_sample_disk(r);
        let position = bounds.center - direction * bounds.radius
            + disk_x * (offset_x * bounds.radius)
            + disk_y * (offset_y * bounds.radius);

        let dir_pdf = 1.0 / (4.0 * std::f32::consts::PI);
        let area_pdf = 1.0 / (std::f32::consts::PI * bounds.radius * bounds.radius);

        EmitIblLightSample {
            position,
            direction,
            radiance: self.radiance(direction),
            direction_pdf_a: dir_pdf,
            emission_pdf_w: dir_pdf * area_pdf,
            cos_theta_light: 1.0,
        }
    }

    // samples a direction toward the emitter for next-event estimation from a surface point
    fn direct_sample(&self, rng: &mut Rng, _shading_point: Vec3, bounds: BoundingSphere) -> DirectIblLightSample {
        let direction = uniform_sample_sphere(rng.gen_r2());
        let dir_pdf = 1.0 / (4.0 * std::f32::consts::PI);
        let area_pdf = 1.0 / (std::f32::consts::PI * bounds.radius * bounds.radius);
        DirectIblLightSample {
            direction,
            distance: f32::INFINITY,
            radiance: self.radiance(direction),
            direction_pdf_a: dir_pdf,
            emission_pdf_w: dir_pdf * area_pdf,
            cos_theta_light: 1.0,
        }
    }

    // evaluates pdfs for a direction already chosen by the caller (BSDF sampling hit the sky)
    fn direct_sample_pdf(&self, _direction: Vec3, bounds: BoundingSphere) -> (Vec3, f32, f32) {
        let dir_pdf = 1.0 / (4.0 * std::f32::consts::PI);
        let area_pdf = 1.0 / (std::f32::consts::PI * bounds.radius * bounds.radius);
        (self.radiance(_direction), dir_pdf, dir_pdf * area_pdf)
    }
}

fn uniform_sample_sphere(r: Vec2) -> Vec3 {
    let cos_phi = 2.0 * r.x - 1.0;
    let sin_phi = (1.0 - cos_phi * cos_phi).max(0.0).sqrt();
    let theta = 2.0 * std::f32::consts::PI * r.y;
    Vec3::new(sin_phi * theta.cos(), cos_phi, sin_phi * theta.sin())
}

fn concentric_sample_disk(r: Vec2) -> (f32, f32) {
    let ox = 2.0 * r.x - 1.0;
    let oy = 2.0 * r.y - 1.0;
    if ox == 0.0 && oy == 0.0 {
        return (0.0, 0.0);
    }
    let (radius, theta) = if ox.abs() > oy.abs() {
        (ox, std::f32::consts::FRAC_PI_4 * (oy / ox))
    } else {
        (oy, std::f32::consts::FRAC_PI_2 - std::f32::consts::FRAC_PI_4 * (ox / oy))
    };
    (radius * theta.cos(), radius * theta.sin())
}

fn create_cartesian(up: Vec3) -> (Vec3, Vec3) {
    let arbitrary = Vec3::new(0.1, 0.5, 0.9);
    let x = up.cross(arbitrary).normalize();
    let y = up.cross(x).normalize();
    (x, y)
}

pub struct ProceduralSky {
    pub sun_direction: Vec3,
    pub sun_color: Vec3,
    pub sun_angular_radius: f32,
    pub zenith_color: Vec3,
    pub horizon_color: Vec3,
}

impl Default for ProceduralSky {
    fn default() -> Self {
        Self {
            sun_direction: Vec3::new(0.3, 0.8, 0.2).normalize(),
            sun_color: Vec3::new(8.0, 7.5, 6.5),
            sun_angular_radius: 0.02,
            zenith_color: Vec3::new(0.3, 0.45, 0.8),
            horizon_color: Vec3::new(0.9, 0.9, 0.85),
        }
    }
}

impl Ibl for ProceduralSky {
    fn radiance(&self, direction: Vec3) -> Vec3 {
        let t = (direction.y.max(0.0)).powf(0.5);
        let sky = self.horizon_color.lerp(self.zenith_color, t);
        let cos_sun = direction.dot(self.sun_direction).clamp(-1.0, 1.0).acos();
        if cos_sun < self.sun_angular_radius {
            sky + self.sun_color
        } else {
            sky
        }
    }
}

pub struct EquirectangularImage {
    texture: ImageTexture,
}

impl EquirectangularImage {
    pub fn new(texture: ImageTexture) -> Self {
        Self { texture }
    }

    fn direction_to_uv(direction: Vec3) -> Vec2 {
        let u = 0.5 + direction.z.atan2(direction.x) / (2.0 * std::f32::consts::PI);
        let v = 0.5 - direction.y.clamp(-1.0, 1.0).asin() / std::f32::consts::PI;
        Vec2::new(u, v)
    }
}

impl Ibl for EquirectangularImage {
    fn radiance(&self, direction: Vec3) -> Vec3 {
        let uv = Self::direction_to_uv(direction.normalize());
        let rgb = self.texture.triangle(uv, ColorSpace::Linear);
        Vec3::new(rgb[0], rgb[1], rgb[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedural_sky_is_never_negative() {
        let sky = ProceduralSky::default();
        for i in 0..32 {
            let theta = i as f32 * 0.2;
            let dir = Vec3::new(theta.sin(), theta.cos(), 0.3).normalize();
            let rgb = sky.radiance(dir);
            assert!(rgb.x >= 0.0 && rgb.y >= 0.0 && rgb.z >= 0.0);
        }
    }
}
