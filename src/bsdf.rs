use glam::Vec3;

use crate::rng::Rng;
use crate::surface::SurfaceParameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobeType {
    Diffuse,
    Specular,
}

#[derive(Debug, Clone, Copy)]
pub struct BsdfSample {
    pub wi: Vec3,
    pub reflectance: Vec3,
    pub fwd_pdf_w: f32,
    pub rev_pdf_w: f32,
    pub sampled_lobe: LobeType,
}

// wo is the outgoing (toward-viewer) direction: wo = -incoming_dir
pub trait Bsdf {
    fn evaluate(&self, wo: Vec3, wi: Vec3) -> (Vec3, f32, f32);
    fn sample(&self, wo: Vec3, rng: &mut Rng) -> Option<BsdfSample>;
    fn pdf(&self, wo: Vec3, wi: Vec3) -> (f32, f32);
}

fn cosine_sample_hemisphere(r1: f32, r2: f32) -> Vec3 {
    let theta = r1.sqrt().acos();
    let phi = 2.0 * std::f32::consts::PI * r2;
    Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin())
}

fn create_cartesian(up: Vec3) -> (Vec3, Vec3, Vec3) {
    let arbitrary = Vec3::new(0.1, 0.5, 0.9);
    let tangent = up.cross(arbitrary).normalize();
    let bitangent = tangent.cross(up).normalize();
    (up, bitangent, tangent)
}

fn to_local(n: Vec3, v: Vec3) -> Vec3 {
    let (up, right, forward) = create_cartesian(n);
    Vec3::new(v.dot(right), v.dot(up), v.dot(forward))
}

fn to_world(n: Vec3, v: Vec3) -> Vec3 {
    let (up, right, forward) = create_cartesian(n);
    right * v.x + up * v.y + forward * v.z
}

fn ggx_distribution(n_dot_h: f32, roughness: f32) -> f32 {
    let a2 = roughness * roughness;
    let denom = (n_dot_h * n_dot_h) * (a2 - 1.0) + 1.0;
    let denom = (std::f32::consts::PI * denom * denom).max(1e-4);
    a2 / denom
}

fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    let r = (roughness * roughness) / 8.0;
    n_dot_v.max(0.0) / (n_dot_v.max(0.0) * (1.0 - r) + r)
}

fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

fn sample_ggx(r1: f32, r2: f32, reflection_direction: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = 2.0 * std::f32::consts::PI * r1;
    let cos_theta = ((1.0 - r2) / (r2 * (a * a - 1.0) + 1.0).max(1e-8)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let halfway = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);

    let up = if reflection_direction.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = up.cross(reflection_direction).normalize();
    let bitangent = reflection_direction.cross(tangent);
    (tangent * halfway.x + bitangent * halfway.y + reflection_direction * halfway.z).normalize()
}

pub struct Lambertian {
    pub albedo: Vec3,
}

impl Bsdf for Lambertian {
    fn evaluate(&self, wo: Vec3, wi: Vec3) -> (Vec3, f32, f32) {
        if wo.y <= 0.0 || wi.y <= 0.0 {
            return (Vec3::ZERO, 0.0, 0.0);
        }
        let pdf = wi.y / std::f32::consts::PI;
        (self.albedo / std::f32::consts::PI, pdf, pdf)
    }

    fn sample(&self, wo: Vec3, rng: &mut Rng) -> Option<BsdfSample> {
        if wo.y <= 0.0 {
            return None;
        }
        let r = rng.gen_r2();
        let local = cosine_sample_hemisphere(r.x, r.y);
        let pdf = local.y / std::f32::consts::PI;
        if pdf <= 0.0 {
            return None;
        }
        Some(BsdfSample {
            wi: local,
            reflectance: self.albedo / std::f32::consts::PI,
            fwd_pdf_w: pdf,
            rev_pdf_w: pdf,
            sampled_lobe: LobeType::Diffuse,
        })
    }

    fn pdf(&self, wo: Vec3, wi: Vec3) -> (f32, f32) {
        if wo.y <= 0.0 || wi.y <= 0.0 {
            return (0.0, 0.0);
        }
        let pdf = wi.y / std::f32::consts::PI;
        (pdf, pdf)
    }
}

pub struct Pbr {
    pub albedo: Vec3,
    pub roughness: f32,
    pub metallic: f32,
}

impl Pbr {
    fn diffuse_specular_ratio(&self) -> f32 {
        0.5 + 0.5 * self.metallic
    }

    fn f0(&self) -> Vec3 {
        Vec3::splat(0.04).lerp(self.albedo, self.metallic)
    }
}

impl Bsdf for Pbr {
    fn evaluate(&self, wo: Vec3, wi: Vec3) -> (Vec3, f32, f32) {
        if wo.y <= 0.0 || wi.y <= 0.0 {
            return (Vec3::ZERO, 0.0, 0.0);
        }
        let half = (wo + wi).normalize();
        let n_dot_h = half.y.max(0.0);
        let n_dot_v = wo.y.max(1e-4);
        let n_dot_l = wi.y.max(1e-4);
        let v_dot_h = wo.dot(half).max(0.0);

        let d = ggx_distribution(n_dot_h, self.roughness.max(0.02));
        let g = geometry_schlick_ggx(n_dot_v, self.roughness) * geometry_schlick_ggx(n_dot_l, self.roughness);
        let f = fresnel_schlick(v_dot_h, self.f0());

        let specular = f * (d * g / (4.0 * n_dot_v * n_dot_l).max(1e-4));
        let diffuse = (Vec3::ONE - f) * (1.0 - self.metallic) * self.albedo / std::f32::consts::PI;

        let ratio = self.diffuse_specular_ratio();
        let diffuse_pdf = n_dot_l / std::f32::consts::PI;
        let specular_pdf = d * n_dot_h / (4.0 * v_dot_h.max(1e-4));
        let pdf = (1.0 - ratio) * diffuse_pdf + ratio * specular_pdf;

        (diffuse + specular, pdf, pdf)
    }

    fn sample(&self, wo: Vec3, rng: &mut Rng) -> Option<BsdfSample> {
        if wo.y <= 0.0 {
            return None;
        }
        let ratio = self.diffuse_specular_ratio();
        let r = rng.gen_r2();
        let choose_specular = rng.gen_r1() < ratio;

        let wi = if choose_specular {
            let half = sample_ggx(r.x, r.y, Vec3::Y, self.roughness.max(0.02));
            let reflected = 2.0 * wo.dot(half) * half - wo;
            if reflected.y <= 0.0 {
                return None;
            }
            reflected
        } else {
            cosine_sample_hemisphere(r.x, r.y)
        };

        let (reflectance, fwd_pdf_w, rev_pdf_w) = self.evaluate(wo, wi);
        if fwd_pdf_w <= 0.0 {
            return None;
        }
        Some(BsdfSample {
            wi,
            reflectance,
            fwd_pdf_w,
            rev_pdf_w,
            sampled_lobe: if choose_specular { LobeType::Specular } else { LobeType::Diffuse },
        })
    }

    fn pdf(&self, wo: Vec3, wi: Vec3) -> (f32, f32) {
        let (_, fwd, rev) = self.evaluate(wo, wi);
        (fwd, rev)
    }
}

impl Pbr {
    pub fn from_surface(surface: &SurfaceParameters) -> Self {
        Self {
            albedo: surface.albedo,
            roughness: surface.roughness,
            metallic: surface.metalness,
        }
    }
}

pub fn world_to_local(n: Vec3, v: Vec3) -> Vec3 {
    to_local(n, v)
}

pub fn local_to_world(n: Vec3, v: Vec3) -> Vec3 {
    to_world(n, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambertian_sample_pdf_matches_evaluate() {
        let bsdf = Lambertian { albedo: Vec3::splat(0.8) };
        let mut rng = Rng::new(0, 1, 0);
        rng.next_sample();
        let wo = Vec3::new(0.0, 1.0, 0.0);
        let sample = bsdf.sample(wo, &mut rng).unwrap();
        let (_, fwd, _) = bsdf.evaluate(wo, sample.wi);
        assert!((fwd - sample.fwd_pdf_w).abs() < 1e-5);
    }

    #[test]
    fn pbr_reflectance_is_never_negative() {
        let bsdf = Pbr {
            albedo: Vec3::splat(0.5),
            roughness: 0.3,
            metallic: 0.0,
        };
        let wo = Vec3::new(0.2, 0.9, 0.1).normalize();
        let wi = Vec3::new(-0.1, 0.8, 0.2).normalize();
        let (rgb, _, _) = bsdf.evaluate(wo, wi);
        assert!(rgb.x >= 0.0 && rgb.y >= 0.0 && rgb.z >= 0.0);
    }
}
