use glam::Vec3;

use crate::bsdf::{Bsdf, LobeType, Pbr};
use crate::config::{NextEventEstimation, TracingConfig};
use crate::image::PrivateImage;
use crate::path_state::power_heuristic;
use crate::rng::Rng;
use crate::scene::{offset_ray_origin, Scene};
use crate::surface;

pub fn run_sweep(scene: &Scene, config: &TracingConfig, rng: &mut Rng, image: &mut PrivateImage) {
    let width = scene.camera.width;
    let height = scene.camera.height;
    for y in 0..height {
        for x in 0..width {
            let color = trace_pixel(scene, config, rng, x, y);
            image.add(x, y, color);
        }
    }
}

fn trace_pixel(scene: &Scene, config: &TracingConfig, rng: &mut Rng, x: u32, y: u32) -> Vec3 {
    rng.next_sample();
    let ray = scene.camera.jittered_camera_ray(rng, x, y);
    let mut origin = ray.origin;
    let mut direction = ray.direction;

    let mut throughput = Vec3::ONE;
    let mut radiance = Vec3::ZERO;
    let mut last_bsdf_pdf = 0.0f32;
    let mut last_was_diffuse = false;

    let nee = config.nee != NextEventEstimation::Off;

    for bounce in 0..config.max_bounces {
        let hit = match scene.bvh_intersect(origin, direction) {
            Some(h) => h,
            None => {
                let sky = scene.ibl.radiance(direction);
                if nee && config.nee == NextEventEstimation::WithMis && bounce > 0 && last_was_diffuse {
                    let (_, direct_pdf_a, _) = scene.ibl.direct_sample_pdf(direction, scene.bounding_sphere);
                    let weight = power_heuristic(last_bsdf_pdf, direct_pdf_a);
                    radiance += throughput * sky * weight;
                } else {
                    radiance += throughput * sky;
                }
                break;
            }
        };

        let triangle_idx = hit.primitive_id as usize;
        let triangle = &scene.triangles()[triangle_idx];
        let surface = match surface::reconstruct(&hit, triangle, scene.vertices(), &scene.materials, &scene.textures, false) {
            Some(s) => s,
            None => break,
        };

        if surface.emissive.max_element() > 0.0 {
            radiance += mask_nan(throughput * surface.emissive);
            break;
        }

        let material = Pbr::from_surface(&surface);
        let wo_local = crate::bsdf::world_to_local(surface.shading_normal, -direction);

        let sample = match material.sample(wo_local, rng) {
            Some(s) => s,
            None => break,
        };
        last_was_diffuse = sample.sampled_lobe == LobeType::Diffuse;

        if nee && last_was_diffuse {
            let direct = sample_direct_lighting(scene, config, &surface, &material, -direction, rng);
            radiance += mask_nan(direct);
        }

        if sample.fwd_pdf_w <= 0.0 || sample.reflectance.max_element() <= 0.0 {
            break;
        }
        throughput *= sample.reflectance / sample.fwd_pdf_w;
        last_bsdf_pdf = sample.fwd_pdf_w;

        let wi_world = crate::bsdf::local_to_world(surface.shading_normal, sample.wi).normalize_or_zero();
        if wi_world == Vec3::ZERO {
            break;
        }
        origin = offset_ray_origin(surface.position, surface.geometric_normal, wi_world, surface.error_bound);
        direction = wi_world;

        if bounce > config.min_bounces {
            let survival = throughput.max_element().clamp(0.0, 1.0);
            if rng.gen_r1() > survival {
                break;
            }
            throughput *= 1.0 / survival.max(1e-4);
        }
        if !throughput.is_finite() {
            break;
        }
    }

    mask_nan(radiance)
}

fn sample_direct_lighting(scene: &Scene, config: &TracingConfig, surface: &crate::surface::SurfaceParameters, material: &Pbr, wo_world: Vec3, rng: &mut Rng) -> Vec3 {
    let light = scene.ibl.direct_sample(rng, surface.position, scene.bounding_sphere);
    if light.radiance.max_element() <= 0.0 || light.direction_pdf_a <= 0.0 {
        return Vec3::ZERO;
    }

    let wo_local = crate::bsdf::world_to_local(surface.shading_normal, wo_world);
    let wi_local = crate::bsdf::world_to_local(surface.shading_normal, light.direction);
    let (reflectance, bsdf_fwd_w, _) = material.evaluate(wo_local, wi_local);
    if reflectance.max_element() <= 0.0 || wi_local.y <= 0.0 {
        return Vec3::ZERO;
    }

    let origin = offset_ray_origin(surface.position, surface.geometric_normal, light.direction, surface.error_bound);
    if scene.bvh_occluded(origin, light.direction, 0.0, light.distance) {
        return Vec3::ZERO;
    }

    let weight = match config.nee {
        NextEventEstimation::WithMis => power_heuristic(light.direction_pdf_a, bsdf_fwd_w),
        NextEventEstimation::NoMis | NextEventEstimation::Off => 1.0,
    };

    reflectance * wi_local.y * light.radiance * weight / light.direction_pdf_a
}

fn mask_nan(v: Vec3) -> Vec3 {
    Vec3::new(
        if v.x.is_finite() { v.x } else { 0.0 },
        if v.y.is_finite() { v.y } else { 0.0 },
        if v.z.is_finite() { v.z } else { 0.0 },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_nan_replaces_non_finite_components() {
        let v = Vec3::new(f32::NAN, f32::INFINITY, 1.0);
        let masked = mask_nan(v);
        assert_eq!(masked, Vec3::new(0.0, 0.0, 1.0));
    }
}
