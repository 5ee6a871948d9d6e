use glam::Vec3;

use crate::surface::SurfaceParameters;

#[derive(Debug, Clone, Copy)]
pub struct PathState {
    pub origin: Vec3,
    pub direction: Vec3,
    pub throughput: Vec3,
    pub path_length: u32,
    pub d_vcm: f32,
    pub d_vc: f32,
    pub d_vm: f32,
    pub is_area_measure: bool,
}

// borrowed during camera scan of the same pass, discarded at pass end
#[derive(Clone)]
pub struct VcmVertex {
    pub throughput: Vec3,
    pub path_length: u32,
    pub d_vcm: f32,
    pub d_vc: f32,
    pub d_vm: f32,
    pub surface: SurfaceParameters,
    // direction the light subpath was travelling when it arrived here; wo for
    // this vertex's own BSDF is the negation of this
    pub incoming_direction: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct VcmConstants {
    pub radius: f32,
    pub radius_sq: f32,
    pub light_path_count: f32,
    pub vm_weight: f32,
    pub vc_weight: f32,
    pub vm_normalization: f32,
}

impl VcmConstants {
    pub fn new(radius: f32, width: u32, height: u32) -> Self {
        let n = (width * height) as f32;
        let vm_weight = std::f32::consts::PI * radius * radius * n;
        Self {
            radius,
            radius_sq: radius * radius,
            light_path_count: n,
            vm_weight,
            vc_weight: 1.0 / vm_weight,
            vm_normalization: 1.0 / vm_weight,
        }
    }
}

// r_k = r_0 / k^(0.5*(1-alpha)) for pass index k >= 1
pub fn radius_for_pass(r0: f32, alpha: f32, k: u32) -> f32 {
    debug_assert!(k >= 1);
    r0 / (k as f32).powf(0.5 * (1.0 - alpha))
}

// applied to both light and camera subpaths right after intersecting a new
// vertex, before the vertex is stored or connected. cos_theta is the
// shading-normal cosine for a light subpath, the geometric-normal cosine for
// a camera subpath.
pub fn update_at_hit(state: &mut PathState, prev_pos: Vec3, new_pos: Vec3, cos_theta: f32) {
    let l2 = (new_pos - prev_pos).length_squared();
    if state.path_length > 1 || !state.is_area_measure {
        state.d_vcm *= l2;
    }
    let cos_theta = cos_theta.abs().max(1e-8);
    state.d_vcm /= cos_theta;
    state.d_vc /= cos_theta;
    state.d_vm /= cos_theta;
}

pub fn update_after_scatter(
    state: &mut PathState,
    fwd_pdf_w: f32,
    rev_pdf_w: f32,
    cos_theta_b: f32,
    reflectance: Vec3,
    constants: &VcmConstants,
) {
    let cos_over_pdf = cos_theta_b.abs() / fwd_pdf_w.max(1e-12);
    state.d_vc = cos_over_pdf * (state.d_vc * rev_pdf_w + state.d_vcm + constants.vm_weight);
    state.d_vm = cos_over_pdf * (state.d_vm * rev_pdf_w + state.d_vcm * constants.vc_weight + 1.0);
    state.d_vcm = 1.0 / fwd_pdf_w.max(1e-12);
    state.throughput *= reflectance;
    state.path_length += 1;
    state.is_area_measure = true;
}

// camera subpath hitting the environment directly; returns 1.0 on path_length
// == 1 since the direct camera-IBL contribution is unweighted
pub fn skylight_weight(state: &PathState, direct_pdf_a: f32, emission_pdf_w: f32) -> f32 {
    if state.path_length == 1 {
        return 1.0;
    }
    1.0 / (1.0 + direct_pdf_a * state.d_vcm + emission_pdf_w * state.d_vc)
}

pub fn direct_light_weight(
    state: &PathState,
    bsdf_fwd_w: f32,
    dir_pdf_a: f32,
    em_pdf_w: f32,
    cos_surf: f32,
    cos_light: f32,
    bsdf_rev_w: f32,
    constants: &VcmConstants,
) -> f32 {
    let light_weight = bsdf_fwd_w / dir_pdf_a.max(1e-12);
    let camera_weight = (em_pdf_w * cos_surf.abs() / (dir_pdf_a * cos_light.abs()).max(1e-12))
        * (constants.vm_weight + state.d_vcm + state.d_vc * bsdf_rev_w);
    1.0 / (light_weight + 1.0 + camera_weight)
}

pub fn connection_weight(
    cam: &PathState,
    lv: &VcmVertex,
    cam_bsdf_pdf_a: f32,
    light_bsdf_pdf_a: f32,
    cam_bsdf_rev_w: f32,
    light_bsdf_rev_w: f32,
    constants: &VcmConstants,
) -> f32 {
    let l = cam_bsdf_pdf_a * (constants.vm_weight + lv.d_vcm + lv.d_vc * light_bsdf_rev_w);
    let c = light_bsdf_pdf_a * (constants.vm_weight + cam.d_vcm + cam.d_vc * cam_bsdf_rev_w);
    1.0 / (l + 1.0 + c)
}

// a light-subpath vertex splatted directly onto the image
pub fn light_to_camera_weight(state: &PathState, camera_pdf_a: f32, bsdf_rev_w: f32, constants: &VcmConstants) -> f32 {
    let lp = (camera_pdf_a / constants.light_path_count) * (constants.vm_weight + state.d_vcm + state.d_vc * bsdf_rev_w);
    1.0 / (lp + 1.0)
}

// VCM never calls this; its strategies combine through the d_vcm/d_vc/d_vm accumulators above
pub fn power_heuristic(pdf_a: f32, pdf_b: f32) -> f32 {
    let a2 = pdf_a * pdf_a;
    let b2 = pdf_b * pdf_b;
    if a2 + b2 <= 0.0 {
        0.0
    } else {
        a2 / (a2 + b2)
    }
}

// vm_normalization is applied by the caller after summing over all merged vertices, not per-vertex
pub fn merge_weight(cam: &PathState, lv: &VcmVertex, bsdf_fwd_w: f32, bsdf_rev_w: f32, constants: &VcmConstants) -> f32 {
    let light_term = lv.d_vcm * constants.vc_weight + lv.d_vm * bsdf_fwd_w;
    let camera_term = cam.d_vcm * constants.vc_weight + cam.d_vm * bsdf_rev_w;
    1.0 / (light_term + 1.0 + camera_term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_schedule_is_non_increasing_and_bounded_by_r0() {
        let r0 = 0.01;
        let alpha = 0.75;
        let mut prev = radius_for_pass(r0, alpha, 1);
        assert!(prev <= r0 + 1e-7);
        for k in 2..100 {
            let r = radius_for_pass(r0, alpha, k);
            assert!(r <= r0 + 1e-7);
            assert!(r <= prev + 1e-7);
            prev = r;
        }
    }

    #[test]
    fn skylight_weight_bypassed_on_first_segment() {
        let state = PathState {
            origin: Vec3::ZERO,
            direction: Vec3::Y,
            throughput: Vec3::ONE,
            path_length: 1,
            d_vcm: 5.0,
            d_vc: 3.0,
            d_vm: 0.0,
            is_area_measure: true,
        };
        assert_eq!(skylight_weight(&state, 10.0, 10.0), 1.0);
    }
}
