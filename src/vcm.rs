use glam::Vec3;

use crate::bsdf::{self, Bsdf, Pbr};
use crate::camera::Camera;
use crate::config::TracingConfig;
use crate::hash_grid::HashGrid;
use crate::image::PrivateImage;
use crate::path_state::{self, PathState, VcmConstants, VcmVertex};
use crate::rng::Rng;
use crate::scene::{offset_ray_origin, Scene};
use crate::surface::{self, SurfaceParameters};

// clear only truncates length, never releases capacity
pub struct PassStorage {
    vertices: Vec<VcmVertex>,
    positions: Vec<Vec3>,
    path_ends: Vec<u32>,
}

impl PassStorage {
    pub fn new(light_path_count: usize) -> Self {
        Self {
            vertices: Vec::new(),
            positions: Vec::new(),
            path_ends: vec![0; light_path_count],
        }
    }

    fn clear(&mut self) {
        self.vertices.clear();
        self.positions.clear();
    }

    // exclusive end index of subpath i - 1, or 0 for i == 0
    fn start_of(&self, i: usize) -> u32 {
        if i == 0 {
            0
        } else {
            self.path_ends[i - 1]
        }
    }
}

pub fn run_pass(
    scene: &Scene,
    config: &TracingConfig,
    rng: &mut Rng,
    constants: &VcmConstants,
    storage: &mut PassStorage,
    image: &mut PrivateImage,
) {
    storage.clear();

    let width = scene.camera.width;
    let height = scene.camera.height;
    let light_path_count = (width * height) as usize;

    // light subpaths
    for i in 0..light_path_count {
        generate_light_subpath(scene, config, rng, constants, storage, image);
        storage.path_ends[i] = storage.vertices.len() as u32;
    }

    let grid = HashGrid::build(&storage.positions, constants.radius);

    // camera subpaths
    for y in 0..height {
        for x in 0..width {
            let i = (y * width + x) as usize;
            let start = storage.start_of(i);
            let end = storage.path_ends[i];
            let color = trace_camera_subpath(scene, config, rng, constants, storage, &grid, x, y, start, end);
            image.add(x, y, color);
        }
    }
}

fn emission_throughput_is_usable(throughput: Vec3) -> bool {
    throughput.is_finite() && throughput.max_element() > 0.0 && throughput.min_element() >= 0.0
}

fn generate_light_subpath(
    scene: &Scene,
    config: &TracingConfig,
    rng: &mut Rng,
    constants: &VcmConstants,
    storage: &mut PassStorage,
    image: &mut PrivateImage,
) {
    rng.next_sample();
    let emit = scene.ibl.emit_sample(rng, scene.bounding_sphere);

    let emission_pdf_w = emit.emission_pdf_w.max(1e-12);
    let mut state = PathState {
        origin: emit.position,
        direction: emit.direction,
        throughput: emit.radiance / emission_pdf_w,
        path_length: 1,
        d_vcm: emit.direction_pdf_a / emission_pdf_w,
        d_vc: emit.cos_theta_light / emission_pdf_w,
        d_vm: 0.0,
        // the IBL samples direction over solid angle rather than area, so the source is not an area measure
        is_area_measure: false,
    };
    state.d_vm = state.d_vc * constants.vc_weight;

    if !emission_throughput_is_usable(state.throughput) {
        return;
    }

    while state.path_length + 2 < config.max_bounces {
        let hit = match scene.bvh_intersect(state.origin, state.direction) {
            Some(h) => h,
            None => break,
        };
        let triangle_idx = hit.primitive_id as usize;
        let triangle = &scene.triangles()[triangle_idx];
        let surface = match surface::reconstruct(&hit, triangle, scene.vertices(), &scene.materials, &scene.textures, false) {
            Some(s) => s,
            None => break,
        };

        // light subpath uses the shading normal for the at-hit cosine
        let cos_theta = surface.shading_normal.dot(-state.direction).abs();
        path_state::update_at_hit(&mut state, state.origin, surface.position, cos_theta);

        storage.vertices.push(VcmVertex {
            throughput: state.throughput,
            path_length: state.path_length,
            d_vcm: state.d_vcm,
            d_vc: state.d_vc,
            d_vm: state.d_vm,
            surface: surface.clone(),
            incoming_direction: state.direction,
        });
        storage.positions.push(surface.position);

        connect_light_vertex_to_camera(scene, constants, &state, &surface, image);

        let wo_local = bsdf::world_to_local(surface.shading_normal, -state.direction);
        let material = Pbr::from_surface(&surface);
        let sample = match material.sample(wo_local, rng) {
            Some(s) => s,
            None => break,
        };
        if sample.reflectance.max_element() <= 0.0 {
            break;
        }
        let wi_world = bsdf::local_to_world(surface.shading_normal, sample.wi).normalize_or_zero();
        if wi_world == Vec3::ZERO {
            break;
        }
        let cos_theta_b = sample.wi.y.abs();
        path_state::update_after_scatter(&mut state, sample.fwd_pdf_w, sample.rev_pdf_w, cos_theta_b, sample.reflectance, constants);
        if !emission_throughput_is_usable(state.throughput) {
            break;
        }

        state.origin = offset_ray_origin(surface.position, surface.geometric_normal, wi_world, surface.error_bound);
        state.direction = wi_world;
    }
}

fn camera_pdf_a(camera: &Camera, surface_position: Vec3, surface_normal: Vec3, dir_to_camera: Vec3) -> Option<f32> {
    let cos_at_camera = camera.forward.dot(-dir_to_camera);
    if cos_at_camera <= 1e-6 {
        return None;
    }
    let dist_sq = (camera.position - surface_position).length_squared().max(1e-8);
    let image_to_solid_angle = camera.image_to_solid_angle_pdf();
    let camera_pdf_w = image_to_solid_angle / cos_at_camera.powi(3);
    let cos_to_camera = surface_normal.dot(dir_to_camera).abs();
    Some(camera_pdf_w * cos_to_camera / dist_sq)
}

fn connect_light_vertex_to_camera(scene: &Scene, constants: &VcmConstants, state: &PathState, surface: &SurfaceParameters, image: &mut PrivateImage) {
    let camera = &scene.camera;
    let to_camera = camera.position - surface.position;
    let distance = to_camera.length();
    if distance <= 1e-6 {
        return;
    }
    let dir_to_camera = to_camera / distance;

    let Some((px, py)) = camera.world_to_image(surface.position) else {
        return;
    };

    let wo_local = bsdf::world_to_local(surface.shading_normal, -state.direction);
    let wi_local = bsdf::world_to_local(surface.shading_normal, dir_to_camera);
    let material = Pbr::from_surface(surface);
    let (reflectance, _fwd_pdf, rev_pdf) = material.evaluate(wo_local, wi_local);
    if reflectance.max_element() <= 0.0 {
        return;
    }

    let Some(cam_pdf_a) = camera_pdf_a(camera, surface.position, surface.shading_normal, dir_to_camera) else {
        return;
    };

    let geometry_term = wi_local.y.abs() / (distance * distance);
    if geometry_term <= 0.0 {
        return;
    }

    let weight = path_state::light_to_camera_weight(state, cam_pdf_a, rev_pdf, constants);
    let origin = offset_ray_origin(surface.position, surface.geometric_normal, dir_to_camera, surface.error_bound);
    if scene.bvh_occluded(origin, dir_to_camera, 0.0, distance - surface.error_bound.max(1e-4) * 2.0) {
        return;
    }

    let contribution = state.throughput * reflectance * geometry_term * weight * cam_pdf_a / constants.light_path_count;
    if contribution.is_finite() && contribution.max_element() > 0.0 {
        image.add(px, py, contribution);
    }
}

#[allow(clippy::too_many_arguments)]
fn trace_camera_subpath(
    scene: &Scene,
    config: &TracingConfig,
    rng: &mut Rng,
    constants: &VcmConstants,
    storage: &PassStorage,
    grid: &HashGrid,
    x: u32,
    y: u32,
    light_start: u32,
    light_end: u32,
) -> Vec3 {
    rng.next_sample();
    let camera = &scene.camera;
    let ray = camera.jittered_camera_ray(rng, x, y);

    let mut state = PathState {
        origin: ray.origin,
        direction: ray.direction,
        throughput: Vec3::ONE,
        path_length: 1,
        d_vcm: constants.light_path_count / camera.image_to_solid_angle_pdf().max(1e-12),
        d_vc: 0.0,
        d_vm: 0.0,
        is_area_measure: true,
    };

    let mut color = Vec3::ZERO;

    while state.path_length < config.max_bounces {
        let hit = match scene.bvh_intersect(state.origin, state.direction) {
            Some(h) => h,
            None => {
                let (radiance, direct_pdf_a, emission_pdf_w) = scene.ibl.direct_sample_pdf(state.direction, scene.bounding_sphere);
                let weight = path_state::skylight_weight(&state, direct_pdf_a, emission_pdf_w);
                color += state.throughput * radiance * weight;
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
            color += state.throughput * surface.emissive;
            break;
        }

        // camera subpath uses the geometric normal for the at-hit cosine
        let cos_theta = surface.geometric_normal.dot(-state.direction).abs();
        path_state::update_at_hit(&mut state, state.origin, surface.position, cos_theta);

        let material = Pbr::from_surface(&surface);

        if state.path_length + 1 < config.max_bounces {
            color += direct_light_connection(scene, constants, &state, &surface, &material, rng);
        }

        color += connect_to_light_vertices(scene, config, constants, &state, &surface, &material, storage, light_start, light_end);
        if constants.radius > 0.0 {
            color += merge_with_light_vertices(config, constants, &state, &surface, &material, storage, grid) * constants.vm_normalization;
        }

        let wo_local = bsdf::world_to_local(surface.shading_normal, -state.direction);
        let sample = match material.sample(wo_local, rng) {
            Some(s) => s,
            None => break,
        };
        if sample.reflectance.max_element() <= 0.0 {
            break;
        }
        let wi_world = bsdf::local_to_world(surface.shading_normal, sample.wi).normalize_or_zero();
        if wi_world == Vec3::ZERO {
            break;
        }
        let cos_theta_b = sample.wi.y.abs();
        path_state::update_after_scatter(&mut state, sample.fwd_pdf_w, sample.rev_pdf_w, cos_theta_b, sample.reflectance, constants);
        if !emission_throughput_is_usable(state.throughput) {
            break;
        }

        state.origin = offset_ray_origin(surface.position, surface.geometric_normal, wi_world, surface.error_bound);
        state.direction = wi_world;
    }

    if color.is_finite() {
        color
    } else {
        Vec3::ZERO
    }
}

fn direct_light_connection(scene: &Scene, constants: &VcmConstants, state: &PathState, surface: &SurfaceParameters, material: &Pbr, rng: &mut Rng) -> Vec3 {
    let light = scene.ibl.direct_sample(rng, surface.position, scene.bounding_sphere);
    if light.radiance.max_element() <= 0.0 {
        return Vec3::ZERO;
    }

    let wo_local = bsdf::world_to_local(surface.shading_normal, -state.direction);
    let wi_local = bsdf::world_to_local(surface.shading_normal, light.direction);
    let (reflectance, bsdf_fwd_w, bsdf_rev_w) = material.evaluate(wo_local, wi_local);
    if reflectance.max_element() <= 0.0 || bsdf_fwd_w <= 0.0 {
        return Vec3::ZERO;
    }

    let cos_surf = wi_local.y;
    if cos_surf <= 0.0 {
        return Vec3::ZERO;
    }

    let origin = offset_ray_origin(surface.position, surface.geometric_normal, light.direction, surface.error_bound);
    if scene.bvh_occluded(origin, light.direction, 0.0, light.distance) {
        return Vec3::ZERO;
    }

    let weight = path_state::direct_light_weight(
        state,
        bsdf_fwd_w,
        light.direction_pdf_a.max(1e-12),
        light.emission_pdf_w,
        cos_surf,
        light.cos_theta_light,
        bsdf_rev_w,
        constants,
    );

    state.throughput * reflectance * cos_surf * light.radiance * weight / light.direction_pdf_a.max(1e-12)
}

#[allow(clippy::too_many_arguments)]
fn connect_to_light_vertices(
    scene: &Scene,
    config: &TracingConfig,
    constants: &VcmConstants,
    state: &PathState,
    surface: &SurfaceParameters,
    material: &Pbr,
    storage: &PassStorage,
    start: u32,
    end: u32,
) -> Vec3 {
    let mut sum = Vec3::ZERO;
    for idx in start..end {
        let lv = &storage.vertices[idx as usize];
        if state.path_length + lv.path_length + 1 > config.max_bounces {
            continue;
        }

        let to_light = lv.surface.position - surface.position;
        let distance_sq = to_light.length_squared();
        if distance_sq <= 1e-10 {
            continue;
        }
        let distance = distance_sq.sqrt();
        let direction = to_light / distance;

        let wo_cam_local = bsdf::world_to_local(surface.shading_normal, -state.direction);
        let wi_cam_local = bsdf::world_to_local(surface.shading_normal, direction);
        let (cam_reflectance, cam_fwd_w, cam_rev_w) = material.evaluate(wo_cam_local, wi_cam_local);
        if cam_reflectance.max_element() <= 0.0 {
            continue;
        }

        let light_material = Pbr::from_surface(&lv.surface);
        let wo_light_local = bsdf::world_to_local(lv.surface.shading_normal, -lv.incoming_direction);
        let wi_light_local = bsdf::world_to_local(lv.surface.shading_normal, -direction);
        let (light_reflectance, light_fwd_w, light_rev_w) = light_material.evaluate(wo_light_local, wi_light_local);
        if light_reflectance.max_element() <= 0.0 {
            continue;
        }

        let cos_cam = wi_cam_local.y.abs();
        let cos_light = wi_light_local.y.abs();
        if cos_cam <= 0.0 || cos_light <= 0.0 {
            continue;
        }
        let geometry_term = cos_cam * cos_light / distance_sq;
        if geometry_term <= 0.0 {
            continue;
        }

        let cam_bsdf_pdf_a = cam_fwd_w * cos_light / distance_sq;
        let light_bsdf_pdf_a = light_fwd_w * cos_cam / distance_sq;

        let origin = offset_ray_origin(surface.position, surface.geometric_normal, direction, surface.error_bound);
        if scene.bvh_occluded(origin, direction, 0.0, distance - surface.error_bound.max(1e-4) * 2.0) {
            continue;
        }

        let weight = path_state::connection_weight(state, lv, cam_bsdf_pdf_a, light_bsdf_pdf_a, cam_rev_w, light_rev_w, constants);
        sum += state.throughput * lv.throughput * cam_reflectance * light_reflectance * geometry_term * weight;
    }
    sum
}

// caller multiplies the returned sum by vm_normalization after this returns
fn merge_with_light_vertices(
    config: &TracingConfig,
    constants: &VcmConstants,
    state: &PathState,
    surface: &SurfaceParameters,
    material: &Pbr,
    storage: &PassStorage,
    grid: &HashGrid,
) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let wo_cam_local = bsdf::world_to_local(surface.shading_normal, -state.direction);

    grid.range(surface.position, |idx| {
        let lv = &storage.vertices[idx];
        if state.path_length + lv.path_length > config.max_bounces {
            return;
        }

        // camera and light vertex are treated as coincident; only the
        // camera BSDF is evaluated, the light vertex's throughput already
        // carries its own BSDF history
        let wi_cam_local = bsdf::world_to_local(surface.shading_normal, -lv.incoming_direction);
        let (cam_reflectance, cam_fwd_w, cam_rev_w) = material.evaluate(wo_cam_local, wi_cam_local);
        if cam_reflectance.max_element() <= 0.0 {
            return;
        }

        let weight = path_state::merge_weight(state, lv, cam_fwd_w, cam_rev_w, constants);
        sum += state.throughput * lv.throughput * cam_reflectance * weight;
    });

    sum
}
