use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use glam::Vec3;

use crate::config::{TracingConfig, Variant};
use crate::image::{PrivateImage, SharedImage};
use crate::path_state::{radius_for_pass, VcmConstants};
use crate::pt;
use crate::rng::Rng;
use crate::scene::Scene;
use crate::vcm::{self, PassStorage};

#[derive(Debug, Default)]
pub struct RenderStats {
    pub passes_completed: AtomicU64,
    pub completed_threads: AtomicU64,
}

// stats is optional shared progress state; pass None for a plain blocking render
pub fn render(scene: Arc<Scene>, config: TracingConfig, variant: Variant, stats: Option<Arc<RenderStats>>) -> Vec<Vec3> {
    let width = scene.camera.width;
    let height = scene.camera.height;
    let shared = Arc::new(SharedImage::new(width, height));
    let deadline = Instant::now() + std::time::Duration::from_secs_f32(config.integration_seconds.max(0.0));
    let pass_counter = Arc::new(AtomicU64::new(0));

    let worker_count = config.worker_count.max(1);
    log::info!(
        "starting {:?} render: {}x{}, {} workers, {:.1}s budget",
        variant,
        width,
        height,
        worker_count,
        config.integration_seconds
    );

    thread::scope(|scope| {
        for worker_index in 0..worker_count {
            let scene = Arc::clone(&scene);
            let shared = Arc::clone(&shared);
            let pass_counter = Arc::clone(&pass_counter);
            let stats = stats.clone();
            let config = config;

            scope.spawn(move || {
                run_worker(worker_index as u64, &scene, &config, variant, &shared, &pass_counter, deadline, stats.as_deref());
            });
        }
    });

    let total_passes = pass_counter.load(Ordering::Relaxed);
    let divisor = match variant {
        Variant::Vcm => total_passes as f32,
        Variant::Pt => total_passes as f32,
    };
    log::info!("render finished: {total_passes} total passes");
    shared.normalize(divisor.max(1.0))
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    worker_index: u64,
    scene: &Scene,
    config: &TracingConfig,
    variant: Variant,
    shared: &SharedImage,
    pass_counter: &AtomicU64,
    deadline: Instant,
    stats: Option<&RenderStats>,
) {
    let width = scene.camera.width;
    let height = scene.camera.height;
    let mut private = PrivateImage::new(width, height);
    let mut rng = Rng::new(worker_index, 0, 0);

    let base_radius = config.vcm_radius_factor * scene.bounding_sphere.radius;
    let mut storage = PassStorage::new((width * height) as usize);
    let mut pass_index: u32 = 1;

    // Pt stops after its share of rays_per_pixel rather than running until the deadline
    let pt_sweeps_per_worker = config.rays_per_pixel.div_ceil(config.worker_count.max(1) as u32).max(1);

    while Instant::now() < deadline {
        if variant == Variant::Pt && pass_index > pt_sweeps_per_worker {
            break;
        }
        match variant {
            Variant::Vcm => {
                let radius = radius_for_pass(base_radius, config.vcm_radius_alpha, pass_index);
                let constants = VcmConstants::new(radius, width, height);
                rng = Rng::new(worker_index, pass_index, 0);
                vcm::run_pass(scene, config, &mut rng, &constants, &mut storage, &mut private);
            }
            Variant::Pt => {
                rng = Rng::new(worker_index, pass_index, 0);
                pt::run_sweep(scene, config, &mut rng, &mut private);
            }
        }

        shared.merge(&private);
        private.clear();
        pass_counter.fetch_add(1, Ordering::Relaxed);
        if let Some(stats) = stats {
            stats.passes_completed.fetch_add(1, Ordering::Relaxed);
        }
        pass_index += 1;
    }

    if let Some(stats) = stats {
        stats.completed_threads.fetch_add(1, Ordering::Relaxed);
    }
    log::debug!("worker {worker_index} finished after {} passes", pass_index - 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::config::NextEventEstimation;
    use crate::ibl::ProceduralSky;
    use crate::scene::{bounding_sphere_of, Bvh, Vertex};

    fn empty_scene(width: u32, height: u32) -> Scene {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y, 60.0, width, height);
        let bvh = Bvh::build(Vec::<Vertex>::new(), Vec::new()).unwrap();
        Scene {
            bvh,
            materials: Vec::new(),
            textures: Vec::new(),
            bounding_sphere: bounding_sphere_of(&[]),
            camera,
            ibl: Box::new(ProceduralSky::default()),
        }
    }

    #[test]
    fn render_an_empty_scene_completes_and_stays_finite() {
        let scene = Arc::new(empty_scene(4, 4));
        let config = TracingConfig {
            max_bounces: 4,
            integration_seconds: 0.05,
            vcm_radius_factor: 0.01,
            vcm_radius_alpha: 0.75,
            rays_per_pixel: 1,
            worker_count: 2,
            nee: NextEventEstimation::WithMis,
            min_bounces: 1,
        };
        let pixels = render(scene, config, Variant::Vcm, None);
        assert_eq!(pixels.len(), 16);
        for p in pixels {
            assert!(p.is_finite());
        }
    }

    #[test]
    fn pt_variant_on_empty_scene_produces_sky_only() {
        let scene = Arc::new(empty_scene(2, 2));
        let config = TracingConfig {
            max_bounces: 2,
            integration_seconds: 0.02,
            vcm_radius_factor: 0.01,
            vcm_radius_alpha: 0.75,
            rays_per_pixel: 1,
            worker_count: 1,
            nee: NextEventEstimation::Off,
            min_bounces: 1,
        };
        let pixels = render(scene, config, Variant::Pt, None);
        assert_eq!(pixels.len(), 4);
        for p in pixels {
            assert!(p.is_finite());
            assert!(p.max_element() >= 0.0);
        }
    }
}
