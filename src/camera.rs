use glam::{Mat4, Vec2, Vec3};

use crate::rng::Rng;

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
    pub right: Vec3,
    pub image_plane_distance: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub width: u32,
    pub height: u32,
}

impl Camera {
    pub fn look_at(position: Vec3, target: Vec3, up_hint: Vec3, vfov_degrees: f32, width: u32, height: u32) -> Self {
        let forward = (target - position).normalize();
        let right = forward.cross(up_hint).normalize();
        let up = right.cross(forward).normalize();

        let aspect = width as f32 / height as f32;
        let viewport_height = 2.0 * (vfov_degrees.to_radians() * 0.5).tan();
        let viewport_width = viewport_height * aspect;

        Self {
            position,
            forward,
            up,
            right,
            image_plane_distance: 1.0,
            viewport_width,
            viewport_height,
            width,
            height,
        }
    }

    fn view_to_world(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward, self.up).inverse()
    }

    pub fn jittered_camera_ray(&self, rng: &mut Rng, x: u32, y: u32) -> Ray {
        let jitter = rng.gen_r2();
        let ndc_x = ((x as f32 + jitter.x) / self.width as f32) * 2.0 - 1.0;
        let ndc_y = 1.0 - ((y as f32 + jitter.y) / self.height as f32) * 2.0;

        let local = Vec3::new(
            ndc_x * self.viewport_width * 0.5,
            ndc_y * self.viewport_height * 0.5,
            -self.image_plane_distance,
        );
        let world_point = self.view_to_world().transform_point3(local);
        let direction = (world_point - self.position).normalize();
        Ray {
            origin: self.position,
            direction,
        }
    }

    // returns None if the point is behind the camera or outside the image bounds
    pub fn world_to_image(&self, p: Vec3) -> Option<(u32, u32)> {
        let local = self.view_to_world().inverse().transform_point3(p);
        if local.z >= 0.0 {
            return None;
        }
        let t = -self.image_plane_distance / local.z;
        let plane = local * t;

        let ndc_x = plane.x / (self.viewport_width * 0.5);
        let ndc_y = plane.y / (self.viewport_height * 0.5);
        if !(-1.0..=1.0).contains(&ndc_x) || !(-1.0..=1.0).contains(&ndc_y) {
            return None;
        }

        let px = ((ndc_x + 1.0) * 0.5 * self.width as f32) as u32;
        let py = ((1.0 - ndc_y) * 0.5 * self.height as f32) as u32;
        Some((px.min(self.width - 1), py.min(self.height - 1)))
    }

    pub fn image_to_solid_angle_pdf(&self) -> f32 {
        let image_area = self.viewport_width * self.viewport_height;
        self.image_plane_distance * self.image_plane_distance / image_area
    }

    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.viewport_width, self.viewport_height)
    }
}
