use glam::{Vec2, Vec3};

use crate::camera::Camera;
use crate::error::RenderError;
use crate::ibl::ProceduralSky;
use crate::scene::{bounding_sphere_of, Bvh, Material, Scene, Triangle, Vertex};

struct MeshBuilder {
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
}

impl MeshBuilder {
    fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    // a, b, c, d wind counter-clockwise when viewed from the side normal points toward
    fn add_quad(&mut self, a: Vec3, b: Vec3, c: Vec3, d: Vec3, normal: Vec3, material_index: u32) {
        let tangent = (b - a).normalize();
        let base = self.vertices.len() as u32;
        let uvs = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
        for (p, uv) in [a, b, c, d].into_iter().zip(uvs) {
            self.vertices.push(Vertex {
                position: p,
                normal,
                tangent,
                bitangent_handedness: 1.0,
                uv,
            });
        }
        self.triangles.push(Triangle {
            indices: [base, base + 1, base + 2],
            material_index,
        });
        self.triangles.push(Triangle {
            indices: [base, base + 2, base + 3],
            material_index,
        });
    }

    fn build(self) -> Result<Bvh, RenderError> {
        Bvh::build(self.vertices, self.triangles)
    }
}

fn diffuse(albedo: Vec3) -> Material {
    Material {
        albedo,
        roughness: 1.0,
        metalness: 0.0,
        ior: 1.5,
        ..Default::default()
    }
}

fn emissive(radiance: Vec3) -> Material {
    Material {
        albedo: Vec3::ZERO,
        emissive: radiance,
        roughness: 1.0,
        ior: 1.5,
        ..Default::default()
    }
}

pub fn empty(width: u32, height: u32) -> Result<Scene, RenderError> {
    let bvh = Bvh::build(Vec::new(), Vec::new())?;
    let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 50.0, width, height);
    Ok(Scene {
        bvh,
        materials: Vec::new(),
        textures: Vec::new(),
        bounding_sphere: bounding_sphere_of(&[]),
        camera,
        ibl: Box::new(ProceduralSky::default()),
    })
}

pub fn cornell_box(width: u32, height: u32) -> Result<Scene, RenderError> {
    let mut mesh = MeshBuilder::new();

    let white = diffuse(Vec3::splat(0.76));
    let red = diffuse(Vec3::new(0.63, 0.065, 0.05));
    let green = diffuse(Vec3::new(0.14, 0.45, 0.091));
    let light = emissive(Vec3::splat(15.0));

    let materials = vec![white, red, green, light];
    const WHITE: u32 = 0;
    const RED: u32 = 1;
    const GREEN: u32 = 2;
    const LIGHT: u32 = 3;

    let (x0, x1) = (-1.0, 1.0);
    let (y0, y1) = (-1.0, 1.0);
    let (z0, z1) = (-1.0, 1.0);

    // Floor.
    mesh.add_quad(
        Vec3::new(x0, y0, z1),
        Vec3::new(x1, y0, z1),
        Vec3::new(x1, y0, z0),
        Vec3::new(x0, y0, z0),
        Vec3::Y,
        WHITE,
    );
    // Ceiling.
    mesh.add_quad(
        Vec3::new(x0, y1, z0),
        Vec3::new(x1, y1, z0),
        Vec3::new(x1, y1, z1),
        Vec3::new(x0, y1, z1),
        -Vec3::Y,
        WHITE,
    );
    // Back wall.
    mesh.add_quad(
        Vec3::new(x0, y0, z0),
        Vec3::new(x1, y0, z0),
        Vec3::new(x1, y1, z0),
        Vec3::new(x0, y1, z0),
        Vec3::Z,
        WHITE,
    );
    // Left wall (red).
    mesh.add_quad(
        Vec3::new(x0, y0, z1),
        Vec3::new(x0, y0, z0),
        Vec3::new(x0, y1, z0),
        Vec3::new(x0, y1, z1),
        Vec3::X,
        RED,
    );
    // Right wall (green).
    mesh.add_quad(
        Vec3::new(x1, y0, z0),
        Vec3::new(x1, y0, z1),
        Vec3::new(x1, y1, z1),
        Vec3::new(x1, y1, z0),
        -Vec3::X,
        GREEN,
    );
    // Ceiling light.
    let lx = 0.25;
    let lz0 = -0.25;
    let lz1 = 0.25;
    mesh.add_quad(
        Vec3::new(-lx, y1 - 0.001, lz0),
        Vec3::new(lx, y1 - 0.001, lz0),
        Vec3::new(lx, y1 - 0.001, lz1),
        Vec3::new(-lx, y1 - 0.001, lz1),
        -Vec3::Y,
        LIGHT,
    );

    // Tall box (back-right).
    add_box(&mut mesh, Vec3::new(0.35, y0, -0.35), Vec3::new(0.3, 0.6, 0.3), 15.0, WHITE);
    // Short box (front-left).
    add_box(&mut mesh, Vec3::new(-0.35, y0, 0.3), Vec3::new(0.3, 0.3, 0.3), -18.0, WHITE);

    let bvh = mesh.build()?;
    let bounding_sphere = bounding_sphere_of(bvh.vertices());
    let camera = Camera::look_at(Vec3::new(0.0, 0.0, 3.2), Vec3::ZERO, Vec3::Y, 40.0, width, height);

    Ok(Scene {
        bvh,
        materials,
        textures: Vec::new(),
        bounding_sphere,
        camera,
        ibl: Box::new(ProceduralSky {
            zenith_color: Vec3::ZERO,
            horizon_color: Vec3::ZERO,
            sun_color: Vec3::ZERO,
            ..ProceduralSky::default()
        }),
    })
}

fn add_box(mesh: &mut MeshBuilder, center: Vec3, half_extents: Vec3, y_rotation_degrees: f32, material_index: u32) {
    let angle = y_rotation_degrees.to_radians();
    let (s, c) = angle.sin_cos();
    let rotate = |local: Vec3| -> Vec3 {
        Vec3::new(local.x * c + local.z * s, local.y, -local.x * s + local.z * c) + center
    };

    let h = half_extents;
    let corner = |sx: f32, sy: f32, sz: f32| rotate(Vec3::new(sx * h.x, sy * h.y, sz * h.z));

    // +Y
    mesh.add_quad(corner(-1.0, 1.0, -1.0), corner(1.0, 1.0, -1.0), corner(1.0, 1.0, 1.0), corner(-1.0, 1.0, 1.0), Vec3::Y, material_index);
    // -Y
    mesh.add_quad(corner(-1.0, -1.0, 1.0), corner(1.0, -1.0, 1.0), corner(1.0, -1.0, -1.0), corner(-1.0, -1.0, -1.0), -Vec3::Y, material_index);
    // +X
    mesh.add_quad(corner(1.0, -1.0, -1.0), corner(1.0, -1.0, 1.0), corner(1.0, 1.0, 1.0), corner(1.0, 1.0, -1.0), Vec3::X, material_index);
    // -X
    mesh.add_quad(corner(-1.0, -1.0, 1.0), corner(-1.0, -1.0, -1.0), corner(-1.0, 1.0, -1.0), corner(-1.0, 1.0, 1.0), -Vec3::X, material_index);
    // +Z
    mesh.add_quad(corner(1.0, -1.0, 1.0), corner(-1.0, -1.0, 1.0), corner(-1.0, 1.0, 1.0), corner(1.0, 1.0, 1.0), Vec3::Z, material_index);
    // -Z
    mesh.add_quad(corner(-1.0, -1.0, -1.0), corner(1.0, -1.0, -1.0), corner(1.0, 1.0, -1.0), corner(-1.0, 1.0, -1.0), -Vec3::Z, material_index);
}

pub fn furnace(width: u32, height: u32, environment_radiance: Vec3, albedo: Vec3) -> Result<Scene, RenderError> {
    let mut mesh = MeshBuilder::new();
    let material = diffuse(albedo);
    mesh.add_quad(
        Vec3::new(-5.0, 0.0, 5.0),
        Vec3::new(5.0, 0.0, 5.0),
        Vec3::new(5.0, 0.0, -5.0),
        Vec3::new(-5.0, 0.0, -5.0),
        Vec3::Y,
        0,
    );
    let bvh = mesh.build()?;
    let bounding_sphere = bounding_sphere_of(bvh.vertices());
    let camera = Camera::look_at(Vec3::new(0.0, 2.0, 4.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y, 50.0, width, height);

    Ok(Scene {
        bvh,
        materials: vec![material],
        textures: Vec::new(),
        bounding_sphere,
        camera,
        ibl: Box::new(ProceduralSky {
            zenith_color: environment_radiance,
            horizon_color: environment_radiance,
            sun_color: Vec3::ZERO,
            sun_angular_radius: 0.0,
            ..ProceduralSky::default()
        }),
    })
}

pub fn by_name(name: &str, width: u32, height: u32) -> Result<Scene, RenderError> {
    match name {
        "empty" => empty(width, height),
        "cornell" => cornell_box(width, height),
        "furnace" => furnace(width, height, Vec3::splat(1.0), Vec3::splat(0.5)),
        other => Err(RenderError::MissingAsset(format!("no built-in scene named '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scene_has_no_triangles() {
        let scene = empty(4, 4).unwrap();
        assert!(scene.triangles().is_empty());
    }

    #[test]
    fn cornell_box_builds_with_all_materials_referenced() {
        let scene = cornell_box(16, 16).unwrap();
        assert_eq!(scene.materials.len(), 4);
        assert!(!scene.triangles().is_empty());
        for tri in scene.triangles() {
            assert!((tri.material_index as usize) < scene.materials.len());
        }
    }

    #[test]
    fn furnace_scene_has_a_single_material() {
        let scene = furnace(8, 8, Vec3::ONE, Vec3::splat(0.5)).unwrap();
        assert_eq!(scene.materials.len(), 1);
    }

    #[test]
    fn by_name_rejects_unknown_scenes() {
        assert!(by_name("not-a-real-scene", 4, 4).is_err());
    }
}
