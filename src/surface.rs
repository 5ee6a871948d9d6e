use glam::{Vec2, Vec3};

use crate::scene::{Hit, Material, Triangle, Vertex};
use crate::texture::{ColorSpace, ImageTexture, TextureFilter};

const EPS_SMALL: f32 = 1e-8;

#[derive(Debug, Clone)]
pub struct SurfaceParameters {
    pub position: Vec3,
    pub geometric_normal: Vec3,
    pub shading_normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub dp_du: Vec3,
    pub dp_dv: Vec3,
    pub dn_du: Vec3,
    pub dn_dv: Vec3,
    pub duv_dx: Vec2,
    pub duv_dy: Vec2,
    pub uv: Vec2,

    pub albedo: Vec3,
    pub specular: Vec3,
    pub roughness: f32,
    pub metalness: f32,
    pub ior: f32,
    pub emissive: Vec3,
    pub transparent: bool,

    pub error_bound: f32,
}

impl SurfaceParameters {
    pub fn world_to_tangent(&self) -> glam::Mat3 {
        glam::Mat3::from_cols(self.tangent, self.shading_normal, self.bitangent).transpose()
    }

    pub fn tangent_to_world(&self) -> glam::Mat3 {
        glam::Mat3::from_cols(self.tangent, self.shading_normal, self.bitangent)
    }
}

fn synth_cartesian(n: Vec3) -> (Vec3, Vec3) {
    let arbitrary = if n.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    let tangent = n.cross(arbitrary).normalize();
    let bitangent = n.cross(tangent);
    (tangent, bitangent)
}

fn lookup_channel(
    texture_index: Option<usize>,
    textures: &[ImageTexture],
    uv: Vec2,
    space: ColorSpace,
    default: Vec3,
) -> Vec3 {
    match texture_index.and_then(|i| textures.get(i)) {
        Some(tex) => {
            let rgba = tex.triangle(uv, space);
            Vec3::new(rgba[0], rgba[1], rgba[2])
        }
        None => default,
    }
}

// returns None only for a backface hit on an opaque material (step 3); every
// other precision edge below is clamped rather than rejected
pub fn reconstruct(
    hit: &Hit,
    triangle: &Triangle,
    vertices: &[Vertex],
    materials: &[Material],
    textures: &[ImageTexture],
    preserve_differentials: bool,
) -> Option<SurfaceParameters> {
    let v0 = &vertices[triangle.indices[0] as usize];
    let v1 = &vertices[triangle.indices[1] as usize];
    let v2 = &vertices[triangle.indices[2] as usize];
    let material = &materials[triangle.material_index as usize];

    // 1. Barycentric interpolation, a0 clamped against precision drift.
    let a0 = (1.0 - hit.u - hit.v).clamp(0.0, 1.0);
    let a1 = hit.u;
    let a2 = hit.v;

    let interpolated_normal = (v0.normal * a0 + v1.normal * a1 + v2.normal * a2).normalize_or_zero();
    let interpolated_tangent = (v0.tangent * a0 + v1.tangent * a1 + v2.tangent * a2).normalize_or_zero();
    let bh = if a0 * v0.bitangent_handedness + a1 * v1.bitangent_handedness + a2 * v2.bitangent_handedness >= 0.0 {
        1.0
    } else {
        -1.0
    };

    let edge1 = v1.position - v0.position;
    let edge2 = v2.position - v0.position;
    let geometric_normal = edge1.cross(edge2).normalize_or_zero();

    let shading_normal = if interpolated_normal.length_squared() > EPS_SMALL {
        interpolated_normal
    } else {
        geometric_normal
    };

    // 2. Interpolated UV.
    let uv = v0.uv * a0 + v1.uv * a1 + v2.uv * a2;

    // 3. Backface reject.
    if geometric_normal.dot(hit.view_dir) < 0.0 && !material.transparent {
        return None;
    }

    // 4. Tangent-to-world basis.
    let mut tangent = if interpolated_tangent.length_squared() > EPS_SMALL {
        interpolated_tangent - shading_normal * shading_normal.dot(interpolated_tangent)
    } else {
        Vec3::ZERO
    };
    if tangent.length_squared() < EPS_SMALL {
        let (t, _) = synth_cartesian(shading_normal);
        tangent = t;
    }
    tangent = tangent.normalize();
    let bitangent = shading_normal.cross(tangent) * bh;

    // 5. UV derivatives.
    let uv0 = v0.uv;
    let uv1 = v1.uv;
    let uv2 = v2.uv;
    let duv02 = uv0 - uv2;
    let duv12 = uv1 - uv2;
    let det = duv02.x * duv12.y - duv02.y * duv12.x;

    let (mut dp_du, mut dp_dv, mut dn_du, mut dn_dv) = (Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
    if det.abs() < 1e-9 {
        let (t, b) = synth_cartesian(geometric_normal);
        dp_du = t;
        dp_dv = b;
    } else if preserve_differentials {
        let inv_det = 1.0 / det;
        let dp02 = v0.position - v2.position;
        let dp12 = v1.position - v2.position;
        dp_du = (dp02 * duv12.y - dp12 * duv02.y) * inv_det;
        dp_dv = (dp12 * duv02.x - dp02 * duv12.x) * inv_det;

        let dn02 = v0.normal - v2.normal;
        let dn12 = v1.normal - v2.normal;
        dn_du = (dn02 * duv12.y - dn12 * duv02.y) * inv_det;
        dn_dv = (dn12 * duv02.x - dn02 * duv12.x) * inv_det;
    }

    // 6. Ray differentials.
    let mut duv_dx = Vec2::ZERO;
    let mut duv_dy = Vec2::ZERO;
    if let Some(diff) = hit.differential {
        if let Some((dx, dy)) = solve_ray_differentials(hit.position, geometric_normal, dp_du, dp_dv, &diff) {
            duv_dx = dx;
            duv_dy = dy;
        }
    }
    if !duv_dx.is_finite() || !duv_dy.is_finite() {
        duv_dx = Vec2::ZERO;
        duv_dy = Vec2::ZERO;
    }

    // 7. Texture lookups.
    let emissive = lookup_channel(material.emissive_texture, textures, uv, ColorSpace::Linear, Vec3::ZERO);
    let albedo = material.albedo * lookup_channel(material.albedo_texture, textures, uv, ColorSpace::Srgb, Vec3::ONE);
    let specular = if material.specular_texture.is_some() {
        lookup_channel(material.specular_texture, textures, uv, ColorSpace::Linear, albedo)
    } else {
        material.specular.unwrap_or(albedo)
    };
    let roughness = material.roughness * lookup_channel(material.roughness_texture, textures, uv, ColorSpace::Linear, Vec3::ONE).x;
    let metalness = material.metalness * lookup_channel(material.metalness_texture, textures, uv, ColorSpace::Linear, Vec3::ONE).x;

    let mut perturbed_normal = shading_normal;
    if let Some(tex_idx) = material.normal_texture {
        if let Some(tex) = textures.get(tex_idx) {
            let rgba = tex.triangle(uv, ColorSpace::Linear);
            let mapped = Vec3::new(rgba[0], rgba[1], rgba[2]) * 2.0 - Vec3::ONE;
            let world = tangent * mapped.x + (-bitangent) * mapped.y + shading_normal * mapped.z;
            perturbed_normal = world.normalize_or_zero();
            if perturbed_normal.length_squared() < EPS_SMALL {
                perturbed_normal = shading_normal;
            }
        }
    }

    Some(SurfaceParameters {
        position: hit.position,
        geometric_normal,
        shading_normal: perturbed_normal,
        tangent,
        bitangent,
        dp_du,
        dp_dv,
        dn_du,
        dn_dv,
        duv_dx,
        duv_dy,
        uv,
        albedo,
        specular,
        roughness: roughness.clamp(0.02, 1.0),
        metalness: metalness.clamp(0.0, 1.0),
        ior: material.ior,
        emissive,
        transparent: material.transparent,
        error_bound: hit.error_bound,
    })
}

fn solve_ray_differentials(
    p: Vec3,
    n: Vec3,
    dp_du: Vec3,
    dp_dv: Vec3,
    diff: &crate::scene::RayDifferential,
) -> Option<(Vec2, Vec2)> {
    let d = n.dot(p);
    let tx = -(n.dot(diff.rx_origin) - d) / n.dot(diff.rx_direction).clamp_sign_nonzero();
    let ty = -(n.dot(diff.ry_origin) - d) / n.dot(diff.ry_direction).clamp_sign_nonzero();
    if !tx.is_finite() || !ty.is_finite() {
        return None;
    }
    let px = diff.rx_origin + diff.rx_direction * tx;
    let py = diff.ry_origin + diff.ry_direction * ty;

    // Choose the two axes whose projection of n is smallest, to avoid a
    // near-singular 2x2 system.
    let abs_n = n.abs();
    let (a0, a1) = if abs_n.x > abs_n.y && abs_n.x > abs_n.z {
        (1usize, 2usize)
    } else if abs_n.y > abs_n.z {
        (0usize, 2usize)
    } else {
        (0usize, 1usize)
    };

    let a = [[dp_du[a0], dp_dv[a0]], [dp_du[a1], dp_dv[a1]]];
    let bx = [px[a0] - p[a0], px[a1] - p[a1]];
    let by = [py[a0] - p[a0], py[a1] - p[a1]];

    let det = a[0][0] * a[1][1] - a[0][1] * a[1][0];
    if det.abs() < 1e-9 {
        return None;
    }
    let inv_det = 1.0 / det;
    let duv_dx = Vec2::new(
        (a[1][1] * bx[0] - a[0][1] * bx[1]) * inv_det,
        (a[0][0] * bx[1] - a[1][0] * bx[0]) * inv_det,
    );
    let duv_dy = Vec2::new(
        (a[1][1] * by[0] - a[0][1] * by[1]) * inv_det,
        (a[0][0] * by[1] - a[1][0] * by[0]) * inv_det,
    );
    if !duv_dx.is_finite() || !duv_dy.is_finite() {
        return None;
    }
    Some((duv_dx, duv_dy))
}

trait ClampSignNonzero {
    fn clamp_sign_nonzero(self) -> Self;
}

impl ClampSignNonzero for f32 {
    fn clamp_sign_nonzero(self) -> f32 {
        if self.abs() < 1e-8 {
            if self >= 0.0 {
                1e-8
            } else {
                -1e-8
            }
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Material;

    fn make_triangle_degenerate_uv() -> (Triangle, Vec<Vertex>, Vec<Material>) {
        let vertices = vec![
            Vertex {
                position: Vec3::new(0.0, 0.0, 0.0),
                normal: Vec3::Y,
                tangent: Vec3::X,
                bitangent_handedness: 1.0,
                uv: Vec2::new(0.3, 0.3),
            },
            Vertex {
                position: Vec3::new(1.0, 0.0, 0.0),
                normal: Vec3::Y,
                tangent: Vec3::X,
                bitangent_handedness: 1.0,
                uv: Vec2::new(0.3, 0.3),
            },
            Vertex {
                position: Vec3::new(0.0, 0.0, 1.0),
                normal: Vec3::Y,
                tangent: Vec3::X,
                bitangent_handedness: 1.0,
                uv: Vec2::new(0.3, 0.3),
            },
        ];
        let triangle = Triangle { indices: [0, 1, 2], material_index: 0 };
        let materials = vec![Material { albedo: Vec3::ONE, roughness: 1.0, metalness: 0.0, ior: 1.5, ..Default::default() }];
        (triangle, vertices, materials)
    }

    #[test]
    fn degenerate_uv_synthesises_orthonormal_frame_and_zero_normal_derivatives() {
        let (triangle, vertices, materials) = make_triangle_degenerate_uv();
        let hit = Hit {
            position: Vec3::new(0.2, 0.0, 0.2),
            primitive_id: 0,
            u: 0.3,
            v: 0.3,
            view_dir: Vec3::Y,
            error_bound: 1e-4,
            differential: None,
        };
        let surface = reconstruct(&hit, &triangle, &vertices, &materials, &[], true).unwrap();
        assert!((surface.dp_du.dot(surface.dp_dv)).abs() < 1e-4);
        assert_eq!(surface.dn_du, Vec3::ZERO);
        assert_eq!(surface.dn_dv, Vec3::ZERO);
    }

    #[test]
    fn backface_hit_on_opaque_material_is_rejected() {
        let (triangle, vertices, materials) = make_triangle_degenerate_uv();
        let hit = Hit {
            position: Vec3::new(0.2, 0.0, 0.2),
            primitive_id: 0,
            u: 0.3,
            v: 0.3,
            view_dir: -Vec3::Y,
            error_bound: 1e-4,
            differential: None,
        };
        assert!(reconstruct(&hit, &triangle, &vertices, &materials, &[], true).is_none());
    }

    #[test]
    fn tangent_frame_round_trips_within_tolerance() {
        let (triangle, vertices, materials) = make_triangle_degenerate_uv();
        let hit = Hit {
            position: Vec3::new(0.2, 0.0, 0.2),
            primitive_id: 0,
            u: 0.3,
            v: 0.3,
            view_dir: Vec3::Y,
            error_bound: 1e-4,
            differential: None,
        };
        let surface = reconstruct(&hit, &triangle, &vertices, &materials, &[], true).unwrap();
        let identity = surface.world_to_tangent() * surface.tangent_to_world();
        let diff = identity - glam::Mat3::IDENTITY;
        for col in diff.to_cols_array() {
            assert!(col.abs() < 1e-4);
        }
    }
}
