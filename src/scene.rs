use glam::{Vec2, Vec3};

use crate::camera::Camera;
use crate::ibl::Ibl;
use crate::texture::ImageTexture;

#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    // sign of the bitangent relative to cross(normal, tangent)
    pub bitangent_handedness: f32,
    pub uv: Vec2,
}

#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub indices: [u32; 3],
    pub material_index: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Material {
    pub albedo: Vec3,
    pub specular: Option<Vec3>,
    pub roughness: f32,
    pub metalness: f32,
    pub ior: f32,
    pub emissive: Vec3,
    pub transparent: bool,

    pub albedo_texture: Option<usize>,
    pub specular_texture: Option<usize>,
    pub roughness_texture: Option<usize>,
    pub metalness_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub emissive_texture: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RayDifferential {
    pub rx_origin: Vec3,
    pub rx_direction: Vec3,
    pub ry_origin: Vec3,
    pub ry_direction: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub position: Vec3,
    pub primitive_id: u32,
    pub u: f32,
    pub v: f32,
    pub view_dir: Vec3,
    // conservative bound on floating-point error in position, used to derive the shadow-ray offset
    pub error_bound: f32,
    pub differential: Option<RayDifferential>,
}

pub trait RayIntersector {
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<Hit>;
    fn occluded(&self, origin: Vec3, direction: Vec3, tnear: f32, tfar: f32) -> bool;
}

// nudges a shadow-ray origin along the geometric normal by a bias proportional to the hit's error bound
pub fn offset_ray_origin(position: Vec3, geometric_normal: Vec3, direction: Vec3, error_bound: f32) -> Vec3 {
    const K: f32 = 0.1;
    let sign = if geometric_normal.dot(direction) > 0.0 { 1.0 } else { -1.0 };
    position + geometric_normal * (sign * error_bound.max(1e-5) * K * 10.0)
}

#[derive(Clone, Copy, Default)]
struct BvhNode {
    aabb_min: Vec3,
    aabb_max: Vec3,
    left_or_first_triangle: u32,
    triangle_count: u32,
}

impl BvhNode {
    fn is_leaf(&self) -> bool {
        self.triangle_count > 0
    }
}

pub struct Bvh {
    nodes: Vec<BvhNode>,
    indirect_indices: Vec<u32>,
    vertices: Vec<Vertex>,
    triangles: Vec<Triangle>,
}

fn triangle_centroid(tri: &Triangle, vertices: &[Vertex]) -> Vec3 {
    let a = vertices[tri.indices[0] as usize].position;
    let b = vertices[tri.indices[1] as usize].position;
    let c = vertices[tri.indices[2] as usize].position;
    (a + b + c) / 3.0
}

fn triangle_bounds(tri: &Triangle, vertices: &[Vertex]) -> (Vec3, Vec3) {
    let a = vertices[tri.indices[0] as usize].position;
    let b = vertices[tri.indices[1] as usize].position;
    let c = vertices[tri.indices[2] as usize].position;
    (a.min(b).min(c), a.max(b).max(c))
}

impl BvhNode {
    fn update_aabb(&mut self, triangles: &[Triangle], vertices: &[Vertex], indirect_indices: &[u32]) {
        self.aabb_min = Vec3::splat(f32::INFINITY);
        self.aabb_max = Vec3::splat(f32::NEG_INFINITY);
        for i in 0..self.triangle_count {
            let tri_idx = indirect_indices[(self.left_or_first_triangle + i) as usize];
            let (tmin, tmax) = triangle_bounds(&triangles[tri_idx as usize], vertices);
            self.aabb_min = self.aabb_min.min(tmin);
            self.aabb_max = self.aabb_max.max(tmax);
        }
    }
}

impl Bvh {
    pub fn build(vertices: Vec<Vertex>, triangles: Vec<Triangle>) -> Result<Self, crate::error::RenderError> {
        if triangles.is_empty() {
            return Ok(Self {
                nodes: vec![BvhNode::default()],
                indirect_indices: Vec::new(),
                vertices,
                triangles,
            });
        }

        let mut indirect_indices: Vec<u32> = (0..triangles.len() as u32).collect();
        let centroids: Vec<Vec3> = triangles.iter().map(|t| triangle_centroid(t, &vertices)).collect();

        let mut nodes = vec![BvhNode::default(); triangles.len() * 2 - 1];
        let mut node_count = 1;

        nodes[0].left_or_first_triangle = 0;
        nodes[0].triangle_count = triangles.len() as u32;
        nodes[0].update_aabb(&triangles, &vertices, &indirect_indices);

        let mut stack = vec![0usize];
        while let Some(node_idx) = stack.pop() {
            let (aabb_min, aabb_max, first, count) = {
                let node = &nodes[node_idx];
                (node.aabb_min, node.aabb_max, node.left_or_first_triangle, node.triangle_count)
            };
            if count <= 2 {
                continue;
            }

            let extent = aabb_max - aabb_min;
            let mut axis = 0usize;
            if extent.y > extent.x {
                axis = 1;
            }
            if extent.z > extent[axis] {
                axis = 2;
            }
            let split = aabb_min[axis] + extent[axis] * 0.5;

            let mut a = first;
            let mut b = first + count - 1;
            while a <= b {
                let centroid = centroids[indirect_indices[a as usize] as usize][axis];
                if centroid < split {
                    a += 1;
                } else {
                    indirect_indices.swap(a as usize, b as usize);
                    if b == 0 {
                        break;
                    }
                    b -= 1;
                }
            }

            let left_count = a - first;
            if left_count == 0 || left_count == count {
                continue;
            }

            let left_idx = node_count;
            let right_idx = node_count + 1;
            node_count += 2;

            nodes[node_idx].left_or_first_triangle = left_idx as u32;
            nodes[node_idx].triangle_count = 0;

            nodes[left_idx].left_or_first_triangle = first;
            nodes[left_idx].triangle_count = left_count;
            nodes[right_idx].left_or_first_triangle = a;
            nodes[right_idx].triangle_count = count - left_count;
            nodes[left_idx].update_aabb(&triangles, &vertices, &indirect_indices);
            nodes[right_idx].update_aabb(&triangles, &vertices, &indirect_indices);

            stack.push(right_idx);
            stack.push(left_idx);
        }

        nodes.truncate(node_count);
        log::info!("BVH built: {} triangles, {} nodes", triangles.len(), nodes.len());

        Ok(Self {
            nodes,
            indirect_indices,
            vertices,
            triangles,
        })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    fn intersect_aabb(aabb_min: Vec3, aabb_max: Vec3, ro: Vec3, rd: Vec3, prev_min_t: f32) -> f32 {
        let tx1 = (aabb_min.x - ro.x) / rd.x;
        let tx2 = (aabb_max.x - ro.x) / rd.x;
        let mut tmin = tx1.min(tx2);
        let mut tmax = tx1.max(tx2);
        let ty1 = (aabb_min.y - ro.y) / rd.y;
        let ty2 = (aabb_max.y - ro.y) / rd.y;
        tmin = tmin.max(ty1.min(ty2));
        tmax = tmax.min(ty1.max(ty2));
        let tz1 = (aabb_min.z - ro.z) / rd.z;
        let tz2 = (aabb_max.z - ro.z) / rd.z;
        tmin = tmin.max(tz1.min(tz2));
        tmax = tmax.min(tz1.max(tz2));
        if tmax >= tmin && tmax > 0.0 && tmin < prev_min_t {
            tmin
        } else {
            f32::INFINITY
        }
    }

    fn moller_trumbore(ro: Vec3, rd: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<(f32, f32, f32)> {
        let edge1 = b - a;
        let edge2 = c - a;
        let pv = rd.cross(edge2);
        let det = edge1.dot(pv);
        if det.abs() < 1e-8 {
            return None;
        }
        let inv_det = 1.0 / det;
        let tv = ro - a;
        let u = tv.dot(pv) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qv = tv.cross(edge1);
        let v = rd.dot(qv) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(qv) * inv_det;
        if t < 1e-4 {
            return None;
        }
        Some((t, u, v))
    }

    fn intersect_front_to_back(&self, ro: Vec3, rd: Vec3, any_hit: bool, max_t: f32) -> Option<(u32, f32, f32, f32)> {
        if self.triangles.is_empty() {
            return None;
        }
        let mut stack = Vec::with_capacity(32);
        stack.push(0usize);
        let mut best: Option<(u32, f32, f32, f32)> = None;
        let mut best_t = f32::INFINITY;

        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if node.is_leaf() {
                for i in 0..node.triangle_count {
                    let tri_idx = self.indirect_indices[(node.left_or_first_triangle + i) as usize];
                    let tri = &self.triangles[tri_idx as usize];
                    let a = self.vertices[tri.indices[0] as usize].position;
                    let b = self.vertices[tri.indices[1] as usize].position;
                    let c = self.vertices[tri.indices[2] as usize].position;
                    if let Some((t, u, v)) = Self::moller_trumbore(ro, rd, a, b, c) {
                        if t < best_t && (!any_hit || t <= max_t) {
                            best_t = t;
                            best = Some((tri_idx, t, u, v));
                            if any_hit {
                                return best;
                            }
                        }
                    }
                }
            } else {
                let mut min_index = node.left_or_first_triangle as usize;
                let mut max_index = min_index + 1;
                let mut min_dist = Self::intersect_aabb(self.nodes[min_index].aabb_min, self.nodes[min_index].aabb_max, ro, rd, best_t);
                let mut max_dist = Self::intersect_aabb(self.nodes[max_index].aabb_min, self.nodes[max_index].aabb_max, ro, rd, best_t);
                if min_dist > max_dist {
                    std::mem::swap(&mut min_index, &mut max_index);
                    std::mem::swap(&mut min_dist, &mut max_dist);
                }
                if min_dist.is_infinite() {
                    continue;
                }
                if max_dist.is_finite() {
                    stack.push(max_index);
                }
                stack.push(min_index);
            }
        }
        best
    }
}

impl RayIntersector for Bvh {
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<Hit> {
        let (tri_idx, t, u, v) = self.intersect_front_to_back(origin, direction, false, f32::INFINITY)?;
        let position = origin + direction * t;
        Some(Hit {
            position,
            primitive_id: tri_idx,
            u,
            v,
            view_dir: -direction,
            error_bound: t * 1e-4,
            differential: None,
        })
    }

    fn occluded(&self, origin: Vec3, direction: Vec3, tnear: f32, tfar: f32) -> bool {
        let ro = origin + direction * tnear;
        self.intersect_front_to_back(ro, direction, true, tfar - tnear).is_some()
    }
}

pub fn bounding_sphere_of(vertices: &[Vertex]) -> BoundingSphere {
    if vertices.is_empty() {
        return BoundingSphere { center: Vec3::ZERO, radius: 1.0 };
    }
    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for v in vertices {
        min = min.min(v.position);
        max = max.max(v.position);
    }
    let center = (min + max) * 0.5;
    let radius = vertices.iter().map(|v| (v.position - center).length()).fold(0.0f32, f32::max).max(1e-3);
    BoundingSphere { center, radius }
}

pub struct Scene {
    pub bvh: Bvh,
    pub materials: Vec<Material>,
    pub textures: Vec<ImageTexture>,
    pub bounding_sphere: BoundingSphere,
    pub camera: Camera,
    pub ibl: Box<dyn Ibl>,
}

impl Scene {
    pub fn vertices(&self) -> &[Vertex] {
        self.bvh.vertices()
    }

    pub fn triangles(&self) -> &[Triangle] {
        self.bvh.triangles()
    }

    pub fn bvh_intersect(&self, origin: Vec3, direction: Vec3) -> Option<Hit> {
        self.bvh.intersect(origin, direction)
    }

    pub fn bvh_occluded(&self, origin: Vec3, direction: Vec3, tnear: f32, tfar: f32) -> bool {
        self.bvh.occluded(origin, direction, tnear, tfar)
    }
}
