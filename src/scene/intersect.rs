//! Two-level traversal and hit reconstruction.

use cgmath::InnerSpace;
use smallvec::SmallVec;

use crate::{offset_ray_origin, Float, Point2f, Point3f, Ray, Vec3f};
use crate::bvh::{BvhLevel, BvhNodeKind};
use crate::material::ShadingContext;
use crate::scene::Scene;

/// Hits closer than this along a ray are ignored.
pub const RAY_T_MIN: Float = 1.0e-5;

type TraversalStack = SmallVec<[(u32, Float); 64]>;

/// Closest hit found by [`Scene::intersect`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub t: Float,
    pub instance: u32,
    pub prim: u32,
    /// Barycentric weights of the second and third vertex.
    pub b1: Float,
    pub b2: Float,
}

/// Geometry at a point on a triangle, in world space.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceInteraction {
    pub p: Point3f,
    /// Geometric normal, flipped to the side of the shading normal.
    pub n_geom: Vec3f,
    pub n_shading: Vec3f,
    pub uv: Point2f,
    /// Direction back towards the ray origin. Zero for points that were sampled rather
    /// than hit.
    pub wo: Vec3f,
    pub material: u32,
}

impl SurfaceInteraction {
    pub fn shading_context(&self) -> ShadingContext {
        ShadingContext { n: self.n_shading, uv: self.uv, wo: self.wo }
    }

    pub fn spawn_ray(&self, dir: Vec3f) -> Ray {
        Ray::new(offset_ray_origin(self.p, self.n_geom, dir), dir)
    }

    /// Ray towards `target` and the distance to cover.
    pub fn spawn_ray_to(&self, target: Point3f) -> (Ray, Float) {
        let d = target - self.p;
        let dir = d.normalize();
        let origin = offset_ray_origin(self.p, self.n_geom, dir);
        (Ray::new(origin, dir), (target - origin).magnitude())
    }
}

/// Möller-Trumbore ray/triangle test. Returns `(t, b1, b2)`.
#[inline]
pub fn intersect_triangle(ray: &Ray, p0: Point3f, p1: Point3f, p2: Point3f, t_max: Float) -> Option<(Float, Float, Float)> {
    let e1 = p1 - p0;
    let e2 = p2 - p0;
    let pvec = ray.dir.cross(e2);
    let det = e1.dot(pvec);
    if det.abs() < 1.0e-12 {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = ray.origin - p0;
    let b1 = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&b1) {
        return None;
    }
    let qvec = tvec.cross(e1);
    let b2 = ray.dir.dot(qvec) * inv_det;
    if b2 < 0.0 || b1 + b2 > 1.0 {
        return None;
    }
    let t = e2.dot(qvec) * inv_det;
    if t > RAY_T_MIN && t < t_max {
        Some((t, b1, b2))
    } else {
        None
    }
}

fn point(v: [f32; 4]) -> Point3f {
    Point3f::new(v[0], v[1], v[2])
}

impl Scene {
    fn triangle(&self, prim: u32) -> [Point3f; 3] {
        let (vertices, ..) = self.vertex_arrays();
        let i = 3 * prim as usize;
        [point(vertices[i]), point(vertices[i + 1]), point(vertices[i + 2])]
    }

    /// Closest hit along `ray` within `(RAY_T_MIN, ray.t_max)`.
    pub fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let mut closest: Option<Hit> = None;
        self.traverse(ray, &mut |candidate| {
            closest = Some(candidate);
            false
        }, ray.t_max);
        closest
    }

    /// Whether anything lies along `ray` closer than `t_max`.
    pub fn occluded(&self, ray: &Ray, t_max: Float) -> bool {
        let mut found = false;
        self.traverse(ray, &mut |_| {
            found = true;
            true
        }, t_max);
        found
    }

    /// Walk the top-level BVH, descending into instances whose bounds the ray enters.
    /// `on_hit` is called for every hit closer than the best one so far and returns true to
    /// stop the traversal.
    fn traverse(&self, ray: &Ray, on_hit: &mut dyn FnMut(Hit) -> bool, t_max: Float) {
        let nodes = self.bvh_nodes();
        if self.mesh_instances().is_empty() || nodes.is_empty() {
            return;
        }

        let inv_dir = ray.inv_dir();
        let mut closest = t_max;
        let mut stack = TraversalStack::new();
        if let Some(t) = nodes[0].bbox().intersect_p(ray.origin, inv_dir, closest) {
            stack.push((0, t));
        }

        while let Some((idx, t_entry)) = stack.pop() {
            if t_entry > closest {
                continue;
            }
            match nodes[idx as usize].kind(BvhLevel::Top) {
                BvhNodeKind::Instance(instance) => {
                    let inst = &self.mesh_instances()[instance as usize];
                    let local = self.instance_transform(instance).inverse().transform_ray(ray);
                    if self.traverse_mesh(&local, inst.bvh_root, instance, &mut closest, on_hit) {
                        return;
                    }
                }
                BvhNodeKind::Interior { left, right } => {
                    push_children(&mut stack, nodes, left, right, ray.origin, inv_dir, closest);
                }
                BvhNodeKind::Primitives { .. } => {}
            }
        }
    }

    /// Bottom-level traversal in instance space. Returns true if `on_hit` asked to stop.
    fn traverse_mesh(
        &self,
        ray: &Ray,
        root: u32,
        instance: u32,
        closest: &mut Float,
        on_hit: &mut dyn FnMut(Hit) -> bool,
    ) -> bool {
        let nodes = self.bvh_nodes();
        let inv_dir = ray.inv_dir();
        let mut stack = TraversalStack::new();
        if let Some(t) = nodes[root as usize].bbox().intersect_p(ray.origin, inv_dir, *closest) {
            stack.push((root, t));
        }

        while let Some((idx, t_entry)) = stack.pop() {
            if t_entry > *closest {
                continue;
            }
            match nodes[idx as usize].kind(BvhLevel::Bottom) {
                BvhNodeKind::Primitives { first, count } => {
                    for prim in first..first + count {
                        let [p0, p1, p2] = self.triangle(prim);
                        if let Some((t, b1, b2)) = intersect_triangle(ray, p0, p1, p2, *closest) {
                            *closest = t;
                            if on_hit(Hit { t, instance, prim, b1, b2 }) {
                                return true;
                            }
                        }
                    }
                }
                BvhNodeKind::Interior { left, right } => {
                    push_children(&mut stack, nodes, left, right, ray.origin, inv_dir, *closest);
                }
                BvhNodeKind::Instance(_) => {}
            }
        }
        false
    }

    /// World-space geometry of triangle `prim` of `instance` at barycentrics `(b1, b2)`.
    pub fn surface_at(&self, instance: u32, prim: u32, b1: Float, b2: Float) -> SurfaceInteraction {
        let (_, normals, uvs, material_index) = self.vertex_arrays();
        let tf = self.instance_transform(instance);
        let b0 = 1.0 - b1 - b2;
        let i = 3 * prim as usize;

        let [p0, p1, p2] = self.triangle(prim);
        let p_local = Point3f::new(
            b0 * p0.x + b1 * p1.x + b2 * p2.x,
            b0 * p0.y + b1 * p1.y + b2 * p2.y,
            b0 * p0.z + b1 * p1.z + b2 * p2.z,
        );
        let p = tf.transform_point(p_local);

        let mut n_geom = tf.transform_normal((p1 - p0).cross(p2 - p0));
        n_geom = normalize_or(n_geom, vec3f!(0, 0, 1));

        let n_shading = if normals.is_empty() {
            n_geom
        } else {
            let n = |k: usize| vec3f!(normals[i + k][0], normals[i + k][1], normals[i + k][2]);
            let interp = n(0) * b0 + n(1) * b1 + n(2) * b2;
            let ns = normalize_or(tf.transform_normal(interp), n_geom);
            if n_geom.dot(ns) < 0.0 {
                n_geom = -n_geom;
            }
            ns
        };

        let uv = if uvs.is_empty() {
            Point2f::new(b1, b2)
        } else {
            Point2f::new(
                b0 * uvs[i][0] + b1 * uvs[i + 1][0] + b2 * uvs[i + 2][0],
                b0 * uvs[i][1] + b1 * uvs[i + 1][1] + b2 * uvs[i + 2][1],
            )
        };

        SurfaceInteraction {
            p,
            n_geom,
            n_shading,
            uv,
            wo: vec3f!(0, 0, 0),
            material: material_index[prim as usize],
        }
    }

    /// Surface interaction for a hit returned by [`Scene::intersect`].
    pub fn interaction(&self, ray: &Ray, hit: &Hit) -> SurfaceInteraction {
        let mut si = self.surface_at(hit.instance, hit.prim, hit.b1, hit.b2);
        si.wo = normalize_or(-ray.dir, si.n_geom);
        si
    }

    /// World-space area of a triangle of an instance.
    pub fn triangle_area(&self, instance: u32, prim: u32) -> Float {
        let tf = self.instance_transform(instance);
        let [p0, p1, p2] = self.triangle(prim).map(|p| tf.transform_point(p));
        0.5 * (p1 - p0).cross(p2 - p0).magnitude()
    }
}

fn normalize_or(v: Vec3f, fallback: Vec3f) -> Vec3f {
    let len = v.magnitude();
    if len > 0.0 && len.is_finite() { v / len } else { fallback }
}

/// Push the children the ray enters, farther one first so the nearer one is popped next.
#[inline]
fn push_children(
    stack: &mut TraversalStack,
    nodes: &[crate::bvh::BvhNode],
    left: u32,
    right: u32,
    origin: Point3f,
    inv_dir: Vec3f,
    t_max: Float,
) {
    let tl = nodes[left as usize].bbox().intersect_p(origin, inv_dir, t_max);
    let tr = nodes[right as usize].bbox().intersect_p(origin, inv_dir, t_max);
    match (tl, tr) {
        (Some(tl), Some(tr)) => {
            if tl <= tr {
                stack.push((right, tr));
                stack.push((left, tl));
            } else {
                stack.push((left, tl));
                stack.push((right, tr));
            }
        }
        (Some(tl), None) => stack.push((left, tl)),
        (None, Some(tr)) => stack.push((right, tr)),
        (None, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_intersect_triangle() {
        let p0 = point3f!(-1, -1, 0);
        let p1 = point3f!(1, -1, 0);
        let p2 = point3f!(0, 1, 0);
        let ray = Ray::new(point3f!(0, 0, 2), vec3f!(0, 0, -1));
        let (t, b1, b2) = intersect_triangle(&ray, p0, p1, p2, Float::INFINITY).unwrap();
        assert_abs_diff_eq!(t, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(b1, 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(b2, 0.5, epsilon = 1e-6);

        assert!(intersect_triangle(&ray, p0, p1, p2, 1.5).is_none());
        let miss = Ray::new(point3f!(3, 0, 2), vec3f!(0, 0, -1));
        assert!(intersect_triangle(&miss, p0, p1, p2, Float::INFINITY).is_none());
        let behind = Ray::new(point3f!(0, 0, -2), vec3f!(0, 0, -1));
        assert!(intersect_triangle(&behind, p0, p1, p2, Float::INFINITY).is_none());
    }
}
