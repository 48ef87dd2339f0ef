//! Small built-in scenes for the demo binary, benchmarks and tests.

use cgmath::Deg;

use crate::{Float, Point3f, SceneError, Transform};
use crate::camera::Camera;
use crate::material::MaterialDesc;
use crate::scene::{Scene, SceneBuilder, Triangle};
use crate::spectrum::Spectrum;
use crate::texture::TextureFormat;

/// Axis aligned cube of side one centred on the origin, faces pointing outwards.
pub fn cube(material: u32) -> Vec<Triangle> {
    let h = 0.5;
    let p = |x: Float, y: Float, z: Float| Point3f::new(x * h, y * h, z * h);
    let faces = [
        [p(-1., 1., -1.), p(-1., 1., 1.), p(1., 1., 1.), p(1., 1., -1.)],
        [p(-1., -1., -1.), p(1., -1., -1.), p(1., -1., 1.), p(-1., -1., 1.)],
        [p(-1., -1., 1.), p(1., -1., 1.), p(1., 1., 1.), p(-1., 1., 1.)],
        [p(-1., -1., -1.), p(-1., 1., -1.), p(1., 1., -1.), p(1., -1., -1.)],
        [p(1., -1., -1.), p(1., 1., -1.), p(1., 1., 1.), p(1., -1., 1.)],
        [p(-1., -1., -1.), p(-1., -1., 1.), p(-1., 1., 1.), p(-1., 1., -1.)],
    ];
    faces.iter()
        .flat_map(|[a, b, c, d]| Triangle::quad(*a, *b, *c, *d, material))
        .collect()
}

/// RGB8 checkerboard with `cells` squares per side, `size` texels wide.
pub fn checker_texture(builder: &mut SceneBuilder, size: u32, cells: u32, a: [u8; 3], b: [u8; 3]) -> Result<u32, SceneError> {
    let cell = (size / cells).max(1);
    let bytes: Vec<u8> = (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            if (x / cell + y / cell) % 2 == 0 { a } else { b }
        })
        .collect();
    builder.add_texture(TextureFormat::Rgb8, size, size, &bytes)
}

/// A Cornell-style box: coloured walls, a checkered floor, an area light in the ceiling
/// and two instances of the same cube with different transforms and materials.
pub fn cornell_box() -> Result<Scene, SceneError> {
    let mut b = SceneBuilder::new();

    let checker = checker_texture(&mut b, 64, 8, [200, 200, 200], [60, 60, 60])?;
    let white = b.add_material(&MaterialDesc::diffuse(Spectrum::uniform(0.73)))?;
    let floor = b.add_material(&MaterialDesc::diffuse(Spectrum::uniform(1.0)).with_kval_texture(checker))?;
    let red = b.add_material(&MaterialDesc::diffuse(Spectrum::rgb(0.65, 0.05, 0.05)))?;
    let green = b.add_material(&MaterialDesc::diffuse(Spectrum::rgb(0.12, 0.45, 0.15)))?;
    let light = b.add_material(&MaterialDesc::emissive(Spectrum::uniform(15.0)))?;
    let coated = b.add_material(&MaterialDesc::fresnel(
        1.5,
        MaterialDesc::glossy(Spectrum::uniform(1.0), 0.2),
        MaterialDesc::diffuse(Spectrum::rgb(0.2, 0.3, 0.7)),
    ))?;

    let p = Point3f::new;
    let mut walls = Vec::new();
    walls.extend(Triangle::quad(p(-1., -1., -1.), p(-1., -1., 1.), p(1., -1., 1.), p(1., -1., -1.), floor));
    walls.extend(Triangle::quad(p(-1., 1., -1.), p(1., 1., -1.), p(1., 1., 1.), p(-1., 1., 1.), white));
    walls.extend(Triangle::quad(p(-1., -1., -1.), p(1., -1., -1.), p(1., 1., -1.), p(-1., 1., -1.), white));
    walls.extend(Triangle::quad(p(-1., -1., -1.), p(-1., 1., -1.), p(-1., 1., 1.), p(-1., -1., 1.), red));
    walls.extend(Triangle::quad(p(1., -1., -1.), p(1., -1., 1.), p(1., 1., 1.), p(1., 1., -1.), green));
    let walls = b.add_mesh(&walls)?;

    let a = 0.3;
    let lamp = b.add_mesh(&Triangle::quad(p(-a, 0.99, -a), p(a, 0.99, -a), p(a, 0.99, a), p(-a, 0.99, a), light))?;

    let white_box = b.add_mesh(&cube(white))?;
    let coated_box = b.add_mesh(&cube(coated))?;

    b.add_instance(walls, Transform::IDENTITY)?;
    b.add_instance(lamp, Transform::IDENTITY)?;
    b.add_instance(
        white_box,
        Transform::scale(0.6, 1.2, 0.6)
            .then(Transform::rotate_y(Deg(20.0)))
            .then(Transform::translate(vec3f!(-0.35, -0.4, -0.3))),
    )?;
    b.add_instance(
        coated_box,
        Transform::scale(0.6, 0.6, 0.6)
            .then(Transform::rotate_y(Deg(-18.0)))
            .then(Transform::translate(vec3f!(0.4, -0.7, 0.3))),
    )?;

    b.set_camera(Camera::look_at(point3f!(0, 0, 3.6), point3f!(0, 0, 0), vec3f!(0, 1, 0), Deg(40.0)));
    b.set_background(Spectrum::default());
    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cornell_box_builds() {
        let scene = cornell_box().unwrap();
        assert_eq!(scene.mesh_instances().len(), 4);
        // the two lamp triangles
        assert_eq!(scene.emitters().len(), 2);
        assert_eq!(scene.textures().len(), 1);
    }

    #[test]
    fn test_cube_faces_point_outwards() {
        use cgmath::{EuclideanSpace, InnerSpace};
        for tri in cube(0) {
            let [p0, p1, p2] = tri.vertices;
            let n = (p1 - p0).cross(p2 - p0);
            let centroid = (p0.to_vec() + p1.to_vec() + p2.to_vec()) / 3.0;
            assert!(n.dot(centroid) > 0.0);
        }
    }
}
