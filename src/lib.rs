#[macro_use] pub mod macros; // must stay at the top
pub mod math;
pub mod geometry;
pub mod spectrum;
pub mod error;
pub mod sampling;
pub mod sampler;
pub mod fresnel;
pub mod bvh;
pub mod material;
pub mod texture;
pub mod camera;
pub mod scene;
pub mod film;
pub mod integrator;

pub use geometry::*;
pub use math::*;
pub use error::SceneError;

use cgmath::{Point2, Point3, Vector2, Vector3};

pub type Float = f32;

pub type Point2f = Point2<Float>;
pub type Point3f = Point3<Float>;
pub type Vec2f = Vector2<Float>;
pub type Vec3f = Vector3<Float>;
