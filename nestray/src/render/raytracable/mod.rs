pub mod instance;
pub mod instance_intersector;
pub mod instance_point_query;
pub mod sphere;

pub use instance::Instance;
pub use instance_intersector::{
    InstanceIntersector, InstanceIntersector1, InstanceIntersector16, InstanceIntersector16MB,
    InstanceIntersector1MB, InstanceIntersector4, InstanceIntersector4MB, InstanceIntersector8,
    InstanceIntersector8MB, InstanceIntersectorK, InstanceIntersectorKMB,
    InstancePacketIntersector, Motion, Static, TransformSampling,
};
pub use sphere::Sphere;

use super::AABB;

pub trait BoundedGeometry {
    /// Returns the bounding box of the object in the frame of the scene it
    /// is attached to.
    fn bounding_box(&self) -> AABB;
}

/// Anything a [`Scene`](super::scene::Scene) can hold.
#[derive(Debug, Clone)]
pub enum Geometry {
    Sphere(Sphere),
    Instance(Instance),
}

impl Geometry {
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Geometry::Instance(instance) => Some(instance),
            _ => None,
        }
    }
}

impl BoundedGeometry for Geometry {
    fn bounding_box(&self) -> AABB {
        match self {
            Geometry::Sphere(sphere) => sphere.bounding_box(),
            Geometry::Instance(instance) => instance.bounding_box(),
        }
    }
}

impl From<Sphere> for Geometry {
    fn from(sphere: Sphere) -> Self {
        Geometry::Sphere(sphere)
    }
}

impl From<Instance> for Geometry {
    fn from(instance: Instance) -> Self {
        Geometry::Instance(instance)
    }
}
