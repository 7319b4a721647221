//! Instance traversal for a CPU ray tracer.
//!
//! When a traversal reaches an instance leaf, the intersectors in
//! [`render::raytracable::instance_intersector`] move the ray (or packet, or
//! point query) into the instance's local frame, recurse into the child
//! [`Scene`], and put everything back on the way out. Nested instances are
//! tracked on a bounded [`InstanceStack`] carried by the [`UserContext`].

#[cfg(all(feature = "no-simd", feature = "avx512"))]
compile_error!("Cannot enable no-simd and avx512 features at the same time");

pub mod render;

pub use render::{
    affine::{AffineSpace3, AffineSpace3K},
    context::{
        IntersectContext, PointQuery, PointQueryContext, PointQueryFunctionArguments,
        PointQueryType, UserContext,
    },
    error::InstanceError,
    instance_stack::{InstanceScope, InstanceStack, INVALID_GEOMETRY_ID, MAX_INSTANCE_LEVEL_COUNT},
    math::{Hit, Ray, RayHit, AABB},
    packet::{HitK, LaneMask, RayHitK, RayK, Vec3K, NATIVE_PACKET_WIDTH},
    raytracable::{
        BoundedGeometry, Geometry, Instance, InstanceIntersector1, InstanceIntersector1MB,
        InstanceIntersectorK, InstanceIntersectorKMB, Sphere,
    },
    scene::Scene,
    stream::{intersect_packets, intersect_stream, occluded_stream},
};
