pub mod affine;
pub mod context;
pub mod error;
pub mod frame;
pub mod instance_stack;
pub mod math;
pub mod packet;
pub mod raytracable;
pub mod scene;
pub mod stream;

#[allow(unused_imports)]
pub(crate) use affine::AffineSpace3;

#[allow(unused_imports)]
pub(crate) use math::Ray;

#[allow(unused_imports)]
pub(crate) use math::AABB;
