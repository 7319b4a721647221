use ultraviolet::Vec3;

use super::{
    instance_stack::InstanceStack,
    math::AABB,
    raytracable::Geometry,
    scene::Scene,
};

/// Per-traversal state owned by whoever starts a query.
///
/// Holds the instance stack shared by every nesting level of one traversal.
/// Independent traversals, for example on different threads, each need
/// their own.
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub inst_stack: InstanceStack,
}

impl UserContext {
    pub fn new() -> Self {
        Self {
            inst_stack: InstanceStack::new(),
        }
    }
}

/// Context of a ray traversal, binding the scene currently traversed to the
/// user context shared by all nesting levels.
#[derive(Debug)]
pub struct IntersectContext<'a> {
    pub scene: &'a Scene,
    pub user: &'a mut UserContext,
}

impl<'a> IntersectContext<'a> {
    pub fn new(scene: &'a Scene, user: &'a mut UserContext) -> Self {
        Self { scene, user }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointQuery {
    pub p: Vec3,
    pub time: f32,
    pub radius: f32,
}

impl PointQuery {
    pub fn new(p: Vec3, radius: f32) -> Self {
        Self { p, time: 0.0, radius }
    }

    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }
}

/// Shape of the region a point query covers in the current frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointQueryType {
    /// Ball of `radius` around `p`.
    Sphere,

    /// The world-space box `p ± radius`, carried into the current frame
    /// through the instance stack. Used once a sphere can no longer be
    /// represented because an instance shears or scales non-uniformly.
    Aabb,
}

/// Arguments handed to the point query callback for every candidate leaf.
#[derive(Debug)]
pub struct PointQueryFunctionArguments<'a> {
    /// The world-space query. Shrinking its radius and returning `true`
    /// from the callback narrows the rest of the search.
    pub query: &'a mut PointQuery,

    pub geometry: &'a Geometry,
    pub geom_id: u32,
    pub prim_id: u32,

    /// The user context, its instance stack describes the frame the
    /// geometry lives in.
    pub context: &'a UserContext,

    /// Type of the query in the geometry's frame.
    pub query_type: PointQueryType,

    /// Accumulated world to local scale factor, only meaningful for
    /// [`PointQueryType::Sphere`].
    pub similarity_scale: f32,
}

/// Context of a point query traversal.
///
/// `query_ws` is the world-space query shared by all nesting levels, the
/// local query of each level is passed separately.
pub struct PointQueryContext<'a, F> {
    pub scene: &'a Scene,
    pub query_ws: &'a mut PointQuery,
    pub query_type: PointQueryType,
    pub func: &'a mut F,
    pub user: &'a mut UserContext,
    pub similarity_scale: f32,
}

impl<'a, F> PointQueryContext<'a, F>
where
    F: FnMut(&mut PointQueryFunctionArguments<'_>) -> bool,
{
    pub fn new(
        scene: &'a Scene,
        query_ws: &'a mut PointQuery,
        query_type: PointQueryType,
        func: &'a mut F,
        user: &'a mut UserContext,
        similarity_scale: f32,
    ) -> Self {
        Self {
            scene,
            query_ws,
            query_type,
            func,
            user,
            similarity_scale,
        }
    }

    /// Calls the user callback for one leaf, returns whether it changed the
    /// query.
    pub(crate) fn invoke(&mut self, geometry: &Geometry, geom_id: u32, prim_id: u32) -> bool {
        let mut args = PointQueryFunctionArguments {
            query: &mut *self.query_ws,
            geometry,
            geom_id,
            prim_id,
            context: &*self.user,
            query_type: self.query_type,
            similarity_scale: self.similarity_scale,
        };

        (self.func)(&mut args)
    }

    /// The world-space query box in the frame of the current scene.
    pub fn query_box(&self) -> AABB {
        if !self.query_ws.radius.is_finite() {
            return AABB::infinite();
        }

        let bbox = AABB::at_point_with_half_size(
            self.query_ws.p,
            Vec3::broadcast(self.query_ws.radius),
        );

        match self.user.inst_stack.world2inst() {
            Some(world2inst) => bbox.transformed(world2inst),
            None => bbox,
        }
    }

    /// Whether the query region can reach anything inside `bounds`.
    pub fn overlaps(&self, query: &PointQuery, bounds: &AABB) -> bool {
        match self.query_type {
            PointQueryType::Sphere => bounds.distance_sq(query.p) <= query.radius * query.radius,
            PointQueryType::Aabb => bounds.overlaps(&self.query_box()),
        }
    }

    /// Pulls a radius the callback shrank in world space back into the
    /// local query.
    pub fn refresh(&self, query: &mut PointQuery) {
        if self.query_type == PointQueryType::Sphere {
            query.radius = self.query_ws.radius * self.similarity_scale;
        }
    }
}
