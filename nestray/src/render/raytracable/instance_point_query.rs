//! Point queries through instances.
//!
//! A ball stays a ball under rotation, translation and uniform scaling, so
//! as long as every instance on the way down is such a similarity the query
//! is carried as a sphere with a scaled radius. The first instance that
//! shears or scales non-uniformly turns it into a box for the rest of that
//! branch.

use crate::render::{
    context::{PointQuery, PointQueryContext, PointQueryFunctionArguments, PointQueryType},
    instance_stack::InstanceScope,
};

use super::{
    instance_intersector::{InstanceIntersector, TransformSampling},
    Instance,
};

impl<T: TransformSampling> InstanceIntersector<T> {
    /// Runs the query inside the instance. `query` is the query in the
    /// parent's frame.
    ///
    /// Returns whether a callback changed the query, `false` if the instance
    /// is nested too deep to be entered.
    pub fn point_query<F>(
        query: &mut PointQuery,
        context: &mut PointQueryContext<'_, F>,
        instance: &Instance,
    ) -> bool
    where
        F: FnMut(&mut PointQueryFunctionArguments<'_>) -> bool,
    {
        let (world2local, local2world) = T::transforms(instance, query.time);

        let similarity = match context.query_type {
            PointQueryType::Sphere => world2local.similarity_scale(),
            PointQueryType::Aabb => None,
        };

        let (query_type, local_scale) = match similarity {
            Some(scale) => (PointQueryType::Sphere, scale),
            None => (PointQueryType::Aabb, 0.0),
        };

        let Some(mut scope) = InstanceScope::push(
            &mut *context.user,
            instance.geom_id(),
            &world2local,
            &local2world,
        ) else {
            return false;
        };

        // box queries are tested against the world-space query box
        let mut local = PointQuery {
            p: world2local.transform_point(query.p),
            time: query.time,
            radius: match query_type {
                PointQueryType::Sphere => query.radius * local_scale,
                PointQueryType::Aabb => 0.0,
            },
        };

        let mut child = PointQueryContext::new(
            instance.object(),
            &mut *context.query_ws,
            query_type,
            &mut *context.func,
            &mut scope,
            context.similarity_scale * local_scale,
        );

        instance.object().point_query(&mut local, &mut child)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ultraviolet::Vec3;

    use crate::render::{
        affine::AffineSpace3,
        context::UserContext,
        instance_stack::MAX_INSTANCE_LEVEL_COUNT,
        raytracable::{Geometry, Sphere},
        scene::Scene,
    };

    use super::*;

    fn scene_of(spheres: &[Sphere]) -> Arc<Scene> {
        let mut scene = Scene::new();
        for sphere in spheres {
            scene.attach(*sphere);
        }
        Arc::new(scene)
    }

    fn instanced(child: Arc<Scene>, local2world: AffineSpace3) -> Scene {
        let mut scene = Scene::new();
        scene.attach(Instance::new(child, local2world).unwrap());
        scene
    }

    /// World-space distance from the query point to the surface of the
    /// sphere the callback is looking at.
    fn world_distance(args: &PointQueryFunctionArguments<'_>) -> f32 {
        let Geometry::Sphere(sphere) = args.geometry else {
            panic!("expected a sphere");
        };

        let world2inst = args
            .context
            .inst_stack
            .world2inst()
            .copied()
            .unwrap_or_default();
        let local = world2inst.transform_point(args.query.p);

        ((local - sphere.center).mag() - sphere.radius) / args.similarity_scale
    }

    #[test]
    fn test_similarity_instance() {
        let local2world = AffineSpace3::from_scale(2.0)
            .then(&AffineSpace3::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        let world = instanced(scene_of(&[Sphere::new(Vec3::zero(), 1.0)]), local2world);

        let mut user = UserContext::new();
        let mut query = PointQuery::new(Vec3::zero(), f32::INFINITY);
        let mut seen = None;

        let changed = world.query_point(&mut query, &mut user, |args| {
            let distance = world_distance(args);
            let ids = args.context.inst_stack.ids().to_vec();
            seen = Some((args.query_type, args.similarity_scale, ids));
            args.query.radius = distance;
            true
        });

        assert!(changed);
        assert!((query.radius - 8.0).abs() < 1e-4);

        let (query_type, scale, ids) = seen.unwrap();
        assert_eq!(query_type, PointQueryType::Sphere);
        assert!((scale - 0.5).abs() < 1e-6);
        assert_eq!(ids, vec![0]);
        assert!(user.inst_stack.is_empty());
    }

    #[test]
    fn test_nonuniform_scale_degrades_to_box() {
        let world = instanced(
            scene_of(&[Sphere::new(Vec3::new(3.0, 0.0, 0.0), 1.0)]),
            AffineSpace3::from_nonuniform_scale(Vec3::new(1.0, 3.0, 1.0)),
        );

        let mut user = UserContext::new();
        let mut seen = Vec::new();

        // reaches the sphere box at x = 2
        let mut query = PointQuery::new(Vec3::zero(), 2.5);
        world.query_point(&mut query, &mut user, |args| {
            seen.push((args.query_type, args.similarity_scale));
            false
        });
        assert_eq!(seen, vec![(PointQueryType::Aabb, 0.0)]);

        // stops short of it
        let mut query = PointQuery::new(Vec3::zero(), 1.5);
        world.query_point(&mut query, &mut user, |_| panic!("culled geometry visited"));
    }

    #[test]
    fn test_nested_scales_multiply() {
        let inner = Arc::new(instanced(
            scene_of(&[Sphere::new(Vec3::zero(), 1.0)]),
            AffineSpace3::from_scale(2.0),
        ));
        let world = instanced(inner, AffineSpace3::from_scale(2.0));

        let mut user = UserContext::new();
        let mut query = PointQuery::new(Vec3::new(10.0, 0.0, 0.0), f32::INFINITY);
        let mut distance = None;

        world.query_point(&mut query, &mut user, |args| {
            assert_eq!(args.query_type, PointQueryType::Sphere);
            assert!((args.similarity_scale - 0.25).abs() < 1e-6);
            assert_eq!(args.context.inst_stack.depth(), 2);
            distance = Some(world_distance(args));
            false
        });

        assert!((distance.unwrap() - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_shrunk_radius_culls_the_rest() {
        let world = instanced(
            scene_of(&[
                Sphere::new(Vec3::new(2.0, 0.0, 0.0), 0.5),
                Sphere::new(Vec3::new(20.0, 0.0, 0.0), 0.5),
            ]),
            AffineSpace3::from_scale(2.0),
        );

        let mut user = UserContext::new();
        let mut query = PointQuery::new(Vec3::zero(), f32::INFINITY);
        let mut visited = Vec::new();

        let changed = world.query_point(&mut query, &mut user, |args| {
            visited.push(args.geom_id);
            let distance = world_distance(args);
            if distance < args.query.radius {
                args.query.radius = distance;
                true
            } else {
                false
            }
        });

        assert!(changed);
        assert_eq!(visited, vec![0]);
        assert!((query.radius - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_depth_limit() {
        let chain = |levels: usize| {
            let mut scene = scene_of(&[Sphere::new(Vec3::zero(), 1.0)]);
            for _ in 0..levels {
                scene = Arc::new(instanced(scene, AffineSpace3::identity()));
            }
            scene
        };

        let mut user = UserContext::new();

        let mut visits = 0;
        let mut query = PointQuery::new(Vec3::zero(), 1.0);
        chain(MAX_INSTANCE_LEVEL_COUNT).query_point(&mut query, &mut user, |args| {
            assert_eq!(args.context.inst_stack.depth(), MAX_INSTANCE_LEVEL_COUNT);
            visits += 1;
            true
        });
        assert_eq!(visits, 1);

        let mut query = PointQuery::new(Vec3::zero(), 1.0);
        let changed = chain(MAX_INSTANCE_LEVEL_COUNT + 1)
            .query_point(&mut query, &mut user, |_| panic!("entered too deep"));
        assert!(!changed);
        assert!(user.inst_stack.is_empty());
    }

    #[test]
    fn test_motion_instance_uses_query_time() {
        let mut world = Scene::new();
        world.attach(
            Instance::new_motion(
                scene_of(&[Sphere::new(Vec3::zero(), 1.0)]),
                vec![
                    AffineSpace3::identity(),
                    AffineSpace3::from_translation(Vec3::new(10.0, 0.0, 0.0)),
                ],
            )
            .unwrap(),
        );

        let mut user = UserContext::new();
        let mut query = PointQuery::new(Vec3::zero(), f32::INFINITY).with_time(0.5);
        let mut distance = None;

        world.query_point(&mut query, &mut user, |args| {
            distance = Some(world_distance(args));
            false
        });

        assert!((distance.unwrap() - 4.0).abs() < 1e-4);
    }
}
