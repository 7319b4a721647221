//! A flat list of leaf geometries and instances.
//!
//! Traversal visits every geometry in attach order. This is the minimal
//! scene the instance intersectors need to recurse into, not an
//! acceleration structure.

use log::debug;

use super::{
    context::{
        IntersectContext, PointQuery, PointQueryContext, PointQueryFunctionArguments,
        PointQueryType, UserContext,
    },
    math::{Ray, RayHit},
    packet::{LaneMask, RayHitK, RayK},
    raytracable::{
        instance_intersector::{
            InstanceIntersector1, InstanceIntersector1MB, InstanceIntersectorK,
            InstanceIntersectorKMB,
        },
        BoundedGeometry, Geometry,
    },
    AABB,
};

#[derive(Debug, Clone)]
pub struct Scene {
    geometries: Vec<Geometry>,
    bounds: AABB,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            geometries: Vec::new(),
            bounds: AABB::null(),
        }
    }

    /// Adds a geometry and returns its id, ids are handed out in order.
    ///
    /// Instances reference scenes that are already built, so instancing can
    /// never form a cycle.
    pub fn attach(&mut self, geometry: impl Into<Geometry>) -> u32 {
        let geom_id = self.geometries.len() as u32;
        let mut geometry = geometry.into();

        if let Geometry::Instance(instance) = &mut geometry {
            instance.set_geom_id(geom_id);
        }

        self.bounds.contain_aabb(&geometry.bounding_box());

        debug!("attached geometry {} to scene", geom_id);

        self.geometries.push(geometry);
        geom_id
    }

    pub fn geometry(&self, geom_id: u32) -> Option<&Geometry> {
        self.geometries.get(geom_id as usize)
    }

    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Bounds of everything attached, in the scene's own frame.
    pub fn bounds(&self) -> AABB {
        self.bounds
    }

    /// Finds the closest hit along the ray.
    pub fn intersect(&self, ray: &mut RayHit, context: &mut IntersectContext<'_>) {
        for (geom_id, geometry) in self.geometries.iter().enumerate() {
            match geometry {
                Geometry::Sphere(sphere) => {
                    sphere.intersect(ray, context, geom_id as u32);
                }
                Geometry::Instance(instance) if instance.is_motion() => {
                    InstanceIntersector1MB::intersect(ray, context, instance)
                }
                Geometry::Instance(instance) => {
                    InstanceIntersector1::intersect(ray, context, instance)
                }
            }
        }
    }

    /// Returns as soon as anything blocks the ray.
    pub fn occluded(&self, ray: &mut Ray, context: &mut IntersectContext<'_>) -> bool {
        self.geometries.iter().any(|geometry| match geometry {
            Geometry::Sphere(sphere) => sphere.occluded(ray),
            Geometry::Instance(instance) if instance.is_motion() => {
                InstanceIntersector1MB::occluded(ray, context, instance)
            }
            Geometry::Instance(instance) => InstanceIntersector1::occluded(ray, context, instance),
        })
    }

    pub fn intersect_packet<const K: usize>(
        &self,
        valid: LaneMask<K>,
        ray: &mut RayHitK<K>,
        context: &mut IntersectContext<'_>,
    ) {
        if valid.none() {
            return;
        }

        for (geom_id, geometry) in self.geometries.iter().enumerate() {
            match geometry {
                Geometry::Sphere(sphere) => {
                    sphere.intersect_packet(valid, ray, context, geom_id as u32)
                }
                Geometry::Instance(instance) if instance.is_motion() => {
                    InstanceIntersectorKMB::<K>::intersect(valid, ray, context, instance)
                }
                Geometry::Instance(instance) => {
                    InstanceIntersectorK::<K>::intersect(valid, ray, context, instance)
                }
            }
        }
    }

    /// Returns the lanes of `valid` that are blocked. Lanes stop being
    /// traced once they are.
    pub fn occluded_packet<const K: usize>(
        &self,
        valid: LaneMask<K>,
        ray: &mut RayK<K>,
        context: &mut IntersectContext<'_>,
    ) -> LaneMask<K> {
        let mut active = valid;

        for geometry in &self.geometries {
            if active.none() {
                break;
            }

            let occluded = match geometry {
                Geometry::Sphere(sphere) => sphere.occluded_packet(active, ray),
                Geometry::Instance(instance) if instance.is_motion() => {
                    InstanceIntersectorKMB::<K>::occluded(active, ray, context, instance)
                }
                Geometry::Instance(instance) => {
                    InstanceIntersectorK::<K>::occluded(active, ray, context, instance)
                }
            };

            active &= !occluded;
        }

        valid & !active
    }

    /// Visits every geometry the query region can reach. `query` is the
    /// query in this scene's frame.
    ///
    /// Returns whether any callback changed the query.
    pub fn point_query<F>(
        &self,
        query: &mut PointQuery,
        context: &mut PointQueryContext<'_, F>,
    ) -> bool
    where
        F: FnMut(&mut PointQueryFunctionArguments<'_>) -> bool,
    {
        let mut changed = false;

        for (geom_id, geometry) in self.geometries.iter().enumerate() {
            if !context.overlaps(query, &geometry.bounding_box()) {
                continue;
            }

            let updated = match geometry {
                Geometry::Sphere(_) => context.invoke(geometry, geom_id as u32, 0),
                Geometry::Instance(instance) if instance.is_motion() => {
                    InstanceIntersector1MB::point_query(query, context, instance)
                }
                Geometry::Instance(instance) => {
                    InstanceIntersector1::point_query(query, context, instance)
                }
            };

            if updated {
                changed = true;
                context.refresh(query);
            }
        }

        changed
    }

    /// Runs a point query from the root of this scene. `func` is called
    /// for every leaf geometry within `query.radius` of `query.p`, and may
    /// shrink the radius to narrow the rest of the search.
    pub fn query_point<F>(
        &self,
        query: &mut PointQuery,
        user: &mut UserContext,
        mut func: F,
    ) -> bool
    where
        F: FnMut(&mut PointQueryFunctionArguments<'_>) -> bool,
    {
        let mut local = *query;
        let mut context =
            PointQueryContext::new(self, query, PointQueryType::Sphere, &mut func, user, 1.0);
        self.point_query(&mut local, &mut context)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ultraviolet::Vec3;

    use crate::render::{
        affine::AffineSpace3,
        raytracable::{Instance, Sphere},
    };

    use super::*;

    fn two_spheres() -> Scene {
        let mut scene = Scene::new();
        scene.attach(Sphere::new(Vec3::new(5.0, 0.0, 0.0), 1.0));
        scene.attach(Sphere::new(Vec3::new(10.0, 0.0, 0.0), 1.0));
        scene
    }

    #[test]
    fn test_attach_ids_and_bounds() {
        let mut scene = two_spheres();
        assert!(Scene::new().bounds().is_empty());
        assert_eq!(scene.bounds().min, Vec3::new(4.0, -1.0, -1.0));
        assert_eq!(scene.bounds().max, Vec3::new(11.0, 1.0, 1.0));

        let child = Arc::new(two_spheres());
        let id = scene.attach(
            Instance::new(child, AffineSpace3::from_translation(Vec3::new(0.0, 10.0, 0.0)))
                .unwrap(),
        );

        assert_eq!(id, 2);
        assert_eq!(scene.len(), 3);
        let instance = scene.geometry(id).and_then(Geometry::as_instance).unwrap();
        assert_eq!(instance.geom_id(), 2);
        assert_eq!(scene.bounds().max, Vec3::new(11.0, 11.0, 1.0));
        assert!(scene.geometry(3).is_none());
    }

    #[test]
    fn test_closest_hit() {
        let scene = two_spheres();
        let mut user = UserContext::new();
        let mut context = IntersectContext::new(&scene, &mut user);

        let mut ray = RayHit::new(Ray::new(Vec3::zero(), Vec3::unit_x()));
        scene.intersect(&mut ray, &mut context);
        assert!((ray.ray.tfar - 4.0).abs() < 1e-5);
        assert_eq!(ray.hit.geom_id, 0);

        let mut ray =
            RayHit::new(Ray::new(Vec3::zero(), Vec3::unit_x()).with_range(7.0, f32::INFINITY));
        scene.intersect(&mut ray, &mut context);
        assert!((ray.ray.tfar - 9.0).abs() < 1e-5);
        assert_eq!(ray.hit.geom_id, 1);
    }

    #[test]
    fn test_occluded_packet() {
        let scene = two_spheres();
        let mut user = UserContext::new();
        let mut context = IntersectContext::new(&scene, &mut user);

        let mut ray = RayK::<4>::from_fn(|i| {
            Ray::new(Vec3::new(0.0, i as f32 * 0.75, 0.0), Vec3::unit_x())
        });

        let occluded = scene.occluded_packet(LaneMask::from_bits(0b0111), &mut ray, &mut context);
        assert_eq!(occluded.bits(), 0b0011);
        assert_eq!(ray.tfar[2], f32::INFINITY);
        assert_eq!(ray.tfar[3], f32::INFINITY);
    }

    #[test]
    fn test_query_point_visits_reachable_leaves() {
        let scene = two_spheres();
        let mut user = UserContext::new();

        let mut visited = Vec::new();
        let mut query = PointQuery::new(Vec3::zero(), 6.0);
        let changed = scene.query_point(&mut query, &mut user, |args| {
            visited.push(args.geom_id);
            assert_eq!(args.query_type, PointQueryType::Sphere);
            assert_eq!(args.similarity_scale, 1.0);
            false
        });

        assert!(!changed);
        assert_eq!(visited, vec![0]);
    }
}
