use ultraviolet::Vec3;

use crate::render::{
    context::IntersectContext,
    math::{Ray, RayHit, HALF_PI, PI},
    packet::{LaneMask, RayHitK, RayK},
};

use super::{BoundedGeometry, AABB};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Nearest distance along the ray at which it enters or leaves the
    /// sphere, restricted to `[tnear, tfar)`.
    fn hit_distance(&self, ray: &Ray) -> Option<f32> {
        let oc = ray.org - self.center;
        let a = ray.dir.mag_sq();
        let b = 2.0 * ray.dir.dot(oc);
        let c = oc.mag_sq() - self.radius * self.radius;

        let discriminant = b * b - 4.0 * a * c;

        if discriminant < 0.0 {
            return None;
        }

        let t1 = (-b - discriminant.sqrt()) / (2.0 * a);
        let t2 = (-b + discriminant.sqrt()) / (2.0 * a);

        // near point is outside the segment, the far one may still be inside
        if ray.accepts(t1) {
            Some(t1)
        } else if ray.accepts(t2) {
            Some(t2)
        } else {
            None
        }
    }

    /// Records the closest hit in `ray` if it is closer than `ray.ray.tfar`.
    pub fn intersect(&self, ray: &mut RayHit, context: &IntersectContext, geom_id: u32) -> bool {
        let Some(t) = self.hit_distance(&ray.ray) else {
            return false;
        };

        let point = ray.ray.at(t);
        let (u, v) = self.uv(point);

        ray.ray.tfar = t;
        ray.hit.ng = (point - self.center).normalized();
        ray.hit.u = u;
        ray.hit.v = v;
        ray.hit.prim_id = 0;
        ray.hit.geom_id = geom_id;
        ray.hit.inst_id = context.user.inst_stack.id_slots();

        true
    }

    /// Sets `tfar` to negative infinity if anything on the segment hits the
    /// sphere.
    pub fn occluded(&self, ray: &mut Ray) -> bool {
        if self.hit_distance(ray).is_some() {
            ray.tfar = f32::NEG_INFINITY;
            true
        } else {
            false
        }
    }

    pub fn intersect_packet<const K: usize>(
        &self,
        valid: LaneMask<K>,
        ray: &mut RayHitK<K>,
        context: &IntersectContext,
        geom_id: u32,
    ) {
        for i in valid.lanes() {
            let mut lane = RayHit {
                ray: ray.ray.lane(i),
                hit: ray.hit.lane(i),
            };

            if self.intersect(&mut lane, context, geom_id) {
                ray.ray.tfar[i] = lane.ray.tfar;
                ray.hit.set_lane(i, &lane.hit);
            }
        }
    }

    /// Returns the lanes that became occluded.
    pub fn occluded_packet<const K: usize>(
        &self,
        valid: LaneMask<K>,
        ray: &mut RayK<K>,
    ) -> LaneMask<K> {
        let mut occluded = LaneMask::empty();

        for i in valid.lanes() {
            if self.hit_distance(&ray.lane(i)).is_some() {
                ray.tfar[i] = f32::NEG_INFINITY;
                occluded.set(i, true);
            }
        }

        occluded
    }

    /// U is the azimuthal angle, V the polar angle, both in range [0, 1].
    fn uv(&self, point: Vec3) -> (f32, f32) {
        let p = (point - self.center).normalized();
        let phi = p.z.clamp(-1.0, 1.0).asin();
        let theta = p.y.atan2(p.x);

        let u = 1.0 - (theta + PI) / (2.0 * PI);
        let v = (phi + HALF_PI) / PI;

        (u, v)
    }
}

impl BoundedGeometry for Sphere {
    fn bounding_box(&self) -> AABB {
        AABB::at_point_with_half_size(self.center, Vec3::broadcast(self.radius))
    }
}
