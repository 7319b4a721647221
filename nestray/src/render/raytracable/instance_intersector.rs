//! Intersecting rays and ray packets with instances.
//!
//! All four variants (single ray or packet, static or motion) share one
//! algorithm: test the mask, push the instance, move the ray into the
//! instance's local frame, recurse into the child scene and undo it all in
//! reverse order. The [`LocalFrame`] and [`InstanceScope`] guards do the
//! undoing, so it happens on every path out of the recursion.

use std::marker::PhantomData;

use crate::render::{
    affine::{AffineSpace3, AffineSpace3K},
    context::IntersectContext,
    frame::LocalFrame,
    instance_stack::InstanceScope,
    math::{Ray, RayHit},
    packet::{LaneMask, RayHitK, RayK},
};

use super::Instance;

/// How an intersector evaluates an instance's transform for a ray time.
pub trait TransformSampling {
    /// `(world2local, local2world)` at `time`.
    fn transforms(instance: &Instance, time: f32) -> (AffineSpace3, AffineSpace3);

    /// World to local transforms for the active lanes.
    fn world2local_k<const K: usize>(
        instance: &Instance,
        valid: LaneMask<K>,
        time: &[f32; K],
    ) -> AffineSpace3K<K>;
}

/// Ignores ray time, uses the instance's fixed transform.
#[derive(Debug, Copy, Clone)]
pub struct Static;

/// Interpolates the instance's transform samples at the ray time.
#[derive(Debug, Copy, Clone)]
pub struct Motion;

impl TransformSampling for Static {
    #[inline]
    fn transforms(instance: &Instance, _time: f32) -> (AffineSpace3, AffineSpace3) {
        (instance.world2local(), instance.local2world())
    }

    #[inline]
    fn world2local_k<const K: usize>(
        instance: &Instance,
        _valid: LaneMask<K>,
        _time: &[f32; K],
    ) -> AffineSpace3K<K> {
        AffineSpace3K::splat(&instance.world2local())
    }
}

impl TransformSampling for Motion {
    #[inline]
    fn transforms(instance: &Instance, time: f32) -> (AffineSpace3, AffineSpace3) {
        let local2world = instance.local2world_at(time);
        (local2world.inversed(), local2world)
    }

    #[inline]
    fn world2local_k<const K: usize>(
        instance: &Instance,
        valid: LaneMask<K>,
        time: &[f32; K],
    ) -> AffineSpace3K<K> {
        instance.world2local_k(valid, time)
    }
}

#[inline]
fn mask_passes(ray_mask: u32, instance: &Instance) -> bool {
    !cfg!(feature = "ray-mask") || ray_mask & instance.mask() != 0
}

/// Single ray instance intersector.
#[derive(Debug, Copy, Clone)]
pub struct InstanceIntersector<T>(PhantomData<T>);

pub type InstanceIntersector1 = InstanceIntersector<Static>;
pub type InstanceIntersector1MB = InstanceIntersector<Motion>;

impl<T: TransformSampling> InstanceIntersector<T> {
    /// Finds the closest hit inside the instance, updating `ray` only if it
    /// is closer than what was already recorded.
    pub fn intersect(ray: &mut RayHit, context: &mut IntersectContext<'_>, instance: &Instance) {
        if !mask_passes(ray.ray.mask, instance) {
            return;
        }

        let (world2local, local2world) = T::transforms(instance, ray.ray.time);

        let Some(mut scope) = InstanceScope::push(
            &mut *context.user,
            instance.geom_id(),
            &world2local,
            &local2world,
        ) else {
            return;
        };

        let mut local = LocalFrame::enter(&mut *ray, &world2local);
        let mut child = IntersectContext::new(instance.object(), &mut scope);
        instance.object().intersect(&mut local, &mut child);
    }

    /// Returns whether anything inside the instance blocks the ray. A
    /// blocked ray has its `tfar` set to negative infinity.
    pub fn occluded(ray: &mut Ray, context: &mut IntersectContext<'_>, instance: &Instance) -> bool {
        if !mask_passes(ray.mask, instance) {
            return false;
        }

        let (world2local, local2world) = T::transforms(instance, ray.time);

        {
            let Some(mut scope) = InstanceScope::push(
                &mut *context.user,
                instance.geom_id(),
                &world2local,
                &local2world,
            ) else {
                return false;
            };

            let mut local = LocalFrame::enter(&mut *ray, &world2local);
            let mut child = IntersectContext::new(instance.object(), &mut scope);
            instance.object().occluded(&mut local, &mut child);
        }

        ray.is_occluded()
    }
}

/// Packet instance intersector for `K` lanes.
#[derive(Debug, Copy, Clone)]
pub struct InstancePacketIntersector<const K: usize, T>(PhantomData<T>);

pub type InstanceIntersectorK<const K: usize> = InstancePacketIntersector<K, Static>;
pub type InstanceIntersectorKMB<const K: usize> = InstancePacketIntersector<K, Motion>;

pub type InstanceIntersector4 = InstanceIntersectorK<4>;
pub type InstanceIntersector4MB = InstanceIntersectorKMB<4>;
pub type InstanceIntersector8 = InstanceIntersectorK<8>;
pub type InstanceIntersector8MB = InstanceIntersectorKMB<8>;
pub type InstanceIntersector16 = InstanceIntersectorK<16>;
pub type InstanceIntersector16MB = InstanceIntersectorKMB<16>;

impl<const K: usize, T: TransformSampling> InstancePacketIntersector<K, T> {
    /// Lanes of `valid` whose ray mask matches the instance's.
    #[inline]
    fn mask_lanes(valid: LaneMask<K>, ray: &RayK<K>, instance: &Instance) -> LaneMask<K> {
        if cfg!(feature = "ray-mask") {
            valid & ray.mask_test(instance.mask())
        } else {
            valid
        }
    }

    /// Transforms recorded on the instance stack. The stack holds one
    /// transform per level, so it gets the one of the first active lane.
    #[inline]
    fn stack_transforms(
        valid: LaneMask<K>,
        ray: &RayK<K>,
        instance: &Instance,
    ) -> Option<(AffineSpace3, AffineSpace3)> {
        let first = valid.lanes().next()?;
        Some(T::transforms(instance, ray.time[first]))
    }

    pub fn intersect(
        valid: LaneMask<K>,
        ray: &mut RayHitK<K>,
        context: &mut IntersectContext<'_>,
        instance: &Instance,
    ) {
        let valid = Self::mask_lanes(valid, &ray.ray, instance);
        let Some((world2inst, inst2world)) = Self::stack_transforms(valid, &ray.ray, instance)
        else {
            return;
        };

        let Some(mut scope) = InstanceScope::push(
            &mut *context.user,
            instance.geom_id(),
            &world2inst,
            &inst2world,
        ) else {
            return;
        };

        let world2local = T::world2local_k(instance, valid, &ray.ray.time);
        let mut local = LocalFrame::enter(&mut *ray, &world2local);
        let mut child = IntersectContext::new(instance.object(), &mut scope);
        instance.object().intersect_packet(valid, &mut local, &mut child);
    }

    /// Returns the lanes of `valid` that are blocked inside the instance.
    pub fn occluded(
        valid: LaneMask<K>,
        ray: &mut RayK<K>,
        context: &mut IntersectContext<'_>,
        instance: &Instance,
    ) -> LaneMask<K> {
        let valid = Self::mask_lanes(valid, ray, instance);
        let Some((world2inst, inst2world)) = Self::stack_transforms(valid, ray, instance) else {
            return LaneMask::empty();
        };

        {
            let Some(mut scope) = InstanceScope::push(
                &mut *context.user,
                instance.geom_id(),
                &world2inst,
                &inst2world,
            ) else {
                return LaneMask::empty();
            };

            let world2local = T::world2local_k(instance, valid, &ray.time);
            let mut local = LocalFrame::enter(&mut *ray, &world2local);
            let mut child = IntersectContext::new(instance.object(), &mut scope);
            instance.object().occluded_packet(valid, &mut local, &mut child);
        }

        valid & ray.occluded_lanes()
    }
}
