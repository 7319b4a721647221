//! Moving rays into an instance's local frame and back.

use std::ops::{Deref, DerefMut};

use ultraviolet::Vec3;

use super::{
    affine::{AffineSpace3, AffineSpace3K},
    math::{Ray, RayHit},
    packet::{RayHitK, RayK, Vec3K},
};

/// Something whose origin and direction can be moved between frames.
///
/// Only origin and direction change. `tnear`, `tfar`, `time` and the mask
/// keep their values, so hit distances found in the local frame are valid
/// in the world frame as well.
pub trait RayFrame {
    /// Saved origin and direction.
    type Frame: Copy;

    type Transform;

    fn frame(&self) -> Self::Frame;

    fn set_frame(&mut self, frame: Self::Frame);

    fn transform_frame(&mut self, xfm: &Self::Transform);
}

impl RayFrame for Ray {
    type Frame = (Vec3, Vec3);
    type Transform = AffineSpace3;

    #[inline]
    fn frame(&self) -> Self::Frame {
        (self.org, self.dir)
    }

    #[inline]
    fn set_frame(&mut self, (org, dir): Self::Frame) {
        self.org = org;
        self.dir = dir;
    }

    #[inline]
    fn transform_frame(&mut self, xfm: &AffineSpace3) {
        self.org = xfm.transform_point(self.org);
        self.dir = xfm.transform_vector(self.dir);
    }
}

impl RayFrame for RayHit {
    type Frame = (Vec3, Vec3);
    type Transform = AffineSpace3;

    #[inline]
    fn frame(&self) -> Self::Frame {
        self.ray.frame()
    }

    #[inline]
    fn set_frame(&mut self, frame: Self::Frame) {
        self.ray.set_frame(frame)
    }

    #[inline]
    fn transform_frame(&mut self, xfm: &AffineSpace3) {
        self.ray.transform_frame(xfm)
    }
}

impl<const K: usize> RayFrame for RayK<K> {
    type Frame = (Vec3K<K>, Vec3K<K>);
    type Transform = AffineSpace3K<K>;

    #[inline]
    fn frame(&self) -> Self::Frame {
        (self.org, self.dir)
    }

    #[inline]
    fn set_frame(&mut self, (org, dir): Self::Frame) {
        self.org = org;
        self.dir = dir;
    }

    #[inline]
    fn transform_frame(&mut self, xfm: &AffineSpace3K<K>) {
        self.org = xfm.transform_point(&self.org);
        self.dir = xfm.transform_vector(&self.dir);
    }
}

impl<const K: usize> RayFrame for RayHitK<K> {
    type Frame = (Vec3K<K>, Vec3K<K>);
    type Transform = AffineSpace3K<K>;

    #[inline]
    fn frame(&self) -> Self::Frame {
        self.ray.frame()
    }

    #[inline]
    fn set_frame(&mut self, frame: Self::Frame) {
        self.ray.set_frame(frame)
    }

    #[inline]
    fn transform_frame(&mut self, xfm: &AffineSpace3K<K>) {
        self.ray.transform_frame(xfm)
    }
}

/// A ray moved into a local frame. The saved world-space origin and
/// direction are written back when this is dropped.
pub struct LocalFrame<'a, R: RayFrame> {
    inner: &'a mut R,
    saved: R::Frame,
}

impl<'a, R: RayFrame> LocalFrame<'a, R> {
    #[inline]
    pub fn enter(ray: &'a mut R, world2local: &R::Transform) -> Self {
        let saved = ray.frame();
        ray.transform_frame(world2local);
        Self { inner: ray, saved }
    }
}

impl<R: RayFrame> Deref for LocalFrame<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &*self.inner
    }
}

impl<R: RayFrame> DerefMut for LocalFrame<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut *self.inner
    }
}

impl<R: RayFrame> Drop for LocalFrame<'_, R> {
    fn drop(&mut self) {
        self.inner.set_frame(self.saved);
    }
}
